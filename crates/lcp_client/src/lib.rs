//! # lcp_client
//!
//! Client-side orchestration for a Readium LCP publication open.
//!
//! All cryptographic logic lives in `lcp_core`; this crate provides the
//! side-effecting pieces and binds them into the pass-or-fail pipeline:
//!
//! - [`net`]: the network interface consumed for CRL retrieval, with a
//!   blocking HTTP implementation.
//! - [`timer`]: a cancellable periodic worker hosting the background CRL
//!   refresh.
//! - [`crl_updater`]: fetches revocation lists from the distribution
//!   points discovered on verified certificates and keeps the in-memory
//!   revocation set current.
//! - [`provider`]: the [`CryptoProvider`](provider::CryptoProvider)
//!   orchestrator for license verification, user/content key derivation
//!   and publication decryption.
//!
//! A typical open:
//!
//! ```ignore
//! use std::sync::Arc;
//! use lcp_client::net::HttpNetProvider;
//! use lcp_client::provider::CryptoProvider;
//!
//! let provider = CryptoProvider::new(Arc::new(HttpNetProvider::default()));
//! provider.verify_license(&root_certificate_b64, &license)?;
//! let user_key = provider.decrypt_user_key("passphrase", &license)?;
//! let content_key = provider.decrypt_content_key(&user_key, &license)?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod crl_updater;
pub mod net;
pub mod provider;
pub mod timer;

pub use lcp_core;
