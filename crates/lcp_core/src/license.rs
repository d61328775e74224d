//! License document model and key material.
//!
//! The license itself is parsed upstream; this crate consumes the parsed
//! form. [`LicenseDocument`] carries exactly the fields the crypto pipeline
//! needs, including `canonical_content`, the byte sequence the publisher
//! signed. Any mutation of that sequence by upstream producers voids
//! verification, so it is held verbatim and never re-serialized here.
//!
//! Key material ([`LicenseKeys`]) is derived on demand, held by the caller,
//! and zeroized on drop. The core never persists it.

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::error::{LcpError, LcpResult};

/// Size of the user key and the content key in bytes.
pub const KEY_SIZE: usize = 32;

/// The `encryption` block of a license document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseCrypto {
    /// URI identifying the encryption profile (algorithm suite).
    pub encryption_profile: String,
    /// Content provider certificate, base64-encoded DER (no PEM armor).
    pub signature_certificate: String,
    /// Detached signature over the canonical content, base64-encoded.
    pub signature: String,
    /// License id encrypted under the user key, base64-encoded.
    pub user_key_check: String,
    /// Content key encrypted under the user key, base64-encoded.
    pub content_key: String,
}

/// A parsed license document, as supplied by the upstream parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseDocument {
    /// License identifier (typically a `urn:uuid:` value).
    pub id: String,
    /// Issue timestamp, RFC 3339.
    pub issued: String,
    /// Last-update timestamp, RFC 3339, when the license was re-issued.
    pub updated: Option<String>,
    /// The exact byte sequence that was signed.
    pub canonical_content: Vec<u8>,
    /// Cryptographic descriptor.
    pub crypto: LicenseCrypto,
}

impl LicenseDocument {
    /// The moment this license was last touched: `updated` when present,
    /// `issued` otherwise.
    ///
    /// Both fields are RFC 3339; a timestamp that does not parse yields
    /// [`LcpError::CommonError`].
    pub fn last_updated(&self) -> LcpResult<DateTime<Utc>> {
        let raw = self.updated.as_deref().unwrap_or(&self.issued);
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LcpError::CommonError(format!("invalid license timestamp: {}", e)))
    }
}

/// Source of the keys needed to decrypt license-scoped and publication data.
///
/// Implementations own the key lifecycle; the crypto provider only borrows.
pub trait KeyProvider {
    /// The 32-byte user key derived from the passphrase.
    fn user_key(&self) -> &[u8];
    /// The 32-byte content key unwrapped from the license.
    fn content_key(&self) -> &[u8];
}

/// Owning [`KeyProvider`] whose key material is zeroized on drop.
pub struct LicenseKeys {
    user_key: Zeroizing<Vec<u8>>,
    content_key: Zeroizing<Vec<u8>>,
}

impl LicenseKeys {
    /// Take ownership of a derived user key and unwrapped content key.
    pub fn new(user_key: Vec<u8>, content_key: Vec<u8>) -> Self {
        Self {
            user_key: Zeroizing::new(user_key),
            content_key: Zeroizing::new(content_key),
        }
    }
}

impl KeyProvider for LicenseKeys {
    fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    fn content_key(&self) -> &[u8] {
        &self.content_key
    }
}
