//! Unified domain errors for the LCP crypto core.
//!
//! Every public operation reports failures through [`LcpError`], a flat
//! enumeration of domain conditions. Underlying library failures (DER
//! decoding, RSA verification, cipher unpadding, HTTP transport) are mapped
//! to a domain variant at the boundary where they occur; the original
//! library message is preserved as free-text detail where the condition
//! benefits from diagnostics, and is never parsed.

use core::fmt;

/// Domain error reported by the LCP crypto core.
///
/// Variants correspond one-to-one to the status conditions of the license
/// opening and decryption pipeline. Success is represented by `Ok(..)`, not
/// by a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LcpError {
    /// The license names an encryption profile the registry does not know.
    EncryptionProfileNotFound,
    /// No root certificate was supplied for chain verification.
    NoRootCertificate,
    /// The root certificate could not be decoded.
    RootCertificateNotValid(String),
    /// The content provider certificate could not be decoded.
    ContentProviderCertificateNotValid(String),
    /// The content provider certificate does not chain to the root.
    ContentProviderCertificateNotVerified,
    /// The license predates the provider certificate's validity window.
    ContentProviderCertificateNotStarted,
    /// The license postdates the provider certificate's validity window.
    ContentProviderCertificateExpired,
    /// The provider certificate's serial appears on a revocation list.
    ContentProviderCertificateRevoked,
    /// The license signature does not verify over the canonical content.
    LicenseSignatureNotValid,
    /// The passphrase does not produce a key that opens the license.
    UserPassphraseNotValid,
    /// License-scoped ciphertext could not be decrypted.
    LicenseEncrypted,
    /// Publication ciphertext could not be decrypted.
    PublicationEncrypted,
    /// Any other failure, with diagnostic detail.
    CommonError(String),
}

impl fmt::Display for LcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncryptionProfileNotFound => write!(f, "encryption profile not found"),
            Self::NoRootCertificate => write!(f, "no root certificate provided"),
            Self::RootCertificateNotValid(detail) => {
                write!(f, "root certificate not valid: {}", detail)
            }
            Self::ContentProviderCertificateNotValid(detail) => {
                write!(f, "content provider certificate not valid: {}", detail)
            }
            Self::ContentProviderCertificateNotVerified => {
                write!(f, "content provider certificate not verified against root")
            }
            Self::ContentProviderCertificateNotStarted => {
                write!(f, "content provider certificate not yet valid")
            }
            Self::ContentProviderCertificateExpired => {
                write!(f, "content provider certificate expired")
            }
            Self::ContentProviderCertificateRevoked => {
                write!(f, "content provider certificate revoked")
            }
            Self::LicenseSignatureNotValid => write!(f, "license signature not valid"),
            Self::UserPassphraseNotValid => write!(f, "user passphrase not valid"),
            Self::LicenseEncrypted => write!(f, "license data could not be decrypted"),
            Self::PublicationEncrypted => {
                write!(f, "publication data could not be decrypted")
            }
            Self::CommonError(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for LcpError {}

/// Result type using the unified domain error.
pub type LcpResult<T> = Result<T, LcpError>;
