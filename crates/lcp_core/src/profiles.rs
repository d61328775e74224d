//! Encryption profile registry.
//!
//! A license names its algorithm suite by URI; the registry maps that URI to
//! a concrete [`EncryptionProfile`]. Profiles are few and versioned, so a
//! declarative table keeps the algorithm choices in one place: the registry
//! is the single point of variation when a future profile changes the
//! user-key hash or either cipher.
//!
//! The registry is immutable once constructed; [`Certificate`] instances and
//! running pipelines may hold references into it for their whole lifetime.
//!
//! [`Certificate`]: crate::certificate::Certificate

use crate::hashing::sha256;
use crate::license::KEY_SIZE;
use crate::symmetric::{AesCbcCipher, CipherError};

/// URI of the LCP 1.0 basic profile.
pub const BASIC_PROFILE_URI: &str = "http://readium.org/lcp/basic-profile";

/// Hash used to derive the user key from the passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKeyHash {
    /// SHA-256 over the UTF-8 passphrase bytes.
    Sha256,
}

/// Symmetric suite for content-key and publication ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// AES-256-CBC, PKCS#7 padded, IV-prefixed ciphertext.
    Aes256CbcPkcs7,
}

/// An immutable algorithm suite selected by profile URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionProfile {
    uri: &'static str,
    user_key_hash: UserKeyHash,
    content_key_cipher: CipherSuite,
    publication_cipher: CipherSuite,
}

impl EncryptionProfile {
    /// The URI identifying this profile.
    pub fn uri(&self) -> &str {
        self.uri
    }

    /// Derive the 32-byte user key from a passphrase.
    pub fn derive_user_key(&self, passphrase: &str) -> [u8; KEY_SIZE] {
        match self.user_key_hash {
            UserKeyHash::Sha256 => sha256(passphrase.as_bytes()),
        }
    }

    /// Cipher for license-scoped ciphertexts, keyed with `key`.
    pub fn content_key_cipher(&self, key: &[u8]) -> Result<AesCbcCipher, CipherError> {
        match self.content_key_cipher {
            CipherSuite::Aes256CbcPkcs7 => AesCbcCipher::new(key),
        }
    }

    /// Cipher for the publication payload, keyed with `key`.
    pub fn publication_cipher(&self, key: &[u8]) -> Result<AesCbcCipher, CipherError> {
        match self.publication_cipher {
            CipherSuite::Aes256CbcPkcs7 => AesCbcCipher::new(key),
        }
    }
}

/// Process-wide profile table, immutable after construction.
#[derive(Debug, Clone)]
pub struct EncryptionProfiles {
    profiles: Vec<EncryptionProfile>,
}

impl EncryptionProfiles {
    /// Build the registry with every profile this build knows.
    pub fn with_known_profiles() -> Self {
        Self {
            profiles: vec![EncryptionProfile {
                uri: BASIC_PROFILE_URI,
                user_key_hash: UserKeyHash::Sha256,
                content_key_cipher: CipherSuite::Aes256CbcPkcs7,
                publication_cipher: CipherSuite::Aes256CbcPkcs7,
            }],
        }
    }

    /// Look up a profile by URI.
    pub fn get(&self, uri: &str) -> Option<&EncryptionProfile> {
        self.profiles.iter().find(|profile| profile.uri == uri)
    }
}

impl Default for EncryptionProfiles {
    fn default() -> Self {
        Self::with_known_profiles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_profile_registered() {
        let profiles = EncryptionProfiles::with_known_profiles();
        let profile = profiles.get(BASIC_PROFILE_URI).unwrap();
        assert_eq!(profile.uri(), BASIC_PROFILE_URI);
    }

    #[test]
    fn test_unknown_uri() {
        let profiles = EncryptionProfiles::with_known_profiles();
        assert!(profiles.get("http://readium.org/lcp/profile-2.x").is_none());
    }

    #[test]
    fn test_user_key_is_sha256_of_passphrase() {
        let profiles = EncryptionProfiles::with_known_profiles();
        let profile = profiles.get(BASIC_PROFILE_URI).unwrap();

        let key = profile.derive_user_key("hunter2");
        assert_eq!(key, sha256(b"hunter2"));
        assert_eq!(key.len(), KEY_SIZE);
    }

    #[test]
    fn test_cipher_rejects_short_key() {
        let profiles = EncryptionProfiles::with_known_profiles();
        let profile = profiles.get(BASIC_PROFILE_URI).unwrap();
        assert!(profile.content_key_cipher(&[0u8; 16]).is_err());
        assert!(profile.publication_cipher(&[0u8; 32]).is_ok());
    }
}
