//! Property-based tests for the LCP crypto core.
//!
//! These tests use proptest to verify algebraic properties and invariants.

use proptest::prelude::*;

// ============================================================================
// Hex Conversion Property Tests
// ============================================================================

mod encoding_properties {
    use super::*;
    use lcp_core::encoding::{hex_to_raw, raw_to_hex};

    proptest! {
        /// Hex round-trip recovers the original bytes.
        #[test]
        fn hex_roundtrip(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let hex = raw_to_hex(&data);
            prop_assert_eq!(hex_to_raw(&hex).unwrap(), data);
        }

        /// Output length is exactly twice the input length.
        #[test]
        fn hex_length(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(raw_to_hex(&data).len(), data.len() * 2);
        }

        /// Output alphabet is limited to lowercase hex digits.
        #[test]
        fn hex_alphabet(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let hex = raw_to_hex(&data);
            prop_assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        /// Uppercase input decodes to the same bytes as lowercase.
        #[test]
        fn hex_case_insensitive(data in prop::collection::vec(any::<u8>(), 0..64)) {
            let hex = raw_to_hex(&data);
            prop_assert_eq!(hex_to_raw(&hex.to_uppercase()).unwrap(), data);
        }

        /// Odd-length input always fails.
        #[test]
        fn hex_odd_length_rejected(data in prop::collection::vec(any::<u8>(), 1..64)) {
            let mut hex = raw_to_hex(&data);
            hex.pop();
            prop_assert!(hex_to_raw(&hex).is_err());
        }
    }
}

// ============================================================================
// Hashing Property Tests
// ============================================================================

mod hashing_properties {
    use super::*;
    use lcp_core::hashing::{sha256, Sha256Hash};

    proptest! {
        /// The digest is independent of how the input is chunked.
        #[test]
        fn chunking_independence(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            cuts in prop::collection::vec(0usize..4096, 0..8),
        ) {
            let mut cuts: Vec<usize> = cuts.into_iter().filter(|&c| c <= data.len()).collect();
            cuts.sort_unstable();

            let mut hasher = Sha256Hash::new();
            let mut start = 0;
            for cut in cuts {
                hasher.update(&data[start..cut.max(start)]);
                start = cut.max(start);
            }
            hasher.update(&data[start..]);

            prop_assert_eq!(hasher.finalize(), sha256(&data));
        }

        /// Reader-based hashing matches one-shot hashing.
        #[test]
        fn reader_matches_oneshot(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let mut hasher = Sha256Hash::new();
            hasher.update_reader(std::io::Cursor::new(&data)).unwrap();
            prop_assert_eq!(hasher.finalize(), sha256(&data));
        }
    }
}

// ============================================================================
// Symmetric Decryption Property Tests
// ============================================================================

mod symmetric_properties {
    use super::*;
    use aes::cipher::block_padding::Pkcs7;
    use aes::cipher::{BlockEncryptMut, KeyIvInit};
    use aes::Aes256;
    use lcp_core::symmetric::AesCbcCipher;

    fn encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let ct = cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut out = iv.to_vec();
        out.extend_from_slice(&ct);
        out
    }

    proptest! {
        /// Decrypting an encryption recovers the plaintext.
        #[test]
        fn decrypt_inverts_encrypt(
            key in any::<[u8; 32]>(),
            iv in any::<[u8; 16]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let cipher = AesCbcCipher::from_key(&key);
            let data = encrypt(&key, &iv, &plaintext);
            prop_assert_eq!(cipher.decrypt(&data).unwrap(), plaintext);
        }

        /// Block-level decryption of the full range agrees with the
        /// whole-buffer path.
        #[test]
        fn block_decrypt_agrees(
            key in any::<[u8; 32]>(),
            iv in any::<[u8; 16]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let cipher = AesCbcCipher::from_key(&key);
            let data = encrypt(&key, &iv, &plaintext);
            let by_blocks = cipher.decrypt_blocks(&data[..16], &data[16..], true).unwrap();
            prop_assert_eq!(by_blocks, plaintext);
        }
    }
}

// ============================================================================
// Encrypted Stream Property Tests
// ============================================================================

mod stream_properties {
    use super::*;
    use aes::cipher::block_padding::Pkcs7;
    use aes::cipher::{BlockEncryptMut, KeyIvInit};
    use aes::Aes256;
    use lcp_core::stream::EncryptedStream;
    use lcp_core::symmetric::AesCbcCipher;
    use std::io::Cursor;

    const KEY: [u8; 32] = [0x51; 32];

    fn encrypt(iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let ct = cbc::Encryptor::<Aes256>::new_from_slices(&KEY, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut out = iv.to_vec();
        out.extend_from_slice(&ct);
        out
    }

    proptest! {
        /// Every in-range `(offset, length)` read equals the corresponding
        /// plaintext slice.
        #[test]
        fn random_access_equals_slice(
            iv in any::<[u8; 16]>(),
            plaintext in prop::collection::vec(any::<u8>(), 1..2048),
            offset_seed in any::<u64>(),
            length_seed in any::<u64>(),
        ) {
            let mut enc = EncryptedStream::new(
                AesCbcCipher::from_key(&KEY),
                Cursor::new(encrypt(&iv, &plaintext)),
            )
            .unwrap();

            let size = enc.size().unwrap();
            prop_assert_eq!(size, plaintext.len() as u64);

            let offset = offset_seed % size;
            let length = (length_seed % (size - offset + 1)) as usize;

            let got = enc.read(offset, length).unwrap();
            prop_assert_eq!(&got[..], &plaintext[offset as usize..offset as usize + length]);
        }
    }
}

// ============================================================================
// Profile / Key Derivation Property Tests
// ============================================================================

mod profile_properties {
    use super::*;
    use lcp_core::hashing::sha256;
    use lcp_core::profiles::{EncryptionProfiles, BASIC_PROFILE_URI};

    proptest! {
        /// The basic profile's user key is SHA-256 of the UTF-8 passphrase,
        /// for any passphrase.
        #[test]
        fn user_key_is_passphrase_hash(passphrase in ".{0,64}") {
            let profiles = EncryptionProfiles::with_known_profiles();
            let profile = profiles.get(BASIC_PROFILE_URI).unwrap();
            prop_assert_eq!(
                profile.derive_user_key(&passphrase),
                sha256(passphrase.as_bytes())
            );
        }
    }
}
