//! AES-256-CBC decryption.
//!
//! Two shapes, both PKCS#7 padded:
//!
//! - **Whole-buffer decrypt** for license-scoped ciphertexts (the user-key
//!   check token, the wrapped content key, arbitrary license data). The
//!   ciphertext at rest is `IV (16 bytes) ‖ blocks`, usually base64-encoded.
//! - **Block-level decrypt** for random access into the publication payload,
//!   where the caller supplies the CBC chaining block alongside the target
//!   block range and padding is only stripped on the final block.
//!
//! Failures never reveal whether padding, key length or structure was at
//! fault beyond the [`CipherError`] variant; the orchestrator collapses all
//! of them into a single domain status per operation.

use core::fmt;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, KeyInit, KeyIvInit};
use aes::Aes256;
use zeroize::Zeroize;

use crate::encoding::decode_base64;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-256 key size in bytes.
pub const AES_256_KEY_SIZE: usize = 32;

type CbcDecryptor = cbc::Decryptor<Aes256>;

/// Errors from symmetric decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key is not the expected length for the suite.
    InvalidKeyLength {
        /// Required key length in bytes.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },
    /// Ciphertext is shorter than IV plus one block.
    CiphertextTooShort {
        /// Minimum length in bytes.
        minimum: usize,
        /// Length actually supplied.
        got: usize,
    },
    /// Ciphertext length is not a multiple of the block size.
    NotBlockAligned(usize),
    /// Chaining block is not exactly one AES block.
    InvalidIvLength(usize),
    /// PKCS#7 padding did not verify.
    InvalidPadding,
    /// Base64 ciphertext could not be decoded.
    InvalidEncoding(String),
    /// Caller-provided output buffer is too small.
    BufferTooSmall {
        /// Required capacity in bytes.
        required: usize,
        /// Capacity actually supplied.
        got: usize,
    },
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { expected, got } => {
                write!(f, "invalid key length: expected {} bytes, got {}", expected, got)
            }
            Self::CiphertextTooShort { minimum, got } => {
                write!(f, "ciphertext too short: minimum {} bytes, got {}", minimum, got)
            }
            Self::NotBlockAligned(len) => {
                write!(f, "ciphertext length {} is not block-aligned", len)
            }
            Self::InvalidIvLength(got) => {
                write!(f, "invalid IV length: expected {} bytes, got {}", AES_BLOCK_SIZE, got)
            }
            Self::InvalidPadding => write!(f, "invalid padding"),
            Self::InvalidEncoding(detail) => write!(f, "invalid ciphertext encoding: {}", detail),
            Self::BufferTooSmall { required, got } => {
                write!(f, "output buffer too small: need {} bytes, got {}", required, got)
            }
        }
    }
}

impl std::error::Error for CipherError {}

/// AES-256-CBC decryptor with PKCS#7 padding.
///
/// The key is copied in and erased on drop.
pub struct AesCbcCipher {
    key: [u8; AES_256_KEY_SIZE],
}

impl AesCbcCipher {
    /// Create a cipher from a key slice.
    ///
    /// Returns [`CipherError::InvalidKeyLength`] unless the key is exactly
    /// 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != AES_256_KEY_SIZE {
            return Err(CipherError::InvalidKeyLength {
                expected: AES_256_KEY_SIZE,
                got: key.len(),
            });
        }
        let mut k = [0u8; AES_256_KEY_SIZE];
        k.copy_from_slice(key);
        Ok(Self { key: k })
    }

    /// Create a cipher from a fixed-size key array.
    pub fn from_key(key: &[u8; AES_256_KEY_SIZE]) -> Self {
        Self { key: *key }
    }

    /// Decrypt a base64-encoded `IV ‖ ciphertext` buffer.
    pub fn decrypt_base64(&self, data: &str) -> Result<Vec<u8>, CipherError> {
        let raw = decode_base64(data).map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;
        self.decrypt(&raw)
    }

    /// Decrypt a raw `IV ‖ ciphertext` buffer and strip padding.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < AES_BLOCK_SIZE * 2 {
            return Err(CipherError::CiphertextTooShort {
                minimum: AES_BLOCK_SIZE * 2,
                got: data.len(),
            });
        }
        let (iv, blocks) = data.split_at(AES_BLOCK_SIZE);
        if blocks.len() % AES_BLOCK_SIZE != 0 {
            return Err(CipherError::NotBlockAligned(blocks.len()));
        }

        // Lengths are validated above, so construction cannot fail.
        let decryptor = CbcDecryptor::new_from_slices(&self.key, iv).map_err(|_| {
            CipherError::InvalidKeyLength {
                expected: AES_256_KEY_SIZE,
                got: self.key.len(),
            }
        })?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(blocks)
            .map_err(|_| CipherError::InvalidPadding)
    }

    /// Decrypt a raw `IV ‖ ciphertext` buffer into a caller-provided buffer.
    ///
    /// Returns the plaintext length actually written.
    pub fn decrypt_into(&self, data: &[u8], out: &mut [u8]) -> Result<usize, CipherError> {
        let mut plain = self.decrypt(data)?;
        if out.len() < plain.len() {
            let required = plain.len();
            plain.zeroize();
            return Err(CipherError::BufferTooSmall {
                required,
                got: out.len(),
            });
        }
        out[..plain.len()].copy_from_slice(&plain);
        Ok(plain.len())
    }

    /// Decrypt consecutive CBC blocks given their chaining block.
    ///
    /// `chain` is the ciphertext block immediately preceding `blocks` (the
    /// IV when `blocks` starts at the first ciphertext block). When
    /// `strip_padding` is set the final block is treated as the last block
    /// of the message and its PKCS#7 padding is removed.
    pub fn decrypt_blocks(
        &self,
        chain: &[u8],
        blocks: &[u8],
        strip_padding: bool,
    ) -> Result<Vec<u8>, CipherError> {
        if chain.len() != AES_BLOCK_SIZE {
            return Err(CipherError::InvalidIvLength(chain.len()));
        }
        if blocks.is_empty() || blocks.len() % AES_BLOCK_SIZE != 0 {
            return Err(CipherError::NotBlockAligned(blocks.len()));
        }

        let cipher = Aes256::new_from_slice(&self.key).map_err(|_| {
            CipherError::InvalidKeyLength {
                expected: AES_256_KEY_SIZE,
                got: self.key.len(),
            }
        })?;

        let mut out = Vec::with_capacity(blocks.len());
        let mut prev = [0u8; AES_BLOCK_SIZE];
        prev.copy_from_slice(chain);

        for chunk in blocks.chunks(AES_BLOCK_SIZE) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.decrypt_block(&mut block);
            for (byte, chained) in block.iter_mut().zip(prev.iter()) {
                *byte ^= chained;
            }
            out.extend_from_slice(&block);
            prev.copy_from_slice(chunk);
        }

        if strip_padding {
            let pad = usize::from(*out.last().ok_or(CipherError::InvalidPadding)?);
            if pad == 0 || pad > AES_BLOCK_SIZE || pad > out.len() {
                out.zeroize();
                return Err(CipherError::InvalidPadding);
            }
            if !out[out.len() - pad..].iter().all(|&b| b as usize == pad) {
                out.zeroize();
                return Err(CipherError::InvalidPadding);
            }
            out.truncate(out.len() - pad);
        }

        Ok(out)
    }
}

impl Drop for AesCbcCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
