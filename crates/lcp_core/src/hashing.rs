//! Streaming SHA-256.
//!
//! Used for user-key derivation (hash of the UTF-8 passphrase) and for
//! fingerprinting publication files. The streaming form reads in bounded
//! chunks so arbitrarily large files hash in constant memory.

use std::io::Read;

use sha2::{Digest, Sha256};

/// Digest size in bytes.
pub const HASH_SIZE: usize = 32;

/// Chunk size for reader-based hashing (1 MiB).
pub const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Streaming SHA-256 hasher.
pub struct Sha256Hash {
    inner: Sha256,
}

impl Sha256Hash {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Absorb more data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Absorb everything a reader yields, in 1 MiB chunks.
    ///
    /// Returns the number of bytes read.
    pub fn update_reader<R: Read>(&mut self, mut reader: R) -> std::io::Result<u64> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.inner.update(&buf[..n]);
            total += n as u64;
        }

        Ok(total)
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> [u8; HASH_SIZE] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Hash {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256Hash::new();
    hasher.update(data);
    hasher.finalize()
}
