//! Random-access reads over an encrypted publication.
//!
//! A protected publication resource is stored as `IV (16 bytes) ‖ AES-CBC
//! ciphertext` with a PKCS#7-padded final block. [`EncryptedStream`] exposes
//! a plaintext-domain view of such a resource: `size()` excludes the IV and
//! padding, and `read(offset, length)` decrypts only the enclosing block
//! range (plus one preceding block for CBC chaining), so readers can seek
//! anywhere in a large publication without decrypting the whole payload.
//!
//! Reads are idempotent and side-effect-free; the plaintext size is learned
//! by decrypting the final block once and cached thereafter.

use core::fmt;
use std::io::{Read, Seek, SeekFrom};

use crate::symmetric::{AesCbcCipher, CipherError, AES_BLOCK_SIZE};

/// A random-access readable source of bytes.
///
/// Implemented for anything `Read + Seek`; the cursor position is not
/// preserved across calls.
pub trait ReadableStream {
    /// Total size of the underlying data in bytes.
    fn size(&mut self) -> std::io::Result<u64>;

    /// Read up to `buf.len()` bytes at the absolute `offset`.
    ///
    /// Returns the number of bytes read; fewer than requested only at the
    /// end of the data.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize>;
}

impl<T: Read + Seek> ReadableStream for T {
    fn size(&mut self) -> std::io::Result<u64> {
        let position = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(position))?;
        Ok(end)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            let n = self.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

/// Errors from encrypted stream access.
#[derive(Debug)]
pub enum StreamError {
    /// IO failure in the underlying stream.
    Io(std::io::Error),
    /// Decryption failure.
    Cipher(CipherError),
    /// The ciphertext is shorter than an IV plus one block.
    CiphertextTooShort(u64),
    /// The ciphertext (after the IV) is not block-aligned.
    NotBlockAligned(u64),
    /// The requested range lies outside the plaintext.
    OutOfRange {
        /// Requested offset in the plaintext domain.
        offset: u64,
        /// Requested length.
        length: usize,
        /// Actual plaintext size.
        size: u64,
    },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Cipher(e) => write!(f, "cipher error: {}", e),
            Self::CiphertextTooShort(size) => {
                write!(f, "ciphertext too short: {} bytes", size)
            }
            Self::NotBlockAligned(size) => {
                write!(f, "ciphertext of {} bytes is not block-aligned", size)
            }
            Self::OutOfRange {
                offset,
                length,
                size,
            } => write!(
                f,
                "range {}..{} out of bounds for plaintext of {} bytes",
                offset,
                offset + *length as u64,
                size
            ),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Cipher(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CipherError> for StreamError {
    fn from(e: CipherError) -> Self {
        Self::Cipher(e)
    }
}

const BLOCK: u64 = AES_BLOCK_SIZE as u64;

/// Plaintext-domain view over an AES-CBC-encrypted readable stream.
pub struct EncryptedStream<R: ReadableStream> {
    inner: R,
    cipher: AesCbcCipher,
    ciphertext_size: u64,
    plaintext_size: Option<u64>,
}

impl<R: ReadableStream> EncryptedStream<R> {
    /// Wrap a stream holding `IV ‖ ciphertext`.
    ///
    /// The stream's size is checked for shape up front; the padding (and
    /// thus the exact plaintext size) is not read until first needed.
    pub fn new(cipher: AesCbcCipher, mut inner: R) -> Result<Self, StreamError> {
        let ciphertext_size = inner.size()?;
        if ciphertext_size < 2 * BLOCK {
            return Err(StreamError::CiphertextTooShort(ciphertext_size));
        }
        if (ciphertext_size - BLOCK) % BLOCK != 0 {
            return Err(StreamError::NotBlockAligned(ciphertext_size));
        }
        Ok(Self {
            inner,
            cipher,
            ciphertext_size,
            plaintext_size: None,
        })
    }

    /// Size of the plaintext in bytes.
    ///
    /// Equals ciphertext size minus the IV and minus the padding (1..=16
    /// bytes), learned by decrypting the final block on the first call.
    pub fn size(&mut self) -> Result<u64, StreamError> {
        if let Some(size) = self.plaintext_size {
            return Ok(size);
        }

        // The final block decrypts against the block before it; for a
        // single-block message that is the IV itself.
        let chain_offset = self.ciphertext_size - 2 * BLOCK;
        let mut tail = [0u8; 2 * AES_BLOCK_SIZE];
        self.read_exact_at(chain_offset, &mut tail)?;

        let last_plain = self.cipher.decrypt_blocks(
            &tail[..AES_BLOCK_SIZE],
            &tail[AES_BLOCK_SIZE..],
            true,
        )?;
        let padding = BLOCK - last_plain.len() as u64;
        let size = self.ciphertext_size - BLOCK - padding;
        self.plaintext_size = Some(size);
        Ok(size)
    }

    /// Read `length` plaintext bytes starting at `offset`.
    ///
    /// The whole range must lie inside the plaintext; partial reads are not
    /// silently returned.
    pub fn read(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, StreamError> {
        let size = self.size()?;
        let end = offset
            .checked_add(length as u64)
            .filter(|&end| end <= size)
            .ok_or(StreamError::OutOfRange {
                offset,
                length,
                size,
            })?;
        if length == 0 {
            return Ok(Vec::new());
        }

        let first_block = offset / BLOCK;
        let last_block = (end - 1) / BLOCK;
        let total_blocks = (self.ciphertext_size - BLOCK) / BLOCK;
        let includes_tail = last_block == total_blocks - 1;

        // Ciphertext block i lives at byte 16 + i*16; the 16 bytes before it
        // (the previous block, or the IV for block 0) are its CBC chain.
        let chain_offset = first_block * BLOCK;
        let span = ((last_block - first_block + 2) * BLOCK) as usize;
        let mut buf = vec![0u8; span];
        self.read_exact_at(chain_offset, &mut buf)?;

        let plain = self.cipher.decrypt_blocks(
            &buf[..AES_BLOCK_SIZE],
            &buf[AES_BLOCK_SIZE..],
            includes_tail,
        )?;

        let skip = (offset - first_block * BLOCK) as usize;
        Ok(plain[skip..skip + length].to_vec())
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StreamError> {
        let n = self.inner.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(StreamError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "ciphertext ended early",
            )));
        }
        Ok(())
    }
}
