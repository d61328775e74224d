//! Hex and base64 conversion helpers.
//!
//! License documents carry certificates, signatures and ciphertexts as
//! base64 without PEM armor; file fingerprints are exchanged as lowercase
//! hex. These helpers centralize both encodings so that call sites map
//! failures to domain errors uniformly.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{LcpError, LcpResult};

/// Encode bytes as lowercase hex without separators.
///
/// The output length is exactly `2 * data.len()` and the alphabet is
/// `[0-9a-f]`.
pub fn raw_to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string into raw bytes.
///
/// Uppercase digits are accepted on input. Odd-length input or a non-hex
/// digit yields [`LcpError::CommonError`].
pub fn hex_to_raw(hex_str: &str) -> LcpResult<Vec<u8>> {
    hex::decode(hex_str).map_err(|e| LcpError::CommonError(e.to_string()))
}

/// Decode standard base64 (with padding, no PEM armor).
///
/// Malformed input yields [`LcpError::CommonError`]; call sites narrow that
/// to their own condition.
pub fn decode_base64(data: &str) -> LcpResult<Vec<u8>> {
    BASE64
        .decode(data.trim())
        .map_err(|e| LcpError::CommonError(e.to_string()))
}

/// Encode bytes as standard base64 with padding.
pub fn encode_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_to_hex_lowercase() {
        assert_eq!(raw_to_hex(&[0x00, 0xff, 0x10]), "00ff10");
    }

    #[test]
    fn test_hex_to_raw_accepts_uppercase() {
        assert_eq!(hex_to_raw("00FF10").unwrap(), vec![0, 255, 16]);
    }

    #[test]
    fn test_hex_to_raw_rejects_odd_length() {
        assert!(matches!(hex_to_raw("abc"), Err(LcpError::CommonError(_))));
    }

    #[test]
    fn test_hex_to_raw_rejects_non_hex() {
        assert!(matches!(hex_to_raw("zz"), Err(LcpError::CommonError(_))));
    }

    #[test]
    fn test_base64_roundtrip() {
        let data = b"license payload";
        let encoded = encode_base64(data);
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_tolerates_surrounding_whitespace() {
        let encoded = format!("  {}\n", encode_base64(b"x"));
        assert_eq!(decode_base64(&encoded).unwrap(), b"x");
    }
}
