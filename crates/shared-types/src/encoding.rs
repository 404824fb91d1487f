//! # Hex Encoding Helpers
//!
//! Parsing of hex strings coming from environment variables and governance
//! parameter values, where a `0x` prefix is common. Serde payloads use
//! `serde_with::hex::Hex` instead.

use crate::errors::EncodingError;

/// Decode a hex string (optionally `0x`-prefixed) into a fixed-size array.
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], EncodingError> {
    let bytes = decode_hex(s)?;
    if bytes.len() != N {
        return Err(EncodingError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decode a hex string (optionally `0x`-prefixed).
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fixed_accepts_prefix() {
        let a: [u8; 2] = decode_fixed("0xabcd").unwrap();
        let b: [u8; 2] = decode_fixed("abcd").unwrap();
        assert_eq!(a, [0xab, 0xcd]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_fixed_rejects_wrong_length() {
        let err = decode_fixed::<20>("0xabcd").unwrap_err();
        assert_eq!(
            err,
            EncodingError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }
}
