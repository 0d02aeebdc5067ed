//! # Hex Formatting Utilities
//!
//! Hex helpers for frame diagnostics and for building test frames from
//! captured bus traffic.
//!
//! ## Usage
//!
//! ```rust
//! use infinity_bus::util::hex::{decode_hex, format_hex_compact};
//!
//! let data = decode_hex("20 01 92 01").unwrap();
//! assert_eq!(format_hex_compact(&data), "20 01 92 01");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode hex string to bytes. Whitespace is ignored.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Space-separated lowercase hex, as used in log lines.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let data = [0x00, 0x3b, 0x02];
        assert_eq!(encode_hex(&data), "003b02");
        assert_eq!(decode_hex("00 3B 02").unwrap(), data);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_hex("  "), Err(HexError::EmptyString));
        assert_eq!(decode_hex("abc"), Err(HexError::OddLength(3)));
        assert!(matches!(decode_hex("zz"), Err(HexError::DecodeError(_))));
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_hex_compact(&[]), "");
        assert_eq!(format_hex_compact(&[0xAB, 0x01]), "ab 01");
    }
}
