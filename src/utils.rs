use eyre::{Context, Result};

/// Decodes a hex-encoded span payload as stored in the `spans` table.
///
/// The stored text carries no `0x` prefix; one is not accepted here either,
/// so a prefixed value is reported as malformed rather than silently fixed.
pub fn decode_hex_payload(hex_string: &str) -> Result<Vec<u8>> {
    hex::decode(hex_string).context("Invalid hex payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_payload() {
        assert_eq!(decode_hex_payload("7b7d").unwrap(), b"{}".to_vec());
        assert_eq!(decode_hex_payload("7B7D").unwrap(), b"{}".to_vec());
        assert!(decode_hex_payload("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_hex_payload_invalid() {
        assert!(decode_hex_payload("7b7").is_err());
        assert!(decode_hex_payload("zz").is_err());
        assert!(decode_hex_payload("0x7b7d").is_err());
    }
}
