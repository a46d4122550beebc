//! Hex text form of keys and other configured byte strings

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CryptoError;

/// Decode hex `text`, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyFormat`] for odd-length or non-hex input.
pub fn parse(text: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(hex::decode(text.trim())?)
}

/// Serialize `bytes` as lowercase hex. For `#[serde(with = "key_hex")]`.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Deserialize a hex string. For `#[serde(with = "key_hex")]`.
///
/// # Errors
///
/// Fails on non-string input and on text [`parse`] rejects.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(serde::de::Error::custom)
}

/// Bytes written as a hex string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse(" 0102ff\n").unwrap(), vec![0x01, 0x02, 0xFF]);
        assert_eq!(parse("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_reports_invalid_key_format() {
        let err = parse("zz").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyFormat(_)));
        assert!(err.to_string().contains("hex decode failed"), "{err}");

        assert!(matches!(parse("abc"), Err(CryptoError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_hex_bytes_json_form() {
        let bytes = HexBytes(b"RIFF".to_vec());
        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(json, r#""52494646""#);
        assert_eq!(serde_json::from_str::<HexBytes>(&json).unwrap(), bytes);

        let err = serde_json::from_str::<HexBytes>(r#""52x9""#).unwrap_err();
        assert!(err.to_string().contains("Invalid key format"), "{err}");
    }
}
