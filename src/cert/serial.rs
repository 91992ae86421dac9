use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of freshly generated serials, the RFC 5280 maximum.
pub const SERIAL_LEN: usize = 20;

/// Certificate serial number, stored as big-endian bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber {
    bytes: Vec<u8>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SerialNumberParseError {
    #[error("Invalid hex character: {0}")]
    InvalidHexCharacter(char),

    #[error("Empty string provided")]
    EmptyString,

    #[error("Invalid length: expected even number of hex characters")]
    InvalidLength,
}

impl SerialNumber {
    /// A fresh random serial: positive, with a non-zero leading byte so the
    /// DER INTEGER keeps its full length.
    pub fn random() -> Self {
        let mut bytes: [u8; SERIAL_LEN] = rand::random();
        bytes[0] &= 0x7f;
        if bytes[0] == 0 {
            bytes[0] = 0x01;
        }
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Accepts plain or colon-separated hex, any case.
    pub fn parse(identifier: &str) -> Result<Self, SerialNumberParseError> {
        if identifier.is_empty() {
            return Err(SerialNumberParseError::EmptyString);
        }

        let cleaned: String = identifier.chars().filter(|c| *c != ':').collect();
        if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SerialNumberParseError::InvalidHexCharacter(bad));
        }
        if cleaned.len() % 2 != 0 {
            return Err(SerialNumberParseError::InvalidLength);
        }

        let bytes =
            hex::decode(&cleaned).map_err(|_| SerialNumberParseError::InvalidLength)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// e.g. "3b:fc:2e:b1"
    pub fn as_colon_hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl From<&SerialNumber> for rcgen::SerialNumber {
    fn from(serial: &SerialNumber) -> Self {
        rcgen::SerialNumber::from_slice(&serial.bytes)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for SerialNumber {
    type Err = SerialNumberParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_colon_hex())
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SerialNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_number_parse_valid() {
        let serial = SerialNumber::parse("3bfc2eb1f113a13995271c643668608ebac61322").unwrap();
        assert_eq!(serial.as_hex(), "3bfc2eb1f113a13995271c643668608ebac61322");

        let serial =
            SerialNumber::parse("3b:fc:2e:b1:f1:13:a1:39:95:27:1c:64:36:68:60:8e:ba:c6:13:22")
                .unwrap();
        assert_eq!(serial.as_hex(), "3bfc2eb1f113a13995271c643668608ebac61322");

        let serial = SerialNumber::parse("Ab:Cd:12:34").unwrap();
        assert_eq!(serial.as_bytes(), &[0xab, 0xcd, 0x12, 0x34]);
    }

    #[test]
    fn test_serial_number_parse_invalid() {
        assert_eq!(
            SerialNumber::parse(""),
            Err(SerialNumberParseError::EmptyString)
        );
        assert_eq!(
            SerialNumber::parse("xy:z1:23"),
            Err(SerialNumberParseError::InvalidHexCharacter('x'))
        );
        assert_eq!(
            SerialNumber::parse("12345"),
            Err(SerialNumberParseError::InvalidLength)
        );
    }

    #[test]
    fn test_random_serials_are_positive_and_distinct() {
        let first = SerialNumber::random();
        let second = SerialNumber::random();

        assert_eq!(first.as_bytes().len(), SERIAL_LEN);
        assert!(first.as_bytes()[0] > 0 && first.as_bytes()[0] < 0x80);
        assert_ne!(first, second);
    }

    #[test]
    fn test_colon_format() {
        let serial = SerialNumber::from_bytes(&[0x3b, 0xfc, 0x2e, 0xb1]);
        assert_eq!(serial.as_colon_hex(), "3b:fc:2e:b1");
        assert_eq!(format!("{serial}"), "3bfc2eb1");
    }
}
