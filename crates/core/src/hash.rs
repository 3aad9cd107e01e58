//! 256-bit hashes for blocks and transactions.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 256-bit block or transaction hash. As with addresses, the hex form is
/// the byte sequence reversed.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Parses a hash from exactly 32 raw bytes.
    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let bytes: [u8; 32] = data
            .try_into()
            .map_err(|_| CoreError::InvalidHash(format!("unexpected length {}", data.len())))?;
        Ok(Self(bytes))
    }

    /// Parses the reversed hex form.
    pub fn from_hex_string(s: &str) -> Result<Self, CoreError> {
        let mut raw = hex::decode(s).map_err(|err| CoreError::InvalidHash(err.to_string()))?;
        raw.reverse();
        Self::parse_from_bytes(&raw)
    }

    /// Renders the reversed hex form.
    pub fn to_hex_string(&self) -> String {
        let mut raw = self.0;
        raw.reverse();
        hex::encode(raw)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex_string())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hex = "e845be647abb86efed9f68e2291e537d77a776f302876f7fa8d3ab860a0b4f30";
        let hash = Hash256::from_hex_string(hex).expect("parse should succeed");
        assert_eq!(hash.to_hex_string(), hex);
        assert_eq!(hash.0[31], 0xe8);
    }

    #[test]
    fn rejects_short_input() {
        assert!(Hash256::from_hex_string("abcd").is_err());
    }
}
