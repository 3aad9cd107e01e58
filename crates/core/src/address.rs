//! 20-byte account and contract addresses.
//!
//! Addresses follow the chain's conventions: the hex form is the byte
//! sequence reversed, the base58 form is a checksummed encoding with a
//! fixed version prefix, and an account address is the hash of its
//! verification program. The well-known system contracts compress to two
//! bytes inside store keys.

use crate::constants::ADDR_BASE58_VERSION;
use crate::CoreError;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// The length of an address in bytes.
pub const ADDR_SIZE: usize = 20;

/// Opcode terminating a single-key verification program.
const CHECKSIG: u8 = 0xAC;

/// Key label for EdDSA public keys in their serialized form.
const PK_EDDSA: u8 = 0x14;

/// Curve label for Ed25519 inside a serialized EdDSA key.
const CURVE_ED25519: u8 = 0x01;

/// A 160-bit account or contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDR_SIZE]);

/// The governance (ONT) native contract.
pub const ONT: Address = system_contract(1);

/// The gas (ONG) native contract.
pub const ONG: Address = system_contract(2);

/// The governance fee sink contract.
pub const GOV: Address = system_contract(7);

/// The null address; `from == NULL` marks a mint, `to == NULL` a burn.
pub const NULL: Address = Address([0u8; ADDR_SIZE]);

const fn system_contract(tag: u8) -> Address {
    let mut bytes = [0u8; ADDR_SIZE];
    bytes[ADDR_SIZE - 1] = tag;
    Address(bytes)
}

impl Address {
    /// Parses an address from exactly 20 raw bytes.
    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let bytes: [u8; ADDR_SIZE] = data
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(format!("unexpected length {}", data.len())))?;
        Ok(Self(bytes))
    }

    /// Parses the chain's hex form, which is the byte sequence reversed.
    pub fn from_hex_string(s: &str) -> Result<Self, CoreError> {
        let mut raw =
            hex::decode(s).map_err(|err| CoreError::InvalidAddress(err.to_string()))?;
        raw.reverse();
        Self::parse_from_bytes(&raw)
    }

    /// Renders the chain's hex form (reversed bytes, lowercase).
    pub fn to_hex_string(&self) -> String {
        let mut raw = self.0;
        raw.reverse();
        hex::encode(raw)
    }

    /// Parses a base58check account address.
    pub fn from_base58(s: &str) -> Result<Self, CoreError> {
        let data = bs58::decode(s)
            .into_vec()
            .map_err(|err| CoreError::InvalidAddress(err.to_string()))?;
        if data.len() != ADDR_SIZE + 5 {
            return Err(CoreError::InvalidAddress(format!(
                "unexpected decoded length {}",
                data.len()
            )));
        }
        if data[0] != ADDR_BASE58_VERSION {
            return Err(CoreError::InvalidAddress(format!(
                "unexpected version byte {:#04x}",
                data[0]
            )));
        }
        let checksum = sha256d(&data[..ADDR_SIZE + 1]);
        if checksum[..4] != data[ADDR_SIZE + 1..] {
            return Err(CoreError::InvalidAddress("checksum mismatch".into()));
        }
        Self::parse_from_bytes(&data[1..ADDR_SIZE + 1])
    }

    /// Renders the base58check account form.
    pub fn to_base58(&self) -> String {
        let mut data = Vec::with_capacity(ADDR_SIZE + 5);
        data.push(ADDR_BASE58_VERSION);
        data.extend_from_slice(&self.0);
        let checksum = sha256d(&data);
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    /// Derives the account address of an Ed25519 public key, i.e. the
    /// script hash of its single-key verification program.
    pub fn from_ed25519_pubkey(key: &[u8; 32]) -> Self {
        let program = verification_program(key);
        let digest = Sha256::digest(&program);
        let hash = Ripemd160::digest(digest);
        let mut bytes = [0u8; ADDR_SIZE];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Whether this is the all-zero null address.
    pub fn is_null(&self) -> bool {
        *self == NULL
    }

    /// Compresses the address for use inside store keys: well-known system
    /// contracts become `0x01 <tag>`, anything else `0x00` plus the raw
    /// bytes.
    pub fn to_compressed(&self) -> Vec<u8> {
        match *self {
            ONT => vec![1, 1],
            ONG => vec![1, 2],
            GOV => vec![1, 7],
            NULL => vec![1, 0],
            _ => {
                let mut out = Vec::with_capacity(ADDR_SIZE + 1);
                out.push(0);
                out.extend_from_slice(&self.0);
                out
            }
        }
    }

    /// Inverse of [`to_compressed`](Self::to_compressed).
    pub fn from_compressed(data: &[u8]) -> Result<Self, CoreError> {
        match data.first() {
            Some(1) if data.len() == 2 => match data[1] {
                1 => Ok(ONT),
                2 => Ok(ONG),
                7 => Ok(GOV),
                0 => Ok(NULL),
                tag => Err(CoreError::InvalidAddress(format!(
                    "unknown compression tag {tag:#04x}"
                ))),
            },
            Some(0) if data.len() == ADDR_SIZE + 1 => Self::parse_from_bytes(&data[1..]),
            _ => Err(CoreError::InvalidAddress(format!(
                "malformed compressed address: {}",
                hex::encode(data)
            ))),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex_string(s)
    }
}

/// Serializes an Ed25519 public key in the chain's key encoding.
pub fn serialize_ed25519_pubkey(key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(34);
    out.push(PK_EDDSA);
    out.push(CURVE_ED25519);
    out.extend_from_slice(key);
    out
}

/// Extracts the Ed25519 public key from a serialized key encoding.
pub fn deserialize_ed25519_pubkey(data: &[u8]) -> Result<[u8; 32], CoreError> {
    if data.len() != 34 || data[0] != PK_EDDSA || data[1] != CURVE_ED25519 {
        return Err(CoreError::InvalidKey(format!(
            "unsupported key encoding: {}",
            hex::encode(data)
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&data[2..]);
    Ok(key)
}

/// Builds the single-key verification program for an Ed25519 public key.
pub fn verification_program(key: &[u8; 32]) -> Vec<u8> {
    let serialized = serialize_ed25519_pubkey(key);
    let mut program = Vec::with_capacity(serialized.len() + 2);
    program.push(serialized.len() as u8);
    program.extend_from_slice(&serialized);
    program.push(CHECKSIG);
    program
}

/// Extracts the Ed25519 public key from a single-key verification program.
pub fn pubkey_from_verification_program(program: &[u8]) -> Result<[u8; 32], CoreError> {
    if program.len() != 36 || program[0] != 34 || program[35] != CHECKSIG {
        return Err(CoreError::InvalidKey(
            "not a single-key verification program".into(),
        ));
    }
    deserialize_ed25519_pubkey(&program[1..35])
}

pub(crate) fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let addr = Address::from_hex_string("0100000000000000000000000000000000000000")
            .expect("parse should succeed");
        assert_eq!(addr, ONT);
        assert_eq!(addr.0[ADDR_SIZE - 1], 1);
        assert_eq!(
            addr.to_hex_string(),
            "0100000000000000000000000000000000000000"
        );
    }

    #[test]
    fn well_known_base58_forms() {
        assert_eq!(NULL.to_base58(), "AFmseVrdL9f9oyCzZefL9tG6UbvhPbdYzM");
        assert_eq!(ONT.to_base58(), "AFmseVrdL9f9oyCzZefL9tG6UbvhUMqNMV");
        assert_eq!(ONG.to_base58(), "AFmseVrdL9f9oyCzZefL9tG6UbvhfRZMHJ");
        assert_eq!(GOV.to_base58(), "AFmseVrdL9f9oyCzZefL9tG6UbviEH9ugK");
        for addr in [NULL, ONT, ONG, GOV] {
            let parsed = Address::from_base58(&addr.to_base58()).expect("round trip");
            assert_eq!(parsed, addr);
        }
    }

    #[test]
    fn base58_rejects_bad_checksum() {
        assert!(Address::from_base58("AFmseVrdL9f9oyCzZefL9tG6UbvhPbdYzN").is_err());
    }

    #[test]
    fn compression_round_trip() {
        let plain = Address([0x42; ADDR_SIZE]);
        for addr in [ONT, ONG, GOV, NULL, plain] {
            let compressed = addr.to_compressed();
            let restored = Address::from_compressed(&compressed).expect("round trip");
            assert_eq!(restored, addr);
        }
        assert_eq!(ONT.to_compressed(), vec![1, 1]);
        assert_eq!(NULL.to_compressed(), vec![1, 0]);
        assert_eq!(plain.to_compressed().len(), 21);
    }

    #[test]
    fn compression_rejects_garbage() {
        assert!(Address::from_compressed(&[]).is_err());
        assert!(Address::from_compressed(&[2, 1]).is_err());
        assert!(Address::from_compressed(&[1, 9]).is_err());
        assert!(Address::from_compressed(&[0, 1, 2]).is_err());
    }

    #[test]
    fn verification_program_round_trip() {
        let key = [7u8; 32];
        let program = verification_program(&key);
        assert_eq!(program.len(), 36);
        let restored = pubkey_from_verification_program(&program).expect("round trip");
        assert_eq!(restored, key);
    }
}
