//! The on-disk key schema.
//!
//! All keys are single-byte-tagged byte strings:
//!
//! ```text
//!          account  a <compress(acct)> <compress(contract)> <lex(height)> = <amount BE bytes>
//!            block  b <u32-LE(height)>                                    = bincode(Block)
//!   hash-to-height  c <block-hash>                                        = <u32-LE(height)>
//!   height-to-hash  d <u32-LE(height)>                                    = <block-hash>
//! unsigned-tx-hash  e <unsigned-tx-hash>                                  = <empty>
//!           cursor  "height"                                              = <u32-LE(height)>
//! ```
//!
//! System contract addresses compress to two bytes, so the account and
//! contract boundaries inside an `a` key are recoverable from the tagged
//! first byte of each component.

use crate::StoreError;
use ont_core::{Address, Hash256};

/// Tag byte of account-balance keys.
pub const ACCOUNT_TAG: u8 = b'a';

/// The cursor key holding the latest fully indexed height.
pub const HEIGHT_KEY: &[u8] = b"height";

/// Builds the `a`-key prefix for an account/contract pair.
pub fn account_prefix(acct: &Address, contract: &Address) -> Vec<u8> {
    let acct = acct.to_compressed();
    let contract = contract.to_compressed();
    let mut key = Vec::with_capacity(1 + acct.len() + contract.len());
    key.push(ACCOUNT_TAG);
    key.extend_from_slice(&acct);
    key.extend_from_slice(&contract);
    key
}

/// Builds a full `a`-key from a prefix and an encoded height.
pub fn account_key(prefix: &[u8], height_enc: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + height_enc.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(height_enc);
    key
}

/// Builds the `b`-key storing the serialized block at a height.
pub fn block_key(height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = b'b';
    key[1..].copy_from_slice(&height.to_le_bytes());
    key
}

/// Builds the `c`-key mapping a block hash to its height.
pub fn hash_to_height_key(hash: &Hash256) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = b'c';
    key[1..].copy_from_slice(&hash.0);
    key
}

/// Builds the `d`-key mapping a height to its block hash.
pub fn height_to_hash_key(height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = b'd';
    key[1..].copy_from_slice(&height.to_le_bytes());
    key
}

/// Builds the `e`-key marking an unsigned transaction hash as used.
pub fn unsigned_tx_key(hash: &Hash256) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = b'e';
    key[1..].copy_from_slice(&hash.0);
    key
}

/// Splits an `a`-key into its account and contract components, returning
/// them with the byte offset where the height suffix begins.
pub fn split_account_key(key: &[u8]) -> Result<(Address, Address, usize), StoreError> {
    let malformed = || StoreError::Consistency(format!("invalid account key {}", hex::encode(key)));
    if key.first() != Some(&ACCOUNT_TAG) {
        return Err(malformed());
    }
    let acct_end = match key.get(1) {
        Some(1) => 3,
        Some(0) => 22,
        _ => return Err(malformed()),
    };
    let contract_end = match key.get(acct_end) {
        Some(1) => acct_end + 2,
        Some(0) => acct_end + 21,
        _ => return Err(malformed()),
    };
    if key.len() < contract_end {
        return Err(malformed());
    }
    let acct = Address::from_compressed(&key[1..acct_end])
        .map_err(|err| StoreError::Consistency(err.to_string()))?;
    let contract = Address::from_compressed(&key[acct_end..contract_end])
        .map_err(|err| StoreError::Consistency(err.to_string()))?;
    Ok((acct, contract, contract_end))
}
