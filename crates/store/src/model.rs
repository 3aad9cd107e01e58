//! The stored block model.
//!
//! Blocks are persisted in a compact form: transaction hashes, a failure
//! flag, and the accepted transfers with compressed addresses and
//! big-endian amount bytes.

use ont_core::num::bigint_from_be_bytes;
use ont_core::{Address, CoreError, Hash256};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A transfer as stored in the index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Amount magnitude as big-endian bytes.
    pub amount: Vec<u8>,
    /// Compressed contract address.
    pub contract: Vec<u8>,
    /// Compressed sender address; the null address marks a mint.
    pub from: Vec<u8>,
    /// Compressed receiver address; the null address marks a burn.
    pub to: Vec<u8>,
    /// Whether this is the gas fee transfer of its transaction.
    pub is_gas: bool,
}

impl Transfer {
    /// The amount as a big integer.
    pub fn amount_bigint(&self) -> BigInt {
        bigint_from_be_bytes(&self.amount)
    }

    /// Decodes the compressed contract address.
    pub fn contract_address(&self) -> Result<Address, CoreError> {
        Address::from_compressed(&self.contract)
    }

    /// Decodes the compressed sender address.
    pub fn from_address(&self) -> Result<Address, CoreError> {
        Address::from_compressed(&self.from)
    }

    /// Decodes the compressed receiver address.
    pub fn to_address(&self) -> Result<Address, CoreError> {
        Address::from_compressed(&self.to)
    }
}

/// A transaction as stored in the index. A failed transaction retains only
/// its gas transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: Hash256,
    pub failed: bool,
    pub transfers: Vec<Transfer>,
}

/// A block as stored in the index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: u32,
    pub transactions: Vec<Transaction>,
}
