//! Core types for the Ontology Rosetta gateway.
//!
//! This crate carries everything the other layers agree on: 20-byte
//! addresses with their base58/hex encodings, 256-bit hashes, the currency
//! registry, the transaction envelope codec, and the binary source/sink
//! primitives the wire formats are built from.

pub mod address;
pub mod constants;
pub mod currency;
mod error;
pub mod hash;
pub mod io;
pub mod num;
pub mod transaction;

pub use address::Address;
pub use currency::{Currency, Registry};
pub use error::CoreError;
pub use hash::Hash256;
pub use transaction::{Payload, Sig, Transaction, TxType};

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
