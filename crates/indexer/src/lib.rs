//! The block ingest pipeline.
//!
//! Polls the node for new blocks, decodes transfer events out of the
//! execute-notifies, folds them into per-account balance deltas and
//! commits each block atomically to the store. Also hosts the validation
//! sweep that cross-checks indexed balances against the live chain.

mod decode;
mod error;
mod gas;
mod ingest;
mod validate;

pub use decode::{decode_transfer, DecodedTransfer};
pub use error::IndexError;
pub use gas::GasTracker;
pub use ingest::{assemble_block, index_blocks, IndexConfig};
pub use validate::validate_store;
