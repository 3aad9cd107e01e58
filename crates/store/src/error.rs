//! Error types for the store crate.

use thiserror::Error;

/// Errors raised by the historical-balance index.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying key/value engine failed.
    #[error("datastore error: {0}")]
    Datastore(String),

    /// No block is indexed at the requested height.
    #[error("unknown block index")]
    UnknownBlockIndex,

    /// No block is indexed under the requested hash.
    #[error("unknown block hash")]
    UnknownBlockHash,

    /// The supplied block identifier was inconsistent or unusable.
    #[error("invalid block identifier")]
    InvalidBlockIdentifier,

    /// Indexed data contradicted itself.
    #[error("datastore consistency failure: {0}")]
    Consistency(String),

    /// A stored value failed to decode.
    #[error("failed to decode stored value: {0}")]
    Codec(String),

    /// A height key failed to decode.
    #[error("invalid height encoding: {0}")]
    InvalidHeightEncoding(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Datastore(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}
