//! Error types for the ingest pipeline.

use thiserror::Error;

/// Fatal conditions that terminate the indexer.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A native event carried a negative amount, which can only mean the
    /// node's data is corrupt.
    #[error("corrupt node data: {0}")]
    CorruptEvent(String),

    /// The node failed in a way the outer retry loop cannot absorb.
    #[error("node error: {0}")]
    Node(#[from] ont_node_client::NodeError),

    /// The store repeatedly refused to commit a block.
    #[error("persistent store failure: {0}")]
    Store(#[from] ont_store::StoreError),

    /// The indexed state disagrees with the live chain.
    #[error("validation failed: {0}")]
    Validation(String),
}
