//! Error types for node interactions.

use thiserror::Error;

/// Errors raised by the full-node client.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The requested entity does not exist on the node.
    #[error("not found")]
    NotFound,

    /// The node rejected a submitted transaction.
    #[error("broadcast rejected: {0}")]
    Rejected(String),

    /// The transport failed or timed out.
    #[error("node transport error: {0}")]
    Transport(String),

    /// The node's response did not have the expected shape.
    #[error("unexpected node response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        NodeError::Transport(err.to_string())
    }
}
