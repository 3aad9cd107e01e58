//! The node collaborator contract.

use crate::{ExecuteNotify, NodeBlock, NodeError};
use async_trait::async_trait;
use num_bigint::BigInt;
use ont_core::{Address, Hash256, Transaction};

/// Everything the gateway consumes from the full node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// The node's current chain tip height.
    async fn current_height(&self) -> Result<u32, NodeError>;

    /// The block at the given height.
    async fn block_by_height(&self, height: u32) -> Result<NodeBlock, NodeError>;

    /// The execute-notifies for the block at the given height.
    /// [`NodeError::NotFound`] means the block emitted no events.
    async fn events_by_height(&self, height: u32) -> Result<Vec<ExecuteNotify>, NodeError>;

    /// The transaction hashes currently in the node's pool.
    async fn mempool_tx_hashes(&self) -> Result<Vec<Hash256>, NodeError>;

    /// A transaction currently in the node's pool.
    async fn mempool_tx(&self, hash: &Hash256) -> Result<Transaction, NodeError>;

    /// Hands a signed transaction to the node's pool.
    async fn submit_tx(&self, raw: &[u8]) -> Result<(), NodeError>;

    /// Pre-executes the contract's `balanceOf` for an account on the live
    /// chain. Used only by the store validation sweep.
    async fn balance_of(
        &self,
        acct: &Address,
        contract: &Address,
        native: bool,
    ) -> Result<BigInt, NodeError>;
}
