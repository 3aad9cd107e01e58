//! The full-node collaborator.
//!
//! The gateway never talks to chain internals directly; everything it
//! needs from the node — the tip height, blocks, execute-notifies, the
//! mempool, transaction submission and `balanceOf` pre-execution — goes
//! through the [`NodeClient`] trait. [`RpcNodeClient`] implements it over
//! the node's JSON-RPC interface.

pub mod block;
mod client;
mod error;
pub mod events;
mod rpc;

pub use block::{NodeBlock, NodeTx};
pub use client::NodeClient;
pub use error::NodeError;
pub use events::{EventStates, ExecuteNotify, Notify, StorageLog};
pub use rpc::RpcNodeClient;
