//! The `/block` and `/block/transaction` endpoints.

use super::{block_identifier, block_timestamp, Services};
use crate::types::{
    Block, BlockRequest, BlockResponse, BlockTransactionRequest, BlockTransactionResponse,
    PartialBlockIdentifier,
};
use crate::{ApiError, ApiResult};
use ont_core::Hash256;
use ont_store::BlockId;
use tracing::error;

impl Services {
    /// Implements `/block`: the indexed block plus its parent identifier.
    pub fn block(&self, request: &BlockRequest) -> ApiResult<BlockResponse> {
        if self.offline() {
            return Err(ApiError::offline_mode());
        }
        let info = self.block_info(Some(&request.block_identifier), true)?;
        let parent = if info.height > 0 {
            let parent_info = self
                .store
                .get_block_info(&BlockId::at_height(info.height - 1), false)?;
            block_identifier(&parent_info)
        } else {
            // The genesis block is its own parent.
            block_identifier(&info)
        };
        let stored = info.block.as_ref().ok_or_else(ApiError::internal)?;
        let mut transactions = Vec::with_capacity(stored.transactions.len());
        for (i, txn) in stored.transactions.iter().enumerate() {
            let rendered = self.transform_transaction(txn).map_err(|err| {
                error!(
                    index = i,
                    height = info.height,
                    code = err.code,
                    "Consistency failure when decoding stored transaction"
                );
                err
            })?;
            transactions.push(rendered);
        }
        Ok(BlockResponse {
            block: Block {
                block_identifier: block_identifier(&info),
                parent_block_identifier: parent,
                timestamp: block_timestamp(stored.timestamp),
                transactions,
            },
        })
    }

    /// Implements `/block/transaction`: a linear scan over the block's
    /// transactions.
    pub fn block_transaction(
        &self,
        request: &BlockTransactionRequest,
    ) -> ApiResult<BlockTransactionResponse> {
        if self.offline() {
            return Err(ApiError::offline_mode());
        }
        let tx_hash = Hash256::from_hex_string(&request.transaction_identifier.hash)
            .map_err(|_| ApiError::invalid_transaction_hash())?;
        let pid = PartialBlockIdentifier {
            index: Some(request.block_identifier.index),
            hash: Some(request.block_identifier.hash.clone()),
        };
        let info = self.block_info(Some(&pid), true)?;
        let stored = info.block.as_ref().ok_or_else(ApiError::internal)?;
        for txn in &stored.transactions {
            if txn.hash == tx_hash {
                return Ok(BlockTransactionResponse {
                    transaction: self.transform_transaction(txn)?,
                });
            }
        }
        Err(ApiError::invalid_transaction_hash())
    }
}
