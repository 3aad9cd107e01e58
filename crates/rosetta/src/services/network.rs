//! The `/network/*` endpoints.

use super::{
    block_identifier, block_timestamp, Services, OP_BURN, OP_GAS_FEE, OP_MINT, OP_TRANSFER,
    STATUS_FAILED, STATUS_SUCCESS,
};
use crate::types::{
    Allow, NetworkListResponse, NetworkOptionsResponse, NetworkRequest, NetworkStatusResponse,
    OperationStatus, SyncStatus, Version,
};
use crate::{ApiError, ApiResult};
use ont_store::BlockId;

/// The Rosetta specification version this implementation follows.
const ROSETTA_VERSION: &str = "1.4.10";

impl Services {
    /// Implements `/network/list`.
    pub fn network_list(&self) -> NetworkListResponse {
        NetworkListResponse {
            network_identifiers: vec![self.network.clone()],
        }
    }

    /// Implements `/network/options`.
    pub fn network_options(&self) -> NetworkOptionsResponse {
        NetworkOptionsResponse {
            version: Version {
                rosetta_version: ROSETTA_VERSION.to_owned(),
                node_version: env!("CARGO_PKG_VERSION").to_owned(),
            },
            allow: Allow {
                operation_statuses: vec![
                    OperationStatus {
                        status: STATUS_SUCCESS.to_owned(),
                        successful: true,
                    },
                    OperationStatus {
                        status: STATUS_FAILED.to_owned(),
                        successful: false,
                    },
                ],
                operation_types: vec![
                    OP_BURN.to_owned(),
                    OP_GAS_FEE.to_owned(),
                    OP_MINT.to_owned(),
                    OP_TRANSFER.to_owned(),
                ],
                errors: ApiError::all(),
                historical_balance_lookup: true,
            },
        }
    }

    /// Implements `/network/status`.
    pub fn network_status(&self, _request: &NetworkRequest) -> ApiResult<NetworkStatusResponse> {
        if self.offline() {
            return Err(ApiError::offline_mode());
        }
        let current = self
            .store
            .get_block_info(&BlockId::at_height(self.store.indexed_height()), true)?;
        let genesis = self.store.get_block_info(&BlockId::at_height(0), false)?;
        let timestamp = current
            .block
            .as_ref()
            .map(|block| block_timestamp(block.timestamp))
            .unwrap_or_default();
        let sync = self.store.sync_status();
        Ok(NetworkStatusResponse {
            current_block_identifier: block_identifier(&current),
            current_block_timestamp: timestamp,
            genesis_block_identifier: block_identifier(&genesis),
            // The node contract exposes no peer set.
            peers: Vec::new(),
            sync_status: SyncStatus {
                current_index: sync.current.map(i64::from),
                target_index: sync.target.map(i64::from),
                synced: Some(sync.synced),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{self, FakeNode};
    use super::*;
    use crate::types::NetworkIdentifier;
    use ont_core::Hash256;
    use ont_store::{model, BlockState};
    use tempfile::TempDir;

    fn request() -> NetworkRequest {
        NetworkRequest {
            network_identifier: NetworkIdentifier {
                blockchain: "ontology".into(),
                network: "testnet".into(),
            },
            metadata: None,
        }
    }

    fn block_state(height: u32) -> BlockState {
        BlockState {
            height,
            hash: Hash256([height as u8; 32]),
            block: model::Block {
                timestamp: 1_600_000_000 + height,
                transactions: Vec::new(),
            },
            changes: Vec::new(),
            unsigned_hashes: Vec::new(),
            synced: height + 1,
        }
    }

    #[test]
    fn list_reports_the_configured_network() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let response = svc.network_list();
        assert_eq!(response.network_identifiers.len(), 1);
        assert_eq!(response.network_identifiers[0].blockchain, "ontology");
        assert_eq!(response.network_identifiers[0].network, "testnet");
    }

    #[test]
    fn options_advertise_the_error_table() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let response = svc.network_options();
        assert!(response.allow.historical_balance_lookup);
        assert_eq!(response.allow.operation_types.len(), 4);
        assert!(response.allow.errors.len() >= 29);
        assert_eq!(response.version.rosetta_version, "1.4.10");
    }

    #[test]
    fn status_reports_tip_genesis_and_sync() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        svc.store.put_block(&block_state(0)).expect("commit");
        svc.store.put_block(&block_state(4)).expect("commit");
        let response = svc.network_status(&request()).expect("status");
        assert_eq!(response.current_block_identifier.index, 4);
        assert_eq!(response.genesis_block_identifier.index, 0);
        assert_eq!(response.current_block_timestamp, 1_600_000_004_000);
        assert_eq!(response.sync_status.current_index, Some(4));
        assert_eq!(response.sync_status.target_index, Some(5));
        assert_eq!(response.sync_status.synced, Some(false));
        assert!(response.peers.is_empty());
    }

    #[test]
    fn status_requires_online_mode() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        assert_eq!(
            svc.network_status(&request()).expect_err("err").code,
            ApiError::offline_mode().code
        );
    }
}
