//! The API services and their shared plumbing.

pub mod account;
pub mod block;
pub mod construction;
pub mod mempool;
pub mod network;

use crate::types::{
    AccountIdentifier, Amount, BlockIdentifier, Currency, Metadata, Operation,
    OperationIdentifier, PartialBlockIdentifier, SubAccountIdentifier, Transaction,
    TransactionIdentifier,
};
use crate::{ApiError, ApiResult};
use num_bigint::BigInt;
use ont_core::{Address, Hash256};
use ont_node_client::NodeClient;
use ont_store::{model, BlockId, BlockInfo, Store};
use serde_json::json;
use std::sync::Arc;

/// Operation type for regular transfers.
pub const OP_TRANSFER: &str = "transfer";
/// Operation type for gas fee transfers.
pub const OP_GAS_FEE: &str = "gas_fee";
/// Operation type for mints.
pub const OP_MINT: &str = "mint";
/// Operation type for burns.
pub const OP_BURN: &str = "burn";

/// Status attached to indexed operations. Only gas fee transfers are
/// indexed for failed transactions, so everything recorded is successful.
pub const STATUS_SUCCESS: &str = "SUCCESS";
/// Status advertised for failed transactions.
pub const STATUS_FAILED: &str = "FAILED";

/// Shared state behind every endpoint.
pub struct Services {
    pub store: Arc<Store>,
    node: Option<Arc<dyn NodeClient>>,
    pub network: crate::types::NetworkIdentifier,
}

impl Services {
    /// Creates the service state. `node` is `None` in offline mode.
    pub fn new(
        store: Arc<Store>,
        node: Option<Arc<dyn NodeClient>>,
        network_name: &str,
    ) -> Self {
        Self {
            store,
            node,
            network: crate::types::NetworkIdentifier {
                blockchain: "ontology".to_owned(),
                network: network_name.to_owned(),
            },
        }
    }

    /// Whether the gateway runs without a node.
    pub fn offline(&self) -> bool {
        self.node.is_none()
    }

    /// The node handle, or `OfflineMode` when running offline.
    pub fn node(&self) -> ApiResult<&Arc<dyn NodeClient>> {
        self.node.as_ref().ok_or_else(ApiError::offline_mode)
    }

    /// Resolves a partial block identifier; an empty one refers to the
    /// latest indexed block.
    pub fn block_id(&self, pid: Option<&PartialBlockIdentifier>) -> ApiResult<BlockId> {
        let pid = match pid {
            Some(pid) if pid.hash.is_some() || pid.index.is_some() => pid,
            _ => {
                return Ok(BlockId::at_height(self.store.indexed_height()));
            }
        };
        let mut id = BlockId::default();
        if let Some(hash) = &pid.hash {
            id.hash =
                Some(Hash256::from_hex_string(hash).map_err(|_| ApiError::invalid_block_hash())?);
        }
        if let Some(index) = pid.index {
            if index < 0 || index > u32::MAX as i64 {
                return Err(ApiError::invalid_block_index());
            }
            id.by_height = true;
            id.height = index as u32;
        }
        Ok(id)
    }

    /// Resolves a partial block identifier against the store, rejecting
    /// heights beyond the indexed tip.
    pub fn block_info(
        &self,
        pid: Option<&PartialBlockIdentifier>,
        with_block: bool,
    ) -> ApiResult<BlockInfo> {
        let id = self.block_id(pid)?;
        if id.by_height && id.height > self.store.indexed_height() {
            return Err(ApiError::unknown_block_index());
        }
        Ok(self.store.get_block_info(&id, with_block)?)
    }

    /// Renders a registered currency into its wire form.
    pub fn rosetta_currency(&self, currency: &ont_core::Currency) -> Currency {
        let mut metadata = Metadata::new();
        metadata.insert(
            "contract".to_owned(),
            json!(currency.contract.to_hex_string()),
        );
        Currency {
            symbol: currency.symbol.clone(),
            decimals: currency.decimals,
            metadata: Some(metadata),
        }
    }

    /// Validates a caller-supplied currency against the registry and
    /// returns the registered record.
    pub fn validate_currency(&self, currency: &Currency) -> ApiResult<&ont_core::Currency> {
        let metadata = currency
            .metadata
            .as_ref()
            .ok_or_else(|| {
                ApiError::invalid_currency().with_detail("currency.metadata field missing")
            })?;
        let raw = metadata
            .get("contract")
            .ok_or_else(|| {
                ApiError::invalid_currency().with_detail("currency.metadata.contract field missing")
            })?
            .as_str()
            .ok_or_else(|| {
                ApiError::invalid_currency().with_detail("currency.metadata.contract is not string")
            })?;
        let contract = Address::from_hex_string(raw).map_err(|err| {
            ApiError::invalid_currency()
                .with_detail(format!("unable to parse currency.metadata.contract: {err}"))
        })?;
        Ok(self
            .store
            .validate_currency(&contract, &currency.symbol, currency.decimals)?)
    }

    /// Renders a stored transaction into its wire form.
    pub fn transform_transaction(&self, txn: &model::Transaction) -> ApiResult<Transaction> {
        let mut ops = Vec::new();
        for xfer in &txn.transfers {
            let contract = xfer
                .contract_address()
                .map_err(|err| ApiError::datastore_consistency().with_detail(err))?;
            let currency = self.store.registry().require(&contract)?;
            let details = TransferDetails {
                amount: xfer.amount_bigint(),
                currency: self.rosetta_currency(currency),
                native: currency.is_native(),
                contract,
                from: xfer
                    .from_address()
                    .map_err(|err| ApiError::datastore_consistency().with_detail(err))?,
                to: xfer
                    .to_address()
                    .map_err(|err| ApiError::datastore_consistency().with_detail(err))?,
                is_gas: xfer.is_gas,
            };
            append_operations(&mut ops, &details, true);
        }
        Ok(Transaction {
            transaction_identifier: TransactionIdentifier {
                hash: txn.hash.to_hex_string(),
            },
            operations: ops,
        })
    }
}

/// One decoded transfer ready to be rendered as operations.
pub struct TransferDetails {
    pub amount: BigInt,
    pub currency: Currency,
    pub native: bool,
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    pub is_gas: bool,
}

impl TransferDetails {
    fn account(&self, addr: &Address) -> AccountIdentifier {
        AccountIdentifier {
            address: addr.to_base58(),
            sub_account: (!self.native).then(|| SubAccountIdentifier {
                address: self.contract.to_hex_string(),
            }),
        }
    }
}

/// Renders a transfer as its from/to operation pair, omitting the side
/// that is the null address (mint/burn).
pub fn append_operations(ops: &mut Vec<Operation>, xfer: &TransferDetails, with_status: bool) {
    let status = with_status.then(|| STATUS_SUCCESS.to_owned());
    let op_type = if xfer.is_gas { OP_GAS_FEE } else { OP_TRANSFER };
    let mut related = None;
    if !xfer.from.is_null() {
        ops.push(Operation {
            operation_identifier: OperationIdentifier {
                index: ops.len() as i64,
                network_index: None,
            },
            related_operations: None,
            op_type: op_type.to_owned(),
            status: status.clone(),
            account: Some(xfer.account(&xfer.from)),
            amount: Some(Amount {
                value: (-&xfer.amount).to_string(),
                currency: xfer.currency.clone(),
            }),
        });
        related = Some(vec![OperationIdentifier {
            index: ops.len() as i64 - 1,
            network_index: None,
        }]);
    }
    if !xfer.to.is_null() {
        ops.push(Operation {
            operation_identifier: OperationIdentifier {
                index: ops.len() as i64,
                network_index: None,
            },
            related_operations: related,
            op_type: op_type.to_owned(),
            status,
            account: Some(xfer.account(&xfer.to)),
            amount: Some(Amount {
                value: xfer.amount.to_string(),
                currency: xfer.currency.clone(),
            }),
        });
    }
}

/// Renders a resolved block reference as a wire identifier.
pub fn block_identifier(info: &BlockInfo) -> BlockIdentifier {
    BlockIdentifier {
        index: info.height as i64,
        hash: info.hash.to_hex_string(),
    }
}

/// Block timestamps are stored in seconds and reported in milliseconds.
pub fn block_timestamp(timestamp: u32) -> i64 {
    timestamp as i64 * 1000
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use async_trait::async_trait;
    use ont_core::{Currency as CoreCurrency, Registry, Transaction};
    use ont_node_client::{ExecuteNotify, NodeBlock, NodeError};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// An OEP4 token contract registered by the test services.
    pub const TOKEN: Address = Address([0x99; 20]);

    pub fn test_registry() -> Registry {
        Registry::new(vec![CoreCurrency {
            contract: TOKEN,
            symbol: "TOK".to_owned(),
            decimals: 8,
            wasm: false,
        }])
    }

    /// A stub node for endpoints that only need an online gate, plus a
    /// fixed mempool.
    #[derive(Default)]
    pub struct FakeNode {
        pub height: u32,
        pub pool: Vec<Transaction>,
    }

    #[async_trait]
    impl NodeClient for FakeNode {
        async fn current_height(&self) -> Result<u32, NodeError> {
            Ok(self.height)
        }

        async fn block_by_height(&self, _height: u32) -> Result<NodeBlock, NodeError> {
            Err(NodeError::NotFound)
        }

        async fn events_by_height(&self, _height: u32) -> Result<Vec<ExecuteNotify>, NodeError> {
            Err(NodeError::NotFound)
        }

        async fn mempool_tx_hashes(&self) -> Result<Vec<Hash256>, NodeError> {
            Ok(self.pool.iter().map(Transaction::hash).collect())
        }

        async fn mempool_tx(&self, hash: &Hash256) -> Result<Transaction, NodeError> {
            self.pool
                .iter()
                .find(|tx| tx.hash() == *hash)
                .cloned()
                .ok_or(NodeError::NotFound)
        }

        async fn submit_tx(&self, _raw: &[u8]) -> Result<(), NodeError> {
            Ok(())
        }

        async fn balance_of(
            &self,
            _acct: &Address,
            _contract: &Address,
            _native: bool,
        ) -> Result<BigInt, NodeError> {
            Ok(BigInt::from(0))
        }
    }

    pub fn offline_services(dir: &TempDir) -> Services {
        let store = Store::open(dir.path(), test_registry()).expect("open store");
        Services::new(Arc::new(store), None, "testnet")
    }

    pub fn online_services(dir: &TempDir, node: FakeNode) -> Services {
        let store = Store::open(dir.path(), test_registry()).expect("open store");
        Services::new(Arc::new(store), Some(Arc::new(node)), "testnet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ont_core::address;
    use tempfile::TempDir;

    #[test]
    fn append_operations_links_the_pair() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let currency = svc.rosetta_currency(
            svc.store.registry().get(&address::ONT).expect("ont"),
        );
        let details = TransferDetails {
            amount: BigInt::from(5),
            currency,
            native: true,
            contract: address::ONT,
            from: Address([0x41; 20]),
            to: Address([0x42; 20]),
            is_gas: false,
        };
        let mut ops = Vec::new();
        append_operations(&mut ops, &details, true);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].amount.as_ref().expect("amount").value, "-5");
        assert_eq!(ops[1].amount.as_ref().expect("amount").value, "5");
        assert_eq!(
            ops[1].related_operations.as_ref().expect("related")[0].index,
            0
        );
        assert!(ops[0].account.as_ref().expect("acct").sub_account.is_none());
    }

    #[test]
    fn mint_renders_one_operation() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let currency = svc.rosetta_currency(
            svc.store.registry().get(&testutil::TOKEN).expect("token"),
        );
        let details = TransferDetails {
            amount: BigInt::from(7),
            currency,
            native: false,
            contract: testutil::TOKEN,
            from: address::NULL,
            to: Address([0x42; 20]),
            is_gas: false,
        };
        let mut ops = Vec::new();
        append_operations(&mut ops, &details, false);
        assert_eq!(ops.len(), 1);
        assert!(ops[0].related_operations.is_none());
        assert!(ops[0].status.is_none());
        assert_eq!(
            ops[0]
                .account
                .as_ref()
                .expect("acct")
                .sub_account
                .as_ref()
                .expect("sub")
                .address,
            testutil::TOKEN.to_hex_string()
        );
    }

    #[test]
    fn validate_currency_requires_registered_record() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let good = svc.rosetta_currency(svc.store.registry().get(&testutil::TOKEN).expect("tok"));
        assert!(svc.validate_currency(&good).is_ok());

        let mut wrong_decimals = good.clone();
        wrong_decimals.decimals = 9;
        assert_eq!(
            svc.validate_currency(&wrong_decimals).expect_err("err").code,
            ApiError::invalid_currency().code
        );

        let mut missing_metadata = good;
        missing_metadata.metadata = None;
        assert_eq!(
            svc.validate_currency(&missing_metadata).expect_err("err").code,
            ApiError::invalid_currency().code
        );
    }

    #[test]
    fn empty_block_id_resolves_to_tip() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let id = svc.block_id(None).expect("id");
        assert!(id.by_height);
        assert_eq!(id.height, 0);
    }

    #[test]
    fn negative_index_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let pid = PartialBlockIdentifier {
            index: Some(-1),
            hash: None,
        };
        assert_eq!(
            svc.block_id(Some(&pid)).expect_err("err").code,
            ApiError::invalid_block_index().code
        );
    }
}
