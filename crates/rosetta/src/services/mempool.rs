//! The `/mempool` endpoints, proxied to the node's pool.

use super::Services;
use crate::types::{
    MempoolResponse, MempoolTransactionRequest, MempoolTransactionResponse, Transaction,
    TransactionIdentifier,
};
use crate::{ApiError, ApiResult};
use ont_core::Hash256;

impl Services {
    /// Implements `/mempool`.
    pub async fn mempool(&self) -> ApiResult<MempoolResponse> {
        let node = self.node()?;
        let hashes = node.mempool_tx_hashes().await.map_err(|err| {
            ApiError::internal().with_detail(err)
        })?;
        Ok(MempoolResponse {
            transaction_identifiers: hashes
                .into_iter()
                .map(|hash| TransactionIdentifier {
                    hash: hash.to_hex_string(),
                })
                .collect(),
        })
    }

    /// Implements `/mempool/transaction`: fetches the pooled transaction
    /// and decodes its transfer payload into operations.
    pub async fn mempool_transaction(
        &self,
        request: &MempoolTransactionRequest,
    ) -> ApiResult<MempoolTransactionResponse> {
        let node = self.node()?;
        let hash = Hash256::from_hex_string(&request.transaction_identifier.hash)
            .map_err(|_| ApiError::invalid_transaction_hash())?;
        let tx = node
            .mempool_tx(&hash)
            .await
            .map_err(|_| ApiError::transaction_not_in_mempool())?;
        let (operations, _, _) = self.payload_operations(&tx)?;
        Ok(MempoolTransactionResponse {
            transaction: Transaction {
                transaction_identifier: TransactionIdentifier {
                    hash: request.transaction_identifier.hash.clone(),
                },
                operations,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{self, FakeNode};
    use super::*;
    use crate::types::NetworkIdentifier;
    use num_bigint::BigInt;
    use ont_core::{Address, Payload, Transaction as CoreTransaction, TxType};
    use ont_vm::{build_neovm_invoke_code, InvokeParam};
    use tempfile::TempDir;

    fn pooled_transfer() -> CoreTransaction {
        let from = Address([0x41; 20]);
        let to = Address([0x42; 20]);
        let code = build_neovm_invoke_code(
            &testutil::TOKEN,
            vec![
                InvokeParam::String("transfer".into()),
                InvokeParam::Array(vec![
                    InvokeParam::Address(from),
                    InvokeParam::Address(to),
                    InvokeParam::Int(BigInt::from(12)),
                ]),
            ],
        );
        CoreTransaction {
            version: 0,
            tx_type: TxType::InvokeNeo,
            nonce: 1,
            gas_price: 2_500,
            gas_limit: 20_000,
            payer: from,
            payload: Payload::InvokeNeo(code),
            sigs: Vec::new(),
        }
    }

    #[test]
    fn mempool_requires_online_mode() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let err = futures_block_on(svc.mempool()).expect_err("err");
        assert_eq!(err.code, ApiError::offline_mode().code);
    }

    #[test]
    fn mempool_lists_pool_hashes() {
        let dir = TempDir::new().expect("tempdir");
        let tx = pooled_transfer();
        let svc = testutil::online_services(
            &dir,
            FakeNode {
                height: 0,
                pool: vec![tx.clone()],
            },
        );
        let response = futures_block_on(svc.mempool()).expect("mempool");
        assert_eq!(
            response.transaction_identifiers,
            vec![TransactionIdentifier {
                hash: tx.hash().to_hex_string()
            }]
        );
    }

    #[test]
    fn mempool_transaction_decodes_operations() {
        let dir = TempDir::new().expect("tempdir");
        let tx = pooled_transfer();
        let svc = testutil::online_services(
            &dir,
            FakeNode {
                height: 0,
                pool: vec![tx.clone()],
            },
        );
        let request = MempoolTransactionRequest {
            network_identifier: NetworkIdentifier {
                blockchain: "ontology".into(),
                network: "testnet".into(),
            },
            transaction_identifier: TransactionIdentifier {
                hash: tx.hash().to_hex_string(),
            },
        };
        let response = futures_block_on(svc.mempool_transaction(&request)).expect("tx");
        assert_eq!(response.transaction.operations.len(), 2);
        assert_eq!(
            response.transaction.operations[0]
                .amount
                .as_ref()
                .expect("amount")
                .value,
            "-12"
        );
    }

    #[test]
    fn missing_pool_transaction_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let request = MempoolTransactionRequest {
            network_identifier: NetworkIdentifier {
                blockchain: "ontology".into(),
                network: "testnet".into(),
            },
            transaction_identifier: TransactionIdentifier {
                hash: ont_core::Hash256([1; 32]).to_hex_string(),
            },
        };
        let err = futures_block_on(svc.mempool_transaction(&request)).expect_err("err");
        assert_eq!(err.code, ApiError::transaction_not_in_mempool().code);
    }

    fn futures_block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }
}
