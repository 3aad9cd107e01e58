//! JSON-RPC implementation of the node contract.

use crate::{ExecuteNotify, NodeBlock, NodeClient, NodeError};
use async_trait::async_trait;
use num_bigint::BigInt;
use ont_core::num::bigint_from_neo_bytes;
use ont_core::{address, Address, Hash256, Payload, Transaction, TxType};
use ont_vm::{build_native_invoke_code, build_neovm_invoke_code, InvokeParam};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// A JSON-RPC client for the full node.
pub struct RpcNodeClient {
    url: String,
    client: reqwest::Client,
}

struct RpcReply {
    error: i64,
    desc: String,
    result: Value,
}

impl RpcNodeClient {
    /// Creates a client for the node's JSON-RPC endpoint.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<RpcReply, NodeError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(method, "Calling node RPC");
        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        let error = response
            .get("error")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let desc = response
            .get("desc")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let result = response.get("result").cloned().unwrap_or(Value::Null);
        Ok(RpcReply {
            error,
            desc,
            result,
        })
    }

    async fn call_ok(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let reply = self.call(method, params).await?;
        if reply.error != 0 {
            return Err(NodeError::BadResponse(format!(
                "{method} failed with code {}: {}",
                reply.error, reply.desc
            )));
        }
        Ok(reply.result)
    }

    fn balance_of_code(acct: &Address, contract: &Address, native: bool) -> Vec<u8> {
        if native {
            build_native_invoke_code(
                contract,
                0,
                "balanceOf",
                vec![InvokeParam::Bytes(acct.0.to_vec())],
            )
        } else {
            build_neovm_invoke_code(
                contract,
                vec![
                    InvokeParam::String("balanceOf".into()),
                    InvokeParam::Array(vec![InvokeParam::Address(*acct)]),
                ],
            )
        }
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    async fn current_height(&self) -> Result<u32, NodeError> {
        let result = self.call_ok("getblockcount", json!([])).await?;
        let count = result
            .as_u64()
            .ok_or_else(|| NodeError::BadResponse("non-numeric block count".into()))?;
        Ok(count.saturating_sub(1) as u32)
    }

    async fn block_by_height(&self, height: u32) -> Result<NodeBlock, NodeError> {
        let result = self.call_ok("getblock", json!([height, 1])).await?;
        NodeBlock::from_json(result)
    }

    async fn events_by_height(&self, height: u32) -> Result<Vec<ExecuteNotify>, NodeError> {
        let reply = self.call("getsmartcodeevent", json!([height])).await?;
        if reply.error != 0 || reply.result.is_null() {
            return Err(NodeError::NotFound);
        }
        let entries = reply
            .result
            .as_array()
            .ok_or_else(|| NodeError::BadResponse("non-array event response".into()))?;
        entries
            .iter()
            .cloned()
            .map(ExecuteNotify::from_json)
            .collect()
    }

    async fn mempool_tx_hashes(&self) -> Result<Vec<Hash256>, NodeError> {
        let result = self.call_ok("getmempooltxhashlist", json!([])).await?;
        let raw = match &result {
            Value::Array(items) => items.clone(),
            Value::Object(map) => map
                .get("Txs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let mut hashes = Vec::with_capacity(raw.len());
        for item in raw {
            let hex = item
                .as_str()
                .ok_or_else(|| NodeError::BadResponse("non-string pool hash".into()))?;
            hashes.push(
                Hash256::from_hex_string(hex)
                    .map_err(|err| NodeError::BadResponse(err.to_string()))?,
            );
        }
        Ok(hashes)
    }

    async fn mempool_tx(&self, hash: &Hash256) -> Result<Transaction, NodeError> {
        let reply = self
            .call("getrawtransaction", json!([hash.to_hex_string()]))
            .await?;
        if reply.error != 0 || reply.result.is_null() {
            return Err(NodeError::NotFound);
        }
        let raw_hex = reply
            .result
            .as_str()
            .ok_or_else(|| NodeError::BadResponse("non-string raw transaction".into()))?;
        let raw = hex::decode(raw_hex).map_err(|err| NodeError::BadResponse(err.to_string()))?;
        Transaction::from_bytes(&raw).map_err(|err| NodeError::BadResponse(err.to_string()))
    }

    async fn submit_tx(&self, raw: &[u8]) -> Result<(), NodeError> {
        let reply = self
            .call("sendrawtransaction", json!([hex::encode(raw)]))
            .await?;
        if reply.error != 0 {
            return Err(NodeError::Rejected(format!(
                "code {}: {} {}",
                reply.error, reply.desc, reply.result
            )));
        }
        Ok(())
    }

    async fn balance_of(
        &self,
        acct: &Address,
        contract: &Address,
        native: bool,
    ) -> Result<BigInt, NodeError> {
        let code = Self::balance_of_code(acct, contract, native);
        let tx = Transaction {
            version: 0,
            tx_type: TxType::InvokeNeo,
            nonce: 0,
            gas_price: 0,
            gas_limit: 0,
            payer: address::NULL,
            payload: Payload::InvokeNeo(code),
            sigs: Vec::new(),
        };
        let result = self
            .call_ok(
                "sendrawtransaction",
                json!([hex::encode(tx.to_bytes()), 1]),
            )
            .await?;
        let raw_hex = result
            .as_str()
            .ok_or_else(|| NodeError::BadResponse("non-string pre-execution result".into()))?;
        let raw = hex::decode(raw_hex).map_err(|err| NodeError::BadResponse(err.to_string()))?;
        Ok(bigint_from_neo_bytes(&raw))
    }
}
