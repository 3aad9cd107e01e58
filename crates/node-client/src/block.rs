//! Blocks as reported by the node.
//!
//! Blocks are fetched in the node's verbose JSON form and reduced to what
//! the indexer needs: the block identity and, per transaction, the hash
//! plus the signature-free envelope. The envelope is rebuilt from the
//! reported fields so its hash — the unsigned transaction hash — can be
//! computed locally.

use crate::NodeError;
use ont_core::transaction::DeployCode;
use ont_core::{Address, Hash256, Payload, Transaction, TxType};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// A block as consumed by the ingest loop.
#[derive(Clone, Debug)]
pub struct NodeBlock {
    pub hash: Hash256,
    pub height: u32,
    pub timestamp: u32,
    pub transactions: Vec<NodeTx>,
}

/// A transaction within a node block.
#[derive(Clone, Debug)]
pub struct NodeTx {
    pub hash: Hash256,
    /// The signature-free envelope. Unmodeled transaction kinds carry
    /// their payload opaquely, so this is absent only when the node's
    /// report itself cannot be decoded.
    pub envelope: Option<Transaction>,
}

impl NodeTx {
    /// The unsigned transaction hash used for nonce-collision detection.
    pub fn unsigned_hash(&self) -> Option<Hash256> {
        self.envelope.as_ref().map(Transaction::hash)
    }

    /// The payer of the transaction, when the envelope is known.
    pub fn payer(&self) -> Option<Address> {
        self.envelope.as_ref().map(|tx| tx.payer)
    }
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Header")]
    header: RawHeader,
    #[serde(rename = "Transactions", default)]
    transactions: Vec<RawTx>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(rename = "Height")]
    height: u32,
    #[serde(rename = "Timestamp")]
    timestamp: u32,
}

#[derive(Deserialize)]
struct RawTx {
    #[serde(rename = "Version")]
    version: u8,
    #[serde(rename = "Nonce")]
    nonce: u32,
    #[serde(rename = "GasPrice")]
    gas_price: u64,
    #[serde(rename = "GasLimit")]
    gas_limit: u64,
    #[serde(rename = "Payer")]
    payer: String,
    #[serde(rename = "TxType")]
    tx_type: u8,
    #[serde(rename = "Payload", default)]
    payload: Value,
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Deserialize)]
struct RawInvokePayload {
    #[serde(rename = "Code")]
    code: String,
}

#[derive(Deserialize)]
struct RawDeployPayload {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "VmType", default)]
    vm_type: u8,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "CodeVersion", default)]
    code_version: String,
    #[serde(rename = "Author", default)]
    author: String,
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Description", default)]
    description: String,
}

impl NodeBlock {
    /// Reads a block from the node's verbose JSON form.
    pub fn from_json(value: Value) -> Result<Self, NodeError> {
        let raw: RawBlock =
            serde_json::from_value(value).map_err(|err| NodeError::BadResponse(err.to_string()))?;
        let hash = Hash256::from_hex_string(&raw.hash)
            .map_err(|err| NodeError::BadResponse(err.to_string()))?;
        let mut transactions = Vec::with_capacity(raw.transactions.len());
        for tx in raw.transactions {
            transactions.push(tx.into_node_tx(raw.header.height)?);
        }
        Ok(Self {
            hash,
            height: raw.header.height,
            timestamp: raw.header.timestamp,
            transactions,
        })
    }
}

impl RawTx {
    fn into_node_tx(self, height: u32) -> Result<NodeTx, NodeError> {
        let hash = Hash256::from_hex_string(&self.hash)
            .map_err(|err| NodeError::BadResponse(err.to_string()))?;
        let envelope = match self.decode_envelope() {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%hash, height, %err, "Skipping undecodable transaction envelope");
                None
            }
        };
        Ok(NodeTx { hash, envelope })
    }

    fn decode_envelope(&self) -> Result<Option<Transaction>, NodeError> {
        let tx_type = TxType::from_byte(self.tx_type);
        let bad = |err: &dyn std::fmt::Display| NodeError::BadResponse(err.to_string());
        let payload = match tx_type {
            TxType::InvokeNeo | TxType::InvokeWasm => {
                let raw: RawInvokePayload =
                    serde_json::from_value(self.payload.clone()).map_err(|err| bad(&err))?;
                let code = hex::decode(&raw.code).map_err(|err| bad(&err))?;
                match tx_type {
                    TxType::InvokeNeo => Payload::InvokeNeo(code),
                    _ => Payload::InvokeWasm(code),
                }
            }
            // The payload of an unmodeled kind is kept as raw bytes so
            // the unsigned hash and payer stay exact.
            TxType::Other(_) => {
                let code = match serde_json::from_value::<RawInvokePayload>(self.payload.clone()) {
                    Ok(raw) => hex::decode(&raw.code).map_err(|err| bad(&err))?,
                    Err(_) => Vec::new(),
                };
                Payload::Opaque(code)
            }
            TxType::Deploy => {
                let raw: RawDeployPayload =
                    serde_json::from_value(self.payload.clone()).map_err(|err| bad(&err))?;
                Payload::Deploy(DeployCode {
                    code: hex::decode(&raw.code).map_err(|err| bad(&err))?,
                    vm_flags: raw.vm_type,
                    name: raw.name,
                    version: raw.code_version,
                    author: raw.author,
                    email: raw.email,
                    description: raw.description,
                })
            }
        };
        let payer = Address::from_base58(&self.payer).map_err(|err| bad(&err))?;
        Ok(Some(Transaction {
            version: self.version,
            tx_type,
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            payer,
            payload,
            sigs: Vec::new(),
        }))
    }
}
