//! Execute-notify events and their decoded state payloads.
//!
//! The node reports contract events as loosely-typed JSON whose shape
//! depends on the emitting execution environment. The shape is inspected
//! exactly once, when the node response is read, and every event becomes
//! one variant of [`EventStates`]; the downstream decoders are total
//! functions over the variants.

use crate::NodeError;
use ont_core::io::Source;
use ont_core::{Address, Hash256};
use serde::Deserialize;
use serde_json::Value;

/// Contract state value reported for failed transactions.
const CONTRACT_STATE_FAIL: u8 = 0;

/// A per-transaction event record.
#[derive(Clone, Debug)]
pub struct ExecuteNotify {
    pub tx_hash: Hash256,
    pub failed: bool,
    pub gas_consumed: u64,
    pub notify: Vec<Notify>,
}

/// A single contract event within a transaction.
#[derive(Clone, Debug)]
pub struct Notify {
    pub contract: Address,
    pub states: EventStates,
}

/// The event payload, classified by shape when the node response is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventStates {
    /// Native contract event: base58 addresses and decimal amounts. The
    /// optional `value` carries sub-unit precision after the upgrade.
    Native {
        method: String,
        from: String,
        to: String,
        amount: i64,
        value: Option<i64>,
    },
    /// NeoVM (OEP4) contract event: four hex-decoded byte strings.
    Oep4 {
        method: Vec<u8>,
        from: Vec<u8>,
        to: Vec<u8>,
        amount: Vec<u8>,
    },
    /// EVM event log.
    Evm(StorageLog),
    /// Anything that matched none of the known shapes; logged and skipped
    /// by the decoder.
    Unsupported,
}

/// A decoded EVM event log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLog {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

impl StorageLog {
    /// Parses the node's storage-log serialization.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let mut source = Source::new(raw);
        let address = source.read_address().ok()?;
        let count = source.read_var_uint().ok()?;
        if count > 16 {
            return None;
        }
        let mut topics = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw: [u8; 32] = source.read_bytes(32).ok()?.try_into().ok()?;
            topics.push(raw);
        }
        let data = source.read_var_bytes().ok()?.to_vec();
        if !source.is_exhausted() {
            return None;
        }
        Some(Self {
            address,
            topics,
            data,
        })
    }
}

#[derive(Deserialize)]
struct RawExecuteNotify {
    #[serde(rename = "TxHash")]
    tx_hash: String,
    #[serde(rename = "State")]
    state: u8,
    #[serde(rename = "GasConsumed", default)]
    gas_consumed: u64,
    #[serde(rename = "Notify", default)]
    notify: Vec<RawNotify>,
}

#[derive(Deserialize)]
struct RawNotify {
    #[serde(rename = "ContractAddress")]
    contract: String,
    #[serde(rename = "States", default)]
    states: Value,
}

impl ExecuteNotify {
    /// Reads one execute-notify record from the node's JSON form.
    pub fn from_json(value: Value) -> Result<Self, NodeError> {
        let raw: RawExecuteNotify = serde_json::from_value(value)
            .map_err(|err| NodeError::BadResponse(err.to_string()))?;
        let tx_hash = Hash256::from_hex_string(&raw.tx_hash)
            .map_err(|err| NodeError::BadResponse(err.to_string()))?;
        let mut notify = Vec::with_capacity(raw.notify.len());
        for entry in raw.notify {
            let contract = Address::from_hex_string(&entry.contract)
                .map_err(|err| NodeError::BadResponse(err.to_string()))?;
            notify.push(Notify {
                contract,
                states: classify_states(&entry.states),
            });
        }
        Ok(Self {
            tx_hash,
            failed: raw.state == CONTRACT_STATE_FAIL,
            gas_consumed: raw.gas_consumed,
            notify,
        })
    }
}

/// Classifies a raw `states` payload into its [`EventStates`] variant.
pub fn classify_states(states: &Value) -> EventStates {
    match states {
        Value::String(raw) => {
            let stripped = raw.strip_prefix("0x").unwrap_or(raw);
            match hex::decode(stripped).ok().and_then(|raw| StorageLog::parse(&raw)) {
                Some(log) => EventStates::Evm(log),
                None => EventStates::Unsupported,
            }
        }
        Value::Array(elems) if elems.len() == 4 || elems.len() == 5 => {
            if elems[3].is_number() {
                classify_native(elems)
            } else {
                classify_oep4(elems)
            }
        }
        _ => EventStates::Unsupported,
    }
}

fn classify_native(elems: &[Value]) -> EventStates {
    let mut strings = Vec::with_capacity(3);
    for elem in &elems[..3] {
        match elem.as_str() {
            Some(s) => strings.push(s.to_owned()),
            None => return EventStates::Unsupported,
        }
    }
    let amount = match elems[3].as_i64() {
        Some(v) => v,
        None => return EventStates::Unsupported,
    };
    let value = match elems.get(4) {
        Some(extra) => match extra.as_i64() {
            Some(v) => Some(v),
            None => return EventStates::Unsupported,
        },
        None => None,
    };
    let mut iter = strings.into_iter();
    EventStates::Native {
        method: iter.next().expect("three strings collected"),
        from: iter.next().expect("three strings collected"),
        to: iter.next().expect("three strings collected"),
        amount,
        value,
    }
}

fn classify_oep4(elems: &[Value]) -> EventStates {
    let mut fields = Vec::with_capacity(4);
    for elem in &elems[..4] {
        let raw = match elem.as_str() {
            Some(s) => s,
            None => return EventStates::Unsupported,
        };
        match hex::decode(raw) {
            Ok(bytes) => fields.push(bytes),
            Err(_) => return EventStates::Unsupported,
        }
    }
    let mut iter = fields.into_iter();
    EventStates::Oep4 {
        method: iter.next().expect("four fields collected"),
        from: iter.next().expect("four fields collected"),
        to: iter.next().expect("four fields collected"),
        amount: iter.next().expect("four fields collected"),
    }
}
