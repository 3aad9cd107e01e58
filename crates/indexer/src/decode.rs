//! The event decoder.
//!
//! Turns a classified notify event into a transfer, or nothing when the
//! event is not a transfer or cannot be decoded. Decode failures are
//! logged and skipped — with one exception: a negative amount in a native
//! event means the node's data is corrupt and aborts the indexer.

use crate::IndexError;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use ont_core::constants::GWEI;
use ont_core::num::bigint_from_neo_bytes;
use ont_core::{address, Address, Hash256};
use ont_node_client::{EventStates, StorageLog};
use tracing::{error, warn};

/// Topic hash of the ERC-20 `Transfer(address,address,uint256)` event.
const TRANSFER_EVENT_TOPIC: [u8; 32] = [
    0xDD, 0xF2, 0x52, 0xAD, 0x1B, 0xE2, 0xC8, 0x9B, 0x69, 0xC2, 0xB0, 0x68, 0xFC, 0x37, 0x8D,
    0xAA, 0x95, 0x2B, 0xA7, 0xF1, 0x63, 0xC4, 0xA1, 0x16, 0x28, 0xF5, 0x5A, 0x4D, 0xF5, 0x23,
    0xB3, 0xEF,
];

/// A transfer decoded from a notify event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub from: Address,
    pub to: Address,
    pub amount: BigInt,
    pub is_gas: bool,
}

/// Decodes one notify event into a transfer.
///
/// Returns `Ok(None)` when the event is not an acceptable transfer, and an
/// error only on the fatal negative-native-amount case.
pub fn decode_transfer(
    contract: &Address,
    states: &EventStates,
    gas_consumed: u64,
    height: u32,
    tx_hash: &Hash256,
) -> Result<Option<DecodedTransfer>, IndexError> {
    match states {
        EventStates::Native {
            method,
            from,
            to,
            amount,
            value,
        } => decode_native(
            contract,
            method,
            from,
            to,
            *amount,
            *value,
            gas_consumed,
            height,
            tx_hash,
        ),
        EventStates::Oep4 {
            method,
            from,
            to,
            amount,
        } => Ok(decode_oep4(method, from, to, amount, height, tx_hash)),
        EventStates::Evm(log) => Ok(decode_evm(log, gas_consumed, height, tx_hash)),
        EventStates::Unsupported => {
            warn!(%tx_hash, height, "No transfer detected for unsupported event state");
            Ok(None)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_native(
    contract: &Address,
    method: &str,
    from: &str,
    to: &str,
    amount: i64,
    value: Option<i64>,
    gas_consumed: u64,
    height: u32,
    tx_hash: &Hash256,
) -> Result<Option<DecodedTransfer>, IndexError> {
    if method != "transfer" {
        return Ok(None);
    }
    let from = match Address::from_base58(from) {
        Ok(addr) => addr,
        Err(err) => {
            error!(%tx_hash, height, %err, "Failed to decode \"from\" in native event");
            return Ok(None);
        }
    };
    let to = match Address::from_base58(to) {
        Ok(addr) => addr,
        Err(err) => {
            error!(%tx_hash, height, %err, "Failed to decode \"to\" in native event");
            return Ok(None);
        }
    };
    if amount < 0 {
        return Err(IndexError::CorruptEvent(format!(
            "transfer amount for txn {tx_hash} at height {height} is negative: {amount}"
        )));
    }
    let total = match value {
        Some(value) => {
            if value < 0 {
                return Err(IndexError::CorruptEvent(format!(
                    "transfer value for txn {tx_hash} at height {height} is negative: {value}"
                )));
            }
            BigInt::from(amount) * BigInt::from(GWEI) + BigInt::from(value)
        }
        None => BigInt::from(amount),
    };
    let is_gas =
        *contract == address::ONG && to == address::GOV && amount as u64 == gas_consumed;
    Ok(Some(DecodedTransfer {
        from,
        to,
        amount: total,
        is_gas,
    }))
}

fn decode_oep4(
    method: &[u8],
    from: &[u8],
    to: &[u8],
    amount: &[u8],
    height: u32,
    tx_hash: &Hash256,
) -> Option<DecodedTransfer> {
    if !method.eq_ignore_ascii_case(b"transfer") {
        return None;
    }
    let from = match decode_oep4_address(from) {
        Ok(addr) => addr,
        Err(err) => {
            error!(%tx_hash, height, %err, "Failed to decode \"from\" in OEP4 event");
            return None;
        }
    };
    let to = match decode_oep4_address(to) {
        Ok(addr) => addr,
        Err(err) => {
            error!(%tx_hash, height, %err, "Failed to decode \"to\" in OEP4 event");
            return None;
        }
    };
    let amount = bigint_from_neo_bytes(amount);
    if amount.sign() == Sign::Minus {
        error!(%tx_hash, height, %amount, "Transfer amount outside of expected range");
        return None;
    }
    Some(DecodedTransfer {
        from,
        to,
        amount,
        is_gas: false,
    })
}

// Empty-or-null byte strings represent the null address (mint/burn).
fn decode_oep4_address(raw: &[u8]) -> Result<Address, ont_core::CoreError> {
    if raw.is_empty() || raw == [0] {
        return Ok(address::NULL);
    }
    Address::parse_from_bytes(raw)
}

fn decode_evm(
    log: &StorageLog,
    gas_consumed: u64,
    height: u32,
    tx_hash: &Hash256,
) -> Option<DecodedTransfer> {
    if log.address != address::ONG {
        warn!(%tx_hash, height, "Ignoring EVM log from unexpected contract");
        return None;
    }
    if log.topics.len() != 3 || log.topics[0] != TRANSFER_EVENT_TOPIC || log.data.len() != 32 {
        warn!(%tx_hash, height, "Ignoring EVM log that is not an ERC-20 transfer");
        return None;
    }
    let from = Address::parse_from_bytes(&log.topics[1][12..]).ok()?;
    let to = Address::parse_from_bytes(&log.topics[2][12..]).ok()?;
    let value = BigInt::from_bytes_be(Sign::Plus, &log.data);
    let scaled = (&value / BigInt::from(GWEI)).to_u64();
    let is_gas = to == address::GOV && scaled == Some(gas_consumed);
    Some(DecodedTransfer {
        from,
        to,
        amount: value,
        is_gas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_states(method: &str, from: &Address, to: &Address, amount: i64) -> EventStates {
        EventStates::Native {
            method: method.to_owned(),
            from: from.to_base58(),
            to: to.to_base58(),
            amount,
            value: None,
        }
    }

    #[test]
    fn native_transfer_decodes() {
        let from = Address([0x42; 20]);
        let states = native_states("transfer", &from, &address::GOV, 10_000_000);
        let xfer = decode_transfer(&address::ONG, &states, 10_000_000, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert_eq!(xfer.amount, BigInt::from(10_000_000));
        assert!(xfer.is_gas);
    }

    #[test]
    fn native_gas_requires_gov_target_and_exact_amount() {
        let from = Address([0x42; 20]);
        let to = Address([0x43; 20]);
        let states = native_states("transfer", &from, &to, 10_000_000);
        let xfer = decode_transfer(&address::ONG, &states, 10_000_000, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert!(!xfer.is_gas);

        let states = native_states("transfer", &from, &address::GOV, 10_000_001);
        let xfer = decode_transfer(&address::ONG, &states, 10_000_000, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert!(!xfer.is_gas);
    }

    #[test]
    fn native_value_extends_precision() {
        let from = Address([0x42; 20]);
        let states = EventStates::Native {
            method: "transfer".into(),
            from: from.to_base58(),
            to: address::GOV.to_base58(),
            amount: 3,
            value: Some(500),
        };
        let xfer = decode_transfer(&address::ONG, &states, 3, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert_eq!(xfer.amount, BigInt::from(3_000_000_500u64));
        assert!(xfer.is_gas);
    }

    #[test]
    fn negative_native_amount_is_fatal() {
        let from = Address([0x42; 20]);
        let states = native_states("transfer", &from, &address::GOV, -1);
        assert!(matches!(
            decode_transfer(&address::ONG, &states, 0, 1, &Hash256([1; 32])),
            Err(IndexError::CorruptEvent(_))
        ));
    }

    #[test]
    fn non_transfer_native_method_is_skipped() {
        let from = Address([0x42; 20]);
        let states = native_states("unboundTimeOffset", &from, &address::GOV, 5);
        assert_eq!(
            decode_transfer(&address::ONT, &states, 0, 1, &Hash256([1; 32])).expect("decode"),
            None
        );
    }

    #[test]
    fn oep4_transfer_decodes_with_case_insensitive_method() {
        let from = Address([0x42; 20]);
        let to = Address([0x43; 20]);
        let states = EventStates::Oep4 {
            method: b"Transfer".to_vec(),
            from: from.0.to_vec(),
            to: to.0.to_vec(),
            amount: vec![0x2A],
        };
        let contract = Address([0x99; 20]);
        let xfer = decode_transfer(&contract, &states, 0, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert_eq!(xfer.amount, BigInt::from(0x2A));
        assert!(!xfer.is_gas);
    }

    #[test]
    fn oep4_mint_and_burn_use_the_null_address() {
        let acct = Address([0x42; 20]);
        for empty in [Vec::new(), vec![0]] {
            let states = EventStates::Oep4 {
                method: b"transfer".to_vec(),
                from: empty,
                to: acct.0.to_vec(),
                amount: vec![0x01],
            };
            let xfer = decode_transfer(&Address([0x99; 20]), &states, 0, 1, &Hash256([1; 32]))
                .expect("decode")
                .expect("transfer");
            assert!(xfer.from.is_null());
            assert_eq!(xfer.to, acct);
        }
    }

    #[test]
    fn oep4_zero_amount_is_kept_and_negative_dropped() {
        let from = Address([0x42; 20]);
        let to = Address([0x43; 20]);
        let zero = EventStates::Oep4 {
            method: b"transfer".to_vec(),
            from: from.0.to_vec(),
            to: to.0.to_vec(),
            amount: Vec::new(),
        };
        let xfer = decode_transfer(&Address([0x99; 20]), &zero, 0, 1, &Hash256([1; 32]))
            .expect("decode")
            .expect("transfer");
        assert_eq!(xfer.amount, BigInt::from(0));

        let negative = EventStates::Oep4 {
            method: b"transfer".to_vec(),
            from: from.0.to_vec(),
            to: to.0.to_vec(),
            amount: vec![0xFF],
        };
        assert_eq!(
            decode_transfer(&Address([0x99; 20]), &negative, 0, 1, &Hash256([1; 32]))
                .expect("decode"),
            None
        );
    }

    #[test]
    fn evm_transfer_log_decodes_and_tags_gas() {
        let from = Address([0x42; 20]);
        let mut topic_from = [0u8; 32];
        topic_from[12..].copy_from_slice(&from.0);
        let mut topic_to = [0u8; 32];
        topic_to[12..].copy_from_slice(&address::GOV.0);
        let mut data = [0u8; 32];
        // 7 * 10^9 base units == 7 consumed gas units.
        data[24..].copy_from_slice(&7_000_000_000u64.to_be_bytes());
        let log = StorageLog {
            address: address::ONG,
            topics: vec![TRANSFER_EVENT_TOPIC, topic_from, topic_to],
            data: data.to_vec(),
        };
        let xfer = decode_transfer(
            &address::ONG,
            &EventStates::Evm(log),
            7,
            1,
            &Hash256([1; 32]),
        )
        .expect("decode")
        .expect("transfer");
        assert_eq!(xfer.from, from);
        assert_eq!(xfer.to, address::GOV);
        assert!(xfer.is_gas);
    }

    #[test]
    fn evm_log_from_other_contract_is_skipped() {
        let log = StorageLog {
            address: Address([0x77; 20]),
            topics: vec![TRANSFER_EVENT_TOPIC],
            data: Vec::new(),
        };
        assert_eq!(
            decode_transfer(
                &address::ONG,
                &EventStates::Evm(log),
                0,
                1,
                &Hash256([1; 32])
            )
            .expect("decode"),
            None
        );
    }
}
