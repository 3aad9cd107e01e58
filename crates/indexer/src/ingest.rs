//! The ingest loop.
//!
//! Polls the node for new blocks and indexes them one commit per block.
//! Transient node failures abort the inner range and retry on the next
//! cycle; event-fetch failures other than `NotFound` and repeated commit
//! failures are fatal.

use crate::{decode_transfer, GasTracker, IndexError};
use num_bigint::BigInt;
use ont_core::num::bigint_to_be_bytes;
use ont_core::{address, Address, Registry};
use ont_node_client::{ExecuteNotify, NodeBlock, NodeClient, NodeError};
use ont_store::keys;
use ont_store::lexnum::encode_height;
use ont_store::{model, BalanceChange, BlockState, Store};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Consecutive commit failures tolerated before the indexer gives up.
const MAX_COMMIT_FAILURES: u32 = 3;

/// Options for the ingest loop.
#[derive(Clone, Copy, Debug)]
pub struct IndexConfig {
    /// Sleep between polling cycles.
    pub wait: Duration,
    /// Stop once the store has caught up with the chain tip instead of
    /// polling forever.
    pub exit_early: bool,
}

/// Runs the ingest loop until cancelled, caught up (`exit_early`), or a
/// fatal error occurs.
pub async fn index_blocks(
    store: Arc<Store>,
    node: Arc<dyn NodeClient>,
    cfg: IndexConfig,
    cancel: watch::Receiver<bool>,
) -> Result<(), IndexError> {
    let mut commit_failures = 0u32;
    'outer: loop {
        tokio::time::sleep(cfg.wait).await;
        if *cancel.borrow() {
            info!("Indexer cancelled");
            return Ok(());
        }
        let mut height = store.indexed_height();
        if height > 0 {
            height += 1;
        }
        let latest = match node.current_height().await {
            Ok(latest) => latest,
            Err(err) => {
                warn!(%err, "Failed to get current block height");
                continue 'outer;
            }
        };
        if cfg.exit_early && height == latest + 1 {
            return Ok(());
        }
        while height <= latest {
            if *cancel.borrow() {
                info!("Indexer cancelled");
                return Ok(());
            }
            if height % 100 == 0 {
                info!(height, "Indexing block");
            }
            let block = match node.block_by_height(height).await {
                Ok(block) => block,
                Err(err) => {
                    error!(height, %err, "Failed to get block");
                    continue 'outer;
                }
            };
            let events = match node.events_by_height(height).await {
                Ok(events) => Some(events),
                Err(NodeError::NotFound) => None,
                Err(err) => {
                    error!(height, %err, "Failed to get events");
                    return Err(IndexError::Node(err));
                }
            };
            let state = assemble_block(store.registry(), &block, events.as_deref(), latest)?;
            if let Err(err) = store.put_block(&state) {
                error!(height, %err, "Failed to store block");
                commit_failures += 1;
                if commit_failures >= MAX_COMMIT_FAILURES {
                    return Err(IndexError::Store(err));
                }
                continue 'outer;
            }
            commit_failures = 0;
            height += 1;
        }
    }
}

/// Assembles the atomic write set for one block: the stored block model,
/// the summed per-account balance changes, and the unsigned transaction
/// hashes.
pub fn assemble_block(
    registry: &Registry,
    block: &NodeBlock,
    events: Option<&[ExecuteNotify]>,
    synced: u32,
) -> Result<BlockState, IndexError> {
    let height_enc = encode_height(block.height);
    let mut transactions = Vec::with_capacity(block.transactions.len());
    let mut unsigned_hashes = Vec::with_capacity(block.transactions.len());
    let mut offsets = HashMap::with_capacity(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        // The unsigned hash makes nonce collisions detectable later,
        // regardless of who ends up signing.
        if let Some(hash) = tx.unsigned_hash() {
            unsigned_hashes.push(hash);
        }
        transactions.push(model::Transaction {
            hash: tx.hash,
            failed: false,
            transfers: Vec::new(),
        });
        offsets.insert(tx.hash, i);
    }

    let mut diffs: BTreeMap<(Address, Address), BigInt> = BTreeMap::new();
    for info in events.unwrap_or_default() {
        let Some(&offset) = offsets.get(&info.tx_hash) else {
            warn!(tx_hash = %info.tx_hash, height = block.height, "Event for unknown transaction");
            continue;
        };
        // Envelopes are recoverable for every well-formed transaction,
        // opaque payload kinds included; a missing one means the node's
        // report did not decode and the gas rule cannot match its payer.
        let payer = match block.transactions[offset].payer() {
            Some(payer) => payer,
            None => {
                warn!(
                    tx_hash = %info.tx_hash,
                    height = block.height,
                    "Missing envelope for transaction with events"
                );
                address::NULL
            }
        };
        let mut tracker = GasTracker::new();
        transactions[offset].failed = info.failed;
        for evt in &info.notify {
            if !registry.contains(&evt.contract) {
                continue;
            }
            let decoded = decode_transfer(
                &evt.contract,
                &evt.states,
                info.gas_consumed,
                block.height,
                &info.tx_hash,
            )?;
            let Some(xfer) = decoded else {
                debug!(tx_hash = %info.tx_hash, height = block.height, "No transfer detected for event");
                continue;
            };
            let Some(is_gas) =
                tracker.check(&evt.contract, &payer, &xfer.from, info.failed, xfer.is_gas)
            else {
                continue;
            };
            if !xfer.from.is_null() {
                *diffs.entry((xfer.from, evt.contract)).or_default() -= &xfer.amount;
            }
            if !xfer.to.is_null() {
                *diffs.entry((xfer.to, evt.contract)).or_default() += &xfer.amount;
            }
            transactions[offset].transfers.push(model::Transfer {
                amount: bigint_to_be_bytes(&xfer.amount),
                contract: evt.contract.to_compressed(),
                from: xfer.from.to_compressed(),
                to: xfer.to.to_compressed(),
                is_gas,
            });
        }
        if info.gas_consumed != 0 && !tracker.verified() {
            warn!(
                tx_hash = %info.tx_hash,
                height = block.height,
                "Missing gas fee transfer event"
            );
        }
    }

    let changes = diffs
        .into_iter()
        .map(|((acct, contract), diff)| {
            let prefix = keys::account_prefix(&acct, &contract);
            let key = keys::account_key(&prefix, &height_enc);
            BalanceChange { diff, key, prefix }
        })
        .collect();

    Ok(BlockState {
        height: block.height,
        hash: block.hash,
        block: model::Block {
            timestamp: block.timestamp,
            transactions,
        },
        changes,
        unsigned_hashes,
        synced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ont_core::{Hash256, Payload, Transaction, TxType};
    use ont_node_client::{EventStates, Notify, NodeTx};

    const ACCT_A: Address = Address([0x41; 20]);
    const ACCT_B: Address = Address([0x42; 20]);

    fn registry() -> Registry {
        Registry::new(Vec::new())
    }

    fn envelope(payer: Address, nonce: u32) -> Transaction {
        Transaction {
            version: 0,
            tx_type: TxType::InvokeNeo,
            nonce,
            gas_price: 2_500,
            gas_limit: 20_000,
            payer,
            payload: Payload::InvokeNeo(vec![0x00, 0x67]),
            sigs: Vec::new(),
        }
    }

    fn node_block(height: u32, txs: Vec<NodeTx>) -> NodeBlock {
        NodeBlock {
            hash: Hash256([height as u8; 32]),
            height,
            timestamp: 1_600_000_000,
            transactions: txs,
        }
    }

    fn native_transfer(from: &Address, to: &Address, amount: i64) -> EventStates {
        EventStates::Native {
            method: "transfer".into(),
            from: from.to_base58(),
            to: to.to_base58(),
            amount,
            value: None,
        }
    }

    fn notify(tx_hash: Hash256, failed: bool, gas: u64, events: Vec<Notify>) -> ExecuteNotify {
        ExecuteNotify {
            tx_hash,
            failed,
            gas_consumed: gas,
            notify: events,
        }
    }

    #[test]
    fn collects_unsigned_hashes_and_hashes() {
        let tx = envelope(ACCT_A, 7);
        let block = node_block(
            1,
            vec![NodeTx {
                hash: Hash256([0xAA; 32]),
                envelope: Some(tx.clone()),
            }],
        );
        let state = assemble_block(&registry(), &block, None, 1).expect("assemble");
        assert_eq!(state.unsigned_hashes, vec![tx.hash()]);
        assert_eq!(state.block.transactions.len(), 1);
        assert!(state.changes.is_empty());
    }

    #[test]
    fn sums_diffs_per_account_and_contract() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            5,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            0,
            vec![
                Notify {
                    contract: address::ONT,
                    states: native_transfer(&ACCT_A, &ACCT_B, 10),
                },
                Notify {
                    contract: address::ONT,
                    states: native_transfer(&ACCT_A, &ACCT_B, 5),
                },
            ],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 5).expect("assemble");
        assert_eq!(state.block.transactions[0].transfers.len(), 2);
        // One summed change per unique (account, contract) pair.
        assert_eq!(state.changes.len(), 2);
        for change in &state.changes {
            let (acct, _, _) = keys::split_account_key(&change.key).expect("split");
            let expected = if acct == ACCT_A {
                BigInt::from(-15)
            } else {
                BigInt::from(15)
            };
            assert_eq!(change.diff, expected);
            assert!(change.key.ends_with(&encode_height(5)));
        }
    }

    #[test]
    fn self_transfer_nets_to_zero_but_is_recorded() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            2,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            0,
            vec![Notify {
                contract: address::ONT,
                states: native_transfer(&ACCT_A, &ACCT_A, 9),
            }],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 2).expect("assemble");
        assert_eq!(state.block.transactions[0].transfers.len(), 1);
        assert_eq!(state.changes.len(), 1);
        assert_eq!(state.changes[0].diff, BigInt::from(0));
    }

    #[test]
    fn mint_and_burn_touch_one_side_only() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            3,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            0,
            vec![
                Notify {
                    contract: address::ONG,
                    states: native_transfer(&address::NULL, &ACCT_A, 100),
                },
                Notify {
                    contract: address::ONG,
                    states: native_transfer(&ACCT_B, &address::NULL, 40),
                },
            ],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 3).expect("assemble");
        assert_eq!(state.changes.len(), 2);
        for change in &state.changes {
            let (acct, _, _) = keys::split_account_key(&change.key).expect("split");
            if acct == ACCT_A {
                assert_eq!(change.diff, BigInt::from(100));
            } else {
                assert_eq!(acct, ACCT_B);
                assert_eq!(change.diff, BigInt::from(-40));
            }
        }
    }

    #[test]
    fn gas_is_tagged_once_per_transaction() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            4,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        // Two identical gas-shaped transfers; only the first is gas.
        let gas_event = Notify {
            contract: address::ONG,
            states: native_transfer(&ACCT_A, &address::GOV, 10_000_000),
        };
        let events = vec![notify(
            tx_hash,
            false,
            10_000_000,
            vec![gas_event.clone(), gas_event],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 4).expect("assemble");
        let transfers = &state.block.transactions[0].transfers;
        assert_eq!(transfers.len(), 2);
        assert!(transfers[0].is_gas);
        assert!(!transfers[1].is_gas);
    }

    #[test]
    fn unmodeled_tx_kinds_hash_and_tag_gas() {
        let tx = Transaction {
            version: 0,
            tx_type: TxType::Other(0xD4),
            nonce: 3,
            gas_price: 2_500,
            gas_limit: 20_000,
            payer: ACCT_A,
            payload: Payload::Opaque(vec![0xDE, 0xAD]),
            sigs: Vec::new(),
        };
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            9,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(tx.clone()),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            10_000_000,
            vec![Notify {
                contract: address::ONG,
                states: native_transfer(&ACCT_A, &address::GOV, 10_000_000),
            }],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 9).expect("assemble");
        // The unsigned hash reaches the commit set even for kinds the
        // gateway does not model.
        assert_eq!(state.unsigned_hashes, vec![tx.hash()]);
        // The payer comes from the opaque envelope, so the gas rule
        // still matches.
        assert!(state.block.transactions[0].transfers[0].is_gas);
    }

    #[test]
    fn failed_tx_keeps_only_the_gas_transfer() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            6,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            true,
            10_000_000,
            vec![
                Notify {
                    contract: address::ONT,
                    states: native_transfer(&ACCT_A, &ACCT_B, 50),
                },
                Notify {
                    contract: address::ONG,
                    states: native_transfer(&ACCT_A, &address::GOV, 10_000_000),
                },
                Notify {
                    contract: address::ONG,
                    states: native_transfer(&ACCT_A, &ACCT_B, 1),
                },
            ],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 6).expect("assemble");
        let tx = &state.block.transactions[0];
        assert!(tx.failed);
        assert_eq!(tx.transfers.len(), 1);
        assert!(tx.transfers[0].is_gas);
    }

    #[test]
    fn failed_tx_without_gas_event_stays_empty() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            7,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(tx_hash, true, 10_000_000, Vec::new())];
        let state = assemble_block(&registry(), &block, Some(&events), 7).expect("assemble");
        let tx = &state.block.transactions[0];
        assert!(tx.failed);
        assert!(tx.transfers.is_empty());
        assert!(state.changes.is_empty());
    }

    #[test]
    fn unregistered_contracts_are_ignored() {
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            8,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            0,
            vec![Notify {
                contract: Address([0x99; 20]),
                states: native_transfer(&ACCT_A, &ACCT_B, 1),
            }],
        )];
        let state = assemble_block(&registry(), &block, Some(&events), 8).expect("assemble");
        assert!(state.block.transactions[0].transfers.is_empty());
        assert!(state.changes.is_empty());
    }

    #[test]
    fn assembled_blocks_commit_and_answer_balance_queries() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = Store::open(dir.path(), registry()).expect("open");
        let tx_hash = Hash256([0xAA; 32]);
        let block = node_block(
            7,
            vec![NodeTx {
                hash: tx_hash,
                envelope: Some(envelope(ACCT_A, 1)),
            }],
        );
        let events = vec![notify(
            tx_hash,
            false,
            0,
            vec![Notify {
                contract: address::ONT,
                states: native_transfer(&address::NULL, &ACCT_A, 20),
            }],
        )];
        let state =
            assemble_block(store.registry(), &block, Some(&events), 7).expect("assemble");
        store.put_block(&state).expect("commit");
        assert_eq!(
            store
                .get_balance(&ACCT_A, &address::ONT, &encode_height(100))
                .expect("balance"),
            BigInt::from(20)
        );
        assert_eq!(
            store
                .get_balance(&ACCT_A, &address::ONT, &encode_height(6))
                .expect("balance"),
            BigInt::from(0)
        );
        assert!(store
            .contains_unsigned_tx_hash(&envelope(ACCT_A, 1).hash())
            .expect("probe"));
    }
}
