//! The RocksDB-backed store.
//!
//! One writer (the ingest loop) and any number of readers share the
//! database handle. A block's balance updates, metadata keys, unsigned-hash
//! markers and the height cursor all land in a single `WriteBatch`, so
//! readers observe either none or all of a block's effects.

use crate::keys::{self, HEIGHT_KEY};
use crate::lexnum::encode_height;
use crate::model;
use crate::StoreError;
use num_bigint::{BigInt, Sign};
use ont_core::num::{bigint_from_be_bytes, bigint_to_be_bytes};
use ont_core::{Address, Currency, Hash256, Registry};
use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::info;

/// A single account/contract balance delta within a block commit.
#[derive(Clone, Debug)]
pub struct BalanceChange {
    /// Signed balance delta for the block.
    pub diff: BigInt,
    /// Full `a`-key including the encoded height.
    pub key: Vec<u8>,
    /// The `a`-key prefix without the height suffix.
    pub prefix: Vec<u8>,
}

/// Everything that commits atomically for one block.
#[derive(Clone, Debug)]
pub struct BlockState {
    pub height: u32,
    pub hash: Hash256,
    pub block: model::Block,
    pub changes: Vec<BalanceChange>,
    pub unsigned_hashes: Vec<Hash256>,
    /// The chain tip observed when the block was assembled.
    pub synced: u32,
}

/// A block reference, by height or by hash, with optional cross-checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockId {
    pub by_height: bool,
    pub height: u32,
    pub hash: Option<Hash256>,
}

impl BlockId {
    /// References a block by height.
    pub fn at_height(height: u32) -> Self {
        Self {
            by_height: true,
            height,
            hash: None,
        }
    }

    /// References a block by hash.
    pub fn with_hash(hash: Hash256) -> Self {
        Self {
            by_height: false,
            height: 0,
            hash: Some(hash),
        }
    }
}

/// A resolved block reference.
#[derive(Clone, Debug)]
pub struct BlockInfo {
    pub block: Option<model::Block>,
    pub hash: Hash256,
    pub height: u32,
    /// The height in its order-preserving encoding, ready for `a`-key
    /// lookups at this block.
    pub height_enc: Vec<u8>,
}

/// Indexing progress as reported to the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub current: Option<u32>,
    pub target: Option<u32>,
    pub synced: bool,
}

/// A unique account/contract pair found in the `a`-key space.
#[derive(Clone, Debug)]
pub struct AccountEntry {
    pub acct: Address,
    pub contract: Address,
    /// The most recent `a`-key for the pair.
    pub key: Vec<u8>,
    pub native: bool,
}

#[derive(Default)]
struct Heights {
    indexed: Option<u32>,
    synced: Option<u32>,
}

/// The historical-balance index over RocksDB.
pub struct Store {
    db: DB,
    registry: Registry,
    heights: RwLock<Heights>,
}

impl Store {
    /// Opens (or creates) the store at `path` with the given currency
    /// registry, reading the persisted height cursor.
    pub fn open(path: &Path, registry: Registry) -> Result<Self, StoreError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)?;
        let indexed = match db.get(HEIGHT_KEY)? {
            Some(raw) => Some(decode_height_value(&raw)?),
            None => None,
        };
        info!(path = %path.display(), indexed = ?indexed, "Opened internal data store");
        Ok(Self {
            db,
            registry,
            heights: RwLock::new(Heights {
                indexed,
                synced: None,
            }),
        })
    }

    /// The currency registry the store was opened with.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validates a caller-supplied currency triple against the registry.
    pub fn validate_currency(
        &self,
        contract: &Address,
        symbol: &str,
        decimals: i32,
    ) -> Result<&Currency, ont_core::CoreError> {
        self.registry.validate(contract, symbol, decimals)
    }

    /// The latest fully indexed height, or zero when nothing is indexed.
    pub fn indexed_height(&self) -> u32 {
        self.heights.read().indexed.unwrap_or(0)
    }

    /// Whether any block has been indexed yet.
    pub fn has_indexed(&self) -> bool {
        self.heights.read().indexed.is_some()
    }

    /// Records the chain tip observed by the ingest loop.
    pub fn set_synced_height(&self, synced: u32) {
        self.heights.write().synced = Some(synced);
    }

    /// Indexing progress for `/network/status`.
    pub fn sync_status(&self) -> SyncStatus {
        let heights = self.heights.read();
        let synced = match (heights.indexed, heights.synced) {
            (Some(indexed), Some(target)) => indexed == target,
            _ => false,
        };
        SyncStatus {
            current: heights.indexed,
            target: heights.synced,
            synced,
        }
    }

    /// Commits one block: balance upserts, block metadata, unsigned-hash
    /// markers and the height cursor, in a single atomic write.
    pub fn put_block(&self, state: &BlockState) -> Result<(), StoreError> {
        let block_data = bincode::serialize(&state.block)?;
        let height_le = state.height.to_le_bytes();
        let mut batch = WriteBatch::default();
        for change in &state.changes {
            let prev = self.latest_balance_before(&change.key, &change.prefix)?;
            let next = prev + &change.diff;
            if next.sign() == Sign::Minus {
                return Err(StoreError::Consistency(format!(
                    "balance under key {} would become negative",
                    hex::encode(&change.key)
                )));
            }
            batch.put(&change.key, bigint_to_be_bytes(&next));
        }
        batch.put(keys::block_key(state.height), &block_data);
        batch.put(keys::hash_to_height_key(&state.hash), height_le);
        batch.put(keys::height_to_hash_key(state.height), state.hash.0);
        for hash in &state.unsigned_hashes {
            batch.put(keys::unsigned_tx_key(hash), b"");
        }
        batch.put(HEIGHT_KEY, height_le);
        self.db.write(batch)?;
        let mut heights = self.heights.write();
        heights.indexed = Some(state.height);
        heights.synced = Some(state.synced);
        Ok(())
    }

    /// The balance of an account/contract pair at the block whose encoded
    /// height is `height_enc`: a reverse seek to the most recent entry at
    /// or before that height.
    pub fn get_balance(
        &self,
        acct: &Address,
        contract: &Address,
        height_enc: &[u8],
    ) -> Result<BigInt, StoreError> {
        let prefix = keys::account_prefix(acct, contract);
        let key = keys::account_key(&prefix, height_enc);
        let mut iter = self
            .db
            .iterator(IteratorMode::From(&key, Direction::Reverse));
        if let Some(entry) = iter.next() {
            let (found, value) = entry?;
            if found.starts_with(&prefix) {
                return Ok(bigint_from_be_bytes(&value));
            }
        }
        Ok(BigInt::from(0))
    }

    /// Resolves a block reference, cross-checking any redundant component,
    /// optionally loading the stored block body.
    pub fn get_block_info(
        &self,
        id: &BlockId,
        with_block: bool,
    ) -> Result<BlockInfo, StoreError> {
        let (height, hash) = if id.by_height {
            let raw = self
                .db
                .get(keys::height_to_hash_key(id.height))?
                .ok_or(StoreError::UnknownBlockIndex)?;
            let hash = Hash256::parse_from_bytes(&raw)
                .map_err(|err| StoreError::Consistency(err.to_string()))?;
            if let Some(expected) = id.hash {
                if expected != hash {
                    return Err(StoreError::InvalidBlockIdentifier);
                }
            }
            (id.height, hash)
        } else {
            let hash = id.hash.ok_or(StoreError::InvalidBlockIdentifier)?;
            let raw = self
                .db
                .get(keys::hash_to_height_key(&hash))?
                .ok_or(StoreError::UnknownBlockHash)?;
            (decode_height_value(&raw)?, hash)
        };
        let block = if with_block {
            let raw = self
                .db
                .get(keys::block_key(height))?
                .ok_or(StoreError::UnknownBlockIndex)?;
            Some(bincode::deserialize(&raw)?)
        } else {
            None
        };
        Ok(BlockInfo {
            block,
            hash,
            height,
            height_enc: encode_height(height),
        })
    }

    /// Whether the unsigned-hash set contains the given hash.
    pub fn contains_unsigned_tx_hash(&self, hash: &Hash256) -> Result<bool, StoreError> {
        Ok(self.db.get(keys::unsigned_tx_key(hash))?.is_some())
    }

    /// Scans the `a`-key space in reverse for the unique account/contract
    /// pairs, each with its most recent key. Used by the validation sweep.
    pub fn unique_account_pairs(&self) -> Result<(Vec<AccountEntry>, usize), StoreError> {
        let mut entries = Vec::new();
        let mut ident: Vec<u8> = Vec::new();
        let mut total = 0usize;
        for entry in self
            .db
            .iterator(IteratorMode::From(b"b", Direction::Reverse))
        {
            let (key, _) = entry?;
            if key.first() != Some(&keys::ACCOUNT_TAG) {
                break;
            }
            total += 1;
            let (acct, contract, height_at) = keys::split_account_key(&key)?;
            if key[..height_at] == ident[..] {
                continue;
            }
            ident = key[..height_at].to_vec();
            entries.push(AccountEntry {
                acct,
                contract,
                key: key.to_vec(),
                native: contract == ont_core::address::ONT || contract == ont_core::address::ONG,
            });
        }
        Ok((entries, total))
    }

    /// Reads the stored balance under a specific `a`-key.
    pub fn balance_at_key(&self, key: &[u8]) -> Result<BigInt, StoreError> {
        let raw = self
            .db
            .get(key)?
            .ok_or_else(|| StoreError::Consistency(format!("missing key {}", hex::encode(key))))?;
        Ok(bigint_from_be_bytes(&raw))
    }

    fn latest_balance_before(&self, key: &[u8], prefix: &[u8]) -> Result<BigInt, StoreError> {
        for entry in self
            .db
            .iterator(IteratorMode::From(key, Direction::Reverse))
        {
            let (found, value) = entry?;
            if found.as_ref() == key {
                // Re-indexing the same block overwrites its own entry.
                continue;
            }
            if !found.starts_with(prefix) {
                break;
            }
            return Ok(bigint_from_be_bytes(&value));
        }
        Ok(BigInt::from(0))
    }
}

fn decode_height_value(raw: &[u8]) -> Result<u32, StoreError> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| StoreError::Consistency(format!("malformed height value {}", hex::encode(raw))))?;
    Ok(u32::from_le_bytes(bytes))
}
