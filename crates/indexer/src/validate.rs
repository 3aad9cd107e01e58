//! The store validation sweep.
//!
//! Cross-checks every indexed account balance against a `balanceOf`
//! pre-execution on the live chain. Native mismatches are fatal; OEP4
//! mismatches only warn, since token contracts may apply their own
//! accounting outside transfer events.

use crate::IndexError;
use ont_node_client::NodeClient;
use ont_store::Store;
use tracing::{info, warn};

/// Validates the fully indexed store against the live chain.
pub async fn validate_store(store: &Store, node: &dyn NodeClient) -> Result<(), IndexError> {
    let height = store.indexed_height();
    let latest = node.current_height().await?;
    if height != latest {
        return Err(IndexError::Validation(format!(
            "indexed height {height} does not match latest synced block {latest}"
        )));
    }
    info!(height, "Validating store");
    info!("Finding unique account/contract combinations");
    let (entries, total) = store.unique_account_pairs()?;
    info!(
        unique = entries.len(),
        total, "Found unique account/contract combinations"
    );
    for (i, entry) in entries.iter().enumerate() {
        if i % 100 == 0 {
            info!(validated = i, of = entries.len(), "Validating balances");
        }
        let on_chain = node
            .balance_of(&entry.acct, &entry.contract, entry.native)
            .await?;
        let stored = store.balance_at_key(&entry.key)?;
        if stored != on_chain {
            let detail = format!(
                "balance of account {} for {} does not match: stored ({stored}), on chain ({on_chain})",
                entry.acct.to_base58(),
                entry.contract.to_hex_string(),
            );
            if entry.native {
                return Err(IndexError::Validation(detail));
            }
            warn!("Validation failed for non-native OEP4 token: {detail}");
        }
    }
    info!("Successfully validated all balances");
    Ok(())
}
