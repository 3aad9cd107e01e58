//! The gas-verify rule.
//!
//! At most one transfer per transaction is the gas fee: the first ONG
//! transfer to the governance address whose amount matches the consumed
//! gas, provided the transaction's payer is the sender. On failed
//! transactions, everything after the matched gas transfer is discarded.

use ont_core::{address, Address};

/// Per-transaction state for the gas-verify rule.
#[derive(Default)]
pub struct GasTracker {
    verified: bool,
}

impl GasTracker {
    /// Creates a tracker for a fresh transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a gas transfer has been matched for this transaction.
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Applies the rule to one decoded transfer. Returns `None` when the
    /// transfer must be dropped, otherwise the `is_gas` tag to record.
    pub fn check(
        &mut self,
        contract: &Address,
        payer: &Address,
        from: &Address,
        failed: bool,
        gas_candidate: bool,
    ) -> Option<bool> {
        if failed {
            if *contract != address::ONG {
                return None;
            }
            if self.verified {
                return None;
            }
        }
        if self.verified {
            return Some(false);
        }
        if gas_candidate {
            if payer == from {
                self.verified = true;
                return Some(true);
            }
            return Some(false);
        }
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYER: Address = Address([0x11; 20]);
    const OTHER: Address = Address([0x22; 20]);

    #[test]
    fn first_matching_transfer_is_gas() {
        let mut tracker = GasTracker::new();
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &PAYER, false, true),
            Some(true)
        );
        // A second candidate in the same transaction is not gas.
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &PAYER, false, true),
            Some(false)
        );
    }

    #[test]
    fn payer_mismatch_is_not_gas() {
        let mut tracker = GasTracker::new();
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &OTHER, false, true),
            Some(false)
        );
        assert!(!tracker.verified());
    }

    #[test]
    fn failed_tx_drops_non_ong_events() {
        let mut tracker = GasTracker::new();
        assert_eq!(tracker.check(&address::ONT, &PAYER, &PAYER, true, false), None);
    }

    #[test]
    fn failed_tx_drops_transfers_after_gas() {
        let mut tracker = GasTracker::new();
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &PAYER, true, true),
            Some(true)
        );
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &PAYER, true, false),
            None
        );
    }

    #[test]
    fn successful_tx_keeps_transfers_after_gas() {
        let mut tracker = GasTracker::new();
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &PAYER, false, true),
            Some(true)
        );
        assert_eq!(
            tracker.check(&address::ONG, &PAYER, &OTHER, false, false),
            Some(false)
        );
    }
}
