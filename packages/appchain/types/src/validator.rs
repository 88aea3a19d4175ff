//! Validator updates and the validator records both chains keep.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tendermint_proto::abci::ValidatorUpdate as AbciValidatorUpdate;

use crate::consensus_key::{ConsAddr, ConsensusKey};

/// A change of one validator's voting power. Power zero removes the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// Consensus public key of the validator
    pub pub_key: ConsensusKey,
    /// New voting power
    pub power: i64,
}

impl ValidatorUpdate {
    /// Creates an update.
    #[must_use]
    pub fn new(pub_key: ConsensusKey, power: i64) -> Self {
        Self { pub_key, power }
    }

    /// Consensus address of the validator.
    #[must_use]
    pub const fn address(&self) -> ConsAddr {
        self.pub_key.address()
    }

    /// The update in the shape the consensus engine consumes.
    #[must_use]
    pub fn to_abci(&self) -> AbciValidatorUpdate {
        AbciValidatorUpdate {
            pub_key: Some(self.pub_key.to_abci()),
            power: self.power,
        }
    }
}

/// A validator as recorded in state, keyed by its consensus address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberValidator {
    /// Consensus address, the record's key
    pub cons_address: ConsAddr,
    /// Current voting power
    pub power: i64,
    /// Consensus public key
    pub pub_key: ConsensusKey,
}

impl SubscriberValidator {
    /// Creates a record for the given key.
    #[must_use]
    pub fn new(pub_key: ConsensusKey, power: i64) -> Self {
        Self {
            cons_address: pub_key.address(),
            power,
            pub_key,
        }
    }

    /// The update that would (re)create this validator with its current power.
    #[must_use]
    pub fn to_update(&self) -> ValidatorUpdate {
        ValidatorUpdate::new(self.pub_key.clone(), self.power)
    }
}

/// Canonical validator ordering: descending power, then ascending consensus address.
#[must_use]
pub fn power_then_address(
    (power_a, addr_a): (i64, &ConsAddr),
    (power_b, addr_b): (i64, &ConsAddr),
) -> Ordering {
    power_b.cmp(&power_a).then_with(|| addr_a.cmp(addr_b))
}

/// Sorts updates into the canonical order so that independently computed change-sets
/// serialize identically.
pub fn sort_updates(updates: &mut [ValidatorUpdate]) {
    updates.sort_by(|a, b| {
        power_then_address((a.power, &a.address()), (b.power, &b.address()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::consensus_key;

    #[test]
    fn sorts_by_power_then_address() {
        let keys: Vec<_> = (1..=4).map(consensus_key).collect();
        let mut updates = vec![
            ValidatorUpdate::new(keys[0].clone(), 10),
            ValidatorUpdate::new(keys[1].clone(), 50),
            ValidatorUpdate::new(keys[2].clone(), 10),
            ValidatorUpdate::new(keys[3].clone(), 0),
        ];
        sort_updates(&mut updates);

        assert_eq!(updates[0].power, 50);
        assert_eq!(updates[1].power, 10);
        assert_eq!(updates[2].power, 10);
        assert!(updates[1].address() < updates[2].address());
        assert_eq!(updates[3].power, 0);
    }

    #[test]
    fn abci_update_carries_raw_key() {
        let key = consensus_key(9);
        let abci = ValidatorUpdate::new(key.clone(), 42).to_abci();
        assert_eq!(abci.power, 42);
        assert_eq!(abci.pub_key, Some(key.to_abci()));
    }
}
