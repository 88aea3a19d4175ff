//! Hooks other modules call into the coordinator through.
//!
//! Both traits come with no-op defaults so a host can wire any subset of them.

use appchain_types::consensus_key::ConsensusKey;
use cosmwasm_std::{Env, Event, Storage};

/// Called by the epochs module at epoch boundaries.
pub trait EpochHooks {
    /// An epoch of `identifier` is about to start.
    fn before_epoch_start(
        &mut self,
        _storage: &mut dyn Storage,
        _env: &Env,
        _identifier: &str,
        _epoch_number: u64,
    ) -> Vec<Event> {
        Vec::new()
    }

    /// Epoch `epoch_number` of `identifier` ended.
    fn after_epoch_end(
        &mut self,
        _storage: &mut dyn Storage,
        _env: &Env,
        _identifier: &str,
        _epoch_number: u64,
    ) -> Vec<Event> {
        Vec::new()
    }
}

/// Called by the restaking module when an operator's consensus key on a chain changes.
pub trait OperatorHooks {
    /// `operator` replaced `old_key` with `new_key` on `chain_id`.
    fn after_operator_key_replaced(
        &mut self,
        _storage: &mut dyn Storage,
        _chain_id: &str,
        _operator: &str,
        _old_key: &ConsensusKey,
        _new_key: &ConsensusKey,
    ) {
    }

    /// `operator` removed `key` from `chain_id`, typically by opting out.
    fn after_operator_key_removed(
        &mut self,
        _storage: &mut dyn Storage,
        _chain_id: &str,
        _operator: &str,
        _key: &ConsensusKey,
    ) {
    }
}
