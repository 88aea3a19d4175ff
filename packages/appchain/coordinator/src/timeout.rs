//! Epoch-driven timeouts and the pruning of retired consensus keys.

use std::collections::BTreeSet;

use appchain_types::{consensus_key::ConsensusKey, host::IbcHost};
use cosmwasm_std::{Env, Event, Storage};

use crate::{
    error::CoordinatorError,
    hooks::OperatorHooks,
    keepers::{EpochsKeeper, RestakingKeeper},
    state, Coordinator,
};

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Stops every chain of `identifier` whose handshake did not complete by
    /// `epoch_number`.
    pub fn sweep_init_timeouts(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        identifier: &str,
        epoch_number: u64,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for (position, chain_id) in state::due_init_timeouts(storage, identifier, epoch_number) {
            state::remove_init_timeout_index(storage, &position, &chain_id);
            match state::init_timeout(storage, &chain_id) {
                Ok(Some(pending)) if pending == position => {
                    tracing::warn!(
                        %chain_id,
                        epoch_identifier = %identifier,
                        epoch_number,
                        "subscriber handshake timed out"
                    );
                    events.extend(self.stop_subscriber_chain_logged(
                        storage,
                        env,
                        &chain_id,
                        "handshake timed out",
                    ));
                }
                Ok(_) => {}
                Err(err) => tracing::error!(%chain_id, %err, "failed to load init timeout"),
            }
        }
        events
    }

    /// Stops every chain of `identifier` whose oldest unmatured change-set timed out by
    /// `epoch_number`, and drops the index entries that no longer point at one.
    pub fn sweep_vsc_timeouts(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        identifier: &str,
        epoch_number: u64,
    ) -> Vec<Event> {
        let mut chains = BTreeSet::new();
        for (position, chain_id) in state::due_vsc_timeouts(storage, identifier, epoch_number) {
            state::remove_vsc_timeout_index(storage, &position, &chain_id);
            chains.insert(chain_id);
        }

        let mut events = Vec::new();
        for chain_id in chains {
            let oldest = match state::vsc_timeouts(storage, &chain_id) {
                Ok(timeouts) => timeouts.into_iter().next(),
                Err(err) => {
                    tracing::error!(%chain_id, %err, "failed to load vsc timeouts");
                    continue;
                }
            };
            let Some((vsc_id, timeout)) = oldest else {
                continue;
            };
            if timeout.epoch_identifier == identifier && timeout.epoch_number <= epoch_number {
                tracing::warn!(%chain_id, vsc_id, epoch_number, "change-set did not mature in time");
                events.extend(self.stop_subscriber_chain_logged(
                    storage,
                    env,
                    &chain_id,
                    &format!("valset update {vsc_id} timed out"),
                ));
            }
        }
        events
    }
}

/// Retires `key` of `operator` on `chain_id`. A key that still validates the chain keeps
/// its slashing mapping until the change-set removing it matures; any other key loses it
/// at once.
fn retire_consensus_key(
    storage: &mut dyn Storage,
    chain_id: &str,
    operator: &str,
    key: &ConsensusKey,
) -> Result<(), CoordinatorError> {
    let address = key.address();
    if state::subscriber_validator(storage, chain_id, &address)?.is_some() {
        let vsc_id = state::vsc_id_for_chain(storage, chain_id).saturating_add(1);
        tracing::debug!(%chain_id, %operator, %address, vsc_id, "scheduling consensus key pruning");
        state::append_cons_addr_to_prune(storage, chain_id, vsc_id, address)
    } else {
        tracing::debug!(%chain_id, %operator, %address, "pruning inactive consensus key");
        state::remove_operator_for_cons_addr(storage, chain_id, &address);
        Ok(())
    }
}

impl<R, E, H> OperatorHooks for Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    fn after_operator_key_replaced(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
        operator: &str,
        old_key: &ConsensusKey,
        _new_key: &ConsensusKey,
    ) {
        if let Err(err) = retire_consensus_key(storage, chain_id, operator, old_key) {
            tracing::error!(%chain_id, %operator, %err, "failed to retire replaced consensus key");
        }
    }

    fn after_operator_key_removed(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
        operator: &str,
        key: &ConsensusKey,
    ) {
        if let Err(err) = retire_consensus_key(storage, chain_id, operator, key) {
            tracing::error!(%chain_id, %operator, %err, "failed to retire removed consensus key");
        }
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::{params::DEFAULT_TIMEOUT_EPOCH_IDENTIFIER, test_utils::consensus_key};
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::{
        hooks::EpochHooks,
        test_utils::{coordinator_with_chain, coordinator_with_channel, CHAIN_ID, WEEK_EPOCH},
    };

    const WEEK: &str = DEFAULT_TIMEOUT_EPOCH_IDENTIFIER;

    #[test]
    fn init_timeout_fires_exactly_once() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_chain(&mut storage, &env);
        let deadline = WEEK_EPOCH + 4;

        assert!(coordinator
            .after_epoch_end(&mut storage, &env, WEEK, deadline - 1)
            .is_empty());
        assert!(state::chain_to_client(&storage, CHAIN_ID).is_some());

        let events = coordinator.after_epoch_end(&mut storage, &env, WEEK, deadline);
        assert_eq!(events.len(), 1);
        assert_eq!(state::chain_to_client(&storage, CHAIN_ID), None);
        assert!(!coordinator.restaking.is_registered(CHAIN_ID));

        assert!(coordinator
            .after_epoch_end(&mut storage, &env, WEEK, deadline + 1)
            .is_empty());
        assert!(state::due_init_timeouts(&storage, WEEK, deadline + 1).is_empty());
    }

    #[test]
    fn established_chain_ignores_its_init_timeout() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_channel(&mut storage, &env);

        coordinator.after_epoch_end(&mut storage, &env, WEEK, WEEK_EPOCH + 4);
        assert!(state::chain_to_channel(&storage, CHAIN_ID).is_some());
    }

    #[test]
    fn unmatured_change_set_stops_the_chain() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_channel(&mut storage, &env);
        coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap();
        coordinator.end_block(&mut storage, &env);
        let deadline = WEEK_EPOCH + 12;

        coordinator.sweep_vsc_timeouts(&mut storage, &env, WEEK, deadline - 1);
        assert!(state::chain_to_client(&storage, CHAIN_ID).is_some());

        coordinator.sweep_vsc_timeouts(&mut storage, &env, WEEK, deadline);
        assert_eq!(state::chain_to_client(&storage, CHAIN_ID), None);
    }

    #[test]
    fn matured_change_set_leaves_a_stale_index_entry() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_channel(&mut storage, &env);
        coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap();
        coordinator.end_block(&mut storage, &env);
        assert!(state::remove_vsc_timeout(&mut storage, CHAIN_ID, 1));

        let deadline = WEEK_EPOCH + 12;
        assert!(coordinator
            .sweep_vsc_timeouts(&mut storage, &env, WEEK, deadline)
            .is_empty());
        assert!(state::chain_to_client(&storage, CHAIN_ID).is_some());
        assert!(state::due_vsc_timeouts(&storage, WEEK, deadline).is_empty());
    }

    #[test]
    fn active_key_is_pruned_on_maturity() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_chain(&mut storage, &env);
        let old = consensus_key(1);

        coordinator.after_operator_key_replaced(
            &mut storage,
            CHAIN_ID,
            "operator-1",
            &old,
            &consensus_key(11),
        );

        assert_eq!(
            state::maturity_vsc_id_for_cons_addr(&storage, CHAIN_ID, &old.address()),
            Some(1)
        );
        assert_eq!(
            state::operator_for_cons_addr(&storage, CHAIN_ID, &old.address()).as_deref(),
            Some("operator-1")
        );
    }

    #[test]
    fn inactive_key_is_pruned_at_once() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_chain(&mut storage, &env);
        let stale = consensus_key(12);
        state::set_operator_cons_addr(&mut storage, CHAIN_ID, "operator-12", &stale.address());

        coordinator.after_operator_key_removed(&mut storage, CHAIN_ID, "operator-12", &stale);

        assert_eq!(state::operator_for_cons_addr(&storage, CHAIN_ID, &stale.address()), None);
        assert_eq!(state::cons_addr_for_operator(&storage, CHAIN_ID, "operator-12"), None);
        assert!(state::all_cons_addrs_to_prune(&storage, CHAIN_ID).unwrap().is_empty());
    }
}
