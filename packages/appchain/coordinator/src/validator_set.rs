//! Validator-set diffing at epoch boundaries and transmission of the queued change-sets.

use std::collections::BTreeMap;

use appchain_types::{
    handshake::COORDINATOR_PORT_ID,
    host::{timeout_after, IbcHost},
    packet::{encode, ValidatorSetChangePacketData},
    params::EpochsDuration,
    validator::{power_then_address, sort_updates, SubscriberValidator, ValidatorUpdate},
    HostError,
};
use cosmwasm_std::{Env, Event, Storage};

use crate::{
    error::CoordinatorError,
    keepers::{EpochsKeeper, OperatorPower, RestakingKeeper},
    state::{self, EpochPosition},
    Coordinator,
};

/// The operators that make up a validator set: positive power only, in canonical order,
/// at most `max_validators` of them.
#[must_use]
pub fn select_validators(
    mut operators: Vec<OperatorPower>,
    max_validators: u32,
) -> Vec<OperatorPower> {
    operators.retain(|op| op.power > 0);
    operators.sort_by(|a, b| {
        power_then_address(
            (a.power, &a.consensus_key.address()),
            (b.power, &b.consensus_key.address()),
        )
    });
    operators.truncate(usize::try_from(max_validators).unwrap_or(usize::MAX));
    operators
}

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Diffs the current operator set of `chain_id` against the stored validator records,
    /// brings the records up to date and returns the updates in canonical order.
    /// # Errors
    /// Returns an error if a record cannot be decoded or encoded.
    pub fn compute_validator_updates(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
        max_validators: u32,
    ) -> Result<Vec<ValidatorUpdate>, CoordinatorError> {
        let active = select_validators(
            self.restaking.active_operators(storage, chain_id),
            max_validators,
        );
        let mut stored: BTreeMap<_, _> = state::subscriber_validators(storage, chain_id)?
            .into_iter()
            .map(|v| (v.cons_address, v))
            .collect();

        let mut updates = Vec::new();
        for op in active {
            let address = op.consensus_key.address();
            match stored.remove(&address) {
                Some(record) if record.power == op.power => {}
                Some(_) => {
                    let record = SubscriberValidator::new(op.consensus_key, op.power);
                    state::set_subscriber_validator(storage, chain_id, &record)?;
                    updates.push(record.to_update());
                }
                None => {
                    let record = SubscriberValidator::new(op.consensus_key, op.power);
                    state::set_subscriber_validator(storage, chain_id, &record)?;
                    state::set_operator_cons_addr(storage, chain_id, &op.operator, &address);
                    updates.push(record.to_update());
                }
            }
        }

        for (address, record) in stored {
            state::remove_subscriber_validator(storage, chain_id, &address);
            updates.push(ValidatorUpdate::new(record.pub_key, 0));
        }

        sort_updates(&mut updates);
        Ok(updates)
    }

    /// Diffs `chain_id` and appends the resulting change-set, with a fresh valset update id
    /// and the pending slash acknowledgements, to its queue. Returns the new id.
    /// # Errors
    /// Returns an error if the chain is not registered or its state cannot be decoded.
    pub fn queue_validator_updates(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
    ) -> Result<u64, CoordinatorError> {
        let registration = state::chain_registration(storage, chain_id)?
            .ok_or_else(|| CoordinatorError::UnknownSubscriberChain(chain_id.to_string()))?;

        let updates =
            self.compute_validator_updates(storage, chain_id, registration.max_validators)?;
        let vsc_id = state::next_vsc_id(storage, chain_id)?;
        let slash_acks = state::take_slash_acks(storage, chain_id)?;

        tracing::debug!(
            %chain_id,
            vsc_id,
            updates = updates.len(),
            slash_acks = slash_acks.len(),
            "queueing validator set change"
        );
        state::append_pending_vsc_packet(
            storage,
            chain_id,
            ValidatorSetChangePacketData::new(updates, vsc_id, slash_acks),
        )?;
        Ok(vsc_id)
    }

    /// Queues a change-set for every chain following `identifier` that has a client.
    pub fn queue_validator_updates_for_epoch(&self, storage: &mut dyn Storage, identifier: &str) {
        let registrations = match state::chain_registrations(storage) {
            Ok(registrations) => registrations,
            Err(err) => {
                tracing::error!(%err, "failed to load chain registrations");
                return;
            }
        };

        for registration in registrations
            .iter()
            .filter(|r| r.epoch_identifier == identifier)
        {
            let chain_id = registration.chain_id.as_str();
            if state::chain_to_client(storage, chain_id).is_none() {
                continue;
            }
            if let Err(err) = self.queue_validator_updates(storage, chain_id) {
                tracing::error!(%chain_id, %err, "failed to queue validator updates");
            }
        }
    }

    /// Sends the queued change-sets of every chain with an established channel, oldest
    /// first.
    ///
    /// An expired subscriber client leaves the rest of that chain's queue for the next
    /// block. Any other transport failure stops the chain.
    pub fn send_queued_validator_updates(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for (chain_id, channel_id) in state::all_chain_channels(storage) {
            match self.send_chain_queue(storage, env, &chain_id, &channel_id) {
                Ok(()) => {}
                Err(CoordinatorError::Host(HostError::ClientNotActive(client_id))) => {
                    tracing::info!(
                        %chain_id,
                        %client_id,
                        "subscriber client is not active, deferring transmission"
                    );
                }
                Err(err) => {
                    tracing::error!(%chain_id, %err, "sending validator updates failed");
                    events.extend(self.stop_subscriber_chain_logged(
                        storage,
                        env,
                        &chain_id,
                        &err.to_string(),
                    ));
                }
            }
        }
        events
    }

    fn send_chain_queue(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
        channel_id: &str,
    ) -> Result<(), CoordinatorError> {
        let params = state::params(storage)?;
        let mut packets = state::pending_vsc_packets(storage, chain_id)?.into_iter();

        while let Some(packet) = packets.next() {
            let sent = self.ibc.send_packet(
                storage,
                COORDINATOR_PORT_ID,
                channel_id,
                timeout_after(env.block.time, params.ibc_timeout_period),
                encode(&packet)?,
            );
            if let Err(err) = sent {
                let unsent: Vec<_> = std::iter::once(packet).chain(packets).collect();
                state::set_pending_vsc_packets(storage, chain_id, &unsent)?;
                return Err(err.into());
            }

            let vsc_id = packet.valset_update_id;
            self.record_vsc_timeout(storage, chain_id, vsc_id, &params.vsc_timeout_period);
            tracing::debug!(%chain_id, vsc_id, "sent validator set change");
        }

        state::set_pending_vsc_packets(storage, chain_id, &[])
    }

    fn record_vsc_timeout(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
        vsc_id: u64,
        period: &EpochsDuration,
    ) {
        let Some(epoch) = self.epochs.epoch_info(storage, &period.epoch_identifier) else {
            tracing::error!(
                %chain_id,
                vsc_id,
                epoch_identifier = %period.epoch_identifier,
                "unknown epoch identifier, not recording vsc timeout"
            );
            return;
        };
        let position = EpochPosition::new(
            &period.epoch_identifier,
            epoch.current_epoch.saturating_add(period.epochs),
        );
        if let Err(err) = state::set_vsc_timeout(storage, chain_id, vsc_id, &position) {
            tracing::error!(%chain_id, vsc_id, %err, "failed to record vsc timeout");
        }
    }

    /// End-of-block processing: transmit the queued change-sets.
    pub fn end_block(&mut self, storage: &mut dyn Storage, env: &Env) -> Vec<Event> {
        self.send_queued_validator_updates(storage, env)
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::test_utils::consensus_key;
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::test_utils::{coordinator_with_chain, operator, TestCoordinator, CHAIN_ID};

    fn powers(updates: &[ValidatorUpdate]) -> Vec<(u8, i64)> {
        updates
            .iter()
            .map(|u| {
                let seed = (1..=u8::MAX)
                    .find(|s| consensus_key(*s) == u.pub_key)
                    .unwrap_or(0);
                (seed, u.power)
            })
            .collect()
    }

    #[test]
    fn selection_drops_non_positive_and_caps() {
        let selected = select_validators(
            vec![
                operator(3, 10),
                operator(1, 100),
                operator(4, 0),
                operator(2, 50),
                operator(5, -1),
            ],
            2,
        );
        let powers: Vec<i64> = selected.iter().map(|o| o.power).collect();
        assert_eq!(powers, vec![100, 50]);
    }

    #[test]
    fn diff_is_idempotent() {
        let mut storage = MockStorage::new();
        let coordinator: TestCoordinator = coordinator_with_chain(&mut storage, &mock_env());

        let first = coordinator
            .compute_validator_updates(&mut storage, CHAIN_ID, 10)
            .unwrap();
        assert!(first.is_empty(), "bootstrap already recorded the operator set");

        let second = coordinator
            .compute_validator_updates(&mut storage, CHAIN_ID, 10)
            .unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn diff_emits_updates_additions_and_removals() {
        let mut storage = MockStorage::new();
        let mut coordinator = coordinator_with_chain(&mut storage, &mock_env());

        coordinator.restaking.set_power(CHAIN_ID, 1, 0);
        coordinator.restaking.set_power(CHAIN_ID, 2, 70);
        coordinator.restaking.set_power(CHAIN_ID, 9, 5);

        let updates = coordinator
            .compute_validator_updates(&mut storage, CHAIN_ID, 10)
            .unwrap();
        assert_eq!(powers(&updates), vec![(2, 70), (9, 5), (1, 0)]);

        let address = consensus_key(1).address();
        assert_eq!(
            state::subscriber_validator(&storage, CHAIN_ID, &address).unwrap(),
            None
        );
        assert_eq!(
            state::operator_for_cons_addr(&storage, CHAIN_ID, &consensus_key(9).address()).as_deref(),
            Some("operator-9")
        );
    }

    #[test]
    fn vsc_ids_increase_even_without_updates() {
        let mut storage = MockStorage::new();
        let coordinator = coordinator_with_chain(&mut storage, &mock_env());

        for expected in 1..=3 {
            assert_eq!(
                coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap(),
                expected
            );
        }
        let ids: Vec<u64> = state::pending_vsc_packets(&storage, CHAIN_ID)
            .unwrap()
            .iter()
            .map(|p| p.valset_update_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn expired_client_keeps_the_queue() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_chain(&mut storage, &env);
        state::set_chain_channel(&mut storage, CHAIN_ID, "channel-0");
        coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap();
        coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap();

        coordinator.ibc.send_error = Some(HostError::ClientNotActive("07-tendermint-0".into()));
        coordinator.end_block(&mut storage, &env);
        assert_eq!(state::pending_vsc_packets(&storage, CHAIN_ID).unwrap().len(), 2);
        assert!(state::chain_to_client(&storage, CHAIN_ID).is_some());

        coordinator.ibc.send_error = None;
        coordinator.end_block(&mut storage, &env);
        assert!(state::pending_vsc_packets(&storage, CHAIN_ID).unwrap().is_empty());
        assert_eq!(coordinator.ibc.sent_packets.len(), 2);
        assert_eq!(
            state::vsc_timeouts(&storage, CHAIN_ID)
                .unwrap()
                .iter()
                .map(|(id, _)| *id)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn other_send_failures_stop_the_chain() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator_with_chain(&mut storage, &env);
        state::set_chain_channel(&mut storage, CHAIN_ID, "channel-0");
        coordinator.queue_validator_updates(&mut storage, CHAIN_ID).unwrap();

        coordinator.ibc.send_error = Some(HostError::Other("channel closed".into()));
        coordinator.end_block(&mut storage, &env);

        assert_eq!(state::chain_to_client(&storage, CHAIN_ID), None);
        assert!(state::pending_vsc_packets(&storage, CHAIN_ID).unwrap().is_empty());
        assert_eq!(state::stopped_height(&storage, CHAIN_ID), Some(env.block.height));
    }
}
