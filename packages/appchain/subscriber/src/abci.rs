//! Block hooks of the subscriber module.

use appchain_types::{
    events::{ATTRIBUTE_VALSET_UPDATE_ID, EVENT_TYPE_VSC_MATURED},
    handshake::SUBSCRIBER_PORT_ID,
    host::{timeout_after, IbcHost},
    packet::{encode, SubscriberPacketData, VscMaturedPacketData},
    HostError,
};
use cosmwasm_std::{Env, Event, Storage};
use tendermint_proto::abci::ValidatorUpdate as AbciValidatorUpdate;

use crate::{
    distribution::FeePool, error::SubscriberError, historical::track_historical_info, state,
    staking::StakingKeeper, Subscriber,
};

/// What end-of-block hands back to the host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndBlockResponse {
    /// Validator changes for the consensus engine
    pub validator_updates: Vec<AbciValidatorUpdate>,
    /// Events emitted during the block end
    pub events: Vec<Event>,
}

/// Beginning-of-block processing: record the validator set of this height.
/// # Errors
/// Returns an error if the historical entry cannot be stored.
pub fn begin_block(storage: &mut dyn Storage, env: &Env) -> Result<(), SubscriberError> {
    track_historical_info(storage, env)
}

/// Queues a maturity notice for every change-set whose maturity time has passed and
/// forgets the height entries older than it.
/// # Errors
/// Returns an error if the queue cannot be stored.
pub fn queue_vsc_matured_packets(storage: &mut dyn Storage, env: &Env) -> Result<Vec<Event>, SubscriberError> {
    let mut events = Vec::new();
    for packet in state::maturing_packets(storage) {
        if packet.maturity_time > env.block.time {
            continue;
        }
        let data = VscMaturedPacketData {
            valset_update_id: packet.vsc_id,
        };
        data.validate_basic()?;
        state::append_pending_packet(storage, SubscriberPacketData::VscMatured(data))?;
        state::remove_packet_maturity_time(storage, packet.vsc_id);
        state::prune_height_valset_update_ids(storage, packet.vsc_id);

        tracing::debug!(vsc_id = packet.vsc_id, "change-set matured");
        events.push(
            Event::new(EVENT_TYPE_VSC_MATURED)
                .add_attribute(ATTRIBUTE_VALSET_UPDATE_ID, packet.vsc_id.to_string()),
        );
    }
    Ok(events)
}

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Sends the queued packets to the coordinator, oldest first. Nothing is sent before
    /// the coordinator channel is established.
    ///
    /// An expired coordinator client leaves the rest of the queue for the next block.
    /// # Errors
    /// Returns any other transport failure, with the unsent packets kept.
    pub fn send_pending_packets(&mut self, storage: &mut dyn Storage, env: &Env) -> Result<(), SubscriberError> {
        let Some(channel_id) = state::coordinator_channel(storage) else {
            return Ok(());
        };
        let params = state::params(storage)?;
        let mut packets = state::pending_packets(storage)?.into_iter();

        while let Some(packet) = packets.next() {
            let sent = self.ibc.send_packet(
                storage,
                SUBSCRIBER_PORT_ID,
                &channel_id,
                timeout_after(env.block.time, params.ibc_timeout_period),
                encode(&packet)?,
            );
            match sent {
                Ok(sequence) => tracing::debug!(%channel_id, sequence, "sent packet to the coordinator"),
                Err(err) => {
                    let unsent: Vec<_> = std::iter::once(packet).chain(packets).collect();
                    state::set_pending_packets(storage, &unsent)?;
                    if let HostError::ClientNotActive(client_id) = &err {
                        tracing::info!(
                            %client_id,
                            pending = unsent.len(),
                            "coordinator client is not active, deferring transmission"
                        );
                        return Ok(());
                    }
                    return Err(err.into());
                }
            }
        }

        state::set_pending_packets(storage, &[])
    }

    /// End-of-block processing: queue maturity notices, send the queue, split fees and
    /// apply the validator changes received in this block.
    /// # Errors
    /// Returns an error if the queue cannot be sent or the validator set cannot be
    /// updated. Fee distribution failures are logged.
    pub fn end_block(&mut self, storage: &mut dyn Storage, env: &Env) -> Result<EndBlockResponse, SubscriberError> {
        let mut events = queue_vsc_matured_packets(storage, env)?;
        self.send_pending_packets(storage, env)?;

        match self.distribute_fees(storage, env) {
            Ok(distribution) => events.extend(distribution),
            Err(err) => tracing::error!(%err, "fee distribution failed"),
        }

        let applied = self.apply_and_return_validator_set_updates(storage)?;
        if !applied.is_empty() {
            tracing::info!(changes = applied.len(), "applied validator set changes");
        }
        Ok(EndBlockResponse {
            validator_updates: applied.iter().map(|u| u.to_abci()).collect(),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::{
        packet::{decode, ValidatorSetChangePacketData},
        test_utils::consensus_key,
        validator::ValidatorUpdate,
    };
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::test_utils::{subscriber_with_channel, subscriber_with_genesis, CHANNEL_ID};

    #[test]
    fn matured_change_sets_are_reported() {
        let mut storage = MockStorage::new();
        let mut env = mock_env();
        let mut subscriber = subscriber_with_channel(&mut storage, &env);
        let data = ValidatorSetChangePacketData::new(vec![], 1, vec![]);
        crate::relay::handle_vsc_packet(&mut storage, &env, data).unwrap();
        subscriber.end_block(&mut storage, &env).unwrap();
        assert!(subscriber.ibc.take_sent_packets().is_empty());

        let unbonding = state::params(&storage).unwrap().unbonding_period;
        env.block.time = timeout_after(env.block.time, unbonding);
        let response = subscriber.end_block(&mut storage, &env).unwrap();

        assert_eq!(response.events[0].ty, EVENT_TYPE_VSC_MATURED);
        let sent = subscriber.ibc.take_sent_packets();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].port_id, SUBSCRIBER_PORT_ID);
        assert_eq!(sent[0].channel_id, CHANNEL_ID);
        assert_eq!(
            decode::<SubscriberPacketData>(&sent[0].data).unwrap(),
            SubscriberPacketData::VscMatured(VscMaturedPacketData { valset_update_id: 1 })
        );
        assert!(state::maturing_packets(&storage).is_empty());
        assert!(state::pending_packets(&storage).unwrap().is_empty());
        assert_eq!(state::height_valset_update_ids(&storage).len(), 1);
    }

    #[test]
    fn nothing_is_sent_before_the_channel_exists() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut subscriber = subscriber_with_genesis(&mut storage, &env);
        state::append_pending_packet(
            &mut storage,
            SubscriberPacketData::VscMatured(VscMaturedPacketData { valset_update_id: 1 }),
        )
        .unwrap();

        subscriber.end_block(&mut storage, &env).unwrap();

        assert!(subscriber.ibc.sent_packets.is_empty());
        assert_eq!(state::pending_packets(&storage).unwrap().len(), 1);
    }

    #[test]
    fn expired_client_keeps_the_queue() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut subscriber = subscriber_with_channel(&mut storage, &env);
        for vsc_id in [1, 2] {
            state::append_pending_packet(
                &mut storage,
                SubscriberPacketData::VscMatured(VscMaturedPacketData { valset_update_id: vsc_id }),
            )
            .unwrap();
        }

        subscriber.ibc.send_error = Some(HostError::ClientNotActive("07-tendermint-0".into()));
        subscriber.end_block(&mut storage, &env).unwrap();
        assert_eq!(state::pending_packets(&storage).unwrap().len(), 2);

        subscriber.ibc.send_error = Some(HostError::Other("boom".into()));
        assert!(subscriber.end_block(&mut storage, &env).is_err());
        assert_eq!(state::pending_packets(&storage).unwrap().len(), 2);

        subscriber.ibc.send_error = None;
        subscriber.end_block(&mut storage, &env).unwrap();
        assert_eq!(subscriber.ibc.sent_packets.len(), 2);
        assert!(state::pending_packets(&storage).unwrap().is_empty());
    }

    #[test]
    fn received_changes_are_applied_at_the_block_end() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut subscriber = subscriber_with_channel(&mut storage, &env);
        let updates = vec![
            ValidatorUpdate::new(consensus_key(2), 0),
            ValidatorUpdate::new(consensus_key(3), 30),
        ];
        crate::relay::handle_vsc_packet(
            &mut storage,
            &env,
            ValidatorSetChangePacketData::new(updates.clone(), 1, vec![]),
        )
        .unwrap();

        let response = subscriber.end_block(&mut storage, &env).unwrap();

        assert_eq!(
            response.validator_updates,
            updates.iter().map(ValidatorUpdate::to_abci).collect::<Vec<_>>()
        );
        let powers: Vec<i64> = state::subscriber_validators(&storage)
            .unwrap()
            .iter()
            .map(|v| v.power)
            .collect();
        assert_eq!(powers.iter().sum::<i64>(), 130);
        assert!(state::pending_changes(&storage).unwrap().is_empty());
        assert!(subscriber.end_block(&mut storage, &env).unwrap().validator_updates.is_empty());
    }

    #[test]
    fn begin_block_records_history() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let _ = subscriber_with_genesis(&mut storage, &env);

        begin_block(&mut storage, &env).unwrap();

        assert_eq!(state::historical_heights(&storage), vec![env.block.height]);
    }
}
