//! Change-sets received from the coordinator, and the fate of the packets sent to it.

use appchain_types::{
    ack::Acknowledgement,
    consensus_key::ConsAddr,
    events::{
        ATTRIBUTE_CHANNEL_ID, ATTRIBUTE_ERROR, ATTRIBUTE_PACKET_KIND, ATTRIBUTE_SUCCESS,
        ATTRIBUTE_VALSET_UPDATE_ID, EVENT_TYPE_ACKNOWLEDGEMENT, EVENT_TYPE_CHANNEL_ESTABLISHED,
        EVENT_TYPE_PACKET, EVENT_TYPE_TIMEOUT,
    },
    ensure,
    handshake::SUBSCRIBER_PORT_ID,
    host::{timeout_after, IbcHost},
    packet::{decode, ValidatorSetChangePacketData},
    ValidationError,
};
use cosmwasm_std::{Env, Event, IbcBasicResponse, IbcPacket, IbcReceiveResponse, Storage};

use crate::{
    distribution::FeePool, error::SubscriberError, state, validators::merge_changes, Subscriber,
};

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Handles a change-set from the coordinator.
    ///
    /// The first change-set that decodes fixes the coordinator channel. A malformed
    /// change-set is answered with an error acknowledgement.
    /// # Errors
    /// Returns an error, and writes no acknowledgement, if the packet arrives on a channel
    /// other than the coordinator channel.
    pub fn on_recv_packet(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &IbcPacket,
    ) -> Result<IbcReceiveResponse, SubscriberError> {
        let channel_id = packet.dest.channel_id.as_str();
        let established = state::coordinator_channel(storage);
        if let Some(expected) = established.as_deref().filter(|expected| *expected != channel_id) {
            tracing::error!(%expected, got = %channel_id, "change-set received on a foreign channel");
            return Err(SubscriberError::InvalidCoordinatorChannel {
                expected: expected.to_string(),
                got: channel_id.to_string(),
            });
        }

        let mut events = Vec::new();
        let mut event = Event::new(EVENT_TYPE_PACKET)
            .add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id)
            .add_attribute(ATTRIBUTE_PACKET_KIND, "validator_set_change");
        let result = decode::<ValidatorSetChangePacketData>(&packet.data)
            .map_err(|e| SubscriberError::InvalidPacketData(e.to_string()))
            .and_then(|data| {
                if established.is_none() {
                    state::set_coordinator_channel(storage, channel_id);
                    tracing::info!(%channel_id, "coordinator channel established");
                    events.push(
                        Event::new(EVENT_TYPE_CHANNEL_ESTABLISHED)
                            .add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id),
                    );
                }
                let vsc_id = data.valset_update_id;
                handle_vsc_packet(storage, env, data).map(|()| vsc_id)
            });
        let ack = match result {
            Ok(vsc_id) => {
                event = event.add_attribute(ATTRIBUTE_VALSET_UPDATE_ID, vsc_id.to_string());
                Acknowledgement::success()
            }
            Err(err) => {
                tracing::error!(%channel_id, %err, "rejected change-set");
                event = event.add_attribute(ATTRIBUTE_ERROR, err.to_string());
                Acknowledgement::error(err)
            }
        };
        events.push(event.add_attribute(ATTRIBUTE_SUCCESS, ack.is_success().to_string()));
        Ok(IbcReceiveResponse::new(ack.to_binary()).add_events(events))
    }

    /// Handles the acknowledgement of a packet sent to the coordinator. An error
    /// acknowledgement closes the coordinator channel.
    pub fn on_acknowledgement_packet(
        &mut self,
        storage: &mut dyn Storage,
        packet: &IbcPacket,
        acknowledgement: &[u8],
    ) -> IbcBasicResponse {
        let ack = Acknowledgement::from_slice(acknowledgement);
        let channel_id = packet.src.channel_id.as_str();
        let event = Event::new(EVENT_TYPE_ACKNOWLEDGEMENT)
            .add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id)
            .add_attribute(ATTRIBUTE_SUCCESS, ack.is_success().to_string());

        if let Some(err) = ack.error_message() {
            tracing::error!(%channel_id, error = %err, "coordinator returned an error acknowledgement");
            self.close_coordinator_channel(storage, channel_id);
        }
        IbcBasicResponse::new().add_event(event)
    }

    /// Handles a packet to the coordinator that timed out. The coordinator channel is
    /// closed.
    pub fn on_timeout_packet(&mut self, storage: &mut dyn Storage, packet: &IbcPacket) -> IbcBasicResponse {
        let channel_id = packet.src.channel_id.as_str();
        tracing::error!(%channel_id, sequence = packet.sequence, "packet to coordinator timed out");
        self.close_coordinator_channel(storage, channel_id);
        IbcBasicResponse::new()
            .add_event(Event::new(EVENT_TYPE_TIMEOUT).add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id))
    }

    fn close_coordinator_channel(&mut self, storage: &mut dyn Storage, channel_id: &str) {
        if state::coordinator_channel(storage).as_deref() != Some(channel_id) {
            tracing::warn!(%channel_id, "not the coordinator channel, leaving it open");
            return;
        }
        match self.ibc.channel_close_init(storage, SUBSCRIBER_PORT_ID, channel_id) {
            Ok(()) => tracing::warn!(%channel_id, "closed coordinator channel"),
            Err(err) => tracing::error!(%channel_id, %err, "failed to close coordinator channel"),
        }
    }
}

/// Records a change-set: merges its updates into the changes of this block, schedules its
/// maturity and clears the acknowledged downtime slashes.
/// # Errors
/// Returns an error, with nothing written, if the change-set is malformed.
pub fn handle_vsc_packet(
    storage: &mut dyn Storage,
    env: &Env,
    data: ValidatorSetChangePacketData,
) -> Result<(), SubscriberError> {
    ensure!(data.valset_update_id != 0, ValidationError::ZeroValsetUpdateId);
    for update in &data.validator_updates {
        ensure!(update.power >= 0, ValidationError::NonPositivePower(update.power));
    }
    let slash_acks = data
        .slash_acks
        .iter()
        .map(|ack| ack.parse::<ConsAddr>())
        .collect::<Result<Vec<_>, _>>()?;
    let params = state::params(storage)?;

    let vsc_id = data.valset_update_id;
    let mut pending = state::pending_changes(storage)?;
    merge_changes(&mut pending, data.validator_updates);
    state::set_pending_changes(storage, &pending)?;

    state::set_packet_maturity_time(
        storage,
        vsc_id,
        timeout_after(env.block.time, params.unbonding_period),
    );
    state::set_height_valset_update_id(storage, env.block.height.saturating_add(1), vsc_id);

    for address in &slash_acks {
        state::remove_outstanding_downtime(storage, address);
    }

    tracing::info!(
        vsc_id,
        pending_changes = pending.len(),
        slash_acks = slash_acks.len(),
        "received validator set change"
    );
    Ok(())
}
