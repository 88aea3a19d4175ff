//! Packets received from subscribers, and the fate of the packets sent to them.

use appchain_types::{
    ack::Acknowledgement,
    cache::CacheContext,
    ensure,
    events::{
        chain_event, ATTRIBUTE_CHANNEL_ID, ATTRIBUTE_ERROR, ATTRIBUTE_INFRACTION,
        ATTRIBUTE_PACKET_KIND, ATTRIBUTE_SUCCESS, ATTRIBUTE_VALIDATOR_ADDRESS,
        ATTRIBUTE_VALSET_UPDATE_ID, EVENT_TYPE_ACKNOWLEDGEMENT, EVENT_TYPE_EXECUTE_SLASH,
        EVENT_TYPE_PACKET, EVENT_TYPE_TIMEOUT, EVENT_TYPE_VSC_MATURED,
    },
    host::IbcHost,
    packet::{decode, SlashPacketData, SubscriberPacketData, VscMaturedPacketData},
};
use cosmwasm_std::{Env, Event, IbcBasicResponse, IbcPacket, IbcReceiveResponse, Storage};

use crate::{
    error::CoordinatorError,
    keepers::{EpochsKeeper, RestakingKeeper, SlashRequest},
    state, Coordinator,
};

fn receive_response(ack: &Acknowledgement, events: Vec<Event>) -> IbcReceiveResponse {
    IbcReceiveResponse::new(ack.to_binary()).add_events(events)
}

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Handles a packet from a subscriber. Every outcome is acknowledged: failures are
    /// reported in an error acknowledgement and leave the store untouched, except for an
    /// undecodable packet, which also stops the chain.
    pub fn on_recv_packet(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &IbcPacket,
    ) -> IbcReceiveResponse {
        let channel_id = packet.dest.channel_id.as_str();
        let Some(chain_id) = state::channel_to_chain(storage, channel_id) else {
            tracing::error!(%channel_id, "packet received on an unknown channel");
            let err = CoordinatorError::UnknownSubscriberChannelId(channel_id.to_string());
            return receive_response(&Acknowledgement::error(err), Vec::new());
        };

        let data: SubscriberPacketData = match decode(&packet.data) {
            Ok(data) => data,
            Err(err) => {
                let err = CoordinatorError::InvalidPacketData(err.to_string());
                tracing::error!(%chain_id, %channel_id, %err, "undecodable subscriber packet");
                let events = self.stop_subscriber_chain_logged(storage, env, &chain_id, &err.to_string());
                return receive_response(&Acknowledgement::error(err), events);
            }
        };

        let (kind, result) = match data {
            SubscriberPacketData::Slash(data) => (
                "slash",
                self.handle_slash_packet(storage, &chain_id, &data)
                    .map(|events| (Acknowledgement::SlashHandled, events)),
            ),
            SubscriberPacketData::VscMatured(data) => (
                "vsc_matured",
                handle_vsc_matured_packet(storage, &chain_id, data)
                    .map(|events| (Acknowledgement::success(), events)),
            ),
        };

        let mut event = chain_event(EVENT_TYPE_PACKET, &chain_id)
            .add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id)
            .add_attribute(ATTRIBUTE_PACKET_KIND, kind);
        let (ack, mut events) = match result {
            Ok(handled) => handled,
            Err(err) => {
                tracing::warn!(%chain_id, packet_kind = kind, %err, "rejected subscriber packet");
                event = event.add_attribute(ATTRIBUTE_ERROR, err.to_string());
                (Acknowledgement::error(err), Vec::new())
            }
        };
        event = event.add_attribute(ATTRIBUTE_SUCCESS, ack.is_success().to_string());
        events.insert(0, event);
        receive_response(&ack, events)
    }

    /// Validates a slash request and, if it is acceptable, slashes and jails the operator
    /// behind the validator and queues the acknowledgement for the next change-set.
    /// # Errors
    /// Returns an error, with nothing written, if the request fails validation or the
    /// restaking module rejects it.
    pub fn handle_slash_packet(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
        data: &SlashPacketData,
    ) -> Result<Vec<Event>, CoordinatorError> {
        data.validate_basic()?;
        let cons_address = data.cons_address()?;

        let operator = state::operator_for_cons_addr(storage, chain_id, &cons_address)
            .ok_or_else(|| CoordinatorError::UnknownValidator {
                chain_id: chain_id.to_string(),
                address: cons_address.to_string(),
            })?;
        let last = state::vsc_id_for_chain(storage, chain_id);
        ensure!(
            data.valset_update_id <= last,
            CoordinatorError::InvalidVscId {
                got: data.valset_update_id,
                last,
            }
        );
        let registration = state::chain_registration(storage, chain_id)?
            .ok_or_else(|| CoordinatorError::UnknownSubscriberChain(chain_id.to_string()))?;

        let request = SlashRequest {
            chain_id: chain_id.to_string(),
            operator,
            cons_address,
            power: data.validator.power,
            valset_update_id: data.valset_update_id,
        };
        self.restaking.validate_slash(storage, &request)?;

        let params = &registration.subscriber_params;
        let mut cache = CacheContext::new(storage);
        self.restaking
            .slash(&mut cache, &request, params.slash_fraction_downtime)?;
        self.restaking.jail(
            &mut cache,
            chain_id,
            &request.operator,
            params.downtime_jail_duration,
        )?;
        state::append_slash_ack(&mut cache, chain_id, cons_address.to_string())?;
        cache.emit(
            chain_event(EVENT_TYPE_EXECUTE_SLASH, chain_id)
                .add_attribute(ATTRIBUTE_VALIDATOR_ADDRESS, cons_address.to_string())
                .add_attribute(ATTRIBUTE_VALSET_UPDATE_ID, data.valset_update_id.to_string())
                .add_attribute(ATTRIBUTE_INFRACTION, "DOWNTIME"),
        );

        tracing::info!(
            %chain_id,
            operator = %request.operator,
            %cons_address,
            vsc_id = data.valset_update_id,
            "executed downtime slash"
        );
        Ok(cache.commit())
    }

    /// Handles the acknowledgement of a change-set. An error acknowledgement stops the
    /// chain.
    pub fn on_acknowledgement_packet(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &IbcPacket,
        acknowledgement: &[u8],
    ) -> IbcBasicResponse {
        let channel_id = packet.src.channel_id.as_str();
        let ack = Acknowledgement::from_slice(acknowledgement);
        let Some(chain_id) = state::channel_to_chain(storage, channel_id) else {
            tracing::error!(%channel_id, "acknowledgement on an unknown channel");
            return IbcBasicResponse::new();
        };

        let mut events = vec![chain_event(EVENT_TYPE_ACKNOWLEDGEMENT, &chain_id)
            .add_attribute(ATTRIBUTE_SUCCESS, ack.is_success().to_string())];
        if let Some(err) = ack.error_message() {
            tracing::error!(%chain_id, %channel_id, error = %err, "subscriber returned an error acknowledgement");
            let reason = format!("error acknowledgement: {err}");
            events.extend(self.stop_subscriber_chain_logged(storage, env, &chain_id, &reason));
        }
        IbcBasicResponse::new().add_events(events)
    }

    /// Handles a change-set that timed out. The chain is stopped.
    pub fn on_timeout_packet(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &IbcPacket,
    ) -> IbcBasicResponse {
        let channel_id = packet.src.channel_id.as_str();
        let Some(chain_id) = state::channel_to_chain(storage, channel_id) else {
            tracing::error!(%channel_id, "timeout on an unknown channel");
            return IbcBasicResponse::new();
        };

        tracing::error!(%chain_id, %channel_id, sequence = packet.sequence, "packet to subscriber timed out");
        let mut events = vec![chain_event(EVENT_TYPE_TIMEOUT, &chain_id)];
        events.extend(self.stop_subscriber_chain_logged(storage, env, &chain_id, "packet timed out"));
        IbcBasicResponse::new().add_events(events)
    }
}

/// Completes change-set `data.valset_update_id` of `chain_id`: clears its timeout and
/// deletes the consensus addresses whose removal waited for it.
/// # Errors
/// Returns an error for a zero id or if the prune list cannot be decoded.
pub fn handle_vsc_matured_packet(
    storage: &mut dyn Storage,
    chain_id: &str,
    data: VscMaturedPacketData,
) -> Result<Vec<Event>, CoordinatorError> {
    data.validate_basic()?;
    let vsc_id = data.valset_update_id;

    if !state::remove_vsc_timeout(storage, chain_id, vsc_id) {
        tracing::error!(%chain_id, vsc_id, "matured change-set has no recorded timeout");
    }

    let pruned = state::cons_addrs_to_prune(storage, chain_id, vsc_id)?;
    for address in &pruned {
        state::remove_operator_for_cons_addr(storage, chain_id, address);
    }
    state::remove_cons_addrs_to_prune(storage, chain_id, vsc_id, &pruned);

    // TODO: release the undelegations and opt-outs held until this change-set matured
    // once the restaking keeper exposes a hold queue.
    tracing::info!(%chain_id, vsc_id, pruned = pruned.len(), "change-set matured");
    Ok(vec![chain_event(EVENT_TYPE_VSC_MATURED, chain_id)
        .add_attribute(ATTRIBUTE_VALSET_UPDATE_ID, vsc_id.to_string())])
}
