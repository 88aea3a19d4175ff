//! The staking-keeper surface the host chain's slashing, evidence and genesis subsystems
//! run against.
//!
//! Penalties are never applied locally. A slash is turned into a slash request for the
//! coordinator, which owns the stake and jails the operator; local jailing is a no-op.

use std::time::Duration;

use appchain_types::{
    consensus_key::ConsAddr,
    events::{
        ATTRIBUTE_INFRACTION, ATTRIBUTE_INFRACTION_HEIGHT, ATTRIBUTE_VALIDATOR_ADDRESS,
        ATTRIBUTE_VALSET_UPDATE_ID, EVENT_TYPE_SLASH_QUEUED,
    },
    host::IbcHost,
    packet::{Infraction, SlashPacketData, SubscriberPacketData},
    params::SubscriberParams,
    validator::{SubscriberValidator, ValidatorUpdate},
};
use cosmwasm_std::{Decimal, Event, Storage};

use crate::{
    distribution::FeePool, error::SubscriberError, state, validators::apply_validator_changes,
    Subscriber,
};

/// What the host chain's staking-dependent subsystems expect from a staking module.
pub trait StakingKeeper {
    /// The module parameters.
    /// # Errors
    /// Returns an error if they are not set.
    fn params(&self, storage: &dyn Storage) -> Result<SubscriberParams, SubscriberError>;

    /// Time after which a change-set is mature.
    /// # Errors
    /// Returns an error if the params are not set.
    fn unbonding_time(&self, storage: &dyn Storage) -> Result<Duration, SubscriberError>;

    /// The validator with consensus address `address`.
    /// # Errors
    /// Returns an error if the record cannot be decoded.
    fn validator_by_cons_addr(
        &self,
        storage: &dyn Storage,
        address: &ConsAddr,
    ) -> Result<Option<SubscriberValidator>, SubscriberError>;

    /// Slashes without a known infraction. Nothing is sent to the coordinator.
    /// # Errors
    /// Never.
    fn slash(
        &mut self,
        storage: &mut dyn Storage,
        address: &ConsAddr,
        infraction_height: u64,
        power: i64,
        fraction: Decimal,
    ) -> Result<Vec<Event>, SubscriberError> {
        self.slash_with_infraction_reason(
            storage,
            address,
            infraction_height,
            power,
            fraction,
            Infraction::Unspecified,
        )
    }

    /// Reports `infraction` of `address` at `infraction_height` to the coordinator.
    /// # Errors
    /// Returns an error if the request is malformed or cannot be queued.
    fn slash_with_infraction_reason(
        &mut self,
        storage: &mut dyn Storage,
        address: &ConsAddr,
        infraction_height: u64,
        power: i64,
        fraction: Decimal,
        infraction: Infraction,
    ) -> Result<Vec<Event>, SubscriberError>;

    /// Jailing is decided by the coordinator.
    fn jail(&mut self, storage: &mut dyn Storage, address: &ConsAddr);

    /// Jailing is decided by the coordinator.
    fn unjail(&mut self, storage: &mut dyn Storage, address: &ConsAddr);

    /// Whether a downtime slash of `address` is in flight.
    fn is_validator_jailed(&self, storage: &dyn Storage, address: &ConsAddr) -> bool;

    /// Applies the changes received in this block and returns the ones to hand to the
    /// consensus engine.
    /// # Errors
    /// Returns an error if the changes cannot be loaded or applied.
    fn apply_and_return_validator_set_updates(
        &mut self,
        storage: &mut dyn Storage,
    ) -> Result<Vec<ValidatorUpdate>, SubscriberError>;
}

/// Queues a slash request for the coordinator. Only downtime is reported, once per
/// validator until the coordinator acknowledges it.
/// # Errors
/// Returns an error if the request fails validation or cannot be queued.
pub fn queue_slash_packet(
    storage: &mut dyn Storage,
    address: &ConsAddr,
    infraction_height: u64,
    power: i64,
    infraction: Infraction,
) -> Result<Vec<Event>, SubscriberError> {
    if infraction != Infraction::Downtime {
        tracing::warn!(%address, ?infraction, infraction_height, "only downtime is reported to the coordinator");
        return Ok(Vec::new());
    }
    if state::has_outstanding_downtime(storage, address) {
        tracing::debug!(%address, "downtime slash already in flight");
        return Ok(Vec::new());
    }

    let vsc_id = state::valset_update_id_at_height(storage, infraction_height).unwrap_or_else(|| {
        tracing::error!(%address, infraction_height, "no change-set recorded for infraction height");
        0
    });
    let data = SlashPacketData::new(*address, power, vsc_id, infraction);
    data.validate_basic()?;

    state::append_pending_packet(storage, SubscriberPacketData::Slash(data))?;
    state::set_outstanding_downtime(storage, address);

    tracing::info!(%address, infraction_height, vsc_id, power, "queued downtime slash");
    Ok(vec![Event::new(EVENT_TYPE_SLASH_QUEUED)
        .add_attribute(ATTRIBUTE_VALIDATOR_ADDRESS, address.to_string())
        .add_attribute(ATTRIBUTE_INFRACTION, "DOWNTIME")
        .add_attribute(ATTRIBUTE_INFRACTION_HEIGHT, infraction_height.to_string())
        .add_attribute(ATTRIBUTE_VALSET_UPDATE_ID, vsc_id.to_string())])
}

impl<H, F> StakingKeeper for Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    fn params(&self, storage: &dyn Storage) -> Result<SubscriberParams, SubscriberError> {
        state::params(storage)
    }

    fn unbonding_time(&self, storage: &dyn Storage) -> Result<Duration, SubscriberError> {
        Ok(state::params(storage)?.unbonding_period)
    }

    fn validator_by_cons_addr(
        &self,
        storage: &dyn Storage,
        address: &ConsAddr,
    ) -> Result<Option<SubscriberValidator>, SubscriberError> {
        state::subscriber_validator(storage, address)
    }

    fn slash_with_infraction_reason(
        &mut self,
        storage: &mut dyn Storage,
        address: &ConsAddr,
        infraction_height: u64,
        power: i64,
        _fraction: Decimal,
        infraction: Infraction,
    ) -> Result<Vec<Event>, SubscriberError> {
        queue_slash_packet(storage, address, infraction_height, power, infraction)
    }

    fn jail(&mut self, _storage: &mut dyn Storage, address: &ConsAddr) {
        tracing::debug!(%address, "ignoring local jail");
    }

    fn unjail(&mut self, _storage: &mut dyn Storage, address: &ConsAddr) {
        tracing::debug!(%address, "ignoring local unjail");
    }

    fn is_validator_jailed(&self, storage: &dyn Storage, address: &ConsAddr) -> bool {
        state::has_outstanding_downtime(storage, address)
    }

    fn apply_and_return_validator_set_updates(
        &mut self,
        storage: &mut dyn Storage,
    ) -> Result<Vec<ValidatorUpdate>, SubscriberError> {
        let changes = state::take_pending_changes(storage)?;
        apply_validator_changes(storage, &changes)
    }
}
