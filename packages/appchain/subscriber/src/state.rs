//! Typed access to the subscriber store.

use appchain_types::{
    consensus_key::ConsAddr,
    genesis::{HeightToVscId, MaturingVscPacket},
    packet::SubscriberPacketData,
    params::SubscriberParams,
    store::{key, load_json, load_string, load_u64, prefix_entries, save_json, save_u64, u64_from_be},
    validator::{SubscriberValidator, ValidatorUpdate},
};
use cosmwasm_std::{Order, Storage, Timestamp, Uint128};

use crate::{error::SubscriberError, historical::HistoricalInfo, keys};

/// Loads the module parameters.
/// # Errors
/// Returns an error if they are not set or cannot be decoded.
pub fn params(storage: &dyn Storage) -> Result<SubscriberParams, SubscriberError> {
    load_json(storage, &[keys::PARAMS])?.ok_or(SubscriberError::ParamsNotSet)
}

/// Stores the module parameters.
/// # Errors
/// Returns an error if they fail to serialize.
pub fn set_params(storage: &mut dyn Storage, params: &SubscriberParams) -> Result<(), SubscriberError> {
    Ok(save_json(storage, &[keys::PARAMS], params)?)
}

// coordinator client and channels

/// Client of the coordinator chain.
#[must_use]
pub fn coordinator_client_id(storage: &dyn Storage) -> Option<String> {
    load_string(storage, &[keys::COORDINATOR_CLIENT_ID])
}

/// Records the client of the coordinator chain.
pub fn set_coordinator_client_id(storage: &mut dyn Storage, client_id: &str) {
    storage.set(&[keys::COORDINATOR_CLIENT_ID], client_id.as_bytes());
}

/// The channel the coordinator's change-sets arrive on, fixed by the first one.
#[must_use]
pub fn coordinator_channel(storage: &dyn Storage) -> Option<String> {
    load_string(storage, &[keys::COORDINATOR_CHANNEL])
}

/// Fixes the coordinator channel.
pub fn set_coordinator_channel(storage: &mut dyn Storage, channel_id: &str) {
    storage.set(&[keys::COORDINATOR_CHANNEL], channel_id.as_bytes());
}

/// Transfer channel rewards are sent over.
#[must_use]
pub fn transfer_channel(storage: &dyn Storage) -> Option<String> {
    load_string(storage, &[keys::TRANSFER_CHANNEL])
}

/// Records the transfer channel.
pub fn set_transfer_channel(storage: &mut dyn Storage, channel_id: &str) {
    storage.set(&[keys::TRANSFER_CHANNEL], channel_id.as_bytes());
}

/// Coordinator address receiving the coordinator's reward share.
#[must_use]
pub fn coordinator_fee_pool_addr(storage: &dyn Storage) -> Option<String> {
    load_string(storage, &[keys::COORDINATOR_FEE_POOL_ADDR])
}

/// Records the coordinator's fee-pool address.
pub fn set_coordinator_fee_pool_addr(storage: &mut dyn Storage, address: &str) {
    storage.set(&[keys::COORDINATOR_FEE_POOL_ADDR], address.as_bytes());
}

// pending changes

/// Validator changes received in the current block.
/// # Errors
/// Returns an error if the stored changes cannot be decoded.
pub fn pending_changes(storage: &dyn Storage) -> Result<Vec<ValidatorUpdate>, SubscriberError> {
    Ok(load_json(storage, &[keys::PENDING_CHANGES])?.unwrap_or_default())
}

/// Replaces the validator changes of the current block.
/// # Errors
/// Returns an error if the changes fail to serialize.
pub fn set_pending_changes(
    storage: &mut dyn Storage,
    changes: &[ValidatorUpdate],
) -> Result<(), SubscriberError> {
    Ok(save_json(storage, &[keys::PENDING_CHANGES], &changes)?)
}

/// Removes and returns the validator changes of the current block.
/// # Errors
/// Returns an error if the stored changes cannot be decoded.
pub fn take_pending_changes(storage: &mut dyn Storage) -> Result<Vec<ValidatorUpdate>, SubscriberError> {
    let changes = pending_changes(storage)?;
    storage.remove(&[keys::PENDING_CHANGES]);
    Ok(changes)
}

// maturity

/// Records when change-set `vsc_id` matures.
pub fn set_packet_maturity_time(storage: &mut dyn Storage, vsc_id: u64, maturity_time: Timestamp) {
    save_u64(
        storage,
        &key(keys::PACKET_MATURITY_TIME, &vsc_id.to_be_bytes()),
        maturity_time.nanos(),
    );
}

/// Forgets the maturity time of `vsc_id`.
pub fn remove_packet_maturity_time(storage: &mut dyn Storage, vsc_id: u64) {
    storage.remove(&key(keys::PACKET_MATURITY_TIME, &vsc_id.to_be_bytes()));
}

/// Every change-set that has not matured yet, by ascending id.
#[must_use]
pub fn maturing_packets(storage: &dyn Storage) -> Vec<MaturingVscPacket> {
    prefix_entries(storage, &[keys::PACKET_MATURITY_TIME])
        .into_iter()
        .filter_map(|(k, v)| {
            Some(MaturingVscPacket {
                vsc_id: u64_from_be(&k)?,
                maturity_time: Timestamp::from_nanos(u64_from_be(&v)?),
            })
        })
        .collect()
}

// height -> vsc id

/// Records that change-set `vsc_id` is in force from `height` on.
pub fn set_height_valset_update_id(storage: &mut dyn Storage, height: u64, vsc_id: u64) {
    save_u64(
        storage,
        &key(keys::HEIGHT_VALSET_UPDATE_ID, &height.to_be_bytes()),
        vsc_id,
    );
}

/// The change-set in force at `height`: the one recorded at the closest height at or
/// below it.
#[must_use]
pub fn valset_update_id_at_height(storage: &dyn Storage, height: u64) -> Option<u64> {
    let start = key(keys::HEIGHT_VALSET_UPDATE_ID, &[]);
    let end = key(
        keys::HEIGHT_VALSET_UPDATE_ID,
        &height.saturating_add(1).to_be_bytes(),
    );
    storage
        .range(Some(start.as_slice()), Some(end.as_slice()), Order::Descending)
        .next()
        .and_then(|(_, v)| u64_from_be(&v))
}

/// Every height to change-set entry, by ascending height.
#[must_use]
pub fn height_valset_update_ids(storage: &dyn Storage) -> Vec<HeightToVscId> {
    prefix_entries(storage, &[keys::HEIGHT_VALSET_UPDATE_ID])
        .into_iter()
        .filter_map(|(k, v)| {
            Some(HeightToVscId {
                height: u64_from_be(&k)?,
                vsc_id: u64_from_be(&v)?,
            })
        })
        .collect()
}

/// Removes the entries of change-sets older than `vsc_id`.
pub fn prune_height_valset_update_ids(storage: &mut dyn Storage, vsc_id: u64) {
    for entry in height_valset_update_ids(storage) {
        if entry.vsc_id >= vsc_id {
            break;
        }
        storage.remove(&key(
            keys::HEIGHT_VALSET_UPDATE_ID,
            &entry.height.to_be_bytes(),
        ));
    }
}

// outstanding downtime

/// Whether a downtime slash of `address` is in flight.
#[must_use]
pub fn has_outstanding_downtime(storage: &dyn Storage, address: &ConsAddr) -> bool {
    storage
        .get(&key(keys::OUTSTANDING_DOWNTIME, address.as_bytes()))
        .is_some()
}

/// Marks a downtime slash of `address` as in flight.
pub fn set_outstanding_downtime(storage: &mut dyn Storage, address: &ConsAddr) {
    storage.set(&key(keys::OUTSTANDING_DOWNTIME, address.as_bytes()), &[1]);
}

/// Clears the in-flight downtime slash of `address`.
pub fn remove_outstanding_downtime(storage: &mut dyn Storage, address: &ConsAddr) {
    storage.remove(&key(keys::OUTSTANDING_DOWNTIME, address.as_bytes()));
}

/// Every address with a downtime slash in flight.
#[must_use]
pub fn all_outstanding_downtime(storage: &dyn Storage) -> Vec<ConsAddr> {
    prefix_entries(storage, &[keys::OUTSTANDING_DOWNTIME])
        .into_iter()
        .filter_map(|(k, _)| ConsAddr::try_from(k.as_slice()).ok())
        .collect()
}

// validators

/// The validator record of `address`.
/// # Errors
/// Returns an error if the record cannot be decoded.
pub fn subscriber_validator(
    storage: &dyn Storage,
    address: &ConsAddr,
) -> Result<Option<SubscriberValidator>, SubscriberError> {
    Ok(load_json(
        storage,
        &key(keys::SUBSCRIBER_VALIDATOR, address.as_bytes()),
    )?)
}

/// Stores a validator record.
/// # Errors
/// Returns an error if the record fails to serialize.
pub fn set_subscriber_validator(
    storage: &mut dyn Storage,
    validator: &SubscriberValidator,
) -> Result<(), SubscriberError> {
    Ok(save_json(
        storage,
        &key(keys::SUBSCRIBER_VALIDATOR, validator.cons_address.as_bytes()),
        validator,
    )?)
}

/// Deletes the validator record of `address`.
pub fn remove_subscriber_validator(storage: &mut dyn Storage, address: &ConsAddr) {
    storage.remove(&key(keys::SUBSCRIBER_VALIDATOR, address.as_bytes()));
}

/// Every validator record, by ascending address.
/// # Errors
/// Returns an error if a record cannot be decoded.
pub fn subscriber_validators(storage: &dyn Storage) -> Result<Vec<SubscriberValidator>, SubscriberError> {
    prefix_entries(storage, &[keys::SUBSCRIBER_VALIDATOR])
        .into_iter()
        .map(|(_, v)| serde_json::from_slice(&v).map_err(SubscriberError::from))
        .collect()
}

// packets to the coordinator

/// Packets waiting to be sent to the coordinator, oldest first.
/// # Errors
/// Returns an error if the queue cannot be decoded.
pub fn pending_packets(storage: &dyn Storage) -> Result<Vec<SubscriberPacketData>, SubscriberError> {
    Ok(load_json(storage, &[keys::PENDING_PACKETS])?.unwrap_or_default())
}

/// Replaces the queue of packets to the coordinator.
/// # Errors
/// Returns an error if the queue fails to serialize.
pub fn set_pending_packets(
    storage: &mut dyn Storage,
    packets: &[SubscriberPacketData],
) -> Result<(), SubscriberError> {
    if packets.is_empty() {
        storage.remove(&[keys::PENDING_PACKETS]);
        return Ok(());
    }
    Ok(save_json(storage, &[keys::PENDING_PACKETS], &packets)?)
}

/// Appends a packet to the queue.
/// # Errors
/// Returns an error if the queue cannot be decoded or stored.
pub fn append_pending_packet(
    storage: &mut dyn Storage,
    packet: SubscriberPacketData,
) -> Result<(), SubscriberError> {
    let mut packets = pending_packets(storage)?;
    packets.push(packet);
    set_pending_packets(storage, &packets)
}

// historical info

/// The validator set recorded at `height`.
/// # Errors
/// Returns an error if the entry cannot be decoded.
pub fn historical_info(storage: &dyn Storage, height: u64) -> Result<Option<HistoricalInfo>, SubscriberError> {
    Ok(load_json(
        storage,
        &key(keys::HISTORICAL_INFO, &height.to_be_bytes()),
    )?)
}

/// Records the validator set at `info`'s height.
/// # Errors
/// Returns an error if the entry fails to serialize.
pub fn set_historical_info(storage: &mut dyn Storage, info: &HistoricalInfo) -> Result<(), SubscriberError> {
    Ok(save_json(
        storage,
        &key(keys::HISTORICAL_INFO, &info.header.height.to_be_bytes()),
        info,
    )?)
}

/// Heights with a historical entry, ascending.
#[must_use]
pub fn historical_heights(storage: &dyn Storage) -> Vec<u64> {
    prefix_entries(storage, &[keys::HISTORICAL_INFO])
        .into_iter()
        .filter_map(|(k, _)| u64_from_be(&k))
        .collect()
}

/// Deletes the historical entry at `height`.
pub fn remove_historical_info(storage: &mut dyn Storage, height: u64) {
    storage.remove(&key(keys::HISTORICAL_INFO, &height.to_be_bytes()));
}

// rewards

/// Height of the last reward transmission.
#[must_use]
pub fn last_transmission_height(storage: &dyn Storage) -> u64 {
    load_u64(storage, &[keys::LAST_TRANSMISSION_HEIGHT]).unwrap_or(0)
}

/// Records the height of a reward transmission.
pub fn set_last_transmission_height(storage: &mut dyn Storage, height: u64) {
    save_u64(storage, &[keys::LAST_TRANSMISSION_HEIGHT], height);
}

/// Rewards owed to the coordinator and not transferred yet.
/// # Errors
/// Returns an error if the amount cannot be decoded.
pub fn pending_coordinator_rewards(storage: &dyn Storage) -> Result<Uint128, SubscriberError> {
    Ok(load_json(storage, &[keys::PENDING_COORDINATOR_REWARDS])?.unwrap_or_default())
}

/// Sets the rewards owed to the coordinator.
/// # Errors
/// Returns an error if the amount fails to serialize.
pub fn set_pending_coordinator_rewards(
    storage: &mut dyn Storage,
    amount: Uint128,
) -> Result<(), SubscriberError> {
    Ok(save_json(storage, &[keys::PENDING_COORDINATOR_REWARDS], &amount)?)
}
