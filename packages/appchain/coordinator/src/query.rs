//! Read-only views of the coordinator state.

use appchain_types::{
    genesis::SubscriberGenesisState, packet::ValidatorSetChangePacketData,
    params::CoordinatorParams, validator::SubscriberValidator,
};
use cosmwasm_std::Storage;
use serde::{Deserialize, Serialize};

use crate::{error::CoordinatorError, state};

/// Lifecycle stage of a subscriber chain as seen by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// No client exists for the chain
    Uninitialized,
    /// The client exists but the channel is not established yet
    HandshakeInProgress,
    /// The channel is established
    Established,
    /// The chain was stopped and its state removed
    TornDown,
}

/// A chain with a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Chain id
    pub chain_id: String,
    /// Light client of the chain
    pub client_id: String,
    /// Established channel, if any
    pub channel_id: Option<String>,
    /// Last queued change-set id
    pub vsc_id: u64,
}

/// The module parameters.
/// # Errors
/// Returns an error if they are not set.
pub fn params(storage: &dyn Storage) -> Result<CoordinatorParams, CoordinatorError> {
    state::params(storage)
}

/// The genesis a chain starts from, available until its channel is established.
/// # Errors
/// Returns an error if the stored genesis cannot be decoded.
pub fn subscriber_genesis(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Option<SubscriberGenesisState>, CoordinatorError> {
    state::subscriber_genesis(storage, chain_id)
}

/// Every chain with a client, ordered by chain id encoding.
#[must_use]
pub fn chains(storage: &dyn Storage) -> Vec<ChainInfo> {
    state::all_chain_clients(storage)
        .into_iter()
        .map(|(chain_id, client_id)| ChainInfo {
            channel_id: state::chain_to_channel(storage, &chain_id),
            vsc_id: state::vsc_id_for_chain(storage, &chain_id),
            chain_id,
            client_id,
        })
        .collect()
}

/// Lifecycle stage of `chain_id`.
#[must_use]
pub fn chain_status(storage: &dyn Storage, chain_id: &str) -> ChainStatus {
    if state::chain_to_channel(storage, chain_id).is_some() {
        ChainStatus::Established
    } else if state::chain_to_client(storage, chain_id).is_some() {
        ChainStatus::HandshakeInProgress
    } else if state::stopped_height(storage, chain_id).is_some() {
        ChainStatus::TornDown
    } else {
        ChainStatus::Uninitialized
    }
}

/// The validator set the coordinator last computed for `chain_id`.
/// # Errors
/// Returns an error if a record cannot be decoded.
pub fn validators(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<SubscriberValidator>, CoordinatorError> {
    state::subscriber_validators(storage, chain_id)
}

/// Change-sets of `chain_id` not sent yet.
/// # Errors
/// Returns an error if the queue cannot be decoded.
pub fn pending_packets(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<ValidatorSetChangePacketData>, CoordinatorError> {
    state::pending_vsc_packets(storage, chain_id)
}
