//! Typed access to the coordinator store.
//!
//! Relations are kept as pairs of index tables (chain and client, chain and channel,
//! consensus address and operator) written together by the functions below.

use appchain_types::{
    consensus_key::ConsAddr,
    genesis::SubscriberGenesisState,
    packet::ValidatorSetChangePacketData,
    params::CoordinatorParams,
    store::{
        chain_key, chain_key_with_suffix, key, load_json, load_string, load_u64, prefix_entries,
        remove_prefix, save_json, save_u64, split_chain_id, u64_from_be,
    },
    validator::SubscriberValidator,
};
use cosmwasm_std::Storage;
use serde::{Deserialize, Serialize};

use crate::{error::CoordinatorError, keys, msg::RegisterSubscriberChainMsg};

/// A position on an epoch schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochPosition {
    /// Identifier of the schedule
    pub epoch_identifier: String,
    /// Epoch number
    pub epoch_number: u64,
}

impl EpochPosition {
    /// Creates a position.
    #[must_use]
    pub fn new(epoch_identifier: impl Into<String>, epoch_number: u64) -> Self {
        Self {
            epoch_identifier: epoch_identifier.into(),
            epoch_number,
        }
    }
}

/// Loads the module parameters.
/// # Errors
/// Returns an error if they are not set or cannot be decoded.
pub fn params(storage: &dyn Storage) -> Result<CoordinatorParams, CoordinatorError> {
    load_json(storage, &[keys::PARAMS])?.ok_or(CoordinatorError::ParamsNotSet)
}

/// Stores the module parameters.
/// # Errors
/// Returns an error if they fail to serialize.
pub fn set_params(
    storage: &mut dyn Storage,
    params: &CoordinatorParams,
) -> Result<(), CoordinatorError> {
    Ok(save_json(storage, &[keys::PARAMS], params)?)
}

// chain <-> client

/// The client tracking `chain_id`.
#[must_use]
pub fn chain_to_client(storage: &dyn Storage, chain_id: &str) -> Option<String> {
    load_string(storage, &chain_key(keys::CHAIN_TO_CLIENT, chain_id))
}

/// The chain tracked by `client_id`.
#[must_use]
pub fn client_to_chain(storage: &dyn Storage, client_id: &str) -> Option<String> {
    load_string(storage, &key(keys::CLIENT_TO_CHAIN, client_id.as_bytes()))
}

/// Records that `client_id` tracks `chain_id`.
pub fn set_chain_client(storage: &mut dyn Storage, chain_id: &str, client_id: &str) {
    storage.set(
        &chain_key(keys::CHAIN_TO_CLIENT, chain_id),
        client_id.as_bytes(),
    );
    storage.set(
        &key(keys::CLIENT_TO_CHAIN, client_id.as_bytes()),
        chain_id.as_bytes(),
    );
}

/// Forgets the client of `chain_id`.
pub fn remove_chain_client(storage: &mut dyn Storage, chain_id: &str) {
    if let Some(client_id) = chain_to_client(storage, chain_id) {
        storage.remove(&key(keys::CLIENT_TO_CHAIN, client_id.as_bytes()));
    }
    storage.remove(&chain_key(keys::CHAIN_TO_CLIENT, chain_id));
}

/// Every `(chain id, client id)` pair.
#[must_use]
pub fn all_chain_clients(storage: &dyn Storage) -> Vec<(String, String)> {
    prefix_entries(storage, &[keys::CHAIN_TO_CLIENT])
        .into_iter()
        .filter_map(|(k, v)| {
            let (chain_id, _) = split_chain_id(&k)?;
            Some((chain_id, String::from_utf8(v).ok()?))
        })
        .collect()
}

// chain <-> channel

/// The channel to `chain_id`.
#[must_use]
pub fn chain_to_channel(storage: &dyn Storage, chain_id: &str) -> Option<String> {
    load_string(storage, &chain_key(keys::CHAIN_TO_CHANNEL, chain_id))
}

/// The chain at the other end of `channel_id`.
#[must_use]
pub fn channel_to_chain(storage: &dyn Storage, channel_id: &str) -> Option<String> {
    load_string(storage, &key(keys::CHANNEL_TO_CHAIN, channel_id.as_bytes()))
}

/// Records that `channel_id` connects to `chain_id`.
pub fn set_chain_channel(storage: &mut dyn Storage, chain_id: &str, channel_id: &str) {
    storage.set(
        &chain_key(keys::CHAIN_TO_CHANNEL, chain_id),
        channel_id.as_bytes(),
    );
    storage.set(
        &key(keys::CHANNEL_TO_CHAIN, channel_id.as_bytes()),
        chain_id.as_bytes(),
    );
}

/// Forgets the channel of `chain_id`.
pub fn remove_chain_channel(storage: &mut dyn Storage, chain_id: &str) {
    if let Some(channel_id) = chain_to_channel(storage, chain_id) {
        storage.remove(&key(keys::CHANNEL_TO_CHAIN, channel_id.as_bytes()));
    }
    storage.remove(&chain_key(keys::CHAIN_TO_CHANNEL, chain_id));
}

/// Every `(chain id, channel id)` pair, ordered by chain id encoding.
#[must_use]
pub fn all_chain_channels(storage: &dyn Storage) -> Vec<(String, String)> {
    prefix_entries(storage, &[keys::CHAIN_TO_CHANNEL])
        .into_iter()
        .filter_map(|(k, v)| {
            let (chain_id, _) = split_chain_id(&k)?;
            Some((chain_id, String::from_utf8(v).ok()?))
        })
        .collect()
}

// init height

/// Height at which the channel of `chain_id` was established.
#[must_use]
pub fn init_chain_height(storage: &dyn Storage, chain_id: &str) -> Option<u64> {
    load_u64(storage, &chain_key(keys::INIT_CHAIN_HEIGHT, chain_id))
}

/// Stamps the height at which the channel of `chain_id` was established.
pub fn set_init_chain_height(storage: &mut dyn Storage, chain_id: &str, height: u64) {
    save_u64(storage, &chain_key(keys::INIT_CHAIN_HEIGHT, chain_id), height);
}

// vsc ids

/// The last change-set id queued for `chain_id`, 0 if none was.
#[must_use]
pub fn vsc_id_for_chain(storage: &dyn Storage, chain_id: &str) -> u64 {
    load_u64(storage, &chain_key(keys::VSC_ID_FOR_CHAIN, chain_id)).unwrap_or(0)
}

/// Overwrites the change-set counter of `chain_id`.
pub fn set_vsc_id_for_chain(storage: &mut dyn Storage, chain_id: &str, vsc_id: u64) {
    save_u64(storage, &chain_key(keys::VSC_ID_FOR_CHAIN, chain_id), vsc_id);
}

/// Increments the change-set counter of `chain_id` and returns the new id.
/// # Errors
/// Returns an error if the counter overflows.
pub fn next_vsc_id(storage: &mut dyn Storage, chain_id: &str) -> Result<u64, CoordinatorError> {
    let next = vsc_id_for_chain(storage, chain_id)
        .checked_add(1)
        .ok_or(appchain_types::ValidationError::Overflow("valset update id"))?;
    set_vsc_id_for_chain(storage, chain_id, next);
    Ok(next)
}

// pending packets

/// Change-sets queued for `chain_id`, oldest first.
/// # Errors
/// Returns an error if the queue cannot be decoded.
pub fn pending_vsc_packets(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<ValidatorSetChangePacketData>, CoordinatorError> {
    Ok(load_json(storage, &chain_key(keys::PENDING_VSC_PACKETS, chain_id))?.unwrap_or_default())
}

/// Replaces the queue of `chain_id`.
/// # Errors
/// Returns an error if the queue fails to serialize.
pub fn set_pending_vsc_packets(
    storage: &mut dyn Storage,
    chain_id: &str,
    packets: &[ValidatorSetChangePacketData],
) -> Result<(), CoordinatorError> {
    let key = chain_key(keys::PENDING_VSC_PACKETS, chain_id);
    if packets.is_empty() {
        storage.remove(&key);
        return Ok(());
    }
    Ok(save_json(storage, &key, &packets)?)
}

/// Appends a change-set to the queue of `chain_id`.
/// # Errors
/// Returns an error if the queue cannot be decoded or encoded.
pub fn append_pending_vsc_packet(
    storage: &mut dyn Storage,
    chain_id: &str,
    packet: ValidatorSetChangePacketData,
) -> Result<(), CoordinatorError> {
    let mut packets = pending_vsc_packets(storage, chain_id)?;
    packets.push(packet);
    set_pending_vsc_packets(storage, chain_id, &packets)
}

// validators

/// The validator record of `address` on `chain_id`.
/// # Errors
/// Returns an error if the record cannot be decoded.
pub fn subscriber_validator(
    storage: &dyn Storage,
    chain_id: &str,
    address: &ConsAddr,
) -> Result<Option<SubscriberValidator>, CoordinatorError> {
    Ok(load_json(
        storage,
        &chain_key_with_suffix(keys::SUBSCRIBER_VALIDATOR, chain_id, address.as_bytes()),
    )?)
}

/// Writes a validator record of `chain_id`.
/// # Errors
/// Returns an error if the record fails to serialize.
pub fn set_subscriber_validator(
    storage: &mut dyn Storage,
    chain_id: &str,
    validator: &SubscriberValidator,
) -> Result<(), CoordinatorError> {
    Ok(save_json(
        storage,
        &chain_key_with_suffix(
            keys::SUBSCRIBER_VALIDATOR,
            chain_id,
            validator.cons_address.as_bytes(),
        ),
        validator,
    )?)
}

/// Deletes the validator record of `address` on `chain_id`.
pub fn remove_subscriber_validator(storage: &mut dyn Storage, chain_id: &str, address: &ConsAddr) {
    storage.remove(&chain_key_with_suffix(
        keys::SUBSCRIBER_VALIDATOR,
        chain_id,
        address.as_bytes(),
    ));
}

/// Every validator record of `chain_id`, ordered by consensus address.
/// # Errors
/// Returns an error if a record cannot be decoded.
pub fn subscriber_validators(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<SubscriberValidator>, CoordinatorError> {
    prefix_entries(storage, &chain_key(keys::SUBSCRIBER_VALIDATOR, chain_id))
        .into_iter()
        .map(|(_, v)| Ok(serde_json::from_slice(&v)?))
        .collect()
}

// operator <-> consensus address

/// Records that `operator` runs the validator `address` on `chain_id`.
pub fn set_operator_cons_addr(
    storage: &mut dyn Storage,
    chain_id: &str,
    operator: &str,
    address: &ConsAddr,
) {
    storage.set(
        &chain_key_with_suffix(keys::OPERATOR_FOR_CONS_ADDR, chain_id, address.as_bytes()),
        operator.as_bytes(),
    );
    storage.set(
        &chain_key_with_suffix(keys::CONS_ADDR_FOR_OPERATOR, chain_id, operator.as_bytes()),
        address.as_bytes(),
    );
}

/// The operator running `address` on `chain_id`.
#[must_use]
pub fn operator_for_cons_addr(
    storage: &dyn Storage,
    chain_id: &str,
    address: &ConsAddr,
) -> Option<String> {
    load_string(
        storage,
        &chain_key_with_suffix(keys::OPERATOR_FOR_CONS_ADDR, chain_id, address.as_bytes()),
    )
}

/// The consensus address `operator` currently uses on `chain_id`.
#[must_use]
pub fn cons_addr_for_operator(
    storage: &dyn Storage,
    chain_id: &str,
    operator: &str,
) -> Option<ConsAddr> {
    storage
        .get(&chain_key_with_suffix(
            keys::CONS_ADDR_FOR_OPERATOR,
            chain_id,
            operator.as_bytes(),
        ))
        .and_then(|bytes| ConsAddr::try_from(bytes.as_slice()).ok())
}

/// Deletes the mapping of `address` on `chain_id`. The reverse entry is only deleted if
/// the operator still points at `address`.
pub fn remove_operator_for_cons_addr(storage: &mut dyn Storage, chain_id: &str, address: &ConsAddr) {
    if let Some(operator) = operator_for_cons_addr(storage, chain_id, address) {
        if cons_addr_for_operator(storage, chain_id, &operator).as_ref() == Some(address) {
            storage.remove(&chain_key_with_suffix(
                keys::CONS_ADDR_FOR_OPERATOR,
                chain_id,
                operator.as_bytes(),
            ));
        }
    }
    storage.remove(&chain_key_with_suffix(
        keys::OPERATOR_FOR_CONS_ADDR,
        chain_id,
        address.as_bytes(),
    ));
}

/// Every `(consensus address, operator)` pair of `chain_id`.
#[must_use]
pub fn operator_mappings(storage: &dyn Storage, chain_id: &str) -> Vec<(ConsAddr, String)> {
    prefix_entries(storage, &chain_key(keys::OPERATOR_FOR_CONS_ADDR, chain_id))
        .into_iter()
        .filter_map(|(k, v)| {
            Some((
                ConsAddr::try_from(k.as_slice()).ok()?,
                String::from_utf8(v).ok()?,
            ))
        })
        .collect()
}

// pruning

/// Schedules `address` for deletion once change-set `vsc_id` of `chain_id` matures.
/// # Errors
/// Returns an error if the prune list cannot be decoded or encoded.
pub fn append_cons_addr_to_prune(
    storage: &mut dyn Storage,
    chain_id: &str,
    vsc_id: u64,
    address: ConsAddr,
) -> Result<(), CoordinatorError> {
    let mut addresses = cons_addrs_to_prune(storage, chain_id, vsc_id)?;
    if !addresses.contains(&address) {
        addresses.push(address);
    }
    save_json(
        storage,
        &chain_key_with_suffix(keys::CONS_ADDRS_TO_PRUNE, chain_id, &vsc_id.to_be_bytes()),
        &addresses,
    )?;
    save_u64(
        storage,
        &chain_key_with_suffix(
            keys::MATURITY_VSC_ID_FOR_CONS_ADDR,
            chain_id,
            address.as_bytes(),
        ),
        vsc_id,
    );
    Ok(())
}

/// Addresses to delete once change-set `vsc_id` of `chain_id` matures.
/// # Errors
/// Returns an error if the list cannot be decoded.
pub fn cons_addrs_to_prune(
    storage: &dyn Storage,
    chain_id: &str,
    vsc_id: u64,
) -> Result<Vec<ConsAddr>, CoordinatorError> {
    Ok(load_json(
        storage,
        &chain_key_with_suffix(keys::CONS_ADDRS_TO_PRUNE, chain_id, &vsc_id.to_be_bytes()),
    )?
    .unwrap_or_default())
}

/// Every prune list of `chain_id`, by change-set id.
/// # Errors
/// Returns an error if a list cannot be decoded.
pub fn all_cons_addrs_to_prune(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<(u64, Vec<ConsAddr>)>, CoordinatorError> {
    prefix_entries(storage, &chain_key(keys::CONS_ADDRS_TO_PRUNE, chain_id))
        .into_iter()
        .filter_map(|(k, v)| Some((u64_from_be(&k)?, v)))
        .map(|(vsc_id, v)| Ok((vsc_id, serde_json::from_slice(&v)?)))
        .collect()
}

/// Deletes the prune list of change-set `vsc_id` and the reverse pointers of its entries.
pub fn remove_cons_addrs_to_prune(
    storage: &mut dyn Storage,
    chain_id: &str,
    vsc_id: u64,
    addresses: &[ConsAddr],
) {
    for address in addresses {
        storage.remove(&chain_key_with_suffix(
            keys::MATURITY_VSC_ID_FOR_CONS_ADDR,
            chain_id,
            address.as_bytes(),
        ));
    }
    storage.remove(&chain_key_with_suffix(
        keys::CONS_ADDRS_TO_PRUNE,
        chain_id,
        &vsc_id.to_be_bytes(),
    ));
}

/// The change-set whose maturity deletes `address`, if it is scheduled for pruning.
#[must_use]
pub fn maturity_vsc_id_for_cons_addr(
    storage: &dyn Storage,
    chain_id: &str,
    address: &ConsAddr,
) -> Option<u64> {
    load_u64(
        storage,
        &chain_key_with_suffix(
            keys::MATURITY_VSC_ID_FOR_CONS_ADDR,
            chain_id,
            address.as_bytes(),
        ),
    )
}

// epoch indexed timeouts

fn epoch_index_key(prefix: u8, position: &EpochPosition, chain_id: &str) -> Vec<u8> {
    let suffix = [&position.epoch_number.to_be_bytes()[..], chain_id.as_bytes()].concat();
    chain_key_with_suffix(prefix, &position.epoch_identifier, &suffix)
}

/// Index entries of `identifier` at or before `epoch_number`, oldest first.
fn due_index_entries(
    storage: &dyn Storage,
    prefix: u8,
    identifier: &str,
    epoch_number: u64,
) -> Vec<(EpochPosition, String)> {
    prefix_entries(storage, &chain_key(prefix, identifier))
        .into_iter()
        .filter_map(|(k, _)| {
            let (number, chain_id) = k.split_first_chunk::<8>()?;
            Some((
                EpochPosition::new(identifier, u64::from_be_bytes(*number)),
                String::from_utf8(chain_id.to_vec()).ok()?,
            ))
        })
        .take_while(|(position, _)| position.epoch_number <= epoch_number)
        .collect()
}

/// Schedules the handshake timeout of `chain_id`.
/// # Errors
/// Returns an error if the position fails to serialize.
pub fn set_init_timeout(
    storage: &mut dyn Storage,
    chain_id: &str,
    position: &EpochPosition,
) -> Result<(), CoordinatorError> {
    save_json(
        storage,
        &chain_key(keys::INIT_TIMEOUT_FOR_CHAIN, chain_id),
        position,
    )?;
    storage.set(
        &epoch_index_key(keys::INIT_TIMEOUT_INDEX, position, chain_id),
        &[1],
    );
    Ok(())
}

/// The handshake timeout of `chain_id`, if one is pending.
/// # Errors
/// Returns an error if the position cannot be decoded.
pub fn init_timeout(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Option<EpochPosition>, CoordinatorError> {
    Ok(load_json(
        storage,
        &chain_key(keys::INIT_TIMEOUT_FOR_CHAIN, chain_id),
    )?)
}

/// Clears the handshake timeout of `chain_id`. Returns whether one was pending.
/// # Errors
/// Returns an error if the position cannot be decoded.
pub fn remove_init_timeout(
    storage: &mut dyn Storage,
    chain_id: &str,
) -> Result<bool, CoordinatorError> {
    let Some(position) = init_timeout(storage, chain_id)? else {
        return Ok(false);
    };
    storage.remove(&epoch_index_key(
        keys::INIT_TIMEOUT_INDEX,
        &position,
        chain_id,
    ));
    storage.remove(&chain_key(keys::INIT_TIMEOUT_FOR_CHAIN, chain_id));
    Ok(true)
}

/// Handshake timeouts of `identifier` due at `epoch_number`.
#[must_use]
pub fn due_init_timeouts(
    storage: &dyn Storage,
    identifier: &str,
    epoch_number: u64,
) -> Vec<(EpochPosition, String)> {
    due_index_entries(storage, keys::INIT_TIMEOUT_INDEX, identifier, epoch_number)
}

/// Removes one handshake timeout index entry.
pub fn remove_init_timeout_index(storage: &mut dyn Storage, position: &EpochPosition, chain_id: &str) {
    storage.remove(&epoch_index_key(
        keys::INIT_TIMEOUT_INDEX,
        position,
        chain_id,
    ));
}

/// Records the maturity timeout of change-set `vsc_id` of `chain_id`.
/// # Errors
/// Returns an error if the position fails to serialize.
pub fn set_vsc_timeout(
    storage: &mut dyn Storage,
    chain_id: &str,
    vsc_id: u64,
    position: &EpochPosition,
) -> Result<(), CoordinatorError> {
    save_json(
        storage,
        &chain_key_with_suffix(keys::VSC_TIMEOUT, chain_id, &vsc_id.to_be_bytes()),
        position,
    )?;
    storage.set(
        &epoch_index_key(keys::VSC_TIMEOUT_INDEX, position, chain_id),
        &[1],
    );
    Ok(())
}

/// Outstanding change-sets of `chain_id` with their timeouts, oldest first.
/// # Errors
/// Returns an error if a position cannot be decoded.
pub fn vsc_timeouts(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Vec<(u64, EpochPosition)>, CoordinatorError> {
    prefix_entries(storage, &chain_key(keys::VSC_TIMEOUT, chain_id))
        .into_iter()
        .filter_map(|(k, v)| Some((u64_from_be(&k)?, v)))
        .map(|(vsc_id, v)| Ok((vsc_id, serde_json::from_slice(&v)?)))
        .collect()
}

/// Clears the timeout of change-set `vsc_id`. Returns whether one was recorded. The epoch
/// index entry is left to the next sweep.
pub fn remove_vsc_timeout(storage: &mut dyn Storage, chain_id: &str, vsc_id: u64) -> bool {
    let key = chain_key_with_suffix(keys::VSC_TIMEOUT, chain_id, &vsc_id.to_be_bytes());
    let existed = storage.get(&key).is_some();
    storage.remove(&key);
    existed
}

/// Maturity timeouts of `identifier` due at `epoch_number`.
#[must_use]
pub fn due_vsc_timeouts(
    storage: &dyn Storage,
    identifier: &str,
    epoch_number: u64,
) -> Vec<(EpochPosition, String)> {
    due_index_entries(storage, keys::VSC_TIMEOUT_INDEX, identifier, epoch_number)
}

/// Removes one maturity timeout index entry.
pub fn remove_vsc_timeout_index(storage: &mut dyn Storage, position: &EpochPosition, chain_id: &str) {
    storage.remove(&epoch_index_key(keys::VSC_TIMEOUT_INDEX, position, chain_id));
}

// registration

/// Queues a registration for the end of the given epoch.
/// # Errors
/// Returns an error if the queue cannot be decoded or encoded.
pub fn append_pending_subscriber_chain(
    storage: &mut dyn Storage,
    position: &EpochPosition,
    msg: RegisterSubscriberChainMsg,
) -> Result<(), CoordinatorError> {
    let key = pending_chains_key(position);
    let mut pending: Vec<RegisterSubscriberChainMsg> = load_json(storage, &key)?.unwrap_or_default();
    pending.push(msg);
    Ok(save_json(storage, &key, &pending)?)
}

/// Removes and returns the registrations queued for the end of the given epoch.
/// # Errors
/// Returns an error if the queue cannot be decoded.
pub fn take_pending_subscriber_chains(
    storage: &mut dyn Storage,
    position: &EpochPosition,
) -> Result<Vec<RegisterSubscriberChainMsg>, CoordinatorError> {
    let key = pending_chains_key(position);
    let pending = load_json(storage, &key)?.unwrap_or_default();
    storage.remove(&key);
    Ok(pending)
}

/// Every queued registration, grouped by the epoch whose end activates it.
/// # Errors
/// Returns an error if a queue cannot be decoded.
pub fn all_pending_subscriber_chains(
    storage: &dyn Storage,
) -> Result<Vec<(EpochPosition, Vec<RegisterSubscriberChainMsg>)>, CoordinatorError> {
    prefix_entries(storage, &[keys::PENDING_SUBSCRIBER_CHAINS])
        .into_iter()
        .filter_map(|(k, v)| {
            let (identifier, number) = split_chain_id(&k)?;
            Some((EpochPosition::new(identifier, u64_from_be(number)?), v))
        })
        .map(|(position, v)| Ok((position, serde_json::from_slice(&v)?)))
        .collect()
}

fn pending_chains_key(position: &EpochPosition) -> Vec<u8> {
    chain_key_with_suffix(
        keys::PENDING_SUBSCRIBER_CHAINS,
        &position.epoch_identifier,
        &position.epoch_number.to_be_bytes(),
    )
}

/// The registration of a chain whose client was created.
/// # Errors
/// Returns an error if the registration cannot be decoded.
pub fn chain_registration(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Option<RegisterSubscriberChainMsg>, CoordinatorError> {
    Ok(load_json(
        storage,
        &chain_key(keys::CHAIN_REGISTRATION, chain_id),
    )?)
}

/// Stores the registration of a chain.
/// # Errors
/// Returns an error if the registration fails to serialize.
pub fn set_chain_registration(
    storage: &mut dyn Storage,
    msg: &RegisterSubscriberChainMsg,
) -> Result<(), CoordinatorError> {
    Ok(save_json(
        storage,
        &chain_key(keys::CHAIN_REGISTRATION, &msg.chain_id),
        msg,
    )?)
}

/// Every stored registration.
/// # Errors
/// Returns an error if a registration cannot be decoded.
pub fn chain_registrations(
    storage: &dyn Storage,
) -> Result<Vec<RegisterSubscriberChainMsg>, CoordinatorError> {
    prefix_entries(storage, &[keys::CHAIN_REGISTRATION])
        .into_iter()
        .map(|(_, v)| Ok(serde_json::from_slice(&v)?))
        .collect()
}

// genesis snapshots

/// The genesis a chain was bootstrapped with, until its handshake completes.
/// # Errors
/// Returns an error if the genesis cannot be decoded.
pub fn subscriber_genesis(
    storage: &dyn Storage,
    chain_id: &str,
) -> Result<Option<SubscriberGenesisState>, CoordinatorError> {
    Ok(load_json(
        storage,
        &chain_key(keys::SUBSCRIBER_GENESIS, chain_id),
    )?)
}

/// Stores the genesis of a chain.
/// # Errors
/// Returns an error if the genesis fails to serialize.
pub fn set_subscriber_genesis(
    storage: &mut dyn Storage,
    chain_id: &str,
    genesis: &SubscriberGenesisState,
) -> Result<(), CoordinatorError> {
    Ok(save_json(
        storage,
        &chain_key(keys::SUBSCRIBER_GENESIS, chain_id),
        genesis,
    )?)
}

/// Deletes the genesis of a chain.
pub fn remove_subscriber_genesis(storage: &mut dyn Storage, chain_id: &str) {
    storage.remove(&chain_key(keys::SUBSCRIBER_GENESIS, chain_id));
}

// slash acks

/// Addresses whose slash was handled but not yet reported to `chain_id`.
/// # Errors
/// Returns an error if the list cannot be decoded.
pub fn slash_acks(storage: &dyn Storage, chain_id: &str) -> Result<Vec<String>, CoordinatorError> {
    Ok(load_json(storage, &chain_key(keys::PENDING_SLASH_ACKS, chain_id))?.unwrap_or_default())
}

/// Queues a slash acknowledgement for `chain_id`.
/// # Errors
/// Returns an error if the list cannot be decoded or encoded.
pub fn append_slash_ack(
    storage: &mut dyn Storage,
    chain_id: &str,
    address: String,
) -> Result<(), CoordinatorError> {
    let mut acks = slash_acks(storage, chain_id)?;
    acks.push(address);
    set_slash_acks(storage, chain_id, &acks)
}

/// Replaces the slash acknowledgements of `chain_id`.
/// # Errors
/// Returns an error if the list fails to serialize.
pub fn set_slash_acks(
    storage: &mut dyn Storage,
    chain_id: &str,
    acks: &[String],
) -> Result<(), CoordinatorError> {
    let key = chain_key(keys::PENDING_SLASH_ACKS, chain_id);
    if acks.is_empty() {
        storage.remove(&key);
        return Ok(());
    }
    Ok(save_json(storage, &key, &acks)?)
}

/// Removes and returns the slash acknowledgements of `chain_id`.
/// # Errors
/// Returns an error if the list cannot be decoded.
pub fn take_slash_acks(
    storage: &mut dyn Storage,
    chain_id: &str,
) -> Result<Vec<String>, CoordinatorError> {
    let acks = slash_acks(storage, chain_id)?;
    storage.remove(&chain_key(keys::PENDING_SLASH_ACKS, chain_id));
    Ok(acks)
}

// teardown

/// Height at which `chain_id` was stopped, if it was.
#[must_use]
pub fn stopped_height(storage: &dyn Storage, chain_id: &str) -> Option<u64> {
    load_u64(storage, &chain_key(keys::STOPPED_CHAIN, chain_id))
}

/// Marks `chain_id` as stopped.
pub fn set_stopped(storage: &mut dyn Storage, chain_id: &str, height: u64) {
    save_u64(storage, &chain_key(keys::STOPPED_CHAIN, chain_id), height);
}

/// Clears the stopped mark of `chain_id`.
pub fn remove_stopped(storage: &mut dyn Storage, chain_id: &str) {
    storage.remove(&chain_key(keys::STOPPED_CHAIN, chain_id));
}

/// Deletes every record of `chain_id` except the stopped mark.
/// # Errors
/// Returns an error if a timeout record cannot be decoded.
pub fn remove_chain_state(storage: &mut dyn Storage, chain_id: &str) -> Result<(), CoordinatorError> {
    remove_chain_client(storage, chain_id);
    remove_chain_channel(storage, chain_id);
    remove_init_timeout(storage, chain_id)?;
    for (_, position) in vsc_timeouts(storage, chain_id)? {
        remove_vsc_timeout_index(storage, &position, chain_id);
    }

    for prefix in [
        keys::INIT_CHAIN_HEIGHT,
        keys::VSC_ID_FOR_CHAIN,
        keys::PENDING_VSC_PACKETS,
        keys::CHAIN_REGISTRATION,
        keys::SUBSCRIBER_GENESIS,
        keys::PENDING_SLASH_ACKS,
    ] {
        storage.remove(&chain_key(prefix, chain_id));
    }
    for prefix in [
        keys::SUBSCRIBER_VALIDATOR,
        keys::OPERATOR_FOR_CONS_ADDR,
        keys::CONS_ADDR_FOR_OPERATOR,
        keys::CONS_ADDRS_TO_PRUNE,
        keys::MATURITY_VSC_ID_FOR_CONS_ADDR,
        keys::VSC_TIMEOUT,
    ] {
        remove_prefix(storage, &chain_key(prefix, chain_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use appchain_types::test_utils::consensus_key;
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    #[test]
    fn relations_are_written_both_ways() {
        let mut storage = MockStorage::new();
        set_chain_client(&mut storage, "appchain-1", "07-tendermint-0");
        set_chain_channel(&mut storage, "appchain-1", "channel-3");

        assert_eq!(client_to_chain(&storage, "07-tendermint-0").as_deref(), Some("appchain-1"));
        assert_eq!(channel_to_chain(&storage, "channel-3").as_deref(), Some("appchain-1"));

        remove_chain_channel(&mut storage, "appchain-1");
        assert_eq!(channel_to_chain(&storage, "channel-3"), None);
        assert_eq!(chain_to_channel(&storage, "appchain-1"), None);
        assert!(chain_to_client(&storage, "appchain-1").is_some());
    }

    #[test]
    fn reverse_operator_mapping_survives_a_key_change() {
        let mut storage = MockStorage::new();
        let old = consensus_key(1).address();
        let new = consensus_key(2).address();
        set_operator_cons_addr(&mut storage, "c", "op", &old);
        set_operator_cons_addr(&mut storage, "c", "op", &new);

        remove_operator_for_cons_addr(&mut storage, "c", &old);
        assert_eq!(operator_for_cons_addr(&storage, "c", &old), None);
        assert_eq!(operator_for_cons_addr(&storage, "c", &new).as_deref(), Some("op"));
        assert_eq!(cons_addr_for_operator(&storage, "c", "op"), Some(new));
    }

    #[test]
    fn due_timeouts_stop_at_the_epoch() {
        let mut storage = MockStorage::new();
        set_init_timeout(&mut storage, "a", &EpochPosition::new("week", 3)).unwrap();
        set_init_timeout(&mut storage, "b", &EpochPosition::new("week", 5)).unwrap();
        set_init_timeout(&mut storage, "c", &EpochPosition::new("day", 1)).unwrap();

        let due: Vec<String> = due_init_timeouts(&storage, "week", 4)
            .into_iter()
            .map(|(_, chain)| chain)
            .collect();
        assert_eq!(due, vec!["a".to_string()]);

        assert!(remove_init_timeout(&mut storage, "a").unwrap());
        assert!(!remove_init_timeout(&mut storage, "a").unwrap());
        assert!(due_init_timeouts(&storage, "week", 4).is_empty());
    }

    #[test]
    fn vsc_ids_start_at_one() {
        let mut storage = MockStorage::new();
        assert_eq!(vsc_id_for_chain(&storage, "c"), 0);
        assert_eq!(next_vsc_id(&mut storage, "c").unwrap(), 1);
        assert_eq!(next_vsc_id(&mut storage, "c").unwrap(), 2);
        assert_eq!(vsc_id_for_chain(&storage, "other"), 0);
    }

    #[test]
    fn removing_chain_state_leaves_other_chains() {
        let mut storage = MockStorage::new();
        for chain in ["a", "b"] {
            set_chain_client(&mut storage, chain, &format!("client-{chain}"));
            next_vsc_id(&mut storage, chain).unwrap();
            set_vsc_timeout(&mut storage, chain, 1, &EpochPosition::new("week", 2)).unwrap();
            set_operator_cons_addr(&mut storage, chain, "op", &consensus_key(1).address());
        }

        remove_chain_state(&mut storage, "a").unwrap();

        assert_eq!(chain_to_client(&storage, "a"), None);
        assert_eq!(vsc_id_for_chain(&storage, "a"), 0);
        assert!(vsc_timeouts(&storage, "a").unwrap().is_empty());
        assert!(operator_mappings(&storage, "a").is_empty());
        let due: Vec<String> = due_vsc_timeouts(&storage, "week", 2)
            .into_iter()
            .map(|(_, chain)| chain)
            .collect();
        assert_eq!(due, vec!["b".to_string()]);
        assert_eq!(vsc_id_for_chain(&storage, "b"), 1);
    }
}
