//! Genesis import and export of the coordinator module.

use std::collections::BTreeSet;

use appchain_types::{
    consensus_key::ConsAddr,
    ensure,
    genesis::SubscriberGenesisState,
    handshake::COORDINATOR_PORT_ID,
    host::IbcHost,
    packet::ValidatorSetChangePacketData,
    params::CoordinatorParams,
    validator::SubscriberValidator,
    ValidationError,
};
use cosmwasm_std::Storage;
use serde::{Deserialize, Serialize};

use crate::{
    error::CoordinatorError,
    keepers::{EpochsKeeper, RestakingKeeper},
    msg::RegisterSubscriberChainMsg,
    state::{self, EpochPosition},
    Coordinator,
};

/// The slashing mapping of one validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMapping {
    /// Consensus address of the validator
    pub cons_address: ConsAddr,
    /// Operator running it
    pub operator: String,
}

/// Consensus addresses deleted once a change-set matures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneEntry {
    /// The change-set
    pub vsc_id: u64,
    /// Addresses to delete
    pub addresses: Vec<ConsAddr>,
}

/// Maturity deadline of a sent change-set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VscTimeout {
    /// The change-set
    pub vsc_id: u64,
    /// Epoch at whose end the chain is stopped if it has not matured
    pub timeout: EpochPosition,
}

/// Everything the coordinator stores about one chain with a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// The registration the chain was created from
    pub registration: RegisterSubscriberChainMsg,
    /// Light client of the chain
    pub client_id: String,
    /// Established channel, if any
    pub channel_id: Option<String>,
    /// Height at which the channel was established
    pub init_chain_height: Option<u64>,
    /// Last queued change-set id
    pub vsc_id: u64,
    /// Change-sets waiting to be sent
    pub pending_packets: Vec<ValidatorSetChangePacketData>,
    /// Current validator records
    pub validators: Vec<SubscriberValidator>,
    /// Slashing mappings
    pub operators: Vec<OperatorMapping>,
    /// Addresses waiting for a change-set to mature
    pub cons_addrs_to_prune: Vec<PruneEntry>,
    /// Handshake deadline, until the channel is established
    pub init_timeout: Option<EpochPosition>,
    /// Maturity deadlines of sent change-sets
    pub vsc_timeouts: Vec<VscTimeout>,
    /// Genesis handed to the chain, until the channel is established
    pub subscriber_genesis: Option<SubscriberGenesisState>,
    /// Slash acknowledgements waiting for the next change-set
    pub slash_acks: Vec<String>,
}

/// Registrations waiting for the end of an epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChains {
    /// The epoch whose end activates them
    pub position: EpochPosition,
    /// The registrations
    pub chains: Vec<RegisterSubscriberChainMsg>,
}

/// Genesis state of the coordinator module.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Module parameters
    pub params: CoordinatorParams,
    /// Chains with a client
    #[serde(default)]
    pub chains: Vec<ChainState>,
    /// Registrations not yet activated
    #[serde(default)]
    pub pending_chains: Vec<PendingChains>,
}

impl GenesisState {
    /// Stateless checks.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.params.validate()?;

        let mut chain_ids = BTreeSet::new();
        let mut client_ids = BTreeSet::new();
        let mut channel_ids = BTreeSet::new();
        for chain in &self.chains {
            chain.registration.validate_basic()?;
            let chain_id = chain.registration.chain_id.as_str();
            ensure!(
                chain_ids.insert(chain_id),
                ValidationError::InvalidGenesis(format!("duplicate chain {chain_id}"))
            );
            ensure!(
                client_ids.insert(chain.client_id.as_str()),
                ValidationError::InvalidGenesis(format!("duplicate client {}", chain.client_id))
            );
            if let Some(channel_id) = &chain.channel_id {
                ensure!(
                    channel_ids.insert(channel_id.as_str()),
                    ValidationError::InvalidGenesis(format!("duplicate channel {channel_id}"))
                );
            }
            for packet in &chain.pending_packets {
                ensure!(
                    packet.valset_update_id <= chain.vsc_id,
                    ValidationError::InvalidGenesis(format!(
                        "chain {chain_id} has a pending packet ahead of its vsc id"
                    ))
                );
            }
        }
        for pending in &self.pending_chains {
            for msg in &pending.chains {
                msg.validate_basic()?;
            }
        }
        Ok(())
    }
}

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Binds the coordinator port and imports `genesis`.
    /// # Errors
    /// Returns an error if the genesis is invalid or the port is already bound.
    pub fn init_genesis(
        &mut self,
        storage: &mut dyn Storage,
        genesis: &GenesisState,
    ) -> Result<(), CoordinatorError> {
        genesis.validate()?;
        self.ibc.bind_port(storage, COORDINATOR_PORT_ID)?;
        state::set_params(storage, &genesis.params)?;

        for chain in &genesis.chains {
            import_chain(storage, chain)?;
        }
        for pending in &genesis.pending_chains {
            for msg in &pending.chains {
                state::append_pending_subscriber_chain(storage, &pending.position, msg.clone())?;
            }
        }

        tracing::info!(
            chains = genesis.chains.len(),
            pending = genesis.pending_chains.len(),
            "initialized coordinator genesis"
        );
        Ok(())
    }
}

fn import_chain(storage: &mut dyn Storage, chain: &ChainState) -> Result<(), CoordinatorError> {
    let chain_id = chain.registration.chain_id.as_str();
    state::set_chain_registration(storage, &chain.registration)?;
    state::set_chain_client(storage, chain_id, &chain.client_id);
    if let Some(channel_id) = &chain.channel_id {
        state::set_chain_channel(storage, chain_id, channel_id);
    }
    if let Some(height) = chain.init_chain_height {
        state::set_init_chain_height(storage, chain_id, height);
    }
    state::set_vsc_id_for_chain(storage, chain_id, chain.vsc_id);
    state::set_pending_vsc_packets(storage, chain_id, &chain.pending_packets)?;
    for validator in &chain.validators {
        state::set_subscriber_validator(storage, chain_id, validator)?;
    }
    for mapping in &chain.operators {
        state::set_operator_cons_addr(storage, chain_id, &mapping.operator, &mapping.cons_address);
    }
    for entry in &chain.cons_addrs_to_prune {
        for address in &entry.addresses {
            state::append_cons_addr_to_prune(storage, chain_id, entry.vsc_id, *address)?;
        }
    }
    if let Some(timeout) = &chain.init_timeout {
        state::set_init_timeout(storage, chain_id, timeout)?;
    }
    for entry in &chain.vsc_timeouts {
        state::set_vsc_timeout(storage, chain_id, entry.vsc_id, &entry.timeout)?;
    }
    if let Some(genesis) = &chain.subscriber_genesis {
        state::set_subscriber_genesis(storage, chain_id, genesis)?;
    }
    state::set_slash_acks(storage, chain_id, &chain.slash_acks)
}

/// Exports the module state.
/// # Errors
/// Returns an error if stored state cannot be decoded.
pub fn export_genesis(storage: &dyn Storage) -> Result<GenesisState, CoordinatorError> {
    let chains = state::chain_registrations(storage)?
        .into_iter()
        .filter_map(|registration| {
            let client_id = state::chain_to_client(storage, &registration.chain_id)?;
            Some(export_chain(storage, registration, client_id))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let pending_chains = state::all_pending_subscriber_chains(storage)?
        .into_iter()
        .map(|(position, chains)| PendingChains { position, chains })
        .collect();

    Ok(GenesisState {
        params: state::params(storage)?,
        chains,
        pending_chains,
    })
}

fn export_chain(
    storage: &dyn Storage,
    registration: RegisterSubscriberChainMsg,
    client_id: String,
) -> Result<ChainState, CoordinatorError> {
    let chain_id = registration.chain_id.as_str();
    Ok(ChainState {
        client_id,
        channel_id: state::chain_to_channel(storage, chain_id),
        init_chain_height: state::init_chain_height(storage, chain_id),
        vsc_id: state::vsc_id_for_chain(storage, chain_id),
        pending_packets: state::pending_vsc_packets(storage, chain_id)?,
        validators: state::subscriber_validators(storage, chain_id)?,
        operators: state::operator_mappings(storage, chain_id)
            .into_iter()
            .map(|(cons_address, operator)| OperatorMapping {
                cons_address,
                operator,
            })
            .collect(),
        cons_addrs_to_prune: state::all_cons_addrs_to_prune(storage, chain_id)?
            .into_iter()
            .map(|(vsc_id, addresses)| PruneEntry { vsc_id, addresses })
            .collect(),
        init_timeout: state::init_timeout(storage, chain_id)?,
        vsc_timeouts: state::vsc_timeouts(storage, chain_id)?
            .into_iter()
            .map(|(vsc_id, timeout)| VscTimeout { vsc_id, timeout })
            .collect(),
        subscriber_genesis: state::subscriber_genesis(storage, chain_id)?,
        slash_acks: state::slash_acks(storage, chain_id)?,
        registration,
    })
}
