//! Genesis state of a subscriber chain.
//!
//! The coordinator produces the new-chain form of [`SubscriberGenesisState`] when it creates
//! the subscriber's client. A restarting subscriber exports and re-imports the full form.

use cosmwasm_std::{Binary, Timestamp};
use ibc_proto::ibc::lightclients::tendermint::v1::{
    ClientState as TmClientState, ConsensusState as TmConsensusState,
};
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::{
    consensus_key::ConsAddr, ensure, error::ValidationError, packet::SubscriberPacketData,
    params::SubscriberParams, validator::ValidatorUpdate,
};

/// What a subscriber needs to know about the coordinator at genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorInfo {
    /// Protobuf encoded tendermint client state of the coordinator
    pub client_state: Binary,
    /// Protobuf encoded tendermint consensus state of the coordinator
    pub consensus_state: Binary,
    /// Validator set the subscriber starts with
    pub initial_val_set: Vec<ValidatorUpdate>,
}

impl CoordinatorInfo {
    /// Encodes the client and consensus state.
    #[must_use]
    pub fn new(
        client_state: &TmClientState,
        consensus_state: &TmConsensusState,
        initial_val_set: Vec<ValidatorUpdate>,
    ) -> Self {
        Self {
            client_state: Binary::from(client_state.encode_to_vec()),
            consensus_state: Binary::from(consensus_state.encode_to_vec()),
            initial_val_set,
        }
    }

    /// The coordinator's client state.
    /// # Errors
    /// Returns an error if the bytes do not decode.
    pub fn client_state(&self) -> Result<TmClientState, prost::DecodeError> {
        TmClientState::decode(self.client_state.as_slice())
    }

    /// The coordinator's consensus state.
    /// # Errors
    /// Returns an error if the bytes do not decode.
    pub fn consensus_state(&self) -> Result<TmConsensusState, prost::DecodeError> {
        TmConsensusState::decode(self.consensus_state.as_slice())
    }
}

/// A received change-set waiting for its maturity time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturingVscPacket {
    /// The change-set
    pub vsc_id: u64,
    /// Time at which it matures
    pub maturity_time: Timestamp,
}

/// The change-set in force from a height on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightToVscId {
    /// Block height
    pub height: u64,
    /// Change-set id
    pub vsc_id: u64,
}

/// Genesis state of the subscriber module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberGenesisState {
    /// Module parameters
    pub params: SubscriberParams,
    /// Coordinator client material and initial validator set
    pub coordinator: CoordinatorInfo,
    /// Whether the chain starts from scratch rather than restarting from exported state
    pub new_chain: bool,
    /// Whether the chain hands over from another coordinator. Unsupported.
    #[serde(default)]
    pub switchover: bool,
    /// Client of the coordinator, set on restart
    #[serde(default)]
    pub coordinator_client_id: String,
    /// Channel to the coordinator, set on restart if the handshake completed
    #[serde(default)]
    pub coordinator_channel_id: String,
    /// Change-sets that have not matured yet
    #[serde(default)]
    pub maturing_packets: Vec<MaturingVscPacket>,
    /// Height to change-set mapping
    #[serde(default)]
    pub height_to_valset_update_ids: Vec<HeightToVscId>,
    /// Validators with a downtime slash in flight
    #[serde(default)]
    pub outstanding_downtime: Vec<ConsAddr>,
    /// Packets not yet sent to the coordinator
    #[serde(default)]
    pub pending_packets: Vec<SubscriberPacketData>,
    /// Height of the last reward transmission
    #[serde(default)]
    pub last_transmission_height: u64,
}

impl SubscriberGenesisState {
    /// Genesis of a new chain as produced by the coordinator.
    #[must_use]
    pub const fn new_chain(params: SubscriberParams, coordinator: CoordinatorInfo) -> Self {
        Self {
            params,
            coordinator,
            new_chain: true,
            switchover: false,
            coordinator_client_id: String::new(),
            coordinator_channel_id: String::new(),
            maturing_packets: Vec::new(),
            height_to_valset_update_ids: Vec::new(),
            outstanding_downtime: Vec::new(),
            pending_packets: Vec::new(),
            last_transmission_height: 0,
        }
    }

    /// Stateless consistency checks.
    ///
    /// A new chain carries the coordinator's client material and no restart state. A
    /// restarting chain names its existing coordinator client.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: &str| ValidationError::InvalidGenesis(msg.to_string());

        self.params.validate()?;
        ensure!(
            !self.coordinator.initial_val_set.is_empty(),
            invalid("initial validator set is empty")
        );
        for update in &self.coordinator.initial_val_set {
            ensure!(
                update.power > 0,
                ValidationError::NonPositivePower(update.power)
            );
        }

        if self.new_chain {
            self.coordinator
                .client_state()
                .map_err(|e| invalid(&format!("coordinator client state: {e}")))?;
            self.coordinator
                .consensus_state()
                .map_err(|e| invalid(&format!("coordinator consensus state: {e}")))?;
            ensure!(
                self.coordinator_client_id.is_empty() && self.coordinator_channel_id.is_empty(),
                invalid("a new chain cannot name an existing client or channel")
            );
            ensure!(
                self.maturing_packets.is_empty()
                    && self.height_to_valset_update_ids.is_empty()
                    && self.outstanding_downtime.is_empty()
                    && self.pending_packets.is_empty(),
                invalid("a new chain cannot carry restart state")
            );
        } else {
            ensure!(
                !self.coordinator_client_id.is_empty(),
                invalid("a restarting chain must name its coordinator client")
            );
            for packet in &self.maturing_packets {
                ensure!(packet.vsc_id != 0, ValidationError::ZeroValsetUpdateId);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        light_client::{client_state_from_template, initial_consensus_state},
        params::TemplateClient,
        test_utils::consensus_key,
    };

    fn new_chain_genesis() -> SubscriberGenesisState {
        let client = client_state_from_template(
            &TemplateClient::default(),
            "coordinator-1",
            10,
            Duration::from_secs(10),
            Duration::from_secs(20),
        )
        .unwrap();
        let consensus = initial_consensus_state(Timestamp::from_seconds(1), vec![1; 32]).unwrap();
        SubscriberGenesisState::new_chain(
            SubscriberParams::default(),
            CoordinatorInfo::new(
                &client,
                &consensus,
                vec![ValidatorUpdate::new(consensus_key(1), 10)],
            ),
        )
    }

    #[test]
    fn new_chain_genesis_is_valid() {
        let genesis = new_chain_genesis();
        assert_eq!(genesis.validate(), Ok(()));
        assert_eq!(genesis.coordinator.client_state().unwrap().chain_id, "coordinator-1");
    }

    #[test]
    fn new_chain_rejects_restart_state() {
        let mut genesis = new_chain_genesis();
        genesis.coordinator_client_id = "07-tendermint-0".to_string();
        assert!(matches!(
            genesis.validate(),
            Err(ValidationError::InvalidGenesis(_))
        ));
    }

    #[test]
    fn restart_requires_client_id() {
        let mut genesis = new_chain_genesis();
        genesis.new_chain = false;
        assert!(genesis.validate().is_err());

        genesis.coordinator_client_id = "07-tendermint-0".to_string();
        genesis.maturing_packets.push(MaturingVscPacket {
            vsc_id: 3,
            maturity_time: Timestamp::from_seconds(100),
        });
        assert_eq!(genesis.validate(), Ok(()));
    }

    #[test]
    fn empty_validator_set_is_rejected() {
        let mut genesis = new_chain_genesis();
        genesis.coordinator.initial_val_set.clear();
        assert!(genesis.validate().is_err());
    }
}
