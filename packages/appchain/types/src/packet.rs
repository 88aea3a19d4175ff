//! Packet payloads exchanged over the coordinator <-> subscriber channel.
//!
//! All payloads are JSON encoded. The coordinator sends [`ValidatorSetChangePacketData`];
//! the subscriber answers with [`SubscriberPacketData`], either a slash request or a
//! maturity notice.

use cosmwasm_std::Binary;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    consensus_key::{ConsAddr, CONS_ADDR_LEN},
    ensure,
    error::ValidationError,
    validator::ValidatorUpdate,
};

/// Encodes a payload as JSON.
/// # Errors
/// Returns an error if serialization fails.
pub fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(data)
}

/// Decodes a JSON payload.
/// # Errors
/// Returns an error if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Validator set change sent from the coordinator to a subscriber.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetChangePacketData {
    /// Power changes, in canonical order
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Sequence number of this change-set on the chain
    pub valset_update_id: u64,
    /// Consensus addresses whose downtime slash has been handled
    #[serde(default)]
    pub slash_acks: Vec<String>,
}

impl ValidatorSetChangePacketData {
    /// Creates the packet.
    #[must_use]
    pub const fn new(
        validator_updates: Vec<ValidatorUpdate>,
        valset_update_id: u64,
        slash_acks: Vec<String>,
    ) -> Self {
        Self {
            validator_updates,
            valset_update_id,
            slash_acks,
        }
    }
}

/// Misbehaviour kinds. Only downtime is acted upon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Infraction {
    /// No infraction given
    Unspecified,
    /// Equivocation
    DoubleSign,
    /// Missed too many blocks
    Downtime,
}

/// The validator a slash request refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashedValidator {
    /// Consensus address bytes
    pub address: Binary,
    /// Power at the infraction height
    pub power: i64,
}

/// Slash request sent from a subscriber to the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashPacketData {
    /// The misbehaving validator
    pub validator: SlashedValidator,
    /// Change-set in force at the infraction height
    pub valset_update_id: u64,
    /// Kind of misbehaviour
    pub infraction: Infraction,
}

impl SlashPacketData {
    /// Creates a slash request.
    #[must_use]
    pub fn new(address: ConsAddr, power: i64, valset_update_id: u64, infraction: Infraction) -> Self {
        Self {
            validator: SlashedValidator {
                address: Binary::from(address.as_bytes().to_vec()),
                power,
            },
            valset_update_id,
            infraction,
        }
    }

    /// Stateless checks: a well formed address, positive power and a downtime infraction.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        ensure!(
            self.validator.address.len() == CONS_ADDR_LEN,
            ValidationError::InvalidAddressLength(self.validator.address.len())
        );
        ensure!(
            self.validator.power > 0,
            ValidationError::NonPositivePower(self.validator.power)
        );
        ensure!(
            self.infraction == Infraction::Downtime,
            ValidationError::UnsupportedInfraction(self.infraction)
        );
        Ok(())
    }

    /// The consensus address of the slashed validator.
    /// # Errors
    /// Returns an error if the address has the wrong length.
    pub fn cons_address(&self) -> Result<ConsAddr, ValidationError> {
        ConsAddr::try_from(self.validator.address.as_slice())
            .map_err(|_| ValidationError::InvalidAddressLength(self.validator.address.len()))
    }
}

/// Notice that a change-set has matured on the subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VscMaturedPacketData {
    /// The matured change-set
    pub valset_update_id: u64,
}

impl VscMaturedPacketData {
    /// Stateless checks.
    /// # Errors
    /// Returns an error for a zero valset update id.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        ensure!(
            self.valset_update_id != 0,
            ValidationError::ZeroValsetUpdateId
        );
        Ok(())
    }
}

/// Everything a subscriber sends to the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberPacketData {
    /// A slash request
    Slash(SlashPacketData),
    /// A maturity notice
    VscMatured(VscMaturedPacketData),
}
