//! Collaborators the coordinator consumes: the restaking engine and epoch scheduling.

use std::time::Duration;

use appchain_types::consensus_key::{ConsAddr, ConsensusKey};
use cosmwasm_std::{Decimal, Storage};
use thiserror::Error;

use crate::msg::RegisterSubscriberChainMsg;

/// Failure reported by the restaking engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RestakingError(pub String);

/// An operator opted into a subscriber chain, with its key and voting power there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorPower {
    /// Operator account
    pub operator: String,
    /// Consensus key the operator runs the chain's validator with
    pub consensus_key: ConsensusKey,
    /// Voting power
    pub power: i64,
}

/// A downtime slash request resolved to the operator it targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashRequest {
    /// Chain the infraction happened on
    pub chain_id: String,
    /// Operator running the validator
    pub operator: String,
    /// Consensus address of the validator
    pub cons_address: ConsAddr,
    /// Power at the infraction height
    pub power: i64,
    /// Change-set in force at the infraction height
    pub valset_update_id: u64,
}

/// The restaking engine accounting operator stake.
pub trait RestakingKeeper {
    /// Registers `msg.chain_id` as a service operators can opt into.
    /// # Errors
    /// Returns an error if the service cannot be registered.
    fn register_subscriber_avs(
        &mut self,
        storage: &mut dyn Storage,
        msg: &RegisterSubscriberChainMsg,
    ) -> Result<(), RestakingError>;

    /// Removes the service registered for `chain_id`.
    /// # Errors
    /// Returns an error if the service cannot be removed.
    fn delete_subscriber_avs(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
    ) -> Result<(), RestakingError>;

    /// Operators opted into `chain_id` with their keys and powers, in a deterministic order.
    fn active_operators(&self, storage: &dyn Storage, chain_id: &str) -> Vec<OperatorPower>;

    /// Unbonding period of the coordinator chain.
    fn unbonding_duration(&self, storage: &dyn Storage) -> Duration;

    /// Restaking-side checks of a slash request.
    /// # Errors
    /// Returns an error if the slash must not be executed.
    fn validate_slash(
        &self,
        storage: &dyn Storage,
        request: &SlashRequest,
    ) -> Result<(), RestakingError>;

    /// Slashes `fraction` of the operator's stake backing the chain.
    /// # Errors
    /// Returns an error if the slash cannot be applied.
    fn slash(
        &mut self,
        storage: &mut dyn Storage,
        request: &SlashRequest,
        fraction: Decimal,
    ) -> Result<(), RestakingError>;

    /// Jails the operator on the chain for `duration`.
    /// # Errors
    /// Returns an error if the operator cannot be jailed.
    fn jail(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
        operator: &str,
        duration: Duration,
    ) -> Result<(), RestakingError>;
}

/// Progress of one epoch schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochInfo {
    /// Identifier of the schedule
    pub identifier: String,
    /// Number of the epoch currently running
    pub current_epoch: u64,
}

/// Epoch scheduling.
pub trait EpochsKeeper {
    /// The schedule with the given identifier, if it exists.
    fn epoch_info(&self, storage: &dyn Storage, identifier: &str) -> Option<EpochInfo>;
}
