//! Messages accepted by the coordinator.

use appchain_types::{
    ensure,
    params::{validate_asset_id, validate_chain_id, validate_epoch_identifier, SubscriberParams},
    ValidationError,
};
use serde::{Deserialize, Serialize};

/// Request to register a new subscriber chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSubscriberChainMsg {
    /// Chain id of the subscriber
    pub chain_id: String,
    /// Epoch schedule the chain's validator set follows
    pub epoch_identifier: String,
    /// Assets whose restaked value secures the chain
    pub asset_ids: Vec<String>,
    /// Minimum self delegation, in USD, of an operator opting in
    pub min_self_delegation_usd: u64,
    /// Cap on the size of the validator set
    pub max_validators: u32,
    /// Parameters the subscriber starts with
    pub subscriber_params: SubscriberParams,
}

impl RegisterSubscriberChainMsg {
    /// Stateless checks.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        validate_chain_id(&self.chain_id)?;
        validate_epoch_identifier(&self.epoch_identifier)?;
        ensure!(!self.asset_ids.is_empty(), ValidationError::NoAssetIds);
        for asset_id in &self.asset_ids {
            validate_asset_id(asset_id)?;
        }
        ensure!(
            self.max_validators > 0,
            ValidationError::ZeroValue("max_validators")
        );
        self.subscriber_params.validate()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_utils::register_msg;

    #[test]
    fn valid_registration() {
        assert_eq!(register_msg("appchain-1", "hour", 2).validate_basic(), Ok(()));
    }

    #[rstest]
    #[case::blank_chain(RegisterSubscriberChainMsg { chain_id: " ".into(), ..register_msg("a-1", "hour", 2) }, ValidationError::BlankChainId)]
    #[case::blank_epoch(RegisterSubscriberChainMsg { epoch_identifier: String::new(), ..register_msg("a-1", "hour", 2) }, ValidationError::BlankEpochIdentifier)]
    #[case::no_assets(RegisterSubscriberChainMsg { asset_ids: vec![], ..register_msg("a-1", "hour", 2) }, ValidationError::NoAssetIds)]
    #[case::bad_asset(RegisterSubscriberChainMsg { asset_ids: vec!["usdt".into()], ..register_msg("a-1", "hour", 2) }, ValidationError::InvalidAssetId("usdt".into()))]
    #[case::no_validators(register_msg("a-1", "hour", 0), ValidationError::ZeroValue("max_validators"))]
    fn invalid_registrations(
        #[case] msg: RegisterSubscriberChainMsg,
        #[case] expected: ValidationError,
    ) {
        assert_eq!(msg.validate_basic(), Err(expected));
    }
}
