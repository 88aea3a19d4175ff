//! Bootstrap of a subscriber chain: its light client, its initial validator set and the
//! genesis it starts from.

use appchain_types::{
    ensure,
    events::{chain_event, ATTRIBUTE_CLIENT_ID, EVENT_TYPE_SUBSCRIBER_CLIENT_CREATED},
    genesis::{CoordinatorInfo, SubscriberGenesisState},
    host::IbcHost,
    light_client::{
        client_state_from_template, initial_consensus_state, trusting_period, validator_set_hash,
    },
    validator::{SubscriberValidator, ValidatorUpdate},
};
use cosmwasm_std::{Env, Event, Storage};

use crate::{
    error::CoordinatorError,
    keepers::{EpochsKeeper, RestakingKeeper},
    msg::RegisterSubscriberChainMsg,
    state::{self, EpochPosition},
    validator_set::select_validators,
    Coordinator,
};

/// Revision height of a subscriber client at creation.
const INITIAL_REVISION_HEIGHT: u64 = 1;

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Creates the light client of a registered chain and records everything the chain
    /// starts from. Meant to run inside an overlay: on error, partial writes must be
    /// discarded by the caller.
    /// # Errors
    /// Returns an error if the chain already has a client, no operator has positive power
    /// on it, the init timeout epoch is unknown or the host rejects the client.
    pub fn create_client_for_subscriber(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        msg: &RegisterSubscriberChainMsg,
    ) -> Result<Vec<Event>, CoordinatorError> {
        let chain_id = msg.chain_id.as_str();
        ensure!(
            state::chain_to_client(storage, chain_id).is_none(),
            CoordinatorError::SubscriberChainAlreadyRegistered(chain_id.to_string())
        );
        let params = state::params(storage)?;

        let operators = select_validators(
            self.restaking.active_operators(storage, chain_id),
            msg.max_validators,
        );
        ensure!(
            !operators.is_empty(),
            CoordinatorError::NoOperators(chain_id.to_string())
        );
        let initial_val_set: Vec<ValidatorUpdate> = operators
            .iter()
            .map(|op| ValidatorUpdate::new(op.consensus_key.clone(), op.power))
            .collect();

        let unbonding = msg.subscriber_params.unbonding_period;
        let client_state = client_state_from_template(
            &params.template_client,
            chain_id,
            INITIAL_REVISION_HEIGHT,
            trusting_period(unbonding, params.trusting_period_fraction)?,
            unbonding,
        )?;
        let consensus_state =
            initial_consensus_state(env.block.time, validator_set_hash(&initial_val_set)?)?;
        let client_id = self
            .ibc
            .create_client(storage, client_state, consensus_state)?;

        state::set_chain_client(storage, chain_id, &client_id);
        for op in operators {
            let record = SubscriberValidator::new(op.consensus_key, op.power);
            state::set_subscriber_validator(storage, chain_id, &record)?;
            state::set_operator_cons_addr(storage, chain_id, &op.operator, &record.cons_address);
        }
        state::set_chain_registration(storage, msg)?;

        let coordinator_unbonding = self.restaking.unbonding_duration(storage);
        let coordinator_client = client_state_from_template(
            &params.template_client,
            &env.block.chain_id,
            env.block.height,
            trusting_period(coordinator_unbonding, params.trusting_period_fraction)?,
            coordinator_unbonding,
        )?;
        let coordinator_consensus = self.ibc.self_consensus_state(storage, &env.block)?;
        let genesis = SubscriberGenesisState::new_chain(
            msg.subscriber_params.clone(),
            CoordinatorInfo::new(&coordinator_client, &coordinator_consensus, initial_val_set),
        );
        state::set_subscriber_genesis(storage, chain_id, &genesis)?;

        let period = &params.init_timeout_period;
        let epoch = self
            .epochs
            .epoch_info(storage, &period.epoch_identifier)
            .ok_or_else(|| CoordinatorError::EpochNotFound(period.epoch_identifier.clone()))?;
        state::set_init_timeout(
            storage,
            chain_id,
            &EpochPosition::new(
                &period.epoch_identifier,
                epoch.current_epoch.saturating_add(period.epochs),
            ),
        )?;
        state::remove_stopped(storage, chain_id);

        tracing::info!(%chain_id, %client_id, "created subscriber client");
        Ok(vec![chain_event(EVENT_TYPE_SUBSCRIBER_CLIENT_CREATED, chain_id)
            .add_attribute(ATTRIBUTE_CLIENT_ID, client_id)])
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::{
        light_client::{revision_number_from_chain_id, SENTINEL_ROOT},
        params::DEFAULT_TIMEOUT_EPOCH_IDENTIFIER,
        test_utils::consensus_key,
        HostError,
    };
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::test_utils::{coordinator, register_msg, CHAIN_ID, HOUR, WEEK_EPOCH};

    #[test]
    fn bootstrap_caps_the_initial_set() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator(&mut storage);
        for (seed, power) in [(1, 10), (2, 30), (3, 20)] {
            coordinator.restaking.set_power(CHAIN_ID, seed, power);
        }

        let events = coordinator
            .create_client_for_subscriber(&mut storage, &env, &register_msg(CHAIN_ID, HOUR, 2))
            .unwrap();
        assert_eq!(events[0].ty, EVENT_TYPE_SUBSCRIBER_CLIENT_CREATED);

        let genesis = state::subscriber_genesis(&storage, CHAIN_ID).unwrap().unwrap();
        assert_eq!(
            genesis.coordinator.initial_val_set,
            vec![
                ValidatorUpdate::new(consensus_key(2), 30),
                ValidatorUpdate::new(consensus_key(3), 20),
            ]
        );
        assert!(genesis.new_chain);
        assert_eq!(
            state::subscriber_validator(&storage, CHAIN_ID, &consensus_key(1).address()).unwrap(),
            None
        );
        assert_eq!(
            state::operator_for_cons_addr(&storage, CHAIN_ID, &consensus_key(2).address()).as_deref(),
            Some("operator-2")
        );
        let coordinator_client = genesis.coordinator.client_state().unwrap();
        assert_eq!(coordinator_client.chain_id, env.block.chain_id);
        assert_eq!(
            coordinator_client.latest_height.unwrap().revision_height,
            env.block.height
        );
    }

    #[test]
    fn subscriber_client_follows_the_template() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut coordinator = coordinator(&mut storage);
        coordinator.restaking.set_power(CHAIN_ID, 1, 10);

        coordinator
            .create_client_for_subscriber(&mut storage, &env, &register_msg(CHAIN_ID, HOUR, 2))
            .unwrap();

        let client_id = state::chain_to_client(&storage, CHAIN_ID).unwrap();
        assert_eq!(coordinator.ibc.client_chain_id(&storage, &client_id).unwrap(), CHAIN_ID);
        assert_eq!(state::client_to_chain(&storage, &client_id).as_deref(), Some(CHAIN_ID));
        assert_eq!(revision_number_from_chain_id(CHAIN_ID), 1);

        let timeout = state::init_timeout(&storage, CHAIN_ID).unwrap().unwrap();
        assert_eq!(timeout.epoch_identifier, DEFAULT_TIMEOUT_EPOCH_IDENTIFIER);
        assert_eq!(timeout.epoch_number, WEEK_EPOCH + 4);
        assert!(state::chain_registration(&storage, CHAIN_ID).unwrap().is_some());

        let consensus = initial_consensus_state(
            env.block.time,
            validator_set_hash(&[ValidatorUpdate::new(consensus_key(1), 10)]).unwrap(),
        )
        .unwrap();
        assert_eq!(consensus.root.unwrap().hash, SENTINEL_ROOT);
    }

    #[test]
    fn no_operators_fails() {
        let mut storage = MockStorage::new();
        let mut coordinator = coordinator(&mut storage);
        coordinator.restaking.set_power(CHAIN_ID, 1, 0);

        let err = coordinator
            .create_client_for_subscriber(&mut storage, &mock_env(), &register_msg(CHAIN_ID, HOUR, 2))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NoOperators(_)));
    }

    #[test]
    fn host_rejection_is_returned() {
        let mut storage = MockStorage::new();
        let mut coordinator = coordinator(&mut storage);
        coordinator.restaking.set_power(CHAIN_ID, 1, 10);
        coordinator.ibc.create_client_error = Some(HostError::Other("rejected".into()));

        let err = coordinator
            .create_client_for_subscriber(&mut storage, &mock_env(), &register_msg(CHAIN_ID, HOUR, 2))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Host(_)));
        assert_eq!(state::chain_to_client(&storage, CHAIN_ID), None);
    }
}
