//! Genesis import and export of the subscriber module.

use appchain_types::{
    genesis::{CoordinatorInfo, SubscriberGenesisState},
    handshake::SUBSCRIBER_PORT_ID,
    host::IbcHost,
    params::SubscriberParams,
};
use cosmwasm_std::{Binary, Env, Storage};
use tendermint_proto::abci::ValidatorUpdate as AbciValidatorUpdate;

use crate::{
    distribution::FeePool, error::SubscriberError, state, validators::apply_validator_changes,
    Subscriber,
};

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Imports the module state and returns the initial validator set for the consensus
    /// engine.
    ///
    /// A new chain creates its client of the coordinator from the genesis material. A
    /// restarting chain restores the state exported by [`export_genesis`].
    /// # Errors
    /// Returns an error if the genesis is invalid, asks for a switchover, or the port or
    /// client cannot be set up.
    pub fn init_genesis(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        genesis: &SubscriberGenesisState,
    ) -> Result<Vec<AbciValidatorUpdate>, SubscriberError> {
        genesis.validate()?;
        if genesis.switchover {
            return Err(SubscriberError::SwitchoverUnsupported);
        }

        self.ibc.bind_port(storage, SUBSCRIBER_PORT_ID)?;
        state::set_params(storage, &genesis.params)?;
        if !genesis.params.coordinator_fee_pool_addr.is_empty() {
            state::set_coordinator_fee_pool_addr(storage, &genesis.params.coordinator_fee_pool_addr);
        }
        if !genesis.params.distribution_transmission_channel.is_empty() {
            state::set_transfer_channel(storage, &genesis.params.distribution_transmission_channel);
        }

        if genesis.new_chain {
            let client_id = self.ibc.create_client(
                storage,
                genesis.coordinator.client_state()?,
                genesis.coordinator.consensus_state()?,
            )?;
            state::set_coordinator_client_id(storage, &client_id);
            state::set_height_valset_update_id(storage, env.block.height, 0);
            tracing::info!(%client_id, height = env.block.height, "created coordinator client");
        } else {
            restore(storage, genesis)?;
            tracing::info!(
                client_id = %genesis.coordinator_client_id,
                channel_id = %genesis.coordinator_channel_id,
                "restored subscriber state"
            );
        }

        let applied = apply_validator_changes(storage, &genesis.coordinator.initial_val_set)?;
        Ok(applied.iter().map(|u| u.to_abci()).collect())
    }
}

fn restore(storage: &mut dyn Storage, genesis: &SubscriberGenesisState) -> Result<(), SubscriberError> {
    state::set_coordinator_client_id(storage, &genesis.coordinator_client_id);
    if !genesis.coordinator_channel_id.is_empty() {
        state::set_coordinator_channel(storage, &genesis.coordinator_channel_id);
    }
    state::set_pending_packets(storage, &genesis.pending_packets)?;
    for packet in &genesis.maturing_packets {
        state::set_packet_maturity_time(storage, packet.vsc_id, packet.maturity_time);
    }
    for entry in &genesis.height_to_valset_update_ids {
        state::set_height_valset_update_id(storage, entry.height, entry.vsc_id);
    }
    for address in &genesis.outstanding_downtime {
        state::set_outstanding_downtime(storage, address);
    }
    state::set_last_transmission_height(storage, genesis.last_transmission_height);
    Ok(())
}

/// Exports the module state in the restart form accepted by
/// [`Subscriber::init_genesis`].
/// # Errors
/// Returns an error if the params are not set or a record cannot be decoded.
pub fn export_genesis(storage: &dyn Storage) -> Result<SubscriberGenesisState, SubscriberError> {
    let params = SubscriberParams {
        coordinator_fee_pool_addr: state::coordinator_fee_pool_addr(storage).unwrap_or_default(),
        distribution_transmission_channel: state::transfer_channel(storage).unwrap_or_default(),
        ..state::params(storage)?
    };
    let initial_val_set = state::subscriber_validators(storage)?
        .iter()
        .map(appchain_types::validator::SubscriberValidator::to_update)
        .collect();

    Ok(SubscriberGenesisState {
        params,
        coordinator: CoordinatorInfo {
            client_state: Binary::default(),
            consensus_state: Binary::default(),
            initial_val_set,
        },
        new_chain: false,
        switchover: false,
        coordinator_client_id: state::coordinator_client_id(storage).unwrap_or_default(),
        coordinator_channel_id: state::coordinator_channel(storage).unwrap_or_default(),
        maturing_packets: state::maturing_packets(storage),
        height_to_valset_update_ids: state::height_valset_update_ids(storage),
        outstanding_downtime: state::all_outstanding_downtime(storage),
        pending_packets: state::pending_packets(storage)?,
        last_transmission_height: state::last_transmission_height(storage),
    })
}

#[cfg(test)]
mod tests {
    use appchain_types::{
        packet::{Infraction, SlashPacketData, SubscriberPacketData},
        test_utils::{consensus_key, MockIbcHost},
        validator::ValidatorUpdate,
    };
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::test_utils::{new_chain_genesis, MockFeePool, TestSubscriber, COORDINATOR_CHAIN_ID};

    #[test]
    fn new_chain_creates_the_client() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut subscriber = TestSubscriber::new(MockIbcHost::default(), MockFeePool::default());

        let updates = subscriber
            .init_genesis(&mut storage, &env, &new_chain_genesis(&[(1, 100), (2, 50)]))
            .unwrap();

        assert_eq!(updates.len(), 2);
        let client_id = state::coordinator_client_id(&storage).unwrap();
        assert_eq!(
            subscriber.ibc.client_chain_id(&storage, &client_id).unwrap(),
            COORDINATOR_CHAIN_ID
        );
        assert_eq!(subscriber.ibc.bound_ports, vec![SUBSCRIBER_PORT_ID.to_string()]);
        assert_eq!(state::valset_update_id_at_height(&storage, env.block.height), Some(0));
        assert_eq!(state::subscriber_validators(&storage).unwrap().len(), 2);
    }

    #[test]
    fn switchover_is_refused() {
        let mut storage = MockStorage::new();
        let mut subscriber = TestSubscriber::new(MockIbcHost::default(), MockFeePool::default());
        let mut genesis = new_chain_genesis(&[(1, 100)]);
        genesis.switchover = true;

        let err = subscriber.init_genesis(&mut storage, &mock_env(), &genesis).unwrap_err();
        assert!(matches!(err, SubscriberError::SwitchoverUnsupported));
        assert!(subscriber.ibc.bound_ports.is_empty());
    }

    #[test]
    fn export_then_restart_restores_state() {
        let mut storage = MockStorage::new();
        let env = mock_env();
        let mut subscriber = TestSubscriber::new(MockIbcHost::default(), MockFeePool::default());
        subscriber
            .init_genesis(&mut storage, &env, &new_chain_genesis(&[(1, 100), (2, 50)]))
            .unwrap();

        let slashed = consensus_key(2).address();
        state::set_coordinator_channel(&mut storage, "channel-0");
        state::set_transfer_channel(&mut storage, "channel-1");
        state::set_coordinator_fee_pool_addr(&mut storage, "pool");
        state::set_packet_maturity_time(&mut storage, 4, env.block.time.plus_seconds(60));
        state::set_height_valset_update_id(&mut storage, env.block.height + 3, 4);
        state::set_outstanding_downtime(&mut storage, &slashed);
        state::append_pending_packet(
            &mut storage,
            SubscriberPacketData::Slash(SlashPacketData::new(slashed, 50, 4, Infraction::Downtime)),
        )
        .unwrap();
        state::set_last_transmission_height(&mut storage, 77);
        apply_validator_changes(&mut storage, &[ValidatorUpdate::new(consensus_key(1), 0)]).unwrap();

        let exported = export_genesis(&storage).unwrap();
        assert!(!exported.new_chain);
        assert_eq!(exported.params.distribution_transmission_channel, "channel-1");

        let mut restarted_storage = MockStorage::new();
        let mut restarted = TestSubscriber::new(MockIbcHost::default(), MockFeePool::default());
        let updates = restarted
            .init_genesis(&mut restarted_storage, &env, &exported)
            .unwrap();

        assert_eq!(updates, vec![ValidatorUpdate::new(consensus_key(2), 50).to_abci()]);
        assert_eq!(export_genesis(&restarted_storage).unwrap(), exported);
        assert!(restarted.ibc.sent_packets.is_empty());
    }
}
