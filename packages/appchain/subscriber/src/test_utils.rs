//! Mocks of the subscriber's collaborators and fixtures for tests.

use std::time::Duration;

use appchain_types::{
    genesis::{CoordinatorInfo, SubscriberGenesisState},
    handshake::{COORDINATOR_PORT_ID, SUBSCRIBER_PORT_ID, TRANSFER_PORT_ID, TRANSFER_VERSION, VERSION},
    light_client::{client_state_from_template, initial_consensus_state},
    params::{SubscriberParams, TemplateClient},
    test_utils::{consensus_key, MockIbcHost},
    validator::ValidatorUpdate,
};
use cosmwasm_std::{Binary, Env, IbcEndpoint, IbcOrder, IbcPacket, IbcTimeout, Storage, Timestamp, Uint128};

use crate::{
    distribution::{FeePool, FeePoolError, RewardTransfer},
    state, Subscriber,
};

/// Chain id of the coordinator in [`new_chain_genesis`]
pub const COORDINATOR_CHAIN_ID: &str = "coordinator-1";
/// Connection to the coordinator, built on the client created at genesis
pub const CONNECTION_ID: &str = "connection-0";
/// Coordinator channel established by [`subscriber_with_channel`]
pub const CHANNEL_ID: &str = "channel-0";
/// Transfer channel used in reward tests
pub const TRANSFER_CHANNEL_ID: &str = "channel-1";
/// Fee-pool address of the coordinator
pub const FEE_POOL: &str = "coordinator-fee-pool";

/// Subscriber wired to mocks.
pub type TestSubscriber = Subscriber<MockIbcHost, MockFeePool>;

/// Fee collector with a single balance, whatever the denomination.
#[derive(Debug, Default)]
pub struct MockFeePool {
    /// Fees waiting to be split
    pub collected: Uint128,
    /// Total handed to the local distribution
    pub redistributed: Uint128,
    /// Total set aside for the coordinator
    pub reserved: Uint128,
    /// Transfers initiated so far
    pub transfers: Vec<RewardTransfer>,
    /// Fail every transfer
    pub fail_transfer: bool,
}

impl FeePool for MockFeePool {
    fn collected_fees(&self, _storage: &dyn Storage, _denom: &str) -> Uint128 {
        self.collected
    }

    fn redistribute(&mut self, _storage: &mut dyn Storage, _denom: &str, amount: Uint128) -> Result<(), FeePoolError> {
        self.collected = self
            .collected
            .checked_sub(amount)
            .map_err(|e| FeePoolError(e.to_string()))?;
        self.redistributed += amount;
        Ok(())
    }

    fn reserve_for_coordinator(
        &mut self,
        _storage: &mut dyn Storage,
        _denom: &str,
        amount: Uint128,
    ) -> Result<(), FeePoolError> {
        self.collected = self
            .collected
            .checked_sub(amount)
            .map_err(|e| FeePoolError(e.to_string()))?;
        self.reserved += amount;
        Ok(())
    }

    fn transfer(&mut self, _storage: &mut dyn Storage, transfer: &RewardTransfer) -> Result<(), FeePoolError> {
        if self.fail_transfer {
            return Err(FeePoolError("transfer disabled".to_string()));
        }
        self.transfers.push(transfer.clone());
        Ok(())
    }
}

impl TestSubscriber {
    /// Registers an open coordinator channel end on [`CONNECTION_ID`] as the host would
    /// after the handshake.
    pub fn open_channel(&mut self, channel_id: &str) {
        self.ibc.add_channel(
            SUBSCRIBER_PORT_ID,
            channel_id,
            CONNECTION_ID,
            IbcEndpoint {
                port_id: COORDINATOR_PORT_ID.to_string(),
                channel_id: "channel-0".to_string(),
            },
            IbcOrder::Ordered,
            VERSION,
        );
    }

    /// Registers an open transfer channel end on [`CONNECTION_ID`].
    pub fn open_transfer_channel(&mut self, channel_id: &str) {
        self.ibc.add_channel(
            TRANSFER_PORT_ID,
            channel_id,
            CONNECTION_ID,
            IbcEndpoint {
                port_id: TRANSFER_PORT_ID.to_string(),
                channel_id: "channel-1".to_string(),
            },
            IbcOrder::Unordered,
            TRANSFER_VERSION,
        );
    }
}

/// New-chain genesis with default parameters, a client of [`COORDINATOR_CHAIN_ID`] and
/// one validator per `(seed, power)` using [`consensus_key`]`(seed)`.
///
/// # Panics
/// If the client material cannot be built.
#[must_use]
pub fn new_chain_genesis(validators: &[(u8, i64)]) -> SubscriberGenesisState {
    let client_state = client_state_from_template(
        &TemplateClient::default(),
        COORDINATOR_CHAIN_ID,
        10,
        Duration::from_secs(14 * 24 * 60 * 60),
        Duration::from_secs(21 * 24 * 60 * 60),
    )
    .expect("template client is valid");
    let consensus_state =
        initial_consensus_state(Timestamp::from_seconds(1), vec![1; 32]).expect("consensus state is valid");
    let initial_val_set = validators
        .iter()
        .map(|(seed, power)| ValidatorUpdate::new(consensus_key(*seed), *power))
        .collect();
    SubscriberGenesisState::new_chain(
        SubscriberParams::default(),
        CoordinatorInfo::new(&client_state, &consensus_state, initial_val_set),
    )
}

/// A subscriber initialized as a new chain, with `consensus_key(1)` at power 100 and
/// `consensus_key(2)` at power 50. [`CONNECTION_ID`] is built on the coordinator client.
///
/// # Panics
/// If genesis fails.
#[must_use]
pub fn subscriber_with_genesis(storage: &mut dyn Storage, env: &Env) -> TestSubscriber {
    let mut subscriber = Subscriber::new(MockIbcHost::default(), MockFeePool::default());
    subscriber
        .init_genesis(storage, env, &new_chain_genesis(&[(1, 100), (2, 50)]))
        .expect("genesis succeeds");
    let client_id = state::coordinator_client_id(storage).expect("client was created");
    subscriber.ibc.add_connection_to_client(CONNECTION_ID, &client_id);
    subscriber
}

/// [`subscriber_with_genesis`] with [`CHANNEL_ID`] established as the coordinator channel.
#[must_use]
pub fn subscriber_with_channel(storage: &mut dyn Storage, env: &Env) -> TestSubscriber {
    let mut subscriber = subscriber_with_genesis(storage, env);
    subscriber.open_channel(CHANNEL_ID);
    state::set_coordinator_channel(storage, CHANNEL_ID);
    subscriber
}

/// A packet carrying `data` on `channel_id` at both ends, usable as a received packet
/// and as a sent one.
#[must_use]
pub fn packet_on(channel_id: &str, data: Vec<u8>) -> IbcPacket {
    IbcPacket::new(
        Binary::from(data),
        IbcEndpoint {
            port_id: SUBSCRIBER_PORT_ID.to_string(),
            channel_id: channel_id.to_string(),
        },
        IbcEndpoint {
            port_id: SUBSCRIBER_PORT_ID.to_string(),
            channel_id: channel_id.to_string(),
        },
        1,
        IbcTimeout::with_timestamp(Timestamp::from_seconds(u64::from(u32::MAX))),
    )
}
