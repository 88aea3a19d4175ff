//! A coordinator and a subscriber wired to each other through their mock transports.

use appchain_coordinator::{
    hooks::EpochHooks,
    query::{self, ChainStatus},
    state as coordinator_state,
    test_utils::{coordinator, register_msg, TestCoordinator, CHAIN_ID, HOUR, HOUR_EPOCH},
};
use appchain_subscriber::{
    state as subscriber_state,
    test_utils::{MockFeePool, TestSubscriber},
    StakingKeeper, Subscriber,
};
use appchain_types::{
    ack::Acknowledgement,
    handshake::{
        ChannelOpenAck, ChannelOpenConfirm, ChannelOpenInit, ChannelOpenTry, COORDINATOR_PORT_ID,
        SUBSCRIBER_PORT_ID, VERSION,
    },
    host::timeout_after,
    packet::Infraction,
    test_utils::{consensus_key, MockIbcHost, SentPacket},
    validator::ValidatorUpdate,
};
use cosmwasm_std::{
    testing::{mock_env, MockStorage},
    Binary, Decimal, Env, IbcEndpoint, IbcOrder, IbcPacket, IbcTimeout,
};

const CONNECTION_ID: &str = "connection-0";
const COORDINATOR_CHANNEL: &str = "channel-0";
const SUBSCRIBER_CHANNEL: &str = "channel-7";

/// Both chains with their own store and block.
struct Network {
    coordinator: TestCoordinator,
    coordinator_storage: MockStorage,
    coordinator_env: Env,
    subscriber: TestSubscriber,
    subscriber_storage: MockStorage,
    subscriber_env: Env,
}

fn packet_from(sent: &SentPacket, dest_port: &str, dest_channel: &str) -> IbcPacket {
    IbcPacket::new(
        Binary::from(sent.data.clone()),
        IbcEndpoint {
            port_id: sent.port_id.clone(),
            channel_id: sent.channel_id.clone(),
        },
        IbcEndpoint {
            port_id: dest_port.to_string(),
            channel_id: dest_channel.to_string(),
        },
        sent.sequence,
        IbcTimeout::with_timestamp(sent.timeout),
    )
}

impl Network {
    /// Registers [`CHAIN_ID`] with `operator-1` at 100 and `operator-2` at 50, activates it at
    /// the end of the hour epoch and starts the subscriber from the genesis the coordinator
    /// produced. Activation queues the empty change-set 1 on the coordinator.
    fn bootstrapped() -> Self {
        let _ = tracing_subscriber::fmt::try_init();
        let coordinator_env = mock_env();
        let mut subscriber_env = mock_env();
        subscriber_env.block.chain_id = CHAIN_ID.to_string();

        let mut coordinator_storage = MockStorage::new();
        let mut coordinator = coordinator(&mut coordinator_storage);
        coordinator.restaking.set_power(CHAIN_ID, 1, 100);
        coordinator.restaking.set_power(CHAIN_ID, 2, 50);
        coordinator
            .register_subscriber_chain(&mut coordinator_storage, register_msg(CHAIN_ID, HOUR, 10))
            .unwrap();
        coordinator.after_epoch_end(&mut coordinator_storage, &coordinator_env, HOUR, HOUR_EPOCH);
        let genesis = query::subscriber_genesis(&coordinator_storage, CHAIN_ID)
            .unwrap()
            .unwrap();

        let mut subscriber_storage = MockStorage::new();
        let mut subscriber = Subscriber::new(MockIbcHost::default(), MockFeePool::default());
        let initial = subscriber
            .init_genesis(&mut subscriber_storage, &subscriber_env, &genesis)
            .unwrap();
        assert_eq!(initial.len(), 2);

        let chain_client = coordinator_state::chain_to_client(&coordinator_storage, CHAIN_ID).unwrap();
        coordinator.ibc.add_connection_to_client(CONNECTION_ID, &chain_client);
        let coordinator_client = subscriber_state::coordinator_client_id(&subscriber_storage).unwrap();
        subscriber.ibc.add_connection_to_client(CONNECTION_ID, &coordinator_client);

        Self {
            coordinator,
            coordinator_storage,
            coordinator_env,
            subscriber,
            subscriber_storage,
            subscriber_env,
        }
    }

    /// Runs the four handshake steps.
    fn handshake(&mut self) {
        self.subscriber
            .on_chan_open_init(
                &mut self.subscriber_storage,
                &ChannelOpenInit {
                    order: IbcOrder::Ordered,
                    connection_hops: vec![CONNECTION_ID.to_string()],
                    port_id: SUBSCRIBER_PORT_ID.to_string(),
                    channel_id: SUBSCRIBER_CHANNEL.to_string(),
                    counterparty_port_id: COORDINATOR_PORT_ID.to_string(),
                    version: VERSION.to_string(),
                },
            )
            .unwrap();

        let version = self
            .coordinator
            .on_chan_open_try(
                &mut self.coordinator_storage,
                &ChannelOpenTry {
                    order: IbcOrder::Ordered,
                    connection_hops: vec![CONNECTION_ID.to_string()],
                    port_id: COORDINATOR_PORT_ID.to_string(),
                    channel_id: COORDINATOR_CHANNEL.to_string(),
                    counterparty: IbcEndpoint {
                        port_id: SUBSCRIBER_PORT_ID.to_string(),
                        channel_id: SUBSCRIBER_CHANNEL.to_string(),
                    },
                    counterparty_version: VERSION.to_string(),
                },
            )
            .unwrap();

        self.subscriber.open_channel(SUBSCRIBER_CHANNEL);
        self.subscriber
            .on_chan_open_ack(
                &mut self.subscriber_storage,
                &ChannelOpenAck {
                    port_id: SUBSCRIBER_PORT_ID.to_string(),
                    channel_id: SUBSCRIBER_CHANNEL.to_string(),
                    counterparty_channel_id: COORDINATOR_CHANNEL.to_string(),
                    counterparty_version: version,
                },
            )
            .unwrap();

        self.coordinator.open_channel(COORDINATOR_CHANNEL);
        self.coordinator
            .on_chan_open_confirm(
                &mut self.coordinator_storage,
                &self.coordinator_env,
                &ChannelOpenConfirm {
                    port_id: COORDINATOR_PORT_ID.to_string(),
                    channel_id: COORDINATOR_CHANNEL.to_string(),
                },
            )
            .unwrap();
    }

    /// Ends `epoch` of the hour schedule on the coordinator and runs its block end.
    fn end_coordinator_epoch(&mut self, epoch: u64) {
        self.coordinator
            .after_epoch_end(&mut self.coordinator_storage, &self.coordinator_env, HOUR, epoch);
        self.coordinator
            .end_block(&mut self.coordinator_storage, &self.coordinator_env);
    }

    /// Delivers every packet the coordinator sent and returns the acknowledgements to it.
    fn relay_to_subscriber(&mut self) -> Vec<Acknowledgement> {
        let mut acks = Vec::new();
        for sent in self.coordinator.ibc.take_sent_packets() {
            let packet = packet_from(&sent, SUBSCRIBER_PORT_ID, SUBSCRIBER_CHANNEL);
            let response = self
                .subscriber
                .on_recv_packet(&mut self.subscriber_storage, &self.subscriber_env, &packet)
                .unwrap();
            let ack = response.acknowledgement.unwrap();
            self.coordinator.on_acknowledgement_packet(
                &mut self.coordinator_storage,
                &self.coordinator_env,
                &packet,
                ack.as_slice(),
            );
            acks.push(Acknowledgement::from_slice(ack.as_slice()));
        }
        acks
    }

    /// Delivers every packet the subscriber sent and returns the acknowledgements to it.
    fn relay_to_coordinator(&mut self) -> Vec<Acknowledgement> {
        let mut acks = Vec::new();
        for sent in self.subscriber.ibc.take_sent_packets() {
            let packet = packet_from(&sent, COORDINATOR_PORT_ID, COORDINATOR_CHANNEL);
            let response = self.coordinator.on_recv_packet(
                &mut self.coordinator_storage,
                &self.coordinator_env,
                &packet,
            );
            let ack = response.acknowledgement.unwrap();
            self.subscriber
                .on_acknowledgement_packet(&mut self.subscriber_storage, &packet, ack.as_slice());
            acks.push(Acknowledgement::from_slice(ack.as_slice()));
        }
        acks
    }

    fn subscriber_powers(&self) -> Vec<(Vec<u8>, i64)> {
        subscriber_state::subscriber_validators(&self.subscriber_storage)
            .unwrap()
            .into_iter()
            .map(|v| (v.cons_address.as_bytes().to_vec(), v.power))
            .collect()
    }

    fn coordinator_powers(&self) -> Vec<(Vec<u8>, i64)> {
        query::validators(&self.coordinator_storage, CHAIN_ID)
            .unwrap()
            .into_iter()
            .map(|v| (v.cons_address.as_bytes().to_vec(), v.power))
            .collect()
    }
}

#[test]
fn validator_set_changes_reach_the_subscriber_and_mature() {
    let mut net = Network::bootstrapped();
    assert_eq!(query::chain_status(&net.coordinator_storage, CHAIN_ID), ChainStatus::HandshakeInProgress);
    net.handshake();
    assert_eq!(query::chain_status(&net.coordinator_storage, CHAIN_ID), ChainStatus::Established);
    assert!(subscriber_state::transfer_channel(&net.subscriber_storage).is_some());

    net.coordinator.restaking.set_power(CHAIN_ID, 1, 0);
    net.coordinator.restaking.set_power(CHAIN_ID, 3, 30);
    net.end_coordinator_epoch(HOUR_EPOCH + 1);

    let acks = net.relay_to_subscriber();
    assert_eq!(acks, vec![Acknowledgement::success(), Acknowledgement::success()]);
    assert_eq!(
        subscriber_state::coordinator_channel(&net.subscriber_storage).as_deref(),
        Some(SUBSCRIBER_CHANNEL)
    );

    let response = net
        .subscriber
        .end_block(&mut net.subscriber_storage, &net.subscriber_env)
        .unwrap();
    assert_eq!(response.validator_updates.len(), 2);
    assert!(response
        .validator_updates
        .contains(&ValidatorUpdate::new(consensus_key(1), 0).to_abci()));
    assert_eq!(net.subscriber_powers(), net.coordinator_powers());

    assert_eq!(
        coordinator_state::vsc_timeouts(&net.coordinator_storage, CHAIN_ID).unwrap().len(),
        2
    );
    let unbonding = subscriber_state::params(&net.subscriber_storage)
        .unwrap()
        .unbonding_period;
    net.subscriber_env.block.time = timeout_after(net.subscriber_env.block.time, unbonding);
    net.subscriber_env.block.height += 1;
    net.subscriber
        .end_block(&mut net.subscriber_storage, &net.subscriber_env)
        .unwrap();

    let acks = net.relay_to_coordinator();
    assert_eq!(acks, vec![Acknowledgement::success(), Acknowledgement::success()]);
    assert!(coordinator_state::vsc_timeouts(&net.coordinator_storage, CHAIN_ID)
        .unwrap()
        .is_empty());
    assert!(subscriber_state::maturing_packets(&net.subscriber_storage).is_empty());
}

#[test]
fn downtime_slash_round_trip() {
    let mut net = Network::bootstrapped();
    net.handshake();
    net.end_coordinator_epoch(HOUR_EPOCH + 1);
    assert_eq!(net.relay_to_subscriber().len(), 2);
    net.subscriber
        .end_block(&mut net.subscriber_storage, &net.subscriber_env)
        .unwrap();

    let address = consensus_key(2).address();
    net.subscriber_env.block.height += 2;
    net.subscriber
        .slash_with_infraction_reason(
            &mut net.subscriber_storage,
            &address,
            net.subscriber_env.block.height,
            50,
            Decimal::permille(1),
            Infraction::Downtime,
        )
        .unwrap();
    assert!(net.subscriber.is_validator_jailed(&net.subscriber_storage, &address));
    net.subscriber
        .end_block(&mut net.subscriber_storage, &net.subscriber_env)
        .unwrap();

    let acks = net.relay_to_coordinator();
    assert_eq!(acks, vec![Acknowledgement::SlashHandled]);
    assert_eq!(
        net.coordinator.restaking.slashes(&net.coordinator_storage),
        vec![(CHAIN_ID.to_string(), "operator-2".to_string(), 2)]
    );
    assert_eq!(
        net.coordinator.restaking.jails(&net.coordinator_storage),
        vec![(CHAIN_ID.to_string(), "operator-2".to_string())]
    );

    net.end_coordinator_epoch(HOUR_EPOCH + 2);
    assert_eq!(net.relay_to_subscriber(), vec![Acknowledgement::success()]);
    assert!(!net.subscriber.is_validator_jailed(&net.subscriber_storage, &address));
    assert!(coordinator_state::slash_acks(&net.coordinator_storage, CHAIN_ID)
        .unwrap()
        .is_empty());
}

#[test]
fn timed_out_change_set_tears_the_chain_down() {
    let mut net = Network::bootstrapped();
    net.handshake();
    net.end_coordinator_epoch(HOUR_EPOCH + 1);

    let sent = net.coordinator.ibc.take_sent_packets();
    assert_eq!(sent.len(), 2);
    let packet = packet_from(&sent[0], SUBSCRIBER_PORT_ID, SUBSCRIBER_CHANNEL);
    net.coordinator
        .on_timeout_packet(&mut net.coordinator_storage, &net.coordinator_env, &packet);

    assert_eq!(query::chain_status(&net.coordinator_storage, CHAIN_ID), ChainStatus::TornDown);
    assert!(!net.coordinator.restaking.is_registered(CHAIN_ID));
    assert_eq!(
        net.coordinator.ibc.closed_channels,
        vec![(COORDINATOR_PORT_ID.to_string(), COORDINATOR_CHANNEL.to_string())]
    );
}

#[test]
fn subscriber_closes_its_channel_when_a_packet_times_out() {
    let mut net = Network::bootstrapped();
    net.handshake();
    net.end_coordinator_epoch(HOUR_EPOCH + 1);
    net.relay_to_subscriber();

    net.subscriber_env.block.time = timeout_after(
        net.subscriber_env.block.time,
        subscriber_state::params(&net.subscriber_storage).unwrap().unbonding_period,
    );
    net.subscriber
        .end_block(&mut net.subscriber_storage, &net.subscriber_env)
        .unwrap();
    let sent = net.subscriber.ibc.take_sent_packets();
    let packet = packet_from(&sent[0], COORDINATOR_PORT_ID, COORDINATOR_CHANNEL);

    net.subscriber
        .on_timeout_packet(&mut net.subscriber_storage, &packet);

    assert_eq!(
        net.subscriber.ibc.closed_channels,
        vec![(SUBSCRIBER_PORT_ID.to_string(), SUBSCRIBER_CHANNEL.to_string())]
    );
}
