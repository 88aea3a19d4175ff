//! Channel handshake, subscriber side. The subscriber initiates the channel to its
//! coordinator and, once the coordinator answers, opens the transfer channel rewards are
//! sent over.

use appchain_types::{
    ensure,
    handshake::{
        single_connection_hop, validate_counterparty_port, validate_ordering, validate_port,
        validate_version, ChannelOpenAck, ChannelOpenConfirm, ChannelOpenInit, ChannelOpenTry,
        HandshakeMetadata, COORDINATOR_PORT_ID, SUBSCRIBER_PORT_ID, TRANSFER_PORT_ID,
        TRANSFER_VERSION,
    },
    host::{ChannelState, IbcHost},
    HandshakeError, HostError,
};
use cosmwasm_std::{IbcOrder, Storage};

use crate::{distribution::FeePool, error::SubscriberError, state, Subscriber};

/// `OpenTry` is never executed by the subscriber.
/// # Errors
/// Always.
pub fn on_chan_open_try(_msg: &ChannelOpenTry) -> Result<String, SubscriberError> {
    Err(HandshakeError::InvalidChannelFlow("channel handshake must be initiated by the subscriber").into())
}

/// `OpenConfirm` is never executed by the subscriber.
/// # Errors
/// Always.
pub fn on_chan_open_confirm(_msg: &ChannelOpenConfirm) -> Result<(), SubscriberError> {
    Err(HandshakeError::InvalidChannelFlow("subscriber cannot receive OpenConfirm").into())
}

/// Channels cannot be closed by users.
/// # Errors
/// Always.
pub fn on_chan_close_init(port_id: &str, channel_id: &str) -> Result<(), SubscriberError> {
    tracing::warn!(%port_id, %channel_id, "rejected user initiated channel close");
    Err(HandshakeError::InvalidChannelFlow("user cannot close channel").into())
}

/// The counterparty closed the channel.
/// # Errors
/// Never.
pub fn on_chan_close_confirm(port_id: &str, channel_id: &str) -> Result<(), SubscriberError> {
    tracing::info!(%port_id, %channel_id, "channel closed by counterparty");
    Ok(())
}

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Opens the channel to the coordinator.
    /// # Errors
    /// Returns an error, before claiming the channel, if a coordinator channel already
    /// exists, or if the ordering, ports, version or connection are not the ones agreed
    /// at genesis.
    pub fn on_chan_open_init(
        &mut self,
        storage: &mut dyn Storage,
        msg: &ChannelOpenInit,
    ) -> Result<(), SubscriberError> {
        if let Some(existing) = state::coordinator_channel(storage) {
            return Err(SubscriberError::CoordinatorChannelAlreadyExists(existing));
        }
        validate_ordering(&msg.order)?;
        validate_port(&msg.port_id, SUBSCRIBER_PORT_ID)?;
        validate_version(&msg.version)?;
        validate_counterparty_port(&msg.counterparty_port_id, COORDINATOR_PORT_ID)?;
        let connection_id = single_connection_hop(&msg.connection_hops)?;

        let expected = state::coordinator_client_id(storage).ok_or(SubscriberError::CoordinatorClientNotSet)?;
        let got = self.ibc.connection_client_id(storage, connection_id)?;
        ensure!(
            got == expected,
            SubscriberError::ClientMismatch { expected, got }
        );

        self.ibc
            .claim_channel_capability(storage, &msg.port_id, &msg.channel_id)?;
        tracing::info!(channel_id = %msg.channel_id, %connection_id, "opening coordinator channel");
        Ok(())
    }

    /// Accepts the coordinator's answer: records its fee-pool address and opens the
    /// transfer channel on the same connection unless a usable one exists.
    /// # Errors
    /// Returns an error if the port or metadata are invalid, the channel is unknown to the
    /// host or the transfer channel cannot be opened.
    pub fn on_chan_open_ack(
        &mut self,
        storage: &mut dyn Storage,
        msg: &ChannelOpenAck,
    ) -> Result<(), SubscriberError> {
        validate_port(&msg.port_id, SUBSCRIBER_PORT_ID)?;
        if let Some(existing) = state::coordinator_channel(storage) {
            return Err(SubscriberError::CoordinatorChannelAlreadyExists(existing));
        }
        let metadata = HandshakeMetadata::from_version_string(&msg.counterparty_version)?;
        validate_version(&metadata.version)?;

        let channel = self
            .ibc
            .channel(storage, &msg.port_id, &msg.channel_id)
            .ok_or_else(|| HostError::ChannelNotFound {
                port_id: msg.port_id.clone(),
                channel_id: msg.channel_id.clone(),
            })?;

        state::set_coordinator_fee_pool_addr(storage, &metadata.coordinator_fee_pool_addr);

        let usable = state::transfer_channel(storage).filter(|id| {
            self.ibc
                .channel(storage, TRANSFER_PORT_ID, id)
                .is_some_and(|c| c.state != ChannelState::Closed)
        });
        if let Some(transfer_channel) = usable {
            tracing::info!(%transfer_channel, "reusing transfer channel");
            return Ok(());
        }

        let transfer_channel = self.ibc.channel_open_init(
            storage,
            channel.connection_hops,
            TRANSFER_PORT_ID,
            TRANSFER_PORT_ID,
            IbcOrder::Unordered,
            TRANSFER_VERSION,
        )?;
        state::set_transfer_channel(storage, &transfer_channel);
        tracing::info!(
            %transfer_channel,
            fee_pool = %metadata.coordinator_fee_pool_addr,
            "opened transfer channel to the coordinator"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::handshake::VERSION;
    use cosmwasm_std::testing::{mock_env, MockStorage};
    use rstest::rstest;

    use super::*;
    use crate::test_utils::{subscriber_with_genesis, CHANNEL_ID, CONNECTION_ID, FEE_POOL};

    fn open_init() -> ChannelOpenInit {
        ChannelOpenInit {
            order: IbcOrder::Ordered,
            connection_hops: vec![CONNECTION_ID.to_string()],
            port_id: SUBSCRIBER_PORT_ID.to_string(),
            channel_id: CHANNEL_ID.to_string(),
            counterparty_port_id: COORDINATOR_PORT_ID.to_string(),
            version: VERSION.to_string(),
        }
    }

    fn open_ack(version: String) -> ChannelOpenAck {
        ChannelOpenAck {
            port_id: SUBSCRIBER_PORT_ID.to_string(),
            channel_id: CHANNEL_ID.to_string(),
            counterparty_channel_id: "channel-3".to_string(),
            counterparty_version: version,
        }
    }

    #[test]
    fn init_claims_the_channel() {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());

        subscriber.on_chan_open_init(&mut storage, &open_init()).unwrap();

        assert_eq!(
            subscriber.ibc.claimed_capabilities,
            vec![(SUBSCRIBER_PORT_ID.to_string(), CHANNEL_ID.to_string())]
        );
    }

    #[rstest]
    #[case::unordered(ChannelOpenInit { order: IbcOrder::Unordered, ..open_init() })]
    #[case::wrong_port(ChannelOpenInit { port_id: "transfer".into(), ..open_init() })]
    #[case::wrong_counterparty(ChannelOpenInit { counterparty_port_id: SUBSCRIBER_PORT_ID.into(), ..open_init() })]
    #[case::wrong_version(ChannelOpenInit { version: "2".into(), ..open_init() })]
    #[case::no_hops(ChannelOpenInit { connection_hops: vec![], ..open_init() })]
    fn invalid_init_claims_nothing(#[case] msg: ChannelOpenInit) {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());

        let err = subscriber.on_chan_open_init(&mut storage, &msg).unwrap_err();
        assert!(matches!(err, SubscriberError::Handshake(_)));
        assert!(subscriber.ibc.claimed_capabilities.is_empty());
    }

    #[test]
    fn init_over_a_foreign_client_is_rejected() {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());
        subscriber
            .ibc
            .add_connection("connection-9", "07-tendermint-9", "elsewhere-1");

        let msg = ChannelOpenInit {
            connection_hops: vec!["connection-9".to_string()],
            ..open_init()
        };
        let err = subscriber.on_chan_open_init(&mut storage, &msg).unwrap_err();
        assert!(matches!(err, SubscriberError::ClientMismatch { .. }));
    }

    #[test]
    fn init_after_establishment_is_rejected() {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());
        state::set_coordinator_channel(&mut storage, CHANNEL_ID);

        let err = subscriber.on_chan_open_init(&mut storage, &open_init()).unwrap_err();
        assert!(matches!(err, SubscriberError::CoordinatorChannelAlreadyExists(_)));
    }

    #[test]
    fn ack_opens_the_transfer_channel() {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());
        subscriber.open_channel(CHANNEL_ID);
        let version = HandshakeMetadata::new(FEE_POOL).to_version_string().unwrap();

        subscriber.on_chan_open_ack(&mut storage, &open_ack(version)).unwrap();

        assert_eq!(state::coordinator_fee_pool_addr(&storage).as_deref(), Some(FEE_POOL));
        let transfer_channel = state::transfer_channel(&storage).unwrap();
        let channel = subscriber
            .ibc
            .channel(&storage, TRANSFER_PORT_ID, &transfer_channel)
            .unwrap();
        assert_eq!(channel.order, IbcOrder::Unordered);
        assert_eq!(channel.version, TRANSFER_VERSION);
        assert_eq!(channel.connection_hops, vec![CONNECTION_ID.to_string()]);
    }

    #[test]
    fn ack_reuses_an_open_transfer_channel() {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());
        subscriber.open_channel(CHANNEL_ID);
        subscriber.open_transfer_channel("channel-4");
        state::set_transfer_channel(&mut storage, "channel-4");
        let version = HandshakeMetadata::new(FEE_POOL).to_version_string().unwrap();

        subscriber.on_chan_open_ack(&mut storage, &open_ack(version)).unwrap();

        assert_eq!(state::transfer_channel(&storage).as_deref(), Some("channel-4"));
        assert_eq!(subscriber.ibc.channels.len(), 2);
    }

    #[rstest]
    #[case::not_json("1".to_string())]
    #[case::wrong_version(r#"{"coordinator_fee_pool_addr":"pool","version":"2"}"#.to_string())]
    fn ack_with_bad_metadata_fails(#[case] version: String) {
        let mut storage = MockStorage::new();
        let mut subscriber = subscriber_with_genesis(&mut storage, &mock_env());
        subscriber.open_channel(CHANNEL_ID);

        let err = subscriber.on_chan_open_ack(&mut storage, &open_ack(version)).unwrap_err();
        assert!(matches!(err, SubscriberError::Handshake(_)));
        assert_eq!(state::coordinator_fee_pool_addr(&storage), None);
        assert_eq!(state::transfer_channel(&storage), None);
    }

    #[test]
    fn subscriber_never_responds_or_closes() {
        assert!(on_chan_open_confirm(&ChannelOpenConfirm {
            port_id: SUBSCRIBER_PORT_ID.to_string(),
            channel_id: CHANNEL_ID.to_string(),
        })
        .is_err());
        assert!(on_chan_close_init(SUBSCRIBER_PORT_ID, CHANNEL_ID).is_err());
        assert!(on_chan_close_confirm(SUBSCRIBER_PORT_ID, CHANNEL_ID).is_ok());
    }
}
