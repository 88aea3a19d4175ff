//! Channel handshake, coordinator side. The coordinator only ever responds: subscribers
//! open the channel and nobody may close it.

use appchain_types::{
    handshake::{
        validate_counterparty_port, validate_ordering, validate_port, validate_version,
        ChannelOpenAck, ChannelOpenConfirm, ChannelOpenInit, ChannelOpenTry, HandshakeMetadata,
        COORDINATOR_PORT_ID, SUBSCRIBER_PORT_ID,
    },
    host::IbcHost,
    HandshakeError,
};
use cosmwasm_std::{Env, Event, Storage};

use crate::{
    error::CoordinatorError,
    keepers::{EpochsKeeper, RestakingKeeper},
    Coordinator,
};

/// `OpenInit` is never executed by the coordinator.
/// # Errors
/// Always.
pub fn on_chan_open_init(_msg: &ChannelOpenInit) -> Result<(), CoordinatorError> {
    Err(HandshakeError::InvalidChannelFlow("channel handshake must be initiated by the subscriber").into())
}

/// `OpenAck` is never executed by the coordinator.
/// # Errors
/// Always.
pub fn on_chan_open_ack(_msg: &ChannelOpenAck) -> Result<(), CoordinatorError> {
    Err(HandshakeError::InvalidChannelFlow("coordinator cannot receive OpenAck").into())
}

/// Channels cannot be closed by users.
/// # Errors
/// Always.
pub fn on_chan_close_init(port_id: &str, channel_id: &str) -> Result<(), CoordinatorError> {
    tracing::warn!(%port_id, %channel_id, "rejected user initiated channel close");
    Err(HandshakeError::InvalidChannelFlow("user cannot close channel").into())
}

/// The counterparty closed the channel.
/// # Errors
/// Never.
pub fn on_chan_close_confirm(port_id: &str, channel_id: &str) -> Result<(), CoordinatorError> {
    tracing::info!(%port_id, %channel_id, "channel closed by counterparty");
    Ok(())
}

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Accepts a subscriber's channel. Returns the version to answer with: the handshake
    /// metadata carrying the coordinator's fee-pool address.
    /// # Errors
    /// Returns an error, before claiming the channel, if the ordering, ports, version or
    /// connection do not match a registered chain without a channel.
    pub fn on_chan_open_try(
        &mut self,
        storage: &mut dyn Storage,
        msg: &ChannelOpenTry,
    ) -> Result<String, CoordinatorError> {
        validate_ordering(&msg.order)?;
        validate_port(&msg.port_id, COORDINATOR_PORT_ID)?;
        validate_counterparty_port(&msg.counterparty.port_id, SUBSCRIBER_PORT_ID)?;
        validate_version(&msg.counterparty_version)?;
        let chain_id = self.verify_subscriber_chain(storage, &msg.connection_hops)?;

        self.ibc
            .claim_channel_capability(storage, &msg.port_id, &msg.channel_id)?;

        tracing::info!(%chain_id, channel_id = %msg.channel_id, "accepted subscriber channel");
        Ok(HandshakeMetadata::new(self.fee_pool_address()).to_version_string()?)
    }

    /// Finalizes the channel to the subscriber.
    /// # Errors
    /// Returns an error if the port is wrong or the chain cannot take the channel.
    pub fn on_chan_open_confirm(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        msg: &ChannelOpenConfirm,
    ) -> Result<Vec<Event>, CoordinatorError> {
        validate_port(&msg.port_id, COORDINATOR_PORT_ID)?;
        self.set_subscriber_chain(storage, env, &msg.channel_id)
    }
}
