//! The channel transport both modules run on.
//!
//! Connection, client and channel bookkeeping, proof verification and packet
//! commitments belong to the host chain's IBC stack. The modules only consume the
//! primitives below. Every mutating call receives the store the caller is currently
//! writing to, so host writes made inside a
//! [`CacheContext`](crate::cache::CacheContext) are discarded with it.

use std::time::Duration;

use cosmwasm_std::{BlockInfo, IbcEndpoint, IbcOrder, Storage, Timestamp};
use ibc_proto::ibc::lightclients::tendermint::v1::{
    ClientState as TmClientState, ConsensusState as TmConsensusState,
};

use crate::error::HostError;

/// Timeout timestamp of a packet sent at `now` that must be received within `period`.
#[must_use]
pub fn timeout_after(now: Timestamp, period: Duration) -> Timestamp {
    now.plus_seconds(period.as_secs())
        .plus_nanos(u64::from(period.subsec_nanos()))
}

/// Lifecycle state of a channel end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// `OpenInit` was executed
    Init,
    /// `OpenTry` was executed
    TryOpen,
    /// The handshake completed
    Open,
    /// The channel was closed
    Closed,
}

/// A channel end as stored by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEnd {
    /// Lifecycle state
    pub state: ChannelState,
    /// Ordering
    pub order: IbcOrder,
    /// Connections the channel is routed over
    pub connection_hops: Vec<String>,
    /// Counterparty port and channel
    pub counterparty: IbcEndpoint,
    /// Negotiated version
    pub version: String,
}

/// Primitives of the host's channel transport.
pub trait IbcHost {
    /// The client a connection is built on.
    /// # Errors
    /// Returns an error if the connection does not exist.
    fn connection_client_id(
        &self,
        storage: &dyn Storage,
        connection_id: &str,
    ) -> Result<String, HostError>;

    /// The chain id tracked by a client.
    /// # Errors
    /// Returns an error if the client does not exist.
    fn client_chain_id(&self, storage: &dyn Storage, client_id: &str) -> Result<String, HostError>;

    /// A channel end, if it exists.
    fn channel(&self, storage: &dyn Storage, port_id: &str, channel_id: &str) -> Option<ChannelEnd>;

    /// Creates a tendermint light client and returns its id.
    /// # Errors
    /// Returns an error if the host rejects the client.
    fn create_client(
        &mut self,
        storage: &mut dyn Storage,
        client_state: TmClientState,
        consensus_state: TmConsensusState,
    ) -> Result<String, HostError>;

    /// The host's own consensus state at the given block, used as the counterparty's
    /// initial trusted state.
    /// # Errors
    /// Returns an error if the host cannot produce it.
    fn self_consensus_state(
        &self,
        storage: &dyn Storage,
        block: &BlockInfo,
    ) -> Result<TmConsensusState, HostError>;

    /// Commits a packet on the channel and returns its sequence.
    /// # Errors
    /// Returns [`HostError::ClientNotActive`] if the counterparty client has expired,
    /// another error for any other failure.
    fn send_packet(
        &mut self,
        storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
        timeout: Timestamp,
        data: Vec<u8>,
    ) -> Result<u64, HostError>;

    /// Claims the capability of a channel for this module.
    /// # Errors
    /// Returns an error if the capability is owned elsewhere.
    fn claim_channel_capability(
        &mut self,
        storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), HostError>;

    /// Starts a channel handshake and returns the new channel id.
    /// # Errors
    /// Returns an error if the host rejects the handshake.
    #[allow(clippy::too_many_arguments)]
    fn channel_open_init(
        &mut self,
        storage: &mut dyn Storage,
        connection_hops: Vec<String>,
        port_id: &str,
        counterparty_port_id: &str,
        order: IbcOrder,
        version: &str,
    ) -> Result<String, HostError>;

    /// Closes a channel from this side.
    /// # Errors
    /// Returns an error if the channel cannot be closed.
    fn channel_close_init(
        &mut self,
        storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), HostError>;

    /// Binds the module's port.
    /// # Errors
    /// Returns an error if the port is already bound.
    fn bind_port(&mut self, storage: &mut dyn Storage, port_id: &str) -> Result<(), HostError>;
}
