//! Fixtures shared by the unit and integration tests of both modules.

use std::collections::BTreeMap;

use cosmwasm_std::{BlockInfo, IbcEndpoint, IbcOrder, Storage, Timestamp};
use ed25519_dalek::SigningKey;
use ibc_proto::ibc::lightclients::tendermint::v1::{
    ClientState as TmClientState, ConsensusState as TmConsensusState,
};

use crate::{
    consensus_key::ConsensusKey,
    error::HostError,
    host::{ChannelEnd, ChannelState, IbcHost},
    light_client::initial_consensus_state,
    store::{load_string, load_u64, save_u64},
};

const CLIENT_COUNTER_KEY: &[u8] = b"mock_ibc/next_client";
const CLIENT_PREFIX: &str = "mock_ibc/client/";

/// A deterministic ed25519 consensus key derived from `seed`.
///
/// # Panics
/// Never: every 32-byte seed yields a valid key.
#[must_use]
pub fn consensus_key(seed: u8) -> ConsensusKey {
    let verifying = SigningKey::from_bytes(&[seed; 32]).verifying_key();
    ConsensusKey::from_ed25519(verifying.as_bytes()).expect("dalek keys are valid")
}

/// A packet committed through [`MockIbcHost::send_packet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentPacket {
    /// Source port
    pub port_id: String,
    /// Source channel
    pub channel_id: String,
    /// Sequence assigned by the host
    pub sequence: u64,
    /// Timeout timestamp
    pub timeout: Timestamp,
    /// Packet data
    pub data: Vec<u8>,
}

/// In-memory channel transport.
///
/// Clients created through [`IbcHost::create_client`] live in the module's store, so they
/// vanish with a discarded overlay like any other write. Connections, channels and the
/// record of sent packets live in the mock itself.
#[derive(Debug, Default)]
pub struct MockIbcHost {
    /// Connection id to client id
    pub connections: BTreeMap<String, String>,
    /// Clients that exist independently of the module, id to chain id
    pub clients: BTreeMap<String, String>,
    /// Channel ends by `(port, channel)`
    pub channels: BTreeMap<(String, String), ChannelEnd>,
    /// Every packet committed so far
    pub sent_packets: Vec<SentPacket>,
    /// Claimed channel capabilities
    pub claimed_capabilities: Vec<(String, String)>,
    /// Channels closed from this side
    pub closed_channels: Vec<(String, String)>,
    /// Bound ports
    pub bound_ports: Vec<String>,
    /// Error returned by the next sends, if set
    pub send_error: Option<HostError>,
    /// Error returned by client creation, if set
    pub create_client_error: Option<HostError>,
    next_channel: u64,
    next_sequence: u64,
}

impl MockIbcHost {
    /// Registers a connection built on `client_id`, a client of `chain_id`.
    pub fn add_connection(&mut self, connection_id: &str, client_id: &str, chain_id: &str) {
        self.connections
            .insert(connection_id.to_string(), client_id.to_string());
        self.clients
            .entry(client_id.to_string())
            .or_insert_with(|| chain_id.to_string());
    }

    /// Registers a connection over a client that already exists in the module's store.
    pub fn add_connection_to_client(&mut self, connection_id: &str, client_id: &str) {
        self.connections
            .insert(connection_id.to_string(), client_id.to_string());
    }

    /// Registers an open channel end.
    pub fn add_channel(
        &mut self,
        port_id: &str,
        channel_id: &str,
        connection_id: &str,
        counterparty: IbcEndpoint,
        order: IbcOrder,
        version: &str,
    ) {
        self.channels.insert(
            (port_id.to_string(), channel_id.to_string()),
            ChannelEnd {
                state: ChannelState::Open,
                order,
                connection_hops: vec![connection_id.to_string()],
                counterparty,
                version: version.to_string(),
            },
        );
    }

    /// Removes and returns the packets sent so far.
    pub fn take_sent_packets(&mut self) -> Vec<SentPacket> {
        std::mem::take(&mut self.sent_packets)
    }

    fn client_key(client_id: &str) -> Vec<u8> {
        format!("{CLIENT_PREFIX}{client_id}").into_bytes()
    }
}

impl IbcHost for MockIbcHost {
    fn connection_client_id(
        &self,
        _storage: &dyn Storage,
        connection_id: &str,
    ) -> Result<String, HostError> {
        self.connections
            .get(connection_id)
            .cloned()
            .ok_or_else(|| HostError::ConnectionNotFound(connection_id.to_string()))
    }

    fn client_chain_id(&self, storage: &dyn Storage, client_id: &str) -> Result<String, HostError> {
        load_string(storage, &Self::client_key(client_id))
            .or_else(|| self.clients.get(client_id).cloned())
            .ok_or_else(|| HostError::ClientNotFound(client_id.to_string()))
    }

    fn channel(&self, _storage: &dyn Storage, port_id: &str, channel_id: &str) -> Option<ChannelEnd> {
        self.channels
            .get(&(port_id.to_string(), channel_id.to_string()))
            .cloned()
    }

    fn create_client(
        &mut self,
        storage: &mut dyn Storage,
        client_state: TmClientState,
        _consensus_state: TmConsensusState,
    ) -> Result<String, HostError> {
        if let Some(err) = self.create_client_error.clone() {
            return Err(err);
        }
        let sequence = load_u64(storage, CLIENT_COUNTER_KEY).unwrap_or(0);
        save_u64(storage, CLIENT_COUNTER_KEY, sequence + 1);

        let client_id = format!("07-tendermint-{sequence}");
        storage.set(
            &Self::client_key(&client_id),
            client_state.chain_id.as_bytes(),
        );
        Ok(client_id)
    }

    fn self_consensus_state(
        &self,
        _storage: &dyn Storage,
        block: &BlockInfo,
    ) -> Result<TmConsensusState, HostError> {
        initial_consensus_state(block.time, vec![0; 32]).map_err(|e| HostError::Other(e.to_string()))
    }

    fn send_packet(
        &mut self,
        _storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
        timeout: Timestamp,
        data: Vec<u8>,
    ) -> Result<u64, HostError> {
        if let Some(err) = self.send_error.clone() {
            return Err(err);
        }
        self.next_sequence += 1;
        self.sent_packets.push(SentPacket {
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
            sequence: self.next_sequence,
            timeout,
            data,
        });
        Ok(self.next_sequence)
    }

    fn claim_channel_capability(
        &mut self,
        _storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), HostError> {
        self.claimed_capabilities
            .push((port_id.to_string(), channel_id.to_string()));
        Ok(())
    }

    fn channel_open_init(
        &mut self,
        _storage: &mut dyn Storage,
        connection_hops: Vec<String>,
        port_id: &str,
        counterparty_port_id: &str,
        order: IbcOrder,
        version: &str,
    ) -> Result<String, HostError> {
        let channel_id = format!("channel-{}", self.next_channel);
        self.next_channel += 1;
        self.channels.insert(
            (port_id.to_string(), channel_id.clone()),
            ChannelEnd {
                state: ChannelState::Init,
                order,
                connection_hops,
                counterparty: IbcEndpoint {
                    port_id: counterparty_port_id.to_string(),
                    channel_id: String::new(),
                },
                version: version.to_string(),
            },
        );
        Ok(channel_id)
    }

    fn channel_close_init(
        &mut self,
        _storage: &mut dyn Storage,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), HostError> {
        let key = (port_id.to_string(), channel_id.to_string());
        let channel = self
            .channels
            .get_mut(&key)
            .ok_or_else(|| HostError::ChannelNotFound {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            })?;
        channel.state = ChannelState::Closed;
        self.closed_channels.push(key);
        Ok(())
    }

    fn bind_port(&mut self, _storage: &mut dyn Storage, port_id: &str) -> Result<(), HostError> {
        if self.bound_ports.iter().any(|p| p == port_id) {
            return Err(HostError::PortAlreadyBound(port_id.to_string()));
        }
        self.bound_ports.push(port_id.to_string());
        Ok(())
    }
}
