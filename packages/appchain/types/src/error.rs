//! Error types shared by the coordinator and the subscriber.

use cosmwasm_std::IbcOrder;
use thiserror::Error;

use crate::packet::Infraction;

/// Stateless validation failures of messages, packets and parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The chain id is empty or only whitespace
    #[error("chain id cannot be blank")]
    BlankChainId,

    /// The epoch identifier is empty or only whitespace
    #[error("epoch identifier cannot be blank")]
    BlankEpochIdentifier,

    /// An asset id does not have the `0x<address>_0x<chain>` shape
    #[error("invalid asset id `{0}`")]
    InvalidAssetId(String),

    /// No asset ids were given
    #[error("at least one asset id is required")]
    NoAssetIds,

    /// A duration parameter is zero
    #[error("{0} must be positive")]
    NonPositiveDuration(&'static str),

    /// A counter parameter is zero
    #[error("{0} must be positive")]
    ZeroValue(&'static str),

    /// A string parameter is blank
    #[error("{0} cannot be blank")]
    BlankField(&'static str),

    /// A fraction is outside its allowed range
    #[error("{field} must be within [{min}, {max}], got {value}")]
    FractionOutOfRange {
        /// Name of the parameter
        field: &'static str,
        /// Value that was given
        value: String,
        /// Lower bound
        min: String,
        /// Upper bound
        max: String,
    },

    /// The trust level of the template client is invalid
    #[error("invalid trust level {numerator}/{denominator}, must be within [1/3, 1]")]
    InvalidTrustLevel {
        /// Numerator of the trust level
        numerator: u64,
        /// Denominator of the trust level
        denominator: u64,
    },

    /// A validator address has the wrong length
    #[error("invalid validator address length: expected 20, got {0}")]
    InvalidAddressLength(usize),

    /// A validator power is not positive
    #[error("validator power must be positive, got {0}")]
    NonPositivePower(i64),

    /// The infraction is not one the coordinator handles
    #[error("unsupported infraction {0:?}")]
    UnsupportedInfraction(Infraction),

    /// A valset update id of zero was given where one is required
    #[error("valset update id cannot be zero")]
    ZeroValsetUpdateId,

    /// An arithmetic operation overflowed
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    /// Genesis state is inconsistent
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),
}

/// Failures constructing a [`ConsensusKey`](crate::consensus_key::ConsensusKey) or a
/// [`ConsAddr`](crate::consensus_key::ConsAddr).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key bytes have the wrong length
    #[error("invalid ed25519 public key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// The key bytes are not a valid ed25519 point
    #[error("invalid ed25519 public key")]
    InvalidEd25519,

    /// The protobuf `Any` carries a different key type
    #[error("unsupported public key type `{0}`")]
    UnsupportedKeyType(String),

    /// The protobuf payload could not be decoded
    #[error("decoding public key failed: {0}")]
    Decode(String),

    /// The address has the wrong length
    #[error("invalid consensus address length: expected 20, got {0}")]
    InvalidAddressLength(usize),

    /// The address is not valid hex
    #[error("invalid consensus address `{0}`")]
    InvalidAddressHex(String),
}

/// Channel handshake protocol violations. Returned before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The channel ordering is not the expected one
    #[error("invalid channel ordering: expected {expected:?}, got {got:?}")]
    InvalidOrdering {
        /// Expected ordering
        expected: IbcOrder,
        /// Ordering that was requested
        got: IbcOrder,
    },

    /// The local port is not the module's port
    #[error("invalid port: expected {expected}, got {got}")]
    InvalidPort {
        /// Expected port id
        expected: String,
        /// Port id that was requested
        got: String,
    },

    /// The counterparty port is not the peer module's port
    #[error("invalid counterparty port: expected {expected}, got {got}")]
    InvalidCounterpartyPort {
        /// Expected counterparty port id
        expected: String,
        /// Counterparty port id that was requested
        got: String,
    },

    /// The proposed or counterparty version is unsupported
    #[error("invalid version: expected {expected}, got {got}")]
    InvalidVersion {
        /// Expected version
        expected: String,
        /// Version that was proposed
        got: String,
    },

    /// The channel names no connection
    #[error("no connection hops: expected 1")]
    MissingConnectionHop,

    /// The channel is routed over more than one connection
    #[error("too many connection hops: expected 1, got {0}")]
    TooManyConnectionHops(usize),

    /// This side must not perform the given handshake step
    #[error("invalid channel flow: {0}")]
    InvalidChannelFlow(&'static str),

    /// The handshake metadata could not be parsed
    #[error("invalid handshake metadata: {0}")]
    InvalidMetadata(String),
}

/// Failures reported by the channel transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The destination light client has no currently valid state (e.g. expired)
    #[error("client {0} is not active")]
    ClientNotActive(String),

    /// No light client with this id
    #[error("client {0} not found")]
    ClientNotFound(String),

    /// No connection with this id
    #[error("connection {0} not found")]
    ConnectionNotFound(String),

    /// No channel with this id
    #[error("channel {port_id}/{channel_id} not found")]
    ChannelNotFound {
        /// Port of the channel
        port_id: String,
        /// Id of the channel
        channel_id: String,
    },

    /// The port is already bound by another module
    #[error("port {0} is already bound")]
    PortAlreadyBound(String),

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}
