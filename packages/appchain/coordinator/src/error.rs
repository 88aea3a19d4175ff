use appchain_types::{HandshakeError, HostError, KeyError, ValidationError};
use thiserror::Error;

use crate::keepers::RestakingError;

#[derive(Error, Debug)]
#[allow(missing_docs, clippy::module_name_repetitions)]
pub enum CoordinatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("channel transport: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("restaking: {0}")]
    Restaking(#[from] RestakingError),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("registering the subscriber chain with the restaking module failed: {0}")]
    RegisterAvsFailed(#[source] RestakingError),

    #[error("unknown epoch identifier `{0}`")]
    EpochNotFound(String),

    #[error("subscriber chain `{0}` is already registered")]
    SubscriberChainAlreadyRegistered(String),

    #[error("no active operators for subscriber chain `{0}`")]
    NoOperators(String),

    #[error("unknown subscriber chain `{0}`")]
    UnknownSubscriberChain(String),

    #[error("unknown subscriber channel `{0}`")]
    UnknownSubscriberChannelId(String),

    #[error("no subscriber chain uses client `{0}`")]
    UnknownClient(String),

    #[error("client mismatch for chain `{chain_id}`: expected {expected}, got {got}")]
    ClientIdMismatch {
        chain_id: String,
        expected: String,
        got: String,
    },

    #[error("subscriber chain `{chain_id}` already has channel {channel_id}")]
    SubscriberChannelAlreadyExists { chain_id: String, channel_id: String },

    #[error("invalid packet data: {0}")]
    InvalidPacketData(String),

    #[error("validator {address} is unknown on chain `{chain_id}`")]
    UnknownValidator { chain_id: String, address: String },

    #[error("valset update id {got} is ahead of the last one sent ({last})")]
    InvalidVscId { got: u64, last: u64 },

    #[error("params are not set")]
    ParamsNotSet,
}
