use appchain_types::{HandshakeError, HostError, KeyError, ValidationError};
use thiserror::Error;

use crate::distribution::FeePoolError;

#[derive(Error, Debug)]
#[allow(missing_docs, clippy::module_name_repetitions)]
pub enum SubscriberError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("channel transport: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("fee pool: {0}")]
    FeePool(#[from] FeePoolError),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("switching over from another coordinator is not supported")]
    SwitchoverUnsupported,

    #[error("coordinator channel {0} already exists")]
    CoordinatorChannelAlreadyExists(String),

    #[error("packet received on channel {got}, the coordinator channel is {expected}")]
    InvalidCoordinatorChannel { expected: String, got: String },

    #[error("coordinator client is not set")]
    CoordinatorClientNotSet,

    #[error("connection is built on client {got}, the coordinator client is {expected}")]
    ClientMismatch { expected: String, got: String },

    #[error("invalid packet data: {0}")]
    InvalidPacketData(String),

    #[error("params are not set")]
    ParamsNotSet,
}
