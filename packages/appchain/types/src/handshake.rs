//! Channel handshake messages and the checks both sides share.

use cosmwasm_std::{IbcEndpoint, IbcOrder};
use serde::{Deserialize, Serialize};

use crate::{ensure, error::HandshakeError};

/// Port bound by the coordinator module
pub const COORDINATOR_PORT_ID: &str = "coordinator";
/// Port bound by the subscriber module
pub const SUBSCRIBER_PORT_ID: &str = "subscriber";
/// Version negotiated on the coordinator <-> subscriber channel
pub const VERSION: &str = "1";
/// Port of the token transfer module
pub const TRANSFER_PORT_ID: &str = "transfer";
/// Version of the token transfer channel
pub const TRANSFER_VERSION: &str = "ics20-1";

/// Metadata the coordinator returns as its version in `OpenTry`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMetadata {
    /// Address on the coordinator that receives the coordinator's reward share
    pub coordinator_fee_pool_addr: String,
    /// Protocol version, always [`VERSION`]
    pub version: String,
}

impl HandshakeMetadata {
    /// Creates metadata for the current version.
    #[must_use]
    pub fn new(coordinator_fee_pool_addr: impl Into<String>) -> Self {
        Self {
            coordinator_fee_pool_addr: coordinator_fee_pool_addr.into(),
            version: VERSION.to_string(),
        }
    }

    /// Encodes the metadata as the JSON string sent in the version field.
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_version_string(&self) -> Result<String, HandshakeError> {
        serde_json::to_string(self).map_err(|e| HandshakeError::InvalidMetadata(e.to_string()))
    }

    /// Parses the metadata from the counterparty's version field.
    /// # Errors
    /// Returns an error if the string is not valid metadata.
    pub fn from_version_string(version: &str) -> Result<Self, HandshakeError> {
        serde_json::from_str(version).map_err(|e| HandshakeError::InvalidMetadata(e.to_string()))
    }
}

/// `ChanOpenInit` as seen by the initiating module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenInit {
    /// Requested ordering
    pub order: IbcOrder,
    /// Connections the channel is routed over
    pub connection_hops: Vec<String>,
    /// Local port
    pub port_id: String,
    /// Local channel id
    pub channel_id: String,
    /// Counterparty port
    pub counterparty_port_id: String,
    /// Proposed version
    pub version: String,
}

/// `ChanOpenTry` as seen by the responding module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenTry {
    /// Requested ordering
    pub order: IbcOrder,
    /// Connections the channel is routed over
    pub connection_hops: Vec<String>,
    /// Local port
    pub port_id: String,
    /// Local channel id
    pub channel_id: String,
    /// Counterparty port and channel
    pub counterparty: IbcEndpoint,
    /// Version proposed by the counterparty
    pub counterparty_version: String,
}

/// `ChanOpenAck` as seen by the initiating module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenAck {
    /// Local port
    pub port_id: String,
    /// Local channel id
    pub channel_id: String,
    /// Channel id picked by the counterparty
    pub counterparty_channel_id: String,
    /// Version returned by the counterparty
    pub counterparty_version: String,
}

/// `ChanOpenConfirm` as seen by the responding module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenConfirm {
    /// Local port
    pub port_id: String,
    /// Local channel id
    pub channel_id: String,
}

/// The channel must be ordered.
/// # Errors
/// Returns an error for any other ordering.
pub fn validate_ordering(order: &IbcOrder) -> Result<(), HandshakeError> {
    ensure!(
        *order == IbcOrder::Ordered,
        HandshakeError::InvalidOrdering {
            expected: IbcOrder::Ordered,
            got: order.clone(),
        }
    );
    Ok(())
}

/// The local port must be the module's port.
/// # Errors
/// Returns an error if the ports differ.
pub fn validate_port(got: &str, expected: &str) -> Result<(), HandshakeError> {
    ensure!(
        got == expected,
        HandshakeError::InvalidPort {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    );
    Ok(())
}

/// The counterparty port must be the peer module's port.
/// # Errors
/// Returns an error if the ports differ.
pub fn validate_counterparty_port(got: &str, expected: &str) -> Result<(), HandshakeError> {
    ensure!(
        got == expected,
        HandshakeError::InvalidCounterpartyPort {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    );
    Ok(())
}

/// The version must be [`VERSION`].
/// # Errors
/// Returns an error for any other version.
pub fn validate_version(got: &str) -> Result<(), HandshakeError> {
    ensure!(
        got == VERSION,
        HandshakeError::InvalidVersion {
            expected: VERSION.to_string(),
            got: got.to_string(),
        }
    );
    Ok(())
}

/// The channel must run over exactly one connection. Returns that connection.
/// # Errors
/// Returns an error for zero or several hops.
pub fn single_connection_hop(hops: &[String]) -> Result<&str, HandshakeError> {
    match hops {
        [] => Err(HandshakeError::MissingConnectionHop),
        [hop] => Ok(hop),
        _ => Err(HandshakeError::TooManyConnectionHops(hops.len())),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn metadata_json() {
        let metadata = HandshakeMetadata::new("cosmos1feepool");
        let encoded = metadata.to_version_string().unwrap();
        assert_eq!(
            encoded,
            r#"{"coordinator_fee_pool_addr":"cosmos1feepool","version":"1"}"#
        );
        assert_eq!(HandshakeMetadata::from_version_string(&encoded).unwrap(), metadata);
        assert!(matches!(
            HandshakeMetadata::from_version_string("1"),
            Err(HandshakeError::InvalidMetadata(_))
        ));
    }

    #[rstest]
    #[case(vec![], Err(HandshakeError::MissingConnectionHop))]
    #[case(vec!["connection-0".to_string()], Ok("connection-0"))]
    #[case(
        vec!["connection-0".to_string(), "connection-1".to_string()],
        Err(HandshakeError::TooManyConnectionHops(2))
    )]
    fn connection_hops(#[case] hops: Vec<String>, #[case] expected: Result<&str, HandshakeError>) {
        assert_eq!(single_connection_hop(&hops), expected);
    }

    #[test]
    fn rejects_unordered_and_bad_versions() {
        assert!(validate_ordering(&IbcOrder::Ordered).is_ok());
        assert_eq!(
            validate_ordering(&IbcOrder::Unordered),
            Err(HandshakeError::InvalidOrdering {
                expected: IbcOrder::Ordered,
                got: IbcOrder::Unordered,
            })
        );
        assert!(validate_version("1").is_ok());
        assert!(validate_version("2").is_err());
        assert!(validate_port("transfer", COORDINATOR_PORT_ID).is_err());
        assert!(validate_counterparty_port(SUBSCRIBER_PORT_ID, SUBSCRIBER_PORT_ID).is_ok());
    }
}
