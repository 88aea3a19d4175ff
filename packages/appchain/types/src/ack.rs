//! Packet acknowledgements.
//!
//! A handled slash request is acknowledged with the single byte `0x01`. Every other
//! acknowledgement uses the `{"result": ..}` / `{"error": ..}` envelope of [`StdAck`].

use cosmwasm_std::{Binary, StdAck};

/// Raw bytes of the slash-handled acknowledgement
pub const SLASH_HANDLED_ACK: [u8; 1] = [0x01];
/// Payload of a generic success acknowledgement
pub const SUCCESS_RESULT: [u8; 1] = [0x01];

/// An acknowledgement written for a received packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acknowledgement {
    /// A slash request was executed
    SlashHandled,
    /// Generic result or error
    Std(StdAck),
}

impl Acknowledgement {
    /// A generic success acknowledgement.
    #[must_use]
    pub fn success() -> Self {
        Self::Std(StdAck::success(SUCCESS_RESULT.to_vec()))
    }

    /// An error acknowledgement carrying the error's message.
    #[must_use]
    pub fn error(err: impl ToString) -> Self {
        Self::Std(StdAck::error(err.to_string()))
    }

    /// Whether this acknowledgement reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::SlashHandled => true,
            Self::Std(ack) => ack.is_success(),
        }
    }

    /// The error message, if this is an error acknowledgement.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Std(StdAck::Error(msg)) => Some(msg),
            _ => None,
        }
    }

    /// The bytes written to the channel.
    #[must_use]
    pub fn to_binary(&self) -> Binary {
        match self {
            Self::SlashHandled => Binary::from(SLASH_HANDLED_ACK.to_vec()),
            Self::Std(ack) => ack.to_binary(),
        }
    }

    /// Parses acknowledgement bytes received from the counterparty.
    ///
    /// Bytes that are neither the slash-handled marker nor a valid envelope are
    /// treated as an error acknowledgement.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        if bytes == SLASH_HANDLED_ACK {
            return Self::SlashHandled;
        }
        serde_json::from_slice::<StdAck>(bytes).map_or_else(
            |e| Self::error(format!("undecodable acknowledgement: {e}")),
            Self::Std,
        )
    }
}

impl From<StdAck> for Acknowledgement {
    fn from(ack: StdAck) -> Self {
        Self::Std(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_handled_is_a_single_byte() {
        let ack = Acknowledgement::SlashHandled;
        assert_eq!(ack.to_binary().as_slice(), &[0x01]);
        assert!(ack.is_success());
        assert_eq!(Acknowledgement::from_slice(&[0x01]), ack);
    }

    #[test]
    fn envelopes_parse_back() {
        let ok = Acknowledgement::success();
        assert_eq!(Acknowledgement::from_slice(ok.to_binary().as_slice()), ok);

        let err = Acknowledgement::error("unknown channel");
        assert!(!err.is_success());
        assert_eq!(err.error_message(), Some("unknown channel"));
        assert_eq!(Acknowledgement::from_slice(err.to_binary().as_slice()), err);
    }

    #[test]
    fn garbage_is_an_error() {
        let ack = Acknowledgement::from_slice(b"not json");
        assert!(!ack.is_success());
    }
}
