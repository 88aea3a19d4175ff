#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]
#![allow(clippy::module_name_repetitions)]

pub mod ack;
pub mod cache;
pub mod consensus_key;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handshake;
pub mod host;
pub mod light_client;
pub mod packet;
pub mod params;
pub mod store;
pub mod validator;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{HandshakeError, HostError, KeyError, ValidationError};

// Linked so that `cosmwasm-crypto` resolves its batch module
use ed25519_zebra as _;

/// Ensure that a condition is true, otherwise return an error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}
