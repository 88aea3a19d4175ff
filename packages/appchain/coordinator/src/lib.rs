#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod client;
/// Coordinator error types.
pub mod error;
pub mod genesis;
pub mod handshake;
pub mod hooks;
pub mod keepers;
mod keys;
pub mod msg;
pub mod query;
pub mod relay;
pub mod state;
pub mod timeout;
pub mod validator_set;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use appchain_types::host::IbcHost;

pub use error::CoordinatorError;
pub use keepers::{EpochsKeeper, RestakingKeeper};

/// The coordinator module: its collaborators and its own fee-pool address.
///
/// Every operation takes the store it runs against, so callers decide which store (or
/// overlay) a step writes to.
pub struct Coordinator<R, E, H> {
    /// Operator voting power and slashing
    pub restaking: R,
    /// Epoch scheduling
    pub epochs: E,
    /// Channel transport
    pub ibc: H,
    fee_pool_address: String,
}

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Wires the module to its collaborators.
    pub fn new(restaking: R, epochs: E, ibc: H, fee_pool_address: impl Into<String>) -> Self {
        Self {
            restaking,
            epochs,
            ibc,
            fee_pool_address: fee_pool_address.into(),
        }
    }

    /// Address receiving the coordinator's share of subscriber rewards.
    #[must_use]
    pub fn fee_pool_address(&self) -> &str {
        &self.fee_pool_address
    }
}
