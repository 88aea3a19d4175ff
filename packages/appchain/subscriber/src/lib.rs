#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]
#![allow(clippy::module_name_repetitions)]

pub mod abci;
pub mod distribution;
/// Subscriber error types.
pub mod error;
pub mod genesis;
pub mod handshake;
pub mod historical;
mod keys;
pub mod relay;
pub mod staking;
pub mod state;
pub mod validators;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use appchain_types::host::IbcHost;

pub use distribution::FeePool;
pub use error::SubscriberError;
pub use staking::StakingKeeper;

/// The subscriber module and its collaborators.
pub struct Subscriber<H, F> {
    /// Channel transport
    pub ibc: H,
    /// Fee collection and reward transfers
    pub fee_pool: F,
}

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Wires the module to its collaborators.
    pub const fn new(ibc: H, fee_pool: F) -> Self {
        Self { ibc, fee_pool }
    }
}
