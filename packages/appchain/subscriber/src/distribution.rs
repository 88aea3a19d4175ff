//! Reward split between the subscriber and the coordinator.
//!
//! Every block the fees collected on the subscriber are split: the subscriber share is
//! handed to the local distribution and the coordinator share is set aside. Every
//! `blocks_per_distribution_transmission` blocks the set-aside amount is transferred to
//! the coordinator's fee pool over the transfer channel.

use std::time::Duration;

use appchain_types::{
    events::{
        ATTRIBUTE_CHANNEL_ID, ATTRIBUTE_COORDINATOR_AMOUNT, ATTRIBUTE_SUBSCRIBER_AMOUNT,
        EVENT_TYPE_FEE_DISTRIBUTION,
    },
    host::{timeout_after, IbcHost},
    ValidationError,
};
use cosmwasm_std::{Env, Event, Storage, Timestamp, Uint128};
use thiserror::Error;

use crate::{error::SubscriberError, state, Subscriber};

/// Failure reported by the fee collector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FeePoolError(pub String);

/// A transfer of rewards to the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardTransfer {
    /// Transfer channel
    pub channel_id: String,
    /// Denomination
    pub denom: String,
    /// Amount
    pub amount: Uint128,
    /// Coordinator fee-pool address
    pub receiver: String,
    /// Timeout of the transfer
    pub timeout: Timestamp,
}

/// The fee collector of the subscriber chain.
pub trait FeePool {
    /// Fees collected so far in `denom`.
    fn collected_fees(&self, storage: &dyn Storage, denom: &str) -> Uint128;

    /// Moves `amount` of collected fees to the local distribution.
    /// # Errors
    /// Returns an error if the move fails.
    fn redistribute(&mut self, storage: &mut dyn Storage, denom: &str, amount: Uint128) -> Result<(), FeePoolError>;

    /// Moves `amount` of collected fees to the module account holding the coordinator's
    /// share.
    /// # Errors
    /// Returns an error if the move fails.
    fn reserve_for_coordinator(
        &mut self,
        storage: &mut dyn Storage,
        denom: &str,
        amount: Uint128,
    ) -> Result<(), FeePoolError>;

    /// Sends reserved rewards to the coordinator.
    /// # Errors
    /// Returns an error if the transfer cannot be initiated.
    fn transfer(&mut self, storage: &mut dyn Storage, transfer: &RewardTransfer) -> Result<(), FeePoolError>;
}

impl<H, F> Subscriber<H, F>
where
    H: IbcHost,
    F: FeePool,
{
    /// Splits the fees collected in this block and transmits the coordinator's share once
    /// the transmission interval has passed.
    /// # Errors
    /// Returns an error if the split cannot be recorded. A failed transmission is logged and
    /// retried at the next interval.
    pub fn distribute_fees(&mut self, storage: &mut dyn Storage, env: &Env) -> Result<Vec<Event>, SubscriberError> {
        let params = state::params(storage)?;
        let mut events = Vec::new();

        let fees = self.fee_pool.collected_fees(storage, &params.reward_denom);
        if !fees.is_zero() {
            let subscriber_amount = fees.mul_floor(params.subscriber_redistribution_fraction);
            let coordinator_amount = fees - subscriber_amount;

            self.fee_pool
                .redistribute(storage, &params.reward_denom, subscriber_amount)?;
            self.fee_pool
                .reserve_for_coordinator(storage, &params.reward_denom, coordinator_amount)?;
            let pending = state::pending_coordinator_rewards(storage)?
                .checked_add(coordinator_amount)
                .map_err(|_| ValidationError::Overflow("pending coordinator rewards"))?;
            state::set_pending_coordinator_rewards(storage, pending)?;

            events.push(
                Event::new(EVENT_TYPE_FEE_DISTRIBUTION)
                    .add_attribute(ATTRIBUTE_SUBSCRIBER_AMOUNT, subscriber_amount.to_string())
                    .add_attribute(ATTRIBUTE_COORDINATOR_AMOUNT, coordinator_amount.to_string()),
            );
        }

        let height = env.block.height;
        let due = state::last_transmission_height(storage)
            .saturating_add(params.blocks_per_distribution_transmission);
        if height >= due {
            events.extend(self.transmit_rewards(
                storage,
                env,
                &params.reward_denom,
                params.transfer_timeout_period,
            )?);
            state::set_last_transmission_height(storage, height);
        }
        Ok(events)
    }

    fn transmit_rewards(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        denom: &str,
        timeout_period: Duration,
    ) -> Result<Option<Event>, SubscriberError> {
        let amount = state::pending_coordinator_rewards(storage)?;
        if amount.is_zero() {
            return Ok(None);
        }
        let (Some(channel_id), Some(receiver)) = (
            state::transfer_channel(storage),
            state::coordinator_fee_pool_addr(storage),
        ) else {
            tracing::info!(%amount, "transfer channel not ready, keeping coordinator rewards");
            return Ok(None);
        };

        let transfer = RewardTransfer {
            channel_id,
            denom: denom.to_string(),
            amount,
            receiver,
            timeout: timeout_after(env.block.time, timeout_period),
        };
        match self.fee_pool.transfer(storage, &transfer) {
            Ok(()) => {
                state::set_pending_coordinator_rewards(storage, Uint128::zero())?;
                tracing::info!(
                    channel_id = %transfer.channel_id,
                    receiver = %transfer.receiver,
                    %amount,
                    "sent rewards to the coordinator"
                );
                Ok(Some(
                    Event::new(EVENT_TYPE_FEE_DISTRIBUTION)
                        .add_attribute(ATTRIBUTE_CHANNEL_ID, transfer.channel_id)
                        .add_attribute(ATTRIBUTE_COORDINATOR_AMOUNT, amount.to_string()),
                ))
            }
            Err(err) => {
                tracing::error!(channel_id = %transfer.channel_id, %amount, %err, "reward transfer failed");
                Ok(None)
            }
        }
    }
}
