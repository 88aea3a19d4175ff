//! Chain parameters of the coordinator and subscriber modules, with stateless validation.

use std::time::Duration;

use cosmwasm_std::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::{ensure, error::ValidationError};

const DAY: u64 = 24 * 60 * 60;
const WEEK: u64 = 7 * DAY;

/// Default epoch identifier for handshake and packet timeouts
pub const DEFAULT_TIMEOUT_EPOCH_IDENTIFIER: &str = "week";

/// Trust level of a light client, as a fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLevel {
    /// Numerator
    pub numerator: u64,
    /// Denominator
    pub denominator: u64,
}

impl TrustLevel {
    /// Checks that the level is within `[1/3, 1]`.
    /// # Errors
    /// Returns an error if it is not.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Self {
            numerator,
            denominator,
        } = *self;
        let valid = denominator != 0
            && numerator <= denominator
            && u128::from(numerator) * 3 >= u128::from(denominator);
        ensure!(
            valid,
            ValidationError::InvalidTrustLevel {
                numerator,
                denominator,
            }
        );
        Ok(())
    }
}

impl Default for TrustLevel {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 3,
        }
    }
}

/// Fields of the tendermint light client that are the same for every subscriber.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateClient {
    /// Trust level of the client
    pub trust_level: TrustLevel,
    /// Allowed clock drift between the chains
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_clock_drift: Duration,
    /// Store path of upgraded client states
    pub upgrade_path: Vec<String>,
}

impl Default for TemplateClient {
    fn default() -> Self {
        Self {
            trust_level: TrustLevel::default(),
            max_clock_drift: Duration::from_secs(10),
            upgrade_path: vec!["upgrade".to_string(), "upgradedIBCState".to_string()],
        }
    }
}

impl TemplateClient {
    /// Checks the trust level and clock drift.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.trust_level.validate()?;
        ensure!(
            !self.max_clock_drift.is_zero(),
            ValidationError::NonPositiveDuration("max_clock_drift")
        );
        Ok(())
    }
}

/// A timespan counted in epochs of a given identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochsDuration {
    /// Identifier of the epochs being counted
    pub epoch_identifier: String,
    /// Number of epochs
    pub epochs: u64,
}

impl EpochsDuration {
    /// Creates a duration.
    #[must_use]
    pub fn new(epoch_identifier: impl Into<String>, epochs: u64) -> Self {
        Self {
            epoch_identifier: epoch_identifier.into(),
            epochs,
        }
    }

    /// Checks that the identifier is set and the duration is positive.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        validate_epoch_identifier(&self.epoch_identifier)?;
        ensure!(self.epochs > 0, ValidationError::ZeroValue(field));
        Ok(())
    }
}

/// Parameters of the coordinator module.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorParams {
    /// Template of every subscriber light client
    pub template_client: TemplateClient,
    /// Share of the subscriber's unbonding period used as the client's trusting period
    pub trusting_period_fraction: Decimal,
    /// Timeout of packets sent to subscribers
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ibc_timeout_period: Duration,
    /// Time a registered chain has to complete its handshake
    pub init_timeout_period: EpochsDuration,
    /// Time a subscriber has to report a sent change-set as matured
    pub vsc_timeout_period: EpochsDuration,
}

impl Default for CoordinatorParams {
    fn default() -> Self {
        Self {
            template_client: TemplateClient::default(),
            trusting_period_fraction: Decimal::percent(66),
            ibc_timeout_period: Duration::from_secs(4 * WEEK),
            init_timeout_period: EpochsDuration::new(DEFAULT_TIMEOUT_EPOCH_IDENTIFIER, 4),
            vsc_timeout_period: EpochsDuration::new(DEFAULT_TIMEOUT_EPOCH_IDENTIFIER, 12),
        }
    }
}

impl CoordinatorParams {
    /// Stateless checks of every parameter.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.template_client.validate()?;
        validate_fraction(
            "trusting_period_fraction",
            self.trusting_period_fraction,
            false,
        )?;
        ensure!(
            !self.ibc_timeout_period.is_zero(),
            ValidationError::NonPositiveDuration("ibc_timeout_period")
        );
        self.init_timeout_period.validate("init_timeout_period")?;
        self.vsc_timeout_period.validate("vsc_timeout_period")?;
        Ok(())
    }
}

/// Parameters of the subscriber module. The coordinator chooses them at registration.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberParams {
    /// Coordinator address receiving the coordinator's reward share, learnt in the handshake
    #[serde(default)]
    pub coordinator_fee_pool_addr: String,
    /// Transfer channel used for reward transmission, opened after the handshake
    #[serde(default)]
    pub distribution_transmission_channel: String,
    /// Blocks between two reward transmissions
    pub blocks_per_distribution_transmission: u64,
    /// Share of the collected fees kept by the subscriber
    pub subscriber_redistribution_fraction: Decimal,
    /// Denomination of the rewards
    pub reward_denom: String,
    /// Timeout of packets sent to the coordinator
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ibc_timeout_period: Duration,
    /// Timeout of reward transfers
    #[serde_as(as = "DurationSeconds<u64>")]
    pub transfer_timeout_period: Duration,
    /// Time after which a received change-set is mature
    #[serde_as(as = "DurationSeconds<u64>")]
    pub unbonding_period: Duration,
    /// Number of historical entries kept
    pub historical_entries: u64,
    /// Share slashed for downtime
    pub slash_fraction_downtime: Decimal,
    /// Jail time for downtime
    #[serde_as(as = "DurationSeconds<u64>")]
    pub downtime_jail_duration: Duration,
}

impl Default for SubscriberParams {
    fn default() -> Self {
        Self {
            coordinator_fee_pool_addr: String::new(),
            distribution_transmission_channel: String::new(),
            blocks_per_distribution_transmission: 1000,
            subscriber_redistribution_fraction: Decimal::percent(75),
            reward_denom: "stake".to_string(),
            ibc_timeout_period: Duration::from_secs(4 * WEEK),
            transfer_timeout_period: Duration::from_secs(60 * 60),
            unbonding_period: Duration::from_secs(21 * DAY),
            historical_entries: 10_000,
            slash_fraction_downtime: Decimal::permille(1),
            downtime_jail_duration: Duration::from_secs(600),
        }
    }
}

impl SubscriberParams {
    /// Stateless checks of every parameter.
    /// # Errors
    /// Returns the first check that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure!(
            self.blocks_per_distribution_transmission > 0,
            ValidationError::ZeroValue("blocks_per_distribution_transmission")
        );
        validate_fraction(
            "subscriber_redistribution_fraction",
            self.subscriber_redistribution_fraction,
            true,
        )?;
        ensure!(
            !self.reward_denom.trim().is_empty(),
            ValidationError::BlankField("reward_denom")
        );
        for (field, duration) in [
            ("ibc_timeout_period", self.ibc_timeout_period),
            ("transfer_timeout_period", self.transfer_timeout_period),
            ("unbonding_period", self.unbonding_period),
            ("downtime_jail_duration", self.downtime_jail_duration),
        ] {
            ensure!(
                !duration.is_zero(),
                ValidationError::NonPositiveDuration(field)
            );
        }
        ensure!(
            self.historical_entries > 0,
            ValidationError::ZeroValue("historical_entries")
        );
        validate_fraction(
            "slash_fraction_downtime",
            self.slash_fraction_downtime,
            true,
        )?;
        Ok(())
    }
}

/// Checks that a fraction is in `[0, 1]`, or `(0, 1]` if `allow_zero` is false.
fn validate_fraction(
    field: &'static str,
    value: Decimal,
    allow_zero: bool,
) -> Result<(), ValidationError> {
    let in_range = value <= Decimal::one() && (allow_zero || !value.is_zero());
    ensure!(
        in_range,
        ValidationError::FractionOutOfRange {
            field,
            value: value.to_string(),
            min: if allow_zero { "0" } else { "0 (exclusive)" }.to_string(),
            max: "1".to_string(),
        }
    );
    Ok(())
}

/// A chain id must not be blank.
/// # Errors
/// Returns an error if it is.
pub fn validate_chain_id(chain_id: &str) -> Result<(), ValidationError> {
    ensure!(!chain_id.trim().is_empty(), ValidationError::BlankChainId);
    Ok(())
}

/// An epoch identifier must not be blank.
/// # Errors
/// Returns an error if it is.
pub fn validate_epoch_identifier(identifier: &str) -> Result<(), ValidationError> {
    ensure!(
        !identifier.trim().is_empty(),
        ValidationError::BlankEpochIdentifier
    );
    Ok(())
}

/// An asset id is `0x<40 hex digits>_0x<hex digits>`: the token address and the id of the
/// chain it lives on.
/// # Errors
/// Returns an error if the id does not have that shape.
pub fn validate_asset_id(asset_id: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidAssetId(asset_id.to_string());
    let (address, chain) = asset_id.split_once('_').ok_or_else(invalid)?;

    let address = address.strip_prefix("0x").ok_or_else(invalid)?;
    let chain = chain.strip_prefix("0x").ok_or_else(invalid)?;

    let is_hex = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit());
    ensure!(address.len() == 40 && is_hex(address), invalid());
    ensure!(is_hex(chain), invalid());
    Ok(())
}
