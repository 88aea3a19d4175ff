//! Construction of the tendermint light clients the two chains keep of each other.

use std::time::Duration;

use cosmwasm_std::{Decimal, Timestamp};
use ibc_proto::{
    google::protobuf::{Duration as ProtoDuration, Timestamp as ProtoTimestamp},
    ibc::{
        core::{client::v1::Height, commitment::v1::MerkleRoot},
        lightclients::tendermint::v1::{
            ClientState as TmClientState, ConsensusState as TmConsensusState, Fraction,
        },
    },
};

use crate::{error::ValidationError, params::TemplateClient, validator::ValidatorUpdate};

/// Root of the initial consensus state of a subscriber client. It is never used to verify
/// proofs: the first client update replaces it.
pub const SENTINEL_ROOT: &[u8] = b"sentinel_root";

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// `unbonding_period * fraction`, truncated to whole nanoseconds.
/// # Errors
/// Returns an error if the result does not fit a [`Duration`].
pub fn trusting_period(
    unbonding_period: Duration,
    fraction: Decimal,
) -> Result<Duration, ValidationError> {
    let nanos = unbonding_period
        .as_nanos()
        .checked_mul(fraction.atomics().u128())
        .ok_or(ValidationError::Overflow("trusting period"))?
        / 10u128.pow(Decimal::DECIMAL_PLACES);

    let secs = u64::try_from(nanos / NANOS_PER_SECOND)
        .map_err(|_| ValidationError::Overflow("trusting period"))?;
    #[allow(clippy::cast_possible_truncation)]
    let subsec = (nanos % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, subsec))
}

/// Revision number encoded in a chain id of the form `{name}-{N}`, with `N` not starting
/// with zero. Chain ids without that suffix have revision number 0.
#[must_use]
pub fn revision_number_from_chain_id(chain_id: &str) -> u64 {
    let Some((name, revision)) = chain_id.rsplit_once('-') else {
        return 0;
    };
    let well_formed = !name.is_empty()
        && !name.ends_with('-')
        && revision.starts_with(|c: char| ('1'..='9').contains(&c))
        && revision.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return 0;
    }
    revision.parse().unwrap_or(0)
}

/// Builds a client of `chain_id` from the template, with its latest height at
/// `revision_height` of the chain's current revision.
/// # Errors
/// Returns an error if a period overflows the protobuf duration.
pub fn client_state_from_template(
    template: &TemplateClient,
    chain_id: &str,
    revision_height: u64,
    trusting_period: Duration,
    unbonding_period: Duration,
) -> Result<TmClientState, ValidationError> {
    Ok(TmClientState {
        chain_id: chain_id.to_string(),
        trust_level: Some(Fraction {
            numerator: template.trust_level.numerator,
            denominator: template.trust_level.denominator,
        }),
        trusting_period: Some(to_proto_duration(trusting_period)?),
        unbonding_period: Some(to_proto_duration(unbonding_period)?),
        max_clock_drift: Some(to_proto_duration(template.max_clock_drift)?),
        frozen_height: Some(Height::default()),
        latest_height: Some(Height {
            revision_number: revision_number_from_chain_id(chain_id),
            revision_height,
        }),
        proof_specs: vec![ics23::iavl_spec(), ics23::tendermint_spec()],
        upgrade_path: template.upgrade_path.clone(),
        ..Default::default()
    })
}

/// Hash of a validator set in the consensus engine's merkle encoding.
/// # Errors
/// Returns an error if a power is negative.
pub fn validator_set_hash(validators: &[ValidatorUpdate]) -> Result<Vec<u8>, ValidationError> {
    let infos = validators
        .iter()
        .map(|v| {
            let power = tendermint::vote::Power::try_from(v.power)
                .map_err(|_| ValidationError::NonPositivePower(v.power))?;
            Ok(tendermint::validator::Info::new(*v.pub_key.native(), power))
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    Ok(tendermint::validator::Set::without_proposer(infos)
        .hash()
        .as_bytes()
        .to_vec())
}

/// Initial consensus state of a client: the block time, the sentinel root and the hash of
/// the validator set that signs the next block.
/// # Errors
/// Returns an error if the time overflows the protobuf timestamp.
pub fn initial_consensus_state(
    time: Timestamp,
    next_validators_hash: Vec<u8>,
) -> Result<TmConsensusState, ValidationError> {
    Ok(TmConsensusState {
        timestamp: Some(to_proto_timestamp(time)?),
        root: Some(MerkleRoot {
            hash: SENTINEL_ROOT.to_vec(),
        }),
        next_validators_hash,
    })
}

/// Converts a [`Duration`] into its protobuf form.
/// # Errors
/// Returns an error if the seconds overflow.
pub fn to_proto_duration(duration: Duration) -> Result<ProtoDuration, ValidationError> {
    Ok(ProtoDuration {
        seconds: i64::try_from(duration.as_secs())
            .map_err(|_| ValidationError::Overflow("duration seconds"))?,
        nanos: i32::try_from(duration.subsec_nanos())
            .map_err(|_| ValidationError::Overflow("duration nanos"))?,
    })
}

/// Converts a block [`Timestamp`] into its protobuf form.
/// # Errors
/// Returns an error if the seconds overflow.
pub fn to_proto_timestamp(time: Timestamp) -> Result<ProtoTimestamp, ValidationError> {
    Ok(ProtoTimestamp {
        seconds: i64::try_from(time.seconds())
            .map_err(|_| ValidationError::Overflow("timestamp seconds"))?,
        nanos: i32::try_from(time.subsec_nanos())
            .map_err(|_| ValidationError::Overflow("timestamp nanos"))?,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_utils::consensus_key;

    #[rstest]
    #[case("appchain-1", 1)]
    #[case("exocore-testnet-42", 42)]
    #[case("appchain", 0)]
    #[case("appchain-0", 0)]
    #[case("appchain-01", 0)]
    #[case("-1", 0)]
    #[case("appchain--1", 0)]
    #[case("appchain-1a", 0)]
    fn revision_numbers(#[case] chain_id: &str, #[case] expected: u64) {
        assert_eq!(revision_number_from_chain_id(chain_id), expected);
    }

    #[test]
    fn trusting_period_truncates() {
        let unbonding = Duration::from_secs(21 * 24 * 60 * 60);
        let trusting = trusting_period(unbonding, Decimal::percent(66)).unwrap();
        assert_eq!(trusting, Duration::from_secs(1_197_504));

        let odd = trusting_period(Duration::from_nanos(10), Decimal::percent(33)).unwrap();
        assert_eq!(odd, Duration::from_nanos(3));
    }

    #[test]
    fn client_state_carries_template_and_chain() {
        let template = TemplateClient::default();
        let client = client_state_from_template(
            &template,
            "appchain-3",
            1,
            Duration::from_secs(100),
            Duration::from_secs(200),
        )
        .unwrap();

        assert_eq!(client.chain_id, "appchain-3");
        assert_eq!(
            client.latest_height,
            Some(Height {
                revision_number: 3,
                revision_height: 1
            })
        );
        assert_eq!(client.trusting_period.unwrap().seconds, 100);
        assert_eq!(client.unbonding_period.unwrap().seconds, 200);
        assert_eq!(client.trust_level.unwrap().denominator, 3);
        assert_eq!(client.upgrade_path, template.upgrade_path);
    }

    #[test]
    fn validator_set_hash_is_order_independent() {
        let a = ValidatorUpdate::new(consensus_key(1), 100);
        let b = ValidatorUpdate::new(consensus_key(2), 50);

        let forward = validator_set_hash(&[a.clone(), b.clone()]).unwrap();
        let backward = validator_set_hash(&[b, a]).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 32);
    }

    #[test]
    fn consensus_state_uses_sentinel_root() {
        let state = initial_consensus_state(Timestamp::from_seconds(5), vec![7; 32]).unwrap();
        assert_eq!(state.root.unwrap().hash, SENTINEL_ROOT);
        assert_eq!(state.timestamp.unwrap().seconds, 5);
        assert_eq!(state.next_validators_hash, vec![7; 32]);
    }
}
