//! Validator sets of recent heights, kept for light-client misbehaviour checks and
//! introspection by the host chain.

use appchain_types::validator::{power_then_address, SubscriberValidator};
use cosmwasm_std::{Env, Storage, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{error::SubscriberError, state};

/// The parts of a block header kept with a historical validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalHeader {
    /// Chain id
    pub chain_id: String,
    /// Block height
    pub height: u64,
    /// Block time
    pub time: Timestamp,
}

/// The validator set of one height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalInfo {
    /// Header of the block
    pub header: HistoricalHeader,
    /// Validators, by descending power
    pub valset: Vec<SubscriberValidator>,
}

/// Records the current validator set and drops the entries that fell out of the
/// `historical_entries` window.
/// # Errors
/// Returns an error if the params or a validator record cannot be loaded.
pub fn track_historical_info(storage: &mut dyn Storage, env: &Env) -> Result<(), SubscriberError> {
    let entries = state::params(storage)?.historical_entries;
    let height = env.block.height;

    let oldest_kept = height.saturating_sub(entries.saturating_sub(1));
    for stale in state::historical_heights(storage)
        .into_iter()
        .take_while(|h| *h < oldest_kept)
    {
        state::remove_historical_info(storage, stale);
    }

    let mut valset = state::subscriber_validators(storage)?;
    valset.sort_by(|a, b| {
        power_then_address((a.power, &a.cons_address), (b.power, &b.cons_address))
    });
    state::set_historical_info(
        storage,
        &HistoricalInfo {
            header: HistoricalHeader {
                chain_id: env.block.chain_id.clone(),
                height,
                time: env.block.time,
            },
            valset,
        },
    )
}

/// The validator set recorded at `height`, if it is still in the window.
/// # Errors
/// Returns an error if the entry cannot be decoded.
pub fn historical_info(storage: &dyn Storage, height: u64) -> Result<Option<HistoricalInfo>, SubscriberError> {
    state::historical_info(storage, height)
}

#[cfg(test)]
mod tests {
    use appchain_types::params::SubscriberParams;
    use cosmwasm_std::testing::{mock_env, MockStorage};

    use super::*;
    use crate::test_utils::subscriber_with_genesis;

    #[test]
    fn window_keeps_the_last_entries() {
        let mut storage = MockStorage::new();
        let mut env = mock_env();
        let _ = subscriber_with_genesis(&mut storage, &env);
        let params = SubscriberParams {
            historical_entries: 3,
            ..state::params(&storage).unwrap()
        };
        state::set_params(&mut storage, &params).unwrap();

        let start = env.block.height;
        for height in start..start + 5 {
            env.block.height = height;
            track_historical_info(&mut storage, &env).unwrap();
        }

        assert_eq!(
            state::historical_heights(&storage),
            vec![start + 2, start + 3, start + 4]
        );
        let info = historical_info(&storage, start + 4).unwrap().unwrap();
        assert_eq!(info.header.chain_id, env.block.chain_id);
        assert_eq!(
            info.valset.iter().map(|v| v.power).collect::<Vec<_>>(),
            vec![100, 50]
        );
        assert_eq!(historical_info(&storage, start).unwrap(), None);
    }
}
