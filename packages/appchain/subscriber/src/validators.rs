//! The local validator set.

use appchain_types::{ensure, validator::{SubscriberValidator, ValidatorUpdate}, ValidationError};
use cosmwasm_std::Storage;

use crate::{error::SubscriberError, state};

/// Applies `changes` to the validator records and returns the ones that changed
/// something, in the order given.
///
/// Zero power removes a validator and positive power inserts or updates one. Removing a
/// validator that has no record is a no-op and is not returned.
/// # Errors
/// Returns an error, before anything is written, if a power is negative, and otherwise
/// if a record cannot be loaded or stored.
pub fn apply_validator_changes(
    storage: &mut dyn Storage,
    changes: &[ValidatorUpdate],
) -> Result<Vec<ValidatorUpdate>, SubscriberError> {
    for change in changes {
        ensure!(
            change.power >= 0,
            ValidationError::NonPositivePower(change.power)
        );
    }

    let mut applied = Vec::with_capacity(changes.len());
    for change in changes {
        let address = change.address();
        let existing = state::subscriber_validator(storage, &address)?;
        match (existing, change.power) {
            (Some(_), 0) => {
                state::remove_subscriber_validator(storage, &address);
                tracing::debug!(%address, "removed validator");
            }
            (None, 0) => continue,
            (_, power) => {
                state::set_subscriber_validator(
                    storage,
                    &SubscriberValidator::new(change.pub_key.clone(), power),
                )?;
                tracing::debug!(%address, power, "set validator power");
            }
        }
        applied.push(change.clone());
    }
    Ok(applied)
}

/// Merges `incoming` into `pending`: the last power received for a key wins, keys seen
/// for the first time are appended.
pub fn merge_changes(pending: &mut Vec<ValidatorUpdate>, incoming: Vec<ValidatorUpdate>) {
    for update in incoming {
        match pending.iter_mut().find(|p| p.pub_key == update.pub_key) {
            Some(existing) => existing.power = update.power,
            None => pending.push(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use appchain_types::test_utils::consensus_key;
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    fn update(seed: u8, power: i64) -> ValidatorUpdate {
        ValidatorUpdate::new(consensus_key(seed), power)
    }

    #[test]
    fn insert_update_delete_and_noop() {
        let mut storage = MockStorage::new();
        apply_validator_changes(&mut storage, &[update(1, 10), update(2, 20)]).unwrap();

        let applied =
            apply_validator_changes(&mut storage, &[update(1, 15), update(2, 0), update(3, 0)])
                .unwrap();

        assert_eq!(applied, vec![update(1, 15), update(2, 0)]);
        let validators = state::subscriber_validators(&storage).unwrap();
        assert_eq!(validators, vec![SubscriberValidator::new(consensus_key(1), 15)]);
    }

    #[test]
    fn negative_power_writes_nothing() {
        let mut storage = MockStorage::new();
        let err = apply_validator_changes(&mut storage, &[update(1, 10), update(2, -1)]).unwrap_err();

        assert!(matches!(
            err,
            SubscriberError::Validation(ValidationError::NonPositivePower(-1))
        ));
        assert!(state::subscriber_validators(&storage).unwrap().is_empty());
    }

    #[test]
    fn last_writer_wins() {
        let mut pending = vec![update(1, 10), update(2, 20)];
        merge_changes(&mut pending, vec![update(2, 0), update(3, 30)]);
        merge_changes(&mut pending, vec![update(1, 11)]);

        assert_eq!(pending, vec![update(1, 11), update(2, 0), update(3, 30)]);
    }
}
