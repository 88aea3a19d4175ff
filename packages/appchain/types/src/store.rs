//! Key encoding and typed access to the KV store.
//!
//! A key is a one-byte table prefix, optionally followed by a chain id prefixed with its
//! length as 8 big-endian bytes, followed by a raw suffix. Numbers are always encoded as
//! 8 big-endian bytes so that lexicographic iteration follows numeric order.

use cosmwasm_std::{Order, Storage};
use serde::{de::DeserializeOwned, Serialize};

/// Key of a table entry without a chain component.
#[must_use]
pub fn key(prefix: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + suffix.len());
    key.push(prefix);
    key.extend_from_slice(suffix);
    key
}

/// Key of a per-chain table entry without suffix.
#[must_use]
pub fn chain_key(prefix: u8, chain_id: &str) -> Vec<u8> {
    chain_key_with_suffix(prefix, chain_id, &[])
}

/// Key of a per-chain table entry.
#[must_use]
pub fn chain_key_with_suffix(prefix: u8, chain_id: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + chain_id.len() + suffix.len());
    key.push(prefix);
    key.extend_from_slice(&(chain_id.len() as u64).to_be_bytes());
    key.extend_from_slice(chain_id.as_bytes());
    key.extend_from_slice(suffix);
    key
}

/// Splits a length-prefixed chain id off the front of `bytes`, returning the chain id and
/// the remaining bytes.
#[must_use]
pub fn split_chain_id(bytes: &[u8]) -> Option<(String, &[u8])> {
    let (len, rest) = bytes.split_first_chunk::<8>()?;
    let len = usize::try_from(u64::from_be_bytes(*len)).ok()?;
    if rest.len() < len {
        return None;
    }
    let (chain_id, rest) = rest.split_at(len);
    Some((String::from_utf8(chain_id.to_vec()).ok()?, rest))
}

/// Reads a big-endian u64 from exactly eight bytes.
#[must_use]
pub fn u64_from_be(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

/// The first key that sorts after every key starting with `prefix`, if any.
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// All entries under `prefix` in ascending key order, with the prefix stripped from the keys.
#[must_use]
pub fn prefix_entries(storage: &dyn Storage, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let end = prefix_end(prefix);
    storage
        .range(Some(prefix), end.as_deref(), Order::Ascending)
        .map(|(k, v)| (k[prefix.len()..].to_vec(), v))
        .collect()
}

/// Removes every entry under `prefix`.
pub fn remove_prefix(storage: &mut dyn Storage, prefix: &[u8]) {
    let keys: Vec<Vec<u8>> = prefix_entries(storage, prefix)
        .into_iter()
        .map(|(suffix, _)| [prefix, suffix.as_slice()].concat())
        .collect();
    for key in keys {
        storage.remove(&key);
    }
}

/// Loads a JSON value.
/// # Errors
/// Returns an error if the stored bytes do not decode as `T`.
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &[u8],
) -> Result<Option<T>, serde_json::Error> {
    storage
        .get(key)
        .map(|bytes| serde_json::from_slice(&bytes))
        .transpose()
}

/// Stores a value as JSON.
/// # Errors
/// Returns an error if `value` fails to serialize.
pub fn save_json<T: Serialize>(
    storage: &mut dyn Storage,
    key: &[u8],
    value: &T,
) -> Result<(), serde_json::Error> {
    storage.set(key, &serde_json::to_vec(value)?);
    Ok(())
}

/// Loads a big-endian u64.
#[must_use]
pub fn load_u64(storage: &dyn Storage, key: &[u8]) -> Option<u64> {
    storage.get(key).and_then(|bytes| u64_from_be(&bytes))
}

/// Stores a big-endian u64.
pub fn save_u64(storage: &mut dyn Storage, key: &[u8], value: u64) {
    storage.set(key, &value.to_be_bytes());
}

/// Loads a UTF-8 string.
#[must_use]
pub fn load_string(storage: &dyn Storage, key: &[u8]) -> Option<String> {
    storage
        .get(key)
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
