//! Consensus keys and the addresses derived from them.
//!
//! A validator's consensus key shows up in several encodings: raw ed25519 bytes, a protobuf
//! `Any` wrapping `cosmos.crypto.ed25519.PubKey`, the ABCI `PublicKey` handed to the consensus
//! engine and the native [`tendermint::PublicKey`]. [`ConsensusKey`] is built once per key and
//! exposes all of them, together with the [`ConsAddr`] used to key state.

use std::fmt;
use std::str::FromStr;

use cosmos_sdk_proto::cosmos::crypto::ed25519::PubKey as ProtoEd25519PubKey;
use cosmwasm_std::Binary;
use ibc_proto::google::protobuf::Any;
use prost::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tendermint_proto::crypto::{public_key::Sum, PublicKey as AbciPublicKey};

use crate::error::KeyError;

/// Protobuf type url of an ed25519 consensus public key
pub const ED25519_PUB_KEY_TYPE_URL: &str = "/cosmos.crypto.ed25519.PubKey";
/// Length of a raw ed25519 public key
pub const ED25519_PUB_KEY_LEN: usize = 32;
/// Length of a consensus address
pub const CONS_ADDR_LEN: usize = 20;

/// A consensus address: the first 20 bytes of the sha256 of the public key.
///
/// Displayed and serialized as upper-case hex, the way the consensus engine prints addresses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsAddr([u8; CONS_ADDR_LEN]);

impl ConsAddr {
    /// Wraps raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; CONS_ADDR_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CONS_ADDR_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ConsAddr {
    type Error = KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; CONS_ADDR_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidAddressLength(bytes.len()))?;
        Ok(Self(raw))
    }
}

impl FromStr for ConsAddr {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidAddressHex(s.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl TryFrom<String> for ConsAddr {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConsAddr> for String {
    fn from(addr: ConsAddr) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for ConsAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for ConsAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsAddr({self})")
    }
}

/// An ed25519 consensus public key in all of its encodings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WirePubKey", into = "WirePubKey")]
pub struct ConsensusKey {
    raw: [u8; ED25519_PUB_KEY_LEN],
    native: tendermint::PublicKey,
    address: ConsAddr,
}

impl ConsensusKey {
    /// Builds the key from raw ed25519 bytes.
    /// # Errors
    /// Returns an error if the bytes are not a 32-byte ed25519 public key.
    pub fn from_ed25519(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; ED25519_PUB_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        let native = tendermint::PublicKey::from_raw_ed25519(&raw).ok_or(KeyError::InvalidEd25519)?;

        let digest = Sha256::digest(raw);
        let mut address = [0u8; CONS_ADDR_LEN];
        address.copy_from_slice(&digest[..CONS_ADDR_LEN]);

        Ok(Self {
            raw,
            native,
            address: ConsAddr(address),
        })
    }

    /// Builds the key from a protobuf `Any` wrapping `cosmos.crypto.ed25519.PubKey`.
    /// # Errors
    /// Returns an error if the `Any` carries another key type or cannot be decoded.
    pub fn from_any(any: &Any) -> Result<Self, KeyError> {
        if any.type_url != ED25519_PUB_KEY_TYPE_URL {
            return Err(KeyError::UnsupportedKeyType(any.type_url.clone()));
        }
        let key = ProtoEd25519PubKey::decode(any.value.as_slice())
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        Self::from_ed25519(&key.key)
    }

    /// Builds the key from the ABCI representation.
    /// # Errors
    /// Returns an error if the key is not ed25519.
    pub fn from_abci(key: &AbciPublicKey) -> Result<Self, KeyError> {
        match &key.sum {
            Some(Sum::Ed25519(bytes)) => Self::from_ed25519(bytes),
            Some(_) => Err(KeyError::UnsupportedKeyType("non-ed25519".to_string())),
            None => Err(KeyError::UnsupportedKeyType(String::new())),
        }
    }

    /// Raw ed25519 bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ED25519_PUB_KEY_LEN] {
        &self.raw
    }

    /// The consensus address derived from this key.
    #[must_use]
    pub const fn address(&self) -> ConsAddr {
        self.address
    }

    /// The native consensus engine key.
    #[must_use]
    pub const fn native(&self) -> &tendermint::PublicKey {
        &self.native
    }

    /// The key wrapped in a protobuf `Any`.
    #[must_use]
    pub fn to_any(&self) -> Any {
        Any {
            type_url: ED25519_PUB_KEY_TYPE_URL.to_string(),
            value: ProtoEd25519PubKey {
                key: self.raw.to_vec(),
            }
            .encode_to_vec(),
        }
    }

    /// The key as handed to the consensus engine in validator updates.
    #[must_use]
    pub fn to_abci(&self) -> AbciPublicKey {
        AbciPublicKey {
            sum: Some(Sum::Ed25519(self.raw.to_vec())),
        }
    }
}

impl fmt::Debug for ConsensusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusKey")
            .field("ed25519", &hex::encode(self.raw))
            .field("address", &self.address)
            .finish()
    }
}

/// JSON shape of a public key on the wire: `{"ed25519": "<base64>"}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WirePubKey {
    Ed25519(Binary),
}

impl TryFrom<WirePubKey> for ConsensusKey {
    type Error = KeyError;

    fn try_from(key: WirePubKey) -> Result<Self, Self::Error> {
        match key {
            WirePubKey::Ed25519(bytes) => Self::from_ed25519(bytes.as_slice()),
        }
    }
}

impl From<ConsensusKey> for WirePubKey {
    fn from(key: ConsensusKey) -> Self {
        Self::Ed25519(Binary::from(key.raw.to_vec()))
    }
}
