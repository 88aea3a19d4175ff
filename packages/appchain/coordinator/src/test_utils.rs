//! Mocks of the coordinator's collaborators and fixtures for tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use appchain_types::{
    consensus_key::ConsensusKey,
    handshake::{COORDINATOR_PORT_ID, SUBSCRIBER_PORT_ID, VERSION},
    params::{CoordinatorParams, SubscriberParams, DEFAULT_TIMEOUT_EPOCH_IDENTIFIER},
    store::{load_json, save_json},
    test_utils::{consensus_key, MockIbcHost},
};
use cosmwasm_std::{
    Binary, Decimal, Env, IbcEndpoint, IbcOrder, IbcPacket, IbcTimeout, Storage, Timestamp,
};

use crate::{
    keepers::{EpochInfo, EpochsKeeper, OperatorPower, RestakingError, RestakingKeeper, SlashRequest},
    msg::RegisterSubscriberChainMsg,
    state::{self, EpochPosition},
    Coordinator,
};

/// Chain registered by [`coordinator_with_chain`]
pub const CHAIN_ID: &str = "appchain-1";
/// Connection the subscriber of [`CHAIN_ID`] opens its channel on
pub const CONNECTION_ID: &str = "connection-0";
/// Channel established by [`coordinator_with_channel`]
pub const CHANNEL_ID: &str = "channel-0";
/// Epoch schedule [`CHAIN_ID`] follows
pub const HOUR: &str = "hour";
/// Current epoch of [`HOUR`] in a fresh mock
pub const HOUR_EPOCH: u64 = 1;
/// Current epoch of the timeout schedule in a fresh mock
pub const WEEK_EPOCH: u64 = 10;
/// Fee-pool address of the mock coordinator
pub const FEE_POOL: &str = "coordinator-fee-pool";

const SLASHES_KEY: &[u8] = b"mock_restaking/slashes";
const JAILS_KEY: &[u8] = b"mock_restaking/jails";

/// Coordinator wired to mocks.
pub type TestCoordinator = Coordinator<MockRestaking, MockEpochs, MockIbcHost>;

/// In-memory restaking engine. Slashes and jailings are recorded in the store they are
/// applied to, so they are discarded with an overlay.
#[derive(Debug)]
pub struct MockRestaking {
    operators: BTreeMap<String, BTreeMap<String, (ConsensusKey, i64)>>,
    registered: BTreeSet<String>,
    /// Unbonding period of the coordinator chain
    pub unbonding: Duration,
    /// Fail the next registrations
    pub fail_registration: bool,
    /// Reject every slash request
    pub reject_slashes: bool,
    /// Fail every jailing
    pub fail_jail: bool,
}

impl Default for MockRestaking {
    fn default() -> Self {
        Self {
            operators: BTreeMap::new(),
            registered: BTreeSet::new(),
            unbonding: Duration::from_secs(21 * 24 * 60 * 60),
            fail_registration: false,
            reject_slashes: false,
            fail_jail: false,
        }
    }
}

impl MockRestaking {
    /// Sets the power of `operator-{seed}` on `chain_id`. A new operator uses
    /// [`consensus_key`]`(seed)`.
    pub fn set_power(&mut self, chain_id: &str, seed: u8, power: i64) {
        self.operators
            .entry(chain_id.to_string())
            .or_default()
            .entry(format!("operator-{seed}"))
            .and_modify(|(_, p)| *p = power)
            .or_insert_with(|| (consensus_key(seed), power));
    }

    /// Switches `operator-{seed}` on `chain_id` to [`consensus_key`]`(key_seed)`.
    pub fn set_key(&mut self, chain_id: &str, seed: u8, key_seed: u8) {
        if let Some((key, _)) = self
            .operators
            .get_mut(chain_id)
            .and_then(|ops| ops.get_mut(&format!("operator-{seed}")))
        {
            *key = consensus_key(key_seed);
        }
    }

    /// Whether `chain_id` is registered as a service.
    #[must_use]
    pub fn is_registered(&self, chain_id: &str) -> bool {
        self.registered.contains(chain_id)
    }

    /// `(chain id, operator, valset update id)` of every slash applied to `storage`.
    #[must_use]
    pub fn slashes(&self, storage: &dyn Storage) -> Vec<(String, String, u64)> {
        load_json(storage, SLASHES_KEY).ok().flatten().unwrap_or_default()
    }

    /// `(chain id, operator)` of every jailing applied to `storage`.
    #[must_use]
    pub fn jails(&self, storage: &dyn Storage) -> Vec<(String, String)> {
        load_json(storage, JAILS_KEY).ok().flatten().unwrap_or_default()
    }
}

impl RestakingKeeper for MockRestaking {
    fn register_subscriber_avs(
        &mut self,
        _storage: &mut dyn Storage,
        msg: &RegisterSubscriberChainMsg,
    ) -> Result<(), RestakingError> {
        if self.fail_registration {
            return Err(RestakingError("registration disabled".to_string()));
        }
        self.registered.insert(msg.chain_id.clone());
        Ok(())
    }

    fn delete_subscriber_avs(
        &mut self,
        _storage: &mut dyn Storage,
        chain_id: &str,
    ) -> Result<(), RestakingError> {
        self.registered.remove(chain_id);
        Ok(())
    }

    fn active_operators(&self, _storage: &dyn Storage, chain_id: &str) -> Vec<OperatorPower> {
        self.operators
            .get(chain_id)
            .into_iter()
            .flatten()
            .map(|(operator, (key, power))| OperatorPower {
                operator: operator.clone(),
                consensus_key: key.clone(),
                power: *power,
            })
            .collect()
    }

    fn unbonding_duration(&self, _storage: &dyn Storage) -> Duration {
        self.unbonding
    }

    fn validate_slash(
        &self,
        _storage: &dyn Storage,
        _request: &SlashRequest,
    ) -> Result<(), RestakingError> {
        if self.reject_slashes {
            return Err(RestakingError("slash rejected".to_string()));
        }
        Ok(())
    }

    fn slash(
        &mut self,
        storage: &mut dyn Storage,
        request: &SlashRequest,
        _fraction: Decimal,
    ) -> Result<(), RestakingError> {
        let mut slashes = self.slashes(storage);
        slashes.push((
            request.chain_id.clone(),
            request.operator.clone(),
            request.valset_update_id,
        ));
        save_json(storage, SLASHES_KEY, &slashes).map_err(|e| RestakingError(e.to_string()))
    }

    fn jail(
        &mut self,
        storage: &mut dyn Storage,
        chain_id: &str,
        operator: &str,
        _duration: Duration,
    ) -> Result<(), RestakingError> {
        if self.fail_jail {
            return Err(RestakingError("jailing disabled".to_string()));
        }
        let mut jails = self.jails(storage);
        jails.push((chain_id.to_string(), operator.to_string()));
        save_json(storage, JAILS_KEY, &jails).map_err(|e| RestakingError(e.to_string()))
    }
}

/// Epoch schedules set by hand.
#[derive(Debug, Default)]
pub struct MockEpochs {
    epochs: BTreeMap<String, u64>,
}

impl MockEpochs {
    /// Sets the current epoch of `identifier`.
    pub fn set_epoch(&mut self, identifier: &str, current_epoch: u64) {
        self.epochs.insert(identifier.to_string(), current_epoch);
    }
}

impl EpochsKeeper for MockEpochs {
    fn epoch_info(&self, _storage: &dyn Storage, identifier: &str) -> Option<EpochInfo> {
        self.epochs.get(identifier).map(|current_epoch| EpochInfo {
            identifier: identifier.to_string(),
            current_epoch: *current_epoch,
        })
    }
}

impl TestCoordinator {
    /// Registers an open channel end on [`CONNECTION_ID`] as the host would after the
    /// handshake.
    pub fn open_channel(&mut self, channel_id: &str) {
        self.ibc.add_channel(
            COORDINATOR_PORT_ID,
            channel_id,
            CONNECTION_ID,
            IbcEndpoint {
                port_id: SUBSCRIBER_PORT_ID.to_string(),
                channel_id: "channel-0".to_string(),
            },
            IbcOrder::Ordered,
            VERSION,
        );
    }
}

/// An operator with [`consensus_key`]`(seed)`.
#[must_use]
pub fn operator(seed: u8, power: i64) -> OperatorPower {
    OperatorPower {
        operator: format!("operator-{seed}"),
        consensus_key: consensus_key(seed),
        power,
    }
}

/// A valid registration with default subscriber parameters.
#[must_use]
pub fn register_msg(chain_id: &str, epoch_identifier: &str, max_validators: u32) -> RegisterSubscriberChainMsg {
    RegisterSubscriberChainMsg {
        chain_id: chain_id.to_string(),
        epoch_identifier: epoch_identifier.to_string(),
        asset_ids: vec![format!("0x{}_0x65", "dac17f958d2ee523a2206206994597c13d831ec7")],
        min_self_delegation_usd: 1000,
        max_validators,
        subscriber_params: SubscriberParams::default(),
    }
}

/// A coordinator without state, with [`HOUR`] at [`HOUR_EPOCH`] and the timeout schedule
/// at [`WEEK_EPOCH`].
#[must_use]
pub fn mock_coordinator() -> TestCoordinator {
    let mut epochs = MockEpochs::default();
    epochs.set_epoch(HOUR, HOUR_EPOCH);
    epochs.set_epoch(DEFAULT_TIMEOUT_EPOCH_IDENTIFIER, WEEK_EPOCH);
    Coordinator::new(MockRestaking::default(), epochs, MockIbcHost::default(), FEE_POOL)
}

/// [`mock_coordinator`] with default parameters stored.
///
/// # Panics
/// If the parameters cannot be stored.
#[must_use]
pub fn coordinator(storage: &mut dyn Storage) -> TestCoordinator {
    state::set_params(storage, &CoordinatorParams::default()).expect("default params are valid");
    mock_coordinator()
}

/// A coordinator with [`CHAIN_ID`] registered on [`HOUR`] and its client created, with
/// `operator-1` at power 100 and `operator-2` at power 50. No change-set is queued yet and
/// [`CONNECTION_ID`] is built on the chain's client.
///
/// # Panics
/// If the bootstrap fails.
#[must_use]
pub fn coordinator_with_chain(storage: &mut dyn Storage, env: &Env) -> TestCoordinator {
    let mut coordinator = coordinator(storage);
    coordinator.restaking.set_power(CHAIN_ID, 1, 100);
    coordinator.restaking.set_power(CHAIN_ID, 2, 50);

    let msg = register_msg(CHAIN_ID, HOUR, 10);
    coordinator
        .register_subscriber_chain(storage, msg.clone())
        .expect("registration succeeds");
    state::take_pending_subscriber_chains(storage, &EpochPosition::new(HOUR, HOUR_EPOCH))
        .expect("pending chains decode");
    coordinator
        .create_client_for_subscriber(storage, env, &msg)
        .expect("bootstrap succeeds");

    let client_id = state::chain_to_client(storage, CHAIN_ID).expect("client was created");
    coordinator.ibc.add_connection_to_client(CONNECTION_ID, &client_id);
    coordinator
}

/// [`coordinator_with_chain`] with [`CHANNEL_ID`] established.
///
/// # Panics
/// If the channel cannot be established.
#[must_use]
pub fn coordinator_with_channel(storage: &mut dyn Storage, env: &Env) -> TestCoordinator {
    let mut coordinator = coordinator_with_chain(storage, env);
    coordinator.open_channel(CHANNEL_ID);
    coordinator
        .set_subscriber_chain(storage, env, CHANNEL_ID)
        .expect("channel is established");
    coordinator
}

/// A packet carrying `data` between the subscriber and the coordinator on `channel_id`. The
/// channel id is used on both ends, so the packet serves as a received packet and as a
/// sent one.
#[must_use]
pub fn packet_on(channel_id: &str, data: Vec<u8>) -> IbcPacket {
    IbcPacket::new(
        Binary::from(data),
        IbcEndpoint {
            port_id: COORDINATOR_PORT_ID.to_string(),
            channel_id: channel_id.to_string(),
        },
        IbcEndpoint {
            port_id: COORDINATOR_PORT_ID.to_string(),
            channel_id: channel_id.to_string(),
        },
        1,
        IbcTimeout::with_timestamp(Timestamp::from_seconds(u64::from(u32::MAX))),
    )
}
