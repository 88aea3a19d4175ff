//! Lifecycle of a subscriber chain: registration, activation at the end of the
//! registration epoch, channel establishment and teardown.

use appchain_types::{
    cache::CacheContext,
    ensure,
    events::{
        chain_event, ATTRIBUTE_CHANNEL_ID, ATTRIBUTE_EPOCH_IDENTIFIER, ATTRIBUTE_EPOCH_NUMBER,
        ATTRIBUTE_REASON, EVENT_TYPE_CHANNEL_ESTABLISHED, EVENT_TYPE_REGISTER_SUBSCRIBER,
        EVENT_TYPE_SUBSCRIBER_CHAIN_STOPPED,
    },
    handshake::{single_connection_hop, COORDINATOR_PORT_ID},
    host::IbcHost,
    HostError,
};
use cosmwasm_std::{Env, Event, Storage};

use crate::{
    error::CoordinatorError,
    hooks::EpochHooks,
    keepers::{EpochsKeeper, RestakingKeeper},
    msg::RegisterSubscriberChainMsg,
    state::{self, EpochPosition},
    Coordinator,
};

impl<R, E, H> Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    /// Registers a subscriber chain. Its client is created when the current epoch of
    /// `msg.epoch_identifier` ends.
    /// # Errors
    /// Returns an error if the message is invalid, the epoch identifier is unknown, the
    /// chain already has a client or the restaking module rejects the chain.
    pub fn register_subscriber_chain(
        &mut self,
        storage: &mut dyn Storage,
        msg: RegisterSubscriberChainMsg,
    ) -> Result<Vec<Event>, CoordinatorError> {
        msg.validate_basic()?;

        let epoch = self
            .epochs
            .epoch_info(storage, &msg.epoch_identifier)
            .ok_or_else(|| CoordinatorError::EpochNotFound(msg.epoch_identifier.clone()))?;
        ensure!(
            state::chain_to_client(storage, &msg.chain_id).is_none(),
            CoordinatorError::SubscriberChainAlreadyRegistered(msg.chain_id.clone())
        );

        self.restaking
            .register_subscriber_avs(storage, &msg)
            .map_err(CoordinatorError::RegisterAvsFailed)?;

        let position = EpochPosition::new(&msg.epoch_identifier, epoch.current_epoch);
        tracing::info!(
            chain_id = %msg.chain_id,
            epoch_identifier = %position.epoch_identifier,
            epoch_number = position.epoch_number,
            "registered subscriber chain"
        );
        let event = chain_event(EVENT_TYPE_REGISTER_SUBSCRIBER, &msg.chain_id)
            .add_attribute(ATTRIBUTE_EPOCH_IDENTIFIER, &position.epoch_identifier)
            .add_attribute(ATTRIBUTE_EPOCH_NUMBER, position.epoch_number.to_string());
        state::append_pending_subscriber_chain(storage, &position, msg)?;

        Ok(vec![event])
    }

    /// Creates the clients of the chains registered during the epoch that just ended.
    ///
    /// Each chain is bootstrapped in its own overlay. A failed bootstrap leaves no state
    /// behind and undoes the chain's restaking registration.
    pub fn activate_pending_chains(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        identifier: &str,
        epoch_number: u64,
    ) -> Vec<Event> {
        let position = EpochPosition::new(identifier, epoch_number);
        let pending = match state::take_pending_subscriber_chains(storage, &position) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::error!(%identifier, epoch_number, %err, "failed to load pending subscriber chains");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for msg in pending {
            let mut cache = CacheContext::new(storage);
            match self.create_client_for_subscriber(&mut cache, env, &msg) {
                Ok(created) => {
                    for event in created {
                        cache.emit(event);
                    }
                    events.extend(cache.commit());
                }
                Err(err) => {
                    drop(cache);
                    tracing::error!(
                        chain_id = %msg.chain_id,
                        %err,
                        "failed to create subscriber client, removing registration"
                    );
                    if let Err(err) = self.restaking.delete_subscriber_avs(storage, &msg.chain_id) {
                        tracing::error!(
                            chain_id = %msg.chain_id,
                            %err,
                            "failed to remove restaking registration"
                        );
                    }
                }
            }
        }
        events
    }

    /// Checks a channel handshake against the chain it would connect to and returns that
    /// chain's id.
    /// # Errors
    /// Returns an error if the channel does not run over exactly one connection, the
    /// connection's client is not the one created for the chain, or the chain already has a
    /// channel.
    pub fn verify_subscriber_chain(
        &self,
        storage: &dyn Storage,
        connection_hops: &[String],
    ) -> Result<String, CoordinatorError> {
        let connection_id = single_connection_hop(connection_hops)?;
        let client_id = self.ibc.connection_client_id(storage, connection_id)?;
        let chain_id = self.ibc.client_chain_id(storage, &client_id)?;

        let expected = state::chain_to_client(storage, &chain_id)
            .ok_or_else(|| CoordinatorError::UnknownSubscriberChain(chain_id.clone()))?;
        ensure!(
            expected == client_id,
            CoordinatorError::ClientIdMismatch {
                chain_id,
                expected,
                got: client_id,
            }
        );
        if let Some(channel_id) = state::chain_to_channel(storage, &chain_id) {
            return Err(CoordinatorError::SubscriberChannelAlreadyExists {
                chain_id,
                channel_id,
            });
        }
        Ok(chain_id)
    }

    /// Records `channel_id` as the channel of the chain it connects to, once its handshake
    /// is confirmed.
    /// # Errors
    /// Returns an error if the channel is unknown, its chain cannot be resolved or the chain
    /// already has a channel.
    pub fn set_subscriber_chain(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        channel_id: &str,
    ) -> Result<Vec<Event>, CoordinatorError> {
        let channel = self
            .ibc
            .channel(storage, COORDINATOR_PORT_ID, channel_id)
            .ok_or_else(|| HostError::ChannelNotFound {
                port_id: COORDINATOR_PORT_ID.to_string(),
                channel_id: channel_id.to_string(),
            })?;
        let connection_id = single_connection_hop(&channel.connection_hops)?;
        let client_id = self.ibc.connection_client_id(storage, connection_id)?;
        let chain_id = state::client_to_chain(storage, &client_id)
            .ok_or(CoordinatorError::UnknownClient(client_id))?;

        if let Some(existing) = state::chain_to_channel(storage, &chain_id) {
            return Err(CoordinatorError::SubscriberChannelAlreadyExists {
                chain_id,
                channel_id: existing,
            });
        }

        state::set_chain_channel(storage, &chain_id, channel_id);
        state::set_init_chain_height(storage, &chain_id, env.block.height);
        state::remove_subscriber_genesis(storage, &chain_id);
        if !state::remove_init_timeout(storage, &chain_id)? {
            tracing::error!(%chain_id, "init timeout of the chain was already removed");
        }

        tracing::info!(%chain_id, %channel_id, "subscriber channel established");
        Ok(vec![chain_event(EVENT_TYPE_CHANNEL_ESTABLISHED, &chain_id)
            .add_attribute(ATTRIBUTE_CHANNEL_ID, channel_id)])
    }

    /// Tears a chain down: removes all of its state, closes its channel and undoes its
    /// restaking registration. Funds held for the chain are not released.
    /// # Errors
    /// Returns an error if the chain's state cannot be decoded.
    pub fn stop_subscriber_chain(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
        reason: &str,
    ) -> Result<Vec<Event>, CoordinatorError> {
        if let Some(channel_id) = state::chain_to_channel(storage, chain_id) {
            if let Err(err) = self
                .ibc
                .channel_close_init(storage, COORDINATOR_PORT_ID, &channel_id)
            {
                tracing::error!(%chain_id, %channel_id, %err, "failed to close subscriber channel");
            }
        }

        state::remove_chain_state(storage, chain_id)?;
        if let Err(err) = self.restaking.delete_subscriber_avs(storage, chain_id) {
            tracing::error!(%chain_id, %err, "failed to remove restaking registration");
        }
        state::set_stopped(storage, chain_id, env.block.height);

        tracing::warn!(%chain_id, %reason, "stopped subscriber chain");
        Ok(vec![chain_event(EVENT_TYPE_SUBSCRIBER_CHAIN_STOPPED, chain_id)
            .add_attribute(ATTRIBUTE_REASON, reason)])
    }

    /// [`Self::stop_subscriber_chain`] for callers that cannot fail: errors are logged.
    pub(crate) fn stop_subscriber_chain_logged(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
        reason: &str,
    ) -> Vec<Event> {
        self.stop_subscriber_chain(storage, env, chain_id, reason)
            .unwrap_or_else(|err| {
                tracing::error!(%chain_id, %err, "failed to stop subscriber chain");
                Vec::new()
            })
    }
}

impl<R, E, H> EpochHooks for Coordinator<R, E, H>
where
    R: RestakingKeeper,
    E: EpochsKeeper,
    H: IbcHost,
{
    fn after_epoch_end(
        &mut self,
        storage: &mut dyn Storage,
        env: &Env,
        identifier: &str,
        epoch_number: u64,
    ) -> Vec<Event> {
        let mut events = self.activate_pending_chains(storage, env, identifier, epoch_number);
        events.extend(self.sweep_init_timeouts(storage, env, identifier, epoch_number));
        events.extend(self.sweep_vsc_timeouts(storage, env, identifier, epoch_number));
        self.queue_validator_updates_for_epoch(storage, identifier);
        events
    }
}
