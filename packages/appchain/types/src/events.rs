//! Event types and attribute keys emitted by both modules.

use cosmwasm_std::Event;

/// A subscriber chain was registered and waits for its epoch to end
pub const EVENT_TYPE_REGISTER_SUBSCRIBER: &str = "register_subscriber";
/// The light client of a subscriber was created
pub const EVENT_TYPE_SUBSCRIBER_CLIENT_CREATED: &str = "subscriber_client_created";
/// A chain was stopped and its state removed
pub const EVENT_TYPE_SUBSCRIBER_CHAIN_STOPPED: &str = "subscriber_chain_stopped";
/// The coordinator <-> subscriber channel was established
pub const EVENT_TYPE_CHANNEL_ESTABLISHED: &str = "channel_established";
/// A packet was received
pub const EVENT_TYPE_PACKET: &str = "appchain_packet";
/// A slash request was executed on the coordinator
pub const EVENT_TYPE_EXECUTE_SLASH: &str = "execute_slash";
/// A change-set matured on the subscriber
pub const EVENT_TYPE_VSC_MATURED: &str = "vsc_matured";
/// A packet timed out
pub const EVENT_TYPE_TIMEOUT: &str = "appchain_timeout";
/// A packet was acknowledged
pub const EVENT_TYPE_ACKNOWLEDGEMENT: &str = "appchain_acknowledgement";
/// A slash request was queued on the subscriber
pub const EVENT_TYPE_SLASH_QUEUED: &str = "slash_queued";
/// Rewards were split between the subscriber and the coordinator
pub const EVENT_TYPE_FEE_DISTRIBUTION: &str = "fee_distribution";

/// Chain id attribute
pub const ATTRIBUTE_CHAIN_ID: &str = "chain_id";
/// Client id attribute
pub const ATTRIBUTE_CLIENT_ID: &str = "client_id";
/// Channel id attribute
pub const ATTRIBUTE_CHANNEL_ID: &str = "channel_id";
/// Connection id attribute
pub const ATTRIBUTE_CONNECTION_ID: &str = "connection_id";
/// Valset update id attribute
pub const ATTRIBUTE_VALSET_UPDATE_ID: &str = "valset_update_id";
/// Validator consensus address attribute
pub const ATTRIBUTE_VALIDATOR_ADDRESS: &str = "validator_address";
/// Infraction attribute
pub const ATTRIBUTE_INFRACTION: &str = "infraction";
/// Infraction height attribute
pub const ATTRIBUTE_INFRACTION_HEIGHT: &str = "infraction_height";
/// Epoch identifier attribute
pub const ATTRIBUTE_EPOCH_IDENTIFIER: &str = "epoch_identifier";
/// Epoch number attribute
pub const ATTRIBUTE_EPOCH_NUMBER: &str = "epoch_number";
/// Packet kind attribute
pub const ATTRIBUTE_PACKET_KIND: &str = "packet_kind";
/// Whether an acknowledgement reported success
pub const ATTRIBUTE_SUCCESS: &str = "success";
/// Error message attribute
pub const ATTRIBUTE_ERROR: &str = "error";
/// Reason attribute
pub const ATTRIBUTE_REASON: &str = "reason";
/// Amount kept by the subscriber
pub const ATTRIBUTE_SUBSCRIBER_AMOUNT: &str = "subscriber_amount";
/// Amount owed to the coordinator
pub const ATTRIBUTE_COORDINATOR_AMOUNT: &str = "coordinator_amount";

/// An event tagged with the chain it concerns.
#[must_use]
pub fn chain_event(ty: &str, chain_id: &str) -> Event {
    Event::new(ty).add_attribute(ATTRIBUTE_CHAIN_ID, chain_id)
}
