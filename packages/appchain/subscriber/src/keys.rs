//! Table prefixes of the subscriber store.

pub const PARAMS: u8 = 0x01;
pub const COORDINATOR_CLIENT_ID: u8 = 0x02;
pub const COORDINATOR_CHANNEL: u8 = 0x03;
pub const TRANSFER_CHANNEL: u8 = 0x04;
pub const COORDINATOR_FEE_POOL_ADDR: u8 = 0x05;
pub const PENDING_CHANGES: u8 = 0x06;
pub const PACKET_MATURITY_TIME: u8 = 0x07;
pub const HEIGHT_VALSET_UPDATE_ID: u8 = 0x08;
pub const OUTSTANDING_DOWNTIME: u8 = 0x09;
pub const SUBSCRIBER_VALIDATOR: u8 = 0x0a;
pub const PENDING_PACKETS: u8 = 0x0b;
pub const HISTORICAL_INFO: u8 = 0x0c;
pub const LAST_TRANSMISSION_HEIGHT: u8 = 0x0d;
pub const PENDING_COORDINATOR_REWARDS: u8 = 0x0e;
