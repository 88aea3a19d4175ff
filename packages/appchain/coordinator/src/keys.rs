//! Table prefixes of the coordinator store.

pub const PARAMS: u8 = 0x01;
pub const CHAIN_TO_CLIENT: u8 = 0x02;
pub const CLIENT_TO_CHAIN: u8 = 0x03;
pub const CHAIN_TO_CHANNEL: u8 = 0x04;
pub const CHANNEL_TO_CHAIN: u8 = 0x05;
pub const INIT_CHAIN_HEIGHT: u8 = 0x06;
pub const VSC_ID_FOR_CHAIN: u8 = 0x07;
pub const PENDING_VSC_PACKETS: u8 = 0x08;
pub const SUBSCRIBER_VALIDATOR: u8 = 0x09;
pub const OPERATOR_FOR_CONS_ADDR: u8 = 0x0a;
pub const CONS_ADDR_FOR_OPERATOR: u8 = 0x0b;
pub const CONS_ADDRS_TO_PRUNE: u8 = 0x0c;
pub const MATURITY_VSC_ID_FOR_CONS_ADDR: u8 = 0x0d;
pub const INIT_TIMEOUT_INDEX: u8 = 0x0e;
pub const INIT_TIMEOUT_FOR_CHAIN: u8 = 0x0f;
pub const VSC_TIMEOUT_INDEX: u8 = 0x10;
pub const VSC_TIMEOUT: u8 = 0x11;
pub const PENDING_SUBSCRIBER_CHAINS: u8 = 0x12;
pub const CHAIN_REGISTRATION: u8 = 0x13;
pub const SUBSCRIBER_GENESIS: u8 = 0x14;
pub const PENDING_SLASH_ACKS: u8 = 0x15;
pub const STOPPED_CHAIN: u8 = 0x16;
