//! Binary feed protocol constants
//!
//! Outbound request header: 83 bytes, two layouts
//!   - authentication: code u8 @0, length u16 @1, client id [30] @3, reserved [50] @33
//!   - (un)subscribe:  code u16 @0, length u32 @2, client id text @6, zero tail
//!
//! Inbound packets carry a one-byte response code at offset 0 that selects the
//! packet layout. All integers and floats are little-endian.

pub const WSS_URL: &str = "wss://api-feed.dhan.co";

pub const REQUEST_HEADER_SIZE: usize = 83;
pub const CLIENT_ID_FIELD_SIZE: usize = 30;
pub const AUTH_RESERVED_SIZE: usize = 50;
pub const AUTH_REQUEST_CODE: u8 = 11;
pub const AUTH_TOKEN_MIN_SIZE: usize = 500;
/// Literal trailer of the authentication payload
pub const AUTH_TYPE: &[u8; 2] = b"2P";

pub const SECURITY_ID_FIELD_SIZE: usize = 20;
/// One instrument slot: exchange segment (1) + security id (20)
pub const INSTRUMENT_SLOT_SIZE: usize = 1 + SECURITY_ID_FIELD_SIZE;
pub const MAX_INSTRUMENTS_PER_REQUEST: usize = 100;
pub const INSTRUMENT_COUNT_SIZE: usize = 4;
pub const SUBSCRIPTION_FRAME_SIZE: usize =
    REQUEST_HEADER_SIZE + INSTRUMENT_COUNT_SIZE + MAX_INSTRUMENTS_PER_REQUEST * INSTRUMENT_SLOT_SIZE;

pub const TICKER_PACKET_SIZE: usize = 16;
pub const QUOTE_PACKET_SIZE: usize = 50;
pub const OI_PACKET_SIZE: usize = 12;
pub const PREV_CLOSE_PACKET_SIZE: usize = 16;
pub const MARKET_STATUS_PACKET_SIZE: usize = 1;
pub const DISCONNECT_PACKET_SIZE: usize = 10;

pub const DEPTH_HEADER_SIZE: usize = 13;
pub const DEPTH_LEVEL_SIZE: usize = 20;
pub const DEPTH_LEVELS: usize = 5;
pub const DEPTH_PACKET_SIZE: usize = DEPTH_HEADER_SIZE + DEPTH_LEVELS * DEPTH_LEVEL_SIZE;
/// First level starts one byte before the end of the declared header
pub const DEPTH_FIRST_LEVEL_OFFSET: usize = DEPTH_HEADER_SIZE - 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ticker = 2,
    MarketDepth = 3,
    Quote = 4,
    OpenInterest = 5,
    PrevClose = 6,
    MarketStatus = 7,
    Disconnect = 50,
}

impl ResponseCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            2 => Some(ResponseCode::Ticker),
            3 => Some(ResponseCode::MarketDepth),
            4 => Some(ResponseCode::Quote),
            5 => Some(ResponseCode::OpenInterest),
            6 => Some(ResponseCode::PrevClose),
            7 => Some(ResponseCode::MarketStatus),
            50 => Some(ResponseCode::Disconnect),
            _ => None,
        }
    }

    /// Smallest frame that decodes into this packet kind
    pub fn min_len(self) -> usize {
        match self {
            ResponseCode::Ticker => TICKER_PACKET_SIZE,
            ResponseCode::MarketDepth => DEPTH_PACKET_SIZE,
            ResponseCode::Quote => QUOTE_PACKET_SIZE,
            ResponseCode::OpenInterest => OI_PACKET_SIZE,
            ResponseCode::PrevClose => PREV_CLOSE_PACKET_SIZE,
            ResponseCode::MarketStatus => MARKET_STATUS_PACKET_SIZE,
            ResponseCode::Disconnect => DISCONNECT_PACKET_SIZE,
        }
    }
}

/// Streaming granularity, fixed per client
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionMode {
    Ticker = 15,
    Quote = 17,
    Depth = 19,
}

impl SubscriptionMode {
    pub fn subscribe_code(self) -> u16 {
        self as u16
    }

    /// The "off" companion of each mode is the next code
    pub fn unsubscribe_code(self) -> u16 {
        self as u16 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExchangeSegment {
    Idx,
    NseEq,
    NseFno,
    NseCurrency,
    BseEq,
    McxComm,
    BseCurrency,
    BseFno,
    Other(u8),
}

impl ExchangeSegment {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => ExchangeSegment::Idx,
            1 => ExchangeSegment::NseEq,
            2 => ExchangeSegment::NseFno,
            3 => ExchangeSegment::NseCurrency,
            4 => ExchangeSegment::BseEq,
            5 => ExchangeSegment::McxComm,
            7 => ExchangeSegment::BseCurrency,
            8 => ExchangeSegment::BseFno,
            other => ExchangeSegment::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ExchangeSegment::Idx => 0,
            ExchangeSegment::NseEq => 1,
            ExchangeSegment::NseFno => 2,
            ExchangeSegment::NseCurrency => 3,
            ExchangeSegment::BseEq => 4,
            ExchangeSegment::McxComm => 5,
            ExchangeSegment::BseCurrency => 7,
            ExchangeSegment::BseFno => 8,
            ExchangeSegment::Other(code) => code,
        }
    }
}

impl From<u8> for ExchangeSegment {
    fn from(v: u8) -> Self {
        ExchangeSegment::from_u8(v)
    }
}

// Compile-time assertions for frame layout
const _: () = {
    assert!(3 + CLIENT_ID_FIELD_SIZE + AUTH_RESERVED_SIZE == REQUEST_HEADER_SIZE);
    assert!(INSTRUMENT_SLOT_SIZE == 21);
    assert!(SUBSCRIPTION_FRAME_SIZE == 2187);
    assert!(DEPTH_FIRST_LEVEL_OFFSET + DEPTH_LEVELS * DEPTH_LEVEL_SIZE <= DEPTH_PACKET_SIZE);
};

/// Widen a wire price and round it to 2 decimal places
pub fn round_price(raw: f32) -> f64 {
    (raw as f64 * 100.0).round() / 100.0
}
