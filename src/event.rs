//! Decoded market events

use crate::protocol::{ExchangeSegment, ResponseCode};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub segment: ExchangeSegment,
    pub security_id: u32,
    /// Rounded to 2 decimals
    pub last_price: f64,
    pub last_trade_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub segment: ExchangeSegment,
    pub security_id: u32,
    pub last_price: f64,
    pub last_trade_quantity: u16,
    pub last_trade_time: DateTime<Utc>,
    pub average_trade_price: f64,
    pub volume: u32,
    pub total_sell_quantity: u32,
    pub total_buy_quantity: u32,
    pub day_open: f64,
    pub day_close: f64,
    pub day_high: f64,
    pub day_low: f64,
}

/// One row of the five-level book
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLevel {
    pub bid_quantity: i32,
    pub ask_quantity: i32,
    pub bid_orders: i16,
    pub ask_orders: i16,
    pub bid_price: f64,
    pub ask_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDepth {
    pub segment: ExchangeSegment,
    pub security_id: u32,
    pub last_price: f64,
    pub levels: Vec<DepthLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInterest {
    pub segment: ExchangeSegment,
    pub security_id: u32,
    pub open_interest: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrevClose {
    pub segment: ExchangeSegment,
    pub security_id: u32,
    /// Rounded to 2 decimals
    pub prev_close: f64,
    pub prev_open_interest: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Why the server dropped the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    ConnectionLimitExceeded,
    DataApiNotSubscribed,
    TokenExpired,
    AuthenticationFailed,
    TokenInvalid,
    Unknown(u16),
}

impl DisconnectReason {
    pub fn from_code(code: u16) -> Self {
        match code {
            805 => DisconnectReason::ConnectionLimitExceeded,
            806 => DisconnectReason::DataApiNotSubscribed,
            807 => DisconnectReason::TokenExpired,
            808 => DisconnectReason::AuthenticationFailed,
            809 => DisconnectReason::TokenInvalid,
            other => DisconnectReason::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            DisconnectReason::ConnectionLimitExceeded => 805,
            DisconnectReason::DataApiNotSubscribed => 806,
            DisconnectReason::TokenExpired => 807,
            DisconnectReason::AuthenticationFailed => 808,
            DisconnectReason::TokenInvalid => 809,
            DisconnectReason::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ConnectionLimitExceeded => {
                write!(f, "connection limit exceeded, close an existing connection first")
            }
            DisconnectReason::DataApiNotSubscribed => write!(f, "data APIs not subscribed"),
            DisconnectReason::TokenExpired => write!(f, "access token expired"),
            DisconnectReason::AuthenticationFailed => {
                write!(f, "authentication failed, check client id and access token")
            }
            DisconnectReason::TokenInvalid => write!(f, "access token invalid or missing"),
            DisconnectReason::Unknown(code) => write!(f, "unknown disconnect reason (code {code})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Ticker(Ticker),
    Quote(Quote),
    MarketDepth(MarketDepth),
    OpenInterest(OpenInterest),
    PrevClose(PrevClose),
    MarketStatus(MarketStatus),
    DisconnectNotice(DisconnectReason),
}

impl MarketEvent {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            MarketEvent::Ticker(_) => ResponseCode::Ticker,
            MarketEvent::Quote(_) => ResponseCode::Quote,
            MarketEvent::MarketDepth(_) => ResponseCode::MarketDepth,
            MarketEvent::OpenInterest(_) => ResponseCode::OpenInterest,
            MarketEvent::PrevClose(_) => ResponseCode::PrevClose,
            MarketEvent::MarketStatus(_) => ResponseCode::MarketStatus,
            MarketEvent::DisconnectNotice(_) => ResponseCode::Disconnect,
        }
    }

    /// Security id of instrument-scoped events
    pub fn security_id(&self) -> Option<u32> {
        match self {
            MarketEvent::Ticker(t) => Some(t.security_id),
            MarketEvent::Quote(q) => Some(q.security_id),
            MarketEvent::MarketDepth(d) => Some(d.security_id),
            MarketEvent::OpenInterest(o) => Some(o.security_id),
            MarketEvent::PrevClose(p) => Some(p.security_id),
            MarketEvent::MarketStatus(_) | MarketEvent::DisconnectNotice(_) => None,
        }
    }
}
