//! Inbound packet decoder
//!
//! Each WebSocket binary message carries exactly one packet. The first byte
//! selects the layout; the decoder checks the packet is long enough for that
//! layout and copies the fields out into a `MarketEvent`.

use crate::event::*;
use crate::protocol::*;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown response code: {0}")]
    UnknownResponseCode(u8),

    #[error("frame too short for {code:?}: need {need} bytes, have {have}")]
    FrameTooShort {
        code: ResponseCode,
        need: usize,
        have: usize,
    },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

fn epoch_seconds(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
}

fn read_price(buf: &[u8], at: usize) -> f64 {
    LittleEndian::read_f32(&buf[at..at + 4]) as f64
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    LittleEndian::read_u32(&buf[at..at + 4])
}

pub struct Decoder;

impl Decoder {
    /// Decode one packet
    pub fn decode(buffer: &[u8]) -> DecodeResult<MarketEvent> {
        let first = *buffer.first().ok_or(DecodeError::EmptyFrame)?;
        let code = ResponseCode::from_u8(first).ok_or(DecodeError::UnknownResponseCode(first))?;

        let need = code.min_len();
        if buffer.len() < need {
            return Err(DecodeError::FrameTooShort {
                code,
                need,
                have: buffer.len(),
            });
        }

        let event = match code {
            ResponseCode::Ticker => MarketEvent::Ticker(Self::ticker(buffer)),
            ResponseCode::MarketDepth => MarketEvent::MarketDepth(Self::market_depth(buffer)),
            ResponseCode::Quote => MarketEvent::Quote(Self::quote(buffer)),
            ResponseCode::OpenInterest => MarketEvent::OpenInterest(OpenInterest {
                segment: ExchangeSegment::from_u8(buffer[1]),
                security_id: read_u32(buffer, 4),
                open_interest: read_u32(buffer, 8),
            }),
            ResponseCode::PrevClose => MarketEvent::PrevClose(PrevClose {
                segment: ExchangeSegment::from_u8(buffer[1]),
                security_id: read_u32(buffer, 4),
                prev_close: round_price(LittleEndian::read_f32(&buffer[8..12])),
                prev_open_interest: read_u32(buffer, 12),
            }),
            ResponseCode::MarketStatus => MarketEvent::MarketStatus(Self::market_status(buffer)),
            ResponseCode::Disconnect => MarketEvent::DisconnectNotice(DisconnectReason::from_code(
                LittleEndian::read_u16(&buffer[8..10]),
            )),
        };

        Ok(event)
    }

    fn ticker(buf: &[u8]) -> Ticker {
        Ticker {
            segment: ExchangeSegment::from_u8(buf[1]),
            security_id: read_u32(buf, 4),
            last_price: round_price(LittleEndian::read_f32(&buf[8..12])),
            last_trade_time: epoch_seconds(read_u32(buf, 12)),
        }
    }

    fn quote(buf: &[u8]) -> Quote {
        Quote {
            segment: ExchangeSegment::from_u8(buf[1]),
            security_id: read_u32(buf, 4),
            last_price: read_price(buf, 8),
            last_trade_quantity: LittleEndian::read_u16(&buf[12..14]),
            last_trade_time: epoch_seconds(read_u32(buf, 14)),
            average_trade_price: read_price(buf, 18),
            volume: read_u32(buf, 22),
            total_sell_quantity: read_u32(buf, 26),
            total_buy_quantity: read_u32(buf, 30),
            day_open: read_price(buf, 34),
            day_close: read_price(buf, 38),
            day_high: read_price(buf, 42),
            day_low: read_price(buf, 46),
        }
    }

    fn market_depth(buf: &[u8]) -> MarketDepth {
        let levels = (0..DEPTH_LEVELS)
            .map(|i| {
                let at = DEPTH_FIRST_LEVEL_OFFSET + i * DEPTH_LEVEL_SIZE;
                let level = &buf[at..at + DEPTH_LEVEL_SIZE];
                DepthLevel {
                    bid_quantity: LittleEndian::read_i32(&level[0..4]),
                    ask_quantity: LittleEndian::read_i32(&level[4..8]),
                    bid_orders: LittleEndian::read_i16(&level[8..10]),
                    ask_orders: LittleEndian::read_i16(&level[10..12]),
                    bid_price: read_price(level, 12),
                    ask_price: read_price(level, 16),
                }
            })
            .collect();

        MarketDepth {
            segment: ExchangeSegment::from_u8(buf[1]),
            security_id: read_u32(buf, 4),
            last_price: read_price(buf, 8),
            levels,
        }
    }

    fn market_status(buf: &[u8]) -> MarketStatus {
        // Only reached with code 7, so `Closed` cannot be produced here. The
        // real closed-market signal is not known; left as is.
        if buf[0] == ResponseCode::MarketStatus as u8 {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }
}
