//! Dhan Feed - Market Data Feed Client
//!
//! Streaming client for a binary market-data WebSocket feed:
//! - Binary authentication handshake
//! - Bulk subscribe/unsubscribe in 100-instrument requests
//! - Packet decoding into typed market events
//! - Key-based instrument registry
//! - Fixed-delay reconnect on transport failure
//! - Feed statistics

pub mod protocol;
pub mod instrument;
pub mod encoder;
pub mod event;
pub mod decoder;
pub mod registry;
pub mod config;
pub mod error;
pub mod connection;
pub mod client;
pub mod stats;

pub use protocol::{ExchangeSegment, ResponseCode, SubscriptionMode};
pub use instrument::Instrument;
pub use encoder::{encode_auth_frame, encode_subscription_frame, encode_unsubscription_frame, EncodeError};
pub use event::{DepthLevel, DisconnectReason, MarketDepth, MarketEvent, MarketStatus, OpenInterest, PrevClose, Quote, Ticker};
pub use decoder::{Decoder, DecodeError};
pub use registry::InstrumentRegistry;
pub use config::{Credentials, FeedConfig};
pub use error::{FeedError, FeedResult};
pub use connection::{CloseInfo, ConnectionManager, ConnectionState, SessionHandler};
pub use client::{FeedClient, FeedClientBuilder, FeedHandler};
pub use stats::{FeedStats, LatencyStats};
