//! Client error type

use crate::encoder::EncodeError;
use crate::event::DisconnectReason;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("access token or client id is missing")]
    MissingCredentials,

    #[error("a session is already running")]
    AlreadyConnected,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("invalid handshake header: {0}")]
    InvalidHeader(String),

    #[error("server closed the feed: {0}")]
    ServerDisconnect(DisconnectReason),
}

pub type FeedResult<T> = Result<T, FeedError>;
