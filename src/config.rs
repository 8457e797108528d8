//! Client configuration

use crate::error::FeedError;
use crate::protocol::WSS_URL;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Account credentials sent in the handshake header and the auth frame
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Credentials {
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FeedError> {
        if self.client_id.is_empty() || self.access_token.is_empty() {
            return Err(FeedError::MissingCredentials);
        }
        Ok(())
    }
}

// Keep the token out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint
    pub url: String,
    /// Fixed wait between a transport failure and the next attempt
    pub reconnect_delay: Duration,
    /// Upper bound on the WebSocket handshake
    pub connect_timeout: Duration,
    /// Re-send the registry after a reconnect, before `on_connect` runs
    pub auto_resubscribe: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            url: WSS_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_resubscribe: false,
        }
    }
}

impl FeedConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_auto_resubscribe(mut self, enabled: bool) -> Self {
        self.auto_resubscribe = enabled;
        self
    }
}
