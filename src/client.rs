//! Public feed client
//!
//! `FeedClient` ties the registry to the connection manager and forwards
//! session events to a caller-supplied `FeedHandler`. Cloning is cheap; all
//! clones drive the same connection, and dropping the last clone closes it.

use crate::config::{Credentials, FeedConfig};
use crate::connection::{CloseInfo, ConnectionManager, ConnectionState, SessionHandler};
use crate::encoder::encode_batched;
use crate::error::FeedResult;
use crate::event::{DisconnectReason, MarketEvent};
use crate::instrument::Instrument;
use crate::protocol::SubscriptionMode;
use crate::registry::InstrumentRegistry;
use crate::stats::FeedStats;
use async_trait::async_trait;
use std::sync::{Arc, Weak};

/// Caller callbacks. Every method defaults to doing nothing except
/// `on_fault`, which logs.
#[async_trait]
pub trait FeedHandler: Send + Sync + 'static {
    /// Session authorized; the usual place to call `subscribe`
    async fn on_connect(&self, _client: &FeedClient) {}

    async fn on_message(&self, _client: &FeedClient, _event: MarketEvent) {}

    async fn on_close(&self, _client: &FeedClient, _close: Option<CloseInfo>) {}

    /// The server ended the session for good. No reconnect follows.
    async fn on_fault(&self, _client: &FeedClient, reason: DisconnectReason) {
        tracing::error!(code = reason.code(), %reason, "feed terminated by server");
    }
}

struct NoopHandler;

#[async_trait]
impl FeedHandler for NoopHandler {}

struct Inner {
    credentials: Credentials,
    mode: SubscriptionMode,
    auto_resubscribe: bool,
    registry: parking_lot::Mutex<InstrumentRegistry>,
    connection: ConnectionManager,
    handler: Arc<dyn FeedHandler>,
}

#[derive(Clone)]
pub struct FeedClient {
    inner: Arc<Inner>,
}

pub struct FeedClientBuilder {
    credentials: Credentials,
    mode: SubscriptionMode,
    instruments: Vec<Instrument>,
    config: FeedConfig,
    handler: Arc<dyn FeedHandler>,
}

impl FeedClientBuilder {
    /// Seed the registry
    pub fn instruments(mut self, instruments: impl IntoIterator<Item = Instrument>) -> Self {
        self.instruments.extend(instruments);
        self
    }

    pub fn config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handler(mut self, handler: impl FeedHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn build(self) -> FeedClient {
        let mut registry = InstrumentRegistry::new();
        registry.extend(&self.instruments);

        FeedClient {
            inner: Arc::new(Inner {
                auto_resubscribe: self.config.auto_resubscribe,
                connection: ConnectionManager::new(self.config, self.credentials.clone()),
                credentials: self.credentials,
                mode: self.mode,
                registry: parking_lot::Mutex::new(registry),
                handler: self.handler,
            }),
        }
    }
}

impl FeedClient {
    pub fn builder(credentials: Credentials, mode: SubscriptionMode) -> FeedClientBuilder {
        FeedClientBuilder {
            credentials,
            mode,
            instruments: Vec::new(),
            config: FeedConfig::default(),
            handler: Arc::new(NoopHandler),
        }
    }

    /// Start connecting in the background. The state is `Connecting` on
    /// return.
    ///
    /// Fails fast, without any network attempt, when the credentials are
    /// empty or do not fit the authentication frame, and with
    /// `FeedError::AlreadyConnected` while a session is running. Safe to call
    /// from `on_close` or after `wait_closed` to start over.
    pub fn connect(&self) -> FeedResult<()> {
        let dispatcher = Arc::new(Dispatcher {
            inner: Arc::downgrade(&self.inner),
        });
        self.inner.connection.connect(dispatcher)
    }

    /// Add to the registry, then send one subscription request per 100
    /// instruments. Requests are skipped while the session is not open.
    /// Returns how many requests went out.
    pub async fn subscribe(&self, instruments: &[Instrument]) -> FeedResult<usize> {
        let added = self.inner.registry.lock().extend(instruments);
        tracing::debug!(requested = instruments.len(), added, "subscribe");
        self.send_batched(instruments, true).await
    }

    /// Remove from the registry, then send unsubscription requests in
    /// batches of 100
    pub async fn unsubscribe(&self, instruments: &[Instrument]) -> FeedResult<usize> {
        let removed = self.inner.registry.lock().remove_all(instruments);
        tracing::debug!(requested = instruments.len(), removed, "unsubscribe");
        self.send_batched(instruments, false).await
    }

    /// Request the socket be closed. Does nothing when not connected.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    async fn send_batched(&self, instruments: &[Instrument], subscribe: bool) -> FeedResult<usize> {
        let frames = encode_batched(
            self.inner.mode,
            &self.inner.credentials.client_id,
            instruments,
            subscribe,
        )?;

        let mut sent = 0;
        for frame in frames {
            if self.inner.connection.send(frame).await? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.inner.mode
    }

    /// Registry contents in insertion order
    pub fn instruments(&self) -> Vec<Instrument> {
        self.inner.registry.lock().snapshot()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub async fn wait_for_state(&self, state: ConnectionState) {
        self.inner.connection.wait_for_state(state).await
    }

    /// Resolves when the session ends. A server disconnect notice comes
    /// back as `FeedError::ServerDisconnect`.
    pub async fn wait_closed(&self) -> FeedResult<()> {
        self.inner.connection.wait_closed().await
    }

    pub fn fault(&self) -> Option<DisconnectReason> {
        self.inner.connection.fault()
    }

    pub fn stats(&self) -> FeedStats {
        self.inner.connection.stats()
    }
}

/// Bridges session events to the caller's handler. Holds the client weakly
/// so the session does not keep a dropped client alive.
struct Dispatcher {
    inner: Weak<Inner>,
}

impl Dispatcher {
    fn client(&self) -> Option<FeedClient> {
        self.inner.upgrade().map(|inner| FeedClient { inner })
    }
}

#[async_trait]
impl SessionHandler for Dispatcher {
    async fn on_open(&self, reconnect: bool) {
        let Some(client) = self.client() else { return };
        let inner = &client.inner;
        if reconnect && inner.auto_resubscribe {
            let snapshot = inner.registry.lock().snapshot();
            match client.send_batched(&snapshot, true).await {
                Ok(sent) => tracing::info!(instruments = snapshot.len(), requests = sent, "resubscribed"),
                Err(e) => tracing::warn!(error = %e, "resubscribe failed"),
            }
        }
        inner.handler.on_connect(&client).await;
    }

    async fn on_event(&self, event: MarketEvent) {
        if let Some(client) = self.client() {
            client.inner.handler.on_message(&client, event).await;
        }
    }

    async fn on_close(&self, close: Option<CloseInfo>) {
        if let Some(client) = self.client() {
            client.inner.handler.on_close(&client, close).await;
        }
    }

    async fn on_fault(&self, reason: DisconnectReason) {
        if let Some(client) = self.client() {
            client.inner.handler.on_fault(&client, reason).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::protocol::ExchangeSegment;

    fn inst(id: &str) -> Instrument {
        Instrument::new(ExchangeSegment::NseEq, id).unwrap()
    }

    fn client() -> FeedClient {
        FeedClient::builder(Credentials::new("1000000001", "token"), SubscriptionMode::Ticker).build()
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_updates_registry_only() {
        let client = client();
        let sent = client.subscribe(&[inst("1"), inst("2"), inst("1")]).await.unwrap();
        assert_eq!(sent, 0);
        assert_eq!(client.instruments(), vec![inst("1"), inst("2")]);
    }

    #[tokio::test]
    async fn test_unsubscribe_missing_is_noop() {
        let client = FeedClient::builder(Credentials::new("1", "t"), SubscriptionMode::Quote)
            .instruments([inst("1")])
            .build();
        client.unsubscribe(&[inst("9")]).await.unwrap();
        assert_eq!(client.instruments(), vec![inst("1")]);
        client.unsubscribe(&[inst("1")]).await.unwrap();
        assert!(client.instruments().is_empty());
    }

    #[tokio::test]
    async fn test_connect_fails_fast_without_credentials() {
        let client = FeedClient::builder(Credentials::new("1000000001", ""), SubscriptionMode::Ticker).build();
        assert!(matches!(client.connect(), Err(FeedError::MissingCredentials)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_rejects_oversized_client_id() {
        let client = FeedClient::builder(Credentials::new("9".repeat(31), "t"), SubscriptionMode::Ticker).build();
        assert!(matches!(client.connect(), Err(FeedError::Encode(_))));
    }

    #[tokio::test]
    async fn test_dropped_client_releases_session() {
        let config = FeedConfig::default()
            .with_url("ws://127.0.0.1:1")
            .with_reconnect_delay(std::time::Duration::from_secs(60));
        let client = FeedClient::builder(Credentials::new("1", "t"), SubscriptionMode::Ticker)
            .config(config)
            .build();
        client.connect().unwrap();

        let weak = Arc::downgrade(&client.inner);
        drop(client);
        assert!(weak.upgrade().is_none());
    }
}
