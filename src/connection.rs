//! WebSocket session lifecycle
//!
//! One supervisor task per `connect()` owns the read half of the socket. It
//! authorizes, feeds decoded packets to a `SessionHandler`, and after a
//! transport failure sleeps a fixed delay and dials again. Only one supervisor
//! runs per manager, so only one reconnect timer can be pending.
//!
//! A supervisor gives up its session slot before running the final callbacks,
//! so `connect()` may be called again from `on_close` or as soon as
//! `wait_closed()` resolves. Dropping the manager closes the session.
//!
//! ```text
//! Disconnected -> Connecting -> Authorizing -> Open -> Closing -> Disconnected
//!                     ^                          |
//!                     +------- Reconnecting <----+ (transport error)
//!                                                |
//!                                                +-> Closing -> Faulted (server disconnect notice)
//! ```

use crate::config::{Credentials, FeedConfig};
use crate::decoder::Decoder;
use crate::encoder::encode_auth_frame;
use crate::error::{FeedError, FeedResult};
use crate::event::{DisconnectReason, MarketEvent};
use crate::stats::FeedStats;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, Notify};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport is up, authentication frame not yet sent
    Authorizing,
    Open,
    Closing,
    /// Waiting out the reconnect delay
    Reconnecting,
    /// Server sent a disconnect notice; no reconnect
    Faulted,
}

/// Close code and reason, when the peer sent them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl From<CloseFrame<'_>> for CloseInfo {
    fn from(frame: CloseFrame<'_>) -> Self {
        CloseInfo {
            code: frame.code.into(),
            reason: frame.reason.into_owned(),
        }
    }
}

/// Receives session events from the supervisor task
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// Authorized and open. `reconnect` is true for every open after the first.
    async fn on_open(&self, reconnect: bool);

    async fn on_event(&self, event: MarketEvent);

    async fn on_close(&self, close: Option<CloseInfo>);

    async fn on_fault(&self, reason: DisconnectReason);
}

/// How a single session ended
#[derive(Debug)]
enum SessionEnd {
    /// `close()` was called
    Requested,
    /// Server sent a Close frame
    ServerClosed(Option<CloseInfo>),
    /// Server sent a disconnect notice
    Fault(DisconnectReason),
    /// Connect failure, read error or EOF; reconnect
    TransportError,
}

/// Which supervisor owns the manager. `generation` counts `connect()` calls;
/// `shutdown` is set while that supervisor still accepts `close()`.
#[derive(Default)]
struct SessionSlot {
    generation: u64,
    shutdown: Option<Arc<Notify>>,
}

struct Shared {
    config: FeedConfig,
    credentials: Credentials,
    state: watch::Sender<ConnectionState>,
    writer: Mutex<Option<WsSink>>,
    stats: parking_lot::Mutex<FeedStats>,
    fault: parking_lot::Mutex<Option<DisconnectReason>>,
    session: parking_lot::Mutex<SessionSlot>,
}

pub struct ConnectionManager {
    shared: Arc<Shared>,
}

fn bearer_header(access_token: &str) -> FeedResult<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|e| FeedError::InvalidHeader(e.to_string()))
}

impl ConnectionManager {
    pub fn new(config: FeedConfig, credentials: Credentials) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        ConnectionManager {
            shared: Arc::new(Shared {
                config,
                credentials,
                state,
                writer: Mutex::new(None),
                stats: parking_lot::Mutex::new(FeedStats::new()),
                fault: parking_lot::Mutex::new(None),
                session: parking_lot::Mutex::new(SessionSlot::default()),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions. Short-lived states may be skipped.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Resolves once the session is over; `Err` if the server faulted it
    pub async fn wait_closed(&self) -> FeedResult<()> {
        let mut rx = self.shared.state.subscribe();
        let _ = rx
            .wait_for(|state| matches!(state, ConnectionState::Disconnected | ConnectionState::Faulted))
            .await;
        match *self.shared.fault.lock() {
            Some(reason) => Err(FeedError::ServerDisconnect(reason)),
            None => Ok(()),
        }
    }

    pub fn fault(&self) -> Option<DisconnectReason> {
        *self.shared.fault.lock()
    }

    pub fn stats(&self) -> FeedStats {
        self.shared.stats.lock().clone()
    }

    /// True from `connect()` until the supervisor starts winding down
    pub fn is_running(&self) -> bool {
        self.shared.session.lock().shutdown.is_some()
    }

    /// Start the supervisor.
    ///
    /// Credentials and the authentication frame are checked up front; those
    /// failures return immediately without touching the network. Fails with
    /// `AlreadyConnected` while a session is running.
    pub fn connect(&self, handler: Arc<dyn SessionHandler>) -> FeedResult<()> {
        let credentials = &self.shared.credentials;
        credentials.validate()?;
        let auth = encode_auth_frame(&credentials.client_id, &credentials.access_token)?;
        bearer_header(&credentials.access_token)?;

        let mut slot = self.shared.session.lock();
        if slot.shutdown.is_some() {
            tracing::debug!(state = ?self.state(), "connect rejected, session already running");
            return Err(FeedError::AlreadyConnected);
        }

        slot.generation += 1;
        let shutdown = Arc::new(Notify::new());
        slot.shutdown = Some(Arc::clone(&shutdown));

        *self.shared.fault.lock() = None;
        self.shared.set_state(ConnectionState::Connecting);

        tokio::spawn(supervise(
            Arc::clone(&self.shared),
            handler,
            shutdown,
            auth,
            slot.generation,
        ));
        Ok(())
    }

    /// Ask the supervisor to close the socket. Does not wait.
    pub fn close(&self) {
        match self.shared.session.lock().shutdown.as_ref() {
            Some(shutdown) => shutdown.notify_one(),
            None => tracing::debug!("close ignored, not connected"),
        }
    }

    /// Send a binary frame. Returns `Ok(false)` without sending when the
    /// session is not open.
    pub async fn send(&self, frame: Vec<u8>) -> FeedResult<bool> {
        if self.state() != ConnectionState::Open {
            tracing::debug!(state = ?self.state(), len = frame.len(), "send skipped, session not open");
            return Ok(false);
        }
        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => {
                sink.send(Message::Binary(frame)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shared.session.lock().shutdown.take() {
            tracing::debug!("manager dropped, closing session");
            shutdown.notify_one();
        }
    }
}

impl Shared {
    /// Give up the session slot, recording the fault if this supervisor
    /// still owns the manager
    fn release(&self, generation: u64, fault: Option<DisconnectReason>) {
        let mut slot = self.session.lock();
        if slot.generation == generation {
            slot.shutdown = None;
            if fault.is_some() {
                *self.fault.lock() = fault;
            }
        }
    }

    /// Publish the terminal state unless `connect()` started a newer session
    fn finish(&self, generation: u64, state: ConnectionState) {
        let slot = self.session.lock();
        if slot.generation == generation {
            self.set_state(state);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "connection state");
        }
    }

    async fn open_transport(&self) -> FeedResult<WsStream> {
        let mut request = self.config.url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_header(&self.credentials.access_token)?);

        let timeout = self.config.connect_timeout;
        let (ws, response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| FeedError::ConnectTimeout(timeout))??;

        tracing::info!(url = %self.config.url, status = %response.status(), "transport opened");
        Ok(ws)
    }

    async fn close_writer(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "close handshake failed");
            }
        }
    }

    /// Decode one frame and hand it on. Returns the reason when the frame
    /// was a disconnect notice.
    async fn dispatch(&self, data: &[u8], handler: &dyn SessionHandler) -> Option<DisconnectReason> {
        self.stats.lock().record_frame(data.len());

        let started = Instant::now();
        let event = match Decoder::decode(data) {
            Ok(event) => event,
            Err(e) => {
                self.stats.lock().record_dropped();
                tracing::warn!(error = %e, len = data.len(), "dropped frame");
                return None;
            }
        };
        self.stats
            .lock()
            .record_decoded(started.elapsed().as_micros() as u64);

        let fault = match event {
            MarketEvent::DisconnectNotice(reason) => {
                tracing::error!(code = reason.code(), %reason, "server disconnect notice");
                Some(reason)
            }
            _ => None,
        };
        handler.on_event(event).await;
        fault
    }

    /// Authorize and pump one socket until it ends
    async fn run_session(
        &self,
        ws: WsStream,
        auth: &[u8],
        handler: &dyn SessionHandler,
        shutdown: &Notify,
        reconnect: bool,
    ) -> (SessionEnd, bool) {
        self.set_state(ConnectionState::Authorizing);
        let (mut sink, mut source): (WsSink, WsSource) = ws.split();

        if let Err(e) = sink.send(Message::Binary(auth.to_vec())).await {
            tracing::warn!(error = %e, "failed to send authentication frame");
            return (SessionEnd::TransportError, false);
        }
        *self.writer.lock().await = Some(sink);
        self.set_state(ConnectionState::Open);
        tracing::info!(client_id = %self.credentials.client_id, reconnect, "feed authorized");

        handler.on_open(reconnect).await;

        loop {
            let next = tokio::select! {
                _ = shutdown.notified() => {
                    self.set_state(ConnectionState::Closing);
                    self.close_writer().await;
                    return (SessionEnd::Requested, true);
                }
                next = source.next() => next,
            };

            let end = match next {
                Some(Ok(Message::Binary(data))) => match self.dispatch(&data, handler).await {
                    Some(reason) => SessionEnd::Fault(reason),
                    None => continue,
                },
                Some(Ok(Message::Close(frame))) => {
                    let close = frame.map(CloseInfo::from);
                    tracing::info!(?close, "closed by server");
                    SessionEnd::ServerClosed(close)
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(%text, "ignoring text message");
                    continue;
                }
                // ping/pong replies are handled by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "transport error");
                    SessionEnd::TransportError
                }
                None => {
                    tracing::warn!("transport ended without close frame");
                    SessionEnd::TransportError
                }
            };

            self.set_state(ConnectionState::Closing);
            self.close_writer().await;
            return (end, true);
        }
    }
}

async fn supervise(
    shared: Arc<Shared>,
    handler: Arc<dyn SessionHandler>,
    shutdown: Arc<Notify>,
    auth: Vec<u8>,
    generation: u64,
) {
    let mut opened_before = false;

    loop {
        shared.set_state(ConnectionState::Connecting);
        let transport = tokio::select! {
            _ = shutdown.notified() => {
                shared.release(generation, None);
                shared.finish(generation, ConnectionState::Disconnected);
                return;
            }
            transport = shared.open_transport() => transport,
        };

        let (end, opened) = match transport {
            Ok(ws) => {
                shared
                    .run_session(ws, &auth, handler.as_ref(), &shutdown, opened_before)
                    .await
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %shared.config.url, "connect failed");
                (SessionEnd::TransportError, false)
            }
        };
        opened_before |= opened;

        match end {
            SessionEnd::Requested => {
                tracing::info!("feed closed");
                shared.release(generation, None);
                handler.on_close(None).await;
                shared.finish(generation, ConnectionState::Disconnected);
                return;
            }
            SessionEnd::ServerClosed(close) => {
                shared.release(generation, None);
                handler.on_close(close).await;
                shared.finish(generation, ConnectionState::Disconnected);
                return;
            }
            SessionEnd::Fault(reason) => {
                shared.release(generation, Some(reason));
                handler.on_fault(reason).await;
                handler.on_close(None).await;
                shared.finish(generation, ConnectionState::Faulted);
                return;
            }
            SessionEnd::TransportError => {
                if opened {
                    handler.on_close(None).await;
                }
                shared.set_state(ConnectionState::Reconnecting);
                shared.stats.lock().record_reconnect();

                let delay = shared.config.reconnect_delay;
                tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting");
                tokio::select! {
                    _ = shutdown.notified() => {
                        shared.release(generation, None);
                        shared.finish(generation, ConnectionState::Disconnected);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
