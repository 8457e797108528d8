//! In-process feed server and a channel-backed handler

#![allow(dead_code)]

use async_trait::async_trait;
use dhan_feed::{CloseInfo, DisconnectReason, FeedClient, FeedHandler, Instrument, MarketEvent};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

pub struct MockServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<ServerConn>,
}

pub struct ServerConn {
    pub ws: WebSocketStream<TcpStream>,
    pub authorization: Option<String>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut authorization = None;
                    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        authorization = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        Ok(resp)
                    };
                    let accepted = accept_hdr_async(stream, callback).await;
                    if let Ok(ws) = accepted {
                        let _ = tx.send(ServerConn { ws, authorization });
                    }
                });
            }
        });

        MockServer { url, connections }
    }

    pub async fn accept(&mut self) -> ServerConn {
        within(self.connections.recv()).await.expect("server stopped")
    }

    /// True when no client connects within `window`
    pub async fn quiet_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.connections.recv()).await.is_err()
    }
}

impl ServerConn {
    pub async fn recv_binary(&mut self) -> Vec<u8> {
        loop {
            match within(self.ws.next()).await {
                Some(Ok(Message::Binary(data))) => return data,
                Some(Ok(_)) => continue,
                other => panic!("expected binary frame, got {other:?}"),
            }
        }
    }

    pub async fn recv_close(&mut self) {
        loop {
            match within(self.ws.next()).await {
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return,
            }
        }
    }

    /// True when nothing arrives within `window`
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.ws.next()).await.is_err()
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) {
        self.ws.send(Message::Binary(data)).await.unwrap();
    }

    pub async fn close_with(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.ws.send(Message::Close(Some(frame))).await.unwrap();
    }
}

#[derive(Debug)]
pub enum Signal {
    Connected,
    Message(MarketEvent),
    Closed(Option<CloseInfo>),
    Fault(DisconnectReason),
}

/// Forwards every callback into a channel; optionally subscribes on connect
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Signal>,
    subscribe_on_connect: Vec<Instrument>,
}

impl ChannelHandler {
    pub fn new(subscribe_on_connect: Vec<Instrument>) -> (Self, Signals) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelHandler { tx, subscribe_on_connect }, Signals { rx })
    }
}

#[async_trait]
impl FeedHandler for ChannelHandler {
    async fn on_connect(&self, client: &FeedClient) {
        if !self.subscribe_on_connect.is_empty() {
            client.subscribe(&self.subscribe_on_connect).await.unwrap();
        }
        let _ = self.tx.send(Signal::Connected);
    }

    async fn on_message(&self, _client: &FeedClient, event: MarketEvent) {
        let _ = self.tx.send(Signal::Message(event));
    }

    async fn on_close(&self, _client: &FeedClient, close: Option<CloseInfo>) {
        let _ = self.tx.send(Signal::Closed(close));
    }

    async fn on_fault(&self, _client: &FeedClient, reason: DisconnectReason) {
        let _ = self.tx.send(Signal::Fault(reason));
    }
}

pub struct Signals {
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl Signals {
    pub async fn next(&mut self) -> Signal {
        within(self.rx.recv()).await.expect("handler dropped")
    }
}
