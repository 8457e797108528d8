//! Live feed demo
//!
//! ```text
//! DHAN_CLIENT_ID=... DHAN_ACCESS_TOKEN=... cargo run --example marketfeed
//! ```

use async_trait::async_trait;
use dhan_feed::{
    CloseInfo, Credentials, ExchangeSegment, FeedClient, FeedConfig, FeedHandler, Instrument, MarketEvent,
    SubscriptionMode,
};
use tracing_subscriber::EnvFilter;

struct Printer;

#[async_trait]
impl FeedHandler for Printer {
    async fn on_connect(&self, client: &FeedClient) {
        let instruments = [
            Instrument::new(ExchangeSegment::NseEq, "1333"),
            Instrument::new(ExchangeSegment::NseEq, "11536"),
            Instrument::new(ExchangeSegment::Idx, "13"),
        ];
        let instruments: Vec<Instrument> = instruments.into_iter().filter_map(Result::ok).collect();
        match client.subscribe(&instruments).await {
            Ok(requests) => tracing::info!(requests, "subscribed"),
            Err(e) => tracing::error!(error = %e, "subscribe failed"),
        }
    }

    async fn on_message(&self, _client: &FeedClient, event: MarketEvent) {
        match event {
            MarketEvent::Ticker(t) => println!("{:?} {} ltp={} at {}", t.segment, t.security_id, t.last_price, t.last_trade_time),
            MarketEvent::Quote(q) => println!("{:?} {} ltp={} vol={}", q.segment, q.security_id, q.last_price, q.volume),
            other => println!("{other:?}"),
        }
    }

    async fn on_close(&self, client: &FeedClient, close: Option<CloseInfo>) {
        tracing::info!(?close, "feed closed");
        client.stats().log_summary();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let credentials = Credentials::new(
        std::env::var("DHAN_CLIENT_ID").unwrap_or_default(),
        std::env::var("DHAN_ACCESS_TOKEN").unwrap_or_default(),
    );

    let client = FeedClient::builder(credentials, SubscriptionMode::Ticker)
        .config(FeedConfig::default().with_auto_resubscribe(true))
        .handler(Printer)
        .build();

    client.connect()?;

    tokio::select! {
        result = client.wait_closed() => result?,
        _ = tokio::signal::ctrl_c() => {
            client.close();
            client.wait_closed().await?;
        }
    }
    Ok(())
}
