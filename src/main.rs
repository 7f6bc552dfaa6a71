//! Crypto watchlist quote router
//!
//! # Architecture
//! - **core**: Message types (Pair, Quote, UpdateMsg, Trade, HistoryUpdMsg)
//! - **hot_path**: Quote router with debounce lanes, history router
//! - **feed**: Synthetic producer standing in for exchange streams
//! - **infrastructure**: Cold path (logging, metrics, config, api)

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tracing::Level;

use quote_router::core::{HistoryUpdKind, Pair, Tick, UpdateKind, UpdateMsg};
use quote_router::feed::{SyntheticFeed, SNAPSHOT_LAST_TRADE_ID};
use quote_router::infrastructure::logging::init_logging;
use quote_router::infrastructure::{start_server, AppState, MetricsCollector};
use quote_router::{log_main, Config, HistoryRouter, QuoteRouter, Result};

/// Main application state
pub struct QuoteApp {
    config: Config,
}

impl QuoteApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        log_main!(Level::INFO, "Starting quote router...");

        let pairs = self.config.feed.parsed_pairs()?;
        let history_pair = self.config.feed.parsed_history_pair()?;
        let metrics = Arc::new(MetricsCollector::new());

        // 1. Initial snapshot, applied directly by the consumer
        let feed = SyntheticFeed::new(&pairs, self.config.feed.tick_interval());
        let mut watchlist: HashMap<Pair, UpdateMsg> = HashMap::new();
        for quote in feed.snapshot() {
            apply_quote(&mut watchlist, UpdateMsg::new(quote, UpdateKind::Init));
        }

        // 2. Routers
        let router = QuoteRouter::start(pairs, &self.config.router, metrics.clone())?;
        let history = HistoryRouter::start(
            history_pair,
            SNAPSHOT_LAST_TRADE_ID,
            &self.config.router,
            metrics.clone(),
        )?;

        let mut from_router = router.take_outbound()?;
        let (history_in, mut history_out) = history.channels()?;

        // 3. Status API (Cold Path)
        if self.config.api.enabled {
            let state = AppState {
                lanes: router.lanes(),
                history: Some(history.filter().clone()),
                metrics: metrics.clone(),
            };
            let port = self.config.api.port;
            tokio::spawn(async move {
                if let Err(e) = start_server(state, port).await {
                    log_main!(Level::ERROR, "API Server failed: {}", e);
                }
            });
        }

        // 4. Producer
        let (stop_feed, feed_shutdown) = oneshot::channel();
        let feed_task = feed.spawn(router.inbound(), history_in, feed_shutdown);

        // 5. Consumer loop
        let mut last_price: Option<Decimal> = None;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    log_main!(Level::INFO, "Ctrl-C received, shutting down");
                    break;
                }
                Some(upd) = from_router.recv() => apply_quote(&mut watchlist, upd),
                Some(upd) = history_out.recv() => match upd.kind {
                    HistoryUpdKind::HistoryUpd => {
                        let tick = last_price
                            .map(|prev| upd.trade.tick_against(prev))
                            .unwrap_or(Tick::Unchanged);
                        last_price = upd.trade.price_decimal().or(last_price);
                        log_main!(
                            Level::INFO,
                            pair = %upd.trade.pair,
                            id = upd.trade.id,
                            price = %upd.trade.price,
                            tick = ?tick,
                            "trade"
                        );
                    }
                    HistoryUpdKind::HistoryHighlightUpd => {
                        log_main!(Level::DEBUG, id = upd.trade.id, "history highlight cleared");
                    }
                },
            }
        }

        // 6. Teardown
        let _ = stop_feed.send(());
        feed_task.await?;
        router.shutdown().await?;
        history.shutdown().await?;

        let snapshot = metrics.snapshot();
        log_main!(
            Level::INFO,
            trades = snapshot.trades,
            flashes = snapshot.flashes,
            history_forwarded = snapshot.history_forwarded,
            "Stopped"
        );
        Ok(())
    }
}

/// Apply a routed update to the consumer's watchlist
fn apply_quote(watchlist: &mut HashMap<Pair, UpdateMsg>, upd: UpdateMsg) {
    match upd.kind {
        UpdateKind::Init | UpdateKind::Ticker => {
            log_main!(Level::DEBUG, pair = %upd.pair(), price = %upd.quote.price, "quote");
            watchlist.insert(upd.pair().clone(), upd);
        }
        UpdateKind::Trade => {
            log_main!(Level::DEBUG, pair = %upd.pair(), price = %upd.quote.price, "highlight");
            watchlist.insert(upd.pair().clone(), upd);
        }
        UpdateKind::Flash => {
            log_main!(Level::DEBUG, pair = %upd.pair(), "highlight cleared");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Guards must outlive the app
    let _guards = init_logging()?;

    // Load config or use defaults
    let config = Config::load().unwrap_or_else(|e| {
        log_main!(Level::WARN, "Config error, using defaults: {}", e);
        Config::default()
    });

    let app = QuoteApp::new(config);
    app.run().await?;

    Ok(())
}
