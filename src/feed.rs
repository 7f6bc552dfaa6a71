//! Synthetic market feed
//!
//! Stands in for the exchange streaming clients when running the binary
//! without network access. Prices follow a deterministic walk so runs are
//! reproducible; every third update per pair is a ticker, the rest are
//! trades.

use std::time::Duration;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::Level;

use crate::core::{ExchangeId, Pair, Quote, Trade, UpdateKind, UpdateMsg};

/// Id of the newest trade in the initial history snapshot
pub const SNAPSHOT_LAST_TRADE_ID: u64 = 1_000;

/// Deterministic price walk for one pair
#[derive(Debug, Clone)]
struct PriceWalk {
    pair: Pair,
    price: Decimal,
}

impl PriceWalk {
    fn new(pair: Pair, index: usize) -> Self {
        Self {
            pair,
            price: Decimal::new(100 * (index as i64 + 1), 0),
        }
    }

    /// Advance by a step in [-0.10, +0.10]
    fn step(&mut self, n: u64) -> Decimal {
        let cents = ((n.wrapping_mul(7_919)) % 21) as i64 - 10;
        self.price += Decimal::new(cents, 2);
        if self.price <= Decimal::ZERO {
            self.price = Decimal::new(1, 2);
        }
        self.price
    }
}

/// Synthetic producer for the quote and history routers
pub struct SyntheticFeed {
    walks: Vec<PriceWalk>,
    interval: Duration,
}

impl SyntheticFeed {
    pub fn new(pairs: &[Pair], interval: Duration) -> Self {
        let walks = pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| PriceWalk::new(pair.clone(), i))
            .collect();
        Self { walks, interval }
    }

    /// Initial quotes, as a REST snapshot would return them
    pub fn snapshot(&self) -> Vec<Quote> {
        self.walks
            .iter()
            .map(|walk| quote(&walk.pair, walk.price))
            .collect()
    }

    /// Publish updates until `shutdown` fires or a router goes away
    pub fn spawn(
        mut self,
        quotes: mpsc::Sender<UpdateMsg>,
        trades: mpsc::Sender<Trade>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.walks.is_empty() {
                return;
            }

            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut n: u64 = 0;
            let mut next_id = SNAPSHOT_LAST_TRADE_ID + 1;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {}
                }

                let len = self.walks.len();
                let walk = &mut self.walks[(n as usize) % len];
                let price = walk.step(n);
                let pair = walk.pair.clone();
                let is_ticker = (n / len as u64) % 3 == 2;
                n += 1;

                let kind = if is_ticker {
                    UpdateKind::Ticker
                } else {
                    UpdateKind::Trade
                };
                let update = UpdateMsg::new(quote(&pair, price), kind);
                if !publish(&quotes, update, &mut shutdown).await {
                    break;
                }

                if !is_ticker {
                    let trade = Trade {
                        pair,
                        id: next_id,
                        price: price.round_dp(2).to_string(),
                        size: "0.01".to_string(),
                        time: OffsetDateTime::now_utc(),
                    };
                    next_id += 1;
                    if !publish(&trades, trade, &mut shutdown).await {
                        break;
                    }
                }
            }

            crate::log_main!(Level::INFO, updates = n, "synthetic feed stopped");
        })
    }
}

/// Send `item`, giving up if shutdown arrives while the queue is full
///
/// Returns false when the feed should stop.
async fn publish<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown => false,
        res = tx.send(item) => res.is_ok(),
    }
}

fn quote(pair: &Pair, price: Decimal) -> Quote {
    let spread = Decimal::new(5, 2);
    let mut quote = Quote::for_pair(pair.clone());
    quote.exchange = Some(ExchangeId::HitBtc);
    quote.price = price.round_dp(2).to_string();
    quote.bid = (price - spread).round_dp(2).to_string();
    quote.ask = (price + spread).round_dp(2).to_string();
    quote.size = "0.01".to_string();
    quote
}
