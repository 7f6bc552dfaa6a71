//! Quote router
//!
//! Demultiplexes a single ingress queue of quote updates into one lane per
//! tracked pair, and multiplexes every lane's output (Trade, Ticker and
//! synthetic Flash updates) back onto a single egress queue.
//!
//! Each tracked pair costs one task; tracking an unbounded number of pairs
//! spawns an unbounded number of tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Level;

use super::lane::LaneHandle;
use crate::core::{Pair, UpdateMsg};
use crate::infrastructure::config::RouterConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::{Result, RouterError};

/// Pair → lane table
///
/// Cloning shares the table. Mutation takes the write lock, dispatch lookups
/// take the read lock; the lock is never held across an await.
#[derive(Clone, Default)]
pub struct LaneTable {
    lanes: Arc<RwLock<HashMap<Pair, LaneHandle>>>,
}

impl LaneTable {
    /// Insert a lane, returning the one it replaces
    pub(crate) fn insert(&self, pair: Pair, lane: LaneHandle) -> Option<LaneHandle> {
        self.lanes.write().insert(pair, lane)
    }

    pub(crate) fn remove(&self, pair: &Pair) -> Option<LaneHandle> {
        self.lanes.write().remove(pair)
    }

    /// Lane queue for `pair`, if tracked
    pub(crate) fn sender(&self, pair: &Pair) -> Option<mpsc::Sender<UpdateMsg>> {
        self.lanes.read().get(pair).map(LaneHandle::sender)
    }

    /// Remove every lane
    pub(crate) fn drain(&self) -> Vec<LaneHandle> {
        self.lanes.write().drain().map(|(_, lane)| lane).collect()
    }

    pub fn contains(&self, pair: &Pair) -> bool {
        self.lanes.read().contains_key(pair)
    }

    /// Tracked pairs, sorted
    pub fn pairs(&self) -> Vec<Pair> {
        let mut pairs: Vec<Pair> = self.lanes.read().keys().cloned().collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.lanes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.read().is_empty()
    }
}

/// Routes quote updates through per-pair debounce lanes
pub struct QuoteRouter {
    lanes: LaneTable,
    inbound: mpsc::Sender<UpdateMsg>,
    /// Cloned into every new lane
    outbound_tx: mpsc::Sender<UpdateMsg>,
    outbound_rx: Mutex<Option<mpsc::Receiver<UpdateMsg>>>,
    shutdown: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
    window: Duration,
    capacity: usize,
    metrics: Arc<MetricsCollector>,
}

impl QuoteRouter {
    /// Create one lane per pair and start the dispatch task
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `RouterError::Config` if the config holds a zero duration or
    /// queue capacity.
    pub fn start(
        pairs: impl IntoIterator<Item = Pair>,
        config: &RouterConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        config.validate()?;

        let window = config.flash_window();
        let capacity = config.queue_capacity;

        let (inbound, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = oneshot::channel();

        let lanes = LaneTable::default();
        for pair in pairs {
            if lanes.contains(&pair) {
                crate::log_router!(Level::WARN, pair = %pair, "duplicate pair at startup");
                continue;
            }
            let lane = LaneHandle::spawn(
                pair.clone(),
                window,
                capacity,
                outbound_tx.clone(),
                metrics.clone(),
            );
            lanes.insert(pair, lane);
        }

        crate::log_router!(
            Level::INFO,
            pairs = lanes.len(),
            window_ms = window.as_millis() as u64,
            capacity,
            "quote router started"
        );

        let dispatcher = tokio::spawn(dispatch(
            inbound_rx,
            shutdown_rx,
            lanes.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            lanes,
            inbound,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            shutdown,
            dispatcher,
            window,
            capacity,
            metrics,
        })
    }

    /// Start tracking `pair`
    ///
    /// An already-tracked pair gets a fresh lane; the old one is stopped and
    /// its pending Flash dropped.
    pub async fn add_pair(&self, pair: Pair) -> Result<()> {
        let lane = LaneHandle::spawn(
            pair.clone(),
            self.window,
            self.capacity,
            self.outbound_tx.clone(),
            self.metrics.clone(),
        );

        match self.lanes.insert(pair.clone(), lane) {
            Some(old) => {
                crate::log_router!(Level::DEBUG, pair = %pair, "lane replaced");
                old.stop().await?;
            }
            None => crate::log_router!(Level::INFO, pair = %pair, "pair added"),
        }
        Ok(())
    }

    /// Stop tracking `pair` and wait for its lane to exit
    ///
    /// Updates still queued to the lane are discarded. Untracked pairs are a
    /// no-op.
    pub async fn remove_pair(&self, pair: &Pair) -> Result<()> {
        match self.lanes.remove(pair) {
            Some(lane) => {
                lane.stop().await?;
                crate::log_router!(Level::INFO, pair = %pair, "pair removed");
            }
            None => crate::log_router!(Level::DEBUG, pair = %pair, "remove of untracked pair"),
        }
        Ok(())
    }

    /// Write side of the ingress queue
    ///
    /// Producers push Trade and Ticker updates; sends wait while the queue is
    /// full.
    pub fn inbound(&self) -> mpsc::Sender<UpdateMsg> {
        self.inbound.clone()
    }

    /// Read side of the egress queue
    ///
    /// There is a single consumer: the receiver is handed out once and later
    /// calls fail with `RouterError::OutboundTaken`.
    pub fn take_outbound(&self) -> Result<mpsc::Receiver<UpdateMsg>> {
        self.outbound_rx.lock().take().ok_or(RouterError::OutboundTaken)
    }

    pub fn tracked_pairs(&self) -> Vec<Pair> {
        self.lanes.pairs()
    }

    pub fn is_tracked(&self, pair: &Pair) -> bool {
        self.lanes.contains(pair)
    }

    /// Shared view of the lane table
    pub fn lanes(&self) -> LaneTable {
        self.lanes.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Stop the dispatch task and every lane
    ///
    /// Returns once the dispatch loop has exited, which happens after all
    /// lanes have stopped.
    pub async fn shutdown(self) -> Result<()> {
        // Err means the dispatcher already exited
        let _ = self.shutdown.send(());
        self.dispatcher.await?;
        crate::log_router!(Level::INFO, "quote router stopped");
        Ok(())
    }
}

async fn dispatch(
    mut inbound: mpsc::Receiver<UpdateMsg>,
    mut shutdown: oneshot::Receiver<()>,
    lanes: LaneTable,
    metrics: Arc<MetricsCollector>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            msg = inbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let Some(lane) = lanes.sender(msg.pair()) else {
            metrics.record_dropped_untracked();
            crate::log_router!(Level::TRACE, pair = %msg.pair(), "dropping update for untracked pair");
            continue;
        };

        let delivered = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            res = lane.send(msg) => res.is_ok(),
        };

        if delivered {
            metrics.record_routed();
        } else {
            // Lane removed between lookup and send
            metrics.record_dropped_untracked();
        }
    }

    stop_all(&lanes).await;
}

async fn stop_all(lanes: &LaneTable) {
    for lane in lanes.drain() {
        if let Err(e) = lane.stop().await {
            crate::log_router!(Level::WARN, "lane task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UpdateKind;
    use crate::test_utils::{btc_usd, drain, eth_usd, ticker_update, trade_update};
    use tokio::time::{self, Instant};

    fn config(window_ms: u64) -> RouterConfig {
        RouterConfig {
            flash_window_ms: window_ms,
            highlight_delay_ms: window_ms,
            queue_capacity: 64,
        }
    }

    fn start(pairs: Vec<Pair>, window_ms: u64) -> (QuoteRouter, mpsc::Receiver<UpdateMsg>) {
        let router = QuoteRouter::start(pairs, &config(window_ms), Arc::new(MetricsCollector::new()))
            .unwrap();
        let out = router.take_outbound().unwrap();
        (router, out)
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// Receive the next update with its offset from `start`
    async fn next(out: &mut mpsc::Receiver<UpdateMsg>, start: Instant) -> (UpdateKind, Duration) {
        let msg = out.recv().await.unwrap();
        (msg.kind, start.elapsed())
    }

    #[tokio::test(start_paused = true)]
    async fn test_flash_follows_last_trade() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();
        let start = Instant::now();

        tx.send(trade_update(btc_usd(), "6500.1")).await.unwrap();
        let (kind, at) = next(&mut out, start).await;
        assert_eq!(kind, UpdateKind::Trade);
        assert!(at < ms(5));

        time::sleep(ms(250)).await;
        tx.send(trade_update(btc_usd(), "6500.2")).await.unwrap();

        let (kind, at) = next(&mut out, start).await;
        assert_eq!(kind, UpdateKind::Trade);
        assert!(at >= ms(250) && at < ms(300));

        let (kind, at) = next(&mut out, start).await;
        assert_eq!(kind, UpdateKind::Flash);
        assert!(at >= ms(550) && at < ms(560), "flash at {:?}", at);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_trades_suppress_flash() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();
        let start = Instant::now();

        for _ in 0..10 {
            tx.send(trade_update(btc_usd(), "1")).await.unwrap();
            time::sleep(ms(100)).await;
        }

        let updates = drain(&mut out);
        assert_eq!(updates.len(), 10);
        assert!(updates.iter().all(|m| m.kind == UpdateKind::Trade));

        // Last trade at 900ms
        let (kind, at) = next(&mut out, start).await;
        assert_eq!(kind, UpdateKind::Flash);
        assert!(at >= ms(1200) && at < ms(1210), "flash at {:?}", at);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_flash_per_gap() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();

        for _ in 0..3 {
            tx.send(trade_update(btc_usd(), "1")).await.unwrap();
            time::sleep(ms(500)).await;
        }
        time::sleep(ms(1000)).await;

        let kinds: Vec<UpdateKind> = drain(&mut out).into_iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                UpdateKind::Trade,
                UpdateKind::Flash,
                UpdateKind::Trade,
                UpdateKind::Flash,
                UpdateKind::Trade,
                UpdateKind::Flash,
            ]
        );

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_never_flashes() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();

        tx.send(ticker_update(btc_usd(), "1")).await.unwrap();
        time::sleep(ms(100)).await;
        tx.send(ticker_update(btc_usd(), "2")).await.unwrap();
        time::sleep(ms(1000)).await;

        let kinds: Vec<UpdateKind> = drain(&mut out).into_iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![UpdateKind::Ticker, UpdateKind::Ticker]);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_does_not_extend_window() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();
        let start = Instant::now();

        tx.send(trade_update(btc_usd(), "1")).await.unwrap();
        time::sleep(ms(200)).await;
        tx.send(ticker_update(btc_usd(), "2")).await.unwrap();

        assert_eq!(next(&mut out, start).await.0, UpdateKind::Trade);
        assert_eq!(next(&mut out, start).await.0, UpdateKind::Ticker);
        let (kind, at) = next(&mut out, start).await;
        assert_eq!(kind, UpdateKind::Flash);
        assert!(at >= ms(300) && at < ms(310), "flash at {:?}", at);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lanes_are_independent() {
        let (router, mut out) = start(vec![btc_usd(), eth_usd()], 300);
        let tx = router.inbound();

        tx.send(trade_update(btc_usd(), "1")).await.unwrap();
        time::sleep(ms(200)).await;
        tx.send(trade_update(eth_usd(), "1")).await.unwrap();
        time::sleep(ms(1000)).await;

        let flashes: Vec<Pair> = drain(&mut out)
            .into_iter()
            .filter(|m| m.kind == UpdateKind::Flash)
            .map(|m| m.quote.pair)
            .collect();
        assert_eq!(flashes, vec![btc_usd(), eth_usd()]);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_pair_dropped() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();

        tx.send(trade_update(eth_usd(), "1")).await.unwrap();
        time::sleep(ms(1000)).await;

        assert!(drain(&mut out).is_empty());
        assert_eq!(router.metrics().snapshot().dropped_untracked, 1);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_untracked_pair_is_noop() {
        let (router, mut out) = start(vec![btc_usd()], 300);

        tokio_test::assert_ok!(router.remove_pair(&eth_usd()).await);
        time::sleep(ms(1000)).await;

        assert!(drain(&mut out).is_empty());
        assert_eq!(router.tracked_pairs(), vec![btc_usd()]);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_then_readd_resets_debounce() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();

        tx.send(trade_update(btc_usd(), "1")).await.unwrap();
        assert_eq!(out.recv().await.unwrap().kind, UpdateKind::Trade);

        router.remove_pair(&btc_usd()).await.unwrap();
        assert!(!router.is_tracked(&btc_usd()));
        router.add_pair(btc_usd()).await.unwrap();
        assert!(router.is_tracked(&btc_usd()));

        time::sleep(ms(1000)).await;
        assert!(drain(&mut out).is_empty());

        // Fresh lane still debounces
        tx.send(trade_update(btc_usd(), "2")).await.unwrap();
        time::sleep(ms(1000)).await;
        let kinds: Vec<UpdateKind> = drain(&mut out).into_iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![UpdateKind::Trade, UpdateKind::Flash]);

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_pair_replaces_lane() {
        let (router, mut out) = start(vec![btc_usd()], 300);
        let tx = router.inbound();

        tx.send(trade_update(btc_usd(), "1")).await.unwrap();
        assert_eq!(out.recv().await.unwrap().kind, UpdateKind::Trade);

        router.add_pair(btc_usd()).await.unwrap();
        assert_eq!(router.lanes().len(), 1);

        time::sleep(ms(1000)).await;
        assert!(drain(&mut out).is_empty());

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_start_pairs_collapse() {
        let (router, _out) = start(vec![btc_usd(), Pair::new("btc", "usd"), eth_usd()], 300);
        assert_eq!(router.tracked_pairs(), vec![btc_usd(), eth_usd()]);
        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queues_block_producer_without_drops() {
        const COUNT: usize = 20;
        let config = RouterConfig {
            queue_capacity: 1,
            ..config(300)
        };
        let router =
            QuoteRouter::start(vec![btc_usd()], &config, Arc::new(MetricsCollector::new())).unwrap();
        let tx = router.inbound();

        let producer = tokio::spawn(async move {
            for i in 0..COUNT {
                tx.send(ticker_update(btc_usd(), &i.to_string())).await.unwrap();
            }
        });

        // Egress is not read yet, so every queue fills up
        time::sleep(ms(50)).await;
        assert!(!producer.is_finished());

        let mut out = router.take_outbound().unwrap();
        let mut prices = Vec::with_capacity(COUNT);
        for _ in 0..COUNT {
            prices.push(out.recv().await.unwrap().quote.price);
        }
        let expected: Vec<String> = (0..COUNT).map(|i| i.to_string()).collect();
        assert_eq!(prices, expected);

        producer.await.unwrap();
        assert!(drain(&mut out).is_empty());
        assert_eq!(router.metrics().snapshot().routed, COUNT as u64);

        router.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_outbound_taken_once() {
        let (router, _out) = start(vec![btc_usd()], 300);
        assert!(matches!(router.take_outbound(), Err(RouterError::OutboundTaken)));
        router.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let config = RouterConfig {
            queue_capacity: 0,
            ..RouterConfig::default()
        };
        let res = QuoteRouter::start(vec![btc_usd()], &config, Arc::new(MetricsCollector::new()));
        assert!(matches!(res, Err(RouterError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let (router, mut out) = start(vec![btc_usd(), eth_usd()], 300);
        let tx = router.inbound();
        let lanes = router.lanes();

        tx.send(trade_update(btc_usd(), "1")).await.unwrap();
        assert_eq!(out.recv().await.unwrap().kind, UpdateKind::Trade);

        tokio_test::assert_ok!(router.shutdown().await);
        assert!(lanes.is_empty());

        // Pending flash was cancelled and every egress sender is gone
        assert!(out.recv().await.is_none());
        assert!(tx.send(trade_update(btc_usd(), "2")).await.is_err());
    }
}
