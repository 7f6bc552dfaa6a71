//! Trade history router
//!
//! Filters a trade stream down to the one pair shown in the history list,
//! forwards trades newer than the high-water mark and, for every forwarded
//! trade, schedules its own highlight-clear after a fixed delay.
//!
//! The mark is fixed when the router starts. Trades replayed after a
//! reconnect with lower ids are dropped; moving the mark requires a restart.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tracing::Level;

use crate::core::{HistoryUpdMsg, Pair, Trade};
use crate::infrastructure::config::RouterConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::{Result, RouterError};

/// Decision for an incoming trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    /// Trade for a pair other than the tracked one
    OtherPair,
    /// Id at or below the high-water mark
    Stale,
}

/// Pair and id filter applied to every incoming trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFilter {
    pair: Pair,
    high_water_mark: u64,
}

impl HistoryFilter {
    pub fn new(pair: Pair, high_water_mark: u64) -> Self {
        Self {
            pair,
            high_water_mark,
        }
    }

    #[inline]
    pub fn check(&self, trade: &Trade) -> Verdict {
        if trade.pair != self.pair {
            Verdict::OtherPair
        } else if trade.id <= self.high_water_mark {
            Verdict::Stale
        } else {
            Verdict::Forward
        }
    }

    #[inline]
    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    #[inline]
    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }
}

/// Routes trades for one pair to the history list
pub struct HistoryRouter {
    filter: HistoryFilter,
    inbound: mpsc::Sender<Trade>,
    outbound: Mutex<Option<mpsc::Receiver<HistoryUpdMsg>>>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HistoryRouter {
    /// Start routing trades for `pair` with ids above `high_water_mark`
    ///
    /// `high_water_mark` is normally the newest trade id the consumer
    /// already displays. Must be called from within a Tokio runtime.
    pub fn start(
        pair: Pair,
        high_water_mark: u64,
        config: &RouterConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        config.validate()?;

        let (inbound, inbound_rx) = mpsc::channel(config.queue_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown, shutdown_rx) = oneshot::channel();

        let filter = HistoryFilter::new(pair, high_water_mark);

        crate::log_history!(
            Level::INFO,
            pair = %filter.pair(),
            high_water_mark,
            "history router started"
        );

        let task = tokio::spawn(route_history(
            filter.clone(),
            inbound_rx,
            shutdown_rx,
            outbound_tx,
            config.highlight_delay(),
            metrics,
        ));

        Ok(Self {
            filter,
            inbound,
            outbound: Mutex::new(Some(outbound_rx)),
            shutdown,
            task,
        })
    }

    /// Inbound trade sender and the outbound receiver
    ///
    /// # Errors
    /// Returns `RouterError::OutboundTaken` once the receiver was handed out.
    pub fn channels(&self) -> Result<(mpsc::Sender<Trade>, mpsc::Receiver<HistoryUpdMsg>)> {
        Ok((self.inbound(), self.take_outbound()?))
    }

    pub fn inbound(&self) -> mpsc::Sender<Trade> {
        self.inbound.clone()
    }

    /// Outbound history updates; handed out once
    pub fn take_outbound(&self) -> Result<mpsc::Receiver<HistoryUpdMsg>> {
        self.outbound.lock().take().ok_or(RouterError::OutboundTaken)
    }

    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    /// Stop routing
    ///
    /// No trade is processed once this returns. Highlight clears still
    /// pending are cancelled.
    pub async fn shutdown(self) -> Result<()> {
        // Err means the task already exited
        let _ = self.shutdown.send(());
        self.task.await?;
        crate::log_history!(Level::INFO, pair = %self.filter.pair(), "history router stopped");
        Ok(())
    }
}

async fn route_history(
    filter: HistoryFilter,
    mut inbound: mpsc::Receiver<Trade>,
    mut shutdown: oneshot::Receiver<()>,
    out: mpsc::Sender<HistoryUpdMsg>,
    delay: Duration,
    metrics: Arc<MetricsCollector>,
) {
    // One short-lived task per forwarded trade
    let mut pending = JoinSet::new();

    loop {
        let trade = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            Some(res) = pending.join_next(), if !pending.is_empty() => {
                if let Err(e) = res {
                    crate::log_history!(Level::WARN, "highlight task failed: {}", e);
                }
                continue;
            }
            trade = inbound.recv() => match trade {
                Some(trade) => trade,
                None => break,
            },
        };

        match filter.check(&trade) {
            Verdict::OtherPair => {
                metrics.record_history_other_pair();
            }
            Verdict::Stale => {
                metrics.record_history_stale();
                crate::log_history!(
                    Level::DEBUG,
                    id = trade.id,
                    high_water_mark = filter.high_water_mark(),
                    "dropping stale trade"
                );
            }
            Verdict::Forward => {
                let id = trade.id;
                let delivered = tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    res = out.send(HistoryUpdMsg::trade(trade)) => res.is_ok(),
                };
                if !delivered {
                    crate::log_history!(Level::WARN, "history consumer gone");
                    break;
                }
                metrics.record_history_forwarded();

                let out = out.clone();
                let metrics = metrics.clone();
                let pair = filter.pair().clone();
                pending.spawn(async move {
                    time::sleep(delay).await;
                    if out.send(HistoryUpdMsg::clear_highlight(pair, id)).await.is_ok() {
                        metrics.record_highlight_clear();
                    }
                });
            }
        }
    }

    pending.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HistoryUpdKind;
    use crate::test_utils::{btc_usd, drain, eth_usd, trade};
    use proptest::prelude::*;
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_millis(400);

    fn start(mark: u64) -> (HistoryRouter, mpsc::Sender<Trade>, mpsc::Receiver<HistoryUpdMsg>) {
        let config = RouterConfig {
            highlight_delay_ms: DELAY.as_millis() as u64,
            ..RouterConfig::default()
        };
        let router =
            HistoryRouter::start(btc_usd(), mark, &config, Arc::new(MetricsCollector::new()))
                .unwrap();
        let (tx, rx) = router.channels().unwrap();
        (router, tx, rx)
    }

    #[test]
    fn test_filter_verdicts() {
        let filter = HistoryFilter::new(btc_usd(), 100);
        assert_eq!(filter.check(&trade(btc_usd(), 99)), Verdict::Stale);
        assert_eq!(filter.check(&trade(btc_usd(), 100)), Verdict::Stale);
        assert_eq!(filter.check(&trade(btc_usd(), 101)), Verdict::Forward);
        assert_eq!(filter.check(&trade(eth_usd(), 101)), Verdict::OtherPair);
    }

    proptest! {
        #[test]
        fn prop_never_forwards_at_or_below_mark(mark in any::<u64>(), id in any::<u64>()) {
            let filter = HistoryFilter::new(btc_usd(), mark);
            let verdict = filter.check(&trade(btc_usd(), id));
            prop_assert_eq!(verdict == Verdict::Forward, id > mark);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_above_mark_with_highlight_clear() {
        let (router, tx, mut rx) = start(100);
        let start = Instant::now();

        for id in [99, 100, 101, 102] {
            tx.send(trade(btc_usd(), id)).await.unwrap();
        }

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, HistoryUpdKind::HistoryUpd);
        assert_eq!(first.trade.id, 101);
        assert_eq!(second.kind, HistoryUpdKind::HistoryUpd);
        assert_eq!(second.trade.id, 102);
        assert!(start.elapsed() < DELAY);

        let mut cleared = Vec::new();
        for _ in 0..2 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.kind, HistoryUpdKind::HistoryHighlightUpd);
            assert!(start.elapsed() >= DELAY);
            cleared.push(msg.trade.id);
        }
        cleared.sort_unstable();
        assert_eq!(cleared, vec![101, 102]);

        time::sleep(DELAY * 2).await;
        assert!(drain(&mut rx).is_empty());

        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_pair_discarded() {
        let (router, tx, mut rx) = start(0);

        tx.send(trade(eth_usd(), 5)).await.unwrap();
        time::sleep(DELAY * 2).await;

        assert!(drain(&mut rx).is_empty());
        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_trade_gets_own_clear() {
        let (router, tx, mut rx) = start(0);

        // Trades spread over less than one delay; clears are not merged
        for id in 1..=5 {
            tx.send(trade(btc_usd(), id)).await.unwrap();
            time::sleep(Duration::from_millis(50)).await;
        }
        time::sleep(DELAY * 2).await;

        let msgs = drain(&mut rx);
        let forwarded: Vec<u64> = msgs
            .iter()
            .filter(|m| m.kind == HistoryUpdKind::HistoryUpd)
            .map(|m| m.trade.id)
            .collect();
        let cleared: Vec<u64> = msgs
            .iter()
            .filter(|m| m.kind == HistoryUpdKind::HistoryHighlightUpd)
            .map(|m| m.trade.id)
            .collect();
        assert_eq!(forwarded, vec![1, 2, 3, 4, 5]);
        assert_eq!(cleared, vec![1, 2, 3, 4, 5]);

        router.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_outbound_taken_once() {
        let (router, _tx, _rx) = start(0);
        assert!(matches!(router.channels(), Err(RouterError::OutboundTaken)));
        router.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_processing() {
        let (router, tx, mut rx) = start(0);

        tx.send(trade(btc_usd(), 1)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, HistoryUpdKind::HistoryUpd);

        tokio_test::assert_ok!(router.shutdown().await);

        assert!(tx.send(trade(btc_usd(), 2)).await.is_err());
        // Pending clear was cancelled along with the router
        assert!(rx.recv().await.is_none());
    }
}
