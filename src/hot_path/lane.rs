//! Per-pair debounce lane
//!
//! Each tracked pair gets its own task, queue and single-shot timer. A trade
//! re-arms the timer; when the timer runs out without a newer trade the lane
//! emits a Flash so the consumer can clear the pair's highlight.
//!
//! ```text
//! Idle --Trade--> Armed --Trade--> Armed --timer (window elapsed)--> Idle + Flash
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::Level;

use crate::core::{Pair, UpdateKind, UpdateMsg};
use crate::infrastructure::metrics::MetricsCollector;

/// Debounce timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    /// Timer disarmed, no highlight pending
    Idle,
    /// Timer running since the last trade
    Armed,
}

/// What to do with a timer firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Window elapsed since the last trade
    Flash,
    /// A newer trade moved the deadline; wait until `rearm_at`
    Stale { rearm_at: Instant },
}

/// Debounce bookkeeping for one lane
///
/// Owned by the lane task only.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last_trade: Option<Instant>,
    state: LaneState,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_trade: None,
            state: LaneState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> LaneState {
        self.state
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.state == LaneState::Armed
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a trade seen at `now` and return the new timer deadline
    pub fn on_trade(&mut self, now: Instant) -> Instant {
        self.last_trade = Some(now);
        self.state = LaneState::Armed;
        now + self.window
    }

    /// Decide whether a firing at `fired_at` may emit a Flash
    ///
    /// A firing can race with a reset and arrive before the window since the
    /// latest trade has elapsed. Such a firing is stale: the lane stays armed
    /// until the deadline derived from the latest trade.
    pub fn on_timer(&mut self, fired_at: Instant) -> TimerOutcome {
        match self.last_trade {
            Some(last) if fired_at.saturating_duration_since(last) < self.window => {
                TimerOutcome::Stale {
                    rearm_at: last + self.window,
                }
            }
            _ => {
                self.state = LaneState::Idle;
                TimerOutcome::Flash
            }
        }
    }
}

/// Router-side handle to a running lane
pub(crate) struct LaneHandle {
    tx: mpsc::Sender<UpdateMsg>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LaneHandle {
    /// Spawn the lane task for `pair`
    pub(crate) fn spawn(
        pair: Pair,
        window: Duration,
        capacity: usize,
        out: mpsc::Sender<UpdateMsg>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_lane(
            pair,
            Debounce::new(window),
            rx,
            shutdown_rx,
            out,
            metrics,
        ));

        Self { tx, shutdown, task }
    }

    /// Write side of the lane queue
    #[inline]
    pub(crate) fn sender(&self) -> mpsc::Sender<UpdateMsg> {
        self.tx.clone()
    }

    /// Signal the lane to stop
    ///
    /// The returned handle resolves once the task has exited. Messages still
    /// queued to the lane are discarded.
    pub(crate) fn stop(self) -> JoinHandle<()> {
        // Err means the lane already exited
        let _ = self.shutdown.send(());
        self.task
    }
}

async fn run_lane(
    pair: Pair,
    mut debounce: Debounce,
    mut rx: mpsc::Receiver<UpdateMsg>,
    mut shutdown: oneshot::Receiver<()>,
    out: mpsc::Sender<UpdateMsg>,
    metrics: Arc<MetricsCollector>,
) {
    crate::log_router!(Level::DEBUG, pair = %pair, "lane started");

    // Only polled while armed
    let timer = time::sleep(debounce.window());
    tokio::pin!(timer);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            () = &mut timer, if debounce.is_armed() => {
                match debounce.on_timer(Instant::now()) {
                    TimerOutcome::Flash => {
                        metrics.record_flash();
                        crate::log_router!(Level::TRACE, pair = %pair, "flash");
                        if !emit(&out, UpdateMsg::flash(pair.clone()), &mut shutdown).await {
                            break;
                        }
                    }
                    TimerOutcome::Stale { rearm_at } => {
                        metrics.record_stale_firing();
                        crate::log_router!(Level::DEBUG, pair = %pair, "stale timer firing ignored");
                        timer.as_mut().reset(rearm_at);
                    }
                }
            }

            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                match msg.kind {
                    UpdateKind::Trade => {
                        let deadline = debounce.on_trade(Instant::now());
                        timer.as_mut().reset(deadline);
                        metrics.record_trade();
                        if !emit(&out, msg, &mut shutdown).await {
                            break;
                        }
                    }
                    UpdateKind::Ticker => {
                        metrics.record_ticker();
                        if !emit(&out, msg, &mut shutdown).await {
                            break;
                        }
                    }
                    UpdateKind::Init | UpdateKind::Flash => {
                        // Init is applied by the consumer, Flash is ours to make
                        metrics.record_ignored_kind();
                        crate::log_router!(Level::DEBUG, pair = %pair, kind = ?msg.kind, "ignoring producer update");
                    }
                }
            }
        }
    }

    // Dropping the pinned timer cancels any pending deadline
    crate::log_router!(Level::DEBUG, pair = %pair, "lane stopped");
}

/// Push `msg` to the egress queue, giving up if shutdown arrives first
///
/// Returns false when the lane should exit.
async fn emit(
    out: &mpsc::Sender<UpdateMsg>,
    msg: UpdateMsg,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown => false,
        res = out.send(msg) => res.is_ok(),
    }
}
