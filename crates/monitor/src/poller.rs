//! Periodic, throttled, retrying metrics client.
//!
//! One driver task per running poller performs every fetch, so fetches are
//! strictly serialized:
//!
//! ```text
//! start ──► fetch chain ──► wait for tick | manual refresh ──► fetch chain ...
//!              │
//!              └─ gate ─► GET /metrics ─► ok: Idle
//!                   ▲           │
//!                   │           └─ err: Backoff(n) ─► sleep 2^(n-1)·base ─┐
//!                   └──────────────────────────────────────────────────────┘
//!                               (budget spent: Failed)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cropwatch_api::{ApiError, BackendApi};
use cropwatch_core::{ClientConfig, MetricsSnapshot};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::state::{FetchError, PollPhase, PollerStatus};
use crate::throttle::ThrottleGate;

/// Configuration for the metrics poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between scheduled fetches
    pub poll_interval: Duration,
    /// Minimum spacing between two requests
    pub min_request_spacing: Duration,
    /// Upper bound for one request
    pub request_timeout: Duration,
    /// Retries after a failed attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for PollerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            min_request_spacing: config.min_request_spacing(),
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries,
            base_retry_delay: config.base_retry_delay(),
        }
    }
}

impl PollerConfig {
    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.poll_interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        Ok(())
    }
}

/// Errors raised when building a poller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollerError {
    /// The poll interval is zero
    #[error("poll interval must be positive")]
    ZeroInterval,
}

/// State shared between the poller handle and its driver task.
struct Shared<A> {
    api: A,
    config: PollerConfig,
    gate: ThrottleGate,
    backoff: BackoffPolicy,
    status: watch::Sender<PollerStatus>,
}

/// One `start()`..`stop()` lifetime.
struct Run {
    alive: Arc<AtomicBool>,
    refresh: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// Keeps a fresh [`MetricsSnapshot`] by polling `GET /metrics`.
///
/// Requests are never issued closer than `min_request_spacing` apart,
/// failures are retried with bounded exponential backoff, and the latest
/// snapshot or error is published through [`MetricsPoller::status`] and
/// [`MetricsPoller::subscribe`]. Dropping the poller stops it.
pub struct MetricsPoller<A: BackendApi + 'static> {
    shared: Arc<Shared<A>>,
    run: Mutex<Option<Run>>,
}

impl<A: BackendApi + 'static> MetricsPoller<A> {
    /// Create a stopped poller.
    pub fn new(api: A, config: PollerConfig) -> Result<Self, PollerError> {
        config.validate()?;

        let (status, _) = watch::channel(PollerStatus::default());
        Ok(Self {
            shared: Arc::new(Shared {
                api,
                gate: ThrottleGate::new(config.min_request_spacing),
                backoff: BackoffPolicy::new(config.base_retry_delay, config.max_retries),
                config,
                status,
            }),
            run: Mutex::new(None),
        })
    }

    /// Begin polling: fetch now, then every `poll_interval`. Does nothing if
    /// already running. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("Metrics poller already running");
            return;
        }

        let alive = Arc::new(AtomicBool::new(true));
        let (refresh, refresh_rx) = mpsc::channel(1);
        let driver = Driver {
            shared: self.shared.clone(),
            alive: alive.clone(),
            refresh: refresh_rx,
        };
        let task = tokio::spawn(driver.run());

        *run = Some(Run { alive, refresh, task });
        info!(
            "Metrics poller started (interval {:?}, spacing {:?})",
            self.shared.config.poll_interval, self.shared.config.min_request_spacing
        );
    }

    /// Stop polling. Cancels the cycle, any pending retry and any throttle
    /// wait. Safe to call at any time, any number of times.
    ///
    /// On a current-thread runtime no request is issued after this returns.
    /// On a multi-thread runtime the driver may be running on another worker
    /// and can still send the one request it is about to issue; use
    /// [`MetricsPoller::shutdown`] to wait until the driver has finished.
    pub fn stop(&self) {
        drop(self.halt());
    }

    /// Stop polling and wait for the driver task to finish. Once this
    /// returns, no further request is issued on any runtime flavor.
    pub async fn shutdown(&self) {
        if let Some(task) = self.halt() {
            // A cancelled task reports a JoinError; either way it is gone.
            let _ = task.await;
        }
    }

    /// Signal the current run to end and hand back its task.
    fn halt(&self) -> Option<JoinHandle<()>> {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner).take()?;

        run.alive.store(false, Ordering::SeqCst);
        run.task.abort();

        self.shared.status.send_modify(|s| {
            s.is_retrying = false;
            if matches!(s.phase, PollPhase::Fetching | PollPhase::Backoff(_)) {
                s.phase = PollPhase::Idle;
            }
        });
        info!("Metrics poller stopped");
        Some(run.task)
    }

    /// Fetch now, outside the regular cycle.
    ///
    /// Clears the last error and the retry count first, so a manual refresh
    /// starts with a full retry budget. The request still goes through the
    /// throttle gate. A refresh during a backoff wait cuts the wait short;
    /// refreshes during an in-flight request coalesce into one follow-up
    /// fetch. Returns `false`, doing nothing, when the poller is not running.
    pub fn refresh_now(&self) -> bool {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(run) = run.as_ref().filter(|r| !r.task.is_finished()) else {
            debug!("Refresh requested on a stopped poller");
            return false;
        };

        self.shared.status.send_modify(|s| {
            s.retry_count = 0;
            s.last_error = None;
            s.is_retrying = false;
        });

        // A full channel already carries a pending refresh.
        let _ = run.refresh.try_send(());
        true
    }

    /// Whether the poller is running.
    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Current state.
    pub fn status(&self) -> PollerStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.shared.status.subscribe()
    }

    /// Most recent successful snapshot.
    pub fn latest_snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.shared.status.borrow().latest_snapshot.clone()
    }

    /// Most recent failure.
    pub fn last_error(&self) -> Option<FetchError> {
        self.shared.status.borrow().last_error.clone()
    }

    /// Whether a retry is scheduled.
    pub fn is_retrying(&self) -> bool {
        self.shared.status.borrow().is_retrying
    }

    /// When the request most recently let through the throttle gate was issued.
    pub async fn last_request_instant(&self) -> Option<Instant> {
        self.shared.gate.last_issued().await
    }
}

impl<A: BackendApi + 'static> Drop for MetricsPoller<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How a fetch chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEnd {
    Succeeded,
    Exhausted,
    Cancelled,
}

/// What started a fetch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Start,
    Tick,
    Manual,
}

/// The task behind a running poller.
struct Driver<A> {
    shared: Arc<Shared<A>>,
    alive: Arc<AtomicBool>,
    refresh: mpsc::Receiver<()>,
}

impl<A: BackendApi + 'static> Driver<A> {
    async fn run(mut self) {
        let period = self.shared.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut trigger = Trigger::Start;
        loop {
            if trigger == Trigger::Tick {
                // Each scheduled cycle starts with a full retry budget.
                self.shared.status.send_modify(|s| s.retry_count = 0);
            }
            debug!("Fetch chain triggered by {:?}", trigger);

            if self.fetch_chain().await == ChainEnd::Cancelled {
                return;
            }

            // Ticks that came due during the chain are absorbed.
            ticker.reset();
            trigger = tokio::select! {
                _ = ticker.tick() => Trigger::Tick,
                request = self.refresh.recv() => match request {
                    Some(()) => Trigger::Manual,
                    None => return,
                },
            };
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Fetch until success, budget exhaustion or cancellation.
    async fn fetch_chain(&mut self) -> ChainEnd {
        loop {
            if !self.is_alive() {
                return ChainEnd::Cancelled;
            }
            self.shared.status.send_modify(|s| s.phase = PollPhase::Fetching);

            self.shared.gate.acquire().await;
            if !self.is_alive() {
                return ChainEnd::Cancelled;
            }

            let timeout = self.shared.config.request_timeout;
            let result = match tokio::time::timeout(timeout, self.shared.api.metrics()).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout),
            };
            if !self.is_alive() {
                return ChainEnd::Cancelled;
            }

            let error = match result {
                Ok(snapshot) => {
                    self.record_success(snapshot);
                    return ChainEnd::Succeeded;
                }
                Err(error) => error,
            };

            let Some(delay) = self.record_failure(&error) else {
                return ChainEnd::Exhausted;
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                request = self.refresh.recv() => {
                    if request.is_none() {
                        return ChainEnd::Cancelled;
                    }
                    debug!("Manual refresh cut backoff short");
                }
            }
        }
    }

    fn record_success(&self, snapshot: MetricsSnapshot) {
        debug!("Metrics snapshot received (backend time {})", snapshot.timestamp);
        let snapshot = Arc::new(snapshot);
        self.shared.status.send_modify(|s| {
            s.latest_snapshot = Some(snapshot);
            s.last_error = None;
            s.retry_count = 0;
            s.is_retrying = false;
            s.last_update = Some(chrono::Utc::now());
            s.phase = PollPhase::Idle;
        });
    }

    /// Record a failed attempt; returns the delay before the next retry, or
    /// `None` when the retry budget is spent.
    fn record_failure(&self, error: &ApiError) -> Option<Duration> {
        let backoff = self.shared.backoff;
        let mut delay = None;

        self.shared.status.send_modify(|s| {
            s.last_error = Some(FetchError::from(error));
            match backoff.delay_for(s.retry_count) {
                Some(d) => {
                    s.retry_count += 1;
                    s.is_retrying = true;
                    s.phase = PollPhase::Backoff(s.retry_count);
                    delay = Some(d);
                }
                None => {
                    s.is_retrying = false;
                    s.phase = PollPhase::Failed;
                }
            }
        });

        match delay {
            Some(d) => warn!("Metrics fetch failed: {}; retrying in {:?}", error, d),
            None => warn!(
                "Metrics fetch failed: {}; giving up after {} retries",
                error,
                backoff.max_retries()
            ),
        }
        delay
    }
}
