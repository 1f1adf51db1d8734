//! Retention sweeper: periodically deletes pastes past their TTL.
//!
//! The sweeper walks every metadata document, deletes both objects for each
//! expired entry, and then waits for the next tick. State changes and the
//! report of each pass are published on `watch` channels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::{PasteStore, Visit};

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// The configured interval clamped to `[1s, 24h]`.
fn effective_interval(configured: Duration) -> Duration {
    if configured < MIN_INTERVAL {
        warn!(interval = ?configured, "cleanup interval too small, using 1s");
        MIN_INTERVAL
    } else if configured > MAX_INTERVAL {
        warn!(interval = ?configured, "cleanup interval too large, using 24h");
        MAX_INTERVAL
    } else {
        configured
    }
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between the start of consecutive passes.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Sweeping,
    Idle,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    /// Enumeration failed; the pass ended early.
    Aborted(String),
    Cancelled,
}

/// Counters for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
    pub outcome: SweepOutcome,
}

pub struct Sweeper {
    store: PasteStore,
    config: SweeperConfig,
    state: watch::Sender<SweepState>,
    report: watch::Sender<Option<SweepReport>>,
}

impl Sweeper {
    pub fn new(store: PasteStore, config: SweeperConfig) -> Self {
        let (state, _) = watch::channel(SweepState::Sweeping);
        let (report, _) = watch::channel(None);
        Self {
            store,
            config,
            state,
            report,
        }
    }

    pub fn state(&self) -> SweepState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SweepState> {
        self.state.subscribe()
    }

    /// Watch the report of the most recent pass.
    pub fn reports(&self) -> watch::Receiver<Option<SweepReport>> {
        self.report.subscribe()
    }

    fn transition(&self, next: SweepState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "sweeper state change");
        }
    }

    /// Run a single pass.
    ///
    /// Expiry is judged against one timestamp taken at the start. A failed
    /// delete is counted and the pass moves on; a cancelled one ends it.
    pub async fn sweep_once(&self, cancel: &CancellationToken) -> SweepReport {
        let now = Utc::now();
        let store = &self.store;

        let examined = AtomicUsize::new(0);
        let expired = AtomicUsize::new(0);
        let deleted = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let (examined_n, expired_n, deleted_n, failed_n) = (&examined, &expired, &deleted, &failed);

        let result = store
            .for_each_meta(cancel, move |meta| async move {
                examined_n.fetch_add(1, Ordering::Relaxed);
                if !meta.is_expired_at(now) {
                    return Visit::Continue;
                }
                expired_n.fetch_add(1, Ordering::Relaxed);

                match store.delete(&meta.checksum, cancel).await {
                    Ok(()) => {
                        deleted_n.fetch_add(1, Ordering::Relaxed);
                        info!(checksum = %meta.checksum, expired_at = %meta.expires_at, "deleted expired paste");
                        Visit::Continue
                    }
                    Err(StoreError::Cancelled) => Visit::Stop(StoreError::Cancelled),
                    Err(e) => {
                        failed_n.fetch_add(1, Ordering::Relaxed);
                        warn!(checksum = %meta.checksum, error = %e, "failed to delete expired paste");
                        Visit::Continue
                    }
                }
            })
            .await;

        let outcome = match result {
            Ok(()) => SweepOutcome::Completed,
            Err(StoreError::Cancelled) => SweepOutcome::Cancelled,
            Err(e) => {
                warn!(error = %e, "sweep aborted");
                SweepOutcome::Aborted(e.to_string())
            }
        };

        let report = SweepReport {
            examined: examined.load(Ordering::Relaxed),
            expired: expired.load(Ordering::Relaxed),
            deleted: deleted.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            outcome,
        };
        info!(
            examined = report.examined,
            expired = report.expired,
            deleted = report.deleted,
            failed = report.failed,
            outcome = ?report.outcome,
            "sweep finished"
        );
        self.report.send_replace(Some(report.clone()));
        report
    }

    /// Sweep immediately, then once per interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = effective_interval(self.config.interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?interval, "retention sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.transition(SweepState::Sweeping);
                    let report = self.sweep_once(&cancel).await;
                    if report.outcome == SweepOutcome::Cancelled {
                        break;
                    }
                    self.transition(SweepState::Idle);
                }
            }
        }

        self.transition(SweepState::Stopped);
        info!("retention sweeper stopped");
    }

    /// Run the sweeper on the tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
