//! Refresh coordinator: owns the fetch lifecycle for the result store.
//!
//! At most one fetch is in flight unless a caller explicitly supersedes it
//! (`fetch_superseding`, used when the result limit changes). Every fetch
//! carries a sequence number; only the most recently issued one may write
//! to the store. Fetches run as their own tasks, so cancelling a waiter or
//! the auto-refresh timer never cancels the request itself.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vigil_api::{ApiError, MonitorApi};
use vigil_store::ResultStore;

use crate::schedule::{self, CancelHandle};

/// Lower bound for the auto-refresh period.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The store now holds this fetch's data at `version`.
    Applied { version: u64 },
    /// A newer fetch was issued before this one completed; its data was dropped.
    Stale { seq: u64 },
    Failed(ApiError),
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool { matches!(self, FetchOutcome::Applied { .. }) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
}

/// Observable coordinator state for front ends.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RefreshStatus {
    pub phase: Phase,
    /// Set by a failed current fetch; cleared by the next successful one.
    pub last_error: Option<String>,
    pub version: u64,
    pub auto_refresh: Option<Duration>,
    pub last_success: Option<DateTime<Utc>>,
}

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Default)]
struct FetchState {
    issued: u64,
    in_flight: Option<(u64, SharedFetch)>,
}

struct Inner {
    api: Arc<dyn MonitorApi>,
    store: Arc<ResultStore>,
    limit: AtomicUsize,
    state: Mutex<FetchState>,
    auto: Mutex<Option<CancelHandle>>,
    status_tx: watch::Sender<RefreshStatus>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|p| p.into_inner()) }

/// Cheap to clone; clones share one coordinator.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(api: Arc<dyn MonitorApi>, store: Arc<ResultStore>, limit: usize) -> Self {
        let (status_tx, _rx) = watch::channel(RefreshStatus { version: store.version(), ..Default::default() });
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                limit: AtomicUsize::new(limit.max(1)),
                state: Mutex::new(FetchState::default()),
                auto: Mutex::new(None),
                status_tx,
            }),
        }
    }

    pub fn store(&self) -> &Arc<ResultStore> { &self.inner.store }

    pub fn limit(&self) -> usize { self.inner.limit.load(Ordering::Relaxed) }

    pub fn status(&self) -> RefreshStatus { self.inner.status_tx.borrow().clone() }

    pub fn subscribe_status(&self) -> watch::Receiver<RefreshStatus> { self.inner.status_tx.subscribe() }

    /// Fetch results and summary. Joins the in-flight fetch if there is one.
    pub async fn fetch_now(&self) -> FetchOutcome {
        let fut = {
            let mut st = lock(&self.inner.state);
            match st.in_flight.as_ref().map(|(seq, fut)| (*seq, fut.clone())) {
                Some((seq, fut)) => {
                    metrics::counter!("refresh_coalesced_total", 1u64);
                    debug!(seq, "refresh: coalesced");
                    fut
                }
                None => Inner::start(&self.inner, &mut st),
            }
        };
        fut.await
    }

    /// Issue a new fetch even if one is in flight; the older one turns stale.
    pub async fn fetch_superseding(&self) -> FetchOutcome {
        let fut = {
            let mut st = lock(&self.inner.state);
            if let Some((seq, _)) = &st.in_flight {
                debug!(superseded = *seq, "refresh: superseding in-flight fetch");
            }
            Inner::start(&self.inner, &mut st)
        };
        fut.await
    }

    /// Change the result limit and refetch with it.
    pub async fn set_limit(&self, limit: usize) -> FetchOutcome {
        let limit = limit.max(1);
        let prev = self.inner.limit.swap(limit, Ordering::Relaxed);
        info!(prev, limit, "refresh: limit changed");
        self.fetch_superseding().await
    }

    /// Start or stop periodic fetching. Stopping cancels the pending tick
    /// immediately but leaves a fetch already in flight to complete. Starting
    /// schedules the first tick one full interval from now.
    pub fn set_auto_refresh(&self, enabled: bool, interval: Duration) {
        let mut auto = lock(&self.inner.auto);
        if let Some(h) = auto.take() {
            h.cancel();
        }
        let interval = interval.max(MIN_INTERVAL);
        if enabled {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            *auto = Some(schedule::every(interval, move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else { return false };
                    RefreshCoordinator { inner }.fetch_now().await;
                    true
                }
            }));
            info!(interval_ms = interval.as_millis() as u64, "refresh: auto-refresh on");
        } else {
            info!("refresh: auto-refresh off");
        }
        self.inner.status_tx.send_modify(|s| s.auto_refresh = enabled.then_some(interval));
    }

    pub fn auto_refresh(&self) -> Option<Duration> { self.inner.status_tx.borrow().auto_refresh }
}

impl Inner {
    /// Issue fetch `issued + 1` and record it as the in-flight one.
    fn start(this: &Arc<Inner>, st: &mut FetchState) -> SharedFetch {
        st.issued += 1;
        let seq = st.issued;
        let limit = this.limit.load(Ordering::Relaxed);
        debug!(seq, limit, "refresh: fetch start");
        let task = tokio::spawn(Inner::run(this.clone(), seq, limit));
        let fut = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => FetchOutcome::Failed(ApiError::Transport(format!("fetch task ended: {}", e))),
            }
        }
        .boxed()
        .shared();
        st.in_flight = Some((seq, fut.clone()));
        this.status_tx.send_modify(|s| s.phase = Phase::Fetching);
        fut
    }

    async fn run(this: Arc<Inner>, seq: u64, limit: usize) -> FetchOutcome {
        let mut guard = Unsettled { inner: this.clone(), seq, armed: true };
        let started = Instant::now();
        let fetched = tokio::try_join!(this.api.results(limit), this.api.summary());
        let took_ms = started.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("refresh_fetch_ms", took_ms);

        let mut st = lock(&this.state);
        let current = st.issued == seq;
        if matches!(&st.in_flight, Some((s, _)) if *s == seq) {
            st.in_flight = None;
        }
        let idle = st.in_flight.is_none();

        let outcome = match fetched {
            _ if !current => {
                debug!(seq, latest = st.issued, "refresh: stale response discarded");
                FetchOutcome::Stale { seq }
            }
            Ok((results, summary)) => {
                let items = results.len();
                // store write stays under the state lock so a newer fetch cannot land first
                let version = this.store.replace(results, summary);
                info!(seq, version, items, took_ms = took_ms as u64, "refresh: fetch ok");
                FetchOutcome::Applied { version }
            }
            Err(e) => {
                warn!(seq, error = %e, took_ms = took_ms as u64, "refresh: fetch failed");
                FetchOutcome::Failed(e)
            }
        };
        let label = match &outcome {
            FetchOutcome::Applied { .. } => "applied",
            FetchOutcome::Stale { .. } => "stale",
            FetchOutcome::Failed(_) => "failed",
        };
        metrics::counter!("refresh_fetches_total", 1u64, "outcome" => label);

        // published under the state lock so phase changes keep issue order
        this.status_tx.send_modify(|s| {
            if idle {
                s.phase = Phase::Idle;
            }
            match &outcome {
                FetchOutcome::Applied { version } => {
                    s.version = *version;
                    s.last_error = None;
                    s.last_success = Some(Utc::now());
                }
                FetchOutcome::Failed(e) => s.last_error = Some(e.to_string()),
                FetchOutcome::Stale { .. } => {}
            }
        });
        guard.armed = false;
        drop(st);
        outcome
    }

    /// Clean-up for a fetch task that panicked or was aborted before settling.
    fn abandon(&self, seq: u64) {
        let mut st = lock(&self.state);
        let current = st.issued == seq;
        if matches!(&st.in_flight, Some((s, _)) if *s == seq) {
            st.in_flight = None;
        }
        let idle = st.in_flight.is_none();
        warn!(seq, current, "refresh: fetch task ended without a response");
        metrics::counter!("refresh_fetches_total", 1u64, "outcome" => "failed");
        self.status_tx.send_modify(|s| {
            if idle {
                s.phase = Phase::Idle;
            }
            if current {
                s.last_error = Some(format!("fetch {} ended without a response", seq));
            }
        });
    }
}

/// Settles the fetch state if the task is dropped mid-fetch.
struct Unsettled {
    inner: Arc<Inner>,
    seq: u64,
    armed: bool,
}

impl Drop for Unsettled {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon(self.seq);
        }
    }
}
