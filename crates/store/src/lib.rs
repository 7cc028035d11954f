//! Vigil store: holds the last fetched result set and summary as one
//! immutable snapshot, swapped atomically on every successful fetch.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::debug;
use vigil_core::{AnalysisResult, ResultSnapshot, Summary};

/// Versioned snapshot holder. Readers never block; `replace` is a full swap.
pub struct ResultStore {
    snap: ArcSwap<ResultSnapshot>,
    version_tx: watch::Sender<u64>,
}

impl Default for ResultStore {
    fn default() -> Self { Self::new() }
}

impl ResultStore {
    pub fn new() -> Self {
        let (version_tx, _rx) = watch::channel(0u64);
        Self { snap: ArcSwap::from_pointee(ResultSnapshot::default()), version_tx }
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<ResultSnapshot> { self.snap.load_full() }

    pub fn version(&self) -> u64 { self.snap.load().version }

    /// Receiver that observes every published version.
    pub fn subscribe_version(&self) -> watch::Receiver<u64> { self.version_tx.subscribe() }

    /// Replace the whole result set and summary, returning the new version.
    ///
    /// Writers are serialized by the version channel, so a version is never
    /// published ahead of its snapshot.
    pub fn replace(&self, results: Vec<AnalysisResult>, summary: Summary) -> u64 {
        let mut published = 0u64;
        self.version_tx.send_modify(|v| {
            let next = v.saturating_add(1);
            let items = results.len();
            self.snap.store(Arc::new(ResultSnapshot::new(next, results, summary)));
            *v = next;
            published = next;
            metrics::gauge!("results_store_items", items as f64);
            debug!(version = next, items, "store: snapshot replaced");
        });
        metrics::counter!("results_store_replacements_total", 1u64);
        published
    }
}
