//! Fragment collector.
//!
//! Bootstrapping fetches and persists the sync record (fatal on failure) and
//! the one-time `start` payload (best effort). The steady-state loop then
//! issues a `full` and a `delta` fetch for the cursor once per keyframe
//! interval and advances the cursor, whatever the fetches end up doing.
//! Fetches run as independent tasks; the cadence never waits for them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use pc_core::sync::DEFAULT_KEYFRAME_INTERVAL_SECS;
use pc_core::{Error, FragmentKey, FragmentType, Result, SyncRecord};
use pc_store::FragmentStore;

use crate::Upstream;

// ---------------------------------------------------------------------------
// Single fragment
// ---------------------------------------------------------------------------

/// Fetch one fragment (retrying once on a transport failure) and store it.
///
/// A stored `full` fragment also advances the store's current pointer. The
/// returned error is the classification of the final attempt.
pub async fn collect_fragment(
    upstream: &dyn Upstream,
    store: &dyn FragmentStore,
    key: FragmentKey,
) -> Result<()> {
    let payload = fetch_with_retry(upstream, key).await?;
    store.put(key, payload).await?;
    if key.kind == FragmentType::Full {
        store.set_current(key.number).await?;
    }
    Ok(())
}

async fn fetch_with_retry(upstream: &dyn Upstream, key: FragmentKey) -> Result<Bytes> {
    match upstream.fetch_fragment(key).await {
        Err(e) if e.is_retryable() => {
            tracing::debug!(fragment = %key, error = %e, "Fetch failed, retrying once");
            upstream.fetch_fragment(key).await
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running totals of fragment outcomes.
#[derive(Debug, Default)]
pub struct CollectorStats {
    stored: AtomicU64,
    abandoned: AtomicU64,
    deltas_stored: AtomicU64,
}

impl CollectorStats {
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn deltas_stored(&self) -> u64 {
        self.deltas_stored.load(Ordering::Relaxed)
    }

    /// Record an outcome; returns the delta count after a stored delta.
    fn record(&self, key: FragmentKey, result: &Result<()>) -> Option<u64> {
        match result {
            Ok(()) => {
                self.stored.fetch_add(1, Ordering::Relaxed);
                (key.kind == FragmentType::Delta)
                    .then(|| self.deltas_stored.fetch_add(1, Ordering::Relaxed) + 1)
            }
            Err(_) => {
                self.abandoned.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

fn log_outcome(key: FragmentKey, result: &Result<()>) {
    match result {
        Ok(()) => tracing::debug!(fragment = key.number, kind = %key.kind, "Fragment stored"),
        Err(e @ Error::UpstreamRejection { status, .. }) => tracing::warn!(
            fragment = key.number,
            kind = %key.kind,
            status = *status,
            "Fragment rejected by upstream: {e}"
        ),
        Err(e @ Error::TransientFetch { .. }) => tracing::warn!(
            fragment = key.number,
            kind = %key.kind,
            "Fragment dropped after retry: {e}"
        ),
        Err(e) => tracing::error!(
            fragment = key.number,
            kind = %key.kind,
            error_kind = e.kind(),
            "Fragment not stored: {e}"
        ),
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Steady-state collector. Obtained from [`Collector::bootstrap`].
pub struct Collector {
    upstream: Arc<dyn Upstream>,
    store: Arc<dyn FragmentStore>,
    sync: SyncRecord,
    /// Next fragment number to fetch.
    cursor: u64,
    cadence: Duration,
    ready_after: Option<u64>,
    stats: Arc<CollectorStats>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Collector {
    /// Fetch and persist the sync record, then the `start` payload.
    ///
    /// Any failure to obtain or persist the sync record is
    /// [`Error::FatalBootstrap`]; a failed `start` fetch is only logged.
    pub async fn bootstrap(
        upstream: Arc<dyn Upstream>,
        store: Arc<dyn FragmentStore>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        tracing::info!("Trying to load stream sync data");

        let sync = upstream
            .fetch_sync()
            .await
            .map_err(|e| Error::FatalBootstrap(format!("sync fetch failed: {e}")))?;
        let cursor = sync
            .first_fragment()
            .map_err(|e| Error::FatalBootstrap(e.to_string()))?;
        store
            .put_sync(&sync)
            .await
            .map_err(|e| Error::FatalBootstrap(format!("cannot persist sync record: {e}")))?;

        let cadence = if sync.keyframe_interval == 0 {
            tracing::warn!(
                interval_secs = DEFAULT_KEYFRAME_INTERVAL_SECS,
                "Upstream reported a zero keyframe interval, using the default"
            );
            Duration::from_secs(DEFAULT_KEYFRAME_INTERVAL_SECS)
        } else {
            sync.cadence()
        };

        tracing::info!(
            fragment = sync.fragment,
            tick = sync.tick,
            tps = sync.tps,
            keyframe_interval = sync.keyframe_interval,
            signup_fragment = sync.signup_fragment,
            "Sync data loaded"
        );

        match sync.start_fragment() {
            Ok(number) => {
                let key = FragmentKey::start(number);
                if let Err(e) = collect_fragment(upstream.as_ref(), store.as_ref(), key).await {
                    tracing::warn!(fragment = number, "START fragment not stored: {e}");
                }
            }
            Err(e) => tracing::warn!("Skipping START fragment: {e}"),
        }

        Ok(Self {
            upstream,
            store,
            sync,
            cursor,
            cadence,
            ready_after: None,
            stats: Arc::new(CollectorStats::default()),
            tracker: TaskTracker::new(),
            cancel,
        })
    }

    /// Log once when this many delta fragments have been stored.
    pub fn with_ready_threshold(mut self, fragments: u64) -> Self {
        self.ready_after = (fragments > 0).then_some(fragments);
        self
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn sync(&self) -> &SyncRecord {
        &self.sync
    }

    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// One cadence step: issue `full` then `delta` for the cursor and advance
    /// it by one.
    ///
    /// Once cancelled nothing is issued and the cursor stays put.
    ///
    /// The returned handles resolve when the fetches finish; dropping them
    /// leaves the fetches running.
    pub fn tick(&mut self) -> Vec<JoinHandle<Result<()>>> {
        let number = self.cursor;
        let mut issued = Vec::with_capacity(2);
        for kind in [FragmentType::Full, FragmentType::Delta] {
            if self.cancel.is_cancelled() {
                break;
            }
            issued.push(self.spawn_collect(FragmentKey::new(number, kind)));
        }
        if !issued.is_empty() {
            self.cursor += 1;
        }
        issued
    }

    fn spawn_collect(&self, key: FragmentKey) -> JoinHandle<Result<()>> {
        let upstream = Arc::clone(&self.upstream);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let ready_after = self.ready_after;

        self.tracker.spawn(async move {
            let result = collect_fragment(upstream.as_ref(), store.as_ref(), key).await;
            log_outcome(key, &result);
            if let (Some(count), Some(ready)) = (stats.record(key, &result), ready_after) {
                if count == ready {
                    tracing::info!(fragments = ready, "[READY] Delay buffer is full");
                }
            }
            result
        })
    }

    /// Poll until cancelled, then wait for in-flight fetches to finish.
    pub async fn run(mut self) {
        tracing::info!(
            fragment = self.cursor,
            cadence_secs = self.cadence.as_secs(),
            "Collector started"
        );

        let mut cadence = tokio::time::interval(self.cadence);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = cadence.tick() => {}
            }

            drop(self.tick());
        }

        self.tracker.close();
        self.tracker.wait().await;

        tracing::info!(
            next_fragment = self.cursor,
            stored = self.stats.stored(),
            abandoned = self.stats.abandoned(),
            "Collector stopped"
        );
    }
}
