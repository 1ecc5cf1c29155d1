use crate::conf::Conf;
use crate::marker::{MarkerRepository, SeverityMarker};
use crate::viewport::{Viewport, ViewportChangeGate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Trailing-debounce wrapper around the marker fetch.
///
/// The UI region-change stream can fire dozens of events during a drag
/// gesture. Each authorized event replaces the pending timer, so only the
/// last viewport of a burst reaches the repository. Events the gate declines
/// don't even start a timer.
pub struct DebouncedFetchScheduler<R: MarkerRepository + Send + Sync + 'static> {
    inner: Arc<Inner<R>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<R> {
    repo: R,
    gate: Mutex<ViewportChangeGate>,
    markers: Mutex<Vec<SeverityMarker>>,
    // Sequence number of the most recently issued request. Responses carrying
    // an older number are stale and must not touch the cache.
    issued: AtomicU64,
    debounce: Duration,
    keep_gate_on_failure: bool,
}

impl<R: MarkerRepository + Send + Sync + 'static> DebouncedFetchScheduler<R> {
    pub fn new(repo: R, conf: &Conf) -> Self {
        DebouncedFetchScheduler {
            inner: Arc::new(Inner {
                repo,
                gate: Mutex::new(ViewportChangeGate::new(conf)),
                markers: Mutex::new(vec![]),
                issued: AtomicU64::new(0),
                debounce: Duration::from_millis(conf.debounce_ms),
                keep_gate_on_failure: conf.keep_gate_on_fetch_failure,
            }),
            pending: Mutex::new(None),
        }
    }

    /// Feed one region-change event. Must be called from within a tokio
    /// runtime, in event arrival order.
    pub fn viewport_changed(&self, viewport: Viewport) {
        if !self.inner.gate.lock().unwrap().should_fetch(&viewport) {
            debug!("Viewport movement below fetch thresholds, skipping");
            // The burst's last viewport wins even when it warrants no fetch:
            // a timer left over from an earlier event must not fire.
            if let Some(previous) = self.pending.lock().unwrap().take() {
                previous.abort();
            }
            return;
        }
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.fetch(viewport).await;
        });
        if let Some(previous) = self.pending.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Snapshot of the marker cache, replaced wholesale on every successful
    /// fetch.
    pub fn markers(&self) -> Vec<SeverityMarker> {
        self.inner.markers.lock().unwrap().clone()
    }

    /// Forces a refetch on the next movement, whatever the gate remembers.
    pub fn clear_gate(&self) {
        self.inner.gate.lock().unwrap().clear();
    }
}

impl<R> Inner<R>
where
    R: MarkerRepository + Send + Sync + 'static,
{
    async fn fetch(&self, viewport: Viewport) {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        // Record the viewport that triggered the fetch, not whatever is
        // current when the response lands.
        self.gate.lock().unwrap().record_fetched(viewport);
        match self.repo.fetch_severity_markers(viewport.bounding_box()).await {
            Ok(markers) => {
                if self.issued.load(Ordering::SeqCst) != seq {
                    debug!(seq, "Dropping stale marker response");
                    return;
                }
                *self.markers.lock().unwrap() = markers;
            }
            Err(e) => {
                // Cached markers stay in place on failure.
                warn!(seq, error = %e, "Marker fetch failed");
                if !self.keep_gate_on_failure && self.issued.load(Ordering::SeqCst) == seq {
                    self.gate.lock().unwrap().clear();
                }
            }
        }
    }
}

impl<R: MarkerRepository + Send + Sync + 'static> Drop for DebouncedFetchScheduler<R> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            pending.abort();
        }
    }
}
