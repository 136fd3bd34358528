use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local counters shared by the writer and both stores.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    artifacts_written: AtomicU64,
    cas_created: AtomicU64,
    leaves_issued: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreMetricsSnapshot {
    pub artifacts_written: u64,
    pub cas_created: u64,
    pub leaves_issued: u64,
}

impl StoreMetrics {
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            artifacts_written: self.artifacts_written.load(Ordering::Relaxed),
            cas_created: self.cas_created.load(Ordering::Relaxed),
            leaves_issued: self.leaves_issued.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_artifact_written(&self) {
        self.artifacts_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ca_created(&self) {
        self.cas_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_leaf_issued(&self) {
        self.leaves_issued.fetch_add(1, Ordering::Relaxed);
    }
}
