use crate::snapshot::{Snapshot, SnapshotRef};
use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    #[error("No metrics have been sampled yet")]
    NoDataYet,
}

/// A reference-counted reference to a [`MetricCache`].
pub type MetricCacheRef = Arc<MetricCache>;

/// Holds the latest [`Snapshot`].
///
/// The sampler is the only writer; any number of readers may call [`MetricCache::read`]
/// concurrently. The lock only guards an `Arc` swap or clone, so a reader either sees the
/// previous snapshot or the new one, never a mix of both.
#[derive(Default)]
pub struct MetricCache {
    latest: RwLock<Option<SnapshotRef>>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `snapshot` as the latest one and returns the shared handle to it.
    pub fn replace(&self, snapshot: Snapshot) -> SnapshotRef {
        let snapshot = Arc::new(snapshot);
        *self.latest.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn read(&self) -> Result<SnapshotRef, CacheError> {
        self.latest.read().clone().ok_or(CacheError::NoDataYet)
    }

    pub fn is_empty(&self) -> bool {
        self.latest.read().is_none()
    }
}

impl fmt::Debug for MetricCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCache")
            .field("cycle", &self.latest.read().as_ref().map(|s| s.cycle()))
            .finish()
    }
}
