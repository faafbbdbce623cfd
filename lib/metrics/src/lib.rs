//! Host sampling and the latest-snapshot cache shared by both protocol responders.

pub mod cache;
pub mod collector;
pub mod sampler;
pub mod snapshot;

pub use cache::{CacheError, MetricCache, MetricCacheRef};
pub use sampler::{Sampler, SamplerError, SnapshotSubscriber};
pub use snapshot::{Snapshot, SnapshotRef};
