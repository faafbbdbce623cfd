use crate::{
    cache::MetricCacheRef,
    collector::{CollectError, HostProbe},
    snapshot::{Snapshot, SnapshotRef},
};
use common::util::time::{format_duration, now_unix_ms};
use common::SAMPLE_INTERVAL;
use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};
use typed_builder::TypedBuilder;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Sampler cycle {cycle} failed: {source}")]
    Collect {
        cycle: u64,
        #[source]
        source: CollectError,
    },
}

/// Receives every snapshot right after it was published to the cache.
///
/// Subscribers are pushed sequentially from the sampler task, in cycle order.
pub trait SnapshotSubscriber: Send + Sync {
    fn name(&self) -> &str;

    fn publish(&self, snapshot: &Snapshot);
}

/// A reference-counted reference to a [`SnapshotSubscriber`].
pub type SnapshotSubscriberRef = Arc<dyn SnapshotSubscriber>;

/// Periodically probes the host, publishes one [`Snapshot`] per cycle to the cache and
/// pushes it to every registered subscriber.
///
/// The sampler is the only caller of its [`HostProbe`]; a failed or timed out cycle leaves
/// the previously published snapshot in place.
#[derive(TypedBuilder)]
pub struct Sampler {
    probe: Box<dyn HostProbe>,
    cache: MetricCacheRef,
    #[builder(default = SAMPLE_INTERVAL)]
    interval: Duration,
    /// Upper bound for one probe call.
    #[builder(default = SAMPLE_INTERVAL)]
    cycle_timeout: Duration,
    #[builder(default, setter(skip))]
    subscribers: Vec<SnapshotSubscriberRef>,
    #[builder(default, setter(skip))]
    cycles: u64,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("probe", &self.probe.name())
            .field("interval", &self.interval)
            .field("cycle_timeout", &self.cycle_timeout)
            .field(
                "subscribers",
                &self.subscribers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("cycles", &self.cycles)
            .finish()
    }
}

impl Sampler {
    pub fn register_subscriber(&mut self, subscriber: SnapshotSubscriberRef) {
        trace!(subscriber = subscriber.name(), "Registered snapshot subscriber");
        self.subscribers.push(subscriber);
    }

    pub fn cache(&self) -> &MetricCacheRef {
        &self.cache
    }

    /// Runs one sampling cycle: probe, publish to the cache, then push to subscribers.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub async fn run_cycle(&mut self) -> Result<SnapshotRef, SamplerError> {
        self.cycles += 1;
        let cycle = self.cycles;

        let outcome = time::timeout(self.cycle_timeout, self.probe.probe()).await;
        let reading = match outcome {
            Ok(Ok(reading)) => reading,
            Ok(Err(source)) => return Err(SamplerError::Collect { cycle, source }),
            Err(_) => {
                return Err(SamplerError::Collect {
                    cycle,
                    source: CollectError::Timeout {
                        probe: self.probe.name().to_string(),
                        timeout: self.cycle_timeout,
                    },
                })
            }
        };

        let snapshot = self
            .cache
            .replace(Snapshot::from_reading(reading, cycle, now_unix_ms()));
        snapshot.log_snapshot();

        for subscriber in &self.subscribers {
            trace!(subscriber = subscriber.name(), "Pushing snapshot");
            subscriber.publish(&snapshot);
        }

        Ok(snapshot)
    }

    /// Samples forever. A cycle that overruns the interval delays the next one; cycles never
    /// overlap.
    pub async fn run(mut self) {
        info!(
            interval = %format_duration(self.interval),
            probe = self.probe.name(),
            subscribers = self.subscribers.len(),
            "Starting sampler"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let start = Instant::now();
            match self.run_cycle().await {
                Ok(snapshot) => debug!(
                    cycle = snapshot.cycle(),
                    took = %format_duration(start.elapsed()),
                    "Sampler cycle complete"
                ),
                Err(e) => warn!("{}; keeping previous snapshot", e),
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod sampler_tests {
    use super::*;
    use crate::cache::{CacheError, MetricCache};
    use crate::collector::{read_blocking, HostReading};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of probe outcomes, then fails.
    struct ScriptedProbe {
        outcomes: VecDeque<Result<HostReading, CollectError>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProbe {
        fn new(outcomes: Vec<Result<HostReading, CollectError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                ScriptedProbe {
                    outcomes: outcomes.into(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl HostProbe for ScriptedProbe {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn probe(&mut self) -> Result<HostReading, CollectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(CollectError::Probe("script exhausted".to_string())))
        }
    }

    struct SlowProbe;

    #[async_trait]
    impl HostProbe for SlowProbe {
        fn name(&self) -> &str {
            "slow"
        }

        async fn probe(&mut self) -> Result<HostReading, CollectError> {
            time::sleep(Duration::from_millis(200)).await;
            Ok(reading(1.0))
        }
    }

    /// Synchronous read that takes longer than the cycle timeout.
    struct BlockingProbe {
        state: Arc<Mutex<()>>,
        read_for: Duration,
    }

    #[async_trait]
    impl HostProbe for BlockingProbe {
        fn name(&self) -> &str {
            "blocking"
        }

        async fn probe(&mut self) -> Result<HostReading, CollectError> {
            let read_for = self.read_for;
            read_blocking(self.name(), &self.state, move |_| {
                std::thread::sleep(read_for);
                Ok(reading(1.0))
            })
            .await
        }
    }

    #[derive(Default)]
    struct RecordingSubscriber {
        seen: Mutex<Vec<(u64, f64)>>,
    }

    impl SnapshotSubscriber for RecordingSubscriber {
        fn name(&self) -> &str {
            "recording"
        }

        fn publish(&self, snapshot: &Snapshot) {
            self.seen
                .lock()
                .push((snapshot.cycle(), snapshot.cpu_load_percent()));
        }
    }

    fn reading(cpu: f64) -> HostReading {
        HostReading {
            cpu_load_percent: cpu,
            memory_total_bytes: 1024 * 1024 * 1024,
            memory_used_bytes: 512 * 1024 * 1024,
            ..HostReading::default()
        }
    }

    fn sampler(probe: impl HostProbe + 'static) -> Sampler {
        Sampler::builder()
            .probe(Box::new(probe))
            .cache(Arc::new(MetricCache::new()))
            .interval(Duration::from_millis(10))
            .cycle_timeout(Duration::from_millis(50))
            .build()
    }

    #[tokio::test]
    async fn cycle_publishes_to_cache_and_subscribers() {
        let (probe, _) = ScriptedProbe::new(vec![Ok(reading(45.3))]);
        let mut sampler = sampler(probe);
        let subscriber = Arc::new(RecordingSubscriber::default());
        sampler.register_subscriber(subscriber.clone());

        let snapshot = sampler.run_cycle().await.expect("cycle should succeed");

        assert_eq!(snapshot.cycle(), 1);
        assert_eq!(snapshot.cpu_load_percent(), 45.3);
        assert_eq!(snapshot.memory_used_mb(), 512.0);
        assert!(Arc::ptr_eq(&sampler.cache().read().unwrap(), &snapshot));
        assert_eq!(*subscriber.seen.lock(), vec![(1, 45.3)]);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_snapshot() {
        let (probe, _) = ScriptedProbe::new(vec![
            Ok(reading(10.0)),
            Err(CollectError::Probe("procfs unavailable".to_string())),
            Ok(reading(30.0)),
        ]);
        let mut sampler = sampler(probe);
        let subscriber = Arc::new(RecordingSubscriber::default());
        sampler.register_subscriber(subscriber.clone());

        sampler.run_cycle().await.unwrap();

        let err = sampler.run_cycle().await.unwrap_err();
        assert!(matches!(err, SamplerError::Collect { cycle: 2, .. }));

        let cached = sampler.cache().read().unwrap();
        assert_eq!(cached.cycle(), 1);
        assert_eq!(cached.cpu_load_percent(), 10.0);

        // the failure is confined to its own cycle
        let third = sampler.run_cycle().await.unwrap();
        assert_eq!(third.cycle(), 3);
        assert_eq!(third.cpu_load_percent(), 30.0);
        assert_eq!(*subscriber.seen.lock(), vec![(1, 10.0), (3, 30.0)]);
    }

    #[tokio::test]
    async fn first_failure_leaves_cache_empty() {
        let (probe, _) = ScriptedProbe::new(vec![Err(CollectError::Unavailable("CPU"))]);
        let mut sampler = sampler(probe);

        assert!(sampler.run_cycle().await.is_err());
        assert_eq!(sampler.cache().read().unwrap_err(), CacheError::NoDataYet);
    }

    #[tokio::test]
    async fn slow_probe_times_out() {
        let mut sampler = sampler(SlowProbe);

        match sampler.run_cycle().await {
            Err(SamplerError::Collect {
                source: CollectError::Timeout { probe, .. },
                ..
            }) => assert_eq!(probe, "slow"),
            other => panic!("expected a timeout, got {:?}", other),
        }
        assert!(sampler.cache().is_empty());
    }

    #[tokio::test]
    async fn blocking_read_is_cut_off_and_never_overlaps() {
        let mut sampler = sampler(BlockingProbe {
            state: Arc::new(Mutex::new(())),
            read_for: Duration::from_millis(300),
        });

        let start = Instant::now();
        let first = sampler.run_cycle().await;
        assert!(start.elapsed() < Duration::from_millis(250));
        assert!(matches!(
            first,
            Err(SamplerError::Collect {
                source: CollectError::Timeout { .. },
                ..
            })
        ));

        // the abandoned read still holds the handles
        match sampler.run_cycle().await {
            Err(SamplerError::Collect {
                cycle: 2,
                source: CollectError::Busy(probe),
            }) => assert_eq!(probe, "blocking"),
            other => panic!("expected a busy probe, got {:?}", other),
        }
        assert!(sampler.cache().is_empty());

        time::sleep(Duration::from_millis(400)).await;
        let mut sampler = Sampler::builder()
            .probe(sampler.probe)
            .cache(Arc::clone(&sampler.cache))
            .cycle_timeout(Duration::from_secs(1))
            .build();
        assert_eq!(sampler.run_cycle().await.unwrap().cycle(), 1);
    }

    #[tokio::test]
    async fn cache_freshness_is_monotonic() {
        let (probe, _) =
            ScriptedProbe::new((1..=5).map(|cpu| Ok(reading(cpu as f64))).collect());
        let mut sampler = sampler(probe);

        let mut previous = 0;
        for _ in 0..5 {
            sampler.run_cycle().await.unwrap();
            let cycle = sampler.cache().read().unwrap().cycle();
            assert!(cycle > previous);
            previous = cycle;
        }
    }

    #[tokio::test]
    async fn probe_is_called_once_per_cycle_regardless_of_readers() {
        let (probe, calls) = ScriptedProbe::new(vec![Ok(reading(1.0)), Ok(reading(2.0))]);
        let mut sampler = sampler(probe);

        sampler.run_cycle().await.unwrap();
        for _ in 0..10 {
            sampler.cache().read().unwrap();
        }
        sampler.run_cycle().await.unwrap();
        for _ in 0..10 {
            sampler.cache().read().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn spawned_sampler_keeps_publishing() {
        let (probe, _) =
            ScriptedProbe::new((1..=100).map(|cpu| Ok(reading(cpu as f64))).collect());
        let sampler = sampler(probe);
        let cache = Arc::clone(sampler.cache());

        let handle = sampler.spawn();
        time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        let snapshot = cache.read().expect("sampler should have published");
        assert!(snapshot.cycle() >= 2);
    }
}
