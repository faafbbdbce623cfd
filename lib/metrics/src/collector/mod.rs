use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task;

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod system;

pub use system::SysinfoProbe;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("{0} information is unavailable on this host")]
    Unavailable(&'static str),
    #[error("Host probe `{probe}` did not answer within {timeout:?}")]
    Timeout { probe: String, timeout: Duration },
    #[error("Host probe failed: {0}")]
    Probe(String),
    #[error("Host probe `{0}` is still busy with an earlier read")]
    Busy(String),
}

/// Raw values read from the operating system in one probe call, before unit conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostReading {
    pub cpu_load_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Summed over every interface.
    pub rx_bytes_per_sec: f64,
    /// Summed over every interface.
    pub tx_bytes_per_sec: f64,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub os_description: String,
    pub uptime_seconds: u64,
    pub cpu_name: String,
    pub cpu_physical_cores: u32,
    pub cpu_temperature_c: Option<f64>,
}

/// Source of host readings.
///
/// CPU load and network rates are deltas against the previous call, so a probe must have
/// exactly one caller: the [`Sampler`](crate::sampler::Sampler) owns it and everything else
/// reads the published snapshot.
#[async_trait]
pub trait HostProbe: Send {
    fn name(&self) -> &str;

    async fn probe(&mut self) -> Result<HostReading, CollectError>;
}

/// Runs a synchronous read of `state` on the blocking pool, so a timeout around the returned
/// future cuts the wait short even though the read itself cannot be cancelled.
///
/// An abandoned read keeps `state` locked until it finishes; reads started meanwhile fail with
/// [`CollectError::Busy`] instead of queueing behind it.
pub async fn read_blocking<S, F>(
    probe: &str,
    state: &Arc<Mutex<S>>,
    read: F,
) -> Result<HostReading, CollectError>
where
    S: Send + 'static,
    F: FnOnce(&mut S) -> Result<HostReading, CollectError> + Send + 'static,
{
    let state = Arc::clone(state);
    let name = probe.to_string();
    task::spawn_blocking(move || {
        let Some(mut state) = state.try_lock() else {
            return Err(CollectError::Busy(name));
        };
        read(&mut *state)
    })
    .await
    .map_err(|e| CollectError::Probe(format!("blocking read of `{}` failed: {}", probe, e)))?
}
