use crate::collector::{cpu, disk, memory, network, HostReading};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Temperature reported when the host exposes no usable CPU sensor.
pub const TEMPERATURE_UNAVAILABLE: f64 = -1.0;

/// A reference-counted, immutable [`Snapshot`] as published by the sampler.
pub type SnapshotRef = Arc<Snapshot>;

/// One immutable, timestamped set of sampled host metrics.
///
/// Produced once per sampler cycle and never mutated afterwards; readers share it
/// through a [`SnapshotRef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters, TypedBuilder)]
pub struct Snapshot {
    /// Sampler cycle that produced this snapshot. Strictly increasing.
    #[builder(default = 1)]
    #[getset(get_copy = "pub")]
    cycle: u64,
    /// Average CPU load since the previous cycle (0-100%).
    #[builder(default)]
    #[getset(get_copy = "pub")]
    cpu_load_percent: f64,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    memory_used_mb: f64,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    memory_total_mb: f64,
    /// Received bytes summed over every interface, in MB/s.
    #[builder(default)]
    #[getset(get_copy = "pub")]
    network_rx_mbs: f64,
    /// Transmitted bytes summed over every interface, in MB/s.
    #[builder(default)]
    #[getset(get_copy = "pub")]
    network_tx_mbs: f64,
    /// Usage of the primary filesystem (0-100%).
    #[builder(default)]
    #[getset(get_copy = "pub")]
    disk_used_percent: f64,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    disk_total_gb: f64,
    /// Distribution, release and platform, e.g. `Ubuntu 22.04 (linux)`.
    #[builder(default, setter(into))]
    #[getset(get = "pub")]
    os_description: String,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    uptime_seconds: u64,
    #[builder(default, setter(into))]
    #[getset(get = "pub")]
    cpu_name: String,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    cpu_physical_cores: u32,
    /// CPU temperature in °C, or [`TEMPERATURE_UNAVAILABLE`].
    #[builder(default = TEMPERATURE_UNAVAILABLE)]
    #[getset(get_copy = "pub")]
    cpu_temperature_c: f64,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    captured_at_unix_ms: i64,
}

impl Snapshot {
    /// Converts a raw host reading into the published units.
    pub fn from_reading(reading: HostReading, cycle: u64, captured_at_unix_ms: i64) -> Self {
        Snapshot {
            cycle,
            cpu_load_percent: cpu::load_percent(reading.cpu_load_percent),
            memory_used_mb: memory::bytes_to_mb(reading.memory_used_bytes),
            memory_total_mb: memory::bytes_to_mb(reading.memory_total_bytes),
            network_rx_mbs: network::bytes_per_sec_to_mbs(reading.rx_bytes_per_sec),
            network_tx_mbs: network::bytes_per_sec_to_mbs(reading.tx_bytes_per_sec),
            disk_used_percent: disk::used_percentage(
                reading.disk_used_bytes,
                reading.disk_total_bytes,
            ),
            disk_total_gb: disk::bytes_to_gb(reading.disk_total_bytes),
            os_description: reading.os_description,
            uptime_seconds: reading.uptime_seconds,
            cpu_name: reading.cpu_name,
            cpu_physical_cores: reading.cpu_physical_cores,
            cpu_temperature_c: reading
                .cpu_temperature_c
                // sensors that cannot read report 0
                .filter(|celsius| celsius.is_finite() && *celsius != 0.0)
                .unwrap_or(TEMPERATURE_UNAVAILABLE),
            captured_at_unix_ms,
        }
    }

    pub fn has_temperature(&self) -> bool {
        self.cpu_temperature_c != TEMPERATURE_UNAVAILABLE
    }

    pub fn log_snapshot(&self) {
        debug!(
            cycle = self.cycle,
            cpu = %format!("{:.1}%", self.cpu_load_percent),
            memory = %format!("{:.0}/{:.0}MB", self.memory_used_mb, self.memory_total_mb),
            rx = %format!("{:.3}MB/s", self.network_rx_mbs),
            tx = %format!("{:.3}MB/s", self.network_tx_mbs),
            disk = %format!("{:.1}% of {:.1}GB", self.disk_used_percent, self.disk_total_gb),
            "Snapshot captured"
        );
    }
}
