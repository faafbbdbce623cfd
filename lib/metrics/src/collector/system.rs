use super::{cpu, disk::DiskUsage, network, read_blocking, CollectError, HostProbe, HostReading};
use async_trait::async_trait;
use common::util::time::elapsed_secs_since;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Components, Disks, Networks, System};
use tracing::{instrument, trace};

/// [`HostProbe`] backed by `sysinfo`.
///
/// Holds the `sysinfo` handles between calls so that CPU usage and network counters are
/// measured against the previous probe. Reads run on the blocking pool.
pub struct SysinfoProbe {
    handles: Arc<Mutex<SysinfoHandles>>,
}

struct SysinfoHandles {
    system: System,
    networks: Networks,
    disks: Disks,
    components: Components,
    last_network_refresh: Instant,
}

impl SysinfoProbe {
    /// Creates the probe and takes the CPU baseline, blocking for
    /// [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] so the first cycle reports a real load.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        // Wait a bit because CPU usage is based on diff.
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        let handles = SysinfoHandles {
            system,
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            last_network_refresh: Instant::now(),
        };
        SysinfoProbe {
            handles: Arc::new(Mutex::new(handles)),
        }
    }
}

impl SysinfoHandles {
    fn read_host(&mut self) -> Result<HostReading, CollectError> {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let (cpu_name, cpu_load_percent) = {
            let first = self
                .system
                .cpus()
                .first()
                .ok_or(CollectError::Unavailable("CPU"))?;
            (
                cpu::cpu_name(first.vendor_id(), first.brand()),
                f64::from(self.system.global_cpu_info().cpu_usage()),
            )
        };

        let memory_total_bytes = self.system.total_memory();
        if memory_total_bytes == 0 {
            return Err(CollectError::Unavailable("memory"));
        }

        self.networks.refresh();
        let elapsed = elapsed_secs_since(self.last_network_refresh);
        self.last_network_refresh = Instant::now();
        let (rx_bytes_per_sec, tx_bytes_per_sec) = network::aggregate_rates(
            self.networks
                .list()
                .values()
                .map(|data| (data.received(), data.transmitted())),
            elapsed,
        );

        self.disks.refresh();
        let primary_disk = DiskUsage::primary(
            self.disks
                .list()
                .iter()
                .map(|disk| (disk.total_space(), disk.available_space())),
        )
        .unwrap_or_default();

        self.components.refresh();
        let cpu_temperature_c = cpu::pick_temperature(
            self.components
                .list()
                .iter()
                .map(|component| (component.label(), component.temperature())),
        );

        Ok(HostReading {
            cpu_load_percent,
            memory_used_bytes: self.system.used_memory(),
            memory_total_bytes,
            rx_bytes_per_sec,
            tx_bytes_per_sec,
            disk_used_bytes: primary_disk.used_bytes(),
            disk_total_bytes: primary_disk.total_bytes,
            os_description: os_description(),
            uptime_seconds: System::uptime(),
            cpu_name,
            cpu_physical_cores: self
                .system
                .physical_core_count()
                .and_then(|cores| u32::try_from(cores).ok())
                .unwrap_or_else(|| self.system.cpus().len() as u32),
            cpu_temperature_c,
        })
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Distribution, release and platform, e.g. `Ubuntu 22.04 (linux)`.
fn os_description() -> String {
    let distro = System::name().unwrap_or_else(|| "Unknown".to_string());
    match System::os_version() {
        Some(release) => format!("{} {} ({})", distro, release, std::env::consts::OS),
        None => format!("{} ({})", distro, std::env::consts::OS),
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    #[inline]
    fn name(&self) -> &str {
        "sysinfo"
    }

    #[instrument(skip(self))]
    async fn probe(&mut self) -> Result<HostReading, CollectError> {
        // sysinfo reads procfs/sysctl synchronously
        let reading = read_blocking(self.name(), &self.handles, SysinfoHandles::read_host).await?;
        trace!(?reading, "Host probed");
        Ok(reading)
    }
}
