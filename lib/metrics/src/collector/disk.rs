use super::memory::BYTES_PER_MB;

const BYTES_PER_GB: f64 = BYTES_PER_MB * 1024.0;

/// Capacity of one filesystem as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    /// The first reported filesystem is the primary disk.
    pub fn primary<I>(disks: I) -> Option<DiskUsage>
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        disks
            .into_iter()
            .next()
            .map(|(total_bytes, available_bytes)| DiskUsage {
                total_bytes,
                available_bytes,
            })
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }
}

/// `used / total × 100`, clamped to `0..=100`, and `0` for a zero-sized disk.
pub fn used_percentage(used_bytes: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 0.0;
    }
    (used_bytes as f64 / total_bytes as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

#[cfg(test)]
mod disk_tests {
    use super::*;

    #[test]
    fn first_disk_is_primary() {
        let disks = vec![(100, 40), (500, 500)];
        let primary = DiskUsage::primary(disks).unwrap();
        assert_eq!(primary.total_bytes, 100);
        assert_eq!(primary.used_bytes(), 60);
        assert_eq!(DiskUsage::primary(Vec::new()), None);
    }

    #[test]
    fn available_above_total_saturates() {
        let usage = DiskUsage {
            total_bytes: 10,
            available_bytes: 20,
        };
        assert_eq!(usage.used_bytes(), 0);
    }

    #[test]
    fn percentage_bounds() {
        assert_eq!(used_percentage(0, 0), 0.0);
        assert_eq!(used_percentage(50, 0), 0.0);
        assert_eq!(used_percentage(1, 4), 25.0);
        assert_eq!(used_percentage(5, 4), 100.0);
    }

    #[test]
    fn converts_gigabytes() {
        assert_eq!(bytes_to_gb(3 * 1024 * 1024 * 1024), 3.0);
    }
}
