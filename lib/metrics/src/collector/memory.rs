/// Bytes per mebibyte; the agent reports "MB" in binary units like `free -m`.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[test]
    fn converts_binary_megabytes() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(512 * 1024), 0.5);
        assert_eq!(bytes_to_mb(8 * 1024 * 1024 * 1024), 8192.0);
    }
}
