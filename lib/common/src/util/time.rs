use chrono::Utc;
use std::time::{Duration, Instant};

/// Pretty-print an elapsed time (used in logs and diagnostics)
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    let micros = duration.as_micros();
    let millis = duration.as_millis();
    let seconds = duration.as_secs();

    match seconds {
        0 => match millis {
            0 => match micros {
                0 => format!("{}ns", nanos),
                _ => format!("{:.3}μs", nanos as f64 / 1_000.0),
            },
            _ => format!("{:.3}ms", micros as f64 / 1_000.0),
        },
        1..=59 => format!("{:.3}s", duration.as_secs_f64()),
        60..=3_599 => format!("{:.3}m", duration.as_secs_f64() / 60.0),
        3_600..=86_399 => format!("{:.3}h", duration.as_secs_f64() / 3_600.0),
        _ => format!("{}d", seconds / 86_400),
    }
}

/// Returns the current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_unix_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Seconds elapsed since `start`, never zero so it can be used as a rate denominator.
pub fn elapsed_secs_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64().max(f64::EPSILON)
}

#[cfg(test)]
mod time_tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_duration(Duration::from_nanos(512)), "512ns");
        assert_eq!(format_duration(Duration::from_micros(1_500)), "1.500ms");
        assert_eq!(format_duration(Duration::from_nanos(2_250)), "2.250μs");
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.500s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.500m");
        assert_eq!(format_duration(Duration::from_secs(5_400)), "1.500h");
        assert_eq!(format_duration(Duration::from_secs(3 * 86_400)), "3d");
    }

    #[test]
    fn unix_ms_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_unix_ms() > 1_577_836_800_000);
    }

    #[test]
    fn elapsed_is_never_zero() {
        assert!(elapsed_secs_since(Instant::now()) > 0.0);
    }
}
