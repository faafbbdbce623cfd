use super::memory::BYTES_PER_MB;

/// Sums the per-interface byte deltas and turns them into bytes per second.
///
/// Every reported interface counts, not only the busiest one. `elapsed_secs` is the time since
/// the counters were last refreshed; a non-positive value yields zero rates.
pub fn aggregate_rates<I>(interfaces: I, elapsed_secs: f64) -> (f64, f64)
where
    I: IntoIterator<Item = (u64, u64)>,
{
    if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
        return (0.0, 0.0);
    }

    let (rx, tx) = interfaces
        .into_iter()
        .fold((0_u64, 0_u64), |(rx, tx), (received, transmitted)| {
            (rx.saturating_add(received), tx.saturating_add(transmitted))
        });

    (rx as f64 / elapsed_secs, tx as f64 / elapsed_secs)
}

pub fn bytes_per_sec_to_mbs(bytes_per_sec: f64) -> f64 {
    if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec / BYTES_PER_MB
    } else {
        0.0
    }
}
