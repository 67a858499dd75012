//! Pure, side-effect-free helpers backing [`super::ClientPool`]'s observable
//! metrics. Generalized from inbound HTTP connection accounting onto
//! outbound pool accounting: acquire/release counts, timeouts, latency
//! percentiles, and exponential backoff for the health-check retry loop.

use std::collections::HashMap;
use std::time::Duration;

/// Snapshot of pool observability data, returned by `ClientPool::metrics()`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PoolMetrics {
    pub pool_size: usize,
    pub active: usize,
    pub idle: usize,
    pub total_acquires: u64,
    pub total_releases: u64,
    pub total_timeouts: u64,
    pub avg_acquire_latency_ms: f64,
    pub health_check_failures: u64,
    pub connections_created: u64,
    pub connections_recycled: u64,
    pub connections_failed: u64,
}

/// Exponential backoff capped at `max_duration`, used between a discarded
/// unhealthy connection and the pool's single acquire retry.
pub fn backoff_duration(attempt: u32, base: Duration, max: Duration) -> Duration {
    let millis = base.as_millis().saturating_mul(1u128 << attempt.min(20));
    Duration::from_millis(millis.min(max.as_millis()) as u64)
}

/// p50/p90/p95/p99/min/max over a set of acquire-latency samples (ms).
pub fn latency_percentiles(samples: &[f64]) -> HashMap<&'static str, f64> {
    let mut out = HashMap::new();
    if samples.is_empty() {
        return out;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let len = sorted.len();
    out.insert("p50", percentile(&sorted, 50.0));
    out.insert("p90", percentile(&sorted, 90.0));
    out.insert("p95", percentile(&sorted, 95.0));
    out.insert("p99", percentile(&sorted, 99.0));
    out.insert("min", sorted[0]);
    out.insert("max", sorted[len - 1]);
    out
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = index - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// Whether an idle connection is older than `max_age` and should be
/// recycled on release rather than re-queued.
pub fn exceeds_max_age(created_at: std::time::Instant, max_age: Duration) -> bool {
    created_at.elapsed() > max_age
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(5);
        assert_eq!(backoff_duration(0, base, max), Duration::from_millis(100));
        assert_eq!(backoff_duration(1, base, max), Duration::from_millis(200));
        assert_eq!(backoff_duration(10, base, max), max);
    }

    #[test]
    fn percentiles_on_known_set() {
        let samples: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let p = latency_percentiles(&samples);
        assert_eq!(p[&"min"], 1.0);
        assert_eq!(p[&"max"], 10.0);
        assert_eq!(p[&"p50"], 5.5);
    }

    #[test]
    fn empty_samples_yield_empty_map() {
        assert!(latency_percentiles(&[]).is_empty());
    }
}
