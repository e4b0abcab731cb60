//! # Aggregate Metric Helpers
//!
//! Pure functions used by the metrics subsystem and by tests — Jain's
//! fairness index, RTT percentiles, RTT jitter, goodput, and
//! retransmission rate. None of these touch controller state.

use std::time::Duration;

/// Jain's fairness index for a set of per-flow throughputs (or any
/// non-negative quantities). Returns `1.0` for `n` equal positive values,
/// `0.0` for an empty slice or an all-zero slice.
pub fn jain_fairness_index(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let sum: f64 = xs.iter().sum();
    let sum_sq: f64 = xs.iter().map(|x| x * x).sum();
    if sum_sq == 0.0 {
        return 0.0;
    }
    (sum * sum) / (xs.len() as f64 * sum_sq)
}

/// The `q`-quantile (0.0-1.0) of a set of RTT samples in milliseconds, via
/// sort-then-index `floor(n*q)` clamped to `n-1`. Returns 0.0 for an empty
/// slice.
pub fn rtt_percentile(samples_ms: &[f64], q: f64) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }
    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let idx = ((n as f64) * q).floor() as usize;
    sorted[idx.min(n - 1)]
}

/// p50/p95/p99 in one pass over a sorted copy.
pub fn rtt_percentiles(samples_ms: &[f64]) -> (f64, f64, f64) {
    (
        rtt_percentile(samples_ms, 0.50),
        rtt_percentile(samples_ms, 0.95),
        rtt_percentile(samples_ms, 0.99),
    )
}

/// RTT jitter as the sample standard deviation (Bessel-corrected). Returns
/// 0.0 for fewer than two samples.
pub fn rtt_jitter(samples_ms: &[f64]) -> f64 {
    let n = samples_ms.len();
    if n < 2 {
        return 0.0;
    }
    let mean = samples_ms.iter().sum::<f64>() / n as f64;
    let variance = samples_ms.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    variance.sqrt()
}

/// Goodput: `max(0, acked - retransmitted) / duration`, in bytes/sec.
/// Returns 0.0 if `duration` is zero.
pub fn goodput_bps(acked_bytes: u64, retransmitted_bytes: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    acked_bytes.saturating_sub(retransmitted_bytes) as f64 / secs
}

/// Retransmission rate: `retransmitted / sent`. Returns 0.0 if `sent == 0`.
pub fn retransmission_rate(sent: u64, retransmitted: u64) -> f64 {
    if sent == 0 {
        0.0
    } else {
        retransmitted as f64 / sent as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jain_equal_flows_is_one() {
        assert!((jain_fairness_index(&[10.0, 10.0, 10.0, 10.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jain_one_starved_flow() {
        assert!((jain_fairness_index(&[0.0, 10.0, 10.0, 10.0]) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn jain_empty_is_zero() {
        assert_eq!(jain_fairness_index(&[]), 0.0);
    }

    #[test]
    fn jain_single_flow_is_one() {
        assert_eq!(jain_fairness_index(&[7.0]), 1.0);
    }

    #[test]
    fn jain_all_zero_is_zero() {
        assert_eq!(jain_fairness_index(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn percentiles_match_spec_example() {
        let samples: Vec<f64> = (1..=10).map(|i| (i * 10) as f64).collect();
        let (p50, p95, p99) = rtt_percentiles(&samples);
        assert_eq!(p50, 60.0);
        assert_eq!(p95, 100.0);
        assert_eq!(p99, 100.0);
    }

    #[test]
    fn percentiles_are_non_decreasing() {
        let samples = vec![5.0, 80.0, 12.0, 40.0, 3.0, 99.0, 1.0];
        let (p50, p95, p99) = rtt_percentiles(&samples);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
    }

    #[test]
    fn jitter_of_constant_samples_is_zero() {
        assert_eq!(rtt_jitter(&[50.0, 50.0, 50.0]), 0.0);
    }

    #[test]
    fn jitter_of_single_sample_is_zero() {
        assert_eq!(rtt_jitter(&[50.0]), 0.0);
    }

    #[test]
    fn goodput_subtracts_retransmissions() {
        let bps = goodput_bps(10_000, 2_000, Duration::from_secs(1));
        assert!((bps - 8_000.0).abs() < 1e-9);
    }

    #[test]
    fn goodput_never_negative() {
        let bps = goodput_bps(1_000, 5_000, Duration::from_secs(1));
        assert_eq!(bps, 0.0);
    }

    #[test]
    fn goodput_zero_duration_is_zero() {
        assert_eq!(goodput_bps(1_000, 0, Duration::ZERO), 0.0);
    }

    #[test]
    fn retransmission_rate_zero_sent_is_zero() {
        assert_eq!(retransmission_rate(0, 0), 0.0);
    }

    #[test]
    fn retransmission_rate_basic() {
        assert!((retransmission_rate(100, 5) - 0.05).abs() < 1e-9);
    }
}
