//! # Delivery-Rate Sampler
//!
//! Maintains a running count of delivered bytes and produces a
//! [`RateSample`] on each ACK. The 1 ms interval floor avoids
//! division-by-zero and absurd bandwidth estimates for back-to-back ACKs
//! under a coarse clock.

use quanta::Instant;
use std::time::Duration;

/// Floor applied to a sample's interval so a burst of same-tick ACKs never
/// produces an unbounded bandwidth estimate.
const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// A single delivery-rate observation produced by [`RateSampler::on_ack`].
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    /// Cumulative bytes acknowledged so far (monotonic).
    pub delivered: u64,
    /// Timestamp of the first packet send covered by this sample.
    pub first_sent_at: Instant,
    /// Timestamp the ACK that produced this sample arrived.
    pub delivered_at: Instant,
    /// `delivered_at - first_sent_at`, clamped to at least 1 ms.
    pub interval: Duration,
    /// Bytes newly acknowledged in this ACK.
    pub bytes_acked: u64,
    /// True iff any packet measured in this interval was sent while the
    /// application had no more data — such a sample must not raise a
    /// bandwidth estimate.
    pub is_app_limited: bool,
}

impl RateSample {
    /// Bandwidth implied by this sample, in bytes/sec. Zero when the
    /// interval could not be computed (never negative, never infinite).
    pub fn bandwidth_bps(&self) -> f64 {
        let secs = self.interval.as_secs_f64();
        if secs > 0.0 {
            self.bytes_acked as f64 / secs
        } else {
            0.0
        }
    }
}

/// Tracks delivered bytes between ACKs and emits [`RateSample`]s.
///
/// Invariant: after each `on_ack`, `first_sent_at` is reset to the ACK time
/// and the app-limited flag is cleared.
pub struct RateSampler {
    delivered: u64,
    first_sent_at: Option<Instant>,
    app_limited: bool,
}

impl RateSampler {
    /// Create a sampler with no delivered bytes and no pending sample.
    pub fn new() -> Self {
        RateSampler {
            delivered: 0,
            first_sent_at: None,
            app_limited: false,
        }
    }

    /// Record a packet handed to the wire. Only the first send since the
    /// last ACK sets `first_sent_at`; the app-limited flag is sticky OR'd
    /// in so one app-limited send taints the whole interval.
    pub fn on_packet_sent(&mut self, now: Instant, _size: usize, app_limited: bool) {
        if self.first_sent_at.is_none() {
            self.first_sent_at = Some(now);
        }
        self.app_limited |= app_limited;
    }

    /// Record an ACK and produce the sample covering the interval since the
    /// last `on_ack` (or since the first `on_packet_sent`, whichever is
    /// later in the controller's lifetime).
    pub fn on_ack(&mut self, now: Instant, acked_bytes: u64) -> RateSample {
        self.delivered += acked_bytes;
        let first_sent_at = self.first_sent_at.unwrap_or(now);
        let raw_interval = now.saturating_duration_since(first_sent_at);
        let interval = raw_interval.max(MIN_SAMPLE_INTERVAL);

        let sample = RateSample {
            delivered: self.delivered,
            first_sent_at,
            delivered_at: now,
            interval,
            bytes_acked: acked_bytes,
            is_app_limited: self.app_limited,
        };

        self.first_sent_at = Some(now);
        self.app_limited = false;
        sample
    }

    /// Clear all tracked state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.delivered = 0;
        self.first_sent_at = None;
        self.app_limited = false;
    }

    /// Cumulative bytes delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Default for RateSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sampler_has_zero_delivered() {
        let s = RateSampler::new();
        assert_eq!(s.delivered(), 0);
    }

    #[test]
    fn on_ack_accumulates_delivered() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, false);
        let sample = s.on_ack(t0 + Duration::from_millis(50), 1000);
        assert_eq!(sample.delivered, 1000);
        assert_eq!(s.delivered(), 1000);

        let sample2 = s.on_ack(t0 + Duration::from_millis(100), 500);
        assert_eq!(sample2.delivered, 1500);
    }

    #[test]
    fn interval_floored_at_one_millisecond() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, false);
        // ACK arrives at the same instant — interval would be zero.
        let sample = s.on_ack(t0, 1000);
        assert_eq!(sample.interval, MIN_SAMPLE_INTERVAL);
    }

    #[test]
    fn bandwidth_bps_matches_bytes_over_interval() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, false);
        let sample = s.on_ack(t0 + Duration::from_millis(100), 10_000);
        // 10,000 bytes / 0.1s = 100,000 bytes/sec
        assert!((sample.bandwidth_bps() - 100_000.0).abs() < 1.0);
    }

    #[test]
    fn app_limited_flag_is_sticky_until_next_ack() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, false);
        s.on_packet_sent(t0, 1000, true);
        let sample = s.on_ack(t0 + Duration::from_millis(10), 2000);
        assert!(sample.is_app_limited);

        // Cleared after the ACK that consumed it.
        s.on_packet_sent(t0 + Duration::from_millis(20), 1000, false);
        let sample2 = s.on_ack(t0 + Duration::from_millis(30), 1000);
        assert!(!sample2.is_app_limited);
    }

    #[test]
    fn first_sent_at_resets_after_each_ack() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, false);
        let sample = s.on_ack(t0 + Duration::from_millis(40), 1000);
        assert_eq!(sample.first_sent_at, t0);

        // A second send+ack interval should start at the prior ACK time.
        let t1 = t0 + Duration::from_millis(40);
        s.on_packet_sent(t1 + Duration::from_millis(5), 1000, false);
        let sample2 = s.on_ack(t1 + Duration::from_millis(60), 1000);
        assert_eq!(sample2.first_sent_at, t1);
    }

    #[test]
    fn reset_clears_all_state() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        s.on_packet_sent(t0, 1000, true);
        s.on_ack(t0 + Duration::from_millis(10), 1000);
        s.reset();
        assert_eq!(s.delivered(), 0);
        let sample = s.on_ack(t0 + Duration::from_millis(20), 500);
        assert!(!sample.is_app_limited);
    }

    #[test]
    fn ack_with_no_prior_send_uses_ack_time_as_interval_start() {
        let mut s = RateSampler::new();
        let t0 = Instant::now();
        let sample = s.on_ack(t0, 0);
        assert_eq!(sample.interval, MIN_SAMPLE_INTERVAL);
        assert_eq!(sample.bytes_acked, 0);
    }
}
