//! # BBRv3 Controller
//!
//! The same four-state machine as [`crate::bbrv2::Bbrv2`], extended with
//! dual-scale bandwidth (fast/slow), round-based loss thresholding,
//! reserved headroom, a pacing quantum, and the extensive metrics surface
//! described in the congestion-control data model.

use quanta::Instant;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::ring::RttRing;
use crate::sampler::RateSample;

const PROBE_BW_GAINS: [f64; 4] = [1.25, 1.0, 0.75, 1.0];
const PROBE_RTT_STALE_AFTER: Duration = Duration::from_secs(10);
const FULL_PIPE_RATIO: f64 = 1.1;
const MIN_PACING_QUANTUM: f64 = 65536.0;
/// Smoothing factor for the sent/lost loss-rate EMA — more responsive
/// than the per-round accounting so a sustained change in loss shows up
/// within a handful of packets rather than a handful of rounds.
const LOSS_RATE_EMA_ALPHA: f64 = 0.1;

/// Tunable BBRv3 parameters. Deserializable so a host can load tuning
/// presets from its own configuration file alongside the rest of its
/// settings; the crate itself never reads a file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Bbrv3Params {
    /// Round-based loss fraction above which cwnd is cut.
    pub loss_threshold: f64,
    /// Multiplicative cwnd reduction factor on a loss-threshold breach.
    pub beta: f64,
    /// Fraction of BDP reserved as headroom (never targeted for inflight).
    pub headroom_fraction: f64,
    /// Pacing gain applied during Startup.
    pub startup_pacing_gain: f64,
    /// Pacing gain applied during Drain.
    pub drain_pacing_gain: f64,
    /// How long ProbeRTT lasts before returning to ProbeBW.
    pub probe_rtt_duration: Duration,
}

impl Default for Bbrv3Params {
    fn default() -> Self {
        Bbrv3Params {
            loss_threshold: 0.02,
            beta: 0.70,
            headroom_fraction: 0.15,
            startup_pacing_gain: 2.77,
            drain_pacing_gain: 0.35,
            probe_rtt_duration: Duration::from_millis(200),
        }
    }
}

impl Bbrv3Params {
    /// A gentler preset for high-RTT paths (satellite, transoceanic
    /// links): a slower startup ramp and more reserved headroom to absorb
    /// the deeper buffers such paths tend to carry.
    pub fn optimized() -> Self {
        Bbrv3Params {
            loss_threshold: 0.03,
            beta: 0.75,
            headroom_fraction: 0.20,
            startup_pacing_gain: 2.0,
            drain_pacing_gain: 0.4,
            probe_rtt_duration: Duration::from_millis(200),
        }
    }
}

/// BBR phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    Drain,
    ProbeBw,
    ProbeRtt,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Startup => "Startup",
            Phase::Drain => "Drain",
            Phase::ProbeBw => "ProbeBW",
            Phase::ProbeRtt => "ProbeRTT",
        }
    }
}

/// A point-in-time copy of the BBRv3 metrics surface, suitable for JSON
/// serialization. Field names and units are part of the contract: all
/// times in ms, all rates in bytes/sec, all gains dimensionless.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bbrv3Metrics {
    pub phase: String,
    pub bw_fast_bps: f64,
    pub bw_slow_bps: f64,
    pub bw_bps: f64,
    pub loss_rate_round: f64,
    pub loss_rate_ema: f64,
    pub loss_threshold: f64,
    pub headroom_usage: f64,
    pub inflight_target_bytes: f64,
    pub pacing_quantum_bytes: f64,
    pub send_quantum_bytes: f64,
    pub pacing_gain: f64,
    pub cwnd_gain: f64,
    pub min_rtt_probe_us: f64,
    pub bufferbloat_factor: f64,
    pub stability_index: f64,
    pub phase_durations_ms: HashMap<String, u64>,
    pub recovery_time_ms: Option<u64>,
    pub loss_recovery_efficiency: f64,
}

/// The BBRv3 state machine for a single flow.
pub struct Bbrv3 {
    mtu: usize,
    params: Bbrv3Params,

    phase: Phase,
    phase_start: Instant,
    cwnd: f64,
    pacing: f64,

    bw_fast: f64,
    bw_slow: f64,
    bw: f64,

    min_rtt: Duration,
    min_rtt_stamp: Instant,
    min_rtt_probe: Option<Duration>,

    cycle_idx: usize,
    cycle_start: Instant,
    full_pipe_detected: bool,

    round_acked: u64,
    round_lost: u64,
    last_loss_rate_round: f64,
    last_loss_rate_round_valid: bool,

    inflight: f64,
    packets_sent: u64,
    packets_lost: u64,
    loss_rate_ema: f64,
    loss_rate_ema_initialized: bool,

    pacing_quantum: f64,
    send_quantum: f64,

    rtt_ring: RttRing,
    prev_bw: f64,
    prev_rtt_ms: f64,
    stability_index: f64,
    headroom_usage: f64,
    last_pacing_gain: f64,
    last_cwnd_gain: f64,

    phase_durations_ms: HashMap<String, u64>,
    last_loss_time: Option<Instant>,
    last_recovery_time: Option<Instant>,
    episode_lost_bytes: u64,
    episode_recovered_bytes: u64,
    loss_threshold_breached: bool,
}

impl Bbrv3 {
    pub fn new(mtu: usize, initial_cwnd: f64, params: Bbrv3Params, now: Instant) -> Self {
        Bbrv3 {
            mtu,
            params,
            phase: Phase::Startup,
            phase_start: now,
            cwnd: initial_cwnd,
            pacing: 0.0,
            bw_fast: 0.0,
            bw_slow: 0.0,
            bw: 0.0,
            min_rtt: Duration::ZERO,
            min_rtt_stamp: now,
            min_rtt_probe: None,
            cycle_idx: 0,
            cycle_start: now,
            full_pipe_detected: false,
            round_acked: 0,
            round_lost: 0,
            last_loss_rate_round: 0.0,
            last_loss_rate_round_valid: false,
            inflight: 0.0,
            packets_sent: 0,
            packets_lost: 0,
            loss_rate_ema: 0.0,
            loss_rate_ema_initialized: false,
            pacing_quantum: 2.0 * mtu as f64,
            send_quantum: 2.0 * mtu as f64,
            rtt_ring: RttRing::new(),
            prev_bw: 0.0,
            prev_rtt_ms: 0.0,
            stability_index: 0.0,
            headroom_usage: 0.0,
            last_pacing_gain: 0.0,
            last_cwnd_gain: 0.0,
            phase_durations_ms: HashMap::new(),
            last_loss_time: None,
            last_recovery_time: None,
            episode_lost_bytes: 0,
            episode_recovered_bytes: 0,
            loss_threshold_breached: false,
        }
    }

    /// Whether the most recent `on_ack` cut cwnd via the round-based loss
    /// threshold. Cleared at the start of every `on_ack`.
    pub fn loss_threshold_breached(&self) -> bool {
        self.loss_threshold_breached
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn pacing(&self) -> f64 {
        self.pacing
    }

    pub fn bandwidth_bps(&self) -> f64 {
        self.bw
    }

    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    fn bdp(&self) -> f64 {
        if self.min_rtt.is_zero() {
            self.cwnd
        } else {
            self.bw * self.min_rtt.as_secs_f64()
        }
    }

    /// BDP with the reserved headroom fraction carved out — the inflight
    /// level a phase actually targets. Headroom is slack, not extra
    /// capacity: it is never added back on top of BDP.
    pub fn inflight_target(&self) -> f64 {
        self.bdp() * (1.0 - self.params.headroom_fraction)
    }

    /// Record a packet handed to the wire: bumps the in-flight byte
    /// counter and the cumulative sent-packet counter used by the loss EMA.
    pub fn on_packet_sent(&mut self, size: usize) {
        self.inflight += size as f64;
        self.packets_sent += 1;
    }

    /// Record a loss notification. `bytes_lost` is used directly when the
    /// transport reports it; a zero value falls back to one MTU as a
    /// conservative estimate.
    pub fn on_loss(&mut self, now: Instant, bytes_lost: u64) {
        let loss_bytes = if bytes_lost == 0 {
            self.mtu as u64
        } else {
            bytes_lost
        };
        self.round_lost += loss_bytes;
        self.packets_lost += 1;
        self.inflight = (self.inflight - loss_bytes as f64).max(0.0);

        let episode_active = self
            .last_recovery_time
            .zip(self.last_loss_time)
            .map(|(r, l)| r < l)
            .unwrap_or(self.last_loss_time.is_some());
        if !episode_active {
            self.last_loss_time = Some(now);
            self.last_recovery_time = None;
            self.episode_lost_bytes = 0;
            self.episode_recovered_bytes = 0;
        }
        self.episode_lost_bytes += loss_bytes;
        self.refresh_loss_ema();
    }

    /// Smooth the cumulative sent/lost ratio into `loss_rate_ema`. The
    /// first update sets the value outright; every later one blends in
    /// `LOSS_RATE_EMA_ALPHA` of the new ratio.
    fn refresh_loss_ema(&mut self) {
        if self.packets_sent == 0 {
            return;
        }
        let ratio = self.packets_lost as f64 / self.packets_sent as f64;
        if !self.loss_rate_ema_initialized {
            self.loss_rate_ema = ratio;
            self.loss_rate_ema_initialized = true;
        } else {
            self.loss_rate_ema = LOSS_RATE_EMA_ALPHA * ratio + (1.0 - LOSS_RATE_EMA_ALPHA) * self.loss_rate_ema;
        }
    }

    fn record_transition(&mut self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.phase_start).as_millis() as u64;
        *self
            .phase_durations_ms
            .entry(self.phase.name().to_string())
            .or_insert(0) += elapsed_ms;

        let episode_open = self
            .last_loss_time
            .map(|l| self.last_recovery_time.map_or(true, |r| r < l))
            .unwrap_or(false);
        if episode_open {
            self.last_recovery_time = Some(now);
        }
    }

    /// Feed a rate sample and RTT measurement, returning the new
    /// `(cwnd, pacing)`. A degenerate ACK carrying no acknowledged bytes
    /// and no RTT measurement is a no-op.
    pub fn on_ack(&mut self, now: Instant, sample: &RateSample, rtt: Duration) -> (f64, f64) {
        if sample.bytes_acked == 0 && rtt.is_zero() {
            return (self.cwnd, self.pacing);
        }

        self.inflight = (self.inflight - sample.bytes_acked as f64).max(0.0);

        let rtt_ms = rtt.as_secs_f64() * 1000.0;
        if !rtt.is_zero() {
            self.rtt_ring.push(rtt_ms);
        }
        if !rtt.is_zero() && (self.min_rtt.is_zero() || rtt < self.min_rtt) {
            self.min_rtt = rtt;
            self.min_rtt_stamp = now;
        }

        if !sample.is_app_limited {
            let raw = sample.bandwidth_bps();
            if raw > self.bw_fast {
                self.bw_fast = raw;
            } else {
                self.bw_fast *= 0.995;
            }
            let ratio = if self.bw_slow > 0.0 {
                self.bw_fast / self.bw_slow
            } else {
                1.0
            };
            let alpha = if !(0.9..=1.1).contains(&ratio) { 0.15 } else { 0.10 };
            if self.bw_slow == 0.0 {
                self.bw_slow = raw;
            } else {
                self.bw_slow = alpha * raw + (1.0 - alpha) * self.bw_slow;
            }
            self.bw = self.bw_fast.max(self.bw_slow);

            if self.phase == Phase::Startup && self.bw_slow > 0.0 && self.bw_fast / self.bw_slow < FULL_PIPE_RATIO {
                self.full_pipe_detected = true;
            }
        }

        // Episode recovery accounting — bytes acknowledged while an
        // episode is still unresolved count toward its recovery.
        let episode_active = self
            .last_loss_time
            .map(|l| self.last_recovery_time.map_or(true, |r| r < l))
            .unwrap_or(false);
        if episode_active {
            self.episode_recovered_bytes += sample.bytes_acked;
        }

        self.round_acked += sample.bytes_acked;
        let round_total = self.round_acked + self.round_lost;
        if round_total > 0 {
            self.last_loss_rate_round = self.round_lost as f64 / round_total as f64;
            self.last_loss_rate_round_valid = true;
        }

        match self.phase {
            Phase::Startup => {
                self.cwnd += sample.bytes_acked.max(1) as f64;
                self.last_pacing_gain = self.params.startup_pacing_gain;
                self.last_cwnd_gain = 1.0;
                self.pacing = self.last_pacing_gain * self.bw;

                let required = if self.full_pipe_detected {
                    Duration::from_secs(1)
                } else {
                    Duration::from_secs(2)
                };
                if now.saturating_duration_since(self.phase_start) >= required {
                    self.record_transition(now);
                    self.phase = Phase::Drain;
                    self.phase_start = now;
                }
            }
            Phase::Drain => {
                self.cwnd = self.inflight_target();
                self.last_pacing_gain = self.params.drain_pacing_gain;
                self.last_cwnd_gain = 1.0;
                self.pacing = self.last_pacing_gain * self.bw;

                let exit_after = Duration::from_millis(200).max(2 * self.min_rtt);
                if now.saturating_duration_since(self.phase_start) >= exit_after {
                    self.record_transition(now);
                    self.phase = Phase::ProbeBw;
                    self.phase_start = now;
                    self.cycle_idx = 0;
                    self.cycle_start = now;
                }
            }
            Phase::ProbeBw => {
                let step = Duration::from_millis(200).max(2 * self.min_rtt);
                if now.saturating_duration_since(self.cycle_start) >= step {
                    self.cycle_idx = (self.cycle_idx + 1) % PROBE_BW_GAINS.len();
                    self.cycle_start = now;
                }
                let mut gain = PROBE_BW_GAINS[self.cycle_idx];
                if self.cycle_idx == 0 && self.last_loss_rate_round_valid && self.last_loss_rate_round < 0.01 {
                    gain = 1.28;
                }
                self.last_pacing_gain = gain;
                self.last_cwnd_gain = gain;
                self.cwnd = (gain * self.inflight_target()).max(4.0 * self.mtu as f64);
                self.pacing = gain * self.bw;

                if now.saturating_duration_since(self.min_rtt_stamp) > PROBE_RTT_STALE_AFTER {
                    self.record_transition(now);
                    self.phase = Phase::ProbeRtt;
                    self.phase_start = now;
                }
            }
            Phase::ProbeRtt => {
                self.last_pacing_gain = 0.5;
                self.last_cwnd_gain = 0.5;
                self.cwnd = (0.5 * self.bdp()).max(4.0 * self.mtu as f64);
                self.pacing = 0.5 * self.bw;

                if now.saturating_duration_since(self.phase_start) >= self.params.probe_rtt_duration {
                    self.record_transition(now);
                    self.min_rtt_probe = Some(self.min_rtt);
                    self.phase = Phase::ProbeBw;
                    self.phase_start = now;
                    self.cycle_idx = 0;
                    self.cycle_start = now;
                    self.min_rtt_stamp = now;
                }
            }
        }

        let round_total = self.round_acked + self.round_lost;
        self.loss_threshold_breached = false;
        if round_total > 0 && (self.round_lost as f64 / round_total as f64) > self.params.loss_threshold {
            self.cwnd = (self.params.beta * self.cwnd).max(2.0 * self.mtu as f64);
            self.round_acked = 0;
            self.round_lost = 0;
            self.loss_threshold_breached = true;
        }

        self.refresh_loss_ema();
        self.update_pacing_quantum();
        self.update_headroom_usage();
        self.update_stability_index(rtt_ms);
        self.normalize();

        (self.cwnd, self.pacing)
    }

    fn update_pacing_quantum(&mut self) {
        let quantum = if !self.min_rtt.is_zero() && self.bw > 0.0 {
            (self.bw * self.min_rtt.as_secs_f64() / 8.0).clamp(2.0 * self.mtu as f64, MIN_PACING_QUANTUM)
        } else {
            2.0 * self.mtu as f64
        };
        self.pacing_quantum = quantum;
        self.send_quantum = quantum;
    }

    fn update_headroom_usage(&mut self) {
        let headroom_bytes = self.bdp() * self.params.headroom_fraction;
        if headroom_bytes <= 0.0 {
            self.headroom_usage = 0.0;
            return;
        }
        let usage = (self.inflight - self.inflight_target()) / headroom_bytes;
        self.headroom_usage = usage.clamp(0.0, 1.0);
    }

    fn update_stability_index(&mut self, rtt_ms: f64) {
        let delta_bw = self.bw - self.prev_bw;
        let delta_rtt = rtt_ms - self.prev_rtt_ms;
        self.stability_index = if delta_rtt.abs() > f64::EPSILON {
            (delta_bw / delta_rtt).abs()
        } else {
            0.0
        };
        self.prev_bw = self.bw;
        self.prev_rtt_ms = rtt_ms;
    }

    fn normalize(&mut self) {
        self.cwnd = self.cwnd.max(2.0 * self.mtu as f64);
        if self.pacing <= 0.0 && !self.min_rtt.is_zero() {
            self.pacing = self.cwnd / self.min_rtt.as_secs_f64();
        }
    }

    /// A deep copy of the current metrics surface — never aliases internal
    /// state, including the phase-duration mapping.
    pub fn metrics(&self, now: Instant) -> Bbrv3Metrics {
        let mut phase_durations_ms = self.phase_durations_ms.clone();
        let ongoing = now.saturating_duration_since(self.phase_start).as_millis() as u64;
        *phase_durations_ms
            .entry(self.phase.name().to_string())
            .or_insert(0) += ongoing;

        let min_rtt_ms = self.min_rtt.as_secs_f64() * 1000.0;
        let bufferbloat_factor = if min_rtt_ms > 0.0 {
            (self.rtt_ring.average() / min_rtt_ms) - 1.0
        } else {
            0.0
        };

        let recovery_time_ms = self.last_recovery_time.and_then(|r| {
            self.last_loss_time
                .map(|l| r.saturating_duration_since(l).as_millis() as u64)
        });

        let loss_recovery_efficiency = if self.episode_lost_bytes > 0 {
            (self.episode_recovered_bytes as f64 / self.episode_lost_bytes as f64).min(1.0)
        } else {
            1.0
        };

        Bbrv3Metrics {
            phase: self.phase.name().to_string(),
            bw_fast_bps: self.bw_fast,
            bw_slow_bps: self.bw_slow,
            bw_bps: self.bw,
            loss_rate_round: self.last_loss_rate_round,
            loss_rate_ema: self.loss_rate_ema,
            loss_threshold: self.params.loss_threshold,
            headroom_usage: self.headroom_usage,
            inflight_target_bytes: self.inflight_target(),
            pacing_quantum_bytes: self.pacing_quantum,
            send_quantum_bytes: self.send_quantum,
            pacing_gain: self.last_pacing_gain,
            cwnd_gain: self.last_cwnd_gain,
            min_rtt_probe_us: self.min_rtt_probe.map(|d| d.as_secs_f64() * 1e6).unwrap_or(0.0),
            bufferbloat_factor,
            stability_index: self.stability_index,
            phase_durations_ms,
            recovery_time_ms,
            loss_recovery_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bytes_acked: u64, bw_bps: f64, app_limited: bool) -> RateSample {
        let now = Instant::now();
        let interval = if bw_bps > 0.0 {
            Duration::from_secs_f64(bytes_acked as f64 / bw_bps).max(Duration::from_millis(1))
        } else {
            Duration::from_millis(1)
        };
        RateSample {
            delivered: bytes_acked,
            first_sent_at: now,
            delivered_at: now + interval,
            interval,
            bytes_acked,
            is_app_limited: app_limited,
        }
    }

    #[test]
    fn constructed_controller_reports_startup_and_initial_cwnd() {
        let now = Instant::now();
        let bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        assert_eq!(bbr.phase(), Phase::Startup);
        assert_eq!(bbr.cwnd(), 46_720.0);
        assert_eq!(bbr.bandwidth_bps(), 0.0);
        let m = bbr.metrics(now);
        assert_eq!(m.phase, "Startup");
        assert_eq!(m.loss_rate_ema, 0.0);
    }

    #[test]
    fn degenerate_ack_is_a_no_op() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        let zero = sample(0, 0.0, false);
        let (cwnd, pacing) = bbr.on_ack(now, &zero, Duration::ZERO);
        assert_eq!(cwnd, 46_720.0);
        assert_eq!(pacing, 0.0);
        assert_eq!(bbr.phase(), Phase::Startup);
    }

    #[test]
    fn startup_to_drain_sets_cwnd_to_inflight_target() {
        let t0 = Instant::now();
        let mtu = 1460usize;
        let mut bbr = Bbrv3::new(mtu, 46_720.0, Bbrv3Params::default(), t0);
        let mut now = t0;
        // Drive ~2.01s of non-app-limited ACKs at a steady 10MB/s, 50ms RTT.
        for _ in 0..41 {
            now += Duration::from_millis(50);
            let s = sample(1460, 10_000_000.0, false);
            bbr.on_ack(now, &s, Duration::from_millis(50));
        }
        assert_eq!(bbr.phase(), Phase::Drain);
        let expected = bbr.bdp() * (1.0 - Bbrv3Params::default().headroom_fraction);
        assert!((bbr.cwnd() - expected).abs() < expected * 0.05 + 1.0);
    }

    #[test]
    fn loss_threshold_breach_cuts_cwnd_and_resets_round() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 100_000.0, Bbrv3Params::default(), now);
        bbr.on_loss(now, 3_000);

        let cwnd_before = bbr.cwnd();
        let s = sample(97_000, 1_000_000.0, false);
        bbr.on_ack(now + Duration::from_millis(10), &s, Duration::from_millis(20));

        let expected = (Bbrv3Params::default().beta * cwnd_before).max(2.0 * 1460.0);
        assert!((bbr.cwnd() - expected).abs() < 1.0);

        // Internal round counters are invisible from outside, but the next
        // loss-threshold evaluation must start from zero: feed a tiny loss
        // well under 2% and confirm no further cut happens immediately.
        bbr.on_loss(now + Duration::from_millis(11), 10);
        let cwnd_after_cut = bbr.cwnd();
        let s2 = sample(100_000, 1_000_000.0, false);
        bbr.on_ack(now + Duration::from_millis(20), &s2, Duration::from_millis(20));
        assert!(bbr.cwnd() >= cwnd_after_cut * 0.99);
    }

    #[test]
    fn app_limited_sample_does_not_raise_either_scale() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        let s = sample(1460, 1_000_000.0, false);
        bbr.on_ack(now, &s, Duration::from_millis(10));
        let (fast_before, slow_before) = (bbr.bw_fast, bbr.bw_slow);

        let huge = sample(1_000_000, 100_000_000.0, true);
        bbr.on_ack(now + Duration::from_millis(1), &huge, Duration::from_millis(10));
        assert_eq!(bbr.bw_fast, fast_before);
        assert_eq!(bbr.bw_slow, slow_before);
    }

    #[test]
    fn inflight_target_is_bdp_scaled_by_headroom() {
        let now = Instant::now();
        let params = Bbrv3Params::default();
        let mut bbr = Bbrv3::new(1460, 46_720.0, params, now);
        let s = sample(14_600, 1_000_000.0, false);
        bbr.on_ack(now, &s, Duration::from_millis(50));
        let expected = bbr.bdp() * (1.0 - params.headroom_fraction);
        assert!((bbr.inflight_target() - expected).abs() < 1e-6);
    }

    #[test]
    fn headroom_usage_stays_in_unit_interval() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        bbr.on_packet_sent(500_000);
        let s = sample(14_600, 1_000_000.0, false);
        bbr.on_ack(now + Duration::from_millis(50), &s, Duration::from_millis(50));
        assert!(bbr.headroom_usage >= 0.0 && bbr.headroom_usage <= 1.0);
    }

    #[test]
    fn cwnd_never_drops_below_two_mtu() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 10.0, Bbrv3Params::default(), now);
        let s = sample(10, 100.0, false);
        bbr.on_ack(now + Duration::from_millis(1), &s, Duration::from_millis(5));
        assert!(bbr.cwnd() >= 2.0 * 1460.0);
    }

    #[test]
    fn optimized_preset_has_distinct_values_from_default() {
        let default = Bbrv3Params::default();
        let opt = Bbrv3Params::optimized();
        assert_ne!(default.headroom_fraction, opt.headroom_fraction);
        assert_ne!(default.startup_pacing_gain, opt.startup_pacing_gain);
    }

    #[test]
    fn metrics_snapshot_is_independent_of_controller_state() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        let s = sample(1460, 1_000_000.0, false);
        bbr.on_ack(now, &s, Duration::from_millis(10));
        let mut m = bbr.metrics(now + Duration::from_millis(1));
        m.phase_durations_ms.insert("Injected".to_string(), 999);
        // Mutating the copy must not affect the controller's own map.
        let m2 = bbr.metrics(now + Duration::from_millis(2));
        assert!(!m2.phase_durations_ms.contains_key("Injected"));
    }

    #[test]
    fn loss_rate_ema_initializes_on_first_sample_then_smooths() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 46_720.0, Bbrv3Params::default(), now);
        bbr.on_packet_sent(1460);
        bbr.on_loss(now, 1460);
        let first = bbr.metrics(now).loss_rate_ema;
        assert_eq!(first, 1.0);

        for _ in 0..9 {
            bbr.on_packet_sent(1460);
        }
        let second = bbr.metrics(now).loss_rate_ema;
        assert!(second < first);
    }

    #[test]
    fn inflight_decreases_as_acked_bytes_are_reported() {
        let now = Instant::now();
        let mut bbr = Bbrv3::new(1460, 100_000.0, Bbrv3Params::default(), now);
        bbr.on_packet_sent(10_000);
        assert_eq!(bbr.inflight, 10_000.0);

        let s = sample(4_000, 1_000_000.0, false);
        bbr.on_ack(now + Duration::from_millis(10), &s, Duration::from_millis(10));
        // Only the acked portion comes off — a sustained send/ack cycle must
        // not leave inflight permanently growing.
        assert_eq!(bbr.inflight, 6_000.0);

        let s2 = sample(6_000, 1_000_000.0, false);
        bbr.on_ack(now + Duration::from_millis(20), &s2, Duration::from_millis(10));
        assert_eq!(bbr.inflight, 0.0);
    }
}
