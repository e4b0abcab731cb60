//! # BBRv2 Controller
//!
//! A four-state machine (Startup / Drain / ProbeBW / ProbeRTT) producing
//! `(cwnd, pacing_rate)` from each [`RateSample`] and from loss
//! notifications.
//!
//! Unlike [`crate::bbrv3::Bbrv3`], BBRv2 grows `cwnd` unconditionally
//! during Startup and sets `cwnd = bdp` on Drain entry — there is no
//! explicit full-pipe detection here. BBRv3 adds one; this asymmetry is
//! intentional.

use quanta::Instant;
use std::time::Duration;

use crate::sampler::RateSample;

const STARTUP_DURATION: Duration = Duration::from_secs(2);
const DRAIN_DURATION: Duration = Duration::from_millis(500);
const PROBE_BW_CYCLE_STEP: Duration = Duration::from_millis(300);
const PROBE_RTT_STALE_AFTER: Duration = Duration::from_secs(5);
const PROBE_RTT_DURATION: Duration = Duration::from_millis(200);
const PROBE_BW_GAINS: [f64; 4] = [1.25, 1.0, 0.75, 1.0];

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

/// The BBRv2 state machine for a single flow.
pub struct Bbrv2 {
    mtu: usize,
    phase: Phase,
    phase_start: Instant,
    cwnd: f64,
    pacing: f64,
    bw: f64,
    min_rtt: Duration,
    min_rtt_stamp: Instant,
    cycle_idx: usize,
    cycle_start: Instant,
}

impl Bbrv2 {
    pub fn new(mtu: usize, initial_cwnd: f64, now: Instant) -> Self {
        Bbrv2 {
            mtu,
            phase: Phase::Startup,
            phase_start: now,
            cwnd: initial_cwnd,
            pacing: 0.0,
            bw: 0.0,
            min_rtt: Duration::ZERO,
            min_rtt_stamp: now,
            cycle_idx: 0,
            cycle_start: now,
        }
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

    /// Feed a rate sample and RTT measurement, returning the new
    /// `(cwnd, pacing)`. A degenerate ACK carrying no acknowledged bytes
    /// and no RTT measurement is a no-op — it changes neither phase,
    /// cwnd, nor pacing.
    pub fn on_ack(&mut self, now: Instant, sample: &RateSample, rtt: Duration) -> (f64, f64) {
        if sample.bytes_acked == 0 && rtt.is_zero() {
            return (self.cwnd, self.pacing);
        }

        if !sample.is_app_limited {
            let candidate = sample.bandwidth_bps();
            if candidate > self.bw {
                self.bw = candidate;
            }
        }

        if !rtt.is_zero() && (self.min_rtt.is_zero() || rtt < self.min_rtt) {
            self.min_rtt = rtt;
            self.min_rtt_stamp = now;
        }

        match self.phase {
            Phase::Startup => {
                self.cwnd += sample.bytes_acked.max(1) as f64;
                self.pacing = 2.0 * self.bw;
                if now.saturating_duration_since(self.phase_start) >= STARTUP_DURATION {
                    self.phase = Phase::Drain;
                    self.phase_start = now;
                    self.cwnd = self.bdp();
                    self.pacing = 0.5 * self.bw;
                }
            }
            Phase::Drain => {
                self.cwnd = self.bdp();
                self.pacing = 0.5 * self.bw;
                if now.saturating_duration_since(self.phase_start) >= DRAIN_DURATION {
                    self.phase = Phase::ProbeBw;
                    self.phase_start = now;
                    self.cycle_idx = 0;
                    self.cycle_start = now;
                }
            }
            Phase::ProbeBw => {
                if now.saturating_duration_since(self.cycle_start) >= PROBE_BW_CYCLE_STEP {
                    self.cycle_idx = (self.cycle_idx + 1) % PROBE_BW_GAINS.len();
                    self.cycle_start = now;
                }
                let gain = PROBE_BW_GAINS[self.cycle_idx];
                self.cwnd = gain * self.bdp();
                self.pacing = gain * self.bw;
                if now.saturating_duration_since(self.min_rtt_stamp) > PROBE_RTT_STALE_AFTER {
                    self.phase = Phase::ProbeRtt;
                    self.phase_start = now;
                }
            }
            Phase::ProbeRtt => {
                self.cwnd = 0.5 * self.bdp();
                self.pacing = 0.5 * self.bw;
                if now.saturating_duration_since(self.phase_start) >= PROBE_RTT_DURATION {
                    self.phase = Phase::ProbeBw;
                    self.phase_start = now;
                    self.cycle_idx = 0;
                    self.cycle_start = now;
                }
            }
        }

        self.normalize();
        (self.cwnd, self.pacing)
    }

    /// Cut `cwnd` by 30% (floored at 2·MTU) on a loss notification. Pacing
    /// is left unchanged.
    pub fn on_loss(&mut self) {
        self.cwnd = (0.7 * self.cwnd).max(2.0 * self.mtu as f64);
    }

    fn normalize(&mut self) {
        self.cwnd = self.cwnd.max(2.0 * self.mtu as f64);
        if self.pacing <= 0.0 && !self.min_rtt.is_zero() {
            self.pacing = self.cwnd / self.min_rtt.as_secs_f64();
        }
    }
}
