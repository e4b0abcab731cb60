//! # Congestion Controller
//!
//! A tagged variant over [`Bbrv2`] and [`Bbrv3`] rather than a trait
//! object: there are exactly two algorithms, the hot path (`on_ack`) runs
//! once per ACK on every flow, and a `match` on a two-armed enum costs
//! nothing extra while keeping both algorithms' full APIs reachable
//! without downcasting.

use quanta::Instant;
use std::time::Duration;

use crate::bbrv2::{self, Bbrv2};
use crate::bbrv3::{self, Bbrv3, Bbrv3Metrics, Bbrv3Params};
use crate::sampler::RateSample;

/// Which congestion-control algorithm a [`CongestionController`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Bbrv2,
    Bbrv3,
}

impl Algorithm {
    /// Parse an algorithm name. `"bbrv2"` and its alias `"bbr"` select
    /// BBRv2; `"bbrv3"` selects BBRv3. Any other value — including empty
    /// or differently-cased strings — silently falls back to BBRv2 rather
    /// than erroring, since an unrecognized algorithm name is far more
    /// likely a stale config value than a condition worth failing a send
    /// path over.
    pub fn parse(name: &str) -> Algorithm {
        match name {
            "bbrv3" => Algorithm::Bbrv3,
            _ => Algorithm::Bbrv2,
        }
    }

    /// Canonical name, as recorded on the metrics surface.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Bbrv2 => "bbrv2",
            Algorithm::Bbrv3 => "bbrv3",
        }
    }
}

/// The current phase of either algorithm, exposed uniformly for callers
/// that don't care which one is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Startup,
    Drain,
    ProbeBw,
    ProbeRtt,
}

impl From<bbrv2::Phase> for ControllerPhase {
    fn from(p: bbrv2::Phase) -> Self {
        match p {
            bbrv2::Phase::Startup => ControllerPhase::Startup,
            bbrv2::Phase::Drain => ControllerPhase::Drain,
            bbrv2::Phase::ProbeBw => ControllerPhase::ProbeBw,
            bbrv2::Phase::ProbeRtt => ControllerPhase::ProbeRtt,
        }
    }
}

impl From<bbrv3::Phase> for ControllerPhase {
    fn from(p: bbrv3::Phase) -> Self {
        match p {
            bbrv3::Phase::Startup => ControllerPhase::Startup,
            bbrv3::Phase::Drain => ControllerPhase::Drain,
            bbrv3::Phase::ProbeBw => ControllerPhase::ProbeBw,
            bbrv3::Phase::ProbeRtt => ControllerPhase::ProbeRtt,
        }
    }
}

/// A congestion controller running either BBRv2 or BBRv3.
pub enum CongestionController {
    Bbrv2(Bbrv2),
    Bbrv3(Bbrv3),
}

impl CongestionController {
    /// Construct a controller for the given algorithm.
    pub fn new(algorithm: Algorithm, mtu: usize, initial_cwnd: f64, now: Instant) -> Self {
        match algorithm {
            Algorithm::Bbrv2 => CongestionController::Bbrv2(Bbrv2::new(mtu, initial_cwnd, now)),
            Algorithm::Bbrv3 => {
                CongestionController::Bbrv3(Bbrv3::new(mtu, initial_cwnd, Bbrv3Params::default(), now))
            }
        }
    }

    /// Construct a BBRv3 controller with explicit tuning parameters.
    pub fn new_bbrv3_with_params(mtu: usize, initial_cwnd: f64, params: Bbrv3Params, now: Instant) -> Self {
        CongestionController::Bbrv3(Bbrv3::new(mtu, initial_cwnd, params, now))
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            CongestionController::Bbrv2(_) => Algorithm::Bbrv2,
            CongestionController::Bbrv3(_) => Algorithm::Bbrv3,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        match self {
            CongestionController::Bbrv2(b) => b.phase().into(),
            CongestionController::Bbrv3(b) => b.phase().into(),
        }
    }

    pub fn cwnd(&self) -> f64 {
        match self {
            CongestionController::Bbrv2(b) => b.cwnd(),
            CongestionController::Bbrv3(b) => b.cwnd(),
        }
    }

    pub fn pacing(&self) -> f64 {
        match self {
            CongestionController::Bbrv2(b) => b.pacing(),
            CongestionController::Bbrv3(b) => b.pacing(),
        }
    }

    pub fn bandwidth_bps(&self) -> f64 {
        match self {
            CongestionController::Bbrv2(b) => b.bandwidth_bps(),
            CongestionController::Bbrv3(b) => b.bandwidth_bps(),
        }
    }

    pub fn min_rtt(&self) -> Duration {
        match self {
            CongestionController::Bbrv2(b) => b.min_rtt(),
            CongestionController::Bbrv3(b) => b.min_rtt(),
        }
    }

    /// BBRv3-specific metrics snapshot. `None` when running BBRv2.
    pub fn bbrv3_metrics(&self, now: Instant) -> Option<Bbrv3Metrics> {
        match self {
            CongestionController::Bbrv2(_) => None,
            CongestionController::Bbrv3(b) => Some(b.metrics(now)),
        }
    }

    /// Whether the most recent `on_ack` cut cwnd via BBRv3's round-based
    /// loss threshold. Always false for BBRv2, which has no such round
    /// accounting.
    pub fn loss_threshold_breached(&self) -> bool {
        match self {
            CongestionController::Bbrv2(_) => false,
            CongestionController::Bbrv3(b) => b.loss_threshold_breached(),
        }
    }

    /// Record a packet handed to the wire. BBRv2 tracks no in-flight state
    /// of its own, so this is a no-op there.
    pub fn on_packet_sent(&mut self, size: usize) {
        if let CongestionController::Bbrv3(b) = self {
            b.on_packet_sent(size);
        }
    }

    pub fn on_ack(&mut self, now: Instant, sample: &RateSample, rtt: Duration) -> (f64, f64) {
        match self {
            CongestionController::Bbrv2(b) => b.on_ack(now, sample, rtt),
            CongestionController::Bbrv3(b) => b.on_ack(now, sample, rtt),
        }
    }

    pub fn on_loss(&mut self, now: Instant, bytes_lost: u64) {
        match self {
            CongestionController::Bbrv2(b) => b.on_loss(),
            CongestionController::Bbrv3(b) => b.on_loss(now, bytes_lost),
        }
    }
}
