//! # Send Controller
//!
//! The façade a transport actually drives: owns the delivery-rate
//! sampler, the pacer, and the congestion controller, and wraps every
//! entry point in [`catch_unwind`] so a bug in the congestion math
//! degrades a single flow to its last known-good `(cwnd, pacing)` pair
//! instead of taking the process down.

use quanta::Instant;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::bbrv3::Bbrv3Metrics;
use crate::controller::{Algorithm, CongestionController, ControllerPhase};
use crate::diagnostics::{DiagnosticCallback, DiagnosticEvent, EventKind, FieldValue};
use crate::pacer::Pacer;
use crate::sampler::RateSampler;

/// Safety-floor substitutions for a controller returning a non-positive
/// cwnd or pacing rate — never propagated to the caller.
const FALLBACK_CWND_MTUS: f64 = 10.0;
const FALLBACK_PACING_BPS: f64 = 1_000_000.0;

/// Owns sampling, pacing, and congestion control for one flow.
pub struct SendController {
    mtu: usize,
    sampler: RateSampler,
    pacer: Pacer,
    controller: CongestionController,
    algorithm_name: &'static str,
    last_good_cwnd: f64,
    last_good_pacing: f64,
    inflight: f64,
    on_event: Option<DiagnosticCallback>,
}

impl SendController {
    /// Construct a controller for a known [`Algorithm`]. `mtu` at or
    /// below zero defaults to 1460; `initial_cwnd` at or below zero
    /// defaults to `32·mtu`.
    pub fn new(mtu: usize, initial_cwnd: f64, algorithm: Algorithm, now: Instant) -> Self {
        let mtu = if mtu == 0 { crate::DEFAULT_MTU } else { mtu };
        let initial_cwnd = if initial_cwnd > 0.0 { initial_cwnd } else { 32.0 * mtu as f64 };

        let controller = CongestionController::new(algorithm, mtu, initial_cwnd, now);
        let mut pacer = Pacer::new(mtu);
        pacer.set_rate(controller.pacing());

        SendController {
            mtu,
            sampler: RateSampler::new(),
            pacer,
            algorithm_name: algorithm.name(),
            controller,
            last_good_cwnd: initial_cwnd,
            last_good_pacing: 0.0,
            inflight: 0.0,
            on_event: None,
        }
    }

    /// Construct a controller from an algorithm name — `"bbrv2"` (alias
    /// `"bbr"`) or `"bbrv3"`; anything else falls back to BBRv2 silently.
    /// The resolved name, not the caller's raw input, is what
    /// [`SendController::algorithm_name`] reports afterward.
    pub fn from_algorithm_name(mtu: usize, initial_cwnd: f64, name: &str, now: Instant) -> Self {
        Self::new(mtu, initial_cwnd, Algorithm::parse(name), now)
    }

    /// The resolved algorithm name, as recorded at construction.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm_name
    }

    /// Register a diagnostic callback. Replaces any previously registered
    /// callback.
    pub fn set_diagnostic_callback(&mut self, callback: DiagnosticCallback) {
        self.on_event = Some(callback);
    }

    fn emit(&self, event: DiagnosticEvent) {
        if let Some(cb) = &self.on_event {
            cb(&event);
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.controller.algorithm()
    }

    pub fn phase(&self) -> ControllerPhase {
        self.controller.phase()
    }

    pub fn cwnd(&self) -> f64 {
        self.last_good_cwnd
    }

    pub fn pacing_rate(&self) -> f64 {
        self.last_good_pacing
    }

    pub fn bandwidth_bps(&self) -> f64 {
        self.controller.bandwidth_bps()
    }

    pub fn min_rtt(&self) -> Duration {
        self.controller.min_rtt()
    }

    /// BBRv3-specific metrics snapshot. `None` when running BBRv2.
    pub fn bbrv3_metrics(&self, now: Instant) -> Option<Bbrv3Metrics> {
        self.controller.bbrv3_metrics(now)
    }

    /// Bytes sent but not yet acknowledged or declared lost.
    pub fn inflight(&self) -> f64 {
        self.inflight
    }

    /// Whether a send of `size` bytes is admissible right now: the pacer
    /// has enough tokens *and* it would not push inflight past cwnd.
    pub fn can_send(&mut self, now: Instant, size: usize) -> bool {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pacer.allow(now, size)));
        match result {
            Ok(admitted_by_pacer) => admitted_by_pacer && self.inflight + size as f64 <= self.last_good_cwnd,
            Err(_) => {
                self.emit(DiagnosticEvent::new(EventKind::Panic));
                false
            }
        }
    }

    /// Record a packet handed to the wire.
    pub fn on_packet_sent(&mut self, now: Instant, size: usize, app_limited: bool) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sampler.on_packet_sent(now, size, app_limited);
            self.controller.on_packet_sent(size);
        }));
        match outcome {
            Ok(()) => self.inflight += size as f64,
            Err(_) => self.emit(DiagnosticEvent::new(EventKind::Panic)),
        }
    }

    /// Record an ACK, advancing the sampler and the congestion
    /// controller, and re-arming the pacer at the newly computed rate.
    /// On an internal panic, `cwnd`/`pacing` stay at their last known-good
    /// values and a [`EventKind::Panic`] event fires.
    pub fn on_ack(&mut self, now: Instant, acked_bytes: u64, rtt: Duration) -> (f64, f64) {
        let phase_before = self.controller.phase();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let sample = self.sampler.on_ack(now, acked_bytes);
            let (cwnd, pacing) = self.controller.on_ack(now, &sample, rtt);
            (cwnd, pacing, sample.bandwidth_bps())
        }));

        match outcome {
            Ok((raw_cwnd, raw_pacing, bw)) => {
                let cwnd = if raw_cwnd > 0.0 { raw_cwnd } else { FALLBACK_CWND_MTUS * self.mtu as f64 };
                let pacing = if raw_pacing > 0.0 { raw_pacing } else { FALLBACK_PACING_BPS };
                self.last_good_cwnd = cwnd;
                self.last_good_pacing = pacing;
                self.inflight = (self.inflight - acked_bytes as f64).max(0.0);
                self.pacer.set_rate(pacing);

                if !rtt.is_zero() {
                    self.emit(
                        DiagnosticEvent::new(EventKind::RttUpdate).with("rtt_us", FieldValue::Duration(rtt)),
                    );
                }
                if acked_bytes > 0 {
                    self.emit(
                        DiagnosticEvent::new(EventKind::BandwidthSample).with("bandwidth_bps", FieldValue::Float(bw)),
                    );
                }
                self.emit(DiagnosticEvent::new(EventKind::CwndUpdate).with("cwnd", FieldValue::Float(cwnd)));
                self.emit(DiagnosticEvent::new(EventKind::PacingUpdate).with("pacing_bps", FieldValue::Float(pacing)));
                if self.controller.loss_threshold_breached() {
                    self.emit(DiagnosticEvent::new(EventKind::LossThresholdExceeded).with("cwnd", FieldValue::Float(cwnd)));
                }

                let phase_after = self.controller.phase();
                if phase_after != phase_before {
                    self.emit(
                        DiagnosticEvent::new(EventKind::StateTransition)
                            .with("from", FieldValue::Int(phase_before as u64))
                            .with("to", FieldValue::Int(phase_after as u64)),
                    );
                }

                (cwnd, pacing)
            }
            Err(_) => {
                self.emit(DiagnosticEvent::new(EventKind::Panic));
                (self.last_good_cwnd, self.last_good_pacing)
            }
        }
    }

    /// Record a loss notification, passing `bytes_lost` through for
    /// BBRv3's round accounting (ignored by BBRv2). On an internal panic,
    /// `cwnd` stays at its last known-good value.
    pub fn on_loss(&mut self, now: Instant, bytes_lost: u64) -> f64 {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.controller.on_loss(now, bytes_lost);
            self.controller.cwnd()
        }));
        match outcome {
            Ok(cwnd) => {
                self.last_good_cwnd = cwnd;
                self.inflight = (self.inflight - bytes_lost as f64).max(0.0);
                self.emit(DiagnosticEvent::new(EventKind::PacketLoss).with("bytes_lost", FieldValue::Int(bytes_lost)));
                cwnd
            }
            Err(_) => {
                self.emit(DiagnosticEvent::new(EventKind::Panic));
                self.last_good_cwnd
            }
        }
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }
}
