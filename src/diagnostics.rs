//! # Diagnostic Events
//!
//! The core does no I/O and holds no process-wide logger. Instead, a
//! per-controller diagnostic callback — injected at construction — is the
//! sole mechanism for structured tracing. Each event is a named kind with
//! a fixed set of typed fields; callers decide whether to format, drop, or
//! route them. The callback is invoked synchronously on the thread driving
//! the event and must not call back into the controller.

use std::time::Duration;

/// A typed field value attached to a [`DiagnosticEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(u64),
    Bool(bool),
    Duration(Duration),
}

/// The kind of a diagnostic event emitted by the congestion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    RttUpdate,
    BandwidthSample,
    StateTransition,
    CwndUpdate,
    PacingUpdate,
    LossThresholdExceeded,
    PacketLoss,
    Panic,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RttUpdate => "rtt_update",
            EventKind::BandwidthSample => "bandwidth_sample",
            EventKind::StateTransition => "state_transition",
            EventKind::CwndUpdate => "cwnd_update",
            EventKind::PacingUpdate => "pacing_update",
            EventKind::LossThresholdExceeded => "loss_threshold_exceeded",
            EventKind::PacketLoss => "packet_loss",
            EventKind::Panic => "panic",
        }
    }
}

/// A structured diagnostic event. `fields` is a small named list — events
/// fire rarely enough (phase transitions, loss, panics) or are gated on a
/// registered callback that the allocation is immaterial on the hot path.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub kind: EventKind,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl DiagnosticEvent {
    pub fn new(kind: EventKind) -> Self {
        DiagnosticEvent {
            kind,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: FieldValue) -> Self {
        self.fields.push((name, value));
        self
    }
}

/// A diagnostic callback: invoked synchronously from the event thread.
/// Must not re-enter the controller that invoked it.
pub type DiagnosticCallback = Box<dyn Fn(&DiagnosticEvent) + Send>;
