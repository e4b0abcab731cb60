//! # quic-bbr-core
//!
//! Congestion control core for a QUIC performance-testing toolkit.
//!
//! This crate owns the part of the system that decides, at every ACK and at
//! every send opportunity, two numbers — the congestion window (bytes) and
//! the pacing rate (bytes/sec) — and exposes a rich diagnostic surface for
//! offline analysis. It does not transmit packets, parse QUIC frames, manage
//! streams or connections, or decide retransmission timing; those are the
//! job of the surrounding transport, which is expected to drive this crate
//! through [`SendController`].
//!
//! ## Crate structure
//!
//! - [`sampler`] — delivery-rate sampling (`RateSampler`, `RateSample`)
//! - [`pacer`] — token-bucket pacing (`Pacer`)
//! - [`bbrv2`] — the BBRv2 state machine
//! - [`bbrv3`] — the BBRv3 state machine, dual-scale bandwidth, metrics
//! - [`controller`] — the tagged variant uniting BBRv2 and BBRv3
//! - [`diagnostics`] — structured tracing events emitted by the controllers
//! - [`ring`] — fixed-capacity ring buffer used for recent-RTT bookkeeping
//! - [`metrics`] — pure aggregate helpers (fairness, percentiles, jitter)
//! - [`send_controller`] — the façade external transports drive

pub mod bbrv2;
pub mod bbrv3;
pub mod controller;
pub mod diagnostics;
pub mod metrics;
pub mod pacer;
pub mod ring;
pub mod sampler;
pub mod send_controller;

pub use controller::{Algorithm, CongestionController};
pub use pacer::Pacer;
pub use sampler::{RateSample, RateSampler};
pub use send_controller::SendController;

/// Default MTU (bytes) used when the caller supplies an invalid value.
pub const DEFAULT_MTU: usize = 1460;
