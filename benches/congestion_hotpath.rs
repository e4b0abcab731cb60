//! Per-event processing latency benchmarks for the congestion core.
//!
//! Measures the hot-path contributions:
//! - Pacer admission
//! - RateSampler on_ack
//! - BBRv2 on_ack
//! - BBRv3 on_ack
//! - SendController full send/ack cycle
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quanta::Instant;
use std::time::Duration;

use quic_bbr_core::bbrv2::Bbrv2;
use quic_bbr_core::bbrv3::{Bbrv3, Bbrv3Params};
use quic_bbr_core::controller::Algorithm;
use quic_bbr_core::pacer::Pacer;
use quic_bbr_core::sampler::RateSampler;
use quic_bbr_core::send_controller::SendController;

const MTU: usize = 1460;

fn bench_pacer_allow(c: &mut Criterion) {
    let mut p = Pacer::new(MTU);
    p.set_rate(10_000_000.0);
    let t0 = Instant::now();
    p.allow(t0, 0);
    c.bench_function("pacer_allow", |b| {
        let mut now = t0;
        b.iter(|| {
            now += Duration::from_micros(100);
            black_box(p.allow(black_box(now), black_box(MTU)));
        });
    });
}

fn bench_rate_sampler_on_ack(c: &mut Criterion) {
    c.bench_function("rate_sampler_on_ack", |b| {
        let mut sampler = RateSampler::new();
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(1);
            sampler.on_packet_sent(now, MTU, false);
            black_box(sampler.on_ack(black_box(now), black_box(MTU as u64)));
        });
    });
}

fn bench_bbrv2_on_ack(c: &mut Criterion) {
    c.bench_function("bbrv2_on_ack", |b| {
        let t0 = Instant::now();
        let mut bbr = Bbrv2::new(MTU, 46_720.0, t0);
        let mut sampler = RateSampler::new();
        let mut now = t0;
        b.iter(|| {
            now += Duration::from_millis(1);
            sampler.on_packet_sent(now, MTU, false);
            let sample = sampler.on_ack(now, MTU as u64);
            black_box(bbr.on_ack(black_box(now), black_box(&sample), black_box(Duration::from_millis(20))));
        });
    });
}

fn bench_bbrv3_on_ack(c: &mut Criterion) {
    c.bench_function("bbrv3_on_ack", |b| {
        let t0 = Instant::now();
        let mut bbr = Bbrv3::new(MTU, 46_720.0, Bbrv3Params::default(), t0);
        let mut sampler = RateSampler::new();
        let mut now = t0;
        b.iter(|| {
            now += Duration::from_millis(1);
            sampler.on_packet_sent(now, MTU, false);
            let sample = sampler.on_ack(now, MTU as u64);
            black_box(bbr.on_ack(black_box(now), black_box(&sample), black_box(Duration::from_millis(20))));
        });
    });
}

fn bench_send_controller_cycle(c: &mut Criterion) {
    c.bench_function("send_controller_send_ack_cycle", |b| {
        let t0 = Instant::now();
        let mut sc = SendController::new(MTU, 46_720.0, Algorithm::Bbrv3, t0);
        let mut now = t0;
        b.iter(|| {
            now += Duration::from_millis(1);
            sc.on_packet_sent(now, MTU, false);
            black_box(sc.on_ack(black_box(now), black_box(MTU as u64), black_box(Duration::from_millis(20))));
        });
    });
}

criterion_group!(
    benches,
    bench_pacer_allow,
    bench_rate_sampler_on_ack,
    bench_bbrv2_on_ack,
    bench_bbrv3_on_ack,
    bench_send_controller_cycle,
);
criterion_main!(benches);
