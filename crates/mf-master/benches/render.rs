//! Full render path benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mf_core::PcmBuffer;
use mf_master::{ChainSpec, SignalChainEngine, analyze};

fn program() -> PcmBuffer {
    let left: Vec<f64> = (0..44100)
        .map(|i| {
            let t = i as f64 / 44100.0;
            0.5 * (t * 2.0 * std::f64::consts::PI * 110.0).sin()
                + 0.2 * (t * 2.0 * std::f64::consts::PI * 2500.0).sin()
        })
        .collect();
    let right = left.iter().map(|s| s * 0.9).collect();
    PcmBuffer::new(44100, vec![left, right]).unwrap()
}

fn bench_render(c: &mut Criterion) {
    let buffer = program();
    let engine = SignalChainEngine::new();
    let spec = ChainSpec::baseline();
    c.bench_function("render_baseline_1s_stereo", |b| {
        b.iter(|| engine.render(black_box(&buffer), &spec))
    });

    let mut saturated = ChainSpec::baseline();
    saturated.saturation.amount = 50.0;
    c.bench_function("render_saturated_1s_stereo", |b| {
        b.iter(|| engine.render(black_box(&buffer), &saturated))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let buffer = program();
    c.bench_function("analyze_1s_stereo", |b| b.iter(|| analyze(black_box(&buffer))));
}

criterion_group!(benches, bench_render, bench_analyze);
criterion_main!(benches);
