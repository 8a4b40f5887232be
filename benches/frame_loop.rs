//! Performance benchmarks for the render surface frame loop
//!
//! These benchmarks drive complete frames through simulated collaborators
//! to catch regressions in the per-frame hand-off path.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;

use render_surface::config::{DisplayConfig, GeneralConfig};
use render_surface::fence::Fence;
use render_surface::frame::EscalationLog;
use render_surface::observer::RecordingObserver;
use render_surface::sim::{CompositionPattern, SimCompositionBackend, SimDisplay};
use render_surface::{classify, SimConfig};

fn display(pattern: CompositionPattern) -> SimDisplay {
    let mut config = DisplayConfig::physical("internal", 0, 1920, 1080);
    config.composition = pattern;
    SimDisplay::build(
        &config,
        &GeneralConfig::default(),
        Arc::new(SimCompositionBackend::new()),
        Arc::new(RecordingObserver::new()),
        Box::new(EscalationLog::new()),
    )
}

/// Benchmark full frames per composition path
fn bench_frame_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_loop");

    for pattern in [
        CompositionPattern::Gpu,
        CompositionPattern::Hardware,
        CompositionPattern::Mixed,
        CompositionPattern::Alternate,
    ] {
        group.bench_function(format!("{:?}_60_frames", pattern).to_lowercase(), |b| {
            b.iter_batched(
                || display(pattern),
                |mut display| {
                    black_box(display.producer_mut().run_frames(60).ok());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark fence duplication and signalling
fn bench_fences(c: &mut Criterion) {
    let mut group = c.benchmark_group("fences");

    group.bench_function("dup_and_signal", |b| {
        b.iter(|| {
            let fence = Fence::pending();
            let dup = fence.dup();
            fence.signal();
            black_box(dup.is_signaled())
        });
    });

    group.bench_function("classify", |b| {
        b.iter(|| {
            for (client, device) in [(true, true), (true, false), (false, true), (false, false)] {
                black_box(classify(black_box(client), black_box(device)));
            }
        });
    });

    group.finish();
}

/// Benchmark configuration parsing
fn bench_configuration(c: &mut Criterion) {
    let text = SimConfig::default()
        .to_toml_string()
        .expect("default configuration serializes");

    c.bench_function("config_parse", |b| {
        b.iter(|| black_box(SimConfig::from_toml_str(black_box(&text)).ok()));
    });
}

criterion_group!(benches, bench_frame_loop, bench_fences, bench_configuration);

criterion_main!(benches);
