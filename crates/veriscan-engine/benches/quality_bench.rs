// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the frame quality gate. Classification runs on
// every camera frame, so it has to stay cheap relative to frame delivery
// (~33ms at 30fps).

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use veriscan_core::types::RawQualitySample;
use veriscan_engine::quality::QualityGate;

fn sample_grid() -> Vec<RawQualitySample> {
    let mut samples = Vec::new();
    for blur_step in 0..10 {
        for brightness_step in 0..10 {
            samples.push(RawQualitySample {
                blur: blur_step as f64 / 10.0,
                brightness: brightness_step as f64 / 10.0,
                uniformity: 0.7,
                alignment: 0.8,
                document_detected: blur_step % 7 != 0,
            });
        }
    }
    samples
}

fn bench_classify(c: &mut Criterion) {
    let gate = QualityGate::default();
    let samples = sample_grid();

    c.bench_function("classify_single_frame", |b| {
        let sample = RawQualitySample {
            blur: 0.2,
            brightness: 0.6,
            uniformity: 0.8,
            alignment: 0.85,
            document_detected: true,
        };
        b.iter(|| gate.classify(black_box(sample)));
    });

    c.bench_function("classify_frame_sweep", |b| {
        b.iter(|| {
            for sample in &samples {
                black_box(gate.classify(black_box(*sample)));
            }
        });
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
