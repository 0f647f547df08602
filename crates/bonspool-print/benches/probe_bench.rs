// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for status-reply decoding, payload digests, and
// retry backoff in the bonspool-print crate.

use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use bonspool_core::integrity::payload_digest;
use bonspool_print::retry::RetryPolicy;
use bonspool_print::status_probe::decode_replies;

fn bench_decode_replies(c: &mut Criterion) {
    let healthy = [Some(0x16u8), Some(0x12), Some(0x12), Some(0x12)];
    let troubled = [Some(0x1Eu8), Some(0x76), Some(0x3A), Some(0x7E)];
    let partial = [Some(0x16u8), None, Some(0x12), None];

    c.bench_function("decode_replies_healthy", |b| {
        b.iter(|| decode_replies(black_box(&healthy)))
    });
    c.bench_function("decode_replies_troubled", |b| {
        b.iter(|| decode_replies(black_box(&troubled)))
    });
    c.bench_function("decode_replies_partial", |b| {
        b.iter(|| decode_replies(black_box(&partial)))
    });
}

fn bench_payload_digest(c: &mut Criterion) {
    // A typical receipt, and a raster logo job.
    let receipt: Vec<u8> = b"\x1b@ORDER 42\n2x ESPRESSO   5.00\nTOTAL      5.00\n\x1dV\x00"
        .repeat(8)
        .to_vec();
    let raster = vec![0xAAu8; 256 * 1024];

    c.bench_function("payload_digest_receipt", |b| {
        b.iter(|| payload_digest(black_box(&receipt)))
    });
    c.bench_function("payload_digest_256k", |b| {
        b.iter(|| payload_digest(black_box(&raster)))
    });
}

fn bench_retry_delay(c: &mut Criterion) {
    let policy = RetryPolicy {
        retries: 10,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(5),
    };
    c.bench_function("retry_delay_schedule", |b| {
        b.iter(|| {
            (0..10u32)
                .map(|attempt| policy.delay(black_box(attempt)))
                .sum::<Duration>()
        })
    });
}

criterion_group!(
    benches,
    bench_decode_replies,
    bench_payload_digest,
    bench_retry_delay
);
criterion_main!(benches);
