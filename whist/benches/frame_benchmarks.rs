use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use whist::frame;

/// Benchmark encoding a short table message
fn bench_encode_small(c: &mut Criterion) {
    let text = "play 10 of hearts";

    c.bench_function("encode_small", |b| {
        b.iter(|| frame::encode(black_box(text)));
    });
}

/// Benchmark encoding and decoding across payload sizes
fn bench_round_trip_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for size in [16, 1024, 64 * 1024, 1024 * 1024] {
        let text = "x".repeat(size);
        let encoded = frame::encode(&text).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &text, |b, text| {
            b.iter(|| frame::encode(black_box(text)));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| frame::read_frame(&mut black_box(encoded.as_slice())));
        });
    }

    group.finish();
}

/// Benchmark header parsing on its own
fn bench_decode_header(c: &mut Criterion) {
    let header = frame::encode_header(1_234_567).unwrap();

    c.bench_function("decode_header", |b| {
        b.iter(|| frame::decode_header(black_box(&header)));
    });
}

criterion_group!(
    benches,
    bench_encode_small,
    bench_round_trip_sizes,
    bench_decode_header
);
criterion_main!(benches);
