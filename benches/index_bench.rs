use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use peakmatch::{
    CompressionConfig, IndexConfig, PeakId, QueryOptions, SignatureConfig, TrackId, TrackIndex,
    build_index,
};

fn synthetic_corpus(tracks: usize) -> Vec<(TrackId, Vec<PeakId>)> {
    (0..tracks)
        .map(|t| {
            let start = (t as PeakId) * 17;
            (t, (start..start + 200).step_by(2).collect())
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [100usize, 1_000] {
        let corpus = synthetic_corpus(size);
        group.throughput(Throughput::Elements(size as u64));
        for parallel in [false, true] {
            let cfg = IndexConfig::new()
                .with_signature(SignatureConfig::new().with_parallel(parallel));
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, size), &corpus, |b, corpus| {
                b.iter(|| build_index(black_box(corpus.clone()), cfg.clone()).expect("build"))
            });
        }
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let index = build_index(synthetic_corpus(5_000), IndexConfig::default()).expect("build");
    let query: Vec<PeakId> = (17_000..17_200).step_by(2).collect();
    let opts = QueryOptions::new().with_threshold(0.2);

    let mut group = c.benchmark_group("query");
    group.bench_function("peaks", |b| {
        b.iter(|| index.query(black_box(&query), &opts).expect("query"))
    });
    group.bench_function("track", |b| {
        b.iter(|| index.query_track(black_box(1_000), &opts).expect("query"))
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let index = build_index(synthetic_corpus(1_000), IndexConfig::default()).expect("build");
    let cfg = CompressionConfig::default();
    let bytes = index.to_bytes(&cfg).expect("encode");

    let mut group = c.benchmark_group("snapshot");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| index.to_bytes(black_box(&cfg)).expect("encode"))
    });
    group.bench_function("decode", |b| {
        b.iter(|| TrackIndex::from_bytes(black_box(&bytes)).expect("decode"))
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_query, bench_snapshot);
criterion_main!(benches);
