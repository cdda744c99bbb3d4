//! Benchmark – parsing, lookups and serialization out of one `Pool`
#![allow(missing_docs)]

use std::{fmt::Write, time::Duration};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pooljson::{Buffer, Pool, parse_copy};

/// A deterministic array of `records` small objects.
fn make_records(records: usize) -> String {
    let mut s = String::from("[");
    for i in 0..records {
        if i > 0 {
            s.push(',');
        }
        write!(
            s,
            r#"{{"id":{i},"name":"record \"{i}\"","score":{}.{},"tags":["a","b"],"ok":true}}"#,
            i % 97,
            i % 10
        )
        .unwrap();
    }
    s.push(']');
    s
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for &records in &[10usize, 1_000, 10_000] {
        let payload = make_records(records);
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::new("clear_and_reparse", records), &payload, |b, payload| {
            let mut pool = Pool::new(64 * 1024);
            b.iter(|| {
                let len = parse_copy(&pool, black_box(payload.as_bytes()))
                    .ok()
                    .and_then(|root| root.as_array().map(|array| array.len()));
                black_box(len);
                pool.clear();
            });
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let payload = make_records(1_000);
    let pool = Pool::new(64 * 1024);
    let root = parse_copy(&pool, payload.as_bytes()).unwrap();
    let mut buffer = Buffer::new(payload.len());

    let mut group = c.benchmark_group("serialize");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("dump_to_buffer", |b| {
        b.iter(|| {
            buffer.clear();
            black_box(root).dump_to_buffer(&mut buffer);
            black_box(buffer.len());
        });
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut doc = String::from("{");
    for i in 0..1_000 {
        if i > 0 {
            doc.push(',');
        }
        write!(doc, r#""key{i}":{i}"#).unwrap();
    }
    doc.push('}');
    let pool = Pool::new(64 * 1024);
    let object = parse_copy(&pool, doc.as_bytes()).unwrap().as_object().unwrap();
    let keys: Vec<String> = (0..1_000).step_by(7).map(|i| format!("key{i}")).collect();

    let mut group = c.benchmark_group("object_lookup");
    group.bench_function("scan", |b| {
        b.iter(|| keys.iter().filter(|key| object.scan(key.as_str()).is_some()).count());
    });
    group.bench_function("get", |b| {
        b.iter(|| keys.iter().filter(|key| object.get(key.as_str()).is_some()).count());
    });
    group.bench_function("find", |b| {
        b.iter(|| keys.iter().filter(|key| object.find(key.as_str()).is_some()).count());
    });
    group.finish();
}

fn criterion() -> Criterion {
    let mut c = Criterion::default();
    if cfg!(feature = "bench-fast") {
        c = c
            .warm_up_time(Duration::from_millis(10))
            .measurement_time(Duration::from_millis(100))
            .sample_size(10);
    } else {
        c = c
            .warm_up_time(Duration::from_secs(3))
            .measurement_time(Duration::from_secs(5));
    }
    c
}

criterion_group! { name = benches; config = criterion(); targets = bench_parse, bench_serialize, bench_lookup }
criterion_main!(benches);
