//! Microbenchmarks for the hot paths: single and batched insertion, and
//! the full-scan query over the in-memory engine.

use std::hint::black_box;

use chronostore::{Codec, Record, StoreConfig, TsStore};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

const TS: u32 = 0;
const NAME: u32 = 1;
const KIND: u32 = 2;

fn config() -> StoreConfig {
    StoreConfig {
        key_codec: Codec::Int,
        ..Default::default()
    }
}

fn entry(ts: i64, kind: i64) -> Record {
    Record::new()
        .with_int(TS, ts)
        .with_str(NAME, "benchmark record payload")
        .with_int(KIND, kind)
}

fn batch(n: i64) -> Vec<Record> {
    (0..n).map(|i| entry(i * 3, i % 4)).collect()
}

fn bench_insert_one(c: &mut Criterion) {
    c.bench_function("insert_one", |b| {
        b.iter_batched(
            || TsStore::open(config(), TS).unwrap(),
            |store| store.insert_one(black_box(entry(1003, 1))).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_many");
    for n in [100_i64, 1_000] {
        group.bench_function(format!("{n}_records"), |b| {
            b.iter_batched(
                || (TsStore::open(config(), TS).unwrap(), batch(n)),
                |(store, records)| store.insert_many(black_box(records)).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let store = TsStore::open(config(), TS).unwrap();
    store.insert_many(batch(1_000)).unwrap();

    let mut group = c.benchmark_group("find");
    group.bench_function("full_scan", |b| {
        b.iter(|| black_box(store.find(&Record::new()).unwrap()));
    });
    group.bench_function("filtered", |b| {
        let query = Record::new().with_int(KIND, 2);
        b.iter(|| black_box(store.find(&query).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_insert_one, bench_insert_many, bench_find);
criterion_main!(benches);
