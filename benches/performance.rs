#![allow(missing_docs)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use graphpickle::{JsonPickle, Key, PickleObject, Registry, Value};
use std::hint::black_box;

#[derive(Debug, Default, PickleObject)]
#[pickle(name = "bench::Item")]
struct BenchItem {
    id: i64,
    label: String,
    payload: Vec<i64>,
}

fn generate_wide(count: usize) -> Value {
    let items = (0..count)
        .map(|i| {
            Value::object(BenchItem {
                id: i as i64,
                label: format!("item-{i}"),
                payload: vec![i as i64; 16],
            })
        })
        .collect();
    Value::list(items)
}

/// Every row points at the same header and at an earlier row.
fn generate_shared(count: usize) -> Value {
    let header = Value::dict([("schema", Value::from("v1")), ("owner", Value::from("bench"))]);
    let mut rows: Vec<Value> = Vec::with_capacity(count);
    for i in 0..count {
        let parent = if i == 0 { Value::Null } else { rows[i / 2].clone() };
        rows.push(Value::dict([
            (Key::from("n"), Value::from(i as i64)),
            (Key::from("header"), header.clone()),
            (Key::from("parent"), parent),
        ]));
    }
    Value::list(rows)
}

// --- BENCHMARKS ---

fn bench_encode(c: &mut Criterion) {
    let item_count = 10_000;
    let registry = Registry::new();
    registry.register_type_of::<BenchItem>();
    let pickle = JsonPickle::builder().registry(&registry);

    let wide = generate_wide(item_count);
    let shared = generate_shared(item_count);
    let plain_tree = pickle.flatten(&wide).expect("flatten failed");

    let mut group = c.benchmark_group("Encode");
    group.throughput(Throughput::Elements(item_count as u64));

    // 1. Baseline: serde_json on an already flattened tree
    group.bench_function("serde_json_to_string", |b| {
        b.iter(|| serde_json::to_string(black_box(&plain_tree)).expect("serde_json failed"));
    });

    // 2. Wide graph of derived objects
    group.bench_function("graphpickle_wide", |b| {
        b.iter(|| pickle.encode(black_box(&wide)).expect("encode failed"));
    });

    // 3. Shared graph
    group.bench_function("graphpickle_shared", |b| {
        b.iter(|| pickle.encode(black_box(&shared)).expect("encode failed"));
    });

    // 4. Same graph, references off
    let unreferenced = JsonPickle::builder().registry(&registry).keep_references(false);
    group.bench_function("graphpickle_wide_no_refs", |b| {
        b.iter(|| unreferenced.encode(black_box(&wide)).expect("encode failed"));
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let item_count = 10_000;
    let registry = Registry::new();
    registry.register_type_of::<BenchItem>();
    let pickle = JsonPickle::builder().registry(&registry);

    let wide = pickle.encode(&generate_wide(item_count)).expect("encode failed");
    let shared = pickle.encode(&generate_shared(item_count)).expect("encode failed");
    println!("Encoded sizes: wide {} bytes, shared {} bytes", wide.len(), shared.len());

    let mut group = c.benchmark_group("Decode");
    group.throughput(Throughput::Elements(item_count as u64));

    // 1. Baseline: parse only
    group.bench_function("serde_json_parse", |b| {
        b.iter(|| serde_json::from_str::<serde_json::Value>(black_box(&wide)).expect("parse failed"));
    });

    // 2. Parse and restore objects
    group.bench_function("graphpickle_wide", |b| {
        b.iter(|| pickle.decode(black_box(&wide)).expect("decode failed"));
    });

    // 3. Parse and resolve back-references
    group.bench_function("graphpickle_shared", |b| {
        b.iter(|| pickle.decode(black_box(&shared)).expect("decode failed"));
    });

    // 4. Structural report only
    group.bench_function("graphpickle_inspect", |b| {
        b.iter(|| pickle.inspect(black_box(&shared)).expect("inspect failed"));
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
