//! Benchmarks for argument parsing, member ranking and metadata writing.

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::hint::black_box;
use valohai_utils::cli_args::{parse_overrides, FlagKind};
use valohai_utils::{compute_member_id_ranks, OutputProperties, ParameterType};

fn bench_parse_overrides(c: &mut Criterion) {
    let mut flags = HashMap::new();
    let mut args = Vec::new();
    for i in 0..200 {
        flags.insert(format!("param_{i}"), FlagKind::Parameter(ParameterType::Float));
        args.push(format!("--param_{i}={i}.5"));
    }
    flags.insert("images".to_string(), FlagKind::Input { plural: true });
    args.push("--images".to_string());
    args.extend((0..100).map(|i| format!("https://example.com/{i}.png")));

    c.bench_function("parse_overrides_300_args", |b| {
        b.iter(|| black_box(parse_overrides(black_box(&args), &flags)));
    });
}

fn bench_member_ranks(c: &mut Criterion) {
    let numeric: Vec<String> = (0..1000).rev().map(|i| i.to_string()).collect();
    let mut mixed = numeric.clone();
    mixed.push("worker-x".to_string());

    c.bench_function("rank_1000_numeric_ids", |b| b.iter(|| black_box(compute_member_id_ranks(&numeric))));
    c.bench_function("rank_1001_mixed_ids", |b| b.iter(|| black_box(compute_member_id_ranks(&mixed))));
}

fn bench_output_properties(c: &mut Criterion) {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("valohai.metadata.jsonl");
    let metadata: Map<String, Value> =
        json!({"foo": "bar", "number": 42, "random": "x".repeat(200)}).as_object().unwrap().clone();

    c.bench_function("output_properties_10k_save", |b| {
        b.iter(|| {
            let mut properties = OutputProperties::with_file(path.clone());
            for i in 0..10_000 {
                properties.set(format!("file_{i}.txt"), metadata.clone());
            }
            properties.save().unwrap();
        });
    });
}

criterion_group!(resolution_benches, bench_parse_overrides, bench_member_ranks, bench_output_properties);
criterion_main!(resolution_benches);
