use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use strata_core::prelude::EngineConfig;
use strata_exec::{Engine, Job};
use strata_operators::{index_join_positions, GetTable, IndexJoin};
use strata_storage::{AnyInvertedIndex, Catalog, Column, Table, View};

fn make_table(rows: usize, keys: i64) -> Table {
    let ids: Vec<i64> = (0..rows as i64).map(|i| (i * 7919) % keys).collect();
    let values: Vec<f64> = (0..rows).map(|i| (i % 10) as f64).collect();
    Table::try_new(vec![Column::new("key", ids), Column::new("value", values)])
        .expect("bench table")
}

fn bench_index_build(c: &mut Criterion) {
    let table = make_table(100_000, 4096);
    c.bench_function("inverted_index_build_100k", |b| {
        b.iter(|| AnyInvertedIndex::build(&table, 0).expect("index"))
    });
}

fn bench_index_join(c: &mut Criterion) {
    let probe = View::from_table(Arc::new(make_table(50_000, 4096)));
    let build = make_table(8192, 4096);
    let index = AnyInvertedIndex::build(&build, 0).expect("index");
    c.bench_function("index_join_positions_50k", |b| {
        b.iter(|| index_join_positions(&probe, 0, &index).expect("join"))
    });
}

fn bench_engine_join(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::new());
    catalog.add_table("probe", make_table(20_000, 1024)).expect("probe");
    catalog.add_table("build", make_table(2048, 1024)).expect("build");
    catalog.build_index("build_key", "build", "key").expect("index");
    let engine = Engine::new(EngineConfig::default(), catalog).expect("engine");

    c.bench_function("engine_index_join_20k", |b| {
        b.iter(|| {
            let mut job = Job::new();
            let left = job.add_task(GetTable::new("probe"), &[]).expect("task");
            let right = job.add_task(GetTable::new("build"), &[]).expect("task");
            job.add_task(IndexJoin::new("build_key", 0usize), &[left, right])
                .expect("task");
            engine.run(job).expect("run")
        })
    });
}

criterion_group!(benches, bench_index_build, bench_index_join, bench_engine_join);
criterion_main!(benches);
