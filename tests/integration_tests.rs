//! End-to-end: plan entries -> registry -> job -> engine -> views.

use std::sync::Arc;

use serde_json::json;
use strata_core::prelude::{EngineConfig, Error, Scalar, SchedulerKind};
use strata_exec::{Engine, Job, TaskStatus};
use strata_operators::{OperatorDescriptor, OperatorRegistry};
use strata_storage::{Catalog, Column, Relation, Table};

fn descriptor(v: serde_json::Value) -> OperatorDescriptor {
    serde_json::from_value(v).unwrap()
}

fn catalog() -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new());
    catalog
        .add_table(
            "lineitem",
            Table::try_new(vec![
                Column::new("order_id", vec![1i64, 1, 2, 3, 3, 3]),
                Column::new("qty", vec![5i32, 1, 7, 2, 2, 9]),
            ])
            .unwrap(),
        )
        .unwrap();
    catalog
        .add_table(
            "orders",
            Table::try_new(vec![
                Column::new("id", vec![3i64, 1, 2]),
                Column::new("status", vec!["F", "O", "F"]),
            ])
            .unwrap(),
        )
        .unwrap();
    catalog
}

#[test]
fn index_then_join_through_the_engine() {
    let registry = OperatorRegistry::with_defaults();
    for kind in SchedulerKind::ALL {
        let catalog = catalog();
        let engine = Engine::new(
            EngineConfig::default().with_scheduler(kind).with_worker_threads(2),
            Arc::clone(&catalog),
        )
        .unwrap();

        let mut job = Job::new();
        let orders = job
            .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "orders"})), &[])
            .unwrap();
        let indexed = job
            .add_descriptor(
                &registry,
                &descriptor(json!({"type": "CreateIndex", "index": "orders_id", "fields": ["id"]})),
                &[orders],
            )
            .unwrap();
        let items = job
            .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "lineitem"})), &[])
            .unwrap();
        let big = job
            .add_descriptor(
                &registry,
                &descriptor(json!({"type": "IndexJoin", "index": "orders_id", "fields": [0]})),
                &[items, indexed],
            )
            .unwrap();

        let out = engine.run(job).unwrap();
        let view = out.get(big).unwrap();
        assert_eq!(view.column_count(), 4, "{kind}");
        assert_eq!(view.column_name(3).unwrap(), "status_2");
        let rows = view.to_rows().unwrap();
        assert_eq!(rows.len(), 6, "{kind}");
        assert_eq!(
            rows[2],
            vec![
                Scalar::I64(2),
                Scalar::I32(7),
                Scalar::I64(2),
                Scalar::from("F")
            ]
        );
        assert!(catalog.index("orders_id").is_ok());
    }
}

#[test]
fn scan_feeds_join_on_the_same_catalog() {
    let catalog = catalog();
    catalog.build_index("qty_idx", "lineitem", "qty").unwrap();
    catalog.build_index("orders_id", "orders", "id").unwrap();
    let registry = OperatorRegistry::with_defaults();
    let engine = Engine::new(EngineConfig::default(), Arc::clone(&catalog)).unwrap();

    let mut job = Job::new();
    let heavy = job
        .add_descriptor(
            &registry,
            &descriptor(json!({"type": "IndexScan", "index": "qty_idx", "op": "gte", "value": 5})),
            &[],
        )
        .unwrap();
    let orders = job
        .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "orders"})), &[])
        .unwrap();
    let joined = job
        .add_descriptor(
            &registry,
            &descriptor(json!({"type": "IndexJoin", "index": "orders_id", "fields": ["order_id"]})),
            &[heavy, orders],
        )
        .unwrap();

    let out = engine.run(job).unwrap();
    let view = out.get(joined).unwrap();
    let ids: Vec<i64> = view.reader::<i64>(0).unwrap().iter().copied().collect();
    let statuses: Vec<String> = view.reader::<String>(3).unwrap().iter().cloned().collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(statuses, vec!["O", "F", "F"]);
}

#[test]
fn whole_json_floats_probe_integer_indexes() {
    let catalog = catalog();
    catalog.build_index("qty_idx", "lineitem", "qty").unwrap();
    let registry = OperatorRegistry::with_defaults();
    let engine = Engine::new(EngineConfig::default(), Arc::clone(&catalog)).unwrap();

    let mut job = Job::new();
    let hit = job
        .add_descriptor(
            &registry,
            &descriptor(json!({"type": "IndexScan", "index": "qty_idx", "value": 7.0})),
            &[],
        )
        .unwrap();
    let out = engine.run(job).unwrap();
    assert_eq!(out.get(hit).unwrap().positions_of(0).unwrap().to_vec(), vec![2]);

    let mut job = Job::new();
    job.add_descriptor(
        &registry,
        &descriptor(json!({"type": "IndexScan", "index": "qty_idx", "value": 7.5})),
        &[],
    )
    .unwrap();
    let err = engine.run(job).unwrap_err();
    match err.error() {
        Error::TypeMismatch { column, .. } => assert_eq!(column, "qty (index 'qty_idx')"),
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[test]
fn malformed_plans_fail_the_task_not_the_engine() {
    let catalog = catalog();
    let registry = OperatorRegistry::with_defaults();
    let engine = Engine::new(
        EngineConfig::default().with_scheduler(SchedulerKind::WsCoreBoundPriorityQueues),
        Arc::clone(&catalog),
    )
    .unwrap();

    let mut job = Job::new();
    let items = job
        .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "lineitem"})), &[])
        .unwrap();
    let orders = job
        .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "orders"})), &[])
        .unwrap();
    let join = job
        .add_descriptor(
            &registry,
            &descriptor(json!({"type": "IndexJoin", "index": "no_such_index", "fields": ["order_id"]})),
            &[items, orders],
        )
        .unwrap();
    let handle = engine.submit(job).unwrap();
    let err = handle.wait().unwrap_err();
    assert_eq!(err.task(), Some(join));
    assert!(matches!(err.error(), Error::MalformedPlan(_)));
    let report = handle.report();
    assert_eq!(report.task(items).unwrap().status, TaskStatus::Completed);

    // The engine keeps serving.
    let mut job = Job::new();
    let t = job
        .add_descriptor(&registry, &descriptor(json!({"type": "GetTable", "table": "orders"})), &[])
        .unwrap();
    assert_eq!(engine.run(job).unwrap().get(t).unwrap().row_count(), 3);
}

#[test]
fn catalogs_are_isolated() {
    let a = catalog();
    let b = Arc::new(Catalog::new());
    a.build_index("orders_id", "orders", "id").unwrap();
    assert!(b.index("orders_id").is_err());
    assert!(b.table("orders").is_err());
    a.clear();
    assert!(a.table_names().is_empty());
}
