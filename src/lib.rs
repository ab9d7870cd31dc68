#![forbid(unsafe_code)]
//! strata: in-memory columnar execution core.
//!
//! Umbrella crate re-exporting the workspace members:
//! - `strata_core`: errors, ids, schema tags, scalars, engine configuration.
//! - `strata_storage`: tables, position-list views, inverted indexes, the catalog.
//! - `strata_operators`: index join, index scan, index build and the registry.
//! - `strata_exec`: jobs, scheduler strategies, the engine.

pub use strata_core;
pub use strata_exec;
pub use strata_operators;
pub use strata_storage;

pub mod prelude {
    pub use strata_core::prelude::*;
    pub use strata_exec::{Engine, ExecError, Job, JobHandle, JobOutput, JobReport, TaskStatus};
    pub use strata_operators::{
        CreateIndex, GetTable, IndexJoin, IndexScan, OpContext, OpError, Operator,
        OperatorDescriptor, OperatorRegistry,
    };
    pub use strata_storage::{
        AnyInvertedIndex, Catalog, Column, InvertedIndex, KeyRange, Positions, Relation, Table,
        View,
    };
}
