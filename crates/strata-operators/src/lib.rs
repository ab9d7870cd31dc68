#![forbid(unsafe_code)]
//! strata-operators: plan operators over position-list views.
//!
//! Design intent:
//! - Operators are pure functions of their input views and the catalog; they
//!   never copy column values, they only produce new position lists.
//! - Each operator resolves its column types once per invocation and runs a
//!   monomorphic inner loop selected through `strata_storage::dispatch`.
//! - Plans name operators by kind; `OperatorRegistry` turns a descriptor into
//!   a boxed operator.

pub mod descriptor;
pub mod registry;
pub mod traits;

pub mod create_index;
pub mod get_table;
pub mod index_join;
pub mod index_scan;

pub use create_index::CreateIndex;
pub use descriptor::{FieldRef, OperatorDescriptor};
pub use get_table::GetTable;
pub use index_join::{index_join_positions, IndexJoin};
pub use index_scan::IndexScan;
pub use registry::{OperatorRegistry, RegistryBuilder};
pub use traits::{OpContext, OpError, Operator};
