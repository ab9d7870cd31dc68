#![forbid(unsafe_code)]
//! strata-core: shared kernel for the strata execution core.
//!
//! This crate contains only *pure* types and small helpers that the other
//! crates build on. There are **no threads** and **no storage** here.
//!
//! Crates that use this:
//! - strata-storage: tables, views and inverted indexes keyed by `DataType` tags.
//! - strata-operators: operators report failures through `Error`.
//! - strata-exec: task ids, engine configuration, scheduler selection.

pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
