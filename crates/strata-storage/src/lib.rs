#![forbid(unsafe_code)]
//! strata-storage: columnar tables, position-list views and inverted indexes.
//!
//! Design intent:
//! - Tables are immutable once built and shared through `Arc`.
//! - Views never copy values. A view over a view is flattened eagerly, so a
//!   value read is one position lookup plus one slice index at any depth.
//! - Generic algorithms are written once over `IndexType` and selected per
//!   column tag with `dispatch`, once per operator invocation.

pub mod catalog;
pub mod column;
pub mod dispatch;
pub mod index;
pub mod native;
pub mod table;
pub mod view;

pub use catalog::{Catalog, IndexEntry};
pub use column::{Column, ColumnData};
pub use dispatch::{dispatch, is_dispatchable, TypeVisitor};
pub use index::{AnyInvertedIndex, InvertedIndex, KeyRange};
pub use native::{IndexType, NativeType};
pub use table::{ColumnReader, Relation, Table};
pub use view::{Positions, View};
