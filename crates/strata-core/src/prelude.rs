//! Convenient re-exports for downstream crates.

pub use crate::config::{EngineConfig, SchedulerKind};
pub use crate::error::{Error, Result};
pub use crate::id::{JobId, TaskId};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::Scalar;
