use thiserror::Error;

use crate::id::TaskId;
use crate::schema::DataType;

/// Canonical result for strata.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A column was read with a static type that differs from its tag.
    #[error("type mismatch on column '{column}': declared {declared}, read as {requested}")]
    TypeMismatch {
        column: String,
        declared: DataType,
        requested: &'static str,
    },

    /// The tag is outside the closed set the dispatcher handles.
    #[error("unsupported type: {0}")]
    UnsupportedType(DataType),

    /// An operator references a table, column or index that does not exist.
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("{task} skipped: dependency {dependency} failed")]
    DependencyFailure { task: TaskId, dependency: TaskId },

    /// NUMA or core affinity request could not be satisfied. Never fatal.
    #[error("resource binding failed: {0}")]
    ResourceBind(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("{what} {index} out of bounds (len {len})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn plan(msg: impl Into<String>) -> Self {
        Error::MalformedPlan(msg.into())
    }

    /// True for the error synthesized for tasks downstream of a failure.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, Error::DependencyFailure { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedPlan(e.to_string())
    }
}
