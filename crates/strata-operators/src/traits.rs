//! Operator trait + common interfaces.

use std::sync::Arc;

use strata_core::prelude::Error;
use strata_storage::{Catalog, View};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("{operator}: {message}")]
    Param {
        operator: &'static str,
        message: String,
    },

    #[error(transparent)]
    Core(#[from] Error),
}

impl OpError {
    pub fn param(operator: &'static str, message: impl Into<String>) -> Self {
        OpError::Param {
            operator,
            message: message.into(),
        }
    }
}

impl From<OpError> for Error {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Param { .. } => Error::MalformedPlan(e.to_string()),
            OpError::Core(inner) => inner,
        }
    }
}

/// What an operator may touch besides its inputs.
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    pub catalog: &'a Catalog,
    /// Validate every position list an operator builds.
    pub checked_views: bool,
}

impl<'a> OpContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            checked_views: cfg!(debug_assertions),
        }
    }

    pub fn with_checked_views(mut self, on: bool) -> Self {
        self.checked_views = on;
        self
    }

    /// `base.over(positions)`, validated when `checked_views` is set.
    pub fn view_over(&self, base: &View, positions: Vec<usize>) -> Result<View, OpError> {
        if self.checked_views {
            Ok(base.checked_over(positions)?)
        } else {
            Ok(base.over(positions))
        }
    }
}

/// Trait that all operators must implement.
///
/// Invariants:
/// - `execute` must be deterministic given the same inputs and catalog.
/// - Parameter problems are reported before any row is processed.
pub trait Operator: Send + Sync + 'static {
    /// Human-readable operator name (stable; matches the registry kind).
    fn name(&self) -> &'static str;

    /// Number of input views `execute` expects. Operators whose input is
    /// optional report the maximum and check the count themselves.
    fn arity(&self) -> usize;

    fn execute(&self, inputs: &[Arc<View>], ctx: &OpContext<'_>) -> Result<View, OpError>;
}

/// Check the input count against `op.arity()`.
pub(crate) fn expect_inputs<'i>(
    op: &dyn Operator,
    inputs: &'i [Arc<View>],
) -> Result<&'i [Arc<View>], OpError> {
    if inputs.len() != op.arity() {
        return Err(OpError::param(
            op.name(),
            format!("expects {} input(s), got {}", op.arity(), inputs.len()),
        ));
    }
    Ok(inputs)
}
