//! Range scan through a catalog index.
//!
//! Output is a view over the indexed table holding the positions whose key
//! satisfies the predicate; ascending for range predicates, bucket order
//! for `eq`.

use std::sync::Arc;

use strata_storage::{KeyRange, View};
use tracing::debug;

use crate::descriptor::OperatorDescriptor;
use crate::traits::{OpContext, OpError, Operator};

#[derive(Debug, Clone)]
pub struct IndexScan {
    pub index: String,
    pub range: KeyRange,
}

impl IndexScan {
    pub const KIND: &'static str = "IndexScan";

    pub fn new(index: impl Into<String>, range: KeyRange) -> Self {
        Self {
            index: index.into(),
            range,
        }
    }

    /// `op` is one of `eq` (default), `lt`, `lte`, `gt`, `gte` with `value`,
    /// or `between` with `low` and `high`.
    pub fn from_descriptor(d: &OperatorDescriptor) -> Result<Self, OpError> {
        let index = d.str_param(Self::KIND, "index")?.to_string();
        let value = || d.scalar_param(Self::KIND, "value");
        let range = match d.opt_str("op").unwrap_or("eq") {
            "eq" => KeyRange::Equal(value()?),
            "lt" => KeyRange::Less(value()?),
            "lte" => KeyRange::LessOrEqual(value()?),
            "gt" => KeyRange::Greater(value()?),
            "gte" => KeyRange::GreaterOrEqual(value()?),
            "between" => KeyRange::Between(
                d.scalar_param(Self::KIND, "low")?,
                d.scalar_param(Self::KIND, "high")?,
            ),
            other => {
                return Err(OpError::param(
                    Self::KIND,
                    format!("unknown scan op '{other}'"),
                ))
            }
        };
        Ok(Self { index, range })
    }
}

impl Operator for IndexScan {
    fn name(&self) -> &'static str {
        Self::KIND
    }

    /// Either no input, or the indexed table itself.
    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, inputs: &[Arc<View>], ctx: &OpContext<'_>) -> Result<View, OpError> {
        let entry = ctx.catalog.index(&self.index)?;
        match inputs {
            [] => {}
            [input] if input.is_identity_of(entry.table()) => {}
            [_] => {
                return Err(OpError::param(
                    Self::KIND,
                    format!("input must be the table indexed by '{}'", self.index),
                ))
            }
            _ => {
                return Err(OpError::param(
                    Self::KIND,
                    format!("expects at most 1 input, got {}", inputs.len()),
                ))
            }
        }
        let positions = entry.lookup(&self.range)?;
        debug!(index = %self.index, matches = positions.len(), "index scan");
        let base = View::from_table(Arc::clone(entry.table()));
        ctx.view_over(&base, positions)
    }
}
