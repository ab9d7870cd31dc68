//! Build an inverted index over a table column and register it.
//!
//! The input must be the identity view of a table: an index holds positions
//! into a root table, never into a filtered view. The input passes through.

use std::sync::Arc;

use strata_storage::{IndexEntry, View};
use tracing::debug;

use crate::descriptor::{FieldRef, OperatorDescriptor};
use crate::traits::{expect_inputs, OpContext, OpError, Operator};

#[derive(Debug, Clone)]
pub struct CreateIndex {
    pub index: String,
    pub field: FieldRef,
}

impl CreateIndex {
    pub const KIND: &'static str = "CreateIndex";

    pub fn new(index: impl Into<String>, field: impl Into<FieldRef>) -> Self {
        Self {
            index: index.into(),
            field: field.into(),
        }
    }

    pub fn from_descriptor(d: &OperatorDescriptor) -> Result<Self, OpError> {
        Ok(Self {
            index: d.str_param(Self::KIND, "index")?.to_string(),
            field: d.single_field(Self::KIND)?,
        })
    }
}

impl Operator for CreateIndex {
    fn name(&self) -> &'static str {
        Self::KIND
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, inputs: &[Arc<View>], ctx: &OpContext<'_>) -> Result<View, OpError> {
        let input = &expect_inputs(self, inputs)?[0];
        let column = self.field.resolve(Self::KIND, &**input)?;
        let table = match input.single_source() {
            Some((table, _)) if input.is_identity_of(table) => Arc::clone(table),
            _ => {
                return Err(OpError::param(
                    Self::KIND,
                    "input must be an unfiltered table",
                ))
            }
        };
        let (_, root_column) = input.source_column(column)?;
        let entry = IndexEntry::build(self.index.clone(), table, root_column)?;
        debug!(
            index = %self.index,
            keys = entry.index().key_count(),
            rows = entry.index().row_count(),
            "built inverted index"
        );
        ctx.catalog.add_index(entry)?;
        Ok((**input).clone())
    }
}
