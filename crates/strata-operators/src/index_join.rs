//! Equi-join of a left view against a pre-built inverted index on the right
//! table.
//!
//! For every left row, in order, the matching right positions are emitted in
//! bucket (insertion) order. The output glues the left input re-indexed by
//! the left pair list (columns suffixed `_1`) to the indexed table re-indexed
//! by the right pair list (columns suffixed `_2`).

use std::iter;
use std::sync::Arc;

use strata_core::prelude::{Error, Result};
use strata_storage::{dispatch, AnyInvertedIndex, IndexType, Relation, TypeVisitor, View};
use tracing::debug;

use crate::descriptor::{FieldRef, OperatorDescriptor};
use crate::traits::{expect_inputs, OpContext, OpError, Operator};

#[derive(Debug, Clone)]
pub struct IndexJoin {
    /// Catalog name of the index over the right table.
    pub index: String,
    /// Join column of the left input.
    pub field: FieldRef,
}

impl IndexJoin {
    pub const KIND: &'static str = "IndexJoin";

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

impl Operator for IndexJoin {
    fn name(&self) -> &'static str {
        Self::KIND
    }

    fn arity(&self) -> usize {
        2
    }

    fn execute(&self, inputs: &[Arc<View>], ctx: &OpContext<'_>) -> Result<View, OpError> {
        let inputs = expect_inputs(self, inputs)?;
        let (left, right) = (&inputs[0], &inputs[1]);

        let entry = ctx.catalog.index(&self.index)?;
        let index_column = entry.column_name()?;
        if right.column_index(index_column).is_none() {
            return Err(OpError::param(
                Self::KIND,
                format!(
                    "index '{}' covers column '{index_column}', absent from the right input",
                    self.index
                ),
            ));
        }
        if !right.is_identity_of(entry.table()) {
            return Err(OpError::param(
                Self::KIND,
                format!("right input must be the table indexed by '{}'", self.index),
            ));
        }
        let column = self.field.resolve(Self::KIND, &**left)?;

        let (left_positions, right_positions) =
            index_join_positions(&**left, column, entry.index())?;
        debug!(
            index = %self.index,
            left_rows = left.row_count(),
            matches = left_positions.len(),
            "index join"
        );

        let left_out = ctx.view_over(left, left_positions)?.with_suffix("_1");
        let right_out = ctx.view_over(right, right_positions)?.with_suffix("_2");
        Ok(View::concat(&left_out, &right_out)?)
    }
}

/// Pair lists of an inner equi-join of `left.column` against `index`:
/// `(left rows, right table positions)`, equal length, ordered by left row
/// then bucket order.
pub fn index_join_positions<R: Relation>(
    left: &R,
    column: usize,
    index: &AnyInvertedIndex,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let data_type = left.column_type(column)?;
    dispatch(
        data_type,
        JoinProbe {
            left,
            column,
            index,
        },
    )?
}

struct JoinProbe<'a, R> {
    left: &'a R,
    column: usize,
    index: &'a AnyInvertedIndex,
}

impl<R: Relation> TypeVisitor for JoinProbe<'_, R> {
    type Output = Result<(Vec<usize>, Vec<usize>)>;

    fn visit<T: IndexType>(self) -> Self::Output {
        let index = match T::unwrap(self.index) {
            Some(index) => index,
            None => {
                return Err(Error::TypeMismatch {
                    column: self.left.column_name(self.column)?.to_string(),
                    declared: self.left.column_type(self.column)?,
                    requested: self.index.key_type_name(),
                })
            }
        };
        let reader = self.left.reader::<T>(self.column)?;
        let mut left_positions = Vec::with_capacity(reader.len());
        let mut right_positions = Vec::with_capacity(reader.len());
        for (row, value) in reader.iter().enumerate() {
            if !value.self_equal() {
                continue;
            }
            let matches = index.lookup_equal(value);
            left_positions.extend(iter::repeat(row).take(matches.len()));
            right_positions.extend_from_slice(matches);
        }
        Ok((left_positions, right_positions))
    }
}
