//! Source operator: identity view of a catalog table.

use std::sync::Arc;

use strata_storage::View;

use crate::descriptor::OperatorDescriptor;
use crate::traits::{expect_inputs, OpContext, OpError, Operator};

#[derive(Debug, Clone)]
pub struct GetTable {
    pub table: String,
}

impl GetTable {
    pub const KIND: &'static str = "GetTable";

    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn from_descriptor(d: &OperatorDescriptor) -> Result<Self, OpError> {
        Ok(Self::new(d.str_param(Self::KIND, "table")?))
    }
}

impl Operator for GetTable {
    fn name(&self) -> &'static str {
        Self::KIND
    }

    fn arity(&self) -> usize {
        0
    }

    fn execute(&self, inputs: &[Arc<View>], ctx: &OpContext<'_>) -> Result<View, OpError> {
        expect_inputs(self, inputs)?;
        let table = ctx.catalog.table(&self.table)?;
        Ok(View::from_table(table))
    }
}
