//! Serialized operator references as they appear in a plan.
//!
//! ```json
//! { "type": "IndexJoin", "index": "b_idx", "fields": ["A"] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strata_core::prelude::Scalar;
use strata_storage::Relation;

use crate::traits::OpError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining keys of the plan entry.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl OperatorDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn from_json(s: &str) -> Result<Self, OpError> {
        Ok(serde_json::from_str(s).map_err(strata_core::prelude::Error::from)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Required string parameter.
    pub fn str_param(&self, operator: &'static str, key: &str) -> Result<&str, OpError> {
        match self.params.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(other) => Err(OpError::param(
                operator,
                format!("parameter '{key}' must be a non-empty string, got {other}"),
            )),
            None => Err(OpError::param(operator, format!("missing parameter '{key}'"))),
        }
    }

    /// Optional string parameter.
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// The `fields` array: column names or ordinals.
    pub fn fields(&self, operator: &'static str) -> Result<Vec<FieldRef>, OpError> {
        let arr = self
            .params
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| OpError::param(operator, "missing parameter 'fields'"))?;
        arr.iter()
            .map(|v| FieldRef::from_json(v).ok_or_else(|| {
                OpError::param(operator, format!("invalid field reference {v}"))
            }))
            .collect()
    }

    /// `fields` holding exactly one entry.
    pub fn single_field(&self, operator: &'static str) -> Result<FieldRef, OpError> {
        let mut fields = self.fields(operator)?;
        if fields.len() != 1 {
            return Err(OpError::param(
                operator,
                format!("expects exactly one field, got {}", fields.len()),
            ));
        }
        Ok(fields.remove(0))
    }

    /// Required scalar parameter.
    pub fn scalar_param(&self, operator: &'static str, key: &str) -> Result<Scalar, OpError> {
        let v = self
            .params
            .get(key)
            .ok_or_else(|| OpError::param(operator, format!("missing parameter '{key}'")))?;
        scalar_from_json(v).ok_or_else(|| {
            OpError::param(operator, format!("parameter '{key}' is not a scalar: {v}"))
        })
    }
}

/// JSON literal -> `Scalar`. Integers become `I64`, other numbers `F64`.
pub fn scalar_from_json(v: &Value) -> Option<Scalar> {
    match v {
        Value::Bool(b) => Some(Scalar::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Scalar::I64(i)),
            None => n.as_f64().map(Scalar::F64),
        },
        Value::String(s) => Some(Scalar::Str(s.clone())),
        _ => None,
    }
}

/// A column named either by ordinal or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    Index(usize),
    Name(String),
}

impl FieldRef {
    fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) if !s.is_empty() => Some(FieldRef::Name(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(FieldRef::Index),
            _ => None,
        }
    }

    /// Ordinal of this field in `relation`.
    pub fn resolve<R: Relation>(&self, operator: &'static str, relation: &R) -> Result<usize, OpError> {
        match self {
            FieldRef::Index(i) if *i < relation.column_count() => Ok(*i),
            FieldRef::Index(i) => Err(OpError::param(
                operator,
                format!(
                    "field {i} out of range for input with {} columns",
                    relation.column_count()
                ),
            )),
            FieldRef::Name(name) => relation
                .column_index(name)
                .ok_or_else(|| OpError::param(operator, format!("unknown column '{name}'"))),
        }
    }
}

impl From<usize> for FieldRef {
    fn from(i: usize) -> Self {
        FieldRef::Index(i)
    }
}

impl From<&str> for FieldRef {
    fn from(s: &str) -> Self {
        FieldRef::Name(s.to_string())
    }
}

impl From<&FieldRef> for Value {
    fn from(f: &FieldRef) -> Self {
        match f {
            FieldRef::Index(i) => Value::from(*i),
            FieldRef::Name(n) => Value::from(n.as_str()),
        }
    }
}
