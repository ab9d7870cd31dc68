//! Typed column storage.

use strata_core::prelude::{DataType, Error, Field, Result, Scalar};

/// Values of one column, stored contiguously per scalar kind.
/// `FixedUtf8` and `Utf8` columns share the `Utf8` representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
    Binary(Vec<Vec<u8>>),
}

impl ColumnData {
    /// Empty storage for a tag.
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => ColumnData::Boolean(Vec::new()),
            DataType::Int32 => ColumnData::Int32(Vec::new()),
            DataType::Int64 => ColumnData::Int64(Vec::new()),
            DataType::Float32 => ColumnData::Float32(Vec::new()),
            DataType::Float64 => ColumnData::Float64(Vec::new()),
            DataType::FixedUtf8(_) | DataType::Utf8 => ColumnData::Utf8(Vec::new()),
            DataType::Binary => ColumnData::Binary(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Binary(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tag a column gets when none is declared.
    pub fn natural_type(&self) -> DataType {
        match self {
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Binary(_) => DataType::Binary,
        }
    }

    /// Whether this storage can back a column declared as `data_type`.
    pub fn accepts(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (ColumnData::Boolean(_), DataType::Boolean)
                | (ColumnData::Int32(_), DataType::Int32)
                | (ColumnData::Int64(_), DataType::Int64)
                | (ColumnData::Float32(_), DataType::Float32)
                | (ColumnData::Float64(_), DataType::Float64)
                | (ColumnData::Utf8(_), DataType::FixedUtf8(_) | DataType::Utf8)
                | (ColumnData::Binary(_), DataType::Binary)
        )
    }

    pub fn scalar(&self, row: usize) -> Option<Scalar> {
        Some(match self {
            ColumnData::Boolean(v) => Scalar::Bool(*v.get(row)?),
            ColumnData::Int32(v) => Scalar::I32(*v.get(row)?),
            ColumnData::Int64(v) => Scalar::I64(*v.get(row)?),
            ColumnData::Float32(v) => Scalar::F32(*v.get(row)?),
            ColumnData::Float64(v) => Scalar::F64(*v.get(row)?),
            ColumnData::Utf8(v) => Scalar::Str(v.get(row)?.clone()),
            ColumnData::Binary(v) => Scalar::Bin(v.get(row)?.clone()),
        })
    }
}

macro_rules! column_data_from {
    ($t:ty, $variant:ident) => {
        impl From<Vec<$t>> for ColumnData {
            fn from(v: Vec<$t>) -> Self {
                ColumnData::$variant(v)
            }
        }
    };
}

column_data_from!(bool, Boolean);
column_data_from!(i32, Int32);
column_data_from!(i64, Int64);
column_data_from!(f32, Float32);
column_data_from!(f64, Float64);
column_data_from!(String, Utf8);
column_data_from!(Vec<u8>, Binary);

impl From<Vec<&str>> for ColumnData {
    fn from(v: Vec<&str>) -> Self {
        ColumnData::Utf8(v.into_iter().map(str::to_string).collect())
    }
}

/// A named, typed column. The tag never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    field: Field,
    data: ColumnData,
}

impl Column {
    /// Column tagged with the storage's natural type.
    pub fn new(name: impl Into<String>, data: impl Into<ColumnData>) -> Self {
        let data = data.into();
        Self {
            field: Field::new(name, data.natural_type()),
            data,
        }
    }

    /// Column with an explicit tag, validated against the storage.
    pub fn with_type(
        name: impl Into<String>,
        data_type: DataType,
        data: impl Into<ColumnData>,
    ) -> Result<Self> {
        let name = name.into();
        let data = data.into();
        if !data.accepts(data_type) {
            return Err(Error::Schema(format!(
                "column '{name}' declared {data_type} but holds {} values",
                data.natural_type()
            )));
        }
        if let (DataType::FixedUtf8(width), ColumnData::Utf8(values)) = (data_type, &data) {
            if let Some((row, v)) = values
                .iter()
                .enumerate()
                .find(|(_, v)| v.len() > width as usize)
            {
                return Err(Error::Schema(format!(
                    "column '{name}' row {row}: {} bytes exceed fixed width {width}",
                    v.len()
                )));
            }
        }
        Ok(Self {
            field: Field::new(name, data_type),
            data,
        })
    }

    pub fn fixed_utf8(name: impl Into<String>, width: u32, values: Vec<String>) -> Result<Self> {
        Self::with_type(name, DataType::FixedUtf8(width), values)
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn data_type(&self) -> DataType {
        self.field.data_type
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
