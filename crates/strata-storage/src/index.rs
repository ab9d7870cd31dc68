//! Ordered inverted index: column value -> row positions.
//!
//! Built once over an immutable snapshot. Buckets keep insertion (row) order;
//! range lookups merge several buckets and sort the result ascending.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use strata_core::prelude::{DataType, Error, Result, Scalar};

use crate::dispatch::{dispatch, TypeVisitor};
use crate::native::{IndexType, NativeType};
use crate::table::Relation;

#[derive(Debug, Clone)]
pub struct InvertedIndex<T: IndexType> {
    buckets: BTreeMap<T::Key, Vec<usize>>,
    rows: usize,
}

impl<T: IndexType> Default for InvertedIndex<T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            rows: 0,
        }
    }
}

impl<T: IndexType> InvertedIndex<T> {
    /// Append each row of `column` to the bucket of its value.
    pub fn build<R: Relation>(relation: &R, column: usize) -> Result<Self> {
        let reader = relation.reader::<T>(column)?;
        Ok(Self::from_values(reader.iter()))
    }

    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a T>) -> Self {
        let mut index = Self::default();
        for (row, value) in values.into_iter().enumerate() {
            let key = value.key();
            match index.buckets.get_mut(&*key) {
                Some(bucket) => bucket.push(row),
                None => {
                    index.buckets.insert(key.into_owned(), vec![row]);
                }
            }
            index.rows += 1;
        }
        index
    }

    /// Positions holding exactly `key`, in insertion order.
    pub fn lookup_equal(&self, key: &T) -> &[usize] {
        self.buckets
            .get(&*key.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lookup_less(&self, key: &T) -> Vec<usize> {
        let k = key.key();
        self.collect((Bound::Unbounded, Bound::Excluded(&*k)))
    }

    pub fn lookup_less_or_equal(&self, key: &T) -> Vec<usize> {
        let k = key.key();
        self.collect((Bound::Unbounded, Bound::Included(&*k)))
    }

    pub fn lookup_greater(&self, key: &T) -> Vec<usize> {
        let k = key.key();
        self.collect((Bound::Excluded(&*k), Bound::Unbounded))
    }

    pub fn lookup_greater_or_equal(&self, key: &T) -> Vec<usize> {
        let k = key.key();
        self.collect((Bound::Included(&*k), Bound::Unbounded))
    }

    /// Inclusive on both ends; empty when `low > high`.
    pub fn lookup_between(&self, low: &T, high: &T) -> Vec<usize> {
        let (lo, hi) = (low.key(), high.key());
        if lo > hi {
            return Vec::new();
        }
        self.collect((Bound::Included(&*lo), Bound::Included(&*hi)))
    }

    fn collect(&self, range: (Bound<&T::Key>, Bound<&T::Key>)) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .buckets
            .range::<T::Key, _>(range)
            .flat_map(|(_, bucket)| bucket.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// Release excess bucket capacity.
    pub fn compact(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.shrink_to_fit();
        }
    }

    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of rows indexed.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Buckets in key order.
    pub fn buckets(&self) -> impl Iterator<Item = (&T::Key, &[usize])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Dynamic probe against an index whose key type is only known at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRange {
    Equal(Scalar),
    Less(Scalar),
    LessOrEqual(Scalar),
    Greater(Scalar),
    GreaterOrEqual(Scalar),
    Between(Scalar, Scalar),
}

/// Closed union over the index instantiations `dispatch` can produce.
#[derive(Debug, Clone)]
pub enum AnyInvertedIndex {
    Int32(InvertedIndex<i32>),
    Int64(InvertedIndex<i64>),
    Float32(InvertedIndex<f32>),
    Float64(InvertedIndex<f64>),
    Utf8(InvertedIndex<String>),
}

struct BuildIndex<'a, R> {
    relation: &'a R,
    column: usize,
}

impl<R: Relation> TypeVisitor for BuildIndex<'_, R> {
    type Output = Result<AnyInvertedIndex>;

    fn visit<T: IndexType>(self) -> Self::Output {
        let mut index = InvertedIndex::<T>::build(self.relation, self.column)?;
        index.compact();
        Ok(T::wrap(index))
    }
}

macro_rules! each_index {
    ($self:expr, $idx:ident => $body:expr) => {
        match $self {
            AnyInvertedIndex::Int32($idx) => $body,
            AnyInvertedIndex::Int64($idx) => $body,
            AnyInvertedIndex::Float32($idx) => $body,
            AnyInvertedIndex::Float64($idx) => $body,
            AnyInvertedIndex::Utf8($idx) => $body,
        }
    };
}

impl AnyInvertedIndex {
    /// Build over `column`, selecting the key type from the column tag.
    pub fn build<R: Relation>(relation: &R, column: usize) -> Result<Self> {
        let data_type = relation.column_type(column)?;
        dispatch(data_type, BuildIndex { relation, column })?
    }

    /// Tag of the key type; string indexes report `Utf8`.
    pub fn key_type(&self) -> DataType {
        match self {
            AnyInvertedIndex::Int32(_) => DataType::Int32,
            AnyInvertedIndex::Int64(_) => DataType::Int64,
            AnyInvertedIndex::Float32(_) => DataType::Float32,
            AnyInvertedIndex::Float64(_) => DataType::Float64,
            AnyInvertedIndex::Utf8(_) => DataType::Utf8,
        }
    }

    /// Name of the key type as used in `TypeMismatch` errors.
    pub fn key_type_name(&self) -> &'static str {
        match self {
            AnyInvertedIndex::Int32(_) => i32::NAME,
            AnyInvertedIndex::Int64(_) => i64::NAME,
            AnyInvertedIndex::Float32(_) => f32::NAME,
            AnyInvertedIndex::Float64(_) => f64::NAME,
            AnyInvertedIndex::Utf8(_) => String::NAME,
        }
    }

    pub fn typed<T: IndexType>(&self) -> Option<&InvertedIndex<T>> {
        T::unwrap(self)
    }

    pub fn row_count(&self) -> usize {
        each_index!(self, idx => idx.row_count())
    }

    pub fn key_count(&self) -> usize {
        each_index!(self, idx => idx.key_count())
    }

    pub fn compact(&mut self) {
        each_index!(self, idx => idx.compact())
    }

    /// Probe with dynamic values. Every result is ascending except
    /// `Equal`, which keeps bucket insertion order.
    pub fn lookup(&self, range: &KeyRange) -> Result<Vec<usize>> {
        self.lookup_on("key", range)
    }

    /// `lookup`, naming `column` in a `TypeMismatch` for a bound that does
    /// not convert to the key type.
    pub fn lookup_on(&self, column: &str, range: &KeyRange) -> Result<Vec<usize>> {
        each_index!(self, idx => probe(idx, column, self.key_type(), range))
    }
}

fn probe<T: IndexType>(
    index: &InvertedIndex<T>,
    column: &str,
    key_type: DataType,
    range: &KeyRange,
) -> Result<Vec<usize>> {
    let key = |s: &Scalar| {
        T::from_scalar(s).ok_or_else(|| Error::TypeMismatch {
            column: column.to_string(),
            declared: key_type,
            requested: scalar_kind(s),
        })
    };
    Ok(match range {
        KeyRange::Equal(k) => index.lookup_equal(&key(k)?).to_vec(),
        KeyRange::Less(k) => index.lookup_less(&key(k)?),
        KeyRange::LessOrEqual(k) => index.lookup_less_or_equal(&key(k)?),
        KeyRange::Greater(k) => index.lookup_greater(&key(k)?),
        KeyRange::GreaterOrEqual(k) => index.lookup_greater_or_equal(&key(k)?),
        KeyRange::Between(lo, hi) => index.lookup_between(&key(lo)?, &key(hi)?),
    })
}

fn scalar_kind(s: &Scalar) -> &'static str {
    match s {
        Scalar::Bool(_) => "boolean",
        Scalar::I32(_) => "int32",
        Scalar::I64(_) => "int64",
        Scalar::F32(_) => "float32",
        Scalar::F64(_) => "float64",
        Scalar::Str(_) => "utf8",
        Scalar::Bin(_) => "binary",
    }
}
