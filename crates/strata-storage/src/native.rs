//! Rust scalar types that back column tags.
//!
//! `NativeType` covers every storable kind; `IndexType` narrows it to the
//! closed set that `dispatch` can select, each carrying a totally ordered key
//! type for inverted indexes.

use std::borrow::Cow;
use std::fmt::Debug;

use ordered_float::OrderedFloat;
use strata_core::prelude::{DataType, Scalar};

use crate::column::ColumnData;
use crate::index::{AnyInvertedIndex, InvertedIndex};

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for String {}
    impl Sealed for Vec<u8> {}
}

pub trait NativeType: sealed::Sealed + Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Name used in `TypeMismatch` errors.
    const NAME: &'static str;

    /// Whether a column declared as `data_type` can be read as `Self`.
    fn accepts(data_type: DataType) -> bool;

    fn slice(data: &ColumnData) -> Option<&[Self]>;

    fn to_scalar(&self) -> Scalar;
}

pub trait IndexType: NativeType {
    type Key: Ord + Clone + Debug + Send + Sync + 'static;

    fn key(&self) -> Cow<'_, Self::Key>;

    /// Whether the value equals itself under `==`. Float NaN does not, and
    /// so never takes part in an equality join even though its key sorts.
    fn self_equal(&self) -> bool {
        true
    }

    /// Convert a dynamic probe value. Integers widen or narrow when the
    /// value fits; numbers convert to floats.
    fn from_scalar(value: &Scalar) -> Option<Self>;

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex;

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>>;
}

macro_rules! native {
    ($t:ty, $name:literal, $variant:ident, $scalar:ident, $($tag:pat_param)|+) => {
        impl NativeType for $t {
            const NAME: &'static str = $name;

            fn accepts(data_type: DataType) -> bool {
                matches!(data_type, $($tag)|+)
            }

            fn slice(data: &ColumnData) -> Option<&[Self]> {
                match data {
                    ColumnData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_scalar(&self) -> Scalar {
                Scalar::$scalar(self.clone())
            }
        }
    };
}

native!(bool, "boolean", Boolean, Bool, DataType::Boolean);
native!(i32, "int32", Int32, I32, DataType::Int32);
native!(i64, "int64", Int64, I64, DataType::Int64);
native!(f32, "float32", Float32, F32, DataType::Float32);
native!(f64, "float64", Float64, F64, DataType::Float64);
native!(String, "utf8", Utf8, Str, DataType::FixedUtf8(_) | DataType::Utf8);
native!(Vec<u8>, "binary", Binary, Bin, DataType::Binary);

/// Integer value of `value`, accepting floats only when they are whole and
/// in `i64` range.
fn integral(value: &Scalar) -> Option<i64> {
    // 2^63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    match value {
        Scalar::F32(_) | Scalar::F64(_) => {
            let v = value.as_f64()?;
            (v.fract() == 0.0 && (-LIMIT..LIMIT).contains(&v)).then(|| v as i64)
        }
        other => other.as_i64(),
    }
}

impl IndexType for i32 {
    type Key = i32;

    fn key(&self) -> Cow<'_, i32> {
        Cow::Borrowed(self)
    }

    fn from_scalar(value: &Scalar) -> Option<Self> {
        integral(value).and_then(|v| i32::try_from(v).ok())
    }

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex {
        AnyInvertedIndex::Int32(index)
    }

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>> {
        match index {
            AnyInvertedIndex::Int32(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexType for i64 {
    type Key = i64;

    fn key(&self) -> Cow<'_, i64> {
        Cow::Borrowed(self)
    }

    fn from_scalar(value: &Scalar) -> Option<Self> {
        integral(value)
    }

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex {
        AnyInvertedIndex::Int64(index)
    }

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>> {
        match index {
            AnyInvertedIndex::Int64(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexType for f32 {
    type Key = OrderedFloat<f32>;

    fn key(&self) -> Cow<'_, OrderedFloat<f32>> {
        Cow::Owned(OrderedFloat(*self))
    }

    fn self_equal(&self) -> bool {
        !self.is_nan()
    }

    fn from_scalar(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::F32(v) => Some(*v),
            other => other.as_f64().map(|v| v as f32),
        }
    }

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex {
        AnyInvertedIndex::Float32(index)
    }

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>> {
        match index {
            AnyInvertedIndex::Float32(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexType for f64 {
    type Key = OrderedFloat<f64>;

    fn key(&self) -> Cow<'_, OrderedFloat<f64>> {
        Cow::Owned(OrderedFloat(*self))
    }

    fn self_equal(&self) -> bool {
        !self.is_nan()
    }

    fn from_scalar(value: &Scalar) -> Option<Self> {
        value.as_f64()
    }

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex {
        AnyInvertedIndex::Float64(index)
    }

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>> {
        match index {
            AnyInvertedIndex::Float64(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexType for String {
    type Key = String;

    fn key(&self) -> Cow<'_, String> {
        Cow::Borrowed(self)
    }

    fn from_scalar(value: &Scalar) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn wrap(index: InvertedIndex<Self>) -> AnyInvertedIndex {
        AnyInvertedIndex::Utf8(index)
    }

    fn unwrap(index: &AnyInvertedIndex) -> Option<&InvertedIndex<Self>> {
        match index {
            AnyInvertedIndex::Utf8(idx) => Some(idx),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_accept_both_string_tags() {
        assert!(String::accepts(DataType::Utf8));
        assert!(String::accepts(DataType::FixedUtf8(8)));
        assert!(!String::accepts(DataType::Binary));
        assert!(!i32::accepts(DataType::Int64));
    }

    #[test]
    fn scalar_conversion_respects_range() {
        assert_eq!(i32::from_scalar(&Scalar::I64(7)), Some(7));
        assert_eq!(i32::from_scalar(&Scalar::I64(i64::MAX)), None);
        assert_eq!(f64::from_scalar(&Scalar::I32(2)), Some(2.0));
        assert_eq!(String::from_scalar(&Scalar::I32(2)), None);
    }

    #[test]
    fn whole_floats_convert_to_integers() {
        assert_eq!(i64::from_scalar(&Scalar::F64(5.0)), Some(5));
        assert_eq!(i32::from_scalar(&Scalar::F32(-3.0)), Some(-3));
        assert_eq!(i64::from_scalar(&Scalar::F64(5.5)), None);
        assert_eq!(i64::from_scalar(&Scalar::F64(f64::NAN)), None);
        assert_eq!(i64::from_scalar(&Scalar::F64(1e19)), None);
        assert_eq!(i32::from_scalar(&Scalar::F64(3e9)), None);
    }

    #[test]
    fn float_keys_are_totally_ordered() {
        assert!(f64::NAN.key() > 1.0f64.key());
        assert_eq!(f32::NAN.key(), f32::NAN.key());
        assert!(!f64::NAN.self_equal());
        assert!((-0.0f32).self_equal());
        assert_eq!((-0.0f64).key(), 0.0f64.key());
    }
}
