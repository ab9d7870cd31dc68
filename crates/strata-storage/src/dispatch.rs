//! Runtime tag -> monomorphized code path.
//!
//! A `TypeVisitor` is the "generic callable": `dispatch` inspects the tag once
//! and calls `visit::<T>()` with the matching Rust type, so the visitor's loop
//! over rows runs without per-value dynamic dispatch. The match below is
//! exhaustive over `DataType`; adding a tag fails to compile until it is
//! handled.

use strata_core::prelude::{DataType, Error, Result};

use crate::native::IndexType;

pub trait TypeVisitor {
    type Output;

    fn visit<T: IndexType>(self) -> Self::Output;
}

pub fn dispatch<V: TypeVisitor>(data_type: DataType, visitor: V) -> Result<V::Output> {
    match data_type {
        DataType::Int32 => Ok(visitor.visit::<i32>()),
        DataType::Int64 => Ok(visitor.visit::<i64>()),
        DataType::Float32 => Ok(visitor.visit::<f32>()),
        DataType::Float64 => Ok(visitor.visit::<f64>()),
        DataType::FixedUtf8(_) | DataType::Utf8 => Ok(visitor.visit::<String>()),
        DataType::Boolean | DataType::Binary => Err(Error::UnsupportedType(data_type)),
    }
}

pub fn is_dispatchable(data_type: DataType) -> bool {
    !matches!(data_type, DataType::Boolean | DataType::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeType;

    struct TypeName;

    impl TypeVisitor for TypeName {
        type Output = &'static str;

        fn visit<T: IndexType>(self) -> &'static str {
            T::NAME
        }
    }

    #[test]
    fn selects_the_matching_instantiation() {
        assert_eq!(dispatch(DataType::Int32, TypeName).unwrap(), "int32");
        assert_eq!(dispatch(DataType::Float64, TypeName).unwrap(), "float64");
        assert_eq!(dispatch(DataType::FixedUtf8(4), TypeName).unwrap(), "utf8");
    }

    #[test]
    fn rejects_tags_outside_the_closed_set() {
        assert_eq!(
            dispatch(DataType::Boolean, TypeName),
            Err(Error::UnsupportedType(DataType::Boolean))
        );
        assert!(!is_dispatchable(DataType::Binary));
        assert!(is_dispatchable(DataType::Utf8));
    }
}
