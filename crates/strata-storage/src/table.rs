//! Columnar table and the read surface shared with views.

use strata_core::prelude::{DataType, Error, Result, Scalar, Schema};

use crate::column::{Column, ColumnData};
use crate::native::NativeType;

/// Read access shared by tables and views.
///
/// A view over the identity position list of a table answers every method
/// exactly like the table itself.
pub trait Relation {
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    fn column_name(&self, column: usize) -> Result<&str>;

    fn column_type(&self, column: usize) -> Result<DataType>;

    /// Resolve a typed reader once; per-row reads are then a position lookup
    /// and a slice index.
    fn reader<T: NativeType>(&self, column: usize) -> Result<ColumnReader<'_, T>>;

    fn scalar(&self, column: usize, row: usize) -> Result<Scalar>;

    /// Typed, checked single-value read. `T` must match the column tag.
    fn value<T: NativeType>(&self, column: usize, row: usize) -> Result<&T> {
        let reader = self.reader::<T>(column)?;
        if row >= reader.len() {
            return Err(Error::OutOfBounds {
                what: "row",
                index: row,
                len: reader.len(),
            });
        }
        Ok(reader.get(row))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|&i| self.column_name(i).map_or(false, |n| n == name))
    }

    fn schema(&self) -> Schema {
        let fields = (0..self.column_count())
            .filter_map(|i| {
                let name = self.column_name(i).ok()?;
                let data_type = self.column_type(i).ok()?;
                Some(strata_core::schema::Field::new(name, data_type))
            })
            .collect();
        Schema::new(fields)
    }

    /// Materialize every row as scalars. Meant for results and tests.
    fn to_rows(&self) -> Result<Vec<Vec<Scalar>>> {
        (0..self.row_count())
            .map(|row| {
                (0..self.column_count())
                    .map(|col| self.scalar(col, row))
                    .collect()
            })
            .collect()
    }
}

/// Typed reader over one column, optionally re-indexed by a position list.
#[derive(Debug, Clone, Copy)]
pub struct ColumnReader<'a, T> {
    values: &'a [T],
    positions: Option<&'a [usize]>,
}

impl<'a, T> ColumnReader<'a, T> {
    pub(crate) fn new(values: &'a [T], positions: Option<&'a [usize]>) -> Self {
        Self { values, positions }
    }

    pub fn len(&self) -> usize {
        self.positions.map_or(self.values.len(), <[usize]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Panics if `row` is out of range.
    #[inline]
    pub fn get(&self, row: usize) -> &'a T {
        match self.positions {
            Some(p) => &self.values[p[row]],
            None => &self.values[row],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        (0..self.len()).map(move |row| self.get(row))
    }
}

/// An ordered set of equally long, typed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(Error::Schema(format!(
                "column '{}' has {} rows, expected {rows}",
                bad.name(),
                bad.len()
            )));
        }
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|p| p.name() == c.name()) {
                return Err(Error::Schema(format!("duplicate column '{}'", c.name())));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Zero-row table with the given schema.
    pub fn empty(schema: &Schema) -> Result<Self> {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::with_type(&f.name, f.data_type, ColumnData::empty(f.data_type)))
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(columns)
    }

    pub fn column(&self, column: usize) -> Result<&Column> {
        self.columns.get(column).ok_or(Error::OutOfBounds {
            what: "column",
            index: column,
            len: self.columns.len(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Typed slice of a whole column.
    pub fn values<T: NativeType>(&self, column: usize) -> Result<&[T]> {
        let col = self.column(column)?;
        if !T::accepts(col.data_type()) {
            return Err(Error::TypeMismatch {
                column: col.name().to_string(),
                declared: col.data_type(),
                requested: T::NAME,
            });
        }
        T::slice(col.data()).ok_or_else(|| {
            Error::Invariant(format!("column '{}' storage does not match its tag", col.name()))
        })
    }
}

impl Relation for Table {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> Result<&str> {
        self.column(column).map(Column::name)
    }

    fn column_type(&self, column: usize) -> Result<DataType> {
        self.column(column).map(Column::data_type)
    }

    fn reader<T: NativeType>(&self, column: usize) -> Result<ColumnReader<'_, T>> {
        Ok(ColumnReader::new(self.values::<T>(column)?, None))
    }

    fn scalar(&self, column: usize, row: usize) -> Result<Scalar> {
        self.column(column)?
            .data()
            .scalar(row)
            .ok_or(Error::OutOfBounds {
                what: "row",
                index: row,
                len: self.rows,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::Field;

    fn people() -> Table {
        Table::try_new(vec![
            Column::new("id", vec![1i64, 2, 3]),
            Column::new("name", vec!["ann", "bob", "cid"]),
        ])
        .unwrap()
    }

    #[test]
    fn exposes_shape_and_names() {
        let t = people();
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.column_name(1).unwrap(), "name");
        assert_eq!(t.column_type(0).unwrap(), DataType::Int64);
        assert_eq!(t.column_index("name"), Some(1));
    }

    #[test]
    fn typed_read_checks_the_tag() {
        let t = people();
        assert_eq!(*t.value::<i64>(0, 2).unwrap(), 3);
        assert_eq!(t.value::<String>(1, 0).unwrap(), "ann");
        let err = t.value::<i32>(0, 0).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                column: "id".into(),
                declared: DataType::Int64,
                requested: "int32",
            }
        );
    }

    #[test]
    fn out_of_range_reads_fail() {
        let t = people();
        assert!(matches!(
            t.value::<i64>(0, 3),
            Err(Error::OutOfBounds { what: "row", .. })
        ));
        assert!(matches!(
            t.scalar(5, 0),
            Err(Error::OutOfBounds { what: "column", .. })
        ));
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let ragged = Table::try_new(vec![
            Column::new("a", vec![1i32, 2]),
            Column::new("b", vec![1i32]),
        ]);
        assert!(matches!(ragged, Err(Error::Schema(_))));
        let dup = Table::try_new(vec![
            Column::new("a", vec![1i32]),
            Column::new("a", vec![2i32]),
        ]);
        assert!(matches!(dup, Err(Error::Schema(_))));
    }

    #[test]
    fn empty_table_keeps_schema() {
        let schema = Schema::new(vec![
            Field::new("k", DataType::FixedUtf8(4)),
            Field::new("v", DataType::Float32),
        ]);
        let t = Table::empty(&schema).unwrap();
        assert_eq!(t.row_count(), 0);
        assert_eq!(t.schema(), schema);
        assert!(t.to_rows().unwrap().is_empty());
    }
}
