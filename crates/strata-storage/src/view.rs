//! Zero-copy position-list views.
//!
//! A view is a set of *parts*, each a root table plus a position list of the
//! same length, and a list of output columns pointing into those parts. A
//! view over one table has one part; gluing two views side by side (the join
//! output) concatenates their parts. Building a view over a view composes the
//! position lists against the roots right away, so there are never chains.

use std::sync::Arc;

use strata_core::prelude::{DataType, Error, Result, Scalar};

use crate::native::NativeType;
use crate::table::{ColumnReader, Relation, Table};

/// Row positions into a base. `Identity(n)` stands for `[0, n)` without
/// materializing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Positions {
    Identity(usize),
    List(Arc<[usize]>),
}

impl Positions {
    pub fn len(&self) -> usize {
        match self {
            Positions::Identity(n) => *n,
            Positions::List(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Positions::Identity(_))
    }

    /// Panics if `i` is out of range.
    #[inline]
    pub fn resolve(&self, i: usize) -> usize {
        match self {
            Positions::Identity(n) => {
                assert!(i < *n, "position {i} out of range for identity({n})");
                i
            }
            Positions::List(l) => l[i],
        }
    }

    pub fn get(&self, i: usize) -> Option<usize> {
        match self {
            Positions::Identity(n) => (i < *n).then_some(i),
            Positions::List(l) => l.get(i).copied(),
        }
    }

    pub fn as_slice(&self) -> Option<&[usize]> {
        match self {
            Positions::Identity(_) => None,
            Positions::List(l) => Some(l),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |i| self.resolve(i))
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// `composed[i] = self[outer[i]]`.
    pub fn compose(&self, outer: &Positions) -> Positions {
        match (self, outer) {
            (Positions::Identity(_), _) => outer.clone(),
            (Positions::List(base), Positions::Identity(n)) if *n == base.len() => self.clone(),
            (Positions::List(base), Positions::Identity(n)) => Positions::List(base[..*n].into()),
            (Positions::List(base), Positions::List(o)) => {
                Positions::List(o.iter().map(|&i| base[i]).collect())
            }
        }
    }

    /// Fails if any entry is `>= bound`.
    pub fn check(&self, bound: usize) -> Result<()> {
        let out_of_range = match self {
            Positions::Identity(n) => (*n > bound).then(|| n - 1),
            Positions::List(l) => l.iter().copied().find(|&p| p >= bound),
        };
        match out_of_range {
            Some(index) => Err(Error::OutOfBounds {
                what: "position",
                index,
                len: bound,
            }),
            None => Ok(()),
        }
    }
}

impl From<Vec<usize>> for Positions {
    fn from(v: Vec<usize>) -> Self {
        Positions::List(v.into())
    }
}

impl From<Arc<[usize]>> for Positions {
    fn from(v: Arc<[usize]>) -> Self {
        Positions::List(v)
    }
}

#[derive(Debug, Clone)]
struct Part {
    table: Arc<Table>,
    positions: Positions,
}

#[derive(Debug, Clone)]
struct ViewColumn {
    part: usize,
    column: usize,
    name: String,
}

#[derive(Debug, Clone)]
pub struct View {
    parts: Vec<Part>,
    columns: Vec<ViewColumn>,
    rows: usize,
}

impl View {
    /// Identity view; observationally identical to `table`.
    pub fn from_table(table: Arc<Table>) -> Self {
        let rows = table.row_count();
        Self::build(table, Positions::Identity(rows))
    }

    /// View of `table` re-indexed by `positions`. Entries are not validated
    /// outside debug builds; use `checked` for untrusted lists.
    pub fn new(table: Arc<Table>, positions: impl Into<Positions>) -> Self {
        let positions = positions.into();
        debug_assert!(positions.check(table.row_count()).is_ok());
        Self::build(table, positions)
    }

    pub fn checked(table: Arc<Table>, positions: impl Into<Positions>) -> Result<Self> {
        let positions = positions.into();
        positions.check(table.row_count())?;
        Ok(Self::build(table, positions))
    }

    fn build(table: Arc<Table>, positions: Positions) -> Self {
        let rows = positions.len();
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(column, c)| ViewColumn {
                part: 0,
                column,
                name: c.name().to_string(),
            })
            .collect();
        Self {
            parts: vec![Part { table, positions }],
            columns,
            rows,
        }
    }

    /// View of this view re-indexed by `positions` (rows of `self`). The
    /// result references the root tables directly.
    pub fn over(&self, positions: impl Into<Positions>) -> View {
        let positions = positions.into();
        debug_assert!(positions.check(self.rows).is_ok());
        self.compose(&positions)
    }

    pub fn checked_over(&self, positions: impl Into<Positions>) -> Result<View> {
        let positions = positions.into();
        positions.check(self.rows)?;
        Ok(self.compose(&positions))
    }

    fn compose(&self, outer: &Positions) -> View {
        let parts = self
            .parts
            .iter()
            .map(|p| Part {
                table: Arc::clone(&p.table),
                positions: p.positions.compose(outer),
            })
            .collect();
        View {
            parts,
            columns: self.columns.clone(),
            rows: outer.len(),
        }
    }

    /// Glue two views with equal row counts side by side; row `i` of the
    /// result is row `i` of `left` followed by row `i` of `right`.
    pub fn concat(left: &View, right: &View) -> Result<View> {
        if left.rows != right.rows {
            return Err(Error::Schema(format!(
                "cannot glue views with {} and {} rows",
                left.rows, right.rows
            )));
        }
        let offset = left.parts.len();
        let mut parts = left.parts.clone();
        parts.extend(right.parts.iter().cloned());
        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().map(|c| ViewColumn {
            part: c.part + offset,
            ..c.clone()
        }));
        Ok(View {
            parts,
            columns,
            rows: left.rows,
        })
    }

    /// Change the name a column is exposed under. The underlying column is
    /// untouched.
    pub fn rename(&mut self, column: usize, name: impl Into<String>) -> Result<()> {
        let len = self.columns.len();
        let c = self.columns.get_mut(column).ok_or(Error::OutOfBounds {
            what: "column",
            index: column,
            len,
        })?;
        c.name = name.into();
        Ok(())
    }

    /// Append `suffix` to every column name.
    pub fn with_suffix(mut self, suffix: &str) -> View {
        for c in &mut self.columns {
            c.name.push_str(suffix);
        }
        self
    }

    /// Single root table and its position list, if the view has one part.
    pub fn single_source(&self) -> Option<(&Arc<Table>, &Positions)> {
        match self.parts.as_slice() {
            [p] => Some((&p.table, &p.positions)),
            _ => None,
        }
    }

    /// True when this is the unfiltered identity view of `table`.
    pub fn is_identity_of(&self, table: &Arc<Table>) -> bool {
        match self.single_source() {
            Some((t, positions)) => {
                Arc::ptr_eq(t, table)
                    && positions.is_identity()
                    && positions.len() == table.row_count()
            }
            None => false,
        }
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Root table and column behind a view column.
    pub fn source_column(&self, column: usize) -> Result<(&Arc<Table>, usize)> {
        let c = self.view_column(column)?;
        Ok((&self.parts[c.part].table, c.column))
    }

    /// Position list, against the root table, behind a view column.
    pub fn positions_of(&self, column: usize) -> Result<&Positions> {
        let c = self.view_column(column)?;
        Ok(&self.parts[c.part].positions)
    }

    fn view_column(&self, column: usize) -> Result<&ViewColumn> {
        self.columns.get(column).ok_or(Error::OutOfBounds {
            what: "column",
            index: column,
            len: self.columns.len(),
        })
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(Error::OutOfBounds {
                what: "row",
                index: row,
                len: self.rows,
            });
        }
        Ok(())
    }
}

impl Relation for View {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> Result<&str> {
        self.view_column(column).map(|c| c.name.as_str())
    }

    fn column_type(&self, column: usize) -> Result<DataType> {
        let (table, column) = self.source_column(column)?;
        table.column_type(column)
    }

    fn reader<T: NativeType>(&self, column: usize) -> Result<ColumnReader<'_, T>> {
        let c = self.view_column(column)?;
        let part = &self.parts[c.part];
        let values = part.table.values::<T>(c.column)?;
        Ok(match part.positions.as_slice() {
            Some(list) => ColumnReader::new(values, Some(list)),
            None => ColumnReader::new(&values[..self.rows], None),
        })
    }

    fn scalar(&self, column: usize, row: usize) -> Result<Scalar> {
        self.check_row(row)?;
        let c = self.view_column(column)?;
        let part = &self.parts[c.part];
        part.table.scalar(c.column, part.positions.resolve(row))
    }
}
