//! Table and index registry.
//!
//! Create-once, get-by-name, no implicit creation. A `Catalog` is an ordinary
//! value shared through `Arc`; independent instances can coexist.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::prelude::{Error, Result};

use crate::index::{AnyInvertedIndex, KeyRange};
use crate::table::{Relation, Table};

/// A built index together with the table snapshot and column it covers.
#[derive(Debug)]
pub struct IndexEntry {
    name: String,
    table: Arc<Table>,
    column: usize,
    index: AnyInvertedIndex,
}

impl IndexEntry {
    /// Build an index over `table.column`.
    pub fn build(name: impl Into<String>, table: Arc<Table>, column: usize) -> Result<Self> {
        let index = AnyInvertedIndex::build(&*table, column)?;
        Ok(Self {
            name: name.into(),
            table,
            column,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn column_name(&self) -> Result<&str> {
        self.table.column_name(self.column)
    }

    pub fn index(&self) -> &AnyInvertedIndex {
        &self.index
    }

    /// Probe with dynamic bounds; mismatches name the indexed column and
    /// this index.
    pub fn lookup(&self, range: &KeyRange) -> Result<Vec<usize>> {
        let column = format!("{} (index '{}')", self.column_name()?, self.name);
        self.index.lookup_on(&column, range)
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<Table>>>,
    indexes: RwLock<HashMap<String, Arc<IndexEntry>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a table under `name`. Fails if the name is taken.
    pub fn add_table(&self, name: impl Into<String>, table: impl Into<Arc<Table>>) -> Result<Arc<Table>> {
        let name = name.into();
        let table = table.into();
        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(Error::Catalog(format!("table '{name}' already exists")));
        }
        tracing::debug!(table = %name, rows = table.row_count(), "registered table");
        tables.insert(name, Arc::clone(&table));
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::plan(format!("unknown table '{name}'")))
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    pub fn drop_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.write().remove(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn add_index(&self, entry: IndexEntry) -> Result<Arc<IndexEntry>> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(entry.name()) {
            return Err(Error::Catalog(format!(
                "index '{}' already exists",
                entry.name()
            )));
        }
        let entry = Arc::new(entry);
        tracing::debug!(
            index = %entry.name(),
            column = entry.column(),
            keys = entry.index().key_count(),
            "registered index"
        );
        indexes.insert(entry.name().to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Build an index over a registered table's column and publish it.
    pub fn build_index(&self, name: &str, table: &str, column: &str) -> Result<Arc<IndexEntry>> {
        let t = self.table(table)?;
        let col = t
            .column_index(column)
            .ok_or_else(|| Error::plan(format!("table '{table}' has no column '{column}'")))?;
        self.add_index(IndexEntry::build(name, t, col)?)
    }

    pub fn index(&self, name: &str) -> Result<Arc<IndexEntry>> {
        self.indexes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::plan(format!("unknown index '{name}'")))
    }

    pub fn drop_index(&self, name: &str) -> Option<Arc<IndexEntry>> {
        self.indexes.write().remove(name)
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Teardown: drop every table and index.
    pub fn clear(&self) {
        self.indexes.write().clear();
        self.tables.write().clear();
    }
}
