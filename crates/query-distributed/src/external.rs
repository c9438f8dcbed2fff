//! Temporary tables shipped along with a query

use query_core::TableData;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named temporary tables, iterated in name order.
///
/// Entries are reference counted, so cloning the registry to give each
/// remote stream its own snapshot copies no table data.
#[derive(Debug, Clone, Default)]
pub struct ExternalTables {
    tables: BTreeMap<String, Arc<TableData>>,
}

impl ExternalTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table
    pub fn insert(&mut self, name: impl Into<String>, data: Arc<TableData>) {
        self.tables.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableData>> {
        self.tables.get(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TableData>)> {
        self.tables.iter().map(|(name, data)| (name.as_str(), data))
    }
}

impl<'a> IntoIterator for &'a ExternalTables {
    type Item = (&'a String, &'a Arc<TableData>);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Arc<TableData>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}
