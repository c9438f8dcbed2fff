//! Execution context
//!
//! A [`Context`] is threaded explicitly through every call that executes a
//! query. Derived contexts share the catalog and the DDL lock with their
//! parent but own their settings and external tables, so changing either
//! never leaks back into the context they were derived from.

use crate::error::{QueryError, Result};
use crate::settings::Settings;
use crate::table::TableData;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;

/// Database used when a query does not name one
pub const DEFAULT_DATABASE: &str = "default";

#[derive(Debug, Clone)]
pub struct Context {
    settings: Settings,
    current_database: String,
    /// Temporary tables visible to queries run in this context only
    external_tables: HashMap<String, Arc<TableData>>,
    /// Tables held in memory by this node, keyed by `database.table`
    catalog: Arc<DashMap<String, Arc<TableData>>>,
    ddl_lock: Arc<Mutex<()>>,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            current_database: DEFAULT_DATABASE.to_string(),
            external_tables: HashMap::new(),
            catalog: Arc::new(DashMap::new()),
            ddl_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Derive a context that runs with `settings`
    pub fn with_settings(&self, settings: Settings) -> Self {
        let mut context = self.clone();
        context.settings = settings;
        context
    }

    /// Derive a context whose unqualified table names resolve in `database`
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        let mut context = self.clone();
        context.current_database = database.into();
        context
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_database(&self) -> &str {
        &self.current_database
    }

    pub fn try_get_external_table(&self, name: &str) -> Option<Arc<TableData>> {
        self.external_tables.get(name).cloned()
    }

    /// Register a temporary table; a name can only be registered once
    pub fn add_external_table(&mut self, name: impl Into<String>, data: Arc<TableData>) -> Result<()> {
        let name = name.into();
        if self.external_tables.contains_key(&name) {
            return Err(QueryError::TableAlreadyExists(name));
        }
        self.external_tables.insert(name, data);
        Ok(())
    }

    /// Store a table in the shared in-memory catalog
    pub fn register_table(&self, database: &str, table: &str, data: TableData) {
        self.catalog
            .insert(Self::catalog_key(database, table), Arc::new(data));
    }

    pub fn get_table(&self, database: &str, table: &str) -> Result<Arc<TableData>> {
        self.catalog
            .get(&Self::catalog_key(database, table))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QueryError::TableNotFound(Self::catalog_key(database, table)))
    }

    /// Serialize schema changes made through this context and its derivations
    pub fn lock_ddl(&self) -> MutexGuard<'_, ()> {
        self.ddl_lock.lock()
    }

    fn catalog_key(database: &str, table: &str) -> String {
        format!("{}.{}", database, table)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
