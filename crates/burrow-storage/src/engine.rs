//! Engine surface: the entry point a query executor drives.
//!
//! An [`Engine`] owns one database directory, the shared buffer pool, and
//! the registry of open tables. It exposes exactly the operations the
//! layer above needs: create, open, and drop tables, and flush on
//! teardown. Everything else goes through a table's [`crate::Cursor`].

use crate::pager::Pager;
use crate::record::Schema;
use crate::store::PageStore;
use crate::tree::Table;
use burrow_buffer::BufferPool;
use burrow_common::{BurrowError, Result, StorageConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One open database: directory, page cache, and open tables.
pub struct Engine {
    pager: Arc<Pager>,
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl Engine {
    /// Opens a database rooted at the configured directory, creating it
    /// if needed.
    pub fn open(config: StorageConfig) -> Result<Engine> {
        let ceiling = config.effective_ceiling();
        let store = Arc::new(PageStore::open(&config)?);
        let pool = Arc::new(BufferPool::new(config.pool_working_set, ceiling));
        Ok(Engine {
            pager: Arc::new(Pager::new(store, pool)),
            tables: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the pager (page store + buffer pool) backing this engine.
    pub fn pager(&self) -> &Arc<Pager> {
        &self.pager
    }

    /// Creates a table with the given schema.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<Table>> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(BurrowError::TableAlreadyExists(name.to_string()));
        }
        let table = Arc::new(Table::create(self.pager.clone(), name, schema)?);
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Opens an existing table, reading its schema from the meta node.
    pub fn open_table(&self, name: &str) -> Result<Arc<Table>> {
        let mut tables = self.tables.lock();
        if let Some(table) = tables.get(name) {
            return Ok(table.clone());
        }
        let table = Arc::new(Table::open(self.pager.clone(), name)?);
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Drops a table: its file is deleted and its cached pages released,
    /// leaving other tables' cached pages untouched.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.remove(name);
        if let Some(file_id) = self.pager.store().drop_table(name)? {
            self.pager.pool().discard_table(file_id);
        }
        Ok(())
    }

    /// Flushes every dirty cached page to disk; returns the count.
    pub fn flush(&self) -> Result<usize> {
        self.pager.flush_all()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
