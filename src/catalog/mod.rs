use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::common::TableId;
use crate::error::DbError;
use crate::storage::heap::file::HeapFile;
use crate::tuple::schema::Schema;

struct CatalogEntry {
    name: String,
    file: Arc<HeapFile>,
}

/// Keeps track of all open tables, addressable by id and by name.
#[derive(Default)]
pub struct Catalog {
    table_name_to_id: DashMap<String, TableId>,
    tables: DashMap<TableId, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a heap file under the given name.
    /// A table previously registered under the same name or with the same id is replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let table_id = file.id();
        if let Some((_, previous)) = self.table_name_to_id.remove(name) {
            self.tables.remove(&previous);
        }
        if let Some((_, previous)) = self.tables.remove(&table_id) {
            self.table_name_to_id.remove(&previous.name);
        }
        debug!(table_id, name, path = %file.path().display(), "added table");

        self.table_name_to_id.insert(name.to_owned(), table_id);
        self.tables.insert(
            table_id,
            CatalogEntry {
                name: name.to_owned(),
                file,
            },
        );
    }

    pub fn get_table(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| DbError::UnknownTable(table_id).into())
    }

    pub fn get_table_id(&self, table_name: &str) -> Option<TableId> {
        self.table_name_to_id.get(table_name).map(|kv| *kv.value())
    }

    pub fn get_schema(&self, table_id: TableId) -> Result<Schema> {
        Ok(self.get_table(table_id)?.schema().clone())
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.tables.get(&table_id).map(|entry| entry.name.clone())
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut tables = self
            .table_name_to_id
            .iter()
            .map(|kv| kv.key().clone())
            .collect::<Vec<_>>();
        tables.sort();
        tables
    }
}
