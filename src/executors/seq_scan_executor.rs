use std::sync::Arc;

use anyhow::Result;

use super::{Cursor, Executor};
use crate::buffer::buffer_pool::BufferPool;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::storage::heap::file::{HeapFile, HeapFileIterator};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// Reads every tuple of a table. The produced tuples carry their record ids.
pub struct SeqScanExecutor<'a> {
    buffer_pool: &'a BufferPool,
    transaction: TransactionId,
    table: Arc<HeapFile>,
    table_iter: Option<HeapFileIterator<'a>>,
    schema: Schema,
    cursor: Cursor,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(
        buffer_pool: &'a BufferPool,
        transaction: TransactionId,
        table_id: TableId,
    ) -> Result<Self> {
        let table = buffer_pool.catalog().get_table(table_id)?;
        let schema = table.schema().clone();
        Ok(Self {
            buffer_pool,
            transaction,
            table,
            table_iter: None,
            schema,
            cursor: Cursor::default(),
        })
    }

    /// Like `new`, but every column name of the output schema is prefixed with `alias.`
    pub fn with_alias(
        buffer_pool: &'a BufferPool,
        transaction: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> Result<Self> {
        let mut this = Self::new(buffer_pool, transaction, table_id)?;
        this.schema.prepend_column_name(alias);
        Ok(this)
    }

    pub fn table_id(&self) -> TableId {
        self.table.id()
    }
}

impl<'a> Executor for SeqScanExecutor<'a> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.table_iter = Some(self.table.iter(self.buffer_pool, self.transaction));
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.table_iter = None;
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        if let Some(table_iter) = self.table_iter.as_mut() {
            table_iter.rewind();
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        match self.table_iter.as_mut() {
            Some(table_iter) => table_iter.next().transpose(),
            None => Ok(None),
        }
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
