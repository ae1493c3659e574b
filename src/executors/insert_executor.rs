use anyhow::{Context, Result};
use lazy_static::lazy_static;
use tracing::trace;

use super::{Cursor, Executor};
use crate::buffer::buffer_pool::BufferPool;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::error::DbError;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::value::Value;
use crate::tuple::Tuple;

lazy_static! {
    pub(super) static ref COUNT_SCHEMA: Schema = Schema::new(vec![ColumnDefinition::new(
        TypeId::Integer,
        "countValue"
    )]);
}

/// Drains its child into a table. Yields a single tuple holding the number of inserted tuples.
pub struct InsertExecutor<'a> {
    buffer_pool: &'a BufferPool,
    transaction: TransactionId,
    child: Box<dyn Executor + 'a>,
    table_id: TableId,
    done: bool,
    cursor: Cursor,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        buffer_pool: &'a BufferPool,
        transaction: TransactionId,
        child: Box<dyn Executor + 'a>,
        table_id: TableId,
    ) -> Result<Self> {
        let table_schema = buffer_pool.catalog().get_schema(table_id)?;
        if child.schema() != &table_schema {
            return Err(DbError::SchemaMismatch {
                expected: table_schema.to_string(),
                found: child.schema().to_string(),
            }
            .into());
        }

        Ok(Self {
            buffer_pool,
            transaction,
            child,
            table_id,
            done: false,
            cursor: Cursor::default(),
        })
    }

    fn try_insert(&mut self) -> Result<i32> {
        let mut tuples_inserted = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.buffer_pool
                .insert_tuple(self.transaction, self.table_id, &tuple)
                .with_context(|| format!("Failed to insert into table {}", self.table_id))?;
            trace!(table_id = self.table_id, %tuple, "inserted tuple");
            tuples_inserted += 1;
        }
        Ok(tuples_inserted)
    }
}

impl<'a> Executor for InsertExecutor<'a> {
    fn schema(&self) -> &Schema {
        &COUNT_SCHEMA
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.done = false;
        self.child.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        self.done = false;
        self.child.rewind()
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let tuples_inserted = self.try_insert()?;
        Ok(Some(Tuple::new(vec![Value::Integer(tuples_inserted)])))
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
