use anyhow::Result;

use crate::error::DbError;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

pub mod aggregate_executor;
pub mod aggregator;
pub mod delete_executor;
pub mod filter_executor;
pub mod insert_executor;
pub mod predicate;
pub mod seq_scan_executor;
pub mod values_executor;

/// Open/closed state and the one tuple look-ahead every executor needs to answer `has_next`.
#[derive(Debug, Default)]
pub struct Cursor {
    open: bool,
    lookahead: Option<Tuple>,
}

impl Cursor {
    pub fn open(&mut self) {
        self.open = true;
        self.lookahead = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.lookahead = None;
    }

    /// Drops a buffered tuple, used when the underlying sequence restarts
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.lookahead = None;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::NotOpen.into())
        }
    }
}

/// A pull based operator of an execution tree.
///
/// An executor starts out closed. `open` opens its children first, `close` closes them after
/// releasing the executor's own state and may be called in any state. `has_next`, `next` and
/// `rewind` fail with `DbError::NotOpen` on a closed executor. `schema` is always available.
pub trait Executor {
    fn schema(&self) -> &Schema;

    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Restarts the output sequence from its first tuple
    fn rewind(&mut self) -> Result<()>;

    /// Produces the next tuple, or None once the executor is exhausted.
    /// Only called while the executor is open.
    fn fetch_next(&mut self) -> Result<Option<Tuple>>;

    fn cursor(&mut self) -> &mut Cursor;

    fn has_next(&mut self) -> Result<bool> {
        self.cursor().ensure_open()?;
        if self.cursor().lookahead.is_none() {
            let tuple = self.fetch_next()?;
            self.cursor().lookahead = tuple;
        }
        Ok(self.cursor().lookahead.is_some())
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoMoreTuples.into());
        }
        self.cursor()
            .lookahead
            .take()
            .ok_or_else(|| DbError::NoMoreTuples.into())
    }
}

/// Pulls every remaining tuple out of an open executor
pub fn collect_tuples(executor: &mut dyn Executor) -> Result<Vec<Tuple>> {
    let mut tuples = vec![];
    while executor.has_next()? {
        tuples.push(executor.next()?);
    }
    Ok(tuples)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    use crate::buffer::buffer_pool::BufferPool;
    use crate::catalog::Catalog;
    use crate::common::TableId;
    use crate::concurrency::TransactionId;
    use crate::storage::heap::file::HeapFile;
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    /// A buffer pool over tables stored in a temporary directory
    pub struct TestDb {
        data_dir: TempDir,
        pub buffer_pool: BufferPool,
    }

    impl TestDb {
        pub fn new() -> Self {
            Self {
                data_dir: tempdir().unwrap(),
                buffer_pool: BufferPool::new(Catalog::new(), 16),
            }
        }

        pub fn create_table(&self, name: &str, columns: Vec<ColumnDefinition>) -> Result<TableId> {
            let path = self.data_dir.path().join(format!("{name}.dat"));
            let file = Arc::new(HeapFile::open(path, Schema::new(columns))?);
            let table_id = file.id();
            self.buffer_pool.catalog().add_table(file, name);
            Ok(table_id)
        }

        pub fn insert(&self, table_id: TableId, rows: &[Vec<Value>]) -> Result<()> {
            let tid = TransactionId::new();
            for row in rows {
                self.buffer_pool
                    .insert_tuple(tid, table_id, &Tuple::new(row.clone()))?;
            }
            Ok(())
        }

        /// Creates a table `numbers(number)` holding the given integers
        pub fn numbers(&self, numbers: &[i32]) -> Result<TableId> {
            let table_id = self.create_table(
                "numbers",
                vec![ColumnDefinition::new(TypeId::Integer, "number")],
            )?;
            let rows = numbers
                .iter()
                .map(|number| vec![Value::Integer(*number)])
                .collect::<Vec<_>>();
            self.insert(table_id, &rows)?;
            Ok(table_id)
        }
    }

    pub fn ints(tuples: &[Tuple], column: usize) -> Vec<i32> {
        tuples
            .iter()
            .map(|tuple| tuple.value(column).as_i32())
            .collect()
    }
}
