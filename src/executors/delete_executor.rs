use anyhow::{Context, Result};
use tracing::trace;

use super::insert_executor::COUNT_SCHEMA;
use super::{Cursor, Executor};
use crate::buffer::buffer_pool::BufferPool;
use crate::concurrency::TransactionId;
use crate::tuple::schema::Schema;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

/// Removes every tuple its child produces from the table the tuple was read from.
/// The child has to yield tuples that carry a record id, as a scan does.
pub struct DeleteExecutor<'a> {
    buffer_pool: &'a BufferPool,
    transaction: TransactionId,
    child: Box<dyn Executor + 'a>,
    done: bool,
    cursor: Cursor,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(
        buffer_pool: &'a BufferPool,
        transaction: TransactionId,
        child: Box<dyn Executor + 'a>,
    ) -> Self {
        Self {
            buffer_pool,
            transaction,
            child,
            done: false,
            cursor: Cursor::default(),
        }
    }

    fn try_delete(&mut self) -> Result<i32> {
        let mut tuples_deleted = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.buffer_pool
                .delete_tuple(self.transaction, &tuple)
                .with_context(|| format!("Failed to delete tuple at {:?}", tuple.record_id()))?;
            trace!(record_id = ?tuple.record_id(), "deleted tuple");
            tuples_deleted += 1;
        }
        Ok(tuples_deleted)
    }
}

impl<'a> Executor for DeleteExecutor<'a> {
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
        let tuples_deleted = self.try_delete()?;
        Ok(Some(Tuple::new(vec![Value::Integer(tuples_deleted)])))
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::DeleteExecutor;
    use crate::concurrency::TransactionId;
    use crate::error::DbError;
    use crate::executors::filter_executor::FilterExecutor;
    use crate::executors::predicate::Predicate;
    use crate::executors::seq_scan_executor::SeqScanExecutor;
    use crate::executors::tests::{ints, TestDb};
    use crate::executors::values_executor::ValuesExecutor;
    use crate::executors::{collect_tuples, Executor};
    use crate::tuple::schema::{Schema, TypeId};
    use crate::tuple::value::{CompareOp, Value};
    use crate::tuple::Tuple;

    #[test]
    fn deletes_filtered_tuples() -> Result<()> {
        let test_db = TestDb::new();
        let table_id = test_db.numbers(&[1, 2, 3, 4, 5, 6])?;
        let tid = TransactionId::new();

        let scan = SeqScanExecutor::new(&test_db.buffer_pool, tid, table_id)?;
        let filter = FilterExecutor::new(
            Box::new(scan),
            Predicate::new(0, CompareOp::GreaterThan, Value::Integer(3)),
        )?;
        let mut delete = DeleteExecutor::new(&test_db.buffer_pool, tid, Box::new(filter));
        delete.open()?;
        assert_eq!(delete.next()?.value(0), &Value::Integer(3));
        assert!(!delete.has_next()?);
        delete.close();

        let mut scan = SeqScanExecutor::new(&test_db.buffer_pool, tid, table_id)?;
        scan.open()?;
        assert_eq!(ints(&collect_tuples(&mut scan)?, 0), vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn rewind_deletes_again() -> Result<()> {
        let test_db = TestDb::new();
        let table_id = test_db.numbers(&[1, 2, 3])?;
        let tid = TransactionId::new();

        let scan = SeqScanExecutor::new(&test_db.buffer_pool, tid, table_id)?;
        let mut delete = DeleteExecutor::new(&test_db.buffer_pool, tid, Box::new(scan));
        delete.open()?;
        assert_eq!(delete.next()?.value(0), &Value::Integer(3));
        assert!(!delete.has_next()?);

        // the rewound scan finds nothing left to delete
        delete.rewind()?;
        assert_eq!(delete.next()?.value(0), &Value::Integer(0));
        assert!(!delete.has_next()?);
        delete.close();

        test_db.insert(table_id, &[vec![Value::Integer(4)]])?;
        delete.open()?;
        assert_eq!(delete.next()?.value(0), &Value::Integer(1));
        Ok(())
    }

    #[test]
    fn tuples_without_record_id_cannot_be_deleted() -> Result<()> {
        let test_db = TestDb::new();
        test_db.numbers(&[1])?;

        let values = ValuesExecutor::new(
            Schema::from_types(&[TypeId::Integer]),
            vec![Tuple::new(vec![Value::Integer(1)])],
        );
        let mut delete =
            DeleteExecutor::new(&test_db.buffer_pool, TransactionId::new(), Box::new(values));
        delete.open()?;
        let err = delete.next().unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::MissingRecordId)
        );
        Ok(())
    }
}
