use anyhow::Result;

use super::predicate::Predicate;
use super::{Cursor, Executor};
use crate::error::DbError;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

pub struct FilterExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    predicate: Predicate,
    cursor: Cursor,
}

impl<'a> FilterExecutor<'a> {
    /// Fails if the predicate refers to a column the child does not produce
    pub fn new(child: Box<dyn Executor + 'a>, predicate: Predicate) -> Result<Self> {
        if predicate.field() >= child.schema().len() {
            return Err(DbError::UnknownColumn(format!("#{}", predicate.field())).into());
        }
        Ok(Self {
            child,
            predicate,
            cursor: Cursor::default(),
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl<'a> Executor for FilterExecutor<'a> {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.child.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        self.child.rewind()
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
