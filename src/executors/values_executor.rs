use anyhow::Result;

use super::{Cursor, Executor};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// Serves a fixed list of tuples that is already held in memory
pub struct ValuesExecutor {
    position: usize,
    tuples: Vec<Tuple>,
    schema: Schema,
    cursor: Cursor,
}

impl ValuesExecutor {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            position: 0,
            tuples,
            schema,
            cursor: Cursor::default(),
        }
    }
}

impl Executor for ValuesExecutor {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.position = 0;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        self.position = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let tuple = self.tuples.get(self.position).cloned();
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
