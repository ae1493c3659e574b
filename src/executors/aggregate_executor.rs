use anyhow::Result;

use super::aggregator::{AggregateOp, Aggregator, GroupBy};
use super::values_executor::ValuesExecutor;
use super::{Cursor, Executor};
use crate::error::DbError;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::Tuple;

/// Computes an aggregate over all tuples of its child, optionally grouped by one column.
/// The child is drained completely when the executor is opened.
pub struct AggregateExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    group_by: Option<GroupBy>,
    aggregate_field: usize,
    aggregate_type: TypeId,
    op: AggregateOp,
    schema: Schema,
    results: Option<ValuesExecutor>,
    cursor: Cursor,
}

fn column_type(schema: &Schema, field: usize) -> Result<TypeId> {
    schema
        .type_at(field)
        .ok_or_else(|| DbError::UnknownColumn(format!("#{field}")).into())
}

impl<'a> AggregateExecutor<'a> {
    /// Fails if a field is not part of the child's schema or if `op` cannot be applied to the
    /// aggregated column.
    pub fn new(
        child: Box<dyn Executor + 'a>,
        aggregate_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let child_schema = child.schema();
        let aggregate_type = column_type(child_schema, aggregate_field)?;
        let group_by = match group_field {
            Some(field) => Some(GroupBy {
                field,
                type_id: column_type(child_schema, field)?,
            }),
            None => None,
        };
        // rejects unsupported combinations before anything is executed
        Aggregator::new(group_by, aggregate_field, aggregate_type, op)?;

        let aggregate_name = format!(
            "{}({})",
            op,
            child_schema.name_at(aggregate_field).unwrap_or("null")
        );
        let aggregate_column = ColumnDefinition::new(TypeId::Integer, aggregate_name);
        let schema = match group_by {
            Some(group_by) => Schema::new(vec![
                ColumnDefinition::new(group_by.type_id, "groupValue"),
                aggregate_column,
            ]),
            None => Schema::new(vec![aggregate_column]),
        };

        Ok(Self {
            child,
            group_by,
            aggregate_field,
            aggregate_type,
            op,
            schema,
            results: None,
            cursor: Cursor::default(),
        })
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_by.map(|group_by| group_by.field)
    }

    /// Name of the grouping column in the child's schema
    pub fn group_field_name(&self) -> Option<&str> {
        self.group_field()
            .and_then(|field| self.child.schema().name_at(field))
    }

    pub fn aggregate_field(&self) -> usize {
        self.aggregate_field
    }

    pub fn aggregate_field_name(&self) -> Option<&str> {
        self.child.schema().name_at(self.aggregate_field)
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }

    fn compute(&mut self) -> Result<ValuesExecutor> {
        let mut aggregator = Aggregator::new(
            self.group_by,
            self.aggregate_field,
            self.aggregate_type,
            self.op,
        )?;
        while self.child.has_next()? {
            aggregator.merge_tuple_into_group(&self.child.next()?)?;
        }
        let mut results = aggregator.iterator();
        results.open()?;
        Ok(results)
    }
}

impl<'a> Executor for AggregateExecutor<'a> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.results = Some(self.compute()?);
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.results = None;
        self.child.close();
    }

    /// Serves the computed results again without reading the child a second time
    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        match self.results.as_mut() {
            Some(results) => results.rewind(),
            None => Ok(()),
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let Some(results) = self.results.as_mut() else {
            return Ok(None);
        };
        if results.has_next()? {
            Ok(Some(results.next()?))
        } else {
            Ok(None)
        }
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
