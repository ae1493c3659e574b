use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Error, Result};

use super::values_executor::ValuesExecutor;
use crate::error::DbError;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::value::Value;
use crate::tuple::Tuple;

/// Passed as grouping to aggregate all tuples into a single bucket
pub const NO_GROUPING: Option<usize> = None;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        };
        write!(f, "{op}")
    }
}

impl FromStr for AggregateOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_ascii_lowercase().as_str() {
            "min" => AggregateOp::Min,
            "max" => AggregateOp::Max,
            "sum" => AggregateOp::Sum,
            "avg" => AggregateOp::Avg,
            "count" => AggregateOp::Count,
            _ => return Err(Error::msg(format!("Invalid aggregate operator {}", s))),
        };
        Ok(op)
    }
}

/// Column the tuples are grouped by, with its type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBy {
    pub field: usize,
    pub type_id: TypeId,
}

/// Accumulates tuples for an aggregation over integer fields.
/// Every bucket keeps the contributed values in arrival order.
#[derive(Debug)]
pub struct IntegerAggregator {
    group_by: Option<GroupBy>,
    aggregate_field: usize,
    op: AggregateOp,
    groups: HashMap<Value, Vec<i32>>,
    ungrouped: Vec<i32>,
}

impl IntegerAggregator {
    pub fn new(group_by: Option<GroupBy>, aggregate_field: usize, op: AggregateOp) -> Self {
        Self {
            group_by,
            aggregate_field,
            op,
            groups: HashMap::new(),
            ungrouped: vec![],
        }
    }

    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<()> {
        let value = match tuple.value(self.aggregate_field) {
            Value::Integer(val) => *val,
            other => {
                return Err(DbError::SchemaMismatch {
                    expected: TypeId::Integer.to_string(),
                    found: other.type_id().to_string(),
                }
                .into())
            }
        };
        match self.group_by {
            Some(group_by) => self
                .groups
                .entry(tuple.value(group_by.field).clone())
                .or_default()
                .push(value),
            None => self.ungrouped.push(value),
        }
        Ok(())
    }

    /// None if the op has no result for an empty bucket
    fn compute(&self, values: &[i32]) -> Option<i32> {
        let sum = || values.iter().map(|val| *val as i64).sum::<i64>();
        match self.op {
            AggregateOp::Min => values.iter().min().copied(),
            AggregateOp::Max => values.iter().max().copied(),
            AggregateOp::Sum => Some(sum() as i32),
            AggregateOp::Count => Some(values.len() as i32),
            AggregateOp::Avg if values.is_empty() => None,
            // integer division truncates toward zero
            AggregateOp::Avg => Some((sum() / values.len() as i64) as i32),
        }
    }

    fn results(&self) -> Vec<Tuple> {
        match self.group_by {
            Some(_) => self
                .groups
                .iter()
                .filter_map(|(group, values)| {
                    self.compute(values)
                        .map(|result| Tuple::new(vec![group.clone(), Value::Integer(result)]))
                })
                .collect(),
            None => self
                .compute(&self.ungrouped)
                .map(|result| Tuple::new(vec![Value::Integer(result)]))
                .into_iter()
                .collect(),
        }
    }
}

/// Accumulates tuples for an aggregation over string fields. Only counting is supported,
/// so no values are retained.
#[derive(Debug)]
pub struct StringAggregator {
    group_by: Option<GroupBy>,
    counts: HashMap<Value, i32>,
    ungrouped: i32,
}

impl StringAggregator {
    pub fn new(group_by: Option<GroupBy>, op: AggregateOp) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(DbError::UnsupportedAggregate {
                op,
                type_id: TypeId::Text,
            }
            .into());
        }
        Ok(Self {
            group_by,
            counts: HashMap::new(),
            ungrouped: 0,
        })
    }

    fn merge_tuple_into_group(&mut self, tuple: &Tuple) {
        match self.group_by {
            Some(group_by) => {
                *self
                    .counts
                    .entry(tuple.value(group_by.field).clone())
                    .or_insert(0) += 1
            }
            None => self.ungrouped += 1,
        }
    }

    fn results(&self) -> Vec<Tuple> {
        match self.group_by {
            Some(_) => self
                .counts
                .iter()
                .map(|(group, count)| Tuple::new(vec![group.clone(), Value::Integer(*count)]))
                .collect(),
            None => vec![Tuple::new(vec![Value::Integer(self.ungrouped)])],
        }
    }
}

/// Computes one aggregate over a stream of tuples, optionally grouped by another column.
/// The variant is picked from the type of the aggregated column.
#[derive(Debug)]
pub enum Aggregator {
    Integer(IntegerAggregator),
    String(StringAggregator),
}

impl Aggregator {
    /// Fails if `op` cannot be applied to a column of `aggregate_type`
    pub fn new(
        group_by: Option<GroupBy>,
        aggregate_field: usize,
        aggregate_type: TypeId,
        op: AggregateOp,
    ) -> Result<Self> {
        match aggregate_type {
            TypeId::Integer => Ok(Aggregator::Integer(IntegerAggregator::new(
                group_by,
                aggregate_field,
                op,
            ))),
            TypeId::Text => Ok(Aggregator::String(StringAggregator::new(group_by, op)?)),
        }
    }

    pub fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<()> {
        match self {
            Aggregator::Integer(aggregator) => aggregator.merge_tuple_into_group(tuple),
            Aggregator::String(aggregator) => {
                aggregator.merge_tuple_into_group(tuple);
                Ok(())
            }
        }
    }

    fn group_by(&self) -> Option<GroupBy> {
        match self {
            Aggregator::Integer(aggregator) => aggregator.group_by,
            Aggregator::String(aggregator) => aggregator.group_by,
        }
    }

    /// Shape of the result tuples: `(groupValue, aggregateValue)` or just `(aggregateValue)`
    pub fn result_schema(&self) -> Schema {
        let aggregate = ColumnDefinition::new(TypeId::Integer, "aggregateValue");
        match self.group_by() {
            Some(group_by) => Schema::new(vec![
                ColumnDefinition::new(group_by.type_id, "groupValue"),
                aggregate,
            ]),
            None => Schema::new(vec![aggregate]),
        }
    }

    /// Returns an unopened executor over one result tuple per group.
    /// The order of the groups is unspecified.
    pub fn iterator(&self) -> ValuesExecutor {
        let results = match self {
            Aggregator::Integer(aggregator) => aggregator.results(),
            Aggregator::String(aggregator) => aggregator.results(),
        };
        ValuesExecutor::new(self.result_schema(), results)
    }
}
