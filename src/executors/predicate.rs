use std::fmt::Display;

use anyhow::Result;

use crate::error::DbError;
use crate::tuple::value::{CompareOp, Value};
use crate::tuple::Tuple;

fn field_of(tuple: &Tuple, field: usize) -> Result<&Value> {
    tuple
        .values()
        .get(field)
        .ok_or_else(|| DbError::UnknownColumn(format!("#{field}")).into())
}

/// Compares one column of a tuple against a constant
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    pub fn filter(&self, tuple: &Tuple) -> Result<bool> {
        field_of(tuple, self.field)?.compare(self.op, &self.operand)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fieldId: {}, operator: {}, operand: {}",
            self.field, self.op, self.operand
        )
    }
}

/// Compares a column of one tuple against a column of another, as a join would
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinPredicate {
    left_field: usize,
    op: CompareOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CompareOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn left_field(&self) -> usize {
        self.left_field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn right_field(&self) -> usize {
        self.right_field
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> Result<bool> {
        field_of(left, self.left_field)?.compare(self.op, field_of(right, self.right_field)?)
    }
}
