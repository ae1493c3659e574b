use std::fmt::Display;

use self::value::Value;
use crate::common::RecordId;

pub mod schema;
pub mod value;

#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
    /// only set for tuples read from or placed on a heap page
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn set_value(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub(crate) fn set_record_id(&mut self, record_id: RecordId) {
        self.record_id = Some(record_id);
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let line = self
            .values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        write!(f, "{line}")
    }
}
