use std::fmt::Display;

use anyhow::Result;

use super::schema::TypeId;
use crate::common::STRING_LEN;
use crate::error::DbError;

/// Comparison operators understood by `Value::compare`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Like,
    NotEquals,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            CompareOp::Equals => "=",
            CompareOp::GreaterThan => ">",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotEquals => "<>",
        };
        write!(f, "{op}")
    }
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Value {
    Integer(i32),
    String(String),
}

/// Length of the longest prefix of at most STRING_LEN bytes that does not split a character
fn truncated_len(val: &str) -> usize {
    let mut end = val.len().min(STRING_LEN);
    while !val.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn truncate(mut val: String) -> String {
    val.truncate(truncated_len(&val));
    val
}

impl Value {
    /// Creates a string value, truncating it to the maximum string width
    pub fn string(val: impl Into<String>) -> Self {
        Value::String(truncate(val.into()))
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Integer(_) => TypeId::Integer,
            Value::String(_) => TypeId::Text,
        }
    }

    /// parses a value of the given type from bytes
    pub fn parse_value(bytes: &[u8], type_id: TypeId) -> Self {
        match type_id {
            TypeId::Integer => {
                let mut val = [0u8; 4];
                val.copy_from_slice(&bytes[..4]);
                Value::Integer(i32::from_be_bytes(val))
            }
            TypeId::Text => {
                let mut len = [0u8; 4];
                len.copy_from_slice(&bytes[..4]);
                let len = (u32::from_be_bytes(len) as usize).min(STRING_LEN);
                let slice = &bytes[4..4 + len];
                Value::String(String::from_utf8_lossy(slice).into_owned())
            }
        }
    }

    /// Writes exactly `self.type_id().len()` bytes, strings are padded with zeros.
    /// Strings that were built without `Value::string` are cut at a character boundary.
    pub fn serialize_value(&self, buffer: &mut [u8]) {
        match self {
            Value::Integer(val) => buffer[..4].copy_from_slice(val.to_be_bytes().as_slice()),
            Value::String(val) => {
                let bytes = &val.as_bytes()[..truncated_len(val)];
                buffer[..4].copy_from_slice((bytes.len() as u32).to_be_bytes().as_slice());
                buffer[4..4 + bytes.len()].copy_from_slice(bytes);
                buffer[4 + bytes.len()..4 + STRING_LEN].fill(0);
            }
        }
    }

    /// Returns how many bytes a serialized value occupies
    pub fn size(&self) -> usize {
        self.type_id().len()
    }

    /// Compares this value against another one of the same type.
    /// LIKE tests whether `other` is contained in this string.
    pub fn compare(&self, op: CompareOp, other: &Value) -> Result<bool> {
        let incomparable = || DbError::IncomparableValues {
            left: self.type_id(),
            right: other.type_id(),
            op,
        };
        match (self, other) {
            (Value::String(left), Value::String(right)) if op == CompareOp::Like => {
                Ok(left.contains(right.as_str()))
            }
            (_, _) if op == CompareOp::Like => Err(incomparable().into()),
            (Value::Integer(_), Value::Integer(_)) | (Value::String(_), Value::String(_)) => {
                let ordering = self.cmp(other);
                Ok(match op {
                    CompareOp::Equals => ordering.is_eq(),
                    CompareOp::NotEquals => ordering.is_ne(),
                    CompareOp::GreaterThan => ordering.is_gt(),
                    CompareOp::GreaterThanOrEq => ordering.is_ge(),
                    CompareOp::LessThan => ordering.is_lt(),
                    CompareOp::LessThanOrEq => ordering.is_le(),
                    CompareOp::Like => unreachable!(),
                })
            }
            _ => Err(incomparable().into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match &self {
            Value::String(val) => val,
            _ => unreachable!(),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Integer(val) => *val,
            _ => unreachable!(),
        }
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Integer(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::string(val)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(val) => write!(f, "{val}"),
            Value::String(val) => write!(f, "{val}"),
        }
    }
}
