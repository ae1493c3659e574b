use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Error, Result};

use super::Tuple;
use crate::common::STRING_LEN;
use crate::error::DbError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Integer,
    Text,
}

impl TypeId {
    /// Returns how many bytes a value of this type occupies on a page
    pub fn len(&self) -> usize {
        match self {
            TypeId::Integer => std::mem::size_of::<i32>(),
            TypeId::Text => std::mem::size_of::<u32>() + STRING_LEN,
        }
    }
}

impl FromStr for TypeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Integer" | "int" => Ok(TypeId::Integer),
            "Text" | "string" => Ok(TypeId::Text),
            s => Err(Error::msg(format!("Invalid TypeId {}", s))),
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct ColumnDefinition {
    type_id: TypeId,
    column_name: Option<String>,
}

impl ColumnDefinition {
    pub fn new(type_id: TypeId, column_name: impl Into<String>) -> Self {
        Self {
            type_id,
            column_name: Some(column_name.into()),
        }
    }

    /// creates a column definition where only the type is known
    pub fn with_type_id(type_id: TypeId) -> Self {
        Self {
            type_id,
            column_name: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }
}

/// Names are descriptive only, two columns are equal if their types are.
impl PartialEq for ColumnDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ColumnDefinition {}

/// Describes the shape of a tuple: an ordered list of typed, optionally named columns.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<ColumnDefinition>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { columns }
    }

    /// Builds a schema of unnamed columns
    pub fn from_types(types: &[TypeId]) -> Self {
        Self {
            columns: types
                .iter()
                .map(|type_id| ColumnDefinition::with_type_id(*type_id))
                .collect(),
        }
    }

    /// Concatenates two schemas, the columns of `left` come first
    pub fn merge(left: &Schema, right: &Schema) -> Self {
        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn type_at(&self, index: usize) -> Option<TypeId> {
        self.columns.get(index).map(|col| col.type_id())
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|col| col.column_name())
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|col| col.column_name() == Some(name))
    }

    /// Returns the position of the first column with the given name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|col| col.column_name() == Some(name))
            .ok_or_else(|| DbError::UnknownColumn(name.to_owned()).into())
    }

    /// Size in bytes of a tuple of this schema when stored on a page
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|col| col.type_id().len()).sum()
    }

    /// Whether a tuple has exactly as many values as this schema and each is of the declared type
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple.values().len() == self.columns.len()
            && tuple
                .values()
                .iter()
                .zip(self.columns.iter())
                .all(|(value, col)| value.type_id() == col.type_id())
    }

    /// Prepends each column name. This is used to give the column names a precise name.
    /// E.g. if a table 'tbl' has the column 'id', then prepend it will give it the name 'tbl.id'
    pub fn prepend_column_name(&mut self, prepend: &str) {
        for col in self.columns.iter_mut() {
            let name = col.column_name.as_deref().unwrap_or("null");
            col.column_name = Some(format!("{}.{}", prepend, name));
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self
            .columns
            .iter()
            .map(|col| format!("{}({})", col.type_id(), col.column_name().unwrap_or("null")))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{columns}]")
    }
}
