use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};

/// Logical type of a batch column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Integer,
    Float,
    Numeric,
    String,
    Bytes,
    Date,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp normalized to UTC.
    TimestampTz,
    Json,
    /// Type unknown, e.g. a column only ever observed as null.
    Null,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Bool => "bool",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Numeric => "numeric",
            ColumnType::String => "string",
            ColumnType::Bytes => "bytes",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimestampTz => "timestamptz",
            ColumnType::Json => "json",
            ColumnType::Null => "null",
        };

        f.write_str(name)
    }
}

/// Name, type and nullability of a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable,
            primary_key: false,
        }
    }

    /// Marks the column as part of the primary key, which also makes it non-nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Ordered columns of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSchema {
    columns: Vec<ColumnSchema>,
}

impl BatchSchema {
    /// Creates a schema, rejecting empty or duplicate column names.
    pub fn try_new(columns: Vec<ColumnSchema>) -> HaulResult<Self> {
        for (index, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                bail!(
                    ErrorKind::InvalidData,
                    "Column name cannot be empty",
                    format!("column at position {index} has no name")
                );
            }

            if columns[..index].iter().any(|c| c.name == column.name) {
                bail!(
                    ErrorKind::InvalidData,
                    "Duplicate column name",
                    format!("column `{}` appears more than once", column.name)
                );
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the position and definition of the column named `name`.
    pub fn column(&self, name: &str) -> Option<(usize, &ColumnSchema)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.name == name)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|column| column.primary_key)
    }
}
