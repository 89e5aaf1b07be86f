use serde::{Deserialize, Serialize};

use crate::types::{Batch, ColumnType};

/// Returns the mirror type name a column type is published as.
pub fn manifest_type(typ: ColumnType) -> &'static str {
    match typ {
        ColumnType::Bool => "BOOLEAN",
        ColumnType::Integer => "INT64",
        ColumnType::Float => "FLOAT64",
        ColumnType::Numeric => "NUMERIC",
        ColumnType::String => "STRING",
        ColumnType::Bytes => "BYTES",
        ColumnType::Date => "DATE",
        ColumnType::Timestamp => "DATETIME",
        ColumnType::TimestampTz => "TIMESTAMP",
        ColumnType::Json => "JSON",
        ColumnType::Null => "STRING",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
}

/// Column layout of one published table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifest {
    pub table: String,
    pub columns: Vec<ManifestColumn>,
}

impl TableManifest {
    /// Derives the manifest of `batch`.
    ///
    /// A column is nullable when its schema says so or when any of its values is null. A
    /// column whose values are all null is published as a nullable `STRING`.
    pub fn from_batch(table: impl Into<String>, batch: &Batch) -> Self {
        let columns = batch
            .schema()
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let mut values = batch.column_values(index).peekable();
                let has_values = values.peek().is_some();
                let (any_null, all_null) = values.fold((false, true), |(any, all), cell| {
                    (any || cell.is_null(), all && cell.is_null())
                });

                let column_type = if has_values && all_null {
                    manifest_type(ColumnType::Null)
                } else {
                    manifest_type(column.typ)
                };

                ManifestColumn {
                    name: column.name.clone(),
                    column_type: column_type.to_string(),
                    nullable: column.nullable || any_null,
                }
            })
            .collect();

        Self {
            table: table.into(),
            columns,
        }
    }
}

/// Manifest of every published table, written next to the data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirrorManifest {
    pub tables: Vec<TableManifest>,
}
