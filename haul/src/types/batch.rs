use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};
use crate::types::{BatchSchema, Cell};

/// A row of cells in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

/// An immutable, ordered set of rows sharing one schema.
///
/// Batches are created by homes and handed by value to the consumer, then to the store. They
/// expose no mutating accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    schema: Arc<BatchSchema>,
    rows: Vec<TableRow>,
}

impl Batch {
    /// Creates a batch, checking that every row has one cell per schema column.
    pub fn try_new(schema: Arc<BatchSchema>, rows: Vec<TableRow>) -> HaulResult<Self> {
        let width = schema.len();
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.values().len() != width)
        {
            bail!(
                ErrorKind::InvalidData,
                "Row width does not match the batch schema",
                format!(
                    "row {index} has {} cells but the schema has {width} columns",
                    row.values().len()
                )
            );
        }

        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &Arc<BatchSchema> {
        &self.schema
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the cells of the column at `index`, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().filter_map(move |row| row.values().get(index))
    }

    pub fn into_rows(self) -> Vec<TableRow> {
        self.rows
    }
}
