use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};
use crate::home::{BatchStream, Home};
use crate::types::{Batch, BatchSchema, TableRow};
use crate::watermark::FilterExpression;

/// In-memory home serving a fixed list of batches.
///
/// Filters are applied row by row with [`FilterExpression::matches`]; batches left without rows
/// are not yielded. Cloning shares the underlying data.
#[derive(Debug, Clone)]
pub struct MemoryHome {
    name: String,
    schema: Arc<BatchSchema>,
    batches: Arc<Vec<Batch>>,
}

impl MemoryHome {
    /// Creates a home, checking that every batch carries `schema`.
    pub fn try_new(
        name: impl Into<String>,
        schema: Arc<BatchSchema>,
        batches: Vec<Batch>,
    ) -> HaulResult<Self> {
        if let Some(index) = batches.iter().position(|batch| batch.schema() != &schema) {
            bail!(
                ErrorKind::SchemaMismatch,
                "Batch schema differs from the home schema",
                format!("batch {index} does not carry the home schema")
            );
        }

        Ok(Self {
            name: name.into(),
            schema,
            batches: Arc::new(batches),
        })
    }

    pub fn schema(&self) -> &Arc<BatchSchema> {
        &self.schema
    }

    /// Total number of rows across all batches, ignoring filters.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(Batch::row_count).sum()
    }
}

fn apply_filter(batch: &Batch, filter: &FilterExpression) -> HaulResult<Option<Batch>> {
    let Some((index, _)) = batch.schema().column(filter.column()) else {
        bail!(
            ErrorKind::SchemaDrift,
            "Filter column is missing from the batch",
            format!("column `{}`", filter.column())
        );
    };

    let rows: Vec<TableRow> = batch
        .rows()
        .iter()
        .filter(|row| {
            row.values()
                .get(index)
                .is_some_and(|cell| filter.matches(cell))
        })
        .cloned()
        .collect();

    if rows.is_empty() {
        return Ok(None);
    }

    Batch::try_new(batch.schema().clone(), rows).map(Some)
}

impl Home for MemoryHome {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate_schema(&self) -> HaulResult<BatchSchema> {
        Ok(self.schema.as_ref().clone())
    }

    async fn read_batches(&self, filter: Option<FilterExpression>) -> HaulResult<BatchStream> {
        debug!(home = %self.name, filter = ?filter.as_ref().map(ToString::to_string), "reading batches");

        let batches = self.batches.clone();
        let stream = stream::iter(0..batches.len()).filter_map(move |index| {
            let batch = &batches[index];
            let item = match &filter {
                Some(filter) => apply_filter(batch, filter).transpose(),
                None => Some(Ok(batch.clone())),
            };

            futures::future::ready(item)
        });

        Ok(stream.boxed())
    }
}
