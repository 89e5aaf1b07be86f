use std::cmp::Ordering;

use haul_config::shared::WatermarkConfig;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, HaulResult};
use crate::journal::Journal;
use crate::types::{Batch, BatchSchema, EntityIdentity};
use crate::watermark::value::is_compatible;
use crate::watermark::{FilterExpression, WatermarkState, WatermarkValue};
use crate::{RunMode, WatermarkKind, bail};

/// Incremental cursor of one entity, bound to a single column.
///
/// The column passed at construction is the only column ever used, both to filter reads and to
/// compute new values. Cloning yields an independent tracker, which is how each attempt gets a
/// fresh candidate.
#[derive(Debug, Clone)]
pub struct Watermark {
    identity: EntityIdentity,
    column: String,
    kind: WatermarkKind,
    persisted: Option<WatermarkState>,
    candidate: Option<WatermarkValue>,
}

impl Watermark {
    pub fn new(identity: EntityIdentity, column: impl Into<String>, kind: WatermarkKind) -> Self {
        Self {
            identity,
            column: column.into(),
            kind,
            persisted: None,
            candidate: None,
        }
    }

    pub fn from_config(identity: EntityIdentity, config: &WatermarkConfig) -> Self {
        Self::new(identity, config.column.clone(), config.kind)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> WatermarkKind {
        self.kind
    }

    /// Fails fast if the column is missing from `schema` or its type cannot carry this kind.
    pub fn validate_schema(&self, schema: &BatchSchema) -> HaulResult<()> {
        let Some((_, column)) = schema.column(&self.column) else {
            bail!(
                ErrorKind::WatermarkColumnMissing,
                "Watermark column is not part of the home schema",
                format!("column `{}` not found for {}", self.column, self.identity)
            );
        };

        if !is_compatible(self.kind, column.typ) {
            bail!(
                ErrorKind::WatermarkColumnIncompatible,
                "Watermark column type is incompatible with the watermark kind",
                format!(
                    "column `{}` of {} has type {} which cannot hold a {} watermark",
                    self.column, self.identity, column.typ, self.kind
                )
            );
        }

        Ok(())
    }

    /// Loads the persisted state used to build the read filter.
    ///
    /// A state recorded for another column or kind is ignored, so a reconfigured watermark
    /// starts with a full read instead of filtering on an unrelated value.
    pub fn set_persisted(&mut self, state: Option<WatermarkState>) {
        self.persisted = match state {
            Some(state) if state.column != self.column || state.kind != self.kind => {
                warn!(
                    flow = self.identity.flow(),
                    entity = self.identity.entity(),
                    persisted_column = %state.column,
                    persisted_kind = %state.kind,
                    column = %self.column,
                    kind = %self.kind,
                    "ignoring persisted watermark recorded for a different column or kind"
                );
                None
            }
            state => state,
        };
    }

    pub fn persisted(&self) -> Option<&WatermarkState> {
        self.persisted.as_ref()
    }

    /// Returns `column > persisted value`, or `None` when nothing was persisted yet.
    pub fn build_filter_expression(&self) -> Option<FilterExpression> {
        self.persisted
            .as_ref()
            .map(|state| FilterExpression::greater_than(self.column.clone(), state.value.clone()))
    }

    /// Drops the value observed so far.
    pub fn reset_candidate(&mut self) {
        self.candidate = None;
    }

    pub fn candidate(&self) -> Option<&WatermarkValue> {
        self.candidate.as_ref()
    }

    /// Raises the candidate to the largest non-null value of the column in `batch`.
    pub fn observe(&mut self, batch: &Batch) -> HaulResult<()> {
        let Some((index, _)) = batch.schema().column(&self.column) else {
            bail!(
                ErrorKind::SchemaDrift,
                "Watermark column disappeared from a batch",
                format!("column `{}` missing in a batch of {}", self.column, self.identity)
            );
        };

        for cell in batch.column_values(index) {
            let Some(value) = WatermarkValue::from_cell(self.kind, cell)? else {
                continue;
            };

            let is_new_max = match &self.candidate {
                Some(current) => value.compare(current) == Some(Ordering::Greater),
                None => true,
            };
            if is_new_max {
                self.candidate = Some(value);
            }
        }

        Ok(())
    }

    /// Persists the candidate through `journal`. Call only after the store accepted the run.
    ///
    /// Skipped when nothing was observed, and when a `full_drop` run moved zero rows so that an
    /// empty run never regresses a valid cutover. Returns the state written, if any.
    pub async fn commit<J: Journal>(
        &mut self,
        journal: &J,
        mode: RunMode,
        rows_moved: u64,
    ) -> HaulResult<Option<WatermarkState>> {
        if mode == RunMode::FullDrop && rows_moved == 0 {
            info!(
                flow = self.identity.flow(),
                entity = self.identity.entity(),
                "full drop moved no rows, keeping the previous watermark"
            );
            return Ok(None);
        }

        let Some(value) = self.candidate.clone() else {
            debug!(
                flow = self.identity.flow(),
                entity = self.identity.entity(),
                "no watermark value observed, nothing to commit"
            );
            return Ok(None);
        };

        let state = WatermarkState::new(&self.identity, self.column.clone(), value);
        journal.set_watermark(state.clone()).await?;

        info!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            column = %self.column,
            value = %state.value,
            "watermark committed"
        );
        self.persisted = Some(state.clone());

        Ok(Some(state))
    }
}
