use std::cmp::Ordering;
use std::fmt;

use crate::types::Cell;
use crate::watermark::WatermarkValue;

/// Predicate restricting an incremental read to rows strictly after a watermark.
///
/// Homes backed by a query language render it with [`fmt::Display`]; in-process homes evaluate
/// it with [`FilterExpression::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    column: String,
    lower_bound: WatermarkValue,
}

impl FilterExpression {
    pub fn greater_than(column: impl Into<String>, lower_bound: WatermarkValue) -> Self {
        Self {
            column: column.into(),
            lower_bound,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn lower_bound(&self) -> &WatermarkValue {
        &self.lower_bound
    }

    /// Returns whether `cell`, taken from [`FilterExpression::column`], passes the filter.
    ///
    /// Nulls and values that cannot be compared with the bound never pass.
    pub fn matches(&self, cell: &Cell) -> bool {
        match WatermarkValue::from_cell(self.lower_bound.kind(), cell) {
            Ok(Some(value)) => value.compare(&self.lower_bound) == Some(Ordering::Greater),
            _ => false,
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.column, self.lower_bound)
    }
}
