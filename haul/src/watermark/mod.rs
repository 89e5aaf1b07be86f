//! Incremental cursor tracking.
//!
//! A [`Watermark`] is bound to one entity and one column. It validates the column against the
//! home's schema, observes the column's maximum while batches are written, turns the persisted
//! value into a [`FilterExpression`] for the next incremental read and commits the new value
//! through the journal once a run succeeded.

mod filter;
mod tracker;
mod value;

pub use filter::FilterExpression;
pub use tracker::Watermark;
pub use value::{WatermarkState, WatermarkValue};
