use std::future::Future;

use futures::stream::BoxStream;

use crate::error::HaulResult;
use crate::types::{Batch, BatchSchema};
use crate::watermark::FilterExpression;

/// Finite stream of batches produced by a single [`Home::read_batches`] call.
pub type BatchStream = BoxStream<'static, HaulResult<Batch>>;

/// Trait for systems that batches are read from.
///
/// Implementations map their native failures to [`crate::error::ErrorKind`] values. Transient
/// failures must use one of the connection kinds, otherwise the mover will not retry them.
pub trait Home {
    /// Returns the name of the home, used in logs.
    fn name(&self) -> &str;

    /// Returns the schema every batch will carry.
    ///
    /// Called once per run before any data moves. Failing here is fatal for the run.
    fn validate_schema(&self) -> impl Future<Output = HaulResult<BatchSchema>> + Send;

    /// Starts reading the entity, restricted to rows matching `filter` when given.
    ///
    /// Every call starts a new read from the beginning, which is how a retried attempt
    /// restarts. Batches must be yielded in a stable order.
    fn read_batches(
        &self,
        filter: Option<FilterExpression>,
    ) -> impl Future<Output = HaulResult<BatchStream>> + Send;
}
