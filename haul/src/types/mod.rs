//! Core data types moved through movers.

mod batch;
mod cell;
mod run;
mod schema;

pub use batch::{Batch, TableRow};
pub use cell::Cell;
pub use run::{EntityIdentity, RunContext, RunId};
pub use schema::{BatchSchema, ColumnSchema, ColumnType};
