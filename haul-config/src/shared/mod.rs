//! Shared configuration types for `haul` movers and orchestrators.

mod base;
mod flow;
mod haul;
mod journal;
mod mirror;
mod mover;
mod orchestrator;
mod pool;
mod retry;

pub use base::ValidationError;
pub use flow::{FlowConfig, RunMode, WatermarkConfig, WatermarkKind};
pub use haul::HaulConfig;
pub use journal::JournalConfig;
pub use mirror::MirrorConfig;
pub use mover::MoverConfig;
pub use orchestrator::OrchestratorConfig;
pub use pool::PoolConfig;
pub use retry::RetryConfig;
