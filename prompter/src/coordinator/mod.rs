//! Parallel task coordination
//!
//! Drives a validated dependency graph to completion under a concurrency
//! cap. A polling scheduler promotes tasks whose dependencies completed,
//! skips the transitive dependents of failures, and launches admissible
//! tasks onto the tokio runtime; the [`ResourcePool`] enforces the cap and
//! the exclusivity rule.

mod core;
mod execution;
mod pool;

pub use self::core::ParallelCoordinator;
pub use self::execution::{ExecutionState, TaskStatus};
pub use self::pool::ResourcePool;
