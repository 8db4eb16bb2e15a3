// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`scheduler`] walks the task graph batch by batch.
//! - [`session`] holds the per-pass results.
//! - [`cancel`] provides cooperative cancellation between batches.

pub mod cancel;
pub mod scheduler;
pub mod session;

pub use cancel::{CancelHandle, CancelSignal};
pub use scheduler::Scheduler;
pub use session::{BuildSession, ExecutionResult, SkipReason, TaskStatus};
