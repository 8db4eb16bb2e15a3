// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling watch / exclude glob patterns per task.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing bursts of events into one dispatch.
//! - Optionally hashing watched content so identical rewrites do not
//!   re-trigger a task.
//!
//! It holds only pattern -> task identifier mappings. Which dependents rerun
//! is decided by the dispatch target (normally `Scheduler::run_subset`).

pub mod cache;
pub mod debounce;
pub mod dispatch;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::{DebounceState, Debouncer};
pub use dispatch::{DispatchTarget, SchedulerDispatch};
pub use hash::HashGate;
pub use patterns::{build_profiles_from_config, TaskWatchProfile};
pub use watcher::{spawn_event_loop, watch, WatchSettings, WatcherHandle};
