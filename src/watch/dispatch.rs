// src/watch/dispatch.rs

//! Where the watcher sends the set of affected tasks.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::error;

use crate::dag::TaskGraph;
use crate::engine::{BuildSession, CancelSignal, Scheduler};
use crate::report;
use crate::types::TaskId;

/// Receiver of debounced, affected task sets.
///
/// Production code uses [`SchedulerDispatch`]; tests can provide their own
/// implementation that records what was dispatched.
pub trait DispatchTarget: Send + Sync {
    fn dispatch(
        &self,
        tasks: BTreeSet<TaskId>,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = BuildSession> + Send + '_>>;
}

/// Runs each dispatch as a partial scheduler pass over a shared graph.
#[derive(Debug, Clone)]
pub struct SchedulerDispatch {
    scheduler: Scheduler,
    graph: Arc<TaskGraph>,
}

impl SchedulerDispatch {
    pub fn new(scheduler: Scheduler, graph: Arc<TaskGraph>) -> Self {
        Self { scheduler, graph }
    }
}

impl DispatchTarget for SchedulerDispatch {
    fn dispatch(
        &self,
        tasks: BTreeSet<TaskId>,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = BuildSession> + Send + '_>> {
        Box::pin(async move {
            let ids = tasks.iter().map(String::as_str);
            match self.scheduler.run_subset(&self.graph, ids, &cancel).await {
                Ok(session) => {
                    report::log_session(&session);
                    session
                }
                Err(err) => {
                    error!(error = %err, "partial pass could not start");
                    BuildSession::default()
                }
            }
        })
    }
}
