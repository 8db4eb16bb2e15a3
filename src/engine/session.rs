// src/engine/session.rs

//! Per-pass results.

use std::fmt;
use std::time::Duration;

use crate::types::TaskId;

/// Why a task did not run in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A dependency (named) failed or was itself skipped.
    UpstreamFailed(TaskId),
    /// The pass was cancelled before the task's batch started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed(dep) => write!(f, "upstream task '{dep}' did not succeed"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }
}

/// Outcome of one task in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub task: TaskId,
    pub status: TaskStatus,
    pub elapsed: Duration,
    /// Total bytes handed to the sink; `None` if the task produced nothing.
    pub output_bytes: Option<u64>,
    /// Rendered error for failed tasks.
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(task: impl Into<TaskId>, elapsed: Duration, output_bytes: u64) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Succeeded,
            elapsed,
            output_bytes: Some(output_bytes),
            error: None,
        }
    }

    pub fn failed(task: impl Into<TaskId>, elapsed: Duration, error: impl fmt::Display) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Failed,
            elapsed,
            output_bytes: None,
            error: Some(error.to_string()),
        }
    }

    pub fn skipped(task: impl Into<TaskId>, reason: SkipReason) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Skipped(reason),
            elapsed: Duration::ZERO,
            output_bytes: None,
            error: None,
        }
    }
}

/// All results of one full or partial pass, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSession {
    results: Vec<ExecutionResult>,
    cancelled: bool,
}

impl BuildSession {
    pub fn new(results: Vec<ExecutionResult>, cancelled: bool) -> Self {
        Self { results, cancelled }
    }

    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn get(&self, task: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.task == task)
    }

    /// Task identifiers in result order.
    pub fn task_ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.task.as_str()).collect()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.status.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Skipped(_)))
    }

    /// True if every task succeeded and the pass ran to completion.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.results.iter().all(|r| r.status.is_success())
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
