// src/engine/scheduler.rs

//! Batch-parallel execution of a task graph.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::engine::cancel::CancelSignal;
use crate::engine::session::{BuildSession, ExecutionResult, SkipReason};
use crate::errors::Result;
use crate::exec::TaskRunner;
use crate::types::TaskId;

/// Walks a [`TaskGraph`] batch by batch and hands ready tasks to the runner.
///
/// All tasks of a batch run concurrently; the next batch starts once every
/// task of the current one has a result. A task whose dependency failed (or
/// was skipped) in the same pass is skipped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    runner: TaskRunner,
    concurrency: Option<usize>,
}

impl Scheduler {
    pub fn new(runner: TaskRunner) -> Self {
        Self {
            runner,
            concurrency: None,
        }
    }

    /// Bound how many tasks of one batch run at once. `None` (the default)
    /// runs the whole batch in parallel.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit.filter(|n| *n > 0);
        self
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Run every task of the graph.
    pub async fn run_all(&self, graph: &TaskGraph, cancel: &CancelSignal) -> Result<BuildSession> {
        let batches = graph.topological_order()?;
        info!(tasks = graph.len(), batches = batches.len(), "starting full pass");
        Ok(self.run_batches(graph, batches, cancel).await)
    }

    /// Clean the sink, then run every task. This is the `build` path.
    pub async fn clean_and_run_all(
        &self,
        graph: &TaskGraph,
        cancel: &CancelSignal,
    ) -> Result<BuildSession> {
        // Order first so a broken graph leaves the previous output alone.
        let batches = graph.topological_order()?;

        let sink = Arc::clone(self.runner.sink());
        tokio::task::spawn_blocking(move || sink.clean())
            .await
            .map_err(anyhow::Error::from)??;

        info!(tasks = graph.len(), batches = batches.len(), "starting clean build");
        Ok(self.run_batches(graph, batches, cancel).await)
    }

    /// Run `ids` plus everything that transitively depends on them.
    ///
    /// Dependencies of those tasks are not rerun; their previous output is
    /// assumed current. Unknown identifiers are ignored with a warning.
    pub async fn run_subset<'a, I>(
        &self,
        graph: &TaskGraph,
        ids: I,
        cancel: &CancelSignal,
    ) -> Result<BuildSession>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let requested: Vec<&str> = ids.into_iter().collect();
        for id in requested.iter().filter(|id| !graph.contains(id)) {
            warn!(task = %id, "ignoring unknown task in partial pass");
        }

        let affected: BTreeSet<TaskId> = graph.closure_of(requested.iter().copied());
        let batches: Vec<Vec<TaskId>> = graph
            .topological_order()?
            .into_iter()
            .map(|batch| {
                batch
                    .into_iter()
                    .filter(|id| affected.contains(id))
                    .collect::<Vec<_>>()
            })
            .filter(|batch| !batch.is_empty())
            .collect();

        info!(
            requested = ?requested,
            affected = ?affected,
            "starting partial pass"
        );
        Ok(self.run_batches(graph, batches, cancel).await)
    }

    async fn run_batches(
        &self,
        graph: &TaskGraph,
        batches: Vec<Vec<TaskId>>,
        cancel: &CancelSignal,
    ) -> BuildSession {
        let semaphore = self.concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut results = Vec::with_capacity(graph.len());
        let mut not_ok: HashSet<TaskId> = HashSet::new();
        let mut cancelled = false;

        for (index, batch) in batches.into_iter().enumerate() {
            if !cancelled && cancel.is_cancelled() {
                info!(batch = index, "pass cancelled; skipping remaining batches");
                cancelled = true;
            }
            if cancelled {
                results.extend(
                    batch
                        .into_iter()
                        .map(|id| ExecutionResult::skipped(id, SkipReason::Cancelled)),
                );
                continue;
            }

            debug!(batch = index, tasks = ?batch, "starting batch");
            let mut batch_results: BTreeMap<TaskId, ExecutionResult> = BTreeMap::new();
            let mut running: Vec<(TaskId, JoinHandle<ExecutionResult>)> = Vec::new();

            for id in batch {
                let Some(task) = graph.get(&id) else {
                    continue;
                };

                if let Some(bad) = task.deps.iter().find(|d| not_ok.contains(*d)) {
                    debug!(task = %id, upstream = %bad, "skipping task after upstream failure");
                    batch_results.insert(
                        id.clone(),
                        ExecutionResult::skipped(id, SkipReason::UpstreamFailed(bad.clone())),
                    );
                    continue;
                }

                let runner = self.runner.clone();
                let task = task.clone();
                let permits = semaphore.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match permits {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    runner.execute(&task).await
                });
                running.push((id, handle));
            }

            for (id, handle) in running {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(task = %id, error = %err, "task aborted");
                        ExecutionResult::failed(
                            id.clone(),
                            Default::default(),
                            format!("task aborted: {err}"),
                        )
                    }
                };
                batch_results.insert(id, result);
            }

            for (id, result) in batch_results {
                if !result.status.is_success() {
                    not_ok.insert(id);
                }
                results.push(result);
            }
        }

        BuildSession::new(results, cancelled)
    }
}
