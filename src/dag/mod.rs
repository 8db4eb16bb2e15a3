// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`task`] holds the schedulable unit and its output target.
//! - [`graph`] holds the task map and computes execution order.

pub mod graph;
pub mod task;

pub use graph::TaskGraph;
pub use task::{OutputTarget, Task};

use std::path::PathBuf;

use tracing::debug;

use crate::config::{ConfigFile, OutputConfig};
use crate::errors::{BuildError, Result};
use crate::exec::transform::{TransformOptions, TransformRegistry};
use crate::types::BuildMode;

/// Build and validate the task graph for a given build mode.
///
/// `release_only` tasks are left out unless `mode` is [`BuildMode::Release`].
/// Transform names are resolved against `registry` here, so an unknown name is
/// reported before anything runs.
pub fn graph_from_config(
    cfg: &ConfigFile,
    mode: BuildMode,
    registry: &TransformRegistry,
) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();

    for (name, tc) in cfg.tasks() {
        if tc.release_only && !mode.includes_release_tasks() {
            debug!(task = %name, "skipping release_only task in dev build");
            continue;
        }

        let transform = registry
            .get(&tc.transform)
            .ok_or_else(|| BuildError::UnknownTransform {
                task: name.clone(),
                name: tc.transform.clone(),
            })?;

        let output = match &tc.output {
            OutputConfig::File(p) => OutputTarget::File(PathBuf::from(p)),
            OutputConfig::Dir(p) => OutputTarget::Dir(PathBuf::from(p)),
        };

        let mut task = Task::new(name.clone(), transform, output)
            .options(TransformOptions::new(tc.options.clone()));
        for dep in &tc.after {
            task = task.after(dep.clone());
        }
        for input in &tc.inputs {
            task = task.input(input.clone());
        }
        for pattern in tc.effective_exclude(cfg.default_section()) {
            task = task.exclude(pattern);
        }

        graph.add_task(task)?;
    }

    graph.validate()?;
    Ok(graph)
}
