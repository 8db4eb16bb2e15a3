// src/dag/task.rs

//! A single schedulable unit of build work.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::exec::transform::{Transform, TransformOptions};
use crate::types::TaskId;

/// Where a task's output lands, relative to the sink root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// All inputs are concatenated in order and transformed once into this file.
    File(PathBuf),
    /// Each input is transformed on its own and written below this directory,
    /// keeping its path relative to the glob base it was matched by.
    Dir(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::File(p) | OutputTarget::Dir(p) => p,
        }
    }
}

/// Task definition: identifier, dependencies, transform, inputs and output.
#[derive(Clone)]
pub struct Task {
    pub id: TaskId,
    /// Direct dependencies, in declaration order.
    pub deps: Vec<TaskId>,
    pub transform: Arc<dyn Transform>,
    pub options: TransformOptions,
    /// Input globs relative to the project root.
    pub inputs: Vec<String>,
    /// Globs removed from the input set.
    pub exclude: Vec<String>,
    pub output: OutputTarget,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("deps", &self.deps)
            .field("transform", &self.transform.name())
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(
        id: impl Into<TaskId>,
        transform: Arc<dyn Transform>,
        output: OutputTarget,
    ) -> Self {
        Self {
            id: id.into(),
            deps: Vec::new(),
            transform,
            options: TransformOptions::default(),
            inputs: Vec::new(),
            exclude: Vec::new(),
            output,
        }
    }

    pub fn after(mut self, dep: impl Into<TaskId>) -> Self {
        self.deps.push(dep.into());
        self
    }

    pub fn input(mut self, pattern: impl Into<String>) -> Self {
        self.inputs.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }
}
