// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Graph-construction errors (`DuplicateTask`, `Cycle`, `MissingDependency`)
//! are fatal and abort before any task runs. Per-task errors (`Transform`,
//! `SinkWrite`, `Input`) are captured into that task's `ExecutionResult`.

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("duplicate task identifier '{0}'")]
    DuplicateTask(TaskId),

    #[error("cycle detected in task graph involving task '{0}'")]
    Cycle(TaskId),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency { task: TaskId, dependency: TaskId },

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("could not write artifact '{path}': {reason}")]
    SinkWrite { path: String, reason: String },

    #[error("could not resolve inputs: {0}")]
    Input(String),

    #[error("unknown transform '{name}' for task '{task}'")]
    UnknownTransform { task: TaskId, name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Whether this error belongs to graph construction (fatal before any task
    /// runs) rather than to a single task.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            BuildError::DuplicateTask(_)
                | BuildError::Cycle(_)
                | BuildError::MissingDependency { .. }
        )
    }
}

/// Failure reported by a transform collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{transform}: {message}")]
pub struct TransformError {
    pub transform: String,
    pub message: String,
}

impl TransformError {
    pub fn new(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transform: transform.into(),
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
