// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`transform`] defines the `Transform` trait and the name registry.
//! - [`builtin`] provides `copy`, `scss` and `command`.
//! - [`inputs`] resolves input globs against the project root.
//! - [`runner`] runs one task and reports an `ExecutionResult`.

pub mod builtin;
pub mod inputs;
pub mod runner;
pub mod transform;

pub use inputs::{InputFile, InputResolver};
pub use runner::{LoadedInput, TaskRunner};
pub use transform::{Transform, TransformInput, TransformOptions, TransformRegistry};
