// src/exec/runner.rs

//! Runs a single task: resolve inputs, apply the transform, hand the output
//! to the sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::dag::{OutputTarget, Task};
use crate::engine::session::ExecutionResult;
use crate::errors::{BuildError, Result};
use crate::exec::inputs::{InputFile, InputResolver};
use crate::exec::transform::TransformInput;
use crate::report;
use crate::sink::{Artifact, ArtifactSink};

/// An input file together with its contents.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub file: InputFile,
    pub bytes: Vec<u8>,
}

/// Executes tasks against a sink. Cheap to clone.
#[derive(Clone)]
pub struct TaskRunner {
    sink: Arc<dyn ArtifactSink>,
    resolver: InputResolver,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("root", &self.resolver.root())
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn new(sink: Arc<dyn ArtifactSink>, resolver: InputResolver) -> Self {
        Self { sink, resolver }
    }

    pub fn sink(&self) -> &Arc<dyn ArtifactSink> {
        &self.sink
    }

    /// Resolve and read the task's inputs, then [`run`](Self::run) it.
    ///
    /// Elapsed time includes input loading.
    pub async fn execute(&self, task: &Task) -> ExecutionResult {
        let started = Instant::now();
        match self.load_inputs(task).await {
            Ok(inputs) => self.run_timed(task, inputs, started).await,
            Err(err) => self.finish(task, started, Err(err)),
        }
    }

    /// Run `task` over already loaded inputs.
    ///
    /// Never returns an error: failures end up in the result.
    pub async fn run(&self, task: &Task, inputs: Vec<LoadedInput>) -> ExecutionResult {
        self.run_timed(task, inputs, Instant::now()).await
    }

    async fn run_timed(
        &self,
        task: &Task,
        inputs: Vec<LoadedInput>,
        started: Instant,
    ) -> ExecutionResult {
        let outcome = self.produce(task, inputs).await;
        let outcome = match outcome {
            Ok(artifacts) => self.write_all(task, artifacts).await,
            Err(err) => Err(err),
        };
        self.finish(task, started, outcome)
    }

    fn finish(&self, task: &Task, started: Instant, outcome: Result<u64>) -> ExecutionResult {
        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(bytes) => ExecutionResult::succeeded(task.id.clone(), elapsed, bytes),
            Err(err) => ExecutionResult::failed(task.id.clone(), elapsed, err),
        };

        match &result.error {
            None => info!("{}", report::log_line(&result)),
            Some(err) => warn!(task = %task.id, error = %err, "{}", report::log_line(&result)),
        }
        result
    }

    async fn load_inputs(&self, task: &Task) -> Result<Vec<LoadedInput>> {
        let resolver = self.resolver.clone();
        let patterns = task.inputs.clone();
        let exclude = task.exclude.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<LoadedInput>> {
            let files = resolver
                .resolve(&patterns, &exclude)
                .map_err(|e| BuildError::Input(format!("{e:#}")))?;
            files
                .into_iter()
                .map(|file| {
                    let bytes = resolver
                        .read(&file)
                        .map_err(|e| BuildError::Input(format!("{e:#}")))?;
                    Ok(LoadedInput { file, bytes })
                })
                .collect()
        })
        .await
        .map_err(|e| BuildError::Input(format!("input loader failed: {e}")))?
    }

    async fn produce(&self, task: &Task, inputs: Vec<LoadedInput>) -> Result<Vec<Artifact>> {
        let root = self.resolver.root().to_path_buf();

        match &task.output {
            OutputTarget::File(path) => {
                if inputs.is_empty() {
                    return Err(BuildError::Input(format!(
                        "no files match the inputs of task '{}'",
                        task.id
                    )));
                }

                let mut sources = Vec::with_capacity(inputs.len());
                let mut bytes = Vec::new();
                for (i, input) in inputs.into_iter().enumerate() {
                    if i > 0 {
                        bytes.push(b'\n');
                    }
                    bytes.extend_from_slice(&input.bytes);
                    sources.push(input.file.path);
                }

                debug!(task = %task.id, files = sources.len(), "applying transform to bundle");
                let out = task
                    .transform
                    .apply(TransformInput::new(root, sources, bytes), &task.options)
                    .await?;
                Ok(vec![Artifact::new(path.clone(), out)])
            }
            OutputTarget::Dir(dir) => {
                let extension = task.options.get_str("extension");
                let mut artifacts = Vec::with_capacity(inputs.len());

                for input in inputs {
                    let mut target: PathBuf = dir.join(&input.file.base_rel);
                    if let Some(ext) = extension {
                        target.set_extension(ext);
                    }
                    let out = task
                        .transform
                        .apply(
                            TransformInput::new(root.clone(), vec![input.file.path], input.bytes),
                            &task.options,
                        )
                        .await?;
                    artifacts.push(Artifact::new(target, out));
                }
                Ok(artifacts)
            }
        }
    }

    async fn write_all(&self, task: &Task, artifacts: Vec<Artifact>) -> Result<u64> {
        let sink = Arc::clone(&self.sink);
        let task_id = task.id.clone();

        tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut total = 0;
            for artifact in &artifacts {
                sink.write(&task_id, artifact)?;
                total += artifact.len();
            }
            Ok(total)
        })
        .await
        .map_err(|e| BuildError::SinkWrite {
            path: task.output.path().display().to_string(),
            reason: format!("writer task failed: {e}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::TaskStatus;
    use crate::exec::builtin::CopyTransform;
    use crate::exec::transform::TransformOptions;
    use crate::fs::mock::MockFileSystem;
    use crate::sink::MemorySink;

    fn setup() -> (TaskRunner, Arc<MemorySink>) {
        let fs = MockFileSystem::new();
        fs.add_file("./js/a.js", "var a;");
        fs.add_file("./js/b.js", "var b;");
        fs.add_file("./resources/fonts/sub/r.woff", "R");
        let sink = Arc::new(MemorySink::new());
        let runner = TaskRunner::new(sink.clone(), InputResolver::new(Arc::new(fs), "."));
        (runner, sink)
    }

    #[tokio::test]
    async fn file_output_concatenates_in_order() {
        let (runner, sink) = setup();
        let task = Task::new(
            "compile-js",
            Arc::new(CopyTransform),
            OutputTarget::File("js/app.js".into()),
        )
        .input("js/*.js");

        let result = runner.execute(&task).await;
        assert_eq!(result.status, TaskStatus::Succeeded);
        assert_eq!(result.output_bytes, Some(13));
        assert_eq!(sink.get("js/app.js").unwrap(), b"var a;\nvar b;");
    }

    #[tokio::test]
    async fn dir_output_keeps_structure_and_renames() {
        let (runner, sink) = setup();
        let mut table = toml::Table::new();
        table.insert("extension".into(), toml::Value::String("ttf".into()));
        let task = Task::new(
            "copy-fonts",
            Arc::new(CopyTransform),
            OutputTarget::Dir("fonts".into()),
        )
        .input("resources/fonts/**/*")
        .options(TransformOptions::new(table));

        let result = runner.execute(&task).await;
        assert!(result.status.is_success());
        assert_eq!(sink.paths(), vec![PathBuf::from("fonts/sub/r.ttf")]);
    }

    #[tokio::test]
    async fn bundle_without_inputs_fails() {
        let (runner, sink) = setup();
        let task = Task::new(
            "compile-css",
            Arc::new(CopyTransform),
            OutputTarget::File("css/main.css".into()),
        )
        .input("css/main.scss");

        let result = runner.execute(&task).await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("no files match"));
        assert!(sink.is_empty());
    }
}
