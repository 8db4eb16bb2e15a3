#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use assetdag::config::{
    ConfigFile, ConfigSection, DefaultSection, OutputConfig, RawConfigFile, TaskConfig,
};
use assetdag::dag::{OutputTarget, Task, TaskGraph};
use assetdag::engine::Scheduler;
use assetdag::exec::{InputResolver, TaskRunner, Transform};
use assetdag::fs::mock::MockFileSystem;
use assetdag::sink::MemorySink;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_output_root(mut self, root: &str) -> Self {
        self.config.config.output_root = root.to_string();
        self
    }

    pub fn with_global_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_default_use_hash(mut self, val: bool) -> Self {
        self.config.default.use_hash = Some(val);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A `copy` task bundling `input` into the file `output`.
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            task: TaskConfig {
                after: vec![],
                inputs: vec![input.to_string()],
                watch: None,
                exclude: None,
                append_default_exclude: false,
                output: OutputConfig::File(output.to_string()),
                transform: "copy".to_string(),
                options: toml::Table::new(),
                release_only: false,
                use_hash: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn into_dir(mut self, dir: &str) -> Self {
        self.task.output = OutputConfig::Dir(dir.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.task.watch.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn transform(mut self, name: &str) -> Self {
        self.task.transform = name.to_string();
        self
    }

    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.task
            .options
            .insert(key.to_string(), toml::Value::String(value.to_string()));
        self
    }

    pub fn release_only(mut self, val: bool) -> Self {
        self.task.release_only = val;
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.task.use_hash = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Build a graph where every task reads `<id>.in` and writes `<id>.out`
/// through `transform`.
///
/// `layout` lists `(id, deps)` pairs.
pub fn graph_of(layout: &[(&str, &[&str])], transform: Arc<dyn Transform>) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (id, deps) in layout {
        let mut task = Task::new(
            *id,
            Arc::clone(&transform),
            OutputTarget::File(format!("{id}.out").into()),
        )
        .input(format!("{id}.in"));
        for dep in deps.iter() {
            task = task.after(*dep);
        }
        graph.add_task(task).expect("duplicate task in test graph");
    }
    graph
}

/// In-memory project where each task id `X` has an input `./X.in`
/// containing `X`. Matches the layout used by [`graph_of`].
pub fn mock_project(ids: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for id in ids {
        fs.add_file(format!("./{id}.in"), id.as_bytes().to_vec());
    }
    fs
}

/// Scheduler over `fs` rooted at `.`, writing into a fresh `MemorySink`.
pub fn memory_scheduler(fs: MockFileSystem) -> (Scheduler, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let resolver = InputResolver::new(Arc::new(fs), ".");
    let scheduler = Scheduler::new(TaskRunner::new(sink.clone(), resolver));
    (scheduler, sink)
}
