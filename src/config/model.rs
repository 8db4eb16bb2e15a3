use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// output_root = "distro/content"
/// debounce_ms = 100
///
/// [default]
/// exclude = ["**/*.tmp"]
///
/// [task.compile-css]
/// inputs = ["css/main.scss"]
/// watch = ["css/**/*.scss"]
/// output = { file = "css/main.css" }
/// transform = "scss"
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one task.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All tasks from `[task.<name>]`, keyed by task identifier.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on dependency references being valid and acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    default: DefaultSection,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            default,
            task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }
}

/// `[config]` section: global engine behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root directory receiving all artifacts, relative to the project root.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// Watcher debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum number of tasks of one batch running at once. `0` means the
    /// batch's natural parallelism.
    #[serde(default)]
    pub max_concurrency: usize,
}

fn default_output_root() -> String {
    "dist".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            debounce_ms: default_debounce_ms(),
            max_concurrency: 0,
        }
    }
}

impl ConfigSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The output root with `.` components dropped, so `./dist` and `dist`
    /// name the same directory.
    pub fn output_root_path(&self) -> PathBuf {
        Path::new(&self.output_root)
            .components()
            .filter(|c| *c != Component::CurDir)
            .collect()
    }

    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrency > 0).then_some(self.max_concurrency)
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Default `exclude` patterns for tasks that do not override them.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Default `use_hash` behaviour; if `None`, the global default is `false`.
    #[serde(default)]
    pub use_hash: Option<bool>,
}

/// Where a task's output lands, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputConfig {
    /// All inputs are bundled into this single file.
    File(String),
    /// Every input is written separately below this directory.
    Dir(String),
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Dependency list: this task runs after all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Input globs relative to the project root.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Extra globs that should trigger this task in watch mode without being
    /// inputs themselves (e.g. partials pulled in by `@use`).
    ///
    /// If `None`, the task watches its `inputs`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Optional task-local exclude patterns. If `None`, `default.exclude` is used.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// If true, `default.exclude` is appended to `task.exclude`.
    #[serde(default)]
    pub append_default_exclude: bool,

    pub output: OutputConfig,

    /// Name of the transform in the registry (`copy`, `scss`, `command`, ...).
    #[serde(default = "default_transform")]
    pub transform: String,

    /// Free-form options handed to the transform.
    #[serde(default)]
    pub options: toml::Table,

    /// Only part of the graph for `build --release`.
    #[serde(default)]
    pub release_only: bool,

    /// Only re-trigger in watch mode when the watched content really changed.
    #[serde(default)]
    pub use_hash: Option<bool>,
}

fn default_transform() -> String {
    "copy".to_string()
}

impl TaskConfig {
    /// Effective `use_hash` given a default from `[default]`.
    pub fn effective_use_hash(&self, default_use_hash: bool) -> bool {
        self.use_hash.unwrap_or(default_use_hash)
    }

    /// Effective watch patterns: explicit `watch`, otherwise the inputs.
    pub fn effective_watch(&self) -> Vec<String> {
        match &self.watch {
            Some(list) => list.clone(),
            None => self.inputs.clone(),
        }
    }

    /// Effective exclude patterns after applying the `[default]` rules.
    pub fn effective_exclude(&self, defaults: &DefaultSection) -> Vec<String> {
        match (&self.exclude, self.append_default_exclude) {
            (Some(list), true) => {
                let mut combined = list.clone();
                combined.extend(defaults.exclude.iter().cloned());
                combined
            }
            (Some(list), false) => list.clone(),
            (None, _) => defaults.exclude.clone(),
        }
    }
}
