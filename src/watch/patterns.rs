// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::ConfigFile;
use crate::exec::inputs::build_globset;
use crate::fs::FileSystem;
use crate::types::{BuildMode, TaskId};
use crate::watch::path_utils::is_within;

/// Compiled watch/exclude glob patterns for a single task.
///
/// The patterns are relative to the project root. The watcher passes relative
/// paths (e.g. `"css/partials/_nav.scss"`) into `matches`.
#[derive(Clone)]
pub struct TaskWatchProfile {
    task: TaskId,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    use_hash: bool,
}

impl fmt::Debug for TaskWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatchProfile")
            .field("task", &self.task)
            .field("use_hash", &self.use_hash)
            .finish_non_exhaustive()
    }
}

impl TaskWatchProfile {
    /// Compile a profile from raw pattern lists.
    pub fn new(
        task: impl Into<TaskId>,
        watch: &[String],
        exclude: &[String],
        use_hash: bool,
    ) -> Result<Self> {
        let task = task.into();

        let watch_set = build_globset(watch)
            .with_context(|| format!("building watch globset for task {task}"))?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for task {task}"))?,
            )
        };

        Ok(Self {
            task,
            watch_set,
            exclude_set,
            use_hash,
        })
    }

    /// Task this profile triggers.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Whether this task uses content hashing (`use_hash = true`).
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Returns true if the task is interested in the given path (relative to
    /// the project root).
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build one profile per task taking part in a build of the given mode.
///
/// Watch patterns are the task's `watch` list, or its `inputs` when `watch` is
/// absent. Excludes follow the `[default]` rules.
pub fn build_profiles_from_config(cfg: &ConfigFile, mode: BuildMode) -> Result<Vec<TaskWatchProfile>> {
    let default_use_hash = cfg.default_section().use_hash.unwrap_or(false);

    cfg.tasks()
        .iter()
        .filter(|(_, t)| !t.release_only || mode.includes_release_tasks())
        .map(|(name, t)| {
            TaskWatchProfile::new(
                name.clone(),
                &t.effective_watch(),
                &t.effective_exclude(cfg.default_section()),
                t.effective_use_hash(default_use_hash),
            )
        })
        .collect()
}

/// Collect all files under `root` that match this task's watch/exclude
/// patterns, skipping the `ignore` directories (relative to `root`).
///
/// Used for the content hashes of `use_hash = true` tasks.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    ignore: &[PathBuf],
    profile: &TaskWatchProfile,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if ignore.iter().any(|i| is_within(&rel_str, i)) {
                continue;
            }
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) && profile.matches(&rel_str) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
