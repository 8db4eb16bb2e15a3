use std::fmt;
use std::path::PathBuf;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Which flavour of full build is requested.
///
/// - `Dev`: only regular tasks.
/// - `Release`: regular tasks plus every `release_only` task (compression /
///   minification stages appended as dependents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Dev,
    Release,
}

impl BuildMode {
    pub fn includes_release_tasks(self) -> bool {
        matches!(self, BuildMode::Release)
    }
}

/// Kind of filesystem change observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

impl ChangeKind {
    /// Merge two kinds observed for the same path within one debounce window.
    ///
    /// The latest event wins, except that a file created and then modified
    /// inside the window is still reported as created.
    pub fn merge(self, later: ChangeKind) -> ChangeKind {
        match (self, later) {
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            (_, later) => later,
        }
    }
}

/// A single filesystem change: path plus kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
