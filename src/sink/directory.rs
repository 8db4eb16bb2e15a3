// src/sink/directory.rs

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::sink::{Artifact, ArtifactSink};

/// Writes artifacts below an output root.
///
/// Writes share a read guard on `gate`; `clean` takes the write guard, so it
/// never runs while a write is half done.
#[derive(Debug)]
pub struct DirectorySink {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    gate: RwLock<()>,
}

impl DirectorySink {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            gate: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, artifact: &Artifact) -> Result<PathBuf> {
        let contained = artifact
            .path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || artifact.path.as_os_str().is_empty() {
            return Err(BuildError::SinkWrite {
                path: artifact.path.display().to_string(),
                reason: "path escapes the output root".to_string(),
            });
        }
        Ok(self.root.join(&artifact.path))
    }
}

impl ArtifactSink for DirectorySink {
    fn write(&self, task: &str, artifact: &Artifact) -> Result<()> {
        let target = self.target(artifact)?;
        let _guard = self.gate.read().unwrap_or_else(|p| p.into_inner());

        // Leave identical files untouched so watchers see no change.
        if self.fs.is_file(&target) {
            if let Ok(existing) = self.fs.read(&target) {
                if existing == artifact.bytes {
                    debug!(task, path = ?target, "artifact unchanged");
                    return Ok(());
                }
            }
        }

        self.fs
            .write(&target, &artifact.bytes)
            .map_err(|e| BuildError::SinkWrite {
                path: target.display().to_string(),
                reason: format!("{e:#}"),
            })?;
        debug!(task, path = ?target, bytes = artifact.bytes.len(), "artifact written");
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        let has_parent = self.root.components().any(|c| c == Component::ParentDir);
        let has_name = self.root.components().any(|c| matches!(c, Component::Normal(_)));
        if has_parent || !has_name {
            return Err(BuildError::SinkWrite {
                path: self.root.display().to_string(),
                reason: "refusing to clean an output root that is not a named directory"
                    .to_string(),
            });
        }

        let _guard = self.gate.write().unwrap_or_else(|p| p.into_inner());
        info!(root = ?self.root, "cleaning output root");
        self.fs.remove_dir_all(&self.root)?;
        Ok(())
    }
}
