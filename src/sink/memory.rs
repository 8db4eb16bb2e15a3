// src/sink/memory.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::errors::Result;
use crate::sink::{Artifact, ArtifactSink};

/// In-memory sink. Keeps the last bytes written per path.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files().get(path.as_ref()).cloned()
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, _task: &str, artifact: &Artifact) -> Result<()> {
        self.files()
            .insert(artifact.path.clone(), artifact.bytes.clone());
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        self.files().clear();
        Ok(())
    }
}
