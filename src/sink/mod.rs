// src/sink/mod.rs

//! Artifact destinations.
//!
//! The runner hands finished output to an [`ArtifactSink`]. Two
//! implementations exist: [`DirectorySink`] writes below an output root on
//! disk, [`MemorySink`] keeps everything in a map for tests and dry runs.

pub mod directory;
pub mod memory;

pub use directory::DirectorySink;
pub use memory::MemorySink;

use std::path::PathBuf;

use crate::errors::Result;

/// One output file, path relative to the sink root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Destination for task output.
///
/// Writes are idempotent: writing the same artifact twice leaves the same
/// state as writing it once. `clean` must not interleave with writes.
pub trait ArtifactSink: Send + Sync {
    fn write(&self, task: &str, artifact: &Artifact) -> Result<()>;

    /// Remove everything previously written below the root.
    fn clean(&self) -> Result<()>;
}
