// src/watch/hash.rs

//! Content hashing for `use_hash = true` tasks.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::types::TaskId;
use crate::watch::cache::FileCache;
use crate::watch::patterns::{collect_matching_files, TaskWatchProfile};

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Aggregate hash over `(path, file hash)` pairs.
///
/// Pairs must be sorted by path. Paths are part of the hash so that deleting
/// or renaming a file changes it.
pub fn compute_aggregate_hash(entries: &[(PathBuf, String)]) -> String {
    let mut hasher = Hasher::new();
    for (path, hash) in entries {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(hash.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Remembers, per task, the aggregate hash of its watched files at the last
/// dispatch, and vetoes triggers whose content did not change.
#[derive(Debug)]
pub struct HashGate {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    ignore: Vec<PathBuf>,
    cache: FileCache,
    last: HashMap<TaskId, String>,
}

impl HashGate {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, ignore: Vec<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            ignore,
            cache: FileCache::new(),
            last: HashMap::new(),
        }
    }

    /// Record the current hashes of every hashed profile without triggering.
    pub fn prime(&mut self, profiles: &[TaskWatchProfile]) {
        for profile in profiles.iter().filter(|p| p.use_hash()) {
            match self.current_hash(profile) {
                Ok(hash) => {
                    self.last.insert(profile.task().to_string(), hash);
                }
                Err(err) => warn!(task = %profile.task(), error = %err, "failed to prime task hash"),
            }
        }
    }

    /// Forget cached hashes of changed files. Call once per debounced batch
    /// before [`should_trigger`](Self::should_trigger).
    pub fn invalidate(&mut self, changed: &[PathBuf]) {
        for path in changed {
            self.cache.invalidate(path);
        }
    }

    /// Whether `profile`'s task should run. Always true for tasks without
    /// `use_hash`, and whenever hashing fails.
    pub fn should_trigger(&mut self, profile: &TaskWatchProfile) -> bool {
        if !profile.use_hash() {
            return true;
        }

        let new_hash = match self.current_hash(profile) {
            Ok(h) => h,
            Err(err) => {
                warn!(
                    task = %profile.task(),
                    error = %err,
                    "failed to hash watched files; triggering anyway"
                );
                return true;
            }
        };

        match self.last.get(profile.task()) {
            Some(old) if *old == new_hash => {
                info!(task = %profile.task(), "hash unchanged; skipping trigger");
                false
            }
            _ => {
                debug!(task = %profile.task(), hash = %new_hash, "stored task hash");
                self.last.insert(profile.task().to_string(), new_hash);
                true
            }
        }
    }

    fn current_hash(&mut self, profile: &TaskWatchProfile) -> Result<String> {
        let files = collect_matching_files(self.fs.as_ref(), &self.root, &self.ignore, profile)?;
        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let hash = self.cache.get_or_compute(self.fs.as_ref(), &path)?;
            entries.push((path, hash));
        }
        Ok(compute_aggregate_hash(&entries))
    }
}
