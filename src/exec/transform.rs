// src/exec/transform.rs

//! The transform collaborator: `(input bytes, options) -> output bytes`.
//!
//! Tasks reference transforms by name through a [`TransformRegistry`]. The
//! engine never looks inside a transform; tests register their own
//! implementations next to the built-ins.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::TransformError;
use crate::exec::builtin::{CommandTransform, CopyTransform, ScssTransform};

/// Bytes handed to a transform, plus the files they were read from.
#[derive(Debug, Clone, Default)]
pub struct TransformInput {
    /// Project root; relative paths in options resolve against it.
    pub root: PathBuf,
    /// Source files in the order their contents appear in `bytes`.
    pub sources: Vec<PathBuf>,
    pub bytes: Vec<u8>,
}

impl TransformInput {
    pub fn new(root: impl Into<PathBuf>, sources: Vec<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            root: root.into(),
            sources,
            bytes,
        }
    }

    /// Input with no backing files, rooted at the working directory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(".", Vec::new(), bytes.into())
    }
}

/// Free-form options from the task's `options = { ... }` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions(toml::Table);

impl TransformOptions {
    pub fn new(table: toml::Table) -> Self {
        Self(table)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    /// A list of strings; a single string is accepted as a one-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(toml::Value::String(s)) => vec![s.clone()],
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn table(&self) -> &toml::Table {
        &self.0
    }
}

/// Trait abstracting how a task turns its input bytes into output bytes.
///
/// Production code registers the built-ins; tests can provide
/// implementations that record calls or fail on demand.
pub trait Transform: Send + Sync {
    /// Registry name (`copy`, `scss`, ...). Used in logs and error messages.
    fn name(&self) -> &str;

    fn apply<'a>(
        &'a self,
        input: TransformInput,
        options: &'a TransformOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransformError>> + Send + 'a>>;
}

/// Name -> transform lookup used when building the task graph.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Arc<dyn Transform>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransformRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `copy`, `scss` and `command`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CopyTransform));
        registry.register(Arc::new(ScssTransform));
        registry.register(Arc::new(CommandTransform));
        registry
    }

    /// Register a transform under its own name, replacing any previous one.
    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(|s| s.as_str())
    }
}
