// src/exec/inputs.rs

//! Resolving a task's input globs into concrete files.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};

use crate::fs::FileSystem;

/// A matched input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Path as seen through the filesystem (`root` joined with `rel`).
    pub path: PathBuf,
    /// Path relative to the project root, forward slashes.
    pub rel: String,
    /// Path relative to the literal base of the glob that matched it.
    ///
    /// `resources/fonts/**/*` matching `resources/fonts/roboto/a.woff` gives
    /// `roboto/a.woff`; directory outputs keep this structure.
    pub base_rel: PathBuf,
}

/// Compile glob patterns so that `*` does not cross directory separators.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?;
    Ok(glob.compile_matcher())
}

fn is_glob_component(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Leading literal directory of a glob.
///
/// `css/**/*.scss` -> `css`, `js/*.js` -> `js`. A pattern without any glob
/// syntax names a single file, so its base is the file's parent.
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();

    match parts.iter().position(|p| is_glob_component(p)) {
        Some(first_glob) => parts[..first_glob].iter().collect(),
        None => match parts.split_last() {
            Some((_, parent)) => parent.iter().collect(),
            None => PathBuf::new(),
        },
    }
}

/// Turns input globs into ordered files under a project root.
#[derive(Debug, Clone)]
pub struct InputResolver {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl InputResolver {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolve `patterns` minus `exclude`.
    ///
    /// Files appear in pattern order; matches of one pattern are sorted by
    /// path. A file matched by several patterns is listed once, at its first
    /// match. Patterns matching nothing are not an error here.
    pub fn resolve(&self, patterns: &[String], exclude: &[String]) -> Result<Vec<InputFile>> {
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for pattern in patterns {
            let pattern = pattern.trim_start_matches("./");
            let base = glob_base(pattern);
            let mut matches = if is_glob_component(pattern) {
                self.walk_matching(pattern, &base)?
            } else {
                let path = self.root.join(pattern);
                if self.fs.is_file(&path) {
                    vec![(pattern.to_string(), path)]
                } else {
                    Vec::new()
                }
            };
            matches.sort();

            debug!(pattern, matched = matches.len(), "resolved input pattern");

            for (rel, path) in matches {
                if exclude_set.as_ref().is_some_and(|ex| ex.is_match(&rel)) {
                    trace!(file = %rel, "input excluded");
                    continue;
                }
                if !seen.insert(rel.clone()) {
                    continue;
                }
                let base_rel = Path::new(&rel)
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(&rel));
                out.push(InputFile {
                    path,
                    rel,
                    base_rel,
                });
            }
        }

        Ok(out)
    }

    /// Read one input's bytes.
    pub fn read(&self, input: &InputFile) -> Result<Vec<u8>> {
        self.fs
            .read(&input.path)
            .with_context(|| format!("reading input {}", input.rel))
    }

    fn walk_matching(&self, pattern: &str, base: &Path) -> Result<Vec<(String, PathBuf)>> {
        let matcher = build_matcher(pattern)?;
        let start = self.root.join(base);
        if !self.fs.is_dir(&start) {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut stack = vec![start];

        while let Some(dir) = stack.pop() {
            for path in self.fs.read_dir(&dir)? {
                if self.fs.is_dir(&path) {
                    stack.push(path);
                } else if self.fs.is_file(&path) {
                    let Some(rel) = relative_to(&self.root, &path) else {
                        continue;
                    };
                    if matcher.is_match(&rel) {
                        found.push((rel, path));
                    }
                }
            }
        }

        Ok(found)
    }
}

/// `path` relative to `root`, with forward slashes and no `.` components.
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn resolver() -> InputResolver {
        let fs = MockFileSystem::new();
        fs.add_file("./js/b.js", "b");
        fs.add_file("./js/a.js", "a");
        fs.add_file("./js/vendor/jquery.js", "jq");
        fs.add_file("./resources/fonts/roboto/r.woff", "r");
        fs.add_file("./resources/fonts/x.tmp", "tmp");
        fs.add_file("./index.html", "<html>");
        InputResolver::new(Arc::new(fs), ".")
    }

    fn rels(files: &[InputFile]) -> Vec<&str> {
        files.iter().map(|f| f.rel.as_str()).collect()
    }

    #[test]
    fn glob_base_stops_at_first_wildcard() {
        assert_eq!(glob_base("css/**/*.scss"), PathBuf::from("css"));
        assert_eq!(glob_base("resources/fonts/**/*"), PathBuf::from("resources/fonts"));
        assert_eq!(glob_base("*.html"), PathBuf::new());
        assert_eq!(glob_base("css/main.scss"), PathBuf::from("css"));
        assert_eq!(glob_base("index.html"), PathBuf::new());
    }

    #[test]
    fn pattern_order_is_kept_and_duplicates_dropped() {
        let r = resolver();
        let files = r
            .resolve(
                &["js/vendor/jquery.js".to_string(), "js/**/*.js".to_string()],
                &[],
            )
            .unwrap();
        assert_eq!(rels(&files), vec!["js/vendor/jquery.js", "js/a.js", "js/b.js"]);
    }

    #[test]
    fn single_star_stays_in_its_directory() {
        let files = resolver().resolve(&["js/*.js".to_string()], &[]).unwrap();
        assert_eq!(rels(&files), vec!["js/a.js", "js/b.js"]);
    }

    #[test]
    fn excludes_and_base_relative_paths() {
        let files = resolver()
            .resolve(
                &["resources/fonts/**/*".to_string()],
                &["**/*.tmp".to_string()],
            )
            .unwrap();
        assert_eq!(rels(&files), vec!["resources/fonts/roboto/r.woff"]);
        assert_eq!(files[0].base_rel, PathBuf::from("roboto/r.woff"));
    }

    #[test]
    fn literal_and_missing_patterns() {
        let r = resolver();
        let files = r
            .resolve(&["index.html".to_string(), "missing/**/*.css".to_string()], &[])
            .unwrap();
        assert_eq!(rels(&files), vec!["index.html"]);
        assert_eq!(files[0].base_rel, PathBuf::from("index.html"));
        assert_eq!(r.read(&files[0]).unwrap(), b"<html>");
    }
}
