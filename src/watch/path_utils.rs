// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First try a direct `strip_prefix(root)`.
/// - If that fails (symlinks, different absolute prefixes), canonicalize both
///   paths and try again. Deleted files cannot be canonicalized, so the fast
///   path matters for them.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // macOS reports /private/var/... for /var/...
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Whether a relative path lies at or below the relative directory `dir`.
///
/// `.` components are ignored on both sides. A `dir` naming the root itself
/// contains nothing.
pub fn is_within(rel: &str, dir: &Path) -> bool {
    fn named(p: &Path) -> Vec<Component<'_>> {
        p.components()
            .filter(|c| *c != Component::CurDir)
            .collect::<Vec<_>>()
    }
    let dir = named(dir);
    !dir.is_empty() && named(Path::new(rel)).starts_with(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_str(Path::new("/site"), Path::new("/site/css/main.scss")).as_deref(),
            Some("css/main.scss")
        );
        assert_eq!(relative_str(Path::new("/site"), Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn within_compares_components() {
        assert!(is_within("dist/css/main.css", Path::new("dist")));
        assert!(!is_within("distro/main.css", Path::new("dist")));
    }

    #[test]
    fn within_ignores_current_dir_components() {
        assert!(is_within("dist/css/main.css", Path::new("./dist")));
        assert!(is_within("./dist/css/main.css", Path::new("dist/")));
        assert!(!is_within("css/main.css", Path::new("./dist")));
        assert!(!is_within("css/main.css", Path::new(".")));
    }
}
