//! Path confinement for script host operations
//!
//! Every path handed to the script host is resolved against the host root and
//! rejected if it would land outside it.

use std::path::{Component, Path, PathBuf};

use crate::error::{PlugmanError, Result};

/// A path that has been checked to lie within the host root.
///
/// Only `resolve_in_root` creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath {
    path: PathBuf,
}

impl SafePath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for SafePath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Resolve `path` against `root` and check that it stays inside.
///
/// Relative paths are joined to `root`; absolute paths must already be under
/// it. `.` and `..` are resolved lexically, then against the filesystem for
/// the parts that exist, so symlinks pointing out of the root are caught too.
///
/// # Errors
/// `SecurityViolation` for traversal patterns or paths escaping `root`.
pub fn resolve_in_root(path: &str, root: &Path) -> Result<SafePath> {
    if contains_traversal_pattern(path) {
        return Err(PlugmanError::SecurityViolation(format!(
            "Path contains suspicious traversal pattern: {}",
            path
        )));
    }

    let target = Path::new(path);
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        root.join(target)
    };
    let normalized = normalize_path(&resolved);

    let canonical_root = root
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(root));

    if !normalized.starts_with(&canonical_root) {
        return Err(PlugmanError::SecurityViolation(format!(
            "Path escapes sandbox root: {} is not within {}",
            path,
            root.display()
        )));
    }

    Ok(SafePath { path: normalized })
}

/// Resolve `.`/`..` lexically, then canonicalize the longest existing prefix.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            _ => normalized.push(component),
        }
    }

    // Canonicalize the existing ancestor and re-append the missing tail, so
    // paths to files that are about to be created still compare correctly.
    let mut existing = normalized.clone();
    let mut tail = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                existing.pop();
            }
            None => return normalized,
        }
    }
    let mut canonical = existing.canonicalize().unwrap_or(existing);
    for name in tail.into_iter().rev() {
        canonical.push(name);
    }
    canonical
}

fn contains_traversal_pattern(path: &str) -> bool {
    let patterns = [
        "..",
        "%2e%2e",
        "%252e%252e",
        "..%2f",
        "%2f..",
        "..\\",
        "\\..\\",
    ];

    let lower_path = path.to_lowercase();
    patterns.iter().any(|p| lower_path.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relative_path_inside_root() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(temp.path().join("data/config.json"), "{}").unwrap();

        let safe = resolve_in_root("data/config.json", temp.path()).unwrap();
        assert!(safe.as_path().ends_with("data/config.json"));
    }

    #[test]
    fn test_not_yet_existing_file_inside_root() {
        let temp = tempdir().unwrap();
        let safe = resolve_in_root("new/dir/file.txt", temp.path()).unwrap();
        let canonical_root = temp.path().canonicalize().unwrap();
        assert!(safe.as_path().starts_with(&canonical_root));
        assert!(safe.as_path().ends_with("new/dir/file.txt"));
    }

    #[test]
    fn test_absolute_path_inside_root() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("file.txt"), "content").unwrap();

        let absolute = temp.path().join("file.txt");
        assert!(resolve_in_root(absolute.to_str().unwrap(), temp.path()).is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        let temp = tempdir().unwrap();
        for bad in [
            "../../../etc/passwd",
            "%2e%2e/etc/passwd",
            "..%2f../etc/passwd",
            "..\\..\\etc\\passwd",
            "a/b/../../../etc",
        ] {
            let result = resolve_in_root(bad, temp.path());
            assert!(
                matches!(result, Err(PlugmanError::SecurityViolation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_absolute_path_outside_root() {
        let temp = tempdir().unwrap();
        let err = resolve_in_root("/etc/passwd", temp.path()).unwrap_err();
        assert!(err.to_string().contains("escapes sandbox root"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_rejected() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert!(resolve_in_root("link/secret.txt", &root).is_err());
    }

    #[test]
    fn test_current_directory_reference() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("file.txt"), "content").unwrap();
        assert!(resolve_in_root("./file.txt", temp.path()).is_ok());
    }

    #[test]
    fn test_empty_path_is_root() {
        let temp = tempdir().unwrap();
        let safe = resolve_in_root("", temp.path()).unwrap();
        assert_eq!(
            safe.into_path_buf(),
            temp.path().canonicalize().unwrap()
        );
    }
}
