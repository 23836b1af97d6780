//! Containment of local paths under the sandbox root.
//!
//! User paths are interpreted relative to the root whether or not they start
//! with `/`. A path is accepted only if both its lexical normal form and, once
//! it exists, its canonical form stay under the canonical root, so `..`
//! sequences and symlinks pointing outside are both rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{SearchError, SearchResult};

/// The local sandbox root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Opens the sandbox, creating the root directory if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> SearchResult<Self> {
        let root = root.as_ref();
        if !root.exists() {
            std::fs::create_dir_all(root)?;
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `user_path` to a canonical directory or file under the root.
    ///
    /// A missing path is created as a directory when `create` is set; otherwise
    /// the lexically normalized path is returned and callers see it as absent.
    pub fn resolve(&self, user_path: &str, create: bool) -> SearchResult<PathBuf> {
        let relative = normalize_relative(user_path)
            .ok_or_else(|| SearchError::out_of_sandbox(user_path, &self.root))?;
        let joined = self.root.join(relative);

        if !joined.exists() {
            if !create {
                return Ok(joined);
            }
            self.create_within(&joined, user_path)?;
            tracing::debug!("Created missing search path {}", joined.display());
        }

        self.contain(&joined, user_path)
    }

    /// Creates the missing directories of `path` one at a time, starting
    /// from its deepest existing ancestor. Each level is checked to be inside
    /// the root before anything is created below it.
    fn create_within(&self, path: &Path, user_path: &str) -> SearchResult<()> {
        let Some(existing) = path.ancestors().find(|ancestor| ancestor.exists()) else {
            return Err(SearchError::out_of_sandbox(user_path, &self.root));
        };
        let mut current = self.contain(existing, user_path)?;
        let missing = path.strip_prefix(existing).unwrap_or(Path::new(""));

        for part in missing.components() {
            let next = current.join(part);
            match std::fs::create_dir(&next) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
            current = self.contain(&next, user_path)?;
        }
        Ok(())
    }

    /// Canonicalizes an existing `path` and checks it is under the root.
    fn contain(&self, path: &Path, user_path: &str) -> SearchResult<PathBuf> {
        let canonical = path.canonicalize()?;
        if !canonical.starts_with(&self.root) {
            return Err(SearchError::out_of_sandbox(user_path, &self.root));
        }
        Ok(canonical)
    }

    /// Root-relative, `/`-separated form of a path under the root.
    pub fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Normalizes `.` and `..` without filesystem access, treating the path as
/// relative to the root. `None` when a `..` would climb above the root.
fn normalize_relative(user_path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(user_path.trim()).components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, PathSandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("/a/./b/../c"), Some(PathBuf::from("a/c")));
        assert_eq!(normalize_relative("/"), Some(PathBuf::new()));
        assert_eq!(normalize_relative("a/.."), Some(PathBuf::new()));
        assert_eq!(normalize_relative("../etc"), None);
        assert_eq!(normalize_relative("/a/../../etc"), None);
    }

    #[test]
    fn test_resolve_root_variants() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(sandbox.resolve("/", false).unwrap(), sandbox.root());
        assert_eq!(sandbox.resolve("", false).unwrap(), sandbox.root());
        assert_eq!(sandbox.resolve(".", false).unwrap(), sandbox.root());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.resolve("/../../etc", false).unwrap_err();
        assert!(matches!(err, SearchError::OutOfSandbox { .. }));
    }

    #[test]
    fn test_missing_path_is_created_on_request() {
        let (_dir, sandbox) = sandbox();
        let path = sandbox.resolve("/new/nested", true).unwrap();
        assert!(path.is_dir());
        assert_eq!(sandbox.relative(&path), "new/nested");

        let absent = sandbox.resolve("/other", false).unwrap();
        assert!(!absent.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let (_dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), sandbox.root().join("escape")).unwrap();
        let err = sandbox.resolve("/escape", false).unwrap_err();
        assert!(matches!(err, SearchError::OutOfSandbox { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_creates_nothing_outside() {
        let (_dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), sandbox.root().join("escape")).unwrap();

        let err = sandbox.resolve("/escape/planted/deeper", true).unwrap_err();
        assert!(matches!(err, SearchError::OutOfSandbox { .. }));
        assert!(!outside.path().join("planted").exists());
    }

    #[test]
    fn test_missing_root_is_created() {
        let dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(dir.path().join("fresh")).unwrap();
        assert!(sandbox.root().is_dir());
    }
}
