//! Path-addressable media storage.
//!
//! Photos live under a single media root: `images/` for people and
//! `memories/` for memories. Paths handed to a store are always relative to
//! that root.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File operations the reconciliation pass needs
pub trait MediaStore: Send + Sync {
    /// Whether the storage subdirectory exists at all
    fn dir_exists(&self, dir: &str) -> bool;

    /// Names (not paths) of the regular files directly inside `dir`
    fn list_names(&self, dir: &str) -> Result<Vec<String>>;

    /// Remove one file, `path` relative to the root
    fn delete(&self, path: &str) -> Result<()>;
}

/// Media store backed by a local directory
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsMediaStore { root: root.into() }
    }

    /// Join a relative path onto the root, refusing anything that escapes it
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("refusing media path outside storage root: {}", relative),
            }
        }
        Ok(self.root.join(path))
    }
}

impl MediaStore for FsMediaStore {
    fn dir_exists(&self, dir: &str) -> bool {
        self.resolve(dir).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn list_names(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve(dir)?;
        let mut names = Vec::new();

        for entry in fs::read_dir(&dir_path)
            .with_context(|| format!("Failed to read media directory {}", dir_path.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Non-UTF-8 names can never match a stored reference; leave them alone
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full)
            .with_context(|| format!("Failed to delete {}", full.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_names_only_returns_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images/nested")).unwrap();
        fs::write(dir.path().join("images/b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("images/a.png"), b"a").unwrap();

        let store = FsMediaStore::new(dir.path());

        assert!(store.dir_exists("images"));
        assert_eq!(store.list_names("images").unwrap(), vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());

        assert!(!store.dir_exists("memories"));
        assert!(store.list_names("memories").is_err());
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/old.jpg"), b"x").unwrap();

        let store = FsMediaStore::new(dir.path());
        store.delete("images/old.jpg").unwrap();

        assert!(!dir.path().join("images/old.jpg").exists());
        assert!(store.delete("images/old.jpg").is_err());
    }

    #[test]
    fn test_paths_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let store = FsMediaStore::new(dir.path().join("media"));

        assert!(store.delete("../secret.jpg").is_err());
        assert!(store.delete("/etc/passwd").is_err());
        assert!(!store.dir_exists(".."));
    }
}
