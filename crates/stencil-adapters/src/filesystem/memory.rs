//! In-memory filesystem adapter for testing and dry runs.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use stencil_core::{
    application::{ApplicationError, ports::Filesystem},
    error::StencilResult,
};

/// Operation a [`MemoryFilesystem`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    CreateDir,
    Write,
    Rename,
    Remove,
}

/// In-memory filesystem.
///
/// Clones share the same tree. Failures can be injected per operation and
/// path suffix to exercise rollback.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<MemoryFilesystemInner>>,
}

#[derive(Debug, Default)]
struct MemoryFilesystemInner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    directories: BTreeSet<PathBuf>,
    executables: HashSet<PathBuf>,
    failures: Vec<(FailOn, String)>,
}

impl MemoryFilesystem {
    /// Create a new memory filesystem containing only `/`.
    pub fn new() -> Self {
        let fs = Self::default();
        fs.write_inner().directories.insert(PathBuf::from("/"));
        fs
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, MemoryFilesystemInner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, MemoryFilesystemInner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make `op` fail for any path ending in `suffix`.
    pub fn fail_on(&self, op: FailOn, suffix: impl Into<String>) {
        self.write_inner().failures.push((op, suffix.into()));
    }

    /// Read a file's content (testing helper).
    pub fn read_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.read_inner().files.get(path).cloned()
    }

    /// Read a file as UTF-8 text.
    pub fn read_to_string(&self, path: &Path) -> Option<String> {
        self.read_file(path)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Check if a file is marked executable.
    pub fn is_executable(&self, path: &Path) -> bool {
        self.read_inner().executables.contains(path)
    }

    /// List all files, sorted.
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.read_inner().files.keys().cloned().collect()
    }

    /// List all directories, sorted.
    pub fn list_dirs(&self) -> Vec<PathBuf> {
        self.read_inner().directories.iter().cloned().collect()
    }

    fn check(&self, op: FailOn, path: &Path) -> StencilResult<()> {
        let text = path.to_string_lossy();
        let inner = self.read_inner();
        if inner
            .failures
            .iter()
            .any(|(o, suffix)| *o == op && text.ends_with(suffix.as_str()))
        {
            return Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: format!("injected {op:?} failure"),
            }
            .into());
        }
        Ok(())
    }

    fn require_parent(inner: &MemoryFilesystemInner, path: &Path) -> StencilResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !inner.directories.contains(parent) {
                return Err(ApplicationError::FilesystemError {
                    path: path.to_path_buf(),
                    reason: "Parent directory does not exist".into(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl Filesystem for MemoryFilesystem {
    fn create_dir(&self, path: &Path) -> StencilResult<()> {
        self.check(FailOn::CreateDir, path)?;
        let mut inner = self.write_inner();
        Self::require_parent(&inner, path)?;
        if !inner.directories.insert(path.to_path_buf()) {
            return Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "Directory already exists".into(),
            }
            .into());
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> StencilResult<()> {
        self.check(FailOn::Write, path)?;
        let mut inner = self.write_inner();
        Self::require_parent(&inner, path)?;
        inner.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StencilResult<()> {
        self.check(FailOn::Rename, to)?;
        let mut inner = self.write_inner();
        Self::require_parent(&inner, to)?;
        let content = inner.files.remove(from).ok_or_else(|| ApplicationError::FilesystemError {
            path: from.to_path_buf(),
            reason: "No such file".into(),
        })?;
        inner.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> StencilResult<()> {
        let mut inner = self.write_inner();

        if executable {
            inner.executables.insert(path.to_path_buf());
        } else {
            inner.executables.remove(path);
        }

        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.read_inner();
        inner.files.contains_key(path) || inner.directories.contains(path)
    }

    fn remove_file(&self, path: &Path) -> StencilResult<()> {
        self.check(FailOn::Remove, path)?;
        let mut inner = self.write_inner();
        inner.executables.remove(path);
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| {
                ApplicationError::FilesystemError {
                    path: path.to_path_buf(),
                    reason: "No such file".into(),
                }
                .into()
            })
    }

    fn remove_dir(&self, path: &Path) -> StencilResult<()> {
        self.check(FailOn::Remove, path)?;
        let mut inner = self.write_inner();
        let occupied = inner.files.keys().any(|p| p.parent() == Some(path))
            || inner.directories.iter().any(|p| p.parent() == Some(path));
        if occupied {
            return Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "Directory not empty".into(),
            }
            .into());
        }
        inner.directories.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_must_exist() {
        let fs = MemoryFilesystem::new();
        assert!(fs.write_file(Path::new("/a/b.txt"), b"x").is_err());
        fs.create_dir(Path::new("/a")).unwrap();
        fs.write_file(Path::new("/a/b.txt"), b"x").unwrap();
        assert_eq!(fs.read_to_string(Path::new("/a/b.txt")).unwrap(), "x");
    }

    #[test]
    fn injected_failures_match_suffix() {
        let fs = MemoryFilesystem::new();
        fs.fail_on(FailOn::Write, "b.txt");
        assert!(fs.write_file(Path::new("/a.txt"), b"").is_ok());
        assert!(fs.write_file(Path::new("/b.txt"), b"").is_err());
    }

    #[test]
    fn remove_dir_requires_empty() {
        let fs = MemoryFilesystem::new();
        fs.create_dir(Path::new("/d")).unwrap();
        fs.write_file(Path::new("/d/f"), b"").unwrap();
        assert!(fs.remove_dir(Path::new("/d")).is_err());
        fs.remove_file(Path::new("/d/f")).unwrap();
        fs.remove_dir(Path::new("/d")).unwrap();
        assert_eq!(fs.list_dirs(), vec![PathBuf::from("/")]);
    }
}
