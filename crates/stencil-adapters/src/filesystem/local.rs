//! Local filesystem adapter using std::fs.

use std::io;
use std::path::Path;

use stencil_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{StencilError, StencilResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir(&self, path: &Path) -> StencilResult<()> {
        std::fs::create_dir(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> StencilResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn rename(&self, from: &Path, to: &Path) -> StencilResult<()> {
        std::fs::rename(from, to).map_err(|e| map_io_error(to, e, "move file into place"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> StencilResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if executable {
                let metadata =
                    std::fs::metadata(path).map_err(|e| map_io_error(path, e, "get metadata"))?;
                let mut perms = metadata.permissions();
                let mode = perms.mode();
                perms.set_mode(mode | 0o111);
                std::fs::set_permissions(path, perms)
                    .map_err(|e| map_io_error(path, e, "set permissions"))?;
            }
        }
        #[cfg(windows)]
        {
            // Windows doesn't have executable bit in the same way
            let _ = (path, executable);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so a dangling symlink still counts as occupied
        path.symlink_metadata().is_ok()
    }

    fn remove_file(&self, path: &Path) -> StencilResult<()> {
        std::fs::remove_file(path).map_err(|e| map_io_error(path, e, "remove file"))
    }

    fn remove_dir(&self, path: &Path) -> StencilResult<()> {
        std::fs::remove_dir(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> StencilError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}
