//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `stencil-adapters` crate provides implementations.

use std::path::Path;

use crate::domain::{Blueprint, BlueprintId};
use crate::error::StencilResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `stencil_adapters::filesystem::LocalFilesystem` (production)
/// - `stencil_adapters::filesystem::MemoryFilesystem` (testing)
///
/// ## Design Notes
///
/// - Operations are single-level (`create_dir`, not `create_dir_all`) so the
///   writer knows exactly which paths it created and can remove them again
/// - `rename` must replace atomically when source and target share a directory
pub trait Filesystem: Send + Sync {
    /// Create one directory. The parent must exist.
    fn create_dir(&self, path: &Path) -> StencilResult<()>;

    /// Write content to a new or truncated file.
    fn write_file(&self, path: &Path, content: &[u8]) -> StencilResult<()>;

    /// Move a file into place.
    fn rename(&self, from: &Path, to: &Path) -> StencilResult<()>;

    /// Set file permissions.
    fn set_permissions(&self, path: &Path, executable: bool) -> StencilResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    fn remove_file(&self, path: &Path) -> StencilResult<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> StencilResult<()>;
}

#[cfg(test)]
mockall::mock! {
    pub Filesystem {}

    impl Filesystem for Filesystem {
        fn create_dir(&self, path: &Path) -> StencilResult<()>;
        fn write_file(&self, path: &Path, content: &[u8]) -> StencilResult<()>;
        fn rename(&self, from: &Path, to: &Path) -> StencilResult<()>;
        fn set_permissions(&self, path: &Path, executable: bool) -> StencilResult<()>;
        fn exists(&self, path: &Path) -> bool;
        fn remove_file(&self, path: &Path) -> StencilResult<()>;
        fn remove_dir(&self, path: &Path) -> StencilResult<()>;
    }
}

/// Port for blueprint storage and retrieval.
///
/// A registry is a value the caller constructs and hands to the services;
/// there is no process-wide registry.
///
/// Implemented by:
/// - `stencil_adapters::registry::InMemoryRegistry`
pub trait BlueprintRegistry: Send + Sync {
    /// Get a specific blueprint by ID.
    fn get(&self, id: &BlueprintId) -> StencilResult<Blueprint>;

    /// Every version registered under `name`, in any order.
    fn find_by_name(&self, name: &str) -> StencilResult<Vec<Blueprint>>;

    /// List all available blueprints.
    fn list(&self) -> StencilResult<Vec<Blueprint>>;

    /// Insert or replace a blueprint.
    fn insert(&self, blueprint: Blueprint) -> StencilResult<()>;

    /// Remove a blueprint.
    fn remove(&self, id: &BlueprintId) -> StencilResult<()>;
}

#[cfg(test)]
mockall::mock! {
    pub BlueprintRegistry {}

    impl BlueprintRegistry for BlueprintRegistry {
        fn get(&self, id: &BlueprintId) -> StencilResult<Blueprint>;
        fn find_by_name(&self, name: &str) -> StencilResult<Vec<Blueprint>>;
        fn list(&self) -> StencilResult<Vec<Blueprint>>;
        fn insert(&self, blueprint: Blueprint) -> StencilResult<()>;
        fn remove(&self, id: &BlueprintId) -> StencilResult<()>;
    }
}
