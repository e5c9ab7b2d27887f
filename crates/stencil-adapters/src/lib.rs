//! Infrastructure adapters for Stencil.
//!
//! This crate implements the ports defined in `stencil_core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod blueprint_loader;
pub mod builtin_blueprints;
pub mod filesystem;
pub mod registry;

// Re-export commonly used adapters
pub use blueprint_loader::FilesystemBlueprintLoader;
pub use filesystem::{FailOn, LocalFilesystem, MemoryFilesystem};
pub use registry::InMemoryRegistry;
