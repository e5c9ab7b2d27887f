pub mod common;
pub mod context;
pub mod manifest;
pub mod resolved;

pub use crate::domain::DomainError;
pub use context::VariableContext;
pub use manifest::{Blueprint, BlueprintManifest};
pub use resolved::{Resolution, ResolvedFileSet};
