//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `stencil-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: file operations used by the atomic writer
//!   - `BlueprintRegistry`: blueprint storage/retrieval
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{BlueprintRegistry, Filesystem};

#[cfg(test)]
pub use output::{MockBlueprintRegistry, MockFilesystem};
