//! Application layer for Stencil.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (GenerationService, BlueprintService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All business rules live in `crate::domain`.

pub mod cancellation;
pub mod error;
pub mod ports;
pub mod services;

// Re-export main services
pub use services::{
    AtomicWriter, BlueprintInfo, BlueprintService, CommitReport, audit, GenerationFailure,
    GenerationMode, GenerationReport, GenerationRequest, GenerationService, GenerationStage,
};

// Re-export port traits (for adapter implementation)
pub use ports::{BlueprintRegistry, Filesystem};

pub use cancellation::CancellationToken;
pub use error::{ApplicationError, CleanupReport};
