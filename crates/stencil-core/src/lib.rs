//! Stencil Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for the Stencil
//! blueprint engine, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           stencil-cli (CLI)             │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │ (GenerationService, BlueprintService)   │
//! │         Orchestrates Use Cases          │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │   (Driven: Registry, Filesystem)        │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │    stencil-adapters (Infrastructure)    │
//! │ (InMemoryRegistry, LocalFilesystem, ..) │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (Manifest, Context, Conditions, Engine) │
//! │               No I/O                    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stencil_core::prelude::*;
//! # fn adapters() -> (Box<dyn BlueprintRegistry>, Box<dyn Filesystem>) { unimplemented!() }
//!
//! let (registry, filesystem) = adapters();
//! let service = GenerationService::new(registry, filesystem);
//!
//! let request = GenerationRequest::new("go-service", "./orders").with_layers(
//!     ContextLayers::default().with_override("ProjectName", "orders"),
//! );
//! match service.generate(&request, &CancellationToken::new()) {
//!     Ok(report) => println!("wrote {} files", report.files.len()),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```

// Re-export domain layer (stable, well-defined API)
pub mod domain;

// Re-export application layer (orchestration logic)
pub mod application;

// Re-export error types
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        BlueprintService, CancellationToken, GenerationFailure, GenerationMode, GenerationReport,
        GenerationRequest, GenerationService, GenerationStage,
        ports::{BlueprintRegistry, Filesystem},
    };
    pub use crate::domain::{
        Blueprint, BlueprintId, BlueprintManifest, ContextLayers, ResourceLimits, SecurityPolicy,
        ValidationViolation, VariableContext, ViolationKind,
    };
    pub use crate::error::{ErrorCategory, StencilError, StencilResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
