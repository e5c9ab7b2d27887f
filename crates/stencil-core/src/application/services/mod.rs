//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "generate a project" or "look up a blueprint".

pub mod blueprint_service;
pub mod generation_service;
pub mod writer;

pub use blueprint_service::{BlueprintInfo, BlueprintService, audit};
pub use generation_service::{
    GenerationFailure, GenerationMode, GenerationReport, GenerationRequest, GenerationService,
    GenerationStage,
};
pub use writer::{AtomicWriter, CommitReport};
