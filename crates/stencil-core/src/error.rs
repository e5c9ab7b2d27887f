//! Unified error handling for Stencil Core.
//!
//! This module provides a unified error type that wraps domain, rendering,
//! security and application errors, with user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::{DomainError, RenderError, ValidationViolation, ViolationKind};

/// Root error type for Stencil Core operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StencilError {
    /// The blueprint or the variable configuration is wrong.
    #[error("Configuration error: {0}")]
    Domain(#[from] DomainError),

    /// A template failed to parse or render.
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// A security check or resource ceiling rejected the run.
    #[error("Security violation: {0}")]
    Violation(#[from] ValidationViolation),

    /// Orchestration or I/O failure.
    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors outside the manifest.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl StencilError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Render(e) => vec![
                format!("Fix the template '{}'", e.template()),
                "Variables referenced in output must exist; use {{if .X}} to guard optional ones".into(),
            ],
            Self::Violation(v) => match v.kind {
                ViolationKind::CountLimitExceeded | ViolationKind::SizeLimitExceeded => vec![
                    "The blueprint produces more output than allowed".into(),
                    "Raise the ceiling under [limits] in the config file if this is expected".into(),
                ],
                _ => vec![
                    "The blueprint was rejected by the security gate; nothing was written".into(),
                    "Review the blueprint source before trusting it".into(),
                ],
            },
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {message}"),
                "Check your setup and try again".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in Stencil".into(),
                "Please report this issue at: https://github.com/cosecruz/stencil/issues".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(_) | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Render(_) => ErrorCategory::Rendering,
            Self::Violation(_) => ErrorCategory::Security,
            Self::Application(e) => e.category(),
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Application(ApplicationError::RegistryLockError)
                | Self::Application(ApplicationError::FilesystemError { .. })
        )
    }

    pub fn as_violation(&self) -> Option<&ValidationViolation> {
        match self {
            Self::Violation(v) => Some(v),
            _ => None,
        }
    }
}

/// Error categories for UI display and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Manifest or variable problems.
    Configuration,
    /// Template syntax or runtime failure.
    Rendering,
    /// Security violation or resource ceiling.
    Security,
    NotFound,
    /// Filesystem failure during commit.
    Io,
    Cancelled,
    Internal,
}

/// Convenient result type alias.
pub type StencilResult<T> = Result<T, StencilError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> StencilResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> StencilResult<T> {
        self.map_err(|e| StencilError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_are_security_category() {
        let err: StencilError =
            ValidationViolation::new(ViolationKind::PathTraversal, "..", "../x").into();
        assert_eq!(err.category(), ErrorCategory::Security);
        assert!(err.as_violation().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn domain_errors_are_configuration() {
        let err: StencilError = DomainError::MissingRequiredVariable { name: "X".into() }.into();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("Required variable 'X'"));
    }

    #[test]
    fn context_wraps_as_internal() {
        let r: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let err = r.context("reading").unwrap_err();
        assert!(matches!(err, StencilError::Internal { ref message } if message == "reading: boom"));
    }
}
