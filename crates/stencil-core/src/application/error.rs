//! Application layer errors.
//!
//! These errors represent failures in orchestration and I/O, not in the
//! blueprint itself. Blueprint problems are `DomainError` from
//! `crate::domain`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// What happened to the paths created before a commit failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Paths that could not be removed, with the reason.
    pub leftover: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.leftover.is_empty()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(f, "cleanup removed {} path(s)", self.removed.len())
        } else {
            write!(
                f,
                "cleanup removed {} path(s), {} left behind",
                self.removed.len(),
                self.leftover.len()
            )
        }
    }
}

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// No blueprint matches the requested reference.
    #[error("Blueprint not found: {reference}")]
    BlueprintNotFound { reference: String },

    /// A file entry names a template body the blueprint doesn't ship.
    #[error("Template source '{source_id}' is missing from blueprint {blueprint}")]
    MissingSource { blueprint: String, source_id: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Registry access failed (lock poisoned, etc.).
    #[error("Blueprint registry error")]
    RegistryLockError,

    /// A destination already exists in the output directory.
    #[error("Refusing to overwrite existing file {path}")]
    DestinationExists { path: PathBuf },

    /// Moving staged files into place failed.
    #[error("Commit failed at {path}: {reason} ({cleanup})")]
    CommitFailed {
        path: PathBuf,
        reason: String,
        cleanup: CleanupReport,
    },

    /// The run was cancelled before anything was written.
    #[error("Generation cancelled during {stage}")]
    Cancelled { stage: String },

    /// Cancellation arrived while files were being committed; the commit
    /// finished and the caller decides whether to discard the output.
    #[error("Cancellation requested during commit; {} file(s) were written", written.len())]
    CancelledAfterCommit { written: Vec<PathBuf> },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::BlueprintNotFound { reference } => vec![
                format!("No blueprint named '{reference}'"),
                "Try: stencil list to see available blueprints".into(),
                "Use name@version to pick a specific version".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
                "Ensure there is enough free disk space".into(),
            ],
            Self::RegistryLockError => vec![
                "The blueprint registry is locked".into(),
                "Try again in a moment".into(),
            ],
            Self::DestinationExists { path } => vec![
                format!("File already exists: {}", path.display()),
                "Generate into an empty directory".into(),
            ],
            Self::CommitFailed { cleanup, .. } if !cleanup.is_clean() => {
                let mut out = vec!["Some paths could not be cleaned up:".to_string()];
                out.extend(
                    cleanup
                        .leftover
                        .iter()
                        .map(|(p, why)| format!("  {} ({why})", p.display())),
                );
                out
            }
            Self::CancelledAfterCommit { .. } => vec![
                "The project was written completely before the interrupt took effect".into(),
                "Delete the output directory if you don't want it".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BlueprintNotFound { .. } => ErrorCategory::NotFound,
            Self::MissingSource { .. } => ErrorCategory::Configuration,
            Self::FilesystemError { .. } | Self::CommitFailed { .. } | Self::DestinationExists { .. } => {
                ErrorCategory::Io
            }
            Self::RegistryLockError => ErrorCategory::Internal,
            Self::Cancelled { .. } | Self::CancelledAfterCommit { .. } => ErrorCategory::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_failure_lists_leftovers() {
        let err = ApplicationError::CommitFailed {
            path: "out/a.txt".into(),
            reason: "disk full".into(),
            cleanup: CleanupReport {
                removed: vec!["out/b.txt".into()],
                leftover: vec![("out/dir".into(), "not empty".into())],
            },
        };
        assert!(err.to_string().contains("1 left behind"));
        assert!(err.suggestions().iter().any(|s| s.contains("out/dir")));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn cancelled_after_commit_counts_files() {
        let err = ApplicationError::CancelledAfterCommit {
            written: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("2 file(s)"));
    }
}
