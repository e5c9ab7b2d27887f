//! Error handling for the Stencil CLI.
//!
//! Provides structured errors with:
//! - User-friendly messages
//! - Actionable suggestions
//! - Exit code mapping

use std::error::Error as _;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use thiserror::Error;

use stencil_core::application::GenerationFailure;
use stencil_core::error::{ErrorCategory as CoreCategory, StencilError};

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input, e.g. a malformed `--set`.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// `--profile` names a profile the configuration does not define.
    #[error("Unknown profile '{name}'")]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    /// A configuration file could not be read, parsed, or written.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error propagated from `stencil-core`.
    #[error(transparent)]
    Core(#[from] StencilError),

    /// A generation run failed; carries every error from the failing stage.
    #[error("{0}")]
    Generation(#[from] GenerationFailure),

    /// An I/O operation failed.
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// A post-generation hook exited unsuccessfully.
    #[error("Hook failed: {command}")]
    HookFailed {
        command: String,
        status: Option<i32>,
        /// Files that were generated before the hook ran.
        output_dir: PathBuf,
    },
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl CliError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { message } => vec![
                format!("Check your input: {message}"),
                "Use --help for usage information".into(),
            ],

            Self::UnknownProfile { available, .. } if available.is_empty() => vec![
                "No profiles are configured".into(),
                "Add a [profiles.<name>] table to your config file".into(),
                "Show the config location: stencil config path".into(),
            ],

            Self::UnknownProfile { available, .. } => {
                vec![format!("Available profiles: {}", available.join(", "))]
            }

            Self::ConfigError { message, .. } => vec![
                format!("Configuration issue: {message}"),
                "Show the config location: stencil config path".into(),
                "Create a default config: stencil init".into(),
            ],

            Self::Core(core) => core.suggestions(),

            Self::Generation(failure) => failure
                .primary()
                .map(StencilError::suggestions)
                .unwrap_or_default(),

            Self::IoError { message, .. } => vec![
                format!("I/O operation failed: {message}"),
                "Check file permissions".into(),
                "Check available disk space".into(),
            ],

            Self::HookFailed {
                command,
                output_dir,
                ..
            } => vec![
                format!("The generated files are in {}", output_dir.display()),
                format!("Fix the problem and re-run `{command}` there"),
                "Skip hooks with --no-hooks".into(),
            ],
        }
    }

    /// Get the error category for styling and exit codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } | Self::UnknownProfile { .. } => ErrorCategory::UserError,
            Self::ConfigError { .. } => ErrorCategory::Configuration,
            Self::Core(core) => core.category().into(),
            Self::Generation(failure) => failure
                .primary()
                .map(|e| e.category().into())
                .unwrap_or(ErrorCategory::Internal),
            Self::IoError { .. } | Self::HookFailed { .. } => ErrorCategory::Internal,
        }
    }

    /// Exit code to pass to the OS.
    ///
    /// | Category      | Code |
    /// |---------------|------|
    /// | Internal      |  1   |
    /// | User error    |  2   |
    /// | Not found     |  3   |
    /// | Configuration |  4   |
    /// | Security      |  5   |
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Internal => 1,
            ErrorCategory::UserError => 2,
            ErrorCategory::NotFound => 3,
            ErrorCategory::Configuration => 4,
            ErrorCategory::Security => 5,
        }
    }

    /// Every message to show, one per line. A generation failure lists each
    /// collected error so all violations are visible at once.
    fn details(&self) -> Vec<String> {
        match self {
            Self::Generation(failure) => failure.errors.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Format the error for display with colors and suggestions.
    pub fn format_colored(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{} {}\n\n",
            "✗".red().bold(),
            "Error:".red().bold()
        ));
        output.push_str(&format!("  {}\n", self.to_string().red()));

        for detail in self.details() {
            output.push_str(&format!("    {} {}\n", "•".red(), detail));
        }

        if verbose {
            let mut source = self.source();
            while let Some(err) = source {
                output.push_str(&format!(
                    "\n  {} {}\n",
                    "→".dimmed(),
                    err.to_string().dimmed()
                ));
                source = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str(&format!("\n{}\n", "Suggestions:".yellow().bold()));
            for suggestion in suggestions {
                output.push_str(&format!("  {suggestion}\n"));
            }
        }

        if !verbose {
            output.push('\n');
            output.push_str(&format!(
                "{} {}\n",
                "\u{2139}".blue(), // ℹ
                "Use -v / --verbose for more details.".dimmed(),
            ));
        }

        output
    }

    /// Plain-text version of [`Self::format_colored`], without ANSI codes.
    pub fn format_plain(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("\nError: {self}\n"));

        for detail in self.details() {
            out.push_str(&format!("  - {detail}\n"));
        }

        if verbose {
            let mut src = self.source();
            while let Some(err) = src {
                out.push_str(&format!("  Caused by: {err}\n"));
                src = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\nSuggestions:\n");
            for s in &suggestions {
                out.push_str(&format!("  {s}\n"));
            }
        }

        if !verbose {
            out.push_str("\nUse -v / --verbose for more details.\n");
        }

        out
    }

    /// Log the error using tracing.
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::UserError => tracing::warn!("User error: {}", self),
            ErrorCategory::NotFound => tracing::warn!("Not found: {}", self),
            ErrorCategory::Configuration => tracing::error!("Configuration error: {}", self),
            ErrorCategory::Security => tracing::error!("Rejected: {}", self),
            ErrorCategory::Internal => tracing::error!("Internal error: {}", self),
        }

        if let Some(source) = self.source() {
            tracing::debug!("Caused by: {}", source);
        }
    }
}

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input error (bad variables, invalid arguments).
    UserError,
    /// Blueprint not found.
    NotFound,
    /// Configuration error (config file or blueprint manifest).
    Configuration,
    /// Security violation or resource ceiling.
    Security,
    /// Internal/system error.
    Internal,
}

impl From<CoreCategory> for ErrorCategory {
    fn from(category: CoreCategory) -> Self {
        match category {
            CoreCategory::Configuration | CoreCategory::Rendering => Self::UserError,
            CoreCategory::Security => Self::Security,
            CoreCategory::NotFound => Self::NotFound,
            CoreCategory::Io | CoreCategory::Cancelled | CoreCategory::Internal => Self::Internal,
        }
    }
}

// ── IntoCli trait ─────────────────────────────────────────────────────────────

/// Extension trait to convert `std::io::Error` results into [`CliError`]
/// with a descriptive context message.
pub trait IntoCli<T> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IntoCli<T> for Result<T, std::io::Error> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| CliError::IoError {
            message: f().into(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use stencil_core::application::{ApplicationError, GenerationStage};
    use stencil_core::domain::{DomainError, ValidationViolation, ViolationKind};

    fn violation() -> StencilError {
        ValidationViolation::new(ViolationKind::PathTraversal, "escapes output", "../x").into()
    }

    #[test]
    fn exit_code_user_error() {
        let err = CliError::InvalidInput {
            message: "x".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn exit_code_not_found() {
        let err = CliError::Core(
            ApplicationError::BlueprintNotFound {
                reference: "x".into(),
            }
            .into(),
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn exit_code_configuration() {
        let err = CliError::ConfigError {
            message: "x".into(),
            source: None,
        };
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn exit_code_security() {
        assert_eq!(CliError::Core(violation()).exit_code(), 5);
    }

    #[test]
    fn exit_code_internal() {
        let err = CliError::IoError {
            message: "x".into(),
            source: io::Error::other("e"),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn manifest_errors_are_user_errors() {
        let err = CliError::Core(DomainError::InvalidManifest("bad".into()).into());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn generation_failure_lists_every_error() {
        let failure = GenerationFailure {
            stage: GenerationStage::Validating,
            errors: vec![
                violation(),
                ValidationViolation::new(ViolationKind::ReservedName, "reserved", "CON").into(),
            ],
        };
        let err = CliError::from(failure);
        assert_eq!(err.exit_code(), 5);

        let text = err.format_plain(false);
        assert!(text.contains("escapes output"));
        assert!(text.contains("reserved"));
    }

    #[test]
    fn unknown_profile_lists_available() {
        let err = CliError::UnknownProfile {
            name: "home".into(),
            available: vec!["work".into()],
        };
        assert!(err.suggestions().iter().any(|s| s.contains("work")));
    }

    #[test]
    fn format_plain_verbose_omits_hint() {
        let err = CliError::InvalidInput {
            message: "x".into(),
        };
        assert!(!err.format_plain(true).contains("--verbose"));
        assert!(err.format_plain(false).contains("Suggestions:"));
    }

    #[test]
    fn into_cli_io_error() {
        let result: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let cli: CliResult<()> = result.with_cli_context(|| "reading config");
        assert!(matches!(cli, Err(CliError::IoError { .. })));
    }
}
