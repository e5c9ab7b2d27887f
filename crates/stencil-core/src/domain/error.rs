// ============================================================================
// domain/error.rs - CONFIGURATION ERROR DOMAIN
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// Every variant describes a broken blueprint or a broken variable
/// configuration: the manifest is wrong, not malicious. Security findings are
/// reported separately as [`crate::domain::ValidationViolation`]s.
///
/// All errors are:
/// - Cloneable (collected into failure reports)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Manifest shape
    // ========================================================================
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid blueprint id: {0}")]
    InvalidBlueprintId(String),

    #[error("Variable '{name}' is declared more than once")]
    DuplicateVariable { name: String },

    #[error("Variable '{name}' is declared incorrectly: {reason}")]
    InvalidVariableSpec { name: String, reason: String },

    #[error("File entry '{destination}' references unknown template source '{source_id}'")]
    UnknownSource {
        source_id: String,
        destination: String,
    },

    // ========================================================================
    // Variable context
    // ========================================================================
    #[error("Required variable '{name}' has no value")]
    MissingRequiredVariable { name: String },

    #[error("Variable '{name}' must be one of [{}], got '{value}'", choices.join(", "))]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("Variable '{name}' expects a {expected} value, got '{value}'")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("Variable '{name}' value '{value}' does not match pattern '{pattern}'")]
    PatternMismatch {
        name: String,
        value: String,
        pattern: String,
    },

    // ========================================================================
    // Conditions
    // ========================================================================
    #[error("Malformed condition '{expression}': {reason}")]
    MalformedCondition { expression: String, reason: String },

    #[error("Unknown function '{function}' in condition '{expression}'")]
    UnknownConditionFunction {
        expression: String,
        function: String,
    },

    // ========================================================================
    // Resolution
    // ========================================================================
    #[error("Destination '{destination}' is produced by both '{first}' and '{second}'")]
    DuplicateDestination {
        destination: String,
        first: String,
        second: String,
    },

    #[error("Destination '{file}' is a file, but '{nested}' needs it to be a directory")]
    PathConflict { file: String, nested: String },

    #[error("Dependency '{module}' is pinned to both '{first}' and '{second}'")]
    ConflictingDependency {
        module: String,
        first: String,
        second: String,
    },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingRequiredVariable { name } => vec![
                format!("Provide a value for '{name}'"),
                format!("Try: stencil new <blueprint> <dir> --set {name}=<value>"),
                "Or add it to a profile in your configuration file".into(),
            ],
            Self::InvalidChoice { name, choices, .. } => vec![
                format!("Allowed values for '{name}':"),
                format!("  {}", choices.join(" | ")),
            ],
            Self::TypeMismatch { name, expected, .. } => vec![format!(
                "'{name}' is a {expected} variable; booleans accept true/false, yes/no, 1/0, on/off"
            )],
            Self::MalformedCondition { .. } | Self::UnknownConditionFunction { .. } => vec![
                "Conditions support: eq, ne, and, or, not, .Variable, \"literal\"".into(),
                "Example: and (eq .Database \"postgres\") (ne .AuthType \"\")".into(),
            ],
            Self::DuplicateDestination { destination, .. } => vec![
                format!("Two included entries render to '{destination}'"),
                "Make their conditions mutually exclusive or change one destination".into(),
            ],
            Self::PathConflict { file, nested } => vec![
                format!("'{nested}' would be written inside the file '{file}'"),
                "Rename one of the destinations or make their conditions mutually exclusive".into(),
            ],
            Self::UnknownSource { source_id, .. } => vec![
                format!("No template body named '{source_id}' ships with this blueprint"),
                "Check the file entry's `source` field against the blueprint directory".into(),
            ],
            _ => vec!["Fix the blueprint manifest and try again".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingRequiredVariable { .. }
            | Self::InvalidChoice { .. }
            | Self::TypeMismatch { .. }
            | Self::PatternMismatch { .. } => ErrorCategory::Input,
            _ => ErrorCategory::Manifest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The blueprint itself is broken.
    Manifest,
    /// The supplied variable values are unacceptable.
    Input,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_mentions_name() {
        let err = DomainError::MissingRequiredVariable {
            name: "ModulePath".into(),
        };
        assert!(err.to_string().contains("ModulePath"));
        assert!(err.suggestions().iter().any(|s| s.contains("--set ModulePath")));
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn invalid_choice_lists_choices() {
        let err = DomainError::InvalidChoice {
            name: "Database".into(),
            value: "oracle".into(),
            choices: vec!["postgres".into(), "mysql".into()],
        };
        assert_eq!(
            err.to_string(),
            "Variable 'Database' must be one of [postgres, mysql], got 'oracle'"
        );
    }

    #[test]
    fn duplicate_destination_is_manifest_error() {
        let err = DomainError::DuplicateDestination {
            destination: "main.go".into(),
            first: "a".into(),
            second: "b".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Manifest);
    }
}
