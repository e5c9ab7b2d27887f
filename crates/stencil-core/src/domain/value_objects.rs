//! Value objects for blueprint variables.
//!
//! A variable is declared with a [`VariableType`]; raw input from manifests,
//! profiles, env, and `--set` arrives as [`InputValue`] and is coerced into a
//! typed [`VariableValue`] when the context is built.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

// ============================================================================
// VariableType
// ============================================================================

/// The declared type of a blueprint variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "choice")]
    Enum,
}

impl VariableType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Enum => "enum",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            "enum" | "choice" => Ok(Self::Enum),
            other => Err(format!("unknown variable type '{other}'")),
        }
    }
}

// ============================================================================
// VariableValue
// ============================================================================

/// A typed variable value held by the context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    String(String),
    Bool(bool),
    Enum(String),
}

impl VariableValue {
    /// The zero value for a type: empty string, `false`, or empty enum.
    pub fn zero(kind: VariableType) -> Self {
        match kind {
            VariableType::String => Self::String(String::new()),
            VariableType::Bool => Self::Bool(false),
            VariableType::Enum => Self::Enum(String::new()),
        }
    }

    pub fn kind(&self) -> VariableType {
        match self {
            Self::String(_) => VariableType::String,
            Self::Bool(_) => VariableType::Bool,
            Self::Enum(_) => VariableType::Enum,
        }
    }

    /// Truthiness used by conditions and `{{if}}`.
    ///
    /// Empty strings and the literal `"false"` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::String(s) | Self::Enum(s) => !s.is_empty() && s != "false",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bool(_) => false,
            Self::String(s) | Self::Enum(s) => s.is_empty(),
        }
    }

    /// String form as seen by templates and comparisons.
    pub fn render(&self) -> String {
        match self {
            Self::String(s) | Self::Enum(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Enum(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Parse the accepted boolean spellings.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// InputValue
// ============================================================================

/// An untyped value as it appears in a manifest default, a profile, or on the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl InputValue {
    /// Text form used for string/enum coercion.
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            Self::Integer(_) => None,
            Self::Text(s) => parse_bool(s),
        }
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for InputValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// A flat name → value mapping. Ordered so iteration is deterministic.
pub type ValueMap = BTreeMap<String, InputValue>;
