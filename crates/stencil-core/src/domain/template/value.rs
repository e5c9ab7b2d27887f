use std::fmt;

use crate::domain::value_objects::VariableValue;

/// A runtime value inside a template pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<Value>),
}

impl Value {
    /// Same rules as condition truthiness: `""`, `"false"`, `false`, `0`
    /// and empty lists are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty() && s != "false",
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Emptiness as used by `default` and `empty`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::Bool(b) => !*b,
            Self::Int(i) => *i == 0,
            Self::List(items) => items.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::List(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::List(_) => "list",
        }
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&VariableValue> for Value {
    fn from(v: &VariableValue) -> Self {
        match v {
            VariableValue::String(s) | VariableValue::Enum(s) => Self::Str(s.clone()),
            VariableValue::Bool(b) => Self::Bool(*b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
