//! The per-run variable context and its builder.
//!
//! Layers, highest precedence first:
//!
//! ```text
//! override  (--set K=V)
//! env       (STENCIL_VAR_<Name>)
//! profile   ([profiles.<name>] in the config file)
//! default   (VariableSpec.default)
//! builtin   (values the caller derives, e.g. ProjectName)
//! zero      ("" / false)
//! ```
//!
//! A context is built fresh for every generation run and never mutated
//! afterwards.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::{
    DomainError,
    entities::manifest::VariableSpec,
    value_objects::{InputValue, ValueMap, VariableType, VariableValue},
};

/// Where a context value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueOrigin {
    Zero,
    Builtin,
    Default,
    Profile,
    Env,
    Override,
}

impl fmt::Display for ValueOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Zero => "zero",
            Self::Builtin => "builtin",
            Self::Default => "default",
            Self::Profile => "profile",
            Self::Env => "env",
            Self::Override => "override",
        };
        f.write_str(s)
    }
}

/// One resolved variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub name: String,
    pub value: VariableValue,
    pub origin: ValueOrigin,
    /// The declaration this value was validated against; `None` for
    /// undeclared keys the caller supplied.
    #[serde(skip)]
    pub spec: Option<VariableSpec>,
}

/// Ordered name → value mapping used for one generation run.
///
/// Declared variables come first in manifest order, followed by undeclared
/// keys sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    entries: Vec<ContextEntry>,
    index: HashMap<String, usize>,
}

impl VariableContext {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a context directly from typed values, in the given order.
    ///
    /// Later duplicates replace earlier ones in place.
    pub fn from_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, VariableValue)>,
        K: Into<String>,
    {
        let mut ctx = Self::default();
        for (name, value) in values {
            ctx.push(ContextEntry {
                name: name.into(),
                value,
                origin: ValueOrigin::Override,
                spec: None,
            });
        }
        ctx
    }

    fn push(&mut self, entry: ContextEntry) {
        match self.index.get(&entry.name) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.entry(name).map(|e| &e.value)
    }

    pub fn entry(&self, name: &str) -> Option<&ContextEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Absent variables are falsy.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(VariableValue::is_truthy)
    }

    /// String form of a variable; absent variables read as `""`.
    pub fn lookup_str(&self, name: &str) -> String {
        self.get(name).map(VariableValue::render).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw input layers, gathered by the caller.
#[derive(Debug, Clone, Default)]
pub struct ContextLayers {
    pub builtins: ValueMap,
    pub profile: ValueMap,
    pub env: ValueMap,
    pub overrides: ValueMap,
}

impl ContextLayers {
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_profile(mut self, profile: ValueMap) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_env(mut self, env: ValueMap) -> Self {
        self.env = env;
        self
    }

    pub fn with_builtins(mut self, builtins: ValueMap) -> Self {
        self.builtins = builtins;
        self
    }

    /// Highest-precedence raw value for `name`.
    fn pick(&self, name: &str, spec_default: Option<&InputValue>) -> Option<(InputValue, ValueOrigin)> {
        if let Some(v) = self.overrides.get(name) {
            return Some((v.clone(), ValueOrigin::Override));
        }
        if let Some(v) = self.env.get(name) {
            return Some((v.clone(), ValueOrigin::Env));
        }
        if let Some(v) = self.profile.get(name) {
            return Some((v.clone(), ValueOrigin::Profile));
        }
        if let Some(v) = spec_default {
            return Some((v.clone(), ValueOrigin::Default));
        }
        self.builtins
            .get(name)
            .map(|v| (v.clone(), ValueOrigin::Builtin))
    }

    fn undeclared_names<'a>(&'a self, specs: &[VariableSpec]) -> Vec<&'a String> {
        let mut names: Vec<&String> = self
            .overrides
            .keys()
            .chain(self.env.keys())
            .chain(self.profile.keys())
            .chain(self.builtins.keys())
            .filter(|k| !specs.iter().any(|s| &s.name == *k))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Merges layers into a [`VariableContext`], validating every declared
/// variable against its [`VariableSpec`].
pub struct ContextBuilder<'a> {
    specs: &'a [VariableSpec],
    layers: ContextLayers,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(specs: &'a [VariableSpec]) -> Self {
        Self {
            specs,
            layers: ContextLayers::default(),
        }
    }

    pub fn layers(mut self, layers: ContextLayers) -> Self {
        self.layers = layers;
        self
    }

    pub fn builtins(mut self, values: ValueMap) -> Self {
        self.layers.builtins = values;
        self
    }

    pub fn profile(mut self, values: ValueMap) -> Self {
        self.layers.profile = values;
        self
    }

    pub fn env(mut self, values: ValueMap) -> Self {
        self.layers.env = values;
        self
    }

    pub fn overrides(mut self, values: ValueMap) -> Self {
        self.layers.overrides = values;
        self
    }

    /// Build the context, reporting every invalid or missing variable.
    pub fn build(self) -> Result<VariableContext, Vec<DomainError>> {
        let mut ctx = VariableContext::default();
        let mut errors = Vec::new();

        for spec in self.specs {
            match resolve_declared(spec, &self.layers) {
                Ok(entry) => ctx.push(entry),
                Err(e) => errors.push(e),
            }
        }

        for name in self.layers.undeclared_names(self.specs) {
            if let Some((raw, origin)) = self.layers.pick(name, None) {
                ctx.push(ContextEntry {
                    name: name.clone(),
                    value: VariableValue::String(raw.as_text()),
                    origin,
                    spec: None,
                });
            }
        }

        if errors.is_empty() {
            debug!(variables = ctx.len(), "variable context built");
            Ok(ctx)
        } else {
            Err(errors)
        }
    }
}

fn resolve_declared(spec: &VariableSpec, layers: &ContextLayers) -> Result<ContextEntry, DomainError> {
    let (value, origin) = match layers.pick(&spec.name, spec.default.as_ref()) {
        Some((raw, origin)) => (coerce(spec, &raw)?, origin),
        None => (VariableValue::zero(spec.kind), ValueOrigin::Zero),
    };

    if spec.required && (origin == ValueOrigin::Zero || value.is_empty()) {
        return Err(DomainError::MissingRequiredVariable {
            name: spec.name.clone(),
        });
    }

    if origin != ValueOrigin::Zero {
        check_pattern(spec, &value)?;
    }

    Ok(ContextEntry {
        name: spec.name.clone(),
        value,
        origin,
        spec: Some(spec.clone()),
    })
}

pub(crate) fn coerce(spec: &VariableSpec, raw: &InputValue) -> Result<VariableValue, DomainError> {
    match spec.kind {
        VariableType::String => Ok(VariableValue::String(raw.as_text())),
        VariableType::Bool => raw
            .as_bool()
            .map(VariableValue::Bool)
            .ok_or_else(|| DomainError::TypeMismatch {
                name: spec.name.clone(),
                expected: "bool",
                value: raw.as_text(),
            }),
        VariableType::Enum => {
            let text = raw.as_text();
            if spec.choices.iter().any(|c| *c == text) {
                Ok(VariableValue::Enum(text))
            } else {
                Err(DomainError::InvalidChoice {
                    name: spec.name.clone(),
                    value: text,
                    choices: spec.choices.clone(),
                })
            }
        }
    }
}

pub(crate) fn check_pattern(spec: &VariableSpec, value: &VariableValue) -> Result<(), DomainError> {
    let Some(pattern) = spec.validation_pattern.as_deref() else {
        return Ok(());
    };
    if matches!(value, VariableValue::Bool(_)) {
        return Ok(());
    }
    let re = anchored(pattern).map_err(|e| DomainError::InvalidVariableSpec {
        name: spec.name.clone(),
        reason: format!("invalid validation pattern: {e}"),
    })?;
    let text = value.render();
    if re.is_match(&text) {
        Ok(())
    } else {
        Err(DomainError::PatternMismatch {
            name: spec.name.clone(),
            value: text,
            pattern: pattern.to_string(),
        })
    }
}

/// Compile a validation pattern so it must match the whole value.
pub(crate) fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}
