//! Blueprint manifest entities.
//!
//! ## Structure
//!
//! ```text
//! Blueprint
//!  ├── BlueprintManifest   (declarative, deserialized from blueprint.toml/.yaml/.json)
//!  │    ├── VariableSpec*  (typed variable declarations)
//!  │    ├── FileEntry*     (source → templated destination, optional condition)
//!  │    ├── DependencySpec* (module + version, optional condition)
//!  │    └── HookSpec*      (post-generation commands, optional condition)
//!  └── sources             (source id → opaque template body)
//! ```
//!
//! Manifests are immutable once loaded. A `Blueprint` is identified by
//! [`BlueprintId`] (`name@version`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    DomainError,
    value_objects::{InputValue, VariableType},
};

// ============================================================================
// BlueprintId
// ============================================================================

/// Blueprint identity: `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlueprintId {
    name: String,
    version: String,
}

impl BlueprintId {
    /// Create a new blueprint ID.
    ///
    /// # Panics
    ///
    /// Panics if name contains `@`. Use [`BlueprintId::try_new`] for
    /// user-supplied names.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.contains('@'), "Blueprint name cannot contain @: {name}");
        Self {
            name,
            version: version.into(),
        }
    }

    pub fn try_new(name: impl Into<String>, version: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let version = version.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidBlueprintId("name is empty".into()));
        }
        if name.contains('@') || version.contains('@') {
            return Err(DomainError::InvalidBlueprintId(format!(
                "'{name}@{version}' contains more than one '@'"
            )));
        }
        Ok(Self { name, version })
    }

    /// Parse from string format `name@version`.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.split_once('@') {
            Some((name, version)) if !version.is_empty() => Self::try_new(name, version),
            _ => Err(DomainError::InvalidBlueprintId(format!(
                "'{s}' is not of the form 'name@version'"
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for BlueprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

// ============================================================================
// Manifest
// ============================================================================

fn default_version() -> String {
    "0.0.0".into()
}

/// The declarative description of a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintManifest {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub variables: Vec<VariableSpec>,

    #[serde(default)]
    pub files: Vec<FileEntry>,

    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    #[serde(default, alias = "postHooks")]
    pub post_hooks: Vec<HookSpec>,
}

impl BlueprintManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            variables: Vec::new(),
            files: Vec::new(),
            dependencies: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    pub fn id(&self) -> Result<BlueprintId, DomainError> {
        BlueprintId::try_new(&self.name, &self.version)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_variable(mut self, spec: VariableSpec) -> Self {
        self.variables.push(spec);
        self
    }

    pub fn with_file(mut self, entry: FileEntry) -> Self {
        self.files.push(entry);
        self
    }

    pub fn with_dependency(mut self, dep: DependencySpec) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_hook(mut self, hook: HookSpec) -> Self {
        self.post_hooks.push(hook);
        self
    }
}

/// Declaration of one context variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: VariableType,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default: Option<InputValue>,

    #[serde(default)]
    pub choices: Vec<String>,

    #[serde(default, alias = "validationPattern")]
    pub validation_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableSpec {
    fn of(name: impl Into<String>, kind: VariableType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            choices: Vec::new(),
            validation_pattern: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::of(name, VariableType::String)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::of(name, VariableType::Bool)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::of(name, VariableType::Enum);
        spec.choices = choices.into_iter().map(Into::into).collect();
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<InputValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation_pattern = Some(pattern.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One template file to (maybe) emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Template source id, usually a path relative to the blueprint root.
    #[serde(alias = "src", alias = "sourceTemplate")]
    pub source: String,

    /// Templated destination path.
    #[serde(alias = "dest")]
    pub destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub executable: bool,
}

impl FileEntry {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            condition: None,
            executable: false,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

/// A module dependency to hand to the build-file writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    pub module: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl DependencySpec {
    pub fn new(module: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            version: version.into(),
            condition: None,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// A post-generation command. The command string is itself a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HookSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            condition: None,
            description: None,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ============================================================================
// Blueprint bundle
// ============================================================================

/// A manifest together with the template bodies it references.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub manifest: BlueprintManifest,
    /// Source id → template body.
    pub sources: BTreeMap<String, String>,
}

impl Blueprint {
    pub fn new(manifest: BlueprintManifest) -> Self {
        Self {
            manifest,
            sources: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.sources.insert(id.into(), body.into());
        self
    }

    pub fn source(&self, id: &str) -> Option<&str> {
        self.sources.get(id).map(String::as_str)
    }

    pub fn id(&self) -> Result<BlueprintId, DomainError> {
        self.manifest.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_id_roundtrip() {
        let id = BlueprintId::parse("go-service@1.2.0").unwrap();
        assert_eq!(id.name(), "go-service");
        assert_eq!(id.version(), "1.2.0");
        assert_eq!(id.to_string(), "go-service@1.2.0");
    }

    #[test]
    fn blueprint_id_rejects_bad_forms() {
        assert!(BlueprintId::parse("go-service").is_err());
        assert!(BlueprintId::parse("a@b@c").is_err());
        assert!(BlueprintId::parse("@1.0").is_err());
        assert!(BlueprintId::parse("x@").is_err());
    }

    #[test]
    #[should_panic(expected = "cannot contain @")]
    fn blueprint_id_new_panics_on_at() {
        let _ = BlueprintId::new("a@b", "1");
    }

    #[test]
    fn manifest_deserializes_from_toml() {
        let doc = r#"
            name = "go-service"
            version = "1.0.0"

            [[variables]]
            name = "AuthType"
            type = "enum"
            choices = ["", "jwt", "oauth2"]
            default = ""

            [[files]]
            source = "main.go.tmpl"
            destination = "main.go"

            [[files]]
            src = "auth.go.tmpl"
            dest = "internal/auth/auth.go"
            condition = 'ne .AuthType ""'

            [[dependencies]]
            module = "github.com/golang-jwt/jwt/v5"
            version = "v5.2.0"
            condition = 'eq .AuthType "jwt"'

            [[post_hooks]]
            command = "go mod tidy"
        "#;
        let manifest: BlueprintManifest = toml::from_str(doc).unwrap();
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[1].source, "auth.go.tmpl");
        assert_eq!(manifest.variables[0].kind, VariableType::Enum);
        assert_eq!(manifest.dependencies[0].condition.as_deref(), Some("eq .AuthType \"jwt\""));
        assert_eq!(manifest.post_hooks[0].command, "go mod tidy");
    }

    #[test]
    fn manifest_accepts_camel_case_aliases() {
        let doc = r#"{
            "name": "x",
            "variables": [{"name": "Port", "validationPattern": "^[0-9]+$"}],
            "files": [{"sourceTemplate": "a", "destination": "a.txt"}],
            "postHooks": [{"command": "echo hi"}]
        }"#;
        let manifest: BlueprintManifest = serde_json::from_str(doc).unwrap();
        assert_eq!(manifest.version, "0.0.0");
        assert_eq!(manifest.variables[0].validation_pattern.as_deref(), Some("^[0-9]+$"));
        assert_eq!(manifest.post_hooks.len(), 1);
    }
}
