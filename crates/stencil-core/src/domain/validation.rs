use std::collections::HashSet;

use crate::domain::{
    condition::Condition,
    entities::{
        context::{anchored, check_pattern, coerce},
        manifest::{Blueprint, BlueprintManifest, VariableSpec},
    },
    error::DomainError,
    value_objects::VariableType,
};

/// Centralized manifest validation.
///
/// Checks that need nothing but the manifest live here, not scattered across
/// entities. Every problem is collected so authors can fix them in one pass.
pub struct DomainValidator;

impl DomainValidator {
    pub fn validate_manifest(manifest: &BlueprintManifest) -> Result<(), Vec<DomainError>> {
        let mut errors = Vec::new();

        if manifest.name.trim().is_empty() {
            errors.push(DomainError::InvalidManifest("blueprint name is empty".into()));
        }
        if let Err(e) = manifest.id() {
            if !manifest.name.trim().is_empty() {
                errors.push(e);
            }
        }

        let mut seen = HashSet::new();
        for spec in &manifest.variables {
            if !seen.insert(spec.name.as_str()) {
                errors.push(DomainError::DuplicateVariable {
                    name: spec.name.clone(),
                });
            }
            if let Err(e) = Self::validate_variable(spec) {
                errors.push(e);
            }
        }

        let conditions = manifest
            .files
            .iter()
            .map(|f| f.condition.as_deref())
            .chain(manifest.dependencies.iter().map(|d| d.condition.as_deref()))
            .chain(manifest.post_hooks.iter().map(|h| h.condition.as_deref()));
        for condition in conditions {
            if let Err(e) = Condition::compile(condition) {
                errors.push(e);
            }
        }

        for (i, file) in manifest.files.iter().enumerate() {
            if file.destination.trim().is_empty() {
                errors.push(DomainError::InvalidManifest(format!(
                    "file entry {i} ('{}') has an empty destination",
                    file.source
                )));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Manifest checks plus: every file entry's source ships with the bundle.
    pub fn validate_blueprint(blueprint: &Blueprint) -> Result<(), Vec<DomainError>> {
        let mut errors = Self::validate_manifest(&blueprint.manifest)
            .err()
            .unwrap_or_default();

        for file in &blueprint.manifest.files {
            if blueprint.source(&file.source).is_none() {
                errors.push(DomainError::UnknownSource {
                    source_id: file.source.clone(),
                    destination: file.destination.clone(),
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn validate_variable(spec: &VariableSpec) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidVariableSpec {
            name: spec.name.clone(),
            reason,
        };

        if spec.name.is_empty() || !spec.name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid("names may only contain letters, digits and '_'".into()));
        }
        if spec.kind == VariableType::Enum && spec.choices.is_empty() {
            return Err(invalid("enum variables need at least one choice".into()));
        }
        if spec.kind != VariableType::Enum && !spec.choices.is_empty() {
            return Err(invalid(format!("choices only apply to enum variables, not {}", spec.kind)));
        }
        if let Some(pattern) = &spec.validation_pattern {
            anchored(pattern).map_err(|e| invalid(format!("invalid validation pattern: {e}")))?;
        }
        if let Some(default) = &spec.default {
            let value = coerce(spec, default).map_err(|e| invalid(format!("bad default: {e}")))?;
            check_pattern(spec, &value).map_err(|e| invalid(format!("bad default: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::manifest::FileEntry;

    #[test]
    fn accepts_a_well_formed_blueprint() {
        let manifest = BlueprintManifest::new("svc", "1.0.0")
            .with_variable(VariableSpec::enumeration("AuthType", ["", "jwt"]).with_default(""))
            .with_file(FileEntry::new("main.go.tmpl", "main.go"))
            .with_file(FileEntry::new("auth.go.tmpl", "auth.go").when(r#"ne .AuthType """#));
        let blueprint = Blueprint::new(manifest)
            .with_source("main.go.tmpl", "package main")
            .with_source("auth.go.tmpl", "package main");
        assert!(DomainValidator::validate_blueprint(&blueprint).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let manifest = BlueprintManifest::new("svc", "1.0.0")
            .with_variable(VariableSpec::string("A"))
            .with_variable(VariableSpec::string("A"))
            .with_variable(VariableSpec::enumeration("E", Vec::<String>::new()))
            .with_variable(VariableSpec::string("P").with_pattern("("))
            .with_file(FileEntry::new("x", "x").when("frob .A"));
        let errors = DomainValidator::validate_manifest(&manifest).unwrap_err();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(matches!(errors[0], DomainError::DuplicateVariable { .. }));
        assert!(errors.iter().any(|e| matches!(e, DomainError::UnknownConditionFunction { .. })));
    }

    #[test]
    fn default_must_be_a_valid_choice() {
        let manifest = BlueprintManifest::new("svc", "1.0.0").with_variable(
            VariableSpec::enumeration("Db", ["postgres", "mysql"]).with_default("oracle"),
        );
        let errors = DomainValidator::validate_manifest(&manifest).unwrap_err();
        assert!(matches!(errors[0], DomainError::InvalidVariableSpec { ref name, .. } if name == "Db"));
    }

    #[test]
    fn unknown_source_is_reported() {
        let blueprint =
            Blueprint::new(BlueprintManifest::new("svc", "1.0.0").with_file(FileEntry::new("gone", "a.txt")));
        let errors = DomainValidator::validate_blueprint(&blueprint).unwrap_err();
        assert_eq!(
            errors,
            vec![DomainError::UnknownSource {
                source_id: "gone".into(),
                destination: "a.txt".into()
            }]
        );
    }

    #[test]
    fn empty_name_is_invalid() {
        let errors = DomainValidator::validate_manifest(&BlueprintManifest::new("", "1")).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
