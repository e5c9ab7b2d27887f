//! Blueprint Service - blueprint management operations.
//!
//! Handles registry CRUD, reference lookup and metadata queries.
//! Separated from GenerationService for single responsibility.

use std::cmp::Ordering;

use tracing::{debug, instrument};

use crate::{
    application::{ApplicationError, ports::BlueprintRegistry},
    domain::{
        Blueprint, BlueprintId, CompiledManifest, DomainValidator, SecurityValidator, Template,
    },
    error::{StencilError, StencilResult},
};

/// Information about a blueprint for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BlueprintInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub variables: usize,
    pub files: usize,
}

impl From<&Blueprint> for BlueprintInfo {
    fn from(b: &Blueprint) -> Self {
        let m = &b.manifest;
        Self {
            id: format!("{}@{}", m.name, m.version),
            name: m.name.clone(),
            version: m.version.clone(),
            description: m.description.clone(),
            variables: m.variables.len(),
            files: m.files.len(),
        }
    }
}

/// Service for blueprint operations.
pub struct BlueprintService {
    registry: Box<dyn BlueprintRegistry>,
}

impl BlueprintService {
    /// Create a new blueprint service.
    pub fn new(registry: Box<dyn BlueprintRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &dyn BlueprintRegistry {
        self.registry.as_ref()
    }

    /// Look up `name` or `name@version`.
    pub fn get(&self, reference: &str) -> StencilResult<Blueprint> {
        lookup(self.registry.as_ref(), reference)
    }

    /// Validate and add (or replace) a blueprint.
    pub fn save(&self, blueprint: Blueprint) -> StencilResult<()> {
        DomainValidator::validate_blueprint(&blueprint).map_err(first_error)?;
        self.registry.insert(blueprint)
    }

    /// Remove a blueprint.
    pub fn remove(&self, id: &BlueprintId) -> StencilResult<()> {
        self.registry.remove(id)
    }

    /// List all blueprints, sorted by name then version.
    pub fn list(&self) -> StencilResult<Vec<BlueprintInfo>> {
        let mut blueprints = self.registry.list()?;
        blueprints.sort_by(|a, b| {
            a.manifest
                .name
                .cmp(&b.manifest.name)
                .then_with(|| compare_versions(&a.manifest.version, &b.manifest.version))
        });
        Ok(blueprints.iter().map(BlueprintInfo::from).collect())
    }
}

/// Resolve a `name` or `name@version` reference against a registry.
///
/// A bare name picks the highest registered version.
pub fn lookup(registry: &dyn BlueprintRegistry, reference: &str) -> StencilResult<Blueprint> {
    if reference.contains('@') {
        let id = BlueprintId::parse(reference)?;
        return registry.get(&id);
    }

    registry
        .find_by_name(reference)?
        .into_iter()
        .max_by(|a, b| compare_versions(&a.manifest.version, &b.manifest.version))
        .ok_or_else(|| {
            ApplicationError::BlueprintNotFound {
                reference: reference.to_string(),
            }
            .into()
        })
}

/// Check a blueprint without any variables.
///
/// Covers manifest validity, template syntax, and a security scan of every
/// source, destination template and hook command. Destinations without
/// actions are also checked as paths. Returns every problem found; an empty
/// list means the blueprint is clean.
#[instrument(skip_all, fields(blueprint = %blueprint.manifest.name))]
pub fn audit(blueprint: &Blueprint, validator: &SecurityValidator) -> Vec<StencilError> {
    let mut errors: Vec<StencilError> = Vec::new();

    match DomainValidator::validate_blueprint(blueprint) {
        Ok(()) => {
            if let Err(compile) = CompiledManifest::compile(&blueprint.manifest) {
                errors.extend(compile.into_iter().map(StencilError::from));
            }
        }
        Err(invalid) => errors.extend(invalid.into_iter().map(StencilError::from)),
    }

    for (id, source) in &blueprint.sources {
        if let Err(e) = Template::parse(id.as_str(), source) {
            errors.push(e.into());
        }
        errors.extend(validator.validate_template(id, source).into_iter().map(StencilError::from));
    }

    for (i, entry) in blueprint.manifest.files.iter().enumerate() {
        let id = format!("files[{i}].destination");
        errors.extend(
            validator
                .validate_template(&id, &entry.destination)
                .into_iter()
                .map(StencilError::from),
        );
        if !entry.destination.contains("{{") {
            errors.extend(
                validator
                    .validate_path(&entry.destination)
                    .into_iter()
                    .map(StencilError::from),
            );
        }
    }

    for (i, hook) in blueprint.manifest.post_hooks.iter().enumerate() {
        let id = format!("post_hooks[{i}]");
        errors.extend(
            validator
                .validate_template(&id, &hook.command)
                .into_iter()
                .map(StencilError::from),
        );
    }

    // Violations lead, matching the order generation would report them in.
    errors.sort_by_key(|e| e.as_violation().is_none());
    debug!(problems = errors.len(), "audit finished");
    errors
}

/// Dotted versions compare numerically where both sides are numbers.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts = |v: &str| -> Vec<String> {
        v.trim_start_matches('v')
            .split(['.', '-'])
            .map(str::to_string)
            .collect()
    };
    for (x, y) in parts(a).iter().zip(parts(b).iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    parts(a).len().cmp(&parts(b).len())
}

fn first_error(mut errors: Vec<crate::domain::DomainError>) -> StencilError {
    if errors.is_empty() {
        StencilError::Internal {
            message: "validation failed without errors".into(),
        }
    } else {
        errors.remove(0).into()
    }
}
