//! Manifest resolution: from a manifest and a context to the concrete list
//! of files, dependencies and hooks for one run.
//!
//! Conditions and templated strings are compiled once by
//! [`CompiledManifest::compile`]; [`ManifestResolver::resolve`] then only
//! evaluates.

use std::collections::HashMap;

use tracing::{debug, instrument, trace};

use crate::domain::{
    condition::Condition,
    security::SecurityPolicy,
    entities::{
        common::RelativePath,
        context::VariableContext,
        manifest::{BlueprintManifest, DependencySpec},
        resolved::{PlannedFile, Resolution, ResolvedHook},
    },
    error::DomainError,
    limits::ResourceLimiter,
    template::{DEFAULT_MAX_STEPS, RenderBudget, Template},
};
use crate::error::StencilResult;

#[derive(Debug, Clone)]
struct CompiledFile {
    source: String,
    destination: Template,
    condition: Option<Condition>,
    executable: bool,
}

#[derive(Debug, Clone)]
struct CompiledDependency {
    spec: DependencySpec,
    condition: Option<Condition>,
}

#[derive(Debug, Clone)]
struct CompiledHook {
    command: Template,
    description: Option<String>,
    condition: Option<Condition>,
}

/// A manifest whose conditions and templated strings have been parsed.
#[derive(Debug, Clone)]
pub struct CompiledManifest {
    name: String,
    files: Vec<CompiledFile>,
    dependencies: Vec<CompiledDependency>,
    hooks: Vec<CompiledHook>,
}

impl CompiledManifest {
    /// Compile every condition, destination and hook command.
    ///
    /// All problems are reported together.
    pub fn compile(manifest: &BlueprintManifest) -> Result<Self, Vec<DomainError>> {
        let mut errors = Vec::new();

        let mut condition = |expr: Option<&str>| match Condition::compile(expr) {
            Ok(c) => c,
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let mut files = Vec::with_capacity(manifest.files.len());
        let mut dependencies = Vec::with_capacity(manifest.dependencies.len());
        let mut hooks = Vec::with_capacity(manifest.post_hooks.len());
        let mut bad_templates = Vec::new();

        for (i, entry) in manifest.files.iter().enumerate() {
            let cond = condition(entry.condition.as_deref());
            match Template::parse(format!("files[{i}].destination"), &entry.destination) {
                Ok(destination) => files.push(CompiledFile {
                    source: entry.source.clone(),
                    destination,
                    condition: cond,
                    executable: entry.executable,
                }),
                Err(e) => bad_templates.push(e.to_string()),
            }
        }

        for dep in &manifest.dependencies {
            let cond = condition(dep.condition.as_deref());
            dependencies.push(CompiledDependency {
                spec: DependencySpec::new(&dep.module, &dep.version),
                condition: cond,
            });
        }

        for (i, hook) in manifest.post_hooks.iter().enumerate() {
            let cond = condition(hook.condition.as_deref());
            match Template::parse(format!("post_hooks[{i}]"), &hook.command) {
                Ok(command) => hooks.push(CompiledHook {
                    command,
                    description: hook.description.clone(),
                    condition: cond,
                }),
                Err(e) => bad_templates.push(e.to_string()),
            }
        }

        errors.extend(bad_templates.into_iter().map(DomainError::InvalidManifest));

        if errors.is_empty() {
            Ok(Self {
                name: manifest.name.clone(),
                files,
                dependencies,
                hooks,
            })
        } else {
            Err(errors)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Evaluates a [`CompiledManifest`] against one context.
///
/// Destinations and hook commands are short strings; they render under
/// a budget of four times the policy's path length and the default step
/// count unless told otherwise.
#[derive(Debug, Clone, Copy)]
pub struct ManifestResolver<'a> {
    limiter: Option<&'a ResourceLimiter>,
    max_output: usize,
    max_steps: u64,
}

impl Default for ManifestResolver<'_> {
    fn default() -> Self {
        Self {
            limiter: None,
            max_output: SecurityPolicy::default().max_path_length.saturating_mul(4),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl<'a> ManifestResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count included files against `limiter` as they are produced.
    pub fn with_limiter(limiter: &'a ResourceLimiter) -> Self {
        Self {
            limiter: Some(limiter),
            max_steps: limiter.limits().max_render_steps,
            ..Self::default()
        }
    }

    /// Size rendered destinations and hook commands for `policy`.
    pub fn with_policy(mut self, policy: &SecurityPolicy) -> Self {
        self.max_output = policy.max_path_length.saturating_mul(4);
        self
    }

    fn render(&self, template: &Template, ctx: &VariableContext) -> StencilResult<String> {
        let budget = RenderBudget::default()
            .output(self.max_output)
            .steps(self.max_steps);
        template.render_with(ctx, budget).map_err(|e| {
            let location = e.template().to_string();
            match e.into_violation(&location) {
                Ok(violation) => violation.into(),
                Err(other) => other.into(),
            }
        })
    }

    /// Resolve files, dependencies and hooks in manifest order.
    ///
    /// Each destination is rendered before its condition is evaluated. Two
    /// included entries with the same normalized destination fail the
    /// resolution immediately, as does a destination that another one needs
    /// as a parent directory.
    #[instrument(skip_all, fields(blueprint = %manifest.name))]
    pub fn resolve(
        &self,
        manifest: &CompiledManifest,
        ctx: &VariableContext,
    ) -> StencilResult<Resolution> {
        let mut resolution = Resolution::default();
        let mut owners: HashMap<RelativePath, &str> = HashMap::new();
        // Directory implied by some destination, mapped to the first one.
        let mut parents: HashMap<String, RelativePath> = HashMap::new();

        for file in &manifest.files {
            let raw_destination = self.render(&file.destination, ctx)?;
            let included = file.condition.as_ref().is_none_or(|c| c.evaluate(ctx));
            trace!(source = %file.source, destination = %raw_destination, included, "file entry");
            if !included {
                continue;
            }

            let destination = RelativePath::new(&raw_destination);
            if let Some(first) = owners.insert(destination.clone(), &file.source) {
                return Err(DomainError::DuplicateDestination {
                    destination: destination.to_string(),
                    first: first.to_string(),
                    second: file.source.clone(),
                }
                .into());
            }
            if let Some(nested) = parents.get(destination.as_str()) {
                return Err(DomainError::PathConflict {
                    file: destination.to_string(),
                    nested: nested.to_string(),
                }
                .into());
            }
            for dir in destination.ancestors() {
                if owners.contains_key(&RelativePath::new(&dir)) {
                    return Err(DomainError::PathConflict {
                        file: dir,
                        nested: destination.to_string(),
                    }
                    .into());
                }
                parents.entry(dir).or_insert_with(|| destination.clone());
            }
            if let Some(limiter) = self.limiter {
                limiter.record_file(&destination)?;
            }

            resolution.files.push(PlannedFile {
                source: file.source.clone(),
                destination,
                raw_destination,
                executable: file.executable,
            });
        }

        for dep in &manifest.dependencies {
            if !dep.condition.as_ref().is_none_or(|c| c.evaluate(ctx)) {
                continue;
            }
            match resolution
                .dependencies
                .iter()
                .find(|d| d.module == dep.spec.module)
            {
                Some(existing) if existing.version == dep.spec.version => {}
                Some(existing) => {
                    return Err(DomainError::ConflictingDependency {
                        module: dep.spec.module.clone(),
                        first: existing.version.clone(),
                        second: dep.spec.version.clone(),
                    }
                    .into());
                }
                None => resolution.dependencies.push(dep.spec.clone()),
            }
        }

        for hook in &manifest.hooks {
            if hook.condition.as_ref().is_none_or(|c| c.evaluate(ctx)) {
                resolution.hooks.push(ResolvedHook {
                    command: self.render(&hook.command, ctx)?,
                    description: hook.description.clone(),
                });
            }
        }

        debug!(
            files = resolution.files.len(),
            dependencies = resolution.dependencies.len(),
            hooks = resolution.hooks.len(),
            "manifest resolved"
        );
        Ok(resolution)
    }
}

/// Compile and resolve in one step, without resource accounting.
pub fn resolve(manifest: &BlueprintManifest, ctx: &VariableContext) -> StencilResult<Resolution> {
    let compiled = CompiledManifest::compile(manifest).map_err(|mut errors| errors.remove(0))?;
    ManifestResolver::new().resolve(&compiled, ctx)
}
