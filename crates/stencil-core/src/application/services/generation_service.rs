//! Generation Service - main application orchestrator.
//!
//! One call to [`GenerationService::generate`] walks a fixed sequence of
//! stages:
//!
//! ```text
//! Loading → Resolving → Validating → Rendering → LimitChecking → Committing → Done
//!     \__________\___________\___________\______________\____________\__→ Failed
//! ```
//!
//! No stage is re-entered. A failing stage returns every error it collected;
//! nothing reaches the output directory unless all earlier stages passed.
//!
//! Destination and hook templates are rendered while resolving, so Loading
//! already runs the security scan over them. Every render, wherever it
//! happens, runs under a step budget and an output ceiling.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        cancellation::CancellationToken,
        ports::{BlueprintRegistry, Filesystem},
        services::{blueprint_service::lookup, writer::AtomicWriter},
    },
    domain::{
        Blueprint, BlueprintId, CompiledManifest, ContextBuilder, ContextLayers, DependencySpec,
        DomainValidator, ManifestResolver, RelativePath, RenderBudget, ResolvedFile,
        ResolvedFileSet, ResolvedHook, ResourceLimiter, ResourceLimits, ResourceUsage,
        SecurityPolicy, SecurityValidator, Template, ValidationViolation, VariableContext,
    },
    error::StencilError,
};

/// Stages of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum GenerationStage {
    Loading,
    Resolving,
    Validating,
    Rendering,
    LimitChecking,
    Committing,
    Done,
    Failed,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Resolving => "resolving",
            Self::Validating => "validating",
            Self::Rendering => "rendering",
            Self::LimitChecking => "limit checking",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Whether the run writes to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub enum GenerationMode {
    #[default]
    Commit,
    /// Run every stage except Committing.
    ValidateOnly,
}

/// Input for one run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// `name` or `name@version`.
    pub blueprint: String,
    pub output_dir: PathBuf,
    pub layers: ContextLayers,
    pub mode: GenerationMode,
}

impl GenerationRequest {
    pub fn new(blueprint: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            blueprint: blueprint.into(),
            output_dir: output_dir.into(),
            layers: ContextLayers::default(),
            mode: GenerationMode::Commit,
        }
    }

    pub fn with_layers(mut self, layers: ContextLayers) -> Self {
        self.layers = layers;
        self
    }

    pub fn validate_only(mut self) -> Self {
        self.mode = GenerationMode::ValidateOnly;
        self
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub blueprint: BlueprintId,
    pub mode: GenerationMode,
    pub context: VariableContext,
    /// Written paths, or the paths that would be written in validate-only mode.
    pub files: Vec<PathBuf>,
    /// Directories the commit created; empty in validate-only mode.
    pub created_dirs: Vec<PathBuf>,
    pub dependencies: Vec<DependencySpec>,
    pub hooks: Vec<ResolvedHook>,
    pub usage: ResourceUsage,
}

/// A failed run: the stage that failed and every error it collected.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationFailure {
    pub stage: GenerationStage,
    pub errors: Vec<StencilError>,
}

impl GenerationFailure {
    fn new(stage: GenerationStage, errors: Vec<StencilError>) -> Self {
        Self { stage, errors }
    }

    fn single(stage: GenerationStage, error: impl Into<StencilError>) -> Self {
        Self::new(stage, vec![error.into()])
    }

    pub fn violations(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.errors.iter().filter_map(StencilError::as_violation)
    }

    /// The first error, which decides how the failure is presented.
    pub fn primary(&self) -> Option<&StencilError> {
        self.errors.first()
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation failed during {} with {} error(s)",
            self.stage,
            self.errors.len()
        )
    }
}

impl std::error::Error for GenerationFailure {}

type StageResult<T> = Result<T, GenerationFailure>;

/// Main generation service.
///
/// Holds the injected adapters and the policy; keeps no state between runs.
pub struct GenerationService {
    registry: Box<dyn BlueprintRegistry>,
    filesystem: Box<dyn Filesystem>,
    validator: SecurityValidator,
    limits: ResourceLimits,
}

impl GenerationService {
    /// Create a new generation service with the given adapters and default
    /// policy.
    pub fn new(registry: Box<dyn BlueprintRegistry>, filesystem: Box<dyn Filesystem>) -> Self {
        Self {
            registry,
            filesystem,
            validator: SecurityValidator::default(),
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_policy(mut self, policy: SecurityPolicy) -> Self {
        self.validator = SecurityValidator::new(policy);
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Look up the requested blueprint and run it.
    #[instrument(skip_all, fields(blueprint = %request.blueprint, output = %request.output_dir.display()))]
    pub fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, GenerationFailure> {
        let blueprint = lookup(self.registry.as_ref(), &request.blueprint)
            .map_err(|e| GenerationFailure::single(GenerationStage::Loading, e))?;
        self.generate_from(&blueprint, request, cancel)
    }

    /// Run an already loaded blueprint.
    pub fn generate_from(
        &self,
        blueprint: &Blueprint,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, GenerationFailure> {
        let (id, compiled) = self.load(blueprint)?;
        info!(blueprint = %id, mode = ?request.mode, "generation started");

        checkpoint(cancel, GenerationStage::Resolving)?;
        let limiter = ResourceLimiter::new(self.limits.clone());
        let ctx = ContextBuilder::new(&blueprint.manifest.variables)
            .layers(request.layers.clone())
            .build()
            .map_err(|errors| fail(GenerationStage::Resolving, errors))?;
        let resolution = ManifestResolver::with_limiter(&limiter)
            .with_policy(self.validator.policy())
            .resolve(&compiled, &ctx)
            .map_err(|e| GenerationFailure::single(GenerationStage::Resolving, e))?;

        checkpoint(cancel, GenerationStage::Validating)?;
        self.validate(blueprint, &resolution.files)?;

        checkpoint(cancel, GenerationStage::Rendering)?;
        let files = self.render(blueprint, &resolution.files, &ctx, &limiter, cancel)?;

        debug!(stage = %GenerationStage::LimitChecking, "checking totals");
        let usage = limiter
            .finish()
            .map_err(|v| GenerationFailure::single(GenerationStage::LimitChecking, v))?;
        let set = ResolvedFileSet::new(files)
            .map_err(|e| GenerationFailure::single(GenerationStage::LimitChecking, e))?;

        let (files, created_dirs) = match request.mode {
            GenerationMode::ValidateOnly => {
                let planned = set
                    .iter()
                    .map(|f| f.destination.under(&request.output_dir))
                    .collect();
                (planned, Vec::new())
            }
            GenerationMode::Commit => self.commit(&set, &request.output_dir, cancel)?,
        };

        info!(stage = %GenerationStage::Done, files = files.len(), "generation finished");
        Ok(GenerationReport {
            blueprint: id,
            mode: request.mode,
            context: ctx,
            files,
            created_dirs,
            dependencies: resolution.dependencies,
            hooks: resolution.hooks,
            usage,
        })
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    fn load(&self, blueprint: &Blueprint) -> StageResult<(BlueprintId, CompiledManifest)> {
        let stage = GenerationStage::Loading;
        DomainValidator::validate_blueprint(blueprint).map_err(|errors| fail(stage, errors))?;
        let id = blueprint
            .id()
            .map_err(|e| GenerationFailure::single(stage, e))?;

        let violations = self.scan_manifest_templates(blueprint);
        if !violations.is_empty() {
            warn!(violations = violations.len(), "manifest templates rejected");
            return Err(fail(stage, violations));
        }

        let compiled =
            CompiledManifest::compile(&blueprint.manifest).map_err(|errors| fail(stage, errors))?;
        Ok((id, compiled))
    }

    /// Destination templates and hook commands, which the resolver renders.
    fn scan_manifest_templates(&self, blueprint: &Blueprint) -> Vec<ValidationViolation> {
        let manifest = &blueprint.manifest;
        let destinations = manifest
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (format!("files[{i}].destination"), f.destination.as_str()));
        let hooks = manifest
            .post_hooks
            .iter()
            .enumerate()
            .map(|(i, h)| (format!("post_hooks[{i}]"), h.command.as_str()));
        destinations
            .chain(hooks)
            .flat_map(|(id, body)| self.validator.validate_template(&id, body))
            .collect()
    }

    /// Every referenced template source and every resolved destination path.
    fn validate(
        &self,
        blueprint: &Blueprint,
        planned: &[crate::domain::PlannedFile],
    ) -> StageResult<()> {
        let manifest = &blueprint.manifest;
        let mut templates: BTreeMap<String, &str> = BTreeMap::new();
        let sources: BTreeSet<&str> = manifest.files.iter().map(|f| f.source.as_str()).collect();
        for source in sources {
            if let Some(body) = blueprint.source(source) {
                templates.insert(source.to_string(), body);
            }
        }

        let template_findings: Vec<Vec<ValidationViolation>> = templates
            .par_iter()
            .map(|(id, body)| self.validator.validate_template(id, body))
            .collect();
        let path_findings: Vec<Vec<ValidationViolation>> = planned
            .par_iter()
            .map(|f| self.validator.validate_path(&f.raw_destination))
            .collect();

        let violations: Vec<StencilError> = template_findings
            .into_iter()
            .chain(path_findings)
            .flatten()
            .map(StencilError::from)
            .collect();

        if violations.is_empty() {
            debug!(templates = templates.len(), paths = planned.len(), "security checks passed");
            Ok(())
        } else {
            warn!(violations = violations.len(), "security checks failed");
            Err(GenerationFailure::new(GenerationStage::Validating, violations))
        }
    }

    fn render(
        &self,
        blueprint: &Blueprint,
        planned: &[crate::domain::PlannedFile],
        ctx: &VariableContext,
        limiter: &ResourceLimiter,
        cancel: &CancellationToken,
    ) -> StageResult<Vec<ResolvedFile>> {
        let stage = GenerationStage::Rendering;

        let mut parsed: BTreeMap<&str, Template> = BTreeMap::new();
        let mut errors = Vec::new();
        for file in planned {
            if parsed.contains_key(file.source.as_str()) {
                continue;
            }
            let Some(body) = blueprint.source(&file.source) else {
                errors.push(
                    ApplicationError::MissingSource {
                        blueprint: blueprint.manifest.name.clone(),
                        source_id: file.source.clone(),
                    }
                    .into(),
                );
                continue;
            };
            match Template::parse(file.source.as_str(), body) {
                Ok(t) => {
                    parsed.insert(file.source.as_str(), t);
                }
                Err(e) => errors.push(e.into()),
            }
        }
        if !errors.is_empty() {
            return Err(GenerationFailure::new(stage, errors));
        }

        let budget = RenderBudget::default()
            .output(usize::try_from(limiter.limits().max_file_size).unwrap_or(usize::MAX))
            .steps(limiter.limits().max_render_steps)
            .interrupt(cancel.flag());
        let rendered: Vec<Option<Result<ResolvedFile, StencilError>>> = planned
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() || limiter.is_exceeded() {
                    return None;
                }
                let template = parsed.get(file.source.as_str())?;
                Some(render_one(template, file, ctx, limiter, budget))
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(GenerationFailure::single(
                stage,
                ApplicationError::Cancelled {
                    stage: stage.to_string(),
                },
            ));
        }

        let mut files = Vec::with_capacity(rendered.len());
        for result in rendered.into_iter().flatten() {
            match result {
                Ok(file) => files.push(file),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            debug!(files = files.len(), "rendering complete");
            Ok(files)
        } else {
            Err(GenerationFailure::new(stage, errors))
        }
    }

    fn commit(
        &self,
        set: &ResolvedFileSet,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> StageResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        checkpoint(cancel, GenerationStage::Committing)?;
        info!(stage = %GenerationStage::Committing, files = set.len(), "committing");

        let report = AtomicWriter::new(self.filesystem.as_ref())
            .commit(set, output_dir)
            .map_err(|e| GenerationFailure::single(GenerationStage::Committing, e))?;

        if cancel.is_cancelled() {
            warn!("cancellation arrived during commit");
            return Err(GenerationFailure::single(
                GenerationStage::Committing,
                ApplicationError::CancelledAfterCommit {
                    written: report.written,
                },
            ));
        }
        Ok((report.written, report.created_dirs))
    }
}

fn render_one(
    template: &Template,
    file: &crate::domain::PlannedFile,
    ctx: &VariableContext,
    limiter: &ResourceLimiter,
    budget: RenderBudget<'_>,
) -> Result<ResolvedFile, StencilError> {
    let text = template
        .render_with(ctx, budget)
        .map_err(|e| match e.into_violation(file.destination.as_str()) {
            Ok(violation) => StencilError::from(violation),
            Err(other) => other.into(),
        })?;
    limiter.record_bytes(&file.destination, text.len() as u64)?;

    let mut out = ResolvedFile::new(RelativePath::clone(&file.destination), text);
    out.executable = file.executable;
    Ok(out)
}

fn checkpoint(cancel: &CancellationToken, next: GenerationStage) -> StageResult<()> {
    if cancel.is_cancelled() {
        info!(stage = %next, "generation cancelled");
        return Err(GenerationFailure::single(
            next,
            ApplicationError::Cancelled {
                stage: next.to_string(),
            },
        ));
    }
    Ok(())
}

fn fail<E: Into<StencilError>>(stage: GenerationStage, errors: Vec<E>) -> GenerationFailure {
    GenerationFailure::new(stage, errors.into_iter().map(Into::into).collect())
}
