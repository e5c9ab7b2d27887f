//! Implementation of the `stencil new` command.
//!
//! Responsibility: gather variable layers, hand the blueprint to the core
//! generation service, and display the result. No business logic lives here.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use stencil_adapters::LocalFilesystem;
use stencil_core::{
    application::{
        CancellationToken, GenerationMode, GenerationReport, GenerationRequest, GenerationService,
    },
    domain::{ContextEntry, ContextLayers, DependencySpec, InputValue, ResolvedHook, ResourceUsage},
};

use crate::{
    blueprints,
    cli::NewArgs,
    config::AppConfig,
    deps, hooks,
    error::CliResult,
    output::{OutputManager, print_json},
    vars,
};

/// Execute the `stencil new` command.
///
/// 1. Locate the blueprint (registry reference or directory)
/// 2. Assemble the variable layers
/// 3. Run the generation service, committing unless `--dry-run`
/// 4. Report, write `--deps-out`, then run hooks
#[instrument(skip_all, fields(blueprint = %args.blueprint))]
pub fn execute(args: NewArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.generation.output_dir.clone());

    let registry = blueprints::registry(&config)?;
    let blueprint = blueprints::resolve(&args.blueprint, &registry)?;

    let env: Vec<(String, String)> = std::env::vars().collect();
    let mut layers = vars::build_layers(
        &args.set,
        args.profile.as_deref(),
        &config,
        env,
        &blueprint.manifest.variables,
    )?;
    add_project_name(&mut layers, &output_dir);

    let mut request = GenerationRequest::new(args.blueprint.clone(), output_dir.clone())
        .with_layers(layers);
    if args.dry_run {
        request = request.validate_only();
    }

    let service = GenerationService::new(Box::new(registry), Box::new(LocalFilesystem::new()))
        .with_policy(config.limits.security_policy())
        .with_limits(config.limits.resource_limits());

    if !output.is_json() {
        output.header(&format!(
            "Generating '{}' into {}...",
            blueprint.manifest.name,
            output_dir.display()
        ))?;
    }

    let report = service.generate_from(&blueprint, &request, &CancellationToken::new())?;
    info!(files = report.files.len(), mode = ?report.mode, "generation complete");

    if let Some(path) = &args.deps_out {
        deps::write(&report.dependencies, path)?;
        debug!(path = %path.display(), count = report.dependencies.len(), "dependencies written");
    }

    if output.is_json() {
        print_json(&Summary::new(&report, &output_dir))?;
    } else {
        show_report(&report, &output_dir, args.show_context, &output)?;
    }

    let run_hooks = !args.dry_run && !args.no_hooks && config.generation.run_hooks;
    if run_hooks && !report.hooks.is_empty() {
        hooks::run_hooks(&report.hooks, &output_dir, &output)?;
    } else if !report.hooks.is_empty() && !output.is_quiet() && !output.is_json() {
        output.info("Skipped hooks:")?;
        for hook in &report.hooks {
            output.print(&format!("  $ {}", hook.command))?;
        }
    }

    Ok(())
}

/// Offer the output directory's name as `ProjectName` at builtin precedence.
fn add_project_name(layers: &mut ContextLayers, output_dir: &Path) {
    if let Some(name) = project_name(output_dir) {
        layers
            .builtins
            .entry("ProjectName".to_string())
            .or_insert(InputValue::Text(name));
    }
}

fn project_name(output_dir: &Path) -> Option<String> {
    let named = output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);
    named
        .or_else(|| {
            std::env::current_dir()
                .ok()
                .and_then(|d| d.file_name().and_then(|n| n.to_str()).map(str::to_string))
        })
        .filter(|n| !n.is_empty() && !n.starts_with('.'))
}

fn show_report(
    report: &GenerationReport,
    output_dir: &Path,
    show_context: bool,
    output: &OutputManager,
) -> CliResult<()> {
    if show_context {
        output.print("Variables:")?;
        let rows: Vec<(String, String, String)> = report
            .context
            .iter()
            .map(|e| (e.name.clone(), e.value.to_string(), format!("({})", e.origin)))
            .collect();
        output.rows(&rows)?;
        output.print("")?;
    }

    for file in &report.files {
        output.path_item(output_dir, file)?;
    }

    match report.mode {
        GenerationMode::ValidateOnly => output.success(&format!(
            "Dry run passed: {} file(s), {} byte(s) would be written",
            report.files.len(),
            report.usage.total_bytes
        ))?,
        GenerationMode::Commit => output.success(&format!(
            "Generated {} file(s) in {}",
            report.files.len(),
            output_dir.display()
        ))?,
    }

    if !report.dependencies.is_empty() {
        output.print("Dependencies:")?;
        for dep in &report.dependencies {
            output.print(&format!("  {} {}", dep.module, dep.version))?;
        }
    }
    Ok(())
}

/// Machine-readable summary for `--output-format json`.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    blueprint: String,
    mode: GenerationMode,
    output_dir: &'a Path,
    files: Vec<PathBuf>,
    created_dirs: &'a [PathBuf],
    variables: Vec<&'a ContextEntry>,
    dependencies: &'a [DependencySpec],
    hooks: &'a [ResolvedHook],
    usage: ResourceUsage,
}

impl<'a> Summary<'a> {
    fn new(report: &'a GenerationReport, output_dir: &'a Path) -> Self {
        Self {
            blueprint: report.blueprint.to_string(),
            mode: report.mode,
            output_dir,
            files: report
                .files
                .iter()
                .map(|f| f.strip_prefix(output_dir).unwrap_or(f).to_path_buf())
                .collect(),
            created_dirs: &report.created_dirs,
            variables: report.context.iter().collect(),
            dependencies: &report.dependencies,
            hooks: &report.hooks,
            usage: report.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_comes_from_last_component() {
        assert_eq!(project_name(Path::new("work/orders")), Some("orders".into()));
        assert_eq!(project_name(Path::new("/tmp/billing-api")), Some("billing-api".into()));
    }

    #[test]
    fn hidden_directory_names_are_not_offered() {
        assert_eq!(project_name(Path::new("/tmp/.cache")), None);
    }

    #[test]
    fn explicit_project_name_wins_over_directory() {
        let mut layers = ContextLayers::default();
        layers
            .builtins
            .insert("ProjectName".into(), InputValue::Text("explicit".into()));
        add_project_name(&mut layers, Path::new("orders"));
        assert_eq!(layers.builtins["ProjectName"].as_text(), "explicit");
    }

    #[test]
    fn directory_name_fills_missing_project_name() {
        let mut layers = ContextLayers::default();
        add_project_name(&mut layers, Path::new("./out/orders"));
        assert_eq!(layers.builtins["ProjectName"].as_text(), "orders");
    }
}
