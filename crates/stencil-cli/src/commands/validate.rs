//! `stencil validate`: check a blueprint without generating anything.

use tracing::{info, instrument};

use stencil_core::{
    application::{GenerationFailure, GenerationStage, audit},
    domain::SecurityValidator,
};

use crate::{
    blueprints,
    cli::ValidateArgs,
    config::AppConfig,
    error::{CliError, CliResult},
    output::{OutputManager, print_json},
};

/// Audit the manifest, every template source, every destination and every
/// hook. All problems are reported together.
#[instrument(skip_all, fields(blueprint = %args.blueprint))]
pub fn execute(args: ValidateArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let registry = blueprints::registry(&config)?;
    let blueprint = blueprints::resolve(&args.blueprint, &registry)?;
    let validator = SecurityValidator::new(config.limits.security_policy());

    let errors = audit(&blueprint, &validator);
    if !errors.is_empty() {
        return Err(CliError::Generation(GenerationFailure {
            stage: GenerationStage::Validating,
            errors,
        }));
    }

    info!(blueprint = %blueprint.manifest.name, "blueprint is valid");
    if output.is_json() {
        print_json(&serde_json::json!({
            "blueprint": format!("{}@{}", blueprint.manifest.name, blueprint.manifest.version),
            "valid": true,
            "files": blueprint.manifest.files.len(),
            "variables": blueprint.manifest.variables.len(),
        }))?;
    } else {
        output.success(&format!(
            "{}@{} is valid ({} file entries, {} variables)",
            blueprint.manifest.name,
            blueprint.manifest.version,
            blueprint.manifest.files.len(),
            blueprint.manifest.variables.len()
        ))?;
    }
    Ok(())
}
