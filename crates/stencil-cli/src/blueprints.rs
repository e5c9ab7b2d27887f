//! Locating blueprints for the commands.
//!
//! A reference is either a path to a blueprint directory or a registry
//! reference (`name` / `name@version`). The registry holds the built-in
//! blueprints plus any found in the configured blueprints directory.

use std::path::Path;

use tracing::debug;

use stencil_adapters::{InMemoryRegistry, blueprint_loader};
use stencil_core::{
    application::{BlueprintRegistry, BlueprintService},
    domain::Blueprint,
};

use crate::{config::AppConfig, error::CliResult};

/// Build the registry for this invocation.
pub fn registry(config: &AppConfig) -> CliResult<InMemoryRegistry> {
    let registry = InMemoryRegistry::with_builtin()?;

    if let Some(dir) = &config.generation.blueprints_dir {
        let loaded = blueprint_loader::FilesystemBlueprintLoader::new(dir)
            .load_all()
            .map_err(stencil_core::error::StencilError::from)?;
        debug!(dir = %dir.display(), count = loaded.len(), "configured blueprints loaded");
        for blueprint in loaded {
            registry.insert(blueprint)?;
        }
    }

    Ok(registry)
}

/// Resolve a reference to a blueprint.
pub fn resolve(reference: &str, registry: &InMemoryRegistry) -> CliResult<Blueprint> {
    let path = Path::new(reference);
    if path.is_dir() {
        debug!(path = %path.display(), "loading blueprint from directory");
        let blueprint =
            blueprint_loader::load_dir(path).map_err(stencil_core::error::StencilError::from)?;
        return Ok(blueprint);
    }

    Ok(BlueprintService::new(Box::new(registry.clone())).get(reference)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    #[test]
    fn builtin_reference_resolves() {
        let registry = registry(&AppConfig::default()).unwrap();
        let blueprint = resolve("go-service", &registry).unwrap();
        assert_eq!(blueprint.manifest.name, "go-service");
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let registry = registry(&AppConfig::default()).unwrap();
        let err = resolve("no-such-blueprint", &registry).unwrap_err();
        assert!(matches!(err, CliError::Core(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn directory_reference_loads_from_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("blueprint.toml"),
            "name = \"local\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let registry = InMemoryRegistry::new();
        let blueprint = resolve(temp.path().to_str().unwrap(), &registry).unwrap();
        assert_eq!(blueprint.manifest.name, "local");
    }
}
