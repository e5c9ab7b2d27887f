//! Built-in blueprint discovery.
//!
//! [`all_blueprints`] returns the blueprints compiled into the binary
//! followed by any found on disk. Disk blueprints with the same
//! `name@version` replace the embedded ones when inserted into a registry.
//!
//! # Blueprint directory resolution order
//!
//! The first directory that exists and yields at least one blueprint wins:
//!
//! 1. **`$STENCIL_BLUEPRINTS_DIR`**
//! 2. **`./blueprints`** relative to the working directory
//! 3. **`<executable-dir>/blueprints`**
//! 4. **`../blueprints`**, handy when running from `target/debug/`

use std::{collections::BTreeMap, path::PathBuf};

use tracing::{debug, info, instrument};

use stencil_core::domain::{Blueprint, DomainError};

use crate::blueprint_loader::{FilesystemBlueprintLoader, ManifestFormat};

/// Environment variable naming an extra blueprint directory.
pub const BLUEPRINTS_DIR_ENV: &str = "STENCIL_BLUEPRINTS_DIR";

const GO_SERVICE_MANIFEST: &str = include_str!("../blueprints/go-service/blueprint.toml");
const GO_SERVICE_SOURCES: &[(&str, &str)] = &[
    (
        "go.mod.tmpl",
        include_str!("../blueprints/go-service/go.mod.tmpl"),
    ),
    (
        "cmd/main.go.tmpl",
        include_str!("../blueprints/go-service/cmd/main.go.tmpl"),
    ),
    (
        "auth.go.tmpl",
        include_str!("../blueprints/go-service/auth.go.tmpl"),
    ),
    (
        "Dockerfile.tmpl",
        include_str!("../blueprints/go-service/Dockerfile.tmpl"),
    ),
    (
        "run.sh.tmpl",
        include_str!("../blueprints/go-service/run.sh.tmpl"),
    ),
];

/// Embedded blueprints followed by those discovered on disk.
///
/// # Errors
///
/// Fails if an embedded manifest does not parse, or if a candidate
/// directory exists but cannot be read.
#[instrument]
pub fn all_blueprints() -> Result<Vec<Blueprint>, DomainError> {
    let mut blueprints = embedded()?;
    blueprints.extend(discover()?);
    Ok(blueprints)
}

/// Blueprints compiled into the binary.
pub fn embedded() -> Result<Vec<Blueprint>, DomainError> {
    let manifest = ManifestFormat::Toml
        .parse(GO_SERVICE_MANIFEST)
        .map_err(|e| DomainError::InvalidManifest(format!("embedded go-service: {e}")))?;
    let sources: BTreeMap<String, String> = GO_SERVICE_SOURCES
        .iter()
        .map(|(id, body)| (id.to_string(), body.to_string()))
        .collect();

    let mut blueprint = Blueprint::new(manifest);
    blueprint.sources = sources;
    Ok(vec![blueprint])
}

/// Blueprints from the first candidate directory that has any.
pub fn discover() -> Result<Vec<Blueprint>, DomainError> {
    for candidate in candidate_paths() {
        debug!(path = %candidate.display(), "checking candidate blueprints path");

        if !candidate.is_dir() {
            continue;
        }

        let blueprints = FilesystemBlueprintLoader::new(&candidate).load_all()?;
        if blueprints.is_empty() {
            debug!(path = %candidate.display(), "no blueprints, trying next");
            continue;
        }

        info!(
            path  = %candidate.display(),
            count = blueprints.len(),
            "blueprints loaded from disk"
        );
        return Ok(blueprints);
    }

    debug!("no blueprint directory found on disk");
    Ok(vec![])
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(4);

    if let Ok(env_dir) = std::env::var(BLUEPRINTS_DIR_ENV) {
        paths.push(PathBuf::from(env_dir));
    }

    paths.push(PathBuf::from("blueprints"));

    if let Some(exe_sibling) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("blueprints")))
    {
        paths.push(exe_sibling);
    }

    paths.push(PathBuf::from("../blueprints"));

    paths
}
