//! Filesystem-based blueprint loader.
//!
//! Discovers blueprint manifests in a directory tree and pairs each one with
//! the template bodies stored beside it.
//!
//! # Directory layout expected
//!
//! ```text
//! blueprints/
//! ├── go-service/
//! │   ├── blueprint.toml       ← manifest (required, or .yaml / .yml / .json)
//! │   ├── go.mod.tmpl          ← source id "go.mod.tmpl"
//! │   └── cmd/
//! │       └── main.go.tmpl     ← source id "cmd/main.go.tmpl"
//! └── python-worker/
//!     ├── blueprint.yaml
//!     └── worker.py.tmpl
//! ```
//!
//! Every regular file other than the manifest becomes a source, keyed by its
//! path relative to the blueprint directory with `/` separators.
//!
//! # `blueprint.toml` format
//!
//! ```toml
//! name    = "go-service"
//! version = "1.0.0"
//!
//! [[variables]]
//! name     = "AuthType"
//! type     = "enum"            # string | bool | enum
//! choices  = ["none", "jwt"]
//! default  = "none"
//!
//! [[files]]
//! source      = "auth.go.tmpl"
//! destination = "internal/auth/{{ .AuthType }}.go"
//! condition   = 'ne .AuthType "none"'
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use stencil_core::domain::{Blueprint, BlueprintManifest, DomainError, DomainValidator};

/// Recognised manifest file names, in lookup order.
pub const MANIFEST_NAMES: [&str; 4] = [
    "blueprint.toml",
    "blueprint.yaml",
    "blueprint.yml",
    "blueprint.json",
];

/// Manifest serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Yaml,
    Json,
}

impl ManifestFormat {
    /// Detect the format from a manifest path.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse manifest text.
    pub fn parse(self, raw: &str) -> Result<BlueprintManifest, String> {
        match self {
            Self::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
        }
    }
}

/// Loads [`Blueprint`]s from a directory of blueprint directories.
///
/// Subdirectories without a manifest, or whose manifest or sources are
/// invalid, emit a `WARN` log and are skipped.
///
/// # Example
///
/// ```no_run
/// use stencil_adapters::FilesystemBlueprintLoader;
///
/// let loader = FilesystemBlueprintLoader::new("./blueprints");
/// let blueprints = loader.load_all()?;
/// println!("Loaded {} blueprints", blueprints.len());
/// # Ok::<(), stencil_core::domain::DomainError>(())
/// ```
pub struct FilesystemBlueprintLoader {
    blueprints_dir: PathBuf,
}

impl FilesystemBlueprintLoader {
    /// Create a loader pointed at `blueprints_dir`.
    pub fn new(blueprints_dir: impl Into<PathBuf>) -> Self {
        Self {
            blueprints_dir: blueprints_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.blueprints_dir
    }

    /// Load every valid blueprint found under the loader's directory.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidManifest`] if the directory is missing
    /// or unreadable. Individual blueprint directories that fail to load are
    /// skipped.
    #[instrument(skip(self), fields(dir = %self.blueprints_dir.display()))]
    pub fn load_all(&self) -> Result<Vec<Blueprint>, DomainError> {
        if !self.blueprints_dir.exists() {
            return Err(invalid(format!(
                "blueprints directory not found: {}",
                self.blueprints_dir.display()
            )));
        }

        let read_dir = fs::read_dir(&self.blueprints_dir).map_err(|e| {
            invalid(format!(
                "failed to read blueprints directory '{}': {e}",
                self.blueprints_dir.display()
            ))
        })?;

        let mut dirs = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| invalid(format!("failed to read directory entry: {e}")))?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut blueprints = Vec::new();
        for path in dirs {
            match load_dir(&path) {
                Ok(blueprint) => {
                    debug!(
                        name    = %blueprint.manifest.name,
                        version = %blueprint.manifest.version,
                        "loaded blueprint"
                    );
                    blueprints.push(blueprint);
                }
                Err(e) => {
                    warn!(
                        dir   = %path.display(),
                        error = %e,
                        "skipping blueprint directory due to load error"
                    );
                }
            }
        }

        debug!(count = blueprints.len(), "finished loading blueprints");
        Ok(blueprints)
    }
}

/// Load and validate one blueprint directory.
///
/// # Errors
///
/// Fails if no manifest is present, the manifest does not parse, a source
/// is not UTF-8, or [`DomainValidator::validate_blueprint`] rejects the result
/// (the first reported problem is returned).
#[instrument(fields(dir = %dir.display()))]
pub fn load_dir(dir: &Path) -> Result<Blueprint, DomainError> {
    let manifest_path = find_manifest(dir)
        .ok_or_else(|| invalid(format!("no blueprint manifest in '{}'", dir.display())))?;
    let manifest = load_manifest(&manifest_path)?;

    let mut blueprint = Blueprint::new(manifest);
    blueprint.sources = load_sources(dir, &manifest_path)?;

    DomainValidator::validate_blueprint(&blueprint).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| invalid(format!("'{}' failed validation", dir.display())))
    })?;
    Ok(blueprint)
}

/// Parse a single manifest file, picking the format from its extension.
pub fn load_manifest(path: &Path) -> Result<BlueprintManifest, DomainError> {
    let format = ManifestFormat::from_path(path)
        .ok_or_else(|| invalid(format!("unsupported manifest format: '{}'", path.display())))?;
    let raw = fs::read_to_string(path)
        .map_err(|e| invalid(format!("failed to read '{}': {e}", path.display())))?;
    format
        .parse(&raw)
        .map_err(|e| invalid(format!("failed to parse '{}': {e}", path.display())))
}

fn find_manifest(dir: &Path) -> Option<PathBuf> {
    MANIFEST_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn load_sources(dir: &Path, manifest_path: &Path) -> Result<BTreeMap<String, String>, DomainError> {
    let mut sources = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| invalid(format!("directory walk error: {e}")))?;
        // Symlinks are not followed; a blueprint can only ship its own files.
        if !entry.file_type().is_file() || entry.path() == manifest_path {
            continue;
        }

        let rel = entry.path().strip_prefix(dir).map_err(|_| {
            invalid(format!(
                "failed to relativise '{}' against '{}'",
                entry.path().display(),
                dir.display()
            ))
        })?;
        let id = normalize_path(&rel.to_string_lossy());
        let body = fs::read_to_string(entry.path())
            .map_err(|e| invalid(format!("failed to read source '{id}': {e}")))?;
        sources.insert(id, body);
    }
    Ok(sources)
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn invalid(message: String) -> DomainError {
    DomainError::InvalidManifest(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const TOML_MANIFEST: &str = r#"
name = "svc"
version = "1.0.0"

[[variables]]
name = "Name"
required = true

[[files]]
source = "src/main.go.tmpl"
destination = "main.go"
"#;

    #[test]
    fn loads_toml_manifest_and_nested_sources() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("svc");
        write(&dir, "blueprint.toml", TOML_MANIFEST);
        write(&dir, "src/main.go.tmpl", "package {{ .Name }}\n");

        let blueprint = load_dir(&dir).unwrap();
        assert_eq!(blueprint.manifest.name, "svc");
        assert_eq!(blueprint.sources.len(), 1);
        assert_eq!(
            blueprint.source("src/main.go.tmpl"),
            Some("package {{ .Name }}\n")
        );
    }

    #[test]
    fn loads_yaml_and_json_manifests() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("y");
        write(
            &yaml,
            "blueprint.yaml",
            "name: y\nversion: 0.1.0\nfiles:\n  - source: a.tmpl\n    destination: a.txt\n",
        );
        write(&yaml, "a.tmpl", "a");

        let json = temp.path().join("j");
        write(
            &json,
            "blueprint.json",
            r#"{"name":"j","version":"0.1.0","files":[{"source":"b.tmpl","destination":"b.txt"}]}"#,
        );
        write(&json, "b.tmpl", "b");

        assert_eq!(load_dir(&yaml).unwrap().manifest.name, "y");
        assert_eq!(load_dir(&json).unwrap().manifest.name, "j");
    }

    #[test]
    fn missing_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("svc");
        write(&dir, "blueprint.toml", TOML_MANIFEST);

        let err = load_dir(&dir).unwrap_err();
        assert!(matches!(err, DomainError::UnknownSource { .. }));
    }

    #[test]
    fn load_all_skips_broken_directories() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("good"), "blueprint.toml", TOML_MANIFEST);
        write(&temp.path().join("good"), "src/main.go.tmpl", "x");
        write(&temp.path().join("broken"), "blueprint.toml", "name = ");
        fs::create_dir(temp.path().join("empty")).unwrap();

        let loaded = FilesystemBlueprintLoader::new(temp.path()).load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].manifest.name, "svc");
    }

    #[test]
    fn missing_root_is_an_error() {
        let loader = FilesystemBlueprintLoader::new("/definitely/not/here");
        assert!(loader.load_all().is_err());
    }

    #[test]
    fn bundled_blueprint_directory_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("blueprints/go-service");
        let blueprint = load_dir(&dir).unwrap();
        assert_eq!(blueprint.manifest.name, "go-service");
        assert!(blueprint.source("cmd/main.go.tmpl").is_some());
    }
}
