//! Emitting the resolved dependency list for external tooling.

use std::path::Path;

use serde::Serialize;

use stencil_core::domain::DependencySpec;

use crate::error::{CliError, CliResult, IntoCli};

#[derive(Debug, Serialize)]
struct Dependency<'a> {
    module: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct TomlDocument<'a> {
    dependencies: Vec<Dependency<'a>>,
}

/// Render dependencies in the format implied by `path`'s extension:
/// `.json` array, `.toml` `[[dependencies]]` tables, otherwise one
/// `module version` pair per line.
pub fn render(deps: &[DependencySpec], path: &Path) -> CliResult<String> {
    let items: Vec<Dependency<'_>> = deps
        .iter()
        .map(|d| Dependency {
            module: &d.module,
            version: &d.version,
        })
        .collect();

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(&items)
            .map(|s| s + "\n")
            .map_err(|e| invalid(path, e)),
        Some("toml") => {
            toml::to_string(&TomlDocument { dependencies: items }).map_err(|e| invalid(path, e))
        }
        _ => Ok(items
            .iter()
            .map(|d| format!("{} {}\n", d.module, d.version))
            .collect()),
    }
}

/// Write the dependency list to `path`.
pub fn write(deps: &[DependencySpec], path: &Path) -> CliResult<()> {
    let text = render(deps, path)?;
    std::fs::write(path, text)
        .with_cli_context(|| format!("failed to write dependency list to {}", path.display()))
}

fn invalid(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError::InvalidInput {
        message: format!("cannot encode dependencies for {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> Vec<DependencySpec> {
        vec![
            DependencySpec::new("github.com/golang-jwt/jwt/v5", "v5.2.1"),
            DependencySpec::new("github.com/google/uuid", "v1.6.0").when(".UseUUID"),
        ]
    }

    #[test]
    fn plain_lines_by_default() {
        let text = render(&deps(), Path::new("deps.txt")).unwrap();
        assert_eq!(
            text,
            "github.com/golang-jwt/jwt/v5 v5.2.1\ngithub.com/google/uuid v1.6.0\n"
        );
    }

    #[test]
    fn json_omits_conditions() {
        let text = render(&deps(), Path::new("deps.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["version"], "v1.6.0");
        assert!(parsed[1].get("condition").is_none());
    }

    #[test]
    fn toml_uses_array_of_tables() {
        let text = render(&deps(), Path::new("deps.toml")).unwrap();
        assert!(text.contains("[[dependencies]]"));
        assert!(text.contains(r#"module = "github.com/google/uuid""#));
    }

    #[test]
    fn write_creates_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("deps.txt");
        write(&deps(), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("v5.2.1"));
    }
}
