//! Gathering variable layers from flags, profiles and the environment.

use std::collections::HashMap;

use chrono::Datelike;

use stencil_core::domain::{ContextLayers, InputValue, ValueMap, VariableSpec};

use crate::{
    config::AppConfig,
    error::{CliError, CliResult},
};

/// Prefix of environment variables that feed the *env* layer.
pub const ENV_VAR_PREFIX: &str = "STENCIL_VAR_";

/// Parse repeated `NAME=VALUE` arguments.
pub fn parse_assignments(items: &[String]) -> CliResult<ValueMap> {
    let mut values = ValueMap::new();
    for item in items {
        let (name, value) = item.split_once('=').ok_or_else(|| CliError::InvalidInput {
            message: format!("expected NAME=VALUE, got '{item}'"),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::InvalidInput {
                message: format!("missing variable name in '{item}'"),
            });
        }
        values.insert(name.to_string(), InputValue::Text(value.to_string()));
    }
    Ok(values)
}

/// Collect `STENCIL_VAR_<Name>=value` pairs.
pub fn env_layer<I>(vars: I) -> ValueMap
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_VAR_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), InputValue::Text(value)))
        })
        .collect()
}

/// Values every run provides at the lowest precedence.
pub fn builtins() -> ValueMap {
    let mut values = ValueMap::new();
    values.insert(
        "StencilVersion".into(),
        InputValue::Text(env!("CARGO_PKG_VERSION").into()),
    );
    values.insert(
        "Year".into(),
        InputValue::Integer(i64::from(chrono::Local::now().year())),
    );
    values
}

/// Rename keys that match a declared variable case-insensitively to the
/// declared spelling. Config files and some platforms' environments do not
/// preserve case.
///
/// Two keys in one layer that land on the same variable are a conflict;
/// `layer` names the source in the error.
pub fn canonicalize(values: ValueMap, specs: &[VariableSpec], layer: &str) -> CliResult<ValueMap> {
    let mut out = ValueMap::new();
    let mut spelled: HashMap<String, String> = HashMap::new();
    for (name, value) in values {
        let canonical = specs
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(&name))
            .map_or_else(|| name.clone(), |s| s.name.clone());
        if let Some(previous) = spelled.insert(canonical.clone(), name.clone()) {
            return Err(CliError::InvalidInput {
                message: format!(
                    "{layer} sets '{canonical}' twice, as '{previous}' and '{name}'"
                ),
            });
        }
        out.insert(canonical, value);
    }
    Ok(out)
}

/// Assemble every layer for one run.
pub fn build_layers<I>(
    set: &[String],
    profile: Option<&str>,
    config: &AppConfig,
    env: I,
    specs: &[VariableSpec],
) -> CliResult<ContextLayers>
where
    I: IntoIterator<Item = (String, String)>,
{
    let profile_values = match profile {
        Some(name) => config
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| CliError::UnknownProfile {
                name: name.to_string(),
                available: config.profiles.keys().cloned().collect(),
            })?,
        None => ValueMap::new(),
    };

    let profile_layer = match profile {
        Some(name) => format!("profile '{name}'"),
        None => "profile".to_string(),
    };
    let mut layers = ContextLayers::default()
        .with_builtins(builtins())
        .with_profile(canonicalize(profile_values, specs, &profile_layer)?)
        .with_env(canonicalize(env_layer(env), specs, "the environment")?);
    layers.overrides = canonicalize(parse_assignments(set)?, specs, "--set")?;
    Ok(layers)
}
