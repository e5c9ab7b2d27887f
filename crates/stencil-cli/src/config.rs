//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate never sees it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables `STENCIL__<SECTION>__<KEY>`
//! 3. `--config FILE`, when given
//! 4. `./stencil.toml`
//! 5. `<user config dir>/config.toml`
//! 6. Built-in defaults (always present)

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use stencil_core::domain::{ResourceLimits, SecurityPolicy, ValueMap};

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = "stencil.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub limits: LimitsConfig,
    /// Named variable sets applied with `--profile`.
    pub profiles: BTreeMap<String, ValueMap>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Extra directory of blueprints, searched before the built-in ones.
    pub blueprints_dir: Option<PathBuf>,
    /// Where `stencil new` writes when no output is given.
    pub output_dir: PathBuf,
    /// Whether post-generation hooks run by default.
    pub run_hooks: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            blueprints_dir: None,
            output_dir: PathBuf::from("."),
            run_hooks: true,
        }
    }
}

/// Resource and security ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_files: usize,
    pub max_directories: usize,
    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_template_size: usize,
    pub max_path_length: usize,
    pub max_range_depth: usize,
    pub max_nesting_depth: usize,
    pub max_format_width: usize,
    pub max_render_steps: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let resources = ResourceLimits::default();
        let security = SecurityPolicy::default();
        Self {
            max_files: resources.max_files,
            max_directories: resources.max_directories,
            max_file_size: resources.max_file_size,
            max_total_size: resources.max_total_size,
            max_template_size: security.max_template_size,
            max_path_length: security.max_path_length,
            max_range_depth: security.max_range_depth,
            max_nesting_depth: security.max_nesting_depth,
            max_format_width: security.max_format_width,
            max_render_steps: resources.max_render_steps,
        }
    }
}

impl LimitsConfig {
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            max_files: self.max_files,
            max_directories: self.max_directories,
            max_file_size: self.max_file_size,
            max_total_size: self.max_total_size,
            max_render_steps: self.max_render_steps,
        }
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            max_template_size: self.max_template_size,
            max_path_length: self.max_path_length,
            max_range_depth: self.max_range_depth,
            max_nesting_depth: self.max_nesting_depth,
            max_format_width: self.max_format_width,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            format: "human".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from every layer.
    ///
    /// `config_file` is the path given with `--config`; unlike the implicit
    /// locations it must exist.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("failed to encode default configuration")?;

        let mut builder = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(Self::config_path()).required(false))
            .add_source(config::File::from(PathBuf::from(LOCAL_CONFIG_FILE)).required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path.clone()).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("STENCIL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Path to the user-level configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `./stencil.toml`.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "stencil", "stencil")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// Look up a dotted key such as `limits.max_files`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut value = serde_json::to_value(self).ok()?;
        for part in key.split('.') {
            value = value.get(part)?.clone();
        }
        Some(value)
    }
}
