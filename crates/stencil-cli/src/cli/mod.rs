//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "stencil",
    bin_name = "stencil",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Blueprint-driven project generation",
    long_about = "Stencil resolves a blueprint manifest against your variables, \
                  checks every template before anything is rendered, and commits \
                  the result atomically.",
    after_help = "EXAMPLES:\n\
        \x20 stencil new go-service ./orders --set ProjectName=orders --set AuthType=jwt\n\
        \x20 stencil new go-service ./orders --profile work --dry-run\n\
        \x20 stencil validate ./blueprints/go-service\n\
        \x20 stencil completions bash > /usr/share/bash-completion/completions/stencil",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a project from a blueprint.
    #[command(
        visible_alias = "n",
        about = "Generate a project from a blueprint",
        after_help = "EXAMPLES:\n\
            \x20 stencil new go-service ./orders --set ProjectName=orders\n\
            \x20 stencil new go-service@1.0.0 ./orders --set ProjectName=orders --no-hooks\n\
            \x20 STENCIL_VAR_AuthType=jwt stencil new go-service ./orders --set ProjectName=orders"
    )]
    New(NewArgs),

    /// Validate a blueprint without generating anything.
    #[command(
        about = "Validate a blueprint",
        after_help = "EXAMPLES:\n\
            \x20 stencil validate go-service\n\
            \x20 stencil validate ./blueprints/my-blueprint"
    )]
    Validate(ValidateArgs),

    /// List available blueprints.
    #[command(
        visible_alias = "ls",
        about = "List available blueprints",
        after_help = "EXAMPLES:\n\
            \x20 stencil list\n\
            \x20 stencil list --format json"
    )]
    List(ListArgs),

    /// Initialise a Stencil configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 stencil init           # default location\n\
            \x20 stencil init --local   # ./stencil.toml"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 stencil completions bash > ~/.local/share/bash-completion/completions/stencil\n\
            \x20 stencil completions zsh  > ~/.zfunc/_stencil\n\
            \x20 stencil completions fish > ~/.config/fish/completions/stencil.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the Stencil configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 stencil config get limits.max_files\n\
            \x20 stencil config list\n\
            \x20 stencil config path"
    )]
    Config(ConfigCommands),
}

// ── new ───────────────────────────────────────────────────────────────────────

/// Arguments for `stencil new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Blueprint reference: `name`, `name@version`, or a blueprint directory.
    #[arg(value_name = "BLUEPRINT")]
    pub blueprint: String,

    /// Directory to generate into. Created if missing; existing files are
    /// never overwritten.
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Set a variable (highest precedence). Repeatable.
    #[arg(
        short = 's',
        long = "set",
        value_name = "NAME=VALUE",
        help = "Set a variable (repeatable)"
    )]
    pub set: Vec<String>,

    /// Apply a variable profile from the configuration file.
    #[arg(
        short = 'p',
        long = "profile",
        value_name = "NAME",
        help = "Use variables from [profiles.NAME]"
    )]
    pub profile: Option<String>,

    /// Run every check but write nothing.
    #[arg(long = "dry-run", help = "Validate and render without writing")]
    pub dry_run: bool,

    /// Skip post-generation hooks.
    #[arg(long = "no-hooks", help = "Do not run post-generation hooks")]
    pub no_hooks: bool,

    /// Print the resolved variables and where each came from.
    #[arg(long = "show-context", help = "Show resolved variables and their origin")]
    pub show_context: bool,

    /// Write the resolved dependency list to FILE.
    #[arg(
        long = "deps-out",
        value_name = "FILE",
        help = "Write resolved dependencies to FILE (.json, .toml or plain lines)"
    )]
    pub deps_out: Option<PathBuf>,
}

// ── validate ──────────────────────────────────────────────────────────────────

/// Arguments for `stencil validate`.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Blueprint reference or directory.
    #[arg(value_name = "BLUEPRINT")]
    pub blueprint: String,
}

// ── list ──────────────────────────────────────────────────────────────────────

/// Arguments for `stencil list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format.
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `list` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One `name@version` per line.
    List,
    /// JSON array.
    Json,
    /// CSV rows.
    Csv,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `stencil init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write `stencil.toml` in the current directory instead of the user
    /// config directory.
    #[arg(
        long = "local",
        help = "Create local configuration in current directory"
    )]
    pub local: bool,

    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `stencil completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `stencil config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `limits.max_files`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the active configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
