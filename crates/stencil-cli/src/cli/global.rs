//! Flags shared by every subcommand.
//!
//! Flattened into [`super::Cli`] with `global = true`, so `stencil new -vv`
//! and `stencil -vv new` mean the same thing.

use std::path::PathBuf;

use clap::{ArgAction, Args, ValueEnum};

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Log more: `-v` info, `-vv` debug, `-vvv` trace.
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v, -vv, -vvv)",
        long_help = "Increase log verbosity. Without the flag only warnings and errors \
                     are logged; RUST_LOG overrides the level entirely."
    )]
    pub verbose: u8,

    /// Only errors reach the terminal.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Print errors only"
    )]
    pub quiet: bool,

    /// Honours `NO_COLOR` (<https://no-color.org>).
    #[arg(
        long = "no-color",
        global = true,
        env = "NO_COLOR",
        help = "Disable colored output"
    )]
    pub no_color: bool,

    /// Extra config file, layered above `./stencil.toml` and the user config.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "FILE",
        help = "Read configuration from FILE as well"
    )]
    pub config: Option<PathBuf>,

    /// Mirror logs into a file, without colors.
    #[arg(
        long = "log-file",
        global = true,
        value_name = "FILE",
        help = "Append logs to FILE in addition to stderr"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "auto",
        help = "How results are printed"
    )]
    pub output_format: OutputFormat,
}

/// How results are printed on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human when stdout is a terminal, plain otherwise.
    #[default]
    Auto,
    /// Colored, decorated text.
    Human,
    /// Undecorated text, safe to pipe.
    Plain,
    /// A single JSON document.
    Json,
}
