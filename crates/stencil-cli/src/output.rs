//! Output management and formatting.
//!
//! Human output goes through [`OutputManager`]; JSON output bypasses it so
//! it stays parseable even in quiet mode.

use std::io::{self, IsTerminal};
use std::path::Path;

use console::Term;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::global::{GlobalArgs, OutputFormat};
use crate::config::AppConfig;

/// Manages CLI output based on flags and configuration.
pub struct OutputManager {
    resolved_format: OutputFormat,
    quiet: bool,
    no_color: bool,
    term: Term,
}

impl OutputManager {
    /// Build an `OutputManager` from parsed CLI flags and loaded config.
    pub fn new(args: &GlobalArgs, config: &AppConfig) -> Self {
        let configured = match config.output.format.as_str() {
            "json" => OutputFormat::Json,
            "plain" => OutputFormat::Plain,
            _ => OutputFormat::Auto,
        };
        let requested = if args.output_format == OutputFormat::Auto {
            configured
        } else {
            args.output_format
        };

        // Resolve Auto → Human (TTY) or Plain (piped/redirected).
        let resolved_format = match requested {
            OutputFormat::Auto if io::stdout().is_terminal() => OutputFormat::Human,
            OutputFormat::Auto => OutputFormat::Plain,
            other => other,
        };

        Self {
            resolved_format,
            quiet: args.quiet,
            no_color: args.no_color
                || config.output.no_color
                || resolved_format != OutputFormat::Human,
            term: Term::stdout(),
        }
    }

    // ── Public write methods ───────────────────────────────────────────────

    /// Generic message; suppressed in quiet mode.
    pub fn print(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.term.write_line(msg)
    }

    /// Success indicator: `✓ <msg>`.
    pub fn success(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{2713} {msg}") // ✓
        } else {
            format!("{} {}", "\u{2713}".green().bold(), msg.green())
        };
        self.term.write_line(&line)
    }

    /// Warning indicator: `⚠ <msg>`.
    pub fn warning(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{26a0} {msg}") // ⚠
        } else {
            format!("{} {}", "\u{26a0}".yellow().bold(), msg.yellow())
        };
        self.term.write_line(&line)
    }

    /// Informational indicator: `ℹ <msg>`.
    pub fn info(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{2139} {msg}") // ℹ
        } else {
            format!("{} {}", "\u{2139}".blue().bold(), msg.blue())
        };
        self.term.write_line(&line)
    }

    /// Bold cyan header line.
    pub fn header(&self, text: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            text.to_owned()
        } else {
            text.cyan().bold().to_string()
        };
        self.term.write_line(&line)
    }

    /// One generated path, shown relative to `root` when possible.
    pub fn path_item(&self, root: &Path, path: &Path) -> io::Result<()> {
        let shown = path.strip_prefix(root).unwrap_or(path);
        let line = if self.no_color {
            format!("  + {}", shown.display())
        } else {
            format!("  {} {}", "+".green(), shown.display())
        };
        self.print(&line)
    }

    /// Aligned `key  value  note` rows.
    pub fn rows(&self, rows: &[(String, String, String)]) -> io::Result<()> {
        let width = rows.iter().map(|(k, _, _)| k.len()).max().unwrap_or(0);
        for (key, value, note) in rows {
            let note = if note.is_empty() || self.no_color {
                note.clone()
            } else {
                note.dimmed().to_string()
            };
            self.print(&format!("  {key:<width$}  {value}  {note}").trim_end().to_string())?;
        }
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// `true` if quiet mode suppresses most output.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn is_json(&self) -> bool {
        self.resolved_format == OutputFormat::Json
    }
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{text}");
    Ok(())
}

// ── tests ─────────────────────────────────────────────────────────────────────
