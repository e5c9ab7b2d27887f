//! Running post-generation hooks.
//!
//! Hooks arrive already condition-filtered, rendered and security-checked;
//! this module only executes them, in order, inside the output directory.

use std::path::Path;
use std::process::Command;

use tracing::{info, instrument};

use stencil_core::domain::ResolvedHook;

use crate::{
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Run each hook with the platform shell. Stops at the first failure.
#[instrument(skip_all, fields(hooks = hooks.len(), dir = %dir.display()))]
pub fn run_hooks(hooks: &[ResolvedHook], dir: &Path, output: &OutputManager) -> CliResult<()> {
    for hook in hooks {
        let label = hook.description.as_deref().unwrap_or(&hook.command);
        output.info(&format!("Running hook: {label}"))?;
        info!(command = %hook.command, "running hook");

        let status = shell(&hook.command)
            .current_dir(dir)
            .status()
            .map_err(|e| CliError::IoError {
                message: format!("failed to start hook `{}`", hook.command),
                source: e,
            })?;

        if !status.success() {
            return Err(CliError::HookFailed {
                command: hook.command.clone(),
                status: status.code(),
                output_dir: dir.to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::{GlobalArgs, OutputFormat};
    use crate::config::AppConfig;

    fn quiet_output() -> OutputManager {
        let args = GlobalArgs {
            verbose: 0,
            quiet: true,
            no_color: true,
            config: None,
            log_file: None,
            output_format: OutputFormat::Plain,
        };
        OutputManager::new(&args, &AppConfig::default())
    }

    fn hook(command: &str) -> ResolvedHook {
        ResolvedHook {
            command: command.into(),
            description: None,
        }
    }

    #[test]
    fn hooks_run_in_output_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        run_hooks(&[hook("echo hi > marker.txt")], temp.path(), &quiet_output()).unwrap();
        assert!(temp.path().join("marker.txt").exists());
    }

    #[test]
    fn failing_hook_stops_the_sequence() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = run_hooks(
            &[hook("exit 3"), hook("touch never.txt")],
            temp.path(),
            &quiet_output(),
        )
        .unwrap_err();

        assert!(matches!(err, CliError::HookFailed { status: Some(3), .. }));
        assert!(!temp.path().join("never.txt").exists());
    }
}
