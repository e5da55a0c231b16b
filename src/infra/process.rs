//! Subprocess boundary for finalization commands.
//!
//! Commands are opaque: only success or failure matters. Output is captured
//! so a failing command can be reported with its stderr.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Runs external commands in a working directory.
pub trait CommandRunner
{
    /// Run `argv` (program first) in `cwd`; non-zero exit is an error.
    fn run(
        &self,
        argv: &[String],
        cwd: &Path,
    ) -> Result<()>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner
{
    fn run(
        &self,
        argv: &[String],
        cwd: &Path,
    ) -> Result<()>
    {
        let Some((program, args)) = argv.split_first()
        else
        {
            bail!("empty command");
        };

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn `{program}`"))?;

        if !output
            .status
            .success()
        {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}: {}",
                argv.join(" "),
                output.status,
                stderr.trim()
            );
        }

        tracing::debug!(command = %argv.join(" "), "command succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use tempfile::TempDir;

    use super::*;

    fn argv(parts: &[&str]) -> Vec<String>
    {
        parts
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn empty_command_is_rejected()
    {
        let tmp = TempDir::new().unwrap();
        assert!(
            SystemRunner
                .run(&[], tmp.path())
                .is_err()
        );
    }

    #[test]
    fn missing_program_is_an_error()
    {
        let tmp = TempDir::new().unwrap();
        let err = SystemRunner
            .run(&argv(&["reorg-no-such-program-xyz"]), tmp.path())
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("reorg-no-such-program-xyz")
        );
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_decides_success()
    {
        let tmp = TempDir::new().unwrap();
        assert!(
            SystemRunner
                .run(&argv(&["true"]), tmp.path())
                .is_ok()
        );
        assert!(
            SystemRunner
                .run(&argv(&["false"]), tmp.path())
                .is_err()
        );
    }
}
