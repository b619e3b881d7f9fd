//! Subprocess command runner
//!
//! Runs a [`CommandSpec`] with `tokio::process`, capturing stdout and
//! stderr. Environment entries of the command are added to the child only.

use std::process::Stdio;

use anyhow::{Context, Result};
use syncward_core::ports::{CommandOutput, CommandSpec, ICommandRunner};
use tokio::process::Command;
use tracing::debug;

/// [`ICommandRunner`] spawning real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ICommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        debug!(program = %command.program, args = command.args.len(), "Spawning process");

        let output = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", command.program))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
