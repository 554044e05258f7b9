// ABOUTME: External build command execution behind an async trait.
// ABOUTME: ShellRunner runs `sh -c` via tokio::process and captures output.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),

    #[error("failed to read command output: {0}")]
    Io(String),
}

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, or -1 when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout followed by stderr, for attaching to diagnostics.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Executes a shell command in a working directory.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, dir: &Path) -> Result<CommandOutput, CommandError>;
}

/// Default runner: `sh -c <command>`.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, dir: &Path) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command, dir = %dir.display(), "executing build command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CommandError::Spawn(e.to_string()))?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
