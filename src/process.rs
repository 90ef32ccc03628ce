//! The subprocess launcher the execution engine runs rendered test
//! commands through. Grounded on the `tokio::process::Command`-based
//! job execution in `cip999-limmat/src/test.rs` (captured stdout/
//! stderr), adapted from an async Job/Worker pattern down to a single
//! blocking-from-the-engine's-perspective call per §5 ("subprocess
//! launch + wait" is a blocking suspension point).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubprocessError {
    #[error("failed to launch {command:?}: {message}")]
    LaunchFailed { command: String, message: String },
}

pub type Result<T> = std::result::Result<T, SubprocessError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait::async_trait]
pub trait SubprocessLauncher: Send + Sync {
    async fn run(&self, command: &str) -> Result<ProcessOutput>;
}

/// Runs `command` through `sh -c`, the way a rendered runner string
/// (e.g. `curl -X GET '...'`) is meant to be interpreted.
pub struct ShellLauncher;

#[async_trait::async_trait]
impl SubprocessLauncher for ShellLauncher {
    async fn run(&self, command: &str) -> Result<ProcessOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| SubprocessError::LaunchFailed {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
