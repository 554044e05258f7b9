// ABOUTME: Package deployment: the deployer seam and the content fileserver.
// ABOUTME: CommandPackageDeployer shells out to the orchestration CLI.

mod fileserver;

pub use fileserver::{FileServer, PreviousState};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use minijinja::{Environment, context};
use thiserror::Error;

use crate::command::{CommandError, CommandRunner};

/// Command used to deploy a package into the target enclave.
pub const DEFAULT_DEPLOY_CMD_TEMPLATE: &str =
    "kurtosis run {{ package }} --enclave {{ enclave }} --args-file {{ args_file }}";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to render deploy command template: {0}")]
    CommandTemplate(String),

    #[error("deploy of {package} exited with status {status}\nOutput: {output}")]
    DeployFailed {
        package: String,
        status: i32,
        output: String,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("artifact store error: {0}")]
    Store(String),

    #[error("deploy I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        DeployError::Io(err.to_string())
    }
}

/// Deploys a named package with a YAML argument document.
#[async_trait]
pub trait PackageDeployer: Send + Sync {
    async fn deploy(&self, package: &str, input: &str) -> Result<(), DeployError>;
}

/// Deployer that shells out to the orchestration CLI.
///
/// The argument document is written to a temporary file and passed to the
/// command by path.
pub struct CommandPackageDeployer {
    runner: Arc<dyn CommandRunner>,
    base_dir: PathBuf,
    enclave: String,
    cmd_template: String,
}

impl CommandPackageDeployer {
    pub fn new(runner: Arc<dyn CommandRunner>, base_dir: &Path, enclave: &str) -> Self {
        Self {
            runner,
            base_dir: base_dir.to_path_buf(),
            enclave: enclave.to_string(),
            cmd_template: DEFAULT_DEPLOY_CMD_TEMPLATE.to_string(),
        }
    }

    pub fn with_cmd_template(mut self, template: &str) -> Self {
        self.cmd_template = template.to_string();
        self
    }
}

#[async_trait]
impl PackageDeployer for CommandPackageDeployer {
    async fn deploy(&self, package: &str, input: &str) -> Result<(), DeployError> {
        let args_file = tempfile::NamedTempFile::new()?;
        std::fs::write(args_file.path(), input)?;

        let command = Environment::new()
            .render_str(
                &self.cmd_template,
                context! {
                    package,
                    enclave => self.enclave.as_str(),
                    args_file => args_file.path().display().to_string(),
                },
            )
            .map_err(|e| DeployError::CommandTemplate(e.to_string()))?;

        tracing::info!(package, enclave = %self.enclave, "deploying package");
        let output = self.runner.run(&command, &self.base_dir).await?;
        if !output.success() {
            return Err(DeployError::DeployFailed {
                package: package.to_string(),
                status: output.status,
                output: output.combined(),
            });
        }

        tracing::info!(package, "package deployed");
        Ok(())
    }
}
