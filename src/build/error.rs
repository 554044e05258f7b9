// ABOUTME: Error types for build actions.
// ABOUTME: Clone-able so cached job failures reach every waiter identically.

use thiserror::Error;

use crate::command::CommandError;

/// Errors from build actions. Results are cached per job key, so variants
/// carry owned strings and the whole type is `Clone`.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("failed to render command template: {0}")]
    CommandTemplate(String),

    #[error("build command for {job} exited with status {status}\nOutput: {output}")]
    CommandFailed {
        job: String,
        status: i32,
        output: String,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("container engine error: {message}\nBuild output: {build_output}")]
    Engine {
        message: String,
        build_output: String,
    },

    #[error("artifact store error: {0}")]
    Store(String),

    #[error("missing build input: {0}")]
    MissingInput(String),

    #[error("build I/O error: {0}")]
    Io(String),

    #[error("internal build error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::Io(err.to_string())
    }
}
