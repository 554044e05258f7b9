// ABOUTME: Error types for template rendering.
// ABOUTME: Covers template lookup, data loading, build failures and output.

use std::path::PathBuf;

use thiserror::Error;

use crate::build::BuildError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("template is empty: {0}")]
    TemplateEmpty(PathBuf),

    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to load template data: {0}")]
    Data(String),

    #[error("build for {job} failed: {source}")]
    Build { job: String, source: BuildError },

    #[error("failed to canonicalize rendered output: {0}")]
    Canonicalize(String),
}
