// ABOUTME: Error types for artifact store operations.
// ABOUTME: Covers missing artifacts, archive encoding, and transport failures.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("store I/O error: {0}")]
    Io(String),

    #[error("remote store error: {0}")]
    Remote(String),
}
