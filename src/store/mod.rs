// ABOUTME: Content-addressed artifact store abstraction and implementations.
// ABOUTME: Artifacts are named tar archives of staged file trees.

mod archive;
mod error;

pub use archive::{Archive, FileEntry};
pub use error::StoreError;

use std::path::PathBuf;

use async_trait::async_trait;

/// Remote blob store keyed by artifact name.
///
/// The orchestrator never locks the store; idempotency comes from
/// content-addressed names plus pre-upload existence checks. Call sites wrap
/// every operation in the retry policy because the remote side is known to
/// fail transiently.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn list_artifact_names(&self) -> Result<Vec<String>, StoreError>;

    async fn get_artifact(&self, name: &str) -> Result<Archive, StoreError>;

    async fn put_artifact(&self, name: &str, files: Vec<FileEntry>) -> Result<(), StoreError>;
}

/// Store backed by a local directory of `<name>.tar` files.
///
/// The default implementation for local runs; remote deployments plug their
/// own client in behind the trait.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.tar", name))
    }
}

#[async_trait]
impl ArtifactStore for DirStore {
    async fn list_artifact_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            // A store that was never written to has no artifacts.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tar")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn get_artifact(&self, name: &str) -> Result<Archive, StoreError> {
        let path = self.artifact_path(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Archive::from_bytes(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn put_artifact(&self, name: &str, files: Vec<FileEntry>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::Io(e.to_string()))?;

        let archive = Archive::from_entries(files)?;
        let path = self.artifact_path(name);

        // Write-then-rename so a concurrent reader never sees a torn archive.
        let tmp = self.root.join(format!(".{}.tar.tmp", name));
        std::fs::write(&tmp, archive.as_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(name, path = %path.display(), "stored artifact");
        Ok(())
    }
}
