// ABOUTME: Content fileserver deployment with an incremental skip detector.
// ABOUTME: Unchanged content and config hashes skip the upload and deploy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::retry::{RetryPolicy, with_retry};
use crate::store::{ArtifactStore, FileEntry};
use crate::types::ContentHash;

use super::{DeployError, PackageDeployer};

pub const FILESERVER_PACKAGE: &str = "fileserver";
const CONTENT_ARTIFACT: &str = "fileserver-content";
const CONFIG_ARTIFACT: &str = "fileserver-nginx-conf";

/// Staging directory name, fixed because the package references it by name.
const UPLOAD_DIR: &str = "upload-content";

/// Hashes of the currently deployed fileserver state, `None` when a piece
/// has never been deployed or could not be retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousState {
    pub content_hash: Option<ContentHash>,
    pub config_hash: Option<ContentHash>,
}

/// Serves build outputs (pre-state files and the like) over HTTP inside the
/// enclave. Deployment is incremental: when both the content tree and the
/// server config hash to what is already deployed, nothing happens.
pub struct FileServer {
    base_dir: PathBuf,
    dry_run: bool,
    retry: RetryPolicy,
    store: Arc<dyn ArtifactStore>,
    deployer: Arc<dyn PackageDeployer>,
}

impl FileServer {
    pub fn new(
        base_dir: &Path,
        dry_run: bool,
        retry: RetryPolicy,
        store: Arc<dyn ArtifactStore>,
        deployer: Arc<dyn PackageDeployer>,
    ) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            dry_run,
            retry,
            store,
            deployer,
        }
    }

    /// URL a path will be served from once deployed.
    pub fn url(parts: &[&str]) -> String {
        format!("http://{}/{}", FILESERVER_PACKAGE, parts.join("/"))
    }

    fn package_dir(&self) -> PathBuf {
        self.base_dir.join(FILESERVER_PACKAGE)
    }

    fn config_dir(&self) -> PathBuf {
        self.package_dir().join("static_files").join("nginx")
    }

    /// Fetch and hash the currently deployed content and config artifacts.
    ///
    /// Both downloads run concurrently; a missing or unreadable artifact
    /// yields `None` for that piece, which forces a redeploy.
    pub async fn previous_state(&self) -> PreviousState {
        let content = tokio::spawn(fetch_hash(
            self.store.clone(),
            self.retry,
            CONTENT_ARTIFACT.to_string(),
        ));
        let config = tokio::spawn(fetch_hash(
            self.store.clone(),
            self.retry,
            CONFIG_ARTIFACT.to_string(),
        ));

        PreviousState {
            content_hash: content.await.unwrap_or(None),
            config_hash: config.await.unwrap_or(None),
        }
    }

    /// Deploy `source_dir` as the fileserver content if anything changed.
    ///
    /// Returns whether a deploy actually happened. An empty or missing source
    /// directory deploys nothing.
    pub async fn deploy(
        &self,
        source_dir: &Path,
        previous: &PreviousState,
    ) -> Result<bool, DeployError> {
        if !has_entries(source_dir)? {
            tracing::debug!(source = %source_dir.display(), "no fileserver content, skipping");
            return Ok(false);
        }

        let content_hash = ContentHash::of_dir(source_dir)?;
        let config_dir = self.config_dir();
        let config_hash = if config_dir.is_dir() {
            Some(ContentHash::of_dir(&config_dir)?)
        } else {
            None
        };

        if previous.content_hash.as_ref() == Some(&content_hash)
            && previous.config_hash == config_hash
        {
            tracing::info!("fileserver content unchanged, skipping deploy");
            return Ok(false);
        }

        if self.dry_run {
            tracing::info!("dry run: skipping fileserver deploy");
            return Ok(true);
        }

        let staging = self.package_dir().join(UPLOAD_DIR);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        copy_dir(source_dir, &staging)?;

        self.upload(CONTENT_ARTIFACT, &staging).await?;
        if config_dir.is_dir() {
            self.upload(CONFIG_ARTIFACT, &config_dir).await?;
        }

        let input = format!("source_path: {}\n", UPLOAD_DIR);
        self.deployer.deploy(FILESERVER_PACKAGE, &input).await?;
        Ok(true)
    }

    async fn upload(&self, name: &str, dir: &Path) -> Result<(), DeployError> {
        let files = FileEntry::from_dir(dir).map_err(|e| DeployError::Store(e.to_string()))?;
        let operation = format!("put-artifact({})", name);
        with_retry(self.retry, &operation, || {
            self.store.put_artifact(name, files.clone())
        })
        .await
        .map_err(|e| DeployError::Store(e.to_string()))?;
        Ok(())
    }
}

async fn fetch_hash(
    store: Arc<dyn ArtifactStore>,
    retry: RetryPolicy,
    name: String,
) -> Option<ContentHash> {
    let archive = match with_retry(retry, &format!("get-artifact({})", name), || {
        store.get_artifact(&name)
    })
    .await
    {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!(name, "no previous artifact: {}", e);
            return None;
        }
    };

    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(name, "failed to create temp dir: {}", e);
            return None;
        }
    };
    if let Err(e) = archive.unpack_to(dir.path()) {
        tracing::warn!(name, "failed to unpack previous artifact: {}", e);
        return None;
    }

    match ContentHash::of_dir(dir.path()) {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(name, "failed to hash previous artifact: {}", e);
            None
        }
    }
}

fn has_entries(dir: &Path) -> Result<bool, DeployError> {
    if !dir.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(dir)?.next().is_some())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), DeployError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| DeployError::Io(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| DeployError::Io(e.to_string()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
