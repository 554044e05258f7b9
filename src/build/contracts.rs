// ABOUTME: Content-addressed contract bundle build and upload.
// ABOUTME: Idempotent across runs: an existing remote artifact skips the upload.

use std::path::Path;
use std::sync::Arc;

use minijinja::{Environment, context};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::command::CommandRunner;
use crate::config::{RELATIVE_CONTRACTS_PATH, RendererConfig};
use crate::retry::with_retry;
use crate::store::{ArtifactStore, FileEntry};
use crate::types::{ArtifactName, ContentHash};

use super::BuildError;

/// Subdirectory of the contracts package holding build outputs.
const FORGE_ARTIFACTS_DIR: &str = "forge-artifacts";

/// Artifact URL returned in dry-run mode.
pub const DRY_RUN_CONTRACTS_URL: &str = "artifact://contracts";

/// Builds the contract bundle and uploads it under a content-derived name.
///
/// The bundle identity comes from the solidity build-cache manifest, so an
/// unchanged package re-requests the same artifact name and the pre-upload
/// existence check replaces the upload entirely.
pub struct ContractBuilder {
    config: RendererConfig,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ArtifactStore>,
    // Render-scoped cache: the bundle is built at most once per render.
    built: Mutex<Option<String>>,
}

impl ContractBuilder {
    pub fn new(
        config: RendererConfig,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            config,
            runner,
            store,
            built: Mutex::new(None),
        }
    }

    /// Content-derived artifact name, computable before any build runs.
    pub fn artifact_name(&self) -> Result<ArtifactName, BuildError> {
        let cache_file = self.config.solidity_cache_file();
        let hash = ContentHash::of_file(&cache_file).map_err(|e| {
            BuildError::MissingInput(format!(
                "solidity cache file {}: {}",
                cache_file.display(),
                e
            ))
        })?;
        Ok(ArtifactName::new("contracts", &hash))
    }

    /// The deterministic identifier handed out before the build finishes.
    pub fn artifact_url(&self) -> Result<String, BuildError> {
        if self.config.dry_run {
            return Ok(DRY_RUN_CONTRACTS_URL.to_string());
        }
        Ok(self.artifact_name()?.artifact_url())
    }

    /// Build the bundle, stage the non-test outputs, and upload them.
    pub async fn build(&self) -> Result<String, BuildError> {
        // Layer is ignored for identity purposes: the bundle is the same
        // file regardless of which layer referenced it.
        if let Some(url) = self.built.lock().clone() {
            return Ok(url);
        }

        if self.config.dry_run {
            return Ok(DRY_RUN_CONTRACTS_URL.to_string());
        }

        tracing::info!("building contracts bundle");

        let command = Environment::new()
            .render_str(
                &self.config.contracts_cmd_template,
                context! { contracts_path => RELATIVE_CONTRACTS_PATH },
            )
            .map_err(|e| BuildError::CommandTemplate(e.to_string()))?;

        let output = self.runner.run(&command, &self.config.base_dir).await?;
        if !output.success() {
            return Err(BuildError::CommandFailed {
                job: "contracts".to_string(),
                status: output.status,
                output: output.combined(),
            });
        }

        let name = self.upload_artifact().await?;
        let url = name.artifact_url();
        *self.built.lock() = Some(url.clone());
        Ok(url)
    }

    async fn upload_artifact(&self) -> Result<ArtifactName, BuildError> {
        let name = self.artifact_name()?;

        // Existence check makes the upload idempotent across separate runs.
        match with_retry(self.config.retry, "list-artifact-names", || {
            self.store.list_artifact_names()
        })
        .await
        {
            Ok(names) => {
                if names.iter().any(|n| n == name.as_str()) {
                    tracing::info!(%name, "artifact already exists, skipping upload");
                    return Ok(name);
                }
            }
            Err(e) => {
                tracing::warn!("failed to retrieve artifact names: {}", e);
            }
        }

        let contracts_dir = self.config.contracts_dir();
        if !contracts_dir.is_dir() {
            return Err(BuildError::MissingInput(format!(
                "contracts directory not found at {}",
                contracts_dir.display()
            )));
        }

        let staging = tempfile::tempdir().map_err(|e| BuildError::Io(e.to_string()))?;
        stage_outputs(&contracts_dir, staging.path())?;

        let files =
            FileEntry::from_dir(staging.path()).map_err(|e| BuildError::Store(e.to_string()))?;

        let operation = format!("put-artifact({})", name);
        with_retry(self.config.retry, &operation, || {
            self.store.put_artifact(name.as_str(), files.clone())
        })
        .await
        .map_err(|e| BuildError::Store(e.to_string()))?;

        Ok(name)
    }
}

/// Copy the non-test build outputs into the staging directory.
///
/// Test artifact directories (`*.t.sol`) are excluded; the deployer only
/// needs contracts and scripts.
fn stage_outputs(contracts_dir: &Path, staging: &Path) -> Result<(), BuildError> {
    let forge_artifacts = contracts_dir.join(FORGE_ARTIFACTS_DIR);
    if !forge_artifacts.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(&forge_artifacts)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if dir_name.ends_with(".t.sol") {
            continue;
        }

        copy_tree(&entry.path(), &staging.join(&dir_name))?;
    }

    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), BuildError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| BuildError::Io(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BuildError::Io(e.to_string()))?;
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
