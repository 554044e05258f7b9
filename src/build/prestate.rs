// ABOUTME: Proof pre-state build: run, then content-address the outputs.
// ABOUTME: Proof files carry their own hash; outputs are renamed to match it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};

use crate::command::CommandRunner;
use crate::config::RendererConfig;

use super::BuildError;

/// URL path under which pre-state files are served.
pub const PRESTATE_URL_PATH: &[&str] = &["proofs", "op-program", "cannon"];

/// Hash value handed out before the build finishes (and in dry-run mode).
pub const PLACEHOLDER_HASH: &str = "dry_run_placeholder";

/// Pre-state flavors expected from the build.
const PRESTATE_FLAVORS: &[&str] = &["mt64", "interop"];

const PROOF_PREFIX: &str = "prestate-";
const PROOF_SUFFIX: &str = ".json";
const BINARY_SUFFIX: &str = ".bin.gz";

/// Resolved pre-state information: where the files are served from and the
/// content hash of each flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestateInfo {
    pub url: String,
    pub hashes: BTreeMap<String, String>,
}

/// Embedded fields of a proof file we care about.
#[derive(Deserialize)]
struct ProofFile {
    pre: String,
}

/// Builds proof pre-state files into an output directory and renames both
/// the proof file and its companion binary to hash-derived names, so the
/// final filenames are themselves content-addressed.
pub struct PrestateBuilder {
    config: RendererConfig,
    runner: Arc<dyn CommandRunner>,
}

impl PrestateBuilder {
    pub fn new(config: RendererConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Placeholder returned while the build is pending or in dry-run mode.
    pub fn placeholder(url: String) -> PrestateInfo {
        let hashes = PRESTATE_FLAVORS
            .iter()
            .map(|flavor| (hash_key(flavor), PLACEHOLDER_HASH.to_string()))
            .collect();
        PrestateInfo { url, hashes }
    }

    pub async fn build(&self, output_dir: &Path, url: String) -> Result<PrestateInfo, BuildError> {
        if self.config.dry_run {
            tracing::info!("dry run: skipping prestate build");
            return Ok(Self::placeholder(url));
        }

        tracing::info!(output_dir = %output_dir.display(), "prestate build started");
        std::fs::create_dir_all(output_dir)?;

        let command = Environment::new()
            .render_str(
                &self.config.prestate_cmd_template,
                context! { build_dir => output_dir.display().to_string() },
            )
            .map_err(|e| BuildError::CommandTemplate(e.to_string()))?;

        let output = self.runner.run(&command, &self.config.base_dir).await?;
        if !output.success() {
            return Err(BuildError::CommandFailed {
                job: "prestate".to_string(),
                status: output.status,
                output: output.combined(),
            });
        }

        let hashes = collect_and_rename(output_dir)?;
        if hashes.is_empty() {
            return Err(BuildError::MissingInput(format!(
                "no prestate proof files produced in {}",
                output_dir.display()
            )));
        }

        tracing::info!(count = hashes.len(), "prestate build succeeded");
        Ok(PrestateInfo { url, hashes })
    }
}

fn hash_key(flavor: &str) -> String {
    format!("prestate_{}", flavor.replace('-', "_"))
}

/// Locate `prestate-<flavor>.json` proof files, extract the embedded hash,
/// and rename each proof file plus its companion binary to `<hash>.*`.
fn collect_and_rename(dir: &Path) -> Result<BTreeMap<String, String>, BuildError> {
    let mut hashes = BTreeMap::new();

    let mut proofs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with(PROOF_PREFIX) && file_name.ends_with(PROOF_SUFFIX) {
            proofs.push(file_name);
        }
    }

    for proof_name in proofs {
        let flavor = proof_name
            .trim_start_matches(PROOF_PREFIX)
            .trim_end_matches(PROOF_SUFFIX)
            .to_string();

        let proof_path = dir.join(&proof_name);
        let data = std::fs::read(&proof_path)?;
        let proof: ProofFile = serde_json::from_slice(&data).map_err(|e| {
            BuildError::MissingInput(format!("invalid proof file {}: {}", proof_name, e))
        })?;

        let binary_name = format!("{}{}{}", PROOF_PREFIX, flavor, BINARY_SUFFIX);
        let binary_path = dir.join(&binary_name);
        if !binary_path.is_file() {
            return Err(BuildError::MissingInput(format!(
                "proof file {} has no companion binary {}",
                proof_name, binary_name
            )));
        }

        std::fs::rename(&proof_path, dir.join(format!("{}{}", proof.pre, PROOF_SUFFIX)))?;
        std::fs::rename(&binary_path, dir.join(format!("{}{}", proof.pre, BINARY_SUFFIX)))?;

        tracing::debug!(flavor, hash = %proof.pre, "renamed prestate outputs");
        hashes.insert(hash_key(&flavor), proof.pre);
    }

    Ok(hashes)
}
