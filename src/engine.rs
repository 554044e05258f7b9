// ABOUTME: Container engine client used after a successful image build.
// ABOUTME: Inspects the built image digest and re-tags it with a short id.

use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::TagImageOptions;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("failed to connect to container engine: {0}")]
    Connection(String),

    #[error("failed to inspect image {reference}: {message}")]
    Inspect { reference: String, message: String },

    #[error("failed to tag image {source_ref} as {target_ref}: {message}")]
    Tag {
        source_ref: String,
        target_ref: String,
        message: String,
    },
}

/// Minimal engine surface the build pipeline needs: inspect and re-tag.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Content digest of a local image (e.g. `sha256:abc...`).
    async fn inspect_image(&self, reference: &str) -> Result<String, EngineError>;

    async fn tag_image(&self, source: &str, target: &str) -> Result<(), EngineError>;
}

/// Engine client backed by the local Docker-compatible daemon.
pub struct BollardEngine {
    client: Docker,
}

impl BollardEngine {
    /// Connect using the standard environment/socket discovery.
    pub fn connect() -> Result<Self, EngineError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContainerEngine for BollardEngine {
    async fn inspect_image(&self, reference: &str) -> Result<String, EngineError> {
        let inspect = self
            .client
            .inspect_image(reference)
            .await
            .map_err(|e| EngineError::Inspect {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        inspect.id.ok_or_else(|| EngineError::Inspect {
            reference: reference.to_string(),
            message: "image has no id".to_string(),
        })
    }

    async fn tag_image(&self, source: &str, target: &str) -> Result<(), EngineError> {
        let (repo, tag) = target.rsplit_once(':').unwrap_or((target, "latest"));

        let opts = TagImageOptions {
            repo: Some(repo.to_string()),
            tag: Some(tag.to_string()),
        };

        self.client
            .tag_image(source, Some(opts))
            .await
            .map_err(|e| EngineError::Tag {
                source_ref: source.to_string(),
                target_ref: target.to_string(),
                message: e.to_string(),
            })
    }
}

/// Shorten an image digest to the fixed-length id used in final tags.
pub fn truncate_digest(digest: &str) -> String {
    let short = digest.strip_prefix("sha256:").unwrap_or(digest);
    short.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_prefixed_digest() {
        let digest = "sha256:2f4a6b9d8c1e0f3a5b7c9d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a";
        assert_eq!(truncate_digest(digest), "2f4a6b9d8c1e");
    }

    #[test]
    fn leaves_short_ids_alone() {
        assert_eq!(truncate_digest("abc123"), "abc123");
    }
}
