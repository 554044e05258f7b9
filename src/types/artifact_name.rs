// ABOUTME: Content-addressed artifact names of the form "<prefix>-<hash>".
// ABOUTME: A pure function of content, so re-runs address identical artifacts.

use std::fmt;

use super::ContentHash;

/// Name of a remote artifact, derived purely from its input content.
///
/// Re-running the same orchestration against unchanged inputs requests the
/// same name, which lets an existence check replace a real upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn new(prefix: &str, hash: &ContentHash) -> Self {
        Self(format!("{}-{}", prefix, hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The artifact URL used inside rendered documents.
    pub fn artifact_url(&self) -> String {
        format!("artifact://{}", self.0)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
