// ABOUTME: Core domain newtypes shared across the crate.
// ABOUTME: Project names, content hashes, and content-addressed artifact names.

mod artifact_name;
mod content_hash;
mod project_name;

pub use artifact_name::ArtifactName;
pub use content_hash::ContentHash;
pub use project_name::{ProjectName, ProjectNameError};
