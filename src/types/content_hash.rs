// ABOUTME: Content hashing for files and directory trees.
// ABOUTME: Deterministic walk order makes hashes reproducible across runs.

use std::fmt;
use std::io;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Hex sha256 digest identifying a file or a directory tree.
///
/// Directory hashes cover, for every entry in deterministic walk order, its
/// relative path, size, permission mode and (for files) raw bytes. Identical
/// trees therefore produce identical hashes across separate runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

#[derive(Serialize)]
struct HashEntry<'a> {
    rel_path: &'a str,
    size: u64,
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a [u8]>,
}

impl ContentHash {
    /// Hash the raw bytes of a single file.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::of_bytes(&data))
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(digest))
    }

    /// Hash a directory tree.
    pub fn of_dir(dir: &Path) -> io::Result<Self> {
        let mut hasher = Sha256::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            let rel_path = entry
                .path()
                .strip_prefix(dir)
                .map_err(io::Error::other)?
                .to_string_lossy()
                .into_owned();

            // The root directory itself carries no information.
            if rel_path.is_empty() {
                continue;
            }

            let meta = entry.metadata().map_err(io::Error::other)?;
            let content = if meta.is_file() {
                Some(std::fs::read(entry.path())?)
            } else {
                None
            };

            let record = HashEntry {
                rel_path: &rel_path,
                size: meta.len(),
                mode: entry_mode(&meta),
                content: content.as_deref(),
            };

            let encoded = serde_json::to_vec(&record).map_err(io::Error::other)?;
            hasher.update(&encoded);
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(unix)]
fn entry_mode(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode())
}

#[cfg(not(unix))]
fn entry_mode(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "ro".to_string()
    } else {
        "rw".to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
