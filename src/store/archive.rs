// ABOUTME: Tar archive wrapper for artifact upload and download.
// ABOUTME: Supports full unpack and selective extraction by relative path.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;

use walkdir::WalkDir;

use super::StoreError;

/// One file inside an artifact, addressed by its path relative to the
/// artifact root.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub rel_path: String,
    pub data: Vec<u8>,
    pub mode: u32,
}

impl FileEntry {
    pub fn from_bytes(rel_path: &str, data: Vec<u8>) -> Self {
        Self {
            rel_path: rel_path.to_string(),
            data,
            mode: 0o644,
        }
    }

    /// Collect every regular file under `dir` as an entry.
    pub fn from_dir(dir: &Path) -> Result<Vec<Self>, StoreError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| StoreError::Io(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let data =
                std::fs::read(entry.path()).map_err(|e| StoreError::Io(e.to_string()))?;

            entries.push(Self {
                rel_path,
                data,
                mode: entry_mode(&entry),
            });
        }

        Ok(entries)
    }
}

#[cfg(unix)]
fn entry_mode(entry: &walkdir::DirEntry) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    entry
        .metadata()
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn entry_mode(_entry: &walkdir::DirEntry) -> u32 {
    0o644
}

/// An artifact downloaded from (or staged for) the store, as tar bytes.
pub struct Archive {
    bytes: Vec<u8>,
}

impl Archive {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_entries(files: Vec<FileEntry>) -> Result<Self, StoreError> {
        let mut builder = tar::Builder::new(Vec::new());

        for file in &files {
            let mut header = tar::Header::new_gnu();
            header.set_size(file.data.len() as u64);
            header.set_mode(file.mode);
            header.set_cksum();
            builder
                .append_data(&mut header, &file.rel_path, file.data.as_slice())
                .map_err(|e| StoreError::Archive(e.to_string()))?;
        }

        let bytes = builder
            .into_inner()
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unpack the whole archive under `dir`.
    pub fn unpack_to(&self, dir: &Path) -> Result<(), StoreError> {
        let mut archive = tar::Archive::new(Cursor::new(&self.bytes));
        archive
            .unpack(dir)
            .map_err(|e| StoreError::Archive(e.to_string()))
    }

    /// Extract only the entries whose relative path has a registered writer.
    ///
    /// Every requested path must be present in the archive.
    pub fn extract_selected(
        &self,
        targets: &mut HashMap<String, Box<dyn Write + Send>>,
    ) -> Result<(), StoreError> {
        let mut archive = tar::Archive::new(Cursor::new(&self.bytes));
        let mut remaining: Vec<String> = targets.keys().cloned().collect();

        for entry in archive
            .entries()
            .map_err(|e| StoreError::Archive(e.to_string()))?
        {
            let mut entry = entry.map_err(|e| StoreError::Archive(e.to_string()))?;
            let path = entry
                .path()
                .map_err(|e| StoreError::Archive(e.to_string()))?
                .to_string_lossy()
                .into_owned();

            if let Some(writer) = targets.get_mut(&path) {
                std::io::copy(&mut entry, writer)
                    .map_err(|e| StoreError::Archive(e.to_string()))?;
                remaining.retain(|p| p != &path);
            }
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Archive(format!(
                "archive is missing requested entries: {}",
                remaining.join(", ")
            )))
        }
    }

}
