// crates/spec-desk-cli/src/storage.rs
// ============================================================================
// Module: Spec Desk Filesystem Storage
// Description: Filesystem-backed artifact store for CLI runs.
// Purpose: Map storage keys onto files under a local root directory.
// Dependencies: spec-desk-core, serde_json
// ============================================================================

//! ## Overview
//! The CLI owns the filesystem implementation of the storage seam. Keys map
//! to paths under a configured root; parent directories are created on
//! write. Reads of absent keys yield `None`, and malformed JSON fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::StorageKey;

// ============================================================================
// SECTION: Filesystem Store
// ============================================================================

/// Filesystem-backed artifact store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    /// Root directory all keys resolve under.
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Maps a storage key onto its filesystem path.
    fn path_for(&self, key: &StorageKey) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.as_str().split('/') {
            path.push(segment);
        }
        path
    }

    /// Creates the parent directory of a target path when absent.
    fn ensure_parent(path: &Path) -> Result<(), ArtifactStoreError> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn resolve_output_key(&self, parts: &[&str]) -> StorageKey {
        StorageKey::join(parts)
    }

    fn read_json_or_null(
        &self,
        key: &StorageKey,
    ) -> Result<Option<serde_json::Value>, ArtifactStoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text =
            fs::read_to_string(&path).map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        serde_json::from_str(&text).map(Some).map_err(|err| ArtifactStoreError::Invalid {
            key: key.as_str().to_string(),
            message: err.to_string(),
        })
    }

    fn read_text_or_null(&self, key: &StorageKey) -> Result<Option<String>, ArtifactStoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|err| ArtifactStoreError::Io(err.to_string()))
    }

    fn write_object(
        &self,
        key: &StorageKey,
        body: &serde_json::Value,
        _content_type: Option<&str>,
    ) -> Result<(), ArtifactStoreError> {
        let path = self.path_for(key);
        Self::ensure_parent(&path)?;
        let text =
            serde_json::to_string_pretty(body).map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        fs::write(&path, text).map_err(|err| ArtifactStoreError::Io(err.to_string()))
    }

    fn append_text(&self, key: &StorageKey, text: &str) -> Result<(), ArtifactStoreError> {
        let path = self.path_for(key);
        Self::ensure_parent(&path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        file.write_all(text.as_bytes()).map_err(|err| ArtifactStoreError::Io(err.to_string()))
    }

    fn list_keys(&self, prefix: &StorageKey) -> Result<Vec<StorageKey>, ArtifactStoreError> {
        let mut keys = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let entry = entry.map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|component| component.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(prefix.as_str()) {
                        keys.push(StorageKey::new(key));
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
