// crates/spec-desk-core/src/interfaces/mod.rs
// ============================================================================
// Module: Spec Desk Interfaces
// Description: Backend-agnostic storage seam for artifacts and helper files.
// Purpose: Define the contract surfaces external backends implement.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The storage interface abstracts the object layout holding per-item
//! artifacts, helper files, intel reports, and trace buffers. Implementations
//! must be deterministic and fail closed on malformed data: a missing object
//! is `None`, a broken one is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Storage Keys
// ============================================================================

/// Canonical storage key: `/`-joined path segments.
///
/// # Invariants
/// - Segments never contain `/`; keys are joined at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Creates a key from preformed text.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Joins path segments into a key.
    #[must_use]
    pub fn join(parts: &[&str]) -> Self {
        Self(parts.join("/"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Artifact store errors.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Underlying storage I/O failed.
    #[error("artifact store io error: {0}")]
    Io(String),
    /// Stored object exists but is malformed.
    #[error("artifact store invalid object at {key}: {message}")]
    Invalid {
        /// Key of the malformed object.
        key: String,
        /// Parse failure description.
        message: String,
    },
}

/// Backend-agnostic artifact store.
///
/// Writes publish whole objects; appends extend text objects in place.
pub trait ArtifactStore {
    /// Resolves path segments into a storage key.
    fn resolve_output_key(&self, parts: &[&str]) -> StorageKey;

    /// Reads a JSON object, returning `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] on I/O failure or malformed JSON.
    fn read_json_or_null(
        &self,
        key: &StorageKey,
    ) -> Result<Option<serde_json::Value>, ArtifactStoreError>;

    /// Reads a text object, returning `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] on I/O failure.
    fn read_text_or_null(&self, key: &StorageKey) -> Result<Option<String>, ArtifactStoreError>;

    /// Writes a JSON object, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] on I/O failure.
    fn write_object(
        &self,
        key: &StorageKey,
        body: &serde_json::Value,
        content_type: Option<&str>,
    ) -> Result<(), ArtifactStoreError>;

    /// Appends text to an object, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] on I/O failure.
    fn append_text(&self, key: &StorageKey, text: &str) -> Result<(), ArtifactStoreError>;

    /// Lists keys under a prefix in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] on I/O failure.
    fn list_keys(&self, prefix: &StorageKey) -> Result<Vec<StorageKey>, ArtifactStoreError>;
}

// ============================================================================
// SECTION: In-Memory Artifact Store
// ============================================================================

/// In-memory artifact store for tests and local demos.
///
/// # Invariants
/// - Objects are stored as UTF-8 text; JSON objects serialize canonically.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactStore {
    /// Object map protected by a mutex.
    objects: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryArtifactStore {
    /// Creates a new in-memory artifact store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Returns a locked view of the object map.
    fn guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, ArtifactStoreError> {
        self.objects
            .lock()
            .map_err(|_| ArtifactStoreError::Io("artifact store mutex poisoned".to_string()))
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn resolve_output_key(&self, parts: &[&str]) -> StorageKey {
        StorageKey::join(parts)
    }

    fn read_json_or_null(
        &self,
        key: &StorageKey,
    ) -> Result<Option<serde_json::Value>, ArtifactStoreError> {
        let guard = self.guard()?;
        match guard.get(key.as_str()) {
            None => Ok(None),
            Some(text) => serde_json::from_str(text).map(Some).map_err(|err| {
                ArtifactStoreError::Invalid {
                    key: key.as_str().to_string(),
                    message: err.to_string(),
                }
            }),
        }
    }

    fn read_text_or_null(&self, key: &StorageKey) -> Result<Option<String>, ArtifactStoreError> {
        let guard = self.guard()?;
        Ok(guard.get(key.as_str()).cloned())
    }

    fn write_object(
        &self,
        key: &StorageKey,
        body: &serde_json::Value,
        _content_type: Option<&str>,
    ) -> Result<(), ArtifactStoreError> {
        let text = serde_json::to_string(body)
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        self.guard()?.insert(key.as_str().to_string(), text);
        Ok(())
    }

    fn append_text(&self, key: &StorageKey, text: &str) -> Result<(), ArtifactStoreError> {
        self.guard()?.entry(key.as_str().to_string()).or_default().push_str(text);
        Ok(())
    }

    fn list_keys(&self, prefix: &StorageKey) -> Result<Vec<StorageKey>, ArtifactStoreError> {
        let guard = self.guard()?;
        Ok(guard
            .keys()
            .filter(|key| key.starts_with(prefix.as_str()))
            .map(|key| StorageKey::new(key.clone()))
            .collect())
    }
}
