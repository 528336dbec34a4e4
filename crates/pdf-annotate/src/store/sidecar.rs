//! Sidecar persistence for annotation collections
//!
//! Each document's annotations live outside the PDF, one JSON collection per
//! kind. [`JsonSidecar`] keeps them on disk in a folder named after a hash of
//! the file key; [`MemorySidecar`] keeps them in memory.

use crate::types::FileKey;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Sidecar storage unavailable: {0}")]
    Unavailable(String),
}

pub type SidecarResult<T> = std::result::Result<T, SidecarError>;

/// The persisted annotation collections of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidecarKind {
    Bookmarks,
    StickyNotes,
    Highlights,
    Underlines,
}

impl SidecarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SidecarKind::Bookmarks => "bookmarks",
            SidecarKind::StickyNotes => "stickynotes",
            SidecarKind::Highlights => "highlights",
            SidecarKind::Underlines => "underlines",
        }
    }
}

impl fmt::Display for SidecarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable storage for annotation collections, external to the PDF file.
///
/// `read` returns `Ok(None)` when nothing has been stored yet.
pub trait SidecarStorage: Send + Sync {
    fn read(
        &self,
        key: &FileKey,
        kind: SidecarKind,
    ) -> impl Future<Output = SidecarResult<Option<Value>>> + Send;

    fn write(
        &self,
        key: &FileKey,
        kind: SidecarKind,
        collection: &Value,
    ) -> impl Future<Output = SidecarResult<()>> + Send;
}

/// JSON files on disk: `<root>/<sha256(file key)>/<kind>.json`
#[derive(Debug, Clone)]
pub struct JsonSidecar {
    root: PathBuf,
}

impl JsonSidecar {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every collection of one document
    pub fn document_dir(&self, key: &FileKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.root.join(hex::encode(digest))
    }

    pub fn collection_path(&self, key: &FileKey, kind: SidecarKind) -> PathBuf {
        self.document_dir(key).join(format!("{}.json", kind.as_str()))
    }
}

impl SidecarStorage for JsonSidecar {
    async fn read(&self, key: &FileKey, kind: SidecarKind) -> SidecarResult<Option<Value>> {
        let path = self.collection_path(key, kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write(
        &self,
        key: &FileKey,
        kind: SidecarKind,
        collection: &Value,
    ) -> SidecarResult<()> {
        let dir = self.document_dir(key);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(collection)?;
        let path = self.collection_path(key, kind);
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

/// In-process storage, also able to simulate an unreachable backend
#[derive(Debug, Default)]
pub struct MemorySidecar {
    entries: Mutex<HashMap<(FileKey, SidecarKind), Value>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySidecar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sidecar whose every read and write fails
    pub fn unavailable() -> Self {
        let sidecar = Self::default();
        sidecar.set_available(false);
        sidecar
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Seed a stored collection
    pub fn insert(&self, key: &FileKey, kind: SidecarKind, value: Value) {
        self.lock().insert((key.clone(), kind), value);
    }

    pub fn get(&self, key: &FileKey, kind: SidecarKind) -> Option<Value> {
        self.lock().get(&(key.clone(), kind)).cloned()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(FileKey, SidecarKind), Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> SidecarResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SidecarError::Unavailable("memory sidecar offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SidecarStorage for MemorySidecar {
    async fn read(&self, key: &FileKey, kind: SidecarKind) -> SidecarResult<Option<Value>> {
        self.check_available()?;
        Ok(self.get(key, kind))
    }

    async fn write(
        &self,
        key: &FileKey,
        kind: SidecarKind,
        collection: &Value,
    ) -> SidecarResult<()> {
        self.check_available()?;
        self.insert(key, kind, collection.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
