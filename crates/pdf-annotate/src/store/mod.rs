//! Annotation store - the session's source of truth for annotations
//!
//! The store keeps every open document's collections in memory, keyed by
//! [`FileKey`], and writes each changed collection through to sidecar storage:
//! 1. `init_for_file` loads all four collections once per key; a mutation on
//!    an unloaded key loads it first
//! 2. reads return copies of the latest published snapshot
//! 3. mutations build a new snapshot, publish it, then persist the changed
//!    collection before returning

mod sidecar;

pub use sidecar::{
    JsonSidecar, MemorySidecar, SidecarError, SidecarKind, SidecarResult, SidecarStorage,
};

use crate::overlay::PageOverlay;
use crate::types::{Annotation, AnnotationKind, FileKey, StickyNote};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Every annotation collection of one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentAnnotations {
    pub bookmarks: BTreeSet<u32>,
    pub sticky_notes: Vec<StickyNote>,
    pub highlights: Vec<Annotation>,
    pub underlines: Vec<Annotation>,
}

impl DocumentAnnotations {
    /// Annotations of `kind` placed on `page`
    pub fn on_page(&self, kind: AnnotationKind, page: u32) -> Vec<Annotation> {
        match kind {
            AnnotationKind::Highlight => self
                .highlights
                .iter()
                .filter(|a| a.page == page && a.is_highlight())
                .cloned()
                .collect(),
            AnnotationKind::Underline => self
                .underlines
                .iter()
                .filter(|a| a.page == page)
                .cloned()
                .collect(),
        }
    }

    fn annotations_mut(&mut self, kind: AnnotationKind) -> &mut Vec<Annotation> {
        match kind {
            AnnotationKind::Highlight => &mut self.highlights,
            AnnotationKind::Underline => &mut self.underlines,
        }
    }

    fn annotations(&self, kind: AnnotationKind) -> &[Annotation] {
        match kind {
            AnnotationKind::Highlight => &self.highlights,
            AnnotationKind::Underline => &self.underlines,
        }
    }

    fn collection_value(&self, kind: SidecarKind) -> serde_json::Result<Value> {
        match kind {
            SidecarKind::Bookmarks => serde_json::to_value(&self.bookmarks),
            SidecarKind::StickyNotes => serde_json::to_value(&self.sticky_notes),
            SidecarKind::Highlights => serde_json::to_value(&self.highlights),
            SidecarKind::Underlines => serde_json::to_value(&self.underlines),
        }
    }
}

/// Result of a store mutation.
///
/// The in-memory change always takes effect. `persisted` reports whether the
/// write-through reached sidecar storage; callers that need durability can
/// check it before acknowledging the action.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub snapshot: Arc<DocumentAnnotations>,
    pub persisted: Result<(), SidecarError>,
}

impl<T> Mutation<T> {
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_ok()
    }
}

struct FileEntry {
    snapshot: RwLock<Arc<DocumentAnnotations>>,
    // Held from snapshot read to sidecar write, so same-key mutations never
    // interleave and writes land in mutation order.
    gate: tokio::sync::Mutex<()>,
}

impl FileEntry {
    fn new(annotations: DocumentAnnotations) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(annotations)),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<DocumentAnnotations> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    fn publish(&self, next: Arc<DocumentAnnotations>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Per-document annotation cache with write-through sidecar persistence
pub struct AnnotationStore<S> {
    sidecar: S,
    files: RwLock<HashMap<FileKey, Arc<FileEntry>>>,
    init_gate: tokio::sync::Mutex<()>,
}

impl<S: SidecarStorage> AnnotationStore<S> {
    pub fn new(sidecar: S) -> Self {
        Self {
            sidecar,
            files: RwLock::new(HashMap::new()),
            init_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn sidecar(&self) -> &S {
        &self.sidecar
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load every collection of `key` from the sidecar.
    ///
    /// A no-op when the key is already loaded. Missing, unreadable or
    /// malformed collections start out empty.
    pub async fn init_for_file(&self, key: &FileKey) -> Arc<DocumentAnnotations> {
        self.loaded_entry(key).await.current()
    }

    pub fn is_loaded(&self, key: &FileKey) -> bool {
        self.entry(key).is_some()
    }

    /// Drop the cached collections of a closed document
    pub fn close(&self, key: &FileKey) -> bool {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn file_keys(&self) -> Vec<FileKey> {
        let mut keys: Vec<FileKey> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// The latest published snapshot, if the key is loaded
    pub fn snapshot(&self, key: &FileKey) -> Option<Arc<DocumentAnnotations>> {
        self.entry(key).map(|entry| entry.current())
    }

    // =========================================================================
    // Bookmarks
    // =========================================================================

    /// Bookmarked pages in ascending order
    pub fn bookmarks(&self, key: &FileKey) -> Vec<u32> {
        self.read(key, |doc| doc.bookmarks.iter().copied().collect())
    }

    pub fn is_bookmarked(&self, key: &FileKey, page: u32) -> bool {
        self.read(key, |doc| doc.bookmarks.contains(&page))
    }

    /// Returns whether the page was newly added
    pub async fn add_bookmark(&self, key: &FileKey, page: u32) -> Mutation<bool> {
        self.mutate(key, SidecarKind::Bookmarks, |doc| doc.bookmarks.insert(page))
            .await
    }

    /// Returns whether the page was bookmarked
    pub async fn remove_bookmark(&self, key: &FileKey, page: u32) -> Mutation<bool> {
        self.mutate(key, SidecarKind::Bookmarks, |doc| doc.bookmarks.remove(&page))
            .await
    }

    /// Remove the page if bookmarked, otherwise add it.
    ///
    /// Returns `true` when the page is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, key: &FileKey, page: u32) -> Mutation<bool> {
        self.mutate(key, SidecarKind::Bookmarks, |doc| {
            if doc.bookmarks.remove(&page) {
                false
            } else {
                doc.bookmarks.insert(page);
                true
            }
        })
        .await
    }

    pub async fn replace_bookmarks(
        &self,
        key: &FileKey,
        pages: impl IntoIterator<Item = u32>,
    ) -> Mutation<()> {
        let pages: BTreeSet<u32> = pages.into_iter().collect();
        self.mutate(key, SidecarKind::Bookmarks, move |doc| doc.bookmarks = pages)
            .await
    }

    // =========================================================================
    // Sticky notes
    // =========================================================================

    pub fn sticky_notes(&self, key: &FileKey) -> Vec<StickyNote> {
        self.read(key, |doc| doc.sticky_notes.clone())
    }

    pub async fn add_sticky_note(&self, key: &FileKey, note: StickyNote) -> Mutation<()> {
        self.mutate(key, SidecarKind::StickyNotes, move |doc| {
            doc.sticky_notes.push(note)
        })
        .await
    }

    /// Replace every note of the document, keeping the given order
    pub async fn replace_sticky_notes(
        &self,
        key: &FileKey,
        notes: Vec<StickyNote>,
    ) -> Mutation<()> {
        self.mutate(key, SidecarKind::StickyNotes, move |doc| {
            doc.sticky_notes = notes
        })
        .await
    }

    // =========================================================================
    // Highlights and underlines
    // =========================================================================

    /// Every stored annotation of `kind`, in insertion order
    pub fn annotations(&self, key: &FileKey, kind: AnnotationKind) -> Vec<Annotation> {
        self.read(key, |doc| doc.annotations(kind).to_vec())
    }

    pub fn annotations_on_page(
        &self,
        key: &FileKey,
        kind: AnnotationKind,
        page: u32,
    ) -> Vec<Annotation> {
        self.read(key, |doc| doc.on_page(kind, page))
    }

    /// Everything the compositor draws on one page
    pub fn page_overlay(&self, key: &FileKey, page: u32) -> PageOverlay {
        self.read(key, |doc| PageOverlay {
            page,
            highlights: doc.on_page(AnnotationKind::Highlight, page),
            underlines: doc.on_page(AnnotationKind::Underline, page),
        })
    }

    /// Store an annotation in the collection of its kind
    pub async fn add_annotation(&self, key: &FileKey, annotation: Annotation) -> Mutation<()> {
        let kind = annotation.effective_kind();
        self.mutate(key, sidecar_kind(kind), move |doc| {
            doc.annotations_mut(kind).push(annotation)
        })
        .await
    }

    /// Remove the first stored annotation equal to `annotation`.
    ///
    /// Returns whether one was found.
    pub async fn remove_annotation(
        &self,
        key: &FileKey,
        annotation: &Annotation,
    ) -> Mutation<bool> {
        let kind = annotation.effective_kind();
        self.mutate(key, sidecar_kind(kind), |doc| {
            let collection = doc.annotations_mut(kind);
            match collection.iter().position(|a| a == annotation) {
                Some(index) => {
                    collection.remove(index);
                    true
                }
                None => false,
            }
        })
        .await
    }

    pub async fn replace_annotations(
        &self,
        key: &FileKey,
        kind: AnnotationKind,
        annotations: Vec<Annotation>,
    ) -> Mutation<()> {
        self.mutate(key, sidecar_kind(kind), move |doc| {
            *doc.annotations_mut(kind) = annotations
        })
        .await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn entry(&self, key: &FileKey) -> Option<Arc<FileEntry>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// The entry for `key`, loading it from the sidecar first if needed.
    ///
    /// An entry already in the map is never replaced.
    async fn loaded_entry(&self, key: &FileKey) -> Arc<FileEntry> {
        if let Some(entry) = self.entry(key) {
            return entry;
        }

        let _guard = self.init_gate.lock().await;
        if let Some(entry) = self.entry(key) {
            return entry;
        }

        let annotations = DocumentAnnotations {
            bookmarks: self
                .load_collection::<u32>(key, SidecarKind::Bookmarks)
                .await
                .into_iter()
                .collect(),
            sticky_notes: self.load_collection(key, SidecarKind::StickyNotes).await,
            highlights: self.load_collection(key, SidecarKind::Highlights).await,
            underlines: self.load_collection(key, SidecarKind::Underlines).await,
        };
        log::debug!(
            "Loaded annotations for {}: {} bookmarks, {} notes, {} highlights, {} underlines",
            key,
            annotations.bookmarks.len(),
            annotations.sticky_notes.len(),
            annotations.highlights.len(),
            annotations.underlines.len()
        );

        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            files
                .entry(key.clone())
                .or_insert_with(|| Arc::new(FileEntry::new(annotations))),
        )
    }

    fn read<T>(&self, key: &FileKey, f: impl FnOnce(&DocumentAnnotations) -> T) -> T {
        match self.entry(key) {
            Some(entry) => f(&entry.current()),
            None => f(&DocumentAnnotations::default()),
        }
    }

    async fn mutate<T, F>(&self, key: &FileKey, kind: SidecarKind, f: F) -> Mutation<T>
    where
        F: FnOnce(&mut DocumentAnnotations) -> T + Send,
        T: Send,
    {
        let entry = self.loaded_entry(key).await;
        let _guard = entry.gate.lock().await;

        let mut next = DocumentAnnotations::clone(&entry.current());
        let value = f(&mut next);
        let snapshot = Arc::new(next);
        entry.publish(Arc::clone(&snapshot));

        let persisted = self.persist(key, kind, &snapshot).await;
        Mutation {
            value,
            snapshot,
            persisted,
        }
    }

    async fn persist(
        &self,
        key: &FileKey,
        kind: SidecarKind,
        snapshot: &DocumentAnnotations,
    ) -> Result<(), SidecarError> {
        let result = match snapshot.collection_value(kind) {
            Ok(value) => self.sidecar.write(key, kind, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            log::warn!("Failed to persist {} for {}: {}", kind, key, e);
        }
        result
    }

    async fn load_collection<T: DeserializeOwned>(
        &self,
        key: &FileKey,
        kind: SidecarKind,
    ) -> Vec<T> {
        match self.sidecar.read(key, kind).await {
            Ok(Some(value)) => coerce_collection(value, key, kind),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read {} for {}: {}", kind, key, e);
                Vec::new()
            }
        }
    }
}

fn sidecar_kind(kind: AnnotationKind) -> SidecarKind {
    match kind {
        AnnotationKind::Highlight => SidecarKind::Highlights,
        AnnotationKind::Underline => SidecarKind::Underlines,
    }
}

/// Turn whatever was persisted into a collection.
///
/// Non-arrays become empty; malformed elements of an array are dropped.
fn coerce_collection<T: DeserializeOwned>(
    value: Value,
    key: &FileKey,
    kind: SidecarKind,
) -> Vec<T> {
    let Value::Array(items) = value else {
        log::warn!("Ignoring non-collection {} data for {}", kind, key);
        return Vec::new();
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if parsed.len() < total {
        log::warn!(
            "Dropped {} malformed {} entries for {}",
            total - parsed.len(),
            kind,
            key
        );
    }
    parsed
}
