use pdf_annotate::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn rect(x: f64, y: f64) -> NormalizedRect {
    NormalizedRect::new(x, y, 0.2, 0.05)
}

async fn loaded_store(key: &FileKey) -> AnnotationStore<MemorySidecar> {
    let store = AnnotationStore::new(MemorySidecar::new());
    store.init_for_file(key).await;
    store
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_missing_data_reads_as_empty() {
    let key = FileKey::new("fresh.pdf");
    let store = loaded_store(&key).await;

    assert!(store.is_loaded(&key));
    assert!(store.bookmarks(&key).is_empty());
    assert!(store.sticky_notes(&key).is_empty());
    assert!(store.annotations(&key, AnnotationKind::Highlight).is_empty());
    assert!(store.annotations(&key, AnnotationKind::Underline).is_empty());
}

#[tokio::test]
async fn test_unloaded_key_reads_as_empty() {
    let store = AnnotationStore::new(MemorySidecar::new());
    let key = FileKey::new("never-opened.pdf");

    assert!(!store.is_loaded(&key));
    assert!(store.bookmarks(&key).is_empty());
    assert!(store.snapshot(&key).is_none());
}

#[tokio::test]
async fn test_init_loads_persisted_collections() {
    let sidecar = MemorySidecar::new();
    let key = FileKey::new("saved.pdf");
    sidecar.insert(&key, SidecarKind::Bookmarks, json!([7, 2]));
    sidecar.insert(
        &key,
        SidecarKind::Highlights,
        json!([{"page": 1, "type": "highlight", "rects": [{"x": 0.1, "y": 0.1, "w": 0.2, "h": 0.05}]}]),
    );
    sidecar.insert(
        &key,
        SidecarKind::StickyNotes,
        json!([{"page": 3, "x": 0.5, "y": 0.25, "text": "check this"}]),
    );

    let store = AnnotationStore::new(sidecar);
    let snapshot = store.init_for_file(&key).await;

    assert_eq!(store.bookmarks(&key), vec![2, 7]);
    assert_eq!(snapshot.highlights.len(), 1);
    assert_eq!(snapshot.highlights[0].kind, Some(AnnotationKind::Highlight));
    assert_eq!(store.sticky_notes(&key), vec![StickyNote::new(3, 0.5, 0.25, "check this")]);
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let sidecar = MemorySidecar::new();
    let key = FileKey::new("doc.pdf");
    let store = AnnotationStore::new(sidecar);

    store.init_for_file(&key).await;
    store.add_bookmark(&key, 4).await;

    // Changes to the backing store after init are not reloaded
    store.sidecar().insert(&key, SidecarKind::Bookmarks, json!([1, 2, 3]));
    store.init_for_file(&key).await;

    assert_eq!(store.bookmarks(&key), vec![4]);
}

#[tokio::test]
async fn test_malformed_data_is_tolerated() {
    let sidecar = MemorySidecar::new();
    let key = FileKey::new("broken.pdf");
    sidecar.insert(&key, SidecarKind::Bookmarks, json!({"not": "a list"}));
    sidecar.insert(&key, SidecarKind::Underlines, json!("garbage"));
    sidecar.insert(
        &key,
        SidecarKind::Highlights,
        json!([
            {"page": 1, "rects": []},
            {"page": "one"},
            42
        ]),
    );

    let store = AnnotationStore::new(sidecar);
    store.init_for_file(&key).await;

    assert!(store.bookmarks(&key).is_empty());
    assert!(store.annotations(&key, AnnotationKind::Underline).is_empty());
    assert_eq!(store.annotations(&key, AnnotationKind::Highlight).len(), 1);
}

#[tokio::test]
async fn test_unavailable_sidecar_keeps_memory_state() {
    let key = FileKey::new("offline.pdf");
    let store = AnnotationStore::new(MemorySidecar::unavailable());
    store.init_for_file(&key).await;

    let mutation = store.toggle_bookmark(&key, 5).await;

    assert!(mutation.value);
    assert!(!mutation.is_persisted());
    assert!(matches!(mutation.persisted, Err(SidecarError::Unavailable(_))));
    assert_eq!(store.bookmarks(&key), vec![5]);
}

#[tokio::test]
async fn test_close_drops_cached_state() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    store.add_bookmark(&key, 1).await;

    assert!(store.close(&key));
    assert!(!store.close(&key));
    assert!(!store.is_loaded(&key));

    // Persisted data comes back on the next init
    store.init_for_file(&key).await;
    assert_eq!(store.bookmarks(&key), vec![1]);
}

#[tokio::test]
async fn test_documents_are_partitioned_by_key() {
    let a = FileKey::new("a.pdf");
    let b = FileKey::new("b.pdf");
    let store = loaded_store(&a).await;
    store.init_for_file(&b).await;

    store.add_bookmark(&a, 1).await;
    store.add_bookmark(&b, 2).await;

    assert_eq!(store.bookmarks(&a), vec![1]);
    assert_eq!(store.bookmarks(&b), vec![2]);
    assert_eq!(store.file_keys(), vec![a, b]);
}

// ============================================================================
// Bookmarks
// ============================================================================

#[tokio::test]
async fn test_toggle_bookmark_twice_restores_state() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    store.add_bookmark(&key, 2).await;

    let first = store.toggle_bookmark(&key, 9).await;
    assert!(first.value);
    assert!(store.is_bookmarked(&key, 9));

    let second = store.toggle_bookmark(&key, 9).await;
    assert!(!second.value);
    assert_eq!(store.bookmarks(&key), vec![2]);
}

#[tokio::test]
async fn test_add_bookmark_is_set_like() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;

    assert!(store.add_bookmark(&key, 3).await.value);
    assert!(!store.add_bookmark(&key, 3).await.value);
    assert!(store.remove_bookmark(&key, 3).await.value);
    assert!(!store.remove_bookmark(&key, 3).await.value);
    assert!(store.bookmarks(&key).is_empty());
}

#[tokio::test]
async fn test_bookmarks_persist_ascending() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;

    store.replace_bookmarks(&key, [12, 3, 8, 3]).await;

    assert_eq!(store.bookmarks(&key), vec![3, 8, 12]);
    assert_eq!(
        store.sidecar().get(&key, SidecarKind::Bookmarks),
        Some(json!([3, 8, 12]))
    );
}

// ============================================================================
// Annotations and notes
// ============================================================================

#[tokio::test]
async fn test_add_annotation_writes_through() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;

    let mutation = store
        .add_annotation(&key, Annotation::highlight(1, vec![rect(0.0, 0.0)]).with_color("#ffff0066"))
        .await;

    assert!(mutation.is_persisted());
    assert_eq!(mutation.snapshot.highlights.len(), 1);
    assert_eq!(store.sidecar().write_count(), 1);

    let stored = store.sidecar().get(&key, SidecarKind::Highlights).unwrap();
    assert_eq!(stored[0]["type"], json!("highlight"));
    assert_eq!(stored[0]["color"], json!("#ffff0066"));
    assert_eq!(stored[0]["page"], json!(1));
}

#[tokio::test]
async fn test_add_annotation_routes_by_kind() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;

    store.add_annotation(&key, Annotation::underline(2, vec![rect(0.1, 0.1)])).await;
    store.add_annotation(&key, Annotation::highlight(2, vec![rect(0.1, 0.1)])).await;

    assert_eq!(store.annotations(&key, AnnotationKind::Underline).len(), 1);
    assert_eq!(store.annotations(&key, AnnotationKind::Highlight).len(), 1);
    assert!(store.sidecar().get(&key, SidecarKind::Underlines).is_some());
}

#[tokio::test]
async fn test_replace_annotations_keeps_order() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    store.add_annotation(&key, Annotation::highlight(9, vec![rect(0.5, 0.5)])).await;

    let replacement = vec![
        Annotation::highlight(3, vec![rect(0.1, 0.1)]),
        Annotation::highlight(1, vec![rect(0.2, 0.2)]),
        Annotation::highlight(2, vec![rect(0.3, 0.3)]),
    ];
    store
        .replace_annotations(&key, AnnotationKind::Highlight, replacement.clone())
        .await;

    assert_eq!(store.annotations(&key, AnnotationKind::Highlight), replacement);
}

#[tokio::test]
async fn test_remove_annotation_removes_first_match() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    let duplicate = Annotation::underline(1, vec![rect(0.1, 0.1)]);
    store.add_annotation(&key, duplicate.clone()).await;
    store.add_annotation(&key, duplicate.clone()).await;

    assert!(store.remove_annotation(&key, &duplicate).await.value);
    assert_eq!(store.annotations(&key, AnnotationKind::Underline).len(), 1);

    let missing = Annotation::underline(5, vec![rect(0.9, 0.9)]);
    assert!(!store.remove_annotation(&key, &missing).await.value);
}

#[tokio::test]
async fn test_annotations_on_page_filters() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    store.add_annotation(&key, Annotation::highlight(1, vec![rect(0.1, 0.1)])).await;
    store.add_annotation(&key, Annotation::highlight(2, vec![rect(0.1, 0.1)])).await;
    store.add_annotation(&key, Annotation::highlight(2, vec![rect(0.4, 0.4)])).await;

    assert_eq!(store.annotations_on_page(&key, AnnotationKind::Highlight, 2).len(), 2);
    assert_eq!(store.annotations_on_page(&key, AnnotationKind::Highlight, 1).len(), 1);
    assert!(store.annotations_on_page(&key, AnnotationKind::Underline, 1).is_empty());
}

#[tokio::test]
async fn test_sticky_notes_round_trip_through_sidecar() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;

    store
        .add_sticky_note(&key, StickyNote::new(1, 0.25, 0.75, "first").with_color("#ffcc00"))
        .await;
    store.add_sticky_note(&key, StickyNote::new(2, 0.5, 0.5, "second")).await;

    let stored = store.sidecar().get(&key, SidecarKind::StickyNotes).unwrap();
    assert_eq!(stored.as_array().map(Vec::len), Some(2));
    assert_eq!(stored[0]["text"], json!("first"));

    store
        .replace_sticky_notes(&key, vec![StickyNote::new(4, 0.1, 0.1, "only")])
        .await;
    assert_eq!(store.sticky_notes(&key), vec![StickyNote::new(4, 0.1, 0.1, "only")]);
}

#[tokio::test]
async fn test_snapshots_are_immutable() {
    let key = FileKey::new("doc.pdf");
    let store = loaded_store(&key).await;
    store.add_bookmark(&key, 1).await;

    let before = store.snapshot(&key).unwrap();
    store.add_bookmark(&key, 2).await;
    let after = store.snapshot(&key).unwrap();

    assert_eq!(before.bookmarks.len(), 1);
    assert_eq!(after.bookmarks.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_are_not_lost() {
    let key = FileKey::new("busy.pdf");
    let store = Arc::new(loaded_store(&key).await);

    let mut handles = Vec::new();
    for page in 1..=32 {
        let store = Arc::clone(&store);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store.add_bookmark(&key, page).await.is_persisted()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let expected: Vec<u32> = (1..=32).collect();
    assert_eq!(store.bookmarks(&key), expected);
    assert_eq!(
        store.sidecar().get(&key, SidecarKind::Bookmarks),
        Some(json!(expected))
    );
    assert_eq!(store.sidecar().write_count(), 32);
}

#[tokio::test]
async fn test_mutation_before_init_loads_stored_data() {
    let sidecar = MemorySidecar::new();
    let key = FileKey::new("eager.pdf");
    sidecar.insert(&key, SidecarKind::Bookmarks, json!([1, 2]));
    let store = AnnotationStore::new(sidecar);

    let mutation = store.toggle_bookmark(&key, 3).await;

    assert!(mutation.value);
    assert!(store.is_loaded(&key));
    assert_eq!(store.bookmarks(&key), vec![1, 2, 3]);
    assert_eq!(
        store.sidecar().get(&key, SidecarKind::Bookmarks),
        Some(json!([1, 2, 3]))
    );
}

#[tokio::test]
async fn test_mutation_on_fresh_key_starts_empty() {
    let store = AnnotationStore::new(MemorySidecar::new());
    let key = FileKey::new("fresh-eager.pdf");

    let mutation = store.toggle_bookmark(&key, 3).await;

    assert!(mutation.value);
    assert_eq!(store.bookmarks(&key), vec![3]);
}

/// Memory sidecar whose reads suspend once before answering
struct YieldingSidecar(MemorySidecar);

impl SidecarStorage for YieldingSidecar {
    async fn read(&self, key: &FileKey, kind: SidecarKind) -> SidecarResult<Option<Value>> {
        tokio::task::yield_now().await;
        self.0.read(key, kind).await
    }

    async fn write(
        &self,
        key: &FileKey,
        kind: SidecarKind,
        collection: &Value,
    ) -> SidecarResult<()> {
        self.0.write(key, kind, collection).await
    }
}

#[tokio::test]
async fn test_mutation_during_init_keeps_stored_data() {
    let sidecar = MemorySidecar::new();
    let key = FileKey::new("racing.pdf");
    sidecar.insert(&key, SidecarKind::Bookmarks, json!([1, 2]));
    let store = AnnotationStore::new(YieldingSidecar(sidecar));

    let (_, mutation) = tokio::join!(store.init_for_file(&key), store.add_bookmark(&key, 5));

    assert!(mutation.value);
    assert!(mutation.is_persisted());
    assert_eq!(store.bookmarks(&key), vec![1, 2, 5]);
    assert_eq!(
        store.sidecar().0.get(&key, SidecarKind::Bookmarks),
        Some(json!([1, 2, 5]))
    );
}

#[tokio::test]
async fn test_reinit_keeps_live_entry() {
    let key = FileKey::new("reinit.pdf");
    let store = loaded_store(&key).await;
    store.add_bookmark(&key, 9).await;
    store.sidecar().insert(&key, SidecarKind::Bookmarks, json!([]));

    let snapshot = store.init_for_file(&key).await;

    assert!(snapshot.bookmarks.contains(&9));
}

// ============================================================================
// JSON sidecar
// ============================================================================

#[tokio::test]
async fn test_json_sidecar_layout() {
    let dir = tempfile::tempdir().unwrap();
    let key = FileKey::new("/home/user/papers/a.pdf");
    let store = AnnotationStore::new(JsonSidecar::new(dir.path()));
    store.init_for_file(&key).await;

    store.add_bookmark(&key, 4).await;
    store
        .add_annotation(&key, Annotation::underline(1, vec![rect(0.1, 0.2)]))
        .await;

    let sidecar = store.sidecar();
    let document_dir = sidecar.document_dir(&key);
    assert!(document_dir.starts_with(dir.path()));

    let bookmarks_path = sidecar.collection_path(&key, SidecarKind::Bookmarks);
    assert_eq!(bookmarks_path, document_dir.join("bookmarks.json"));
    let bookmarks: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&bookmarks_path).unwrap()).unwrap();
    assert_eq!(bookmarks, json!([4]));

    assert!(sidecar.collection_path(&key, SidecarKind::Underlines).exists());
    assert!(!sidecar.collection_path(&key, SidecarKind::StickyNotes).exists());
}

#[tokio::test]
async fn test_json_sidecar_reload() {
    let dir = tempfile::tempdir().unwrap();
    let key = FileKey::new("report.pdf");

    {
        let store = AnnotationStore::new(JsonSidecar::new(dir.path()));
        store.init_for_file(&key).await;
        store.add_sticky_note(&key, StickyNote::new(2, 0.3, 0.4, "revisit")).await;
        store.replace_bookmarks(&key, [5, 1]).await;
    }

    let store = AnnotationStore::new(JsonSidecar::new(dir.path()));
    store.init_for_file(&key).await;

    assert_eq!(store.bookmarks(&key), vec![1, 5]);
    assert_eq!(store.sticky_notes(&key), vec![StickyNote::new(2, 0.3, 0.4, "revisit")]);
}

#[tokio::test]
async fn test_json_sidecar_distinct_keys_distinct_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = JsonSidecar::new(dir.path());

    let a = sidecar.document_dir(&FileKey::new("a.pdf"));
    let b = sidecar.document_dir(&FileKey::new("b.pdf"));
    assert_ne!(a, b);
    assert_eq!(a, sidecar.document_dir(&FileKey::new("a.pdf")));
}
