use crate::{AnnotateCommand, AnnotateUpdate, SourceOpener, handlers};
use pdf_annotate::{AnnotationStore, DocumentAssembler, FileKey, SidecarStorage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A document opened through the worker
pub struct DocumentSession<R> {
    pub renderer: R,
    /// Name of the source file, used to name exports
    pub file_name: Option<String>,
}

pub(crate) type Sessions<R> = HashMap<FileKey, DocumentSession<R>>;

/// Async worker task that processes annotation commands and sends updates.
///
/// Commands are handled one at a time in arrival order. The task ends when
/// the command channel closes.
pub async fn worker_task<S, A, O>(
    store: Arc<AnnotationStore<S>>,
    assembler: A,
    opener: O,
    mut command_rx: mpsc::UnboundedReceiver<AnnotateCommand>,
    update_tx: mpsc::UnboundedSender<AnnotateUpdate>,
) where
    S: SidecarStorage,
    A: DocumentAssembler + Clone,
    O: SourceOpener,
{
    let mut sessions: Sessions<O::Renderer> = HashMap::new();

    while let Some(cmd) = command_rx.recv().await {
        process_command(cmd, &store, &assembler, &opener, &mut sessions, &update_tx).await;
    }
    log::debug!("Command channel closed, worker exiting");
}

async fn process_command<S, A, O>(
    cmd: AnnotateCommand,
    store: &AnnotationStore<S>,
    assembler: &A,
    opener: &O,
    sessions: &mut Sessions<O::Renderer>,
    update_tx: &mpsc::UnboundedSender<AnnotateUpdate>,
) where
    S: SidecarStorage,
    A: DocumentAssembler + Clone,
    O: SourceOpener,
{
    match cmd {
        AnnotateCommand::Open { path } => {
            handlers::handle_open(path, store, opener, sessions, update_tx).await;
        }
        AnnotateCommand::Close { key } => {
            handlers::handle_close(key, store, sessions, update_tx);
        }
        AnnotateCommand::LoadAnnotations { key } => {
            let annotations = store.init_for_file(&key).await;
            let _ = update_tx.send(AnnotateUpdate::AnnotationsLoaded { key, annotations });
        }
        AnnotateCommand::ToggleBookmark { key, page } => {
            let mutation = store.toggle_bookmark(&key, page).await;
            let _ = update_tx.send(AnnotateUpdate::BookmarkToggled {
                key,
                page,
                bookmarked: mutation.value,
                persisted: mutation.is_persisted(),
            });
        }
        AnnotateCommand::ReplaceBookmarks { key, pages } => {
            let mutation = store.replace_bookmarks(&key, pages).await;
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::AddAnnotation { key, annotation } => {
            let mutation = store.add_annotation(&key, annotation).await;
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::RemoveAnnotation { key, annotation } => {
            let mutation = store.remove_annotation(&key, &annotation).await;
            if !mutation.value {
                log::debug!(
                    "No matching {} on page {} to remove",
                    annotation.effective_kind(),
                    annotation.page
                );
            }
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::ReplaceAnnotations {
            key,
            kind,
            annotations,
        } => {
            let mutation = store.replace_annotations(&key, kind, annotations).await;
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::AddStickyNote { key, note } => {
            let mutation = store.add_sticky_note(&key, note).await;
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::ReplaceStickyNotes { key, notes } => {
            let mutation = store.replace_sticky_notes(&key, notes).await;
            handlers::send_changed(key, mutation, update_tx);
        }
        AnnotateCommand::Export {
            key,
            base_scale,
            rotation,
            options,
            output_dir,
        } => {
            let session = sessions.get(&key);
            handlers::handle_export(
                handlers::ExportJobSpec {
                    key,
                    base_scale,
                    rotation,
                    options,
                    output_dir,
                },
                store,
                assembler.clone(),
                session,
                update_tx,
            )
            .await;
        }
    }
}
