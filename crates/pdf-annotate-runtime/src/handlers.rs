use crate::worker::{DocumentSession, Sessions};
use crate::{AnnotateUpdate, SourceOpener};
use pdf_annotate::{
    AnnotationStore, DocumentAssembler, ExportEvent, ExportOptions, ExportPipeline, ExportRequest,
    FileKey, Mutation, PageRenderer, Rotation, SidecarStorage, deliver_to_dir,
};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Parameters of a queued export
pub struct ExportJobSpec {
    pub key: FileKey,
    pub base_scale: f64,
    pub rotation: Rotation,
    pub options: ExportOptions,
    pub output_dir: PathBuf,
}

pub async fn handle_open<S: SidecarStorage, O: SourceOpener>(
    path: PathBuf,
    store: &AnnotationStore<S>,
    opener: &O,
    sessions: &mut Sessions<O::Renderer>,
    update_tx: &mpsc::UnboundedSender<AnnotateUpdate>,
) {
    let key = FileKey::from_path(&path);

    match opener.open(&path).await {
        Ok(renderer) => {
            let annotations = store.init_for_file(&key).await;
            let page_count = renderer.page_count();
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            sessions.insert(
                key.clone(),
                DocumentSession {
                    renderer,
                    file_name,
                },
            );
            let _ = update_tx.send(AnnotateUpdate::Opened {
                key,
                page_count,
                annotations,
            });
        }
        Err(e) => {
            let _ = update_tx.send(AnnotateUpdate::Error {
                message: format!("Failed to open {}: {}", path.display(), e),
            });
        }
    }
}

pub fn handle_close<S: SidecarStorage, R>(
    key: FileKey,
    store: &AnnotationStore<S>,
    sessions: &mut Sessions<R>,
    update_tx: &mpsc::UnboundedSender<AnnotateUpdate>,
) {
    sessions.remove(&key);
    store.close(&key);
    let _ = update_tx.send(AnnotateUpdate::Closed { key });
}

pub fn send_changed<T>(
    key: FileKey,
    mutation: Mutation<T>,
    update_tx: &mpsc::UnboundedSender<AnnotateUpdate>,
) {
    let _ = update_tx.send(AnnotateUpdate::AnnotationsChanged {
        key,
        persisted: mutation.is_persisted(),
        annotations: mutation.snapshot,
    });
}

/// Export an open document and write it to the requested directory.
///
/// Pipeline events are forwarded as progress updates while the export runs.
pub async fn handle_export<S, A, R>(
    job: ExportJobSpec,
    store: &AnnotationStore<S>,
    assembler: A,
    session: Option<&DocumentSession<R>>,
    update_tx: &mpsc::UnboundedSender<AnnotateUpdate>,
) where
    S: SidecarStorage,
    A: DocumentAssembler,
    R: PageRenderer,
{
    let ExportJobSpec {
        key,
        base_scale,
        rotation,
        options,
        output_dir,
    } = job;
    let file_name = session.and_then(|s| s.file_name.clone());
    let request = ExportRequest::new(key, file_name)
        .with_base_scale(base_scale)
        .with_rotation(rotation);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let export = async move {
        // The pipeline owns the event sender; dropping it ends the forwarding loop
        let pipeline = ExportPipeline::new(store, assembler, options).with_progress(event_tx);
        pipeline
            .export(session.map(|s| &s.renderer), &request)
            .await
    };
    let forward = async {
        while let Some(event) = event_rx.recv().await {
            if let Some(update) = progress_update(event) {
                let _ = update_tx.send(update);
            }
        }
    };
    let (result, ()) = tokio::join!(export, forward);

    let delivered = match result {
        Ok(exported) => deliver_to_dir(&exported, &output_dir)
            .await
            .map(|path| (path, exported)),
        Err(e) => Err(e),
    };

    match delivered {
        Ok((path, exported)) => {
            let _ = update_tx.send(AnnotateUpdate::ExportComplete {
                path,
                page_count: exported.page_count(),
                failed_pages: exported.failed_pages,
            });
        }
        Err(e) => {
            let _ = update_tx.send(AnnotateUpdate::Error {
                message: format!("Failed to export annotations: {e}"),
            });
        }
    }
}

fn progress_update(event: ExportEvent) -> Option<AnnotateUpdate> {
    match event {
        ExportEvent::PageStarted { .. } => None,
        ExportEvent::PageFinished { page, total, .. } => Some(AnnotateUpdate::Progress {
            operation: "Exporting pages".to_string(),
            current: page as usize,
            total: total as usize,
        }),
        ExportEvent::PageFailed { page, message } => Some(AnnotateUpdate::Error {
            message: format!("Page {page} was replaced with a blank page: {message}"),
        }),
        ExportEvent::Finalizing { page_count } => Some(AnnotateUpdate::Progress {
            operation: "Writing document".to_string(),
            current: page_count,
            total: page_count,
        }),
    }
}
