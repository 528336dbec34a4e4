use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod handlers;
mod worker;

pub use worker::{DocumentSession, worker_task};

// Re-export types from the library crate
pub use pdf_annotate::{
    Annotation, AnnotationKind, DocumentAnnotations, ExportOptions, FileKey, PageRenderer,
    Rotation, StickyNote,
};

/// Commands sent from the front end to the worker
#[derive(Debug)]
pub enum AnnotateCommand {
    /// Load a document's annotations and open it for export
    Open {
        path: PathBuf,
    },
    Close {
        key: FileKey,
    },
    LoadAnnotations {
        key: FileKey,
    },
    ToggleBookmark {
        key: FileKey,
        page: u32,
    },
    ReplaceBookmarks {
        key: FileKey,
        pages: Vec<u32>,
    },
    AddAnnotation {
        key: FileKey,
        annotation: Annotation,
    },
    RemoveAnnotation {
        key: FileKey,
        annotation: Annotation,
    },
    ReplaceAnnotations {
        key: FileKey,
        kind: AnnotationKind,
        annotations: Vec<Annotation>,
    },
    AddStickyNote {
        key: FileKey,
        note: StickyNote,
    },
    ReplaceStickyNotes {
        key: FileKey,
        notes: Vec<StickyNote>,
    },
    Export {
        key: FileKey,
        base_scale: f64,
        rotation: Rotation,
        options: ExportOptions,
        output_dir: PathBuf,
    },
}

/// Updates sent from the worker to the front end
#[derive(Debug, Clone)]
pub enum AnnotateUpdate {
    Progress {
        operation: String,
        current: usize,
        total: usize,
    },
    Opened {
        key: FileKey,
        page_count: u32,
        annotations: Arc<DocumentAnnotations>,
    },
    Closed {
        key: FileKey,
    },
    AnnotationsLoaded {
        key: FileKey,
        annotations: Arc<DocumentAnnotations>,
    },
    BookmarkToggled {
        key: FileKey,
        page: u32,
        bookmarked: bool,
        persisted: bool,
    },
    /// A collection changed; `annotations` is the snapshot after the change
    AnnotationsChanged {
        key: FileKey,
        annotations: Arc<DocumentAnnotations>,
        persisted: bool,
    },
    ExportComplete {
        path: PathBuf,
        page_count: usize,
        failed_pages: Vec<u32>,
    },
    Error {
        message: String,
    },
}

/// Opens source documents for rendering
pub trait SourceOpener: Send + Sync {
    type Renderer: PageRenderer + 'static;

    fn open(
        &self,
        path: &Path,
    ) -> impl Future<Output = pdf_annotate::Result<Self::Renderer>> + Send;
}

/// Opens documents with pdfium
#[cfg(feature = "pdfium")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumOpener;

#[cfg(feature = "pdfium")]
impl SourceOpener for PdfiumOpener {
    type Renderer = pdf_annotate::PdfiumRenderer;

    async fn open(&self, path: &Path) -> pdf_annotate::Result<Self::Renderer> {
        pdf_annotate::PdfiumRenderer::open(path).await
    }
}
