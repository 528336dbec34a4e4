//! Annotation-baking export
//!
//! This module orchestrates the export process:
//! 1. Check preconditions (assembler available, document open)
//! 2. Render each source page in order at the export scale
//! 3. Composite the page's annotations and encode it losslessly
//! 4. Append it as a full-page image to the output document
//! 5. Finalize the document and name it for delivery

mod assemble;
mod delivery;
mod job;
#[cfg(feature = "pdfium")]
mod pdfium;
mod png;
mod render;

pub use assemble::{
    DocumentAssembler, ImageHandle, LopdfAssembler, LopdfDocument, OutputDocument, PageHandle,
};
pub use delivery::{deliver_to_dir, output_file_name};
#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumRenderer, init_pdfium};
pub use png::{PngColorType, PngImageData, encode_png};
pub use render::{PageRenderer, Viewport};

use crate::constants::{DEFAULT_BASE_SCALE, PDF_MIME_TYPE};
use crate::options::{ExportOptions, FailurePolicy};
use crate::store::{AnnotationStore, SidecarStorage};
use crate::types::{AnnotateError, FileKey, Result, Rotation};
use job::ExportJob;
use tokio::sync::mpsc::UnboundedSender;

/// What to export and how the document is currently displayed
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub file_key: FileKey,
    /// Source file name, used to name the output
    pub file_name: Option<String>,
    /// Current display scale; the export multiplies it by the export scale
    pub base_scale: f64,
    pub rotation: Rotation,
}

impl ExportRequest {
    pub fn new(file_key: FileKey, file_name: Option<String>) -> Self {
        Self {
            file_key,
            file_name,
            base_scale: DEFAULT_BASE_SCALE,
            rotation: Rotation::None,
        }
    }

    pub fn with_base_scale(mut self, base_scale: f64) -> Self {
        self.base_scale = base_scale;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// A finished export, ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Pixel size of every output page, in source page order
    pub page_sizes: Vec<(u32, u32)>,
    /// Pages replaced by blank pages under [`FailurePolicy::Continue`]
    pub failed_pages: Vec<u32>,
}

impl ExportedDocument {
    pub const MIME_TYPE: &'static str = PDF_MIME_TYPE;

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }
}

/// Progress of an export run
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    PageStarted { page: u32, total: u32 },
    PageFinished { page: u32, total: u32, width: u32, height: u32 },
    PageFailed { page: u32, message: String },
    Finalizing { page_count: usize },
}

/// Drives an export from a page renderer, the annotation store and an
/// output document assembler.
pub struct ExportPipeline<'s, S, A> {
    store: &'s AnnotationStore<S>,
    assembler: A,
    options: ExportOptions,
    events: Option<UnboundedSender<ExportEvent>>,
}

impl<'s, S: SidecarStorage, A: DocumentAssembler> ExportPipeline<'s, S, A> {
    pub fn new(store: &'s AnnotationStore<S>, assembler: A, options: ExportOptions) -> Self {
        Self {
            store,
            assembler,
            options,
            events: None,
        }
    }

    /// Stream progress events to `events`
    pub fn with_progress(mut self, events: UnboundedSender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export every page of `source` with its annotations baked in.
    ///
    /// Fails before touching any page when the assembler is unavailable or no
    /// source document is open. Pages are processed strictly in order.
    pub async fn export<R: PageRenderer>(
        &self,
        source: Option<&R>,
        request: &ExportRequest,
    ) -> Result<ExportedDocument> {
        if !self.assembler.is_available() {
            return Err(AnnotateError::AssemblerUnavailable);
        }
        let source = source.ok_or(AnnotateError::NoDocument)?;
        self.options.validate()?;
        if !request.base_scale.is_finite() || request.base_scale <= 0.0 {
            return Err(AnnotateError::Config(format!(
                "Display scale must be a positive number, got {}",
                request.base_scale
            )));
        }

        let scale = request.base_scale * self.options.export_scale;
        let total = source.page_count();
        log::info!(
            "Exporting {} ({} pages) at scale {}",
            request.file_key,
            total,
            scale
        );

        let mut job = ExportJob::new(source, self.assembler.create()?, scale, request.rotation);
        let mut failed_pages = Vec::new();

        for page in 1..=total {
            self.emit(ExportEvent::PageStarted { page, total });
            let overlay = self.store.page_overlay(&request.file_key, page);

            let (width, height) = match job.process_page(page, overlay.clone()).await {
                Ok(size) => size,
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Abort => {
                        log::error!("Export aborted at page {}: {}", job.current_page(), e);
                        return Err(e);
                    }
                    FailurePolicy::Continue if job.has_partial_page() => {
                        log::error!(
                            "Export aborted at page {}, output document is incomplete: {}",
                            page,
                            e
                        );
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        log::warn!("Page {} failed, substituting a blank page: {}", page, e);
                        self.emit(ExportEvent::PageFailed {
                            page,
                            message: e.to_string(),
                        });
                        failed_pages.push(page);
                        job.substitute_blank_page(page, overlay).await?
                    }
                },
            };

            log::debug!("Page {}/{} exported at {}x{}", page, total, width, height);
            self.emit(ExportEvent::PageFinished {
                page,
                total,
                width,
                height,
            });
        }

        self.emit(ExportEvent::Finalizing {
            page_count: total as usize,
        });
        let (bytes, page_sizes) = job.finish().await?;

        Ok(ExportedDocument {
            file_name: output_file_name(request.file_name.as_deref()),
            bytes,
            page_sizes,
            failed_pages,
        })
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }
}
