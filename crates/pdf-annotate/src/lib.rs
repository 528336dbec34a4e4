mod color;
mod constants;
pub mod export;
mod geometry;
mod options;
mod overlay;
pub mod store;
mod types;

pub use color::{blend_pixel, parse_color};
pub use constants::*;
pub use export::{
    DocumentAssembler, ExportEvent, ExportPipeline, ExportRequest, ExportedDocument, ImageHandle,
    LopdfAssembler, LopdfDocument, OutputDocument, PageHandle, PageRenderer, PngImageData,
    Viewport, deliver_to_dir, encode_png, output_file_name,
};
#[cfg(feature = "pdfium")]
pub use export::{PdfiumRenderer, init_pdfium};
pub use geometry::*;
pub use options::*;
pub use overlay::{PageOverlay, draw_overlay, draw_page_annotations, fill_rect};
pub use store::{
    AnnotationStore, DocumentAnnotations, JsonSidecar, MemorySidecar, Mutation, SidecarError,
    SidecarKind, SidecarResult, SidecarStorage,
};
pub use types::*;
