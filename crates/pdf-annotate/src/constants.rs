//! Shared constants for annotation drawing and export
//!
//! This module centralizes the fixed values the compositor and the export
//! pipeline depend on.

// =============================================================================
// Overlay Drawing
// =============================================================================

/// Fill used for highlights that carry no color of their own
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffff0066";

/// Fill used for underlines that carry no color of their own
pub const DEFAULT_UNDERLINE_COLOR: &str = "#000000";

/// Height of the underline stripe drawn at the bottom edge of a rect (pixels)
pub const UNDERLINE_THICKNESS_PX: f64 = 2.0;

// =============================================================================
// Export
// =============================================================================

/// Multiplier applied on top of the display scale when rasterizing for export
pub const DEFAULT_EXPORT_SCALE: f64 = 2.0;

/// Display scale assumed when the caller does not provide one
pub const DEFAULT_BASE_SCALE: f64 = 1.5;

/// Suffix appended to the source base name of an exported document
pub const EXPORT_FILE_SUFFIX: &str = "-with-annotations.pdf";

/// Base name used when the source document has no file name
pub const DEFAULT_BASE_NAME: &str = "document";

/// MIME type of the delivered file
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Page size used for a substituted page when the source page size is unknown
/// (US Letter in points)
pub const DEFAULT_PAGE_DIMENSIONS: (f64, f64) = (612.0, 792.0);

/// Largest side of a page surface (pixels)
pub const MAX_SURFACE_DIMENSION: u32 = 32_767;

/// Largest area of a page surface (pixels), 1 GiB of RGBA
pub const MAX_SURFACE_PIXELS: u64 = 268_435_456;
