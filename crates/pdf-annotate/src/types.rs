use crate::geometry::NormalizedRect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Output document library is not available")]
    AssemblerUnavailable,
    #[error("Page renderer is not available: {0}")]
    RendererUnavailable(String),
    #[error("No document is open")]
    NoDocument,
    #[error("Failed to open source document: {0}")]
    Source(String),
    #[error("Failed to render page {page}: {message}")]
    Render { page: u32, message: String },
    #[error("Page surface of {width}x{height} pixels is too large to render")]
    SurfaceTooLarge { width: f64, height: f64 },
    #[error("Invalid PNG data: {0}")]
    Png(String),
}

pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Stable identifier of an open document.
///
/// Every annotation collection is partitioned by this key, so the same key
/// must be used for the whole session of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key a document by its resolved path, falling back to the path as given
    /// when it cannot be canonicalized.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self(resolved.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Display rotation applied when rendering pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Accepts any multiple of 90, including negative angles.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Clockwise90),
            180 => Ok(Rotation::Clockwise180),
            270 => Ok(Rotation::Clockwise270),
            _ => Err(AnnotateError::Config(format!(
                "Rotation must be a multiple of 90 degrees, got {}",
                degrees
            ))),
        }
    }

    /// Whether the rotation swaps page width and height
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::Clockwise270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = AnnotateError;

    fn try_from(degrees: i32) -> Result<Self> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Text markup kinds drawn from normalized rects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Underline,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Underline => "underline",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A highlight or underline over one text selection.
///
/// Annotations are never edited in place: an edit replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// 1-based page number
    pub page: u32,
    /// Missing in legacy data, where it means highlight
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnnotationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// One rect per selected line
    #[serde(default)]
    pub rects: Vec<NormalizedRect>,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, page: u32, rects: Vec<NormalizedRect>) -> Self {
        Self {
            page,
            kind: Some(kind),
            color: None,
            rects,
        }
    }

    pub fn highlight(page: u32, rects: Vec<NormalizedRect>) -> Self {
        Self::new(AnnotationKind::Highlight, page, rects)
    }

    pub fn underline(page: u32, rects: Vec<NormalizedRect>) -> Self {
        Self::new(AnnotationKind::Underline, page, rects)
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Untyped entries count as highlights.
    pub fn is_highlight(&self) -> bool {
        matches!(self.kind, None | Some(AnnotationKind::Highlight))
    }

    pub fn effective_kind(&self) -> AnnotationKind {
        self.kind.unwrap_or(AnnotationKind::Highlight)
    }
}

/// A free-floating note pinned to a page position.
///
/// `x` and `y` are fractions of the unscaled page size, like annotation rects.
/// Notes saved by older versions hold reference-render pixels instead; see
/// [`StickyNote::is_legacy_pixel_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl StickyNote {
    pub fn new(page: u32, x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            page,
            x,
            y,
            text: text.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// True when the position cannot be a page fraction
    pub fn is_legacy_pixel_position(&self) -> bool {
        self.x > 1.0 || self.y > 1.0
    }

    /// Convert a pixel-positioned note to page fractions, given the size of
    /// the render its coordinates were taken from.
    pub fn normalized_from(&self, reference_width_px: f64, reference_height_px: f64) -> Self {
        let degenerate = reference_width_px <= 0.0 || reference_height_px <= 0.0;
        if !self.is_legacy_pixel_position() || degenerate {
            return self.clone();
        }
        Self {
            x: (self.x / reference_width_px).clamp(0.0, 1.0),
            y: (self.y / reference_height_px).clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}
