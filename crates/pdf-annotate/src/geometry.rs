//! Normalized page geometry
//!
//! Annotation rects are stored as fractions of the unscaled page so they stay
//! valid at any zoom, rotation or export resolution. They are converted to
//! pixels only at draw time.

use crate::constants::UNDERLINE_THICKNESS_PX;
use serde::{Deserialize, Serialize};

/// Rectangle in fractions of the unscaled page width and height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Whether every edge lies inside the page
    pub fn is_within_page(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && in_unit(self.w)
            && in_unit(self.h)
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }
}

/// Rectangle in pixels of a specific render
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Snap each edge to the nearest pixel boundary
    pub fn to_pixel_bounds(&self) -> PixelBounds {
        PixelBounds {
            x0: self.x.round() as i64,
            y0: self.y.round() as i64,
            x1: self.right().round() as i64,
            y1: self.bottom().round() as i64,
        }
    }
}

/// Half-open pixel span `[x0, x1) × [y0, y1)`, possibly outside the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelBounds {
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Intersect with a `width × height` surface.
    ///
    /// Returns `None` when nothing of the span lands on the surface.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelBounds> {
        let clamped = PixelBounds {
            x0: self.x0.clamp(0, width as i64),
            y0: self.y0.clamp(0, height as i64),
            x1: self.x1.clamp(0, width as i64),
            y1: self.y1.clamp(0, height as i64),
        };
        if clamped.is_empty() { None } else { Some(clamped) }
    }
}

/// Convert a normalized rect to pixels of a page rendered at the given size
pub fn to_pixel_rect(rect: &NormalizedRect, page_width_px: f64, page_height_px: f64) -> PixelRect {
    PixelRect {
        x: rect.x * page_width_px,
        y: rect.y * page_height_px,
        w: rect.w * page_width_px,
        h: rect.h * page_height_px,
    }
}

/// Convert a pixel rect of a page rendered at the given size back to fractions
pub fn from_pixel_rect(
    rect: &PixelRect,
    page_width_px: f64,
    page_height_px: f64,
) -> NormalizedRect {
    if page_width_px <= 0.0 || page_height_px <= 0.0 {
        return NormalizedRect::default();
    }
    NormalizedRect {
        x: rect.x / page_width_px,
        y: rect.y / page_height_px,
        w: rect.w / page_width_px,
        h: rect.h / page_height_px,
    }
}

/// The baseline stripe drawn for an underline: a fixed 2 px band ending at
/// the bottom edge of the rect, spanning its full width.
pub fn underline_strip(
    rect: &NormalizedRect,
    page_width_px: f64,
    page_height_px: f64,
) -> PixelRect {
    let px = to_pixel_rect(rect, page_width_px, page_height_px);
    PixelRect {
        x: px.x,
        y: px.bottom() - UNDERLINE_THICKNESS_PX,
        w: px.w,
        h: UNDERLINE_THICKNESS_PX,
    }
}
