//! Page rasterization seam
//!
//! The export pipeline never talks to a PDF engine directly; it asks a
//! [`PageRenderer`] for viewports and renders.

use crate::constants::{MAX_SURFACE_DIMENSION, MAX_SURFACE_PIXELS};
use crate::types::{AnnotateError, Result, Rotation};
use image::RgbaImage;
use std::future::Future;

/// Rendered size of a page at a given scale and rotation (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub rotation: Rotation,
}

impl Viewport {
    /// Viewport of a page measured in points; quarter turns swap the axes
    pub fn for_page(width_pt: f64, height_pt: f64, scale: f64, rotation: Rotation) -> Self {
        let (width, height) = if rotation.is_quarter_turn() {
            (height_pt * scale, width_pt * scale)
        } else {
            (width_pt * scale, height_pt * scale)
        };
        Self {
            width,
            height,
            scale,
            rotation,
        }
    }

    /// Surface size needed to hold the viewport.
    ///
    /// Fails when either side exceeds [`MAX_SURFACE_DIMENSION`] or the area
    /// exceeds [`MAX_SURFACE_PIXELS`].
    pub fn pixel_size(&self) -> Result<(u32, u32)> {
        let width = self.width.ceil().max(1.0);
        let height = self.height.ceil().max(1.0);
        let max = MAX_SURFACE_DIMENSION as f64;
        if !(width <= max && height <= max) {
            return Err(self.too_large());
        }

        let (width, height) = (width as u32, height as u32);
        match (width as u64).checked_mul(height as u64) {
            Some(pixels) if pixels <= MAX_SURFACE_PIXELS => Ok((width, height)),
            _ => Err(self.too_large()),
        }
    }

    fn too_large(&self) -> AnnotateError {
        AnnotateError::SurfaceTooLarge {
            width: self.width,
            height: self.height,
        }
    }
}

/// Source of page rasters.
///
/// Pages are numbered from 1.
pub trait PageRenderer: Send + Sync {
    fn page_count(&self) -> u32;

    fn viewport(&self, page: u32, scale: f64, rotation: Rotation) -> Result<Viewport>;

    /// Render `page` onto `surface`, which is already sized to
    /// [`Viewport::pixel_size`], and hand the surface back.
    fn render(
        &self,
        page: u32,
        viewport: &Viewport,
        surface: RgbaImage,
    ) -> impl Future<Output = Result<RgbaImage>> + Send;
}
