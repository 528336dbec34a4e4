//! Overlay compositor
//!
//! Paints one page's highlights and underlines onto a rendered page. All
//! highlights are drawn before any underline so an underline is never covered
//! by a highlight on the same region.

use crate::color::{blend_pixel, parse_color};
use crate::constants::{DEFAULT_HIGHLIGHT_COLOR, DEFAULT_UNDERLINE_COLOR};
use crate::geometry::{PixelRect, to_pixel_rect, underline_strip};
use crate::store::{AnnotationStore, SidecarStorage};
use crate::types::{Annotation, FileKey};
use image::{Rgba, RgbaImage};

/// The annotations drawn on a single page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOverlay {
    pub page: u32,
    pub highlights: Vec<Annotation>,
    pub underlines: Vec<Annotation>,
}

impl PageOverlay {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.underlines.is_empty()
    }
}

/// Draw the stored annotations of `page` onto `surface`
pub fn draw_page_annotations<S: SidecarStorage>(
    surface: &mut RgbaImage,
    page_width_px: f64,
    page_height_px: f64,
    store: &AnnotationStore<S>,
    key: &FileKey,
    page: u32,
) {
    let overlay = store.page_overlay(key, page);
    draw_overlay(surface, page_width_px, page_height_px, &overlay);
}

/// Draw a page overlay onto `surface`.
///
/// Rects are scaled by the given page size; nothing is clipped to the page,
/// only to the surface itself.
pub fn draw_overlay(
    surface: &mut RgbaImage,
    page_width_px: f64,
    page_height_px: f64,
    overlay: &PageOverlay,
) {
    let highlight_default = fallback_color(DEFAULT_HIGHLIGHT_COLOR);
    for annotation in overlay.highlights.iter().filter(|a| a.page == overlay.page) {
        let color = annotation_color(annotation, highlight_default);
        for rect in &annotation.rects {
            fill_rect(surface, &to_pixel_rect(rect, page_width_px, page_height_px), color);
        }
    }

    let underline_default = fallback_color(DEFAULT_UNDERLINE_COLOR);
    for annotation in overlay.underlines.iter().filter(|a| a.page == overlay.page) {
        let color = annotation_color(annotation, underline_default);
        for rect in &annotation.rects {
            fill_rect(surface, &underline_strip(rect, page_width_px, page_height_px), color);
        }
    }
}

/// Blend `color` over every surface pixel covered by `rect`
pub fn fill_rect(surface: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>) {
    let Some(bounds) = rect
        .to_pixel_bounds()
        .clamp_to(surface.width(), surface.height())
    else {
        return;
    };

    for y in bounds.y0..bounds.y1 {
        for x in bounds.x0..bounds.x1 {
            blend_pixel(surface.get_pixel_mut(x as u32, y as u32), color);
        }
    }
}

fn annotation_color(annotation: &Annotation, default: Rgba<u8>) -> Rgba<u8> {
    match annotation.color.as_deref() {
        None => default,
        Some(value) => parse_color(value).unwrap_or_else(|| {
            log::debug!("Unrecognized annotation color {:?}, using default", value);
            default
        }),
    }
}

fn fallback_color(value: &str) -> Rgba<u8> {
    parse_color(value).unwrap_or(Rgba([0, 0, 0, 255]))
}
