//! Page rendering with pdfium

use super::render::{PageRenderer, Viewport};
use crate::types::{AnnotateError, Result, Rotation};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// Initialize Pdfium, trying the vendored library first, then falling back to system
pub fn init_pdfium() -> std::result::Result<Pdfium, PdfiumError> {
    // Try to load from vendor directory (relative to workspace root)
    let vendor_path = std::env::current_dir().ok().and_then(|mut p| {
        p.push("vendor/pdfium/lib");
        if p.exists() { Some(p) } else { None }
    });

    if let Some(vendor_path) = vendor_path {
        if let Ok(binding) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&vendor_path))
        {
            return Ok(Pdfium::new(binding));
        }
    }

    // Fallback to system library or default search paths
    Pdfium::bind_to_system_library().map(Pdfium::new)
}

/// Renders pages of a PDF file on disk.
///
/// Pdfium handles are not shared across threads, so every render binds the
/// library and opens the file inside its own blocking task.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    path: PathBuf,
    /// Unscaled page sizes in points
    page_sizes: Vec<(f64, f64)>,
}

impl PdfiumRenderer {
    /// Open `path` and read its page sizes
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let path_clone = path.clone();

        let page_sizes = tokio::task::spawn_blocking(move || {
            let pdfium =
                init_pdfium().map_err(|e| AnnotateError::RendererUnavailable(e.to_string()))?;
            let document = pdfium
                .load_pdf_from_file(&path_clone, None)
                .map_err(|e| AnnotateError::Source(e.to_string()))?;
            let sizes = document
                .pages()
                .iter()
                .map(|page| (page.width().value as f64, page.height().value as f64))
                .collect::<Vec<_>>();
            Ok::<_, AnnotateError>(sizes)
        })
        .await??;

        log::debug!("Opened {} ({} pages)", path.display(), page_sizes.len());
        Ok(Self { path, page_sizes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn viewport(&self, page: u32, scale: f64, rotation: Rotation) -> Result<Viewport> {
        let (width, height) = page
            .checked_sub(1)
            .and_then(|index| self.page_sizes.get(index as usize))
            .copied()
            .ok_or_else(|| AnnotateError::Render {
                page,
                message: "page out of range".to_string(),
            })?;
        Ok(Viewport::for_page(width, height, scale, rotation))
    }

    async fn render(
        &self,
        page: u32,
        viewport: &Viewport,
        mut surface: RgbaImage,
    ) -> Result<RgbaImage> {
        let path = self.path.clone();
        // Render upright, then turn the bitmap
        let rotation = viewport.rotation;
        let (width, height) = if rotation.is_quarter_turn() {
            let (w, h) = viewport.pixel_size()?;
            (h, w)
        } else {
            viewport.pixel_size()?
        };

        tokio::task::spawn_blocking(move || {
            let render_error = move |e: PdfiumError| AnnotateError::Render {
                page,
                message: e.to_string(),
            };
            let pdfium = init_pdfium().map_err(render_error)?;
            let document = pdfium.load_pdf_from_file(&path, None).map_err(render_error)?;
            let page_handle = document
                .pages()
                .get((page - 1) as PdfPageIndex)
                .map_err(render_error)?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as Pixels)
                .set_maximum_height(height as Pixels);

            let bitmap = page_handle.render_with_config(&config).map_err(render_error)?;
            let rendered = rotate_bitmap(bitmap.as_image().into_rgba8(), rotation);
            image::imageops::overlay(&mut surface, &rendered, 0, 0);
            Ok(surface)
        })
        .await?
    }
}

fn rotate_bitmap(bitmap: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => bitmap,
        Rotation::Clockwise90 => image::imageops::rotate90(&bitmap),
        Rotation::Clockwise180 => image::imageops::rotate180(&bitmap),
        Rotation::Clockwise270 => image::imageops::rotate270(&bitmap),
    }
}
