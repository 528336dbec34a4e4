//! State of one export run

use super::assemble::OutputDocument;
use super::png::encode_png;
use super::render::{PageRenderer, Viewport};
use crate::constants::DEFAULT_PAGE_DIMENSIONS;
use crate::geometry::PixelRect;
use crate::overlay::{PageOverlay, draw_overlay};
use crate::types::{AnnotateError, Result, Rotation};
use image::{Rgba, RgbaImage};

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Transient state of one export call, dropped after delivery or failure
pub(crate) struct ExportJob<'r, R, D> {
    source: &'r R,
    scale: f64,
    rotation: Rotation,
    current_page: u32,
    output: D,
    page_sizes: Vec<(u32, u32)>,
}

impl<'r, R: PageRenderer, D: OutputDocument> ExportJob<'r, R, D> {
    pub(crate) fn new(source: &'r R, output: D, scale: f64, rotation: Rotation) -> Self {
        Self {
            source,
            scale,
            rotation,
            current_page: 0,
            output,
            page_sizes: Vec::new(),
        }
    }

    pub(crate) fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Whether a failed page left a page behind in the output document
    pub(crate) fn has_partial_page(&self) -> bool {
        self.output.page_count() != self.page_sizes.len()
    }

    /// Render, composite, encode and append one page
    pub(crate) async fn process_page(
        &mut self,
        page: u32,
        overlay: PageOverlay,
    ) -> Result<(u32, u32)> {
        self.current_page = page;

        let viewport = self.source.viewport(page, self.scale, self.rotation)?;
        let (width, height) = viewport.pixel_size()?;
        let surface = RgbaImage::from_pixel(width, height, PAGE_BACKGROUND);

        let surface = self.source.render(page, &viewport, surface).await?;
        if surface.dimensions() != (width, height) {
            return Err(AnnotateError::Render {
                page,
                message: format!(
                    "renderer returned a {}x{} surface for a {}x{} viewport",
                    surface.width(),
                    surface.height(),
                    width,
                    height
                ),
            });
        }

        self.append_surface(surface, overlay).await
    }

    /// Append a blank page in place of one that failed to render.
    ///
    /// Annotations are still drawn so they are not lost from the export.
    pub(crate) async fn substitute_blank_page(
        &mut self,
        page: u32,
        overlay: PageOverlay,
    ) -> Result<(u32, u32)> {
        self.current_page = page;

        let (width, height) = match self
            .source
            .viewport(page, self.scale, self.rotation)
            .and_then(|viewport| viewport.pixel_size())
        {
            Ok(size) => size,
            Err(_) => {
                let (w, h) = DEFAULT_PAGE_DIMENSIONS;
                Viewport::for_page(w, h, self.scale, self.rotation).pixel_size()?
            }
        };
        let surface = RgbaImage::from_pixel(width, height, PAGE_BACKGROUND);

        self.append_surface(surface, overlay).await
    }

    async fn append_surface(
        &mut self,
        surface: RgbaImage,
        overlay: PageOverlay,
    ) -> Result<(u32, u32)> {
        let (width, height) = surface.dimensions();

        // Compositing and encoding are CPU-bound
        let png = tokio::task::spawn_blocking(move || {
            let mut surface = surface;
            draw_overlay(&mut surface, width as f64, height as f64, &overlay);
            encode_png(surface)
        })
        .await??;

        // Embed first so a rejected image leaves no page behind
        let image_handle = self.output.embed_png(&png)?;
        let page_handle = self.output.add_page(width as f64, height as f64)?;
        self.output.draw_image(
            page_handle,
            image_handle,
            PixelRect::new(0.0, 0.0, width as f64, height as f64),
        )?;

        self.page_sizes.push((width, height));
        Ok((width, height))
    }

    /// Serialize the accumulated output document
    pub(crate) async fn finish(self) -> Result<(Vec<u8>, Vec<(u32, u32)>)> {
        let output = self.output;
        let bytes = tokio::task::spawn_blocking(move || output.save()).await??;
        Ok((bytes, self.page_sizes))
    }
}
