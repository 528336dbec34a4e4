//! Output document assembly
//!
//! The pipeline builds its result through [`DocumentAssembler`] and
//! [`OutputDocument`]. [`LopdfAssembler`] is the default implementation.

use super::png::PngImageData;
use crate::geometry::PixelRect;
use crate::types::{AnnotateError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Handle to a page added to an [`OutputDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle(pub usize);

/// Handle to an image embedded in an [`OutputDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub usize);

/// Factory for output documents
pub trait DocumentAssembler: Send + Sync {
    type Document: OutputDocument;

    /// Whether the backing library can be used at all
    fn is_available(&self) -> bool {
        true
    }

    fn create(&self) -> Result<Self::Document>;
}

/// A document being assembled page by page
pub trait OutputDocument: Send + 'static {
    /// Append a page of `width × height` units
    fn add_page(&mut self, width: f64, height: f64) -> Result<PageHandle>;

    fn embed_png(&mut self, png: &[u8]) -> Result<ImageHandle>;

    /// Draw an embedded image into `rect`; the origin is the page's lower left
    fn draw_image(&mut self, page: PageHandle, image: ImageHandle, rect: PixelRect) -> Result<()>;

    fn page_count(&self) -> usize;

    /// Serialize the finished document
    fn save(self) -> Result<Vec<u8>>;
}

/// Builds PDF 1.7 documents with lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfAssembler;

impl DocumentAssembler for LopdfAssembler {
    type Document = LopdfDocument;

    fn create(&self) -> Result<LopdfDocument> {
        Ok(LopdfDocument::new())
    }
}

struct PendingPage {
    width: f64,
    height: f64,
    content: Vec<u8>,
    xobjects: Dictionary,
}

/// Document under construction; page objects are written on save
pub struct LopdfDocument {
    doc: Document,
    pages_tree_id: ObjectId,
    pages: Vec<PendingPage>,
    images: Vec<ObjectId>,
}

impl LopdfDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_tree_id = doc.new_object_id();
        Self {
            doc,
            pages_tree_id,
            pages: Vec::new(),
            images: Vec::new(),
        }
    }
}

impl Default for LopdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument for LopdfDocument {
    fn add_page(&mut self, width: f64, height: f64) -> Result<PageHandle> {
        if !(width > 0.0 && height > 0.0) {
            return Err(AnnotateError::Config(format!(
                "Invalid page size {}x{}",
                width, height
            )));
        }
        self.pages.push(PendingPage {
            width,
            height,
            content: Vec::new(),
            xobjects: Dictionary::new(),
        });
        Ok(PageHandle(self.pages.len() - 1))
    }

    fn embed_png(&mut self, png: &[u8]) -> Result<ImageHandle> {
        let data = PngImageData::parse(png)?;

        let decode_parms = Dictionary::from_iter(vec![
            ("Predictor", Object::Integer(15)),
            ("Colors", Object::Integer(data.color_type.components() as i64)),
            ("BitsPerComponent", Object::Integer(data.bit_depth as i64)),
            ("Columns", Object::Integer(data.width as i64)),
        ]);
        let image_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(data.width as i64)),
            ("Height", Object::Integer(data.height as i64)),
            (
                "ColorSpace",
                Object::Name(data.color_type.pdf_color_space().to_vec()),
            ),
            ("BitsPerComponent", Object::Integer(data.bit_depth as i64)),
            ("Filter", Object::Name(b"FlateDecode".to_vec())),
            ("DecodeParms", Object::Dictionary(decode_parms)),
        ]);

        // The IDAT stream is already deflated
        let mut stream = Stream::new(image_dict, data.idat);
        stream.allows_compression = false;

        let image_id = self.doc.add_object(stream);
        self.images.push(image_id);
        Ok(ImageHandle(self.images.len() - 1))
    }

    fn draw_image(&mut self, page: PageHandle, image: ImageHandle, rect: PixelRect) -> Result<()> {
        let image_id = *self
            .images
            .get(image.0)
            .ok_or_else(|| AnnotateError::Config(format!("Unknown image handle {}", image.0)))?;
        let pending = self
            .pages
            .get_mut(page.0)
            .ok_or_else(|| AnnotateError::Config(format!("Unknown page handle {}", page.0)))?;

        let name = format!("Im{}", image.0);
        pending
            .xobjects
            .set(name.as_bytes(), Object::Reference(image_id));
        pending.content.extend_from_slice(
            format!(
                "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
                rect.w, rect.h, rect.x, rect.y, name
            )
            .as_bytes(),
        );
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn save(mut self) -> Result<Vec<u8>> {
        let mut page_refs = Vec::with_capacity(self.pages.len());

        for pending in std::mem::take(&mut self.pages) {
            let content_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), pending.content));

            let resources = Dictionary::from_iter(vec![(
                "XObject",
                Object::Dictionary(pending.xobjects),
            )]);
            let page_dict = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(self.pages_tree_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(pending.width as f32),
                        Object::Real(pending.height as f32),
                    ]),
                ),
                ("Resources", Object::Dictionary(resources)),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_refs.push(Object::Reference(self.doc.add_object(page_dict)));
        }

        // Create pages tree
        let count = page_refs.len() as i64;
        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(page_refs)),
            ("Count", Object::Integer(count)),
        ]);
        self.doc
            .objects
            .insert(self.pages_tree_id, Object::Dictionary(pages_dict));

        // Create catalog
        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_tree_id)),
        ]));
        self.doc.trailer.set("Root", catalog_id);

        let mut writer = Vec::new();
        self.doc.save_to(&mut writer)?;
        Ok(writer)
    }
}
