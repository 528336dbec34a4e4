//! Lossless page encoding
//!
//! Pages are encoded as PNG. A PDF image XObject can carry PNG pixel data
//! as-is: the concatenated IDAT chunks form a zlib stream that FlateDecode
//! with a PNG predictor understands, so no re-encoding is needed.

use crate::types::{AnnotateError, Result};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Encode a composited page as an opaque RGB PNG
pub fn encode_png(surface: RgbaImage) -> Result<Vec<u8>> {
    let (width, height) = surface.dimensions();
    let rgb = image::DynamicImage::ImageRgba8(surface).into_rgb8();

    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
    Ok(bytes)
}

/// PNG color types an image XObject can take without a soft mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngColorType {
    Gray,
    Rgb,
}

impl PngColorType {
    pub fn components(self) -> u8 {
        match self {
            PngColorType::Gray => 1,
            PngColorType::Rgb => 3,
        }
    }

    pub fn pdf_color_space(self) -> &'static [u8] {
        match self {
            PngColorType::Gray => b"DeviceGray",
            PngColorType::Rgb => b"DeviceRGB",
        }
    }
}

/// Header fields and compressed pixel data of a PNG
#[derive(Debug, Clone, PartialEq)]
pub struct PngImageData {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: PngColorType,
    /// Concatenated IDAT payloads (a single zlib stream)
    pub idat: Vec<u8>,
}

impl PngImageData {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PNG_SIGNATURE.len() || bytes[..8] != PNG_SIGNATURE {
            return Err(png_error("missing PNG signature"));
        }

        let mut header: Option<(u32, u32, u8, PngColorType)> = None;
        let mut idat = Vec::new();
        let mut offset = PNG_SIGNATURE.len();

        while offset + 8 <= bytes.len() {
            let length = read_u32(bytes, offset)? as usize;
            let chunk_type = &bytes[offset + 4..offset + 8];
            let data_start = offset + 8;
            let data_end = data_start
                .checked_add(length)
                .filter(|end| end + 4 <= bytes.len())
                .ok_or_else(|| png_error("truncated chunk"))?;
            let data = &bytes[data_start..data_end];

            match chunk_type {
                b"IHDR" => header = Some(parse_header(data)?),
                b"IDAT" => idat.extend_from_slice(data),
                b"IEND" => break,
                _ => {}
            }
            // Skip the CRC
            offset = data_end + 4;
        }

        let (width, height, bit_depth, color_type) =
            header.ok_or_else(|| png_error("missing IHDR chunk"))?;
        if idat.is_empty() {
            return Err(png_error("missing IDAT data"));
        }

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            idat,
        })
    }
}

fn parse_header(data: &[u8]) -> Result<(u32, u32, u8, PngColorType)> {
    if data.len() != 13 {
        return Err(png_error("IHDR must be 13 bytes"));
    }
    let width = read_u32(data, 0)?;
    let height = read_u32(data, 4)?;
    let bit_depth = data[8];
    let color_type = match data[9] {
        0 => PngColorType::Gray,
        2 => PngColorType::Rgb,
        other => {
            return Err(png_error(&format!(
                "color type {} is not supported without a soft mask",
                other
            )));
        }
    };
    if data[12] != 0 {
        return Err(png_error("interlaced PNGs are not supported"));
    }
    if width == 0 || height == 0 {
        return Err(png_error("zero-sized image"));
    }
    Ok((width, height, bit_depth, color_type))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| png_error("unexpected end of data"))
}

fn png_error(message: &str) -> AnnotateError {
    AnnotateError::Png(message.to_string())
}
