//! Uploaded source images.

use image::DynamicImage;
use std::sync::Arc;

use crate::error::CardError;

/// A decoded upload. Replaced wholesale on the next upload, never edited.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub filename: String,
    /// The bytes as uploaded
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    image: DynamicImage,
}

impl SourceImage {
    /// Decode uploaded bytes. HEIC/HEIF needs the `heif` feature.
    pub fn decode(bytes: Vec<u8>, filename: &str) -> Result<Self, CardError> {
        let lower = filename.to_lowercase();
        let image = if is_heic(&bytes) || lower.ends_with(".heic") || lower.ends_with(".heif") {
            decode_heic(&bytes)?
        } else {
            image::load_from_memory(&bytes)
                .map_err(|e| CardError::Image(format!("Failed to decode image: {}", e)))?
        };

        Ok(Self {
            filename: filename.to_string(),
            bytes: bytes.into(),
            width: image.width(),
            height: image.height(),
            image,
        })
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: DynamicImage, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            bytes: Arc::from(Vec::new()),
            width: image.width(),
            height: image.height(),
            image,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// HEIC files carry an `ftyp` box with a HEIF-family brand.
fn is_heic(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    matches!(
        &data[8..12],
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"hevm" | b"hevs" | b"mif1" | b"msf1"
    )
}

#[cfg(feature = "heif")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage, CardError> {
    use image::RgbaImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data)
        .map_err(|e| CardError::Image(format!("Failed to read HEIC: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| CardError::Image(format!("Failed to get primary image: {}", e)))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(|e| CardError::Image(format!("Failed to decode HEIC image: {}", e)))?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| CardError::Image("No interleaved RGBA data in HEIC".to_string()))?;

    let width = decoded.width();
    let height = decoded.height();
    let row_bytes = width as usize * 4;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in interleaved.data.chunks(interleaved.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }

    RgbaImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| CardError::Image("Truncated HEIC pixel data".to_string()))
}

#[cfg(not(feature = "heif"))]
fn decode_heic(_data: &[u8]) -> Result<DynamicImage, CardError> {
    Err(CardError::Image(
        "HEIC images need the `heif` feature".to_string(),
    ))
}
