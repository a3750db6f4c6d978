//! # Card Rendering
//!
//! Composites the display name onto the source image.
//!
//! ## Geometry
//!
//! Everything is relative to the image's natural size, so one set of
//! settings lays out the same on a thumbnail and on a full-size photo:
//!
//! ```text
//! anchor         = (position.x * width, position.y * height)
//! effective size = size_pt / 600 * height
//! ```
//!
//! The size is expressed against a 600px-tall reference image. The text is
//! centred horizontally on the anchor and sits on its baseline.
//!
//! ## Usage Example
//!
//! ```
//! use namecard::render::{effective_font_size, text_anchor};
//! use namecard::settings::Position;
//!
//! assert_eq!(text_anchor(Position::new(0.5, 0.1), 1000, 800), (500.0, 80.0));
//! assert_eq!(effective_font_size(30.0, 800), 40.0);
//! ```

pub mod source;
pub mod text;

pub use source::SourceImage;

use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::CardError;
use crate::fonts::FontRegistry;
use crate::settings::{Position, Settings};
use text::Synthesis;

/// Image height the configured size is expressed against.
pub const REFERENCE_HEIGHT: f32 = 600.0;

/// Largest drawable text, as a multiple of the image height.
pub const MAX_SIZE_FACTOR: f32 = 4.0;

/// Largest drawable text in pixels, whatever the image height.
pub const MAX_PIXEL_SIZE: f32 = 4096.0;

/// Absolute text anchor for a relative position.
pub fn text_anchor(position: Position, width: u32, height: u32) -> (f32, f32) {
    (position.x * width as f32, position.y * height as f32)
}

/// Font size in pixels for an image of the given height.
pub fn effective_font_size(size_pt: f32, height: u32) -> f32 {
    size_pt / REFERENCE_HEIGHT * height as f32
}

/// [`effective_font_size`] if the text can be rasterized.
///
/// Sizes that are not positive, or larger than [`MAX_SIZE_FACTOR`] image
/// heights or [`MAX_PIXEL_SIZE`], give `None`.
pub fn drawable_font_size(size_pt: f32, height: u32) -> Option<f32> {
    let size = effective_font_size(size_pt, height);
    let limit = (height as f32 * MAX_SIZE_FACTOR).min(MAX_PIXEL_SIZE);
    (size.is_finite() && size > 0.0 && size <= limit).then_some(size)
}

/// CSS-style font shorthand, e.g. `italic bold 40px Lobster`.
pub fn font_descriptor(settings: &Settings, pixel_size: f32) -> String {
    let mut out = String::new();
    if settings.italic {
        out.push_str("italic ");
    }
    if settings.bold {
        out.push_str("bold ");
    }
    out.push_str(&format!("{}px {}", pixel_size, settings.font_family));
    out
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Anything else is black.
pub fn parse_color(hex: &str) -> Rgba<u8> {
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    let digits = hex.trim().trim_start_matches('#');
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return BLACK;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0);
    match digits.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).unwrap_or(0) * 17;
            Rgba([nibble(0), nibble(1), nibble(2), 255])
        }
        6 => Rgba([channel(0), channel(2), channel(4), 255]),
        8 => Rgba([channel(0), channel(2), channel(4), channel(6)]),
        _ => BLACK,
    }
}

/// A composited card, PNG encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RenderedCard {
    /// `data:image/png;base64,...`, ready for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// Draw the card onto a fresh surface and return the raw pixels.
///
/// Fails only when no surface can be created for the image.
pub fn compose(
    source: &SourceImage,
    settings: &Settings,
    fonts: &FontRegistry,
) -> Result<RgbaImage, CardError> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(CardError::NoDrawingSurface { width, height });
    }

    let mut surface = source.image().to_rgba8();

    let anchor = text_anchor(settings.position, width, height);
    let Some(size) = drawable_font_size(settings.size_pt, height) else {
        eprintln!(
            "[render] Size {}pt is out of range for a {}px tall image, drawing image only",
            settings.size_pt, height
        );
        return Ok(surface);
    };

    match fonts.select(&settings.font_family, settings.bold, settings.italic) {
        Some(face) => {
            let synthesis = Synthesis {
                bold: settings.bold && !face.bold,
                italic: settings.italic && !face.italic,
            };
            text::draw_text_centered(
                &mut surface,
                &face.font,
                &settings.display_name,
                size,
                anchor,
                parse_color(&settings.color_hex),
                synthesis,
            );
        }
        None => eprintln!(
            "[render] No font loaded for '{}', drawing image only",
            font_descriptor(settings, size)
        ),
    }

    Ok(surface)
}

/// [`compose`] and encode as PNG.
pub fn render_card(
    source: &SourceImage,
    settings: &Settings,
    fonts: &FontRegistry,
) -> Result<RenderedCard, CardError> {
    let surface = compose(source, settings, fonts)?;
    let mut png = Vec::new();
    surface
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CardError::Image(format!("PNG encoding failed: {}", e)))?;

    Ok(RenderedCard {
        width: surface.width(),
        height: surface.height(),
        png,
    })
}

/// Renders cards off the async runtime.
#[derive(Clone)]
pub struct CardRenderer {
    fonts: Arc<FontRegistry>,
}

impl CardRenderer {
    pub fn new(fonts: Arc<FontRegistry>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    /// Render on the blocking pool.
    ///
    /// Yields once before drawing so that anything queued ahead of the
    /// render (a pending settings write, a preview resize) runs first.
    pub async fn render(
        &self,
        source: Arc<SourceImage>,
        settings: Settings,
    ) -> Result<RenderedCard, CardError> {
        tokio::task::yield_now().await;

        let fonts = self.fonts.clone();
        tokio::task::spawn_blocking(move || render_card(&source, &settings, &fonts))
            .await
            .map_err(|e| CardError::Image(format!("Render task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn blank(width: u32, height: u32) -> SourceImage {
        SourceImage::from_image(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]))),
            "blank.png",
        )
    }

    #[test]
    fn test_anchor_is_fraction_of_size() {
        for &(fx, fy) in &[(0.0, 0.0), (1.0, 1.0), (0.25, 0.75), (0.5, 0.1)] {
            for &(w, h) in &[(1, 1), (640, 480), (1000, 800), (4032, 3024)] {
                assert_eq!(
                    text_anchor(Position::new(fx, fy), w, h),
                    (fx * w as f32, fy * h as f32)
                );
            }
        }
    }

    #[test]
    fn test_size_scales_with_height() {
        for size in [8.0, 14.0, 30.0, 72.5] {
            for h in [100, 600, 801, 3024] {
                assert_eq!(
                    effective_font_size(size, h * 2),
                    2.0 * effective_font_size(size, h)
                );
            }
        }
        assert_eq!(effective_font_size(14.0, 600), 14.0);
    }

    #[test]
    fn test_drawable_size_is_bounded() {
        assert_eq!(drawable_font_size(30.0, 800), Some(40.0));
        assert_eq!(drawable_font_size(2400.0, 600), Some(2400.0));
        assert_eq!(drawable_font_size(2401.0, 600), None);
        assert_eq!(drawable_font_size(3_000_000.0, 600), None);
        assert_eq!(drawable_font_size(600.0, 6000), None);
        assert_eq!(drawable_font_size(0.0, 600), None);
        assert_eq!(drawable_font_size(-12.0, 600), None);
    }

    #[test]
    fn test_huge_size_leaves_image_untouched() {
        let source = blank(60, 60);
        let settings = Settings {
            size_pt: 3_000_000.0,
            ..Default::default()
        };
        let surface = compose(&source, &settings, &FontRegistry::new()).unwrap();
        assert!(surface.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_font_descriptor() {
        let mut settings = Settings::default();
        assert_eq!(font_descriptor(&settings, 14.0), "14px sans-serif");
        settings.italic = true;
        settings.bold = true;
        settings.font_family = "Lobster".to_string();
        assert_eq!(font_descriptor(&settings, 40.0), "italic bold 40px Lobster");
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#000000"), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_color("#a01f3c"), Rgba([0xa0, 0x1f, 0x3c, 255]));
        assert_eq!(parse_color("#fff"), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#11223380"), Rgba([0x11, 0x22, 0x33, 0x80]));
        assert_eq!(parse_color("red"), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_color("#12345"), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_zero_sized_image_has_no_surface() {
        let err = compose(&blank(0, 10), &Settings::default(), &FontRegistry::new()).unwrap_err();
        assert!(matches!(
            err,
            CardError::NoDrawingSurface { width: 0, height: 10 }
        ));
    }

    #[test]
    fn test_without_fonts_image_passes_through() {
        let source = blank(20, 10);
        let surface = compose(&source, &Settings::default(), &FontRegistry::new()).unwrap();
        assert_eq!(surface.dimensions(), (20, 10));
        assert!(surface.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_render_is_deterministic() {
        let source = blank(64, 48);
        let settings = Settings::default();
        let fonts = FontRegistry::new();
        let a = render_card(&source, &settings, &fonts).unwrap();
        let b = render_card(&source, &settings, &fonts).unwrap();
        assert_eq!(a, b);
        assert_eq!((a.width, a.height), (64, 48));
        assert!(a.to_data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
