//! TTF text rasterization onto an RGBA surface.
//!
//! Lays out a single line with ab_glyph, centres it horizontally on the
//! anchor and puts its alphabetic baseline on the anchor's y. Coverage is
//! alpha-blended into the surface, so edges stay anti-aliased.
//!
//! Faces that lack the requested weight or slant get a synthetic version:
//! bold by overdrawing with a small horizontal offset, italic by shearing
//! each glyph around the baseline.

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::{Rgba, RgbaImage};

/// Horizontal shear applied for synthetic italics (about 11 degrees).
const SYNTHETIC_ITALIC_SHEAR: f32 = 0.2;

/// Style adjustments for faces missing the requested style.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Synthesis {
    pub bold: bool,
    pub italic: bool,
}

/// Width of `text` in pixels at `pixel_height`, kerning included.
pub fn measure_text(font: &FontArc, text: &str, pixel_height: f32) -> f32 {
    layout(font, text, pixel_height).1
}

/// Draw `text` centred on `anchor.0` with its baseline on `anchor.1`.
///
/// Pixels outside the surface are clipped.
pub fn draw_text_centered(
    canvas: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    pixel_height: f32,
    anchor: (f32, f32),
    color: Rgba<u8>,
    synthesis: Synthesis,
) {
    if text.is_empty() || pixel_height <= 0.0 {
        return;
    }

    let (glyphs, width) = layout(font, text, pixel_height);
    let start_x = anchor.0 - width / 2.0;
    let baseline = anchor.1;

    let passes: &[f32] = if synthesis.bold {
        &[0.0, (pixel_height / 24.0).max(1.0)]
    } else {
        &[0.0]
    };
    let shear = if synthesis.italic { SYNTHETIC_ITALIC_SHEAR } else { 0.0 };

    for &offset in passes {
        for &(glyph_id, glyph_x) in &glyphs {
            let glyph = glyph_id
                .with_scale_and_position(pixel_height, point(start_x + glyph_x + offset, baseline));

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let y = bounds.min.y + py as f32;
                let dx = (baseline - y) * shear;
                let x = (bounds.min.x + px as f32 + dx).round() as i64;
                let y = y as i64;
                if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
                    blend(canvas.get_pixel_mut(x as u32, y as u32), color, coverage);
                }
            });
        }
    }
}

/// Glyph ids with their pen x positions, plus the total advance.
fn layout(font: &FontArc, text: &str, pixel_height: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(pixel_height);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut caret_x = 0.0f32;
    let mut previous: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, caret_x));
        caret_x += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    (glyphs, caret_x)
}

/// Source-over blend of `color` at `coverage` onto `dst`.
fn blend(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let a = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    for c in 0..3 {
        let src = color[c] as f32;
        let under = dst[c] as f32;
        let value = if out_a > 0.0 {
            (src * a + under * dst_a * (1.0 - a)) / out_a
        } else {
            0.0
        };
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
