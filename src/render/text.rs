//! Label text rasterization. Glyph outlines come from an `ab_glyph` face
//! supplied by the embedding shell; coverage is blended straight into the
//! target pixmap.

use std::path::Path;

use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use thiserror::Error;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::geometry::Color;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error("font data is not a usable face")]
    Invalid(#[from] ab_glyph::InvalidFont),
}

/// A loaded font face used for measurement labels.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
}

impl LabelFont {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        Ok(Self {
            font: FontArc::try_from_vec(data)?,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Kerned advance width of a single line at `px` pixels.
    pub fn line_width(&self, text: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut prev = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Draws one line centered on `center_x` with the vertical middle of the
    /// glyph box at `center_y`.
    pub(crate) fn draw_line_centered(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        center_x: f32,
        center_y: f32,
        px: f32,
        color: Color,
    ) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let mut caret = center_x - self.line_width(text, px) / 2.0;
        // descent() is negative, so this lands the optical middle on center_y.
        let baseline = center_y + (scaled.ascent() + scaled.descent()) / 2.0;

        let mut prev = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            let glyph: Glyph = id.with_scale_and_position(scale, point(caret, baseline));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    blend_pixel(
                        pixmap,
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                        color,
                        coverage,
                    );
                });
            }
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").finish_non_exhaustive()
    }
}

/// Source-over blend of one coverage sample into a premultiplied pixmap.
fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, color: Color, coverage: f32) {
    if coverage <= 0.0 {
        return;
    }
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;
    if x < 0 || y < 0 || x >= width || y >= height {
        return;
    }

    let alpha = coverage.min(1.0);
    let inv = 1.0 - alpha;
    let index = y as usize * width as usize + x as usize;
    let dst = pixmap.pixels_mut()[index];

    let blend = |src: u8, dst: u8| -> u8 {
        (src as f32 / 255.0 * alpha + dst as f32 / 255.0 * inv)
            .clamp(0.0, 1.0)
            .mul_add(255.0, 0.5) as u8
    };
    let a = blend(255, dst.alpha());
    let r = blend(color.r, dst.red()).min(a);
    let g = blend(color.g, dst.green()).min(a);
    let b = blend(color.b, dst.blue()).min(a);
    if let Some(px) = PremultipliedColorU8::from_rgba(r, g, b, a) {
        pixmap.pixels_mut()[index] = px;
    }
}
