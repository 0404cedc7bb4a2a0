//! Shared drawing pipeline for the interactive canvas and the export
//! rasterizer. One algorithm renders both surfaces: geometry is multiplied
//! by the canvas scale factor while stroke widths, marker sizes, font sizes
//! and the directional label offset stay in output pixels, matching what the
//! user saw on screen.

mod text;

pub use text::{FontError, LabelFont};

use image::RgbaImage;
use tiny_skia::{
    FillRule, FilterQuality, IntSize, LineCap, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, StrokeDash, Transform,
};

use crate::geometry::{Color, ImagePoint};
use crate::measure::{LabelPlacement, Measurement, MeasurementStyle, PointStyle, TextPosition};
use crate::session::MeasureSession;

/// Distance from the segment midpoint to a directionally placed label, in
/// output pixels.
pub const DIRECTIONAL_LABEL_OFFSET_PX: f32 = 20.0;

/// Extra leading between stacked label lines, in output pixels.
pub const LABEL_LINE_SPACING_PX: f32 = 4.0;

const MARKER_OUTLINE_WIDTH: f32 = 2.0;
const HALO_RADIUS: f32 = 1.5;
const HANDLE_HALF_PX: f32 = 4.0;

/// Renders the backdrop and every measurement onto `pixmap` at `scale`
/// output pixels per image pixel. Labels need a font; without one they are
/// skipped and the omission is logged.
pub fn render_scene(
    pixmap: &mut Pixmap,
    base: Option<&Pixmap>,
    measurements: &[Measurement],
    scale: f32,
    font: Option<&LabelFont>,
) {
    if let Some(base) = base {
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(
            0,
            0,
            base.as_ref(),
            &paint,
            Transform::from_scale(scale, scale),
            None,
        );
    }
    if font.is_none() && !measurements.is_empty() {
        tracing::warn!("no label font configured, measurement labels skipped");
    }
    for measurement in measurements {
        draw_measurement(pixmap, measurement, scale, font);
    }
}

/// Renders the interactive canvas for a session: scene, rubber-band preview
/// of an in-flight drawing gesture, and endpoint handles on the selection.
pub fn render_interactive(
    session: &MeasureSession,
    base: Option<&Pixmap>,
    font: Option<&LabelFont>,
) -> Option<Pixmap> {
    let size = session.image_size()?;
    let scale = session.display_scale();
    let width = (size.width as f64 * scale).round().max(1.0) as u32;
    let height = (size.height as f64 * scale).round().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)?;
    let scale = scale as f32;

    render_scene(&mut pixmap, base, session.measurements(), scale, font);

    if let Some((from, to)) = session.gesture_preview() {
        let defaults = session.defaults();
        draw_segment(
            &mut pixmap,
            scaled(from, scale),
            scaled(to, scale),
            defaults.color,
            defaults.line_width as f32,
            StrokeDash::new(vec![6.0, 4.0], 0.0),
        );
    }
    if let Some(selected) = session
        .selected_id()
        .and_then(|id| session.collection().get(id))
    {
        draw_handle(&mut pixmap, scaled(selected.start, scale), selected.style.color);
        draw_handle(&mut pixmap, scaled(selected.end, scale), selected.style.color);
    }
    Some(pixmap)
}

fn scaled(point: ImagePoint, scale: f32) -> (f32, f32) {
    (point.x as f32 * scale, point.y as f32 * scale)
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = true;
    paint
}

fn draw_measurement(pixmap: &mut Pixmap, m: &Measurement, scale: f32, font: Option<&LabelFont>) {
    let start = scaled(m.start, scale);
    let end = scaled(m.end, scale);
    draw_segment(pixmap, start, end, m.style.color, m.style.line_width as f32, None);
    draw_marker(pixmap, start, end, &m.style);
    draw_marker(pixmap, end, start, &m.style);
    if let Some(font) = font {
        draw_label(pixmap, m, scale, font);
    }
}

fn draw_segment(
    pixmap: &mut Pixmap,
    from: (f32, f32),
    to: (f32, f32),
    color: Color,
    width: f32,
    dash: Option<StrokeDash>,
) {
    let mut builder = PathBuilder::new();
    builder.move_to(from.0, from.1);
    builder.line_to(to.0, to.1);
    let Some(path) = builder.finish() else {
        return;
    };
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        dash,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
}

/// Endpoint marker at `at`, oriented away from `other` for the arrow style.
/// Filled in the measurement color with a white outline so markers stay
/// visible over dark product photos.
fn draw_marker(pixmap: &mut Pixmap, at: (f32, f32), other: (f32, f32), style: &MeasurementStyle) {
    let radius = style.pointer_width as f32;
    let Some(path) = marker_path(at, other, style.point_style, radius) else {
        return;
    };
    pixmap.fill_path(
        &path,
        &solid(style.color),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let outline = Stroke {
        width: MARKER_OUTLINE_WIDTH,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid(Color::WHITE), &outline, Transform::identity(), None);
}

fn marker_path(at: (f32, f32), other: (f32, f32), kind: PointStyle, r: f32) -> Option<Path> {
    let mut builder = PathBuilder::new();
    match kind {
        PointStyle::Round => builder.push_circle(at.0, at.1, r),
        PointStyle::Square => {
            builder.push_rect(Rect::from_ltrb(at.0 - r, at.1 - r, at.0 + r, at.1 + r)?)
        }
        PointStyle::Diamond => {
            builder.move_to(at.0, at.1 - r);
            builder.line_to(at.0 + r, at.1);
            builder.line_to(at.0, at.1 + r);
            builder.line_to(at.0 - r, at.1);
            builder.close();
        }
        PointStyle::Arrow => {
            let dx = at.0 - other.0;
            let dy = at.1 - other.1;
            let len = (dx * dx + dy * dy).sqrt();
            if len <= f32::EPSILON {
                // Degenerate segment, no outward direction to point at.
                builder.push_circle(at.0, at.1, r);
            } else {
                let (ux, uy) = (dx / len, dy / len);
                let (nx, ny) = (-uy, ux);
                let base_x = at.0 - ux * 2.0 * r;
                let base_y = at.1 - uy * 2.0 * r;
                builder.move_to(at.0, at.1);
                builder.line_to(base_x + nx * r, base_y + ny * r);
                builder.line_to(base_x - nx * r, base_y - ny * r);
                builder.close();
            }
        }
    }
    builder.finish()
}

fn draw_label(pixmap: &mut Pixmap, m: &Measurement, scale: f32, font: &LabelFont) {
    let mid = m.midpoint();
    let mut anchor_x = mid.x as f32 * scale;
    let mut anchor_y = mid.y as f32 * scale;
    match m.style.placement {
        // User-dragged offsets are stored in image space and follow the zoom.
        LabelPlacement::Explicit { dx, dy } => {
            anchor_x += dx as f32 * scale;
            anchor_y += dy as f32 * scale;
        }
        LabelPlacement::Directional(position) => match position {
            TextPosition::Top => anchor_y -= DIRECTIONAL_LABEL_OFFSET_PX,
            TextPosition::Bottom => anchor_y += DIRECTIONAL_LABEL_OFFSET_PX,
            TextPosition::Left => anchor_x -= DIRECTIONAL_LABEL_OFFSET_PX,
            TextPosition::Right => anchor_x += DIRECTIONAL_LABEL_OFFSET_PX,
        },
    }

    let text = m.label_text();
    let lines: Vec<&str> = text.split('\n').collect();
    let px = m.style.font_size as f32;
    let line_height = px + LABEL_LINE_SPACING_PX;
    let first_y = anchor_y - (lines.len() as f32 - 1.0) * line_height / 2.0;

    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = first_y + index as f32 * line_height;
        for (hx, hy) in halo_offsets() {
            font.draw_line_centered(pixmap, line, anchor_x + hx, y + hy, px, Color::WHITE);
        }
        font.draw_line_centered(pixmap, line, anchor_x, y, px, Color::BLACK);
    }
}

fn halo_offsets() -> [(f32, f32); 8] {
    let d = HALO_RADIUS * std::f32::consts::FRAC_1_SQRT_2;
    [
        (-HALO_RADIUS, 0.0),
        (HALO_RADIUS, 0.0),
        (0.0, -HALO_RADIUS),
        (0.0, HALO_RADIUS),
        (-d, -d),
        (-d, d),
        (d, -d),
        (d, d),
    ]
}

fn draw_handle(pixmap: &mut Pixmap, at: (f32, f32), color: Color) {
    let Some(rect) = Rect::from_ltrb(
        at.0 - HANDLE_HALF_PX,
        at.1 - HANDLE_HALF_PX,
        at.0 + HANDLE_HALF_PX,
        at.1 + HANDLE_HALF_PX,
    ) else {
        return;
    };
    let path = PathBuilder::from_rect(rect);
    pixmap.fill_path(
        &path,
        &solid(Color::WHITE),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let outline = Stroke {
        width: 1.5,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid(color), &outline, Transform::identity(), None);
}

/// Converts a decoded image to tiny-skia's premultiplied storage.
pub fn rgba_image_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        data.extend_from_slice(&[premultiply(r, a), premultiply(g, a), premultiply(b, a), a]);
    }
    Pixmap::from_vec(data, size)
}

/// Converts a rendered pixmap back to straight-alpha RGBA for encoding.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (src, dst) in pixmap.pixels().iter().zip(image.pixels_mut()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((channel as u16 * alpha as u16 + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImageSize;
    use crate::measure::{MeasurementId, MeasurementStyle};
    use crate::session::ToolKind;

    fn horizontal_line() -> Measurement {
        Measurement::new(
            MeasurementId::new(1),
            ImagePoint::new(10.0, 10.0),
            ImagePoint::new(110.0, 10.0),
            MeasurementStyle::default(),
        )
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let px = pixmap.pixel(x, y).unwrap();
        (px.red(), px.green(), px.blue(), px.alpha())
    }

    fn test_font() -> LabelFont {
        LabelFont::from_bytes(include_bytes!("testdata/DejaVuSansMono.ttf").to_vec()).unwrap()
    }

    fn straight(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        (c.red(), c.green(), c.blue(), c.alpha())
    }

    /// Bounding box of all non-transparent pixels within the window.
    fn ink_bbox(
        pixmap: &Pixmap,
        x_range: std::ops::Range<u32>,
        y_range: std::ops::Range<u32>,
    ) -> Option<(u32, u32, u32, u32)> {
        let mut bbox: Option<(u32, u32, u32, u32)> = None;
        for y in y_range {
            for x in x_range.clone() {
                if pixmap.pixel(x, y).unwrap().alpha() == 0 {
                    continue;
                }
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bbox
    }

    #[test]
    fn line_pixels_match_between_native_and_zoomed_scales() {
        let line = horizontal_line();

        let mut native = Pixmap::new(200, 100).unwrap();
        render_scene(&mut native, None, std::slice::from_ref(&line), 1.0, None);

        let mut zoomed = Pixmap::new(400, 200).unwrap();
        render_scene(&mut zoomed, None, std::slice::from_ref(&line), 2.0, None);

        // Stroke core at the segment midpoint is fully covered either way.
        assert_eq!(pixel(&native, 50, 10), (0, 0, 0, 255));
        assert_eq!(pixel(&zoomed, 100, 20), (0, 0, 0, 255));
    }

    #[test]
    fn stroke_width_does_not_grow_with_the_scale_factor() {
        let line = horizontal_line();
        let mut zoomed = Pixmap::new(400, 200).unwrap();
        render_scene(&mut zoomed, None, std::slice::from_ref(&line), 2.0, None);

        // A 2 px stroke at y=20 never reaches 4 rows away.
        assert_eq!(pixel(&zoomed, 100, 24).3, 0);
        assert_eq!(pixel(&zoomed, 100, 16).3, 0);
    }

    #[test]
    fn round_marker_fills_center_and_outlines_in_white() {
        let line = horizontal_line();
        let mut pixmap = Pixmap::new(200, 100).unwrap();
        render_scene(&mut pixmap, None, std::slice::from_ref(&line), 1.0, None);

        assert_eq!(pixel(&pixmap, 10, 10), (0, 0, 0, 255));
        // Ring of the white outline, radius 5, width 2.
        let (r, g, b, a) = pixel(&pixmap, 15, 10);
        assert_eq!((r, g, b, a), (255, 255, 255, 255));
    }

    #[test]
    fn arrow_marker_renders_a_filled_tip_at_the_endpoint() {
        let mut line = horizontal_line();
        line.style.point_style = PointStyle::Arrow;
        let mut pixmap = Pixmap::new(200, 100).unwrap();
        render_scene(&mut pixmap, None, std::slice::from_ref(&line), 1.0, None);

        // Just inside the triangle behind the end tip at (110, 10).
        assert_eq!(pixel(&pixmap, 105, 10).3, 255);
    }

    #[test]
    fn base_image_is_composited_under_the_annotations() {
        let base_image = RgbaImage::from_pixel(20, 20, image::Rgba([180, 20, 20, 255]));
        let base = rgba_image_to_pixmap(&base_image).unwrap();

        let mut pixmap = Pixmap::new(20, 20).unwrap();
        render_scene(&mut pixmap, Some(&base), &[], 1.0, None);
        assert_eq!(pixel(&pixmap, 5, 5), (180, 20, 20, 255));
    }

    #[test]
    fn pixmap_round_trip_preserves_opaque_pixels() {
        let source = RgbaImage::from_pixel(8, 8, image::Rgba([13, 200, 77, 255]));
        let pixmap = rgba_image_to_pixmap(&source).unwrap();
        let back = pixmap_to_rgba_image(&pixmap);
        assert_eq!(back, source);
    }

    #[test]
    fn pixmap_round_trip_keeps_translucency_close() {
        let source = RgbaImage::from_pixel(4, 4, image::Rgba([200, 100, 50, 128]));
        let pixmap = rgba_image_to_pixmap(&source).unwrap();
        let back = pixmap_to_rgba_image(&pixmap);
        let px = back.get_pixel(0, 0).0;
        assert_eq!(px[3], 128);
        for (got, want) in px.iter().zip([200u8, 100, 50, 128]) {
            assert!(got.abs_diff(want) <= 2, "channel {got} vs {want}");
        }
    }

    #[test]
    fn label_fill_is_black_inside_a_white_halo() {
        let line = Measurement::new(
            MeasurementId::new(1),
            ImagePoint::new(10.0, 50.0),
            ImagePoint::new(110.0, 50.0),
            MeasurementStyle::default(),
        );
        let font = test_font();
        let mut pixmap = Pixmap::new(200, 100).unwrap();
        render_scene(&mut pixmap, None, std::slice::from_ref(&line), 1.0, Some(&font));

        // "100.0px" centered on the anchor (60, 30), clear of line and markers.
        let mut fill = Vec::new();
        let mut halo = Vec::new();
        for y in 15..45u32 {
            for x in 20..100u32 {
                let (r, g, b, a) = straight(&pixmap, x, y);
                if a > 200 && r < 50 && g < 50 && b < 50 {
                    fill.push((x, y));
                } else if a > 150 && r > 200 && g > 200 && b > 200 {
                    halo.push((x, y));
                }
            }
        }
        assert!(!fill.is_empty(), "no black fill pixels found");
        assert!(!halo.is_empty(), "no white halo pixels found");
        let adjacent = fill.iter().any(|&(fx, fy)| {
            halo.iter()
                .any(|&(hx, hy)| fx.abs_diff(hx) <= 3 && fy.abs_diff(hy) <= 3)
        });
        assert!(adjacent, "halo does not surround the fill");
    }

    #[test]
    fn two_line_label_centers_vertically_on_the_anchor() {
        let mut line = Measurement::new(
            MeasurementId::new(1),
            ImagePoint::new(10.0, 80.0),
            ImagePoint::new(110.0, 80.0),
            MeasurementStyle::default(),
        );
        line.actual_value = Some("AB\nCD".to_string());
        let font = test_font();
        let mut pixmap = Pixmap::new(200, 120).unwrap();
        render_scene(&mut pixmap, None, std::slice::from_ref(&line), 1.0, Some(&font));

        // Anchor is (60, 60); two lines at font_size + 4 spacing straddle it.
        let (_, y0, _, y1) = ink_bbox(&pixmap, 20..100, 35..77).expect("label ink");
        let center = (y0 + y1) as f64 / 2.0;
        assert!((center - 60.0).abs() <= 3.0, "block center at {center}");
        // Leading gap between the lines passes through the anchor row.
        assert!((20..100).all(|x| pixmap.pixel(x, 60).unwrap().alpha() == 0));
        assert!(y0 < 55, "first line missing, bbox starts at {y0}");
        assert!(y1 > 65, "second line missing, bbox ends at {y1}");
    }

    #[test]
    fn label_anchor_scales_while_glyph_size_stays_constant() {
        let line = Measurement::new(
            MeasurementId::new(1),
            ImagePoint::new(10.0, 50.0),
            ImagePoint::new(110.0, 50.0),
            MeasurementStyle::default(),
        );
        let font = test_font();

        let mut native = Pixmap::new(200, 100).unwrap();
        render_scene(&mut native, None, std::slice::from_ref(&line), 1.0, Some(&font));
        let mut zoomed = Pixmap::new(400, 200).unwrap();
        render_scene(&mut zoomed, None, std::slice::from_ref(&line), 2.0, Some(&font));

        let (nx0, ny0, nx1, ny1) = ink_bbox(&native, 20..100, 10..45).expect("native label ink");
        let (zx0, zy0, zx1, zy1) = ink_bbox(&zoomed, 40..200, 60..95).expect("zoomed label ink");

        // The anchor moves with the scale: (60, 30) -> (120, 80).
        let native_cx = (nx0 + nx1) as f64 / 2.0;
        let zoomed_cx = (zx0 + zx1) as f64 / 2.0;
        assert!((native_cx - 60.0).abs() <= 3.0, "native center x {native_cx}");
        assert!((zoomed_cx - 120.0).abs() <= 3.0, "zoomed center x {zoomed_cx}");
        assert!(((zy0 + zy1) as f64 / 2.0 - (ny0 + ny1) as f64 / 2.0 - 50.0).abs() <= 2.0);

        // Glyphs themselves do not grow.
        assert!(zx1 - zx0 <= nx1 - nx0 + 1, "label width grew with scale");
        assert!(zy1 - zy0 <= ny1 - ny0 + 1, "label height grew with scale");
    }

    #[test]
    fn interactive_canvas_is_sized_by_the_display_scale() {
        let mut session = MeasureSession::new("a.png", "file:///a.png");
        session.image_ready(ImageSize::new(200, 100));
        session.set_display_scale(1.5);

        let pixmap = render_interactive(&session, None, None).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (300, 150));
    }

    #[test]
    fn selection_handles_paint_over_the_endpoints() {
        let mut session = MeasureSession::new("a.png", "file:///a.png");
        session.image_ready(ImageSize::new(200, 100));
        let id = session.add_measurement(ImagePoint::new(10.0, 10.0), ImagePoint::new(110.0, 10.0));
        session.select(Some(id));

        let pixmap = render_interactive(&session, None, None).unwrap();
        assert_eq!(pixel(&pixmap, 10, 10), (255, 255, 255, 255));
        assert_eq!(pixel(&pixmap, 110, 10), (255, 255, 255, 255));
    }

    #[test]
    fn drawing_gesture_shows_a_preview_segment() {
        let mut session = MeasureSession::new("a.png", "file:///a.png");
        session.image_ready(ImageSize::new(200, 100));
        session.set_tool(ToolKind::Line);
        session.pointer_down(10.0, 50.0);
        session.pointer_move(190.0, 50.0);

        let pixmap = render_interactive(&session, None, None).unwrap();
        let covered = (10..190).filter(|&x| pixel(&pixmap, x, 50).3 > 0).count();
        // Dashed, so partially covered but clearly visible.
        assert!(covered > 40, "only {covered} pixels covered");
        assert!(covered < 180, "dash gaps missing, {covered} pixels covered");
    }
}
