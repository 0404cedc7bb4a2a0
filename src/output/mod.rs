//! The save pipeline: snapshot the session, rasterize the annotations over
//! the original image at its native dimensions, and hand both off to the
//! delivery collaborator.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbaImage;
use thiserror::Error;

use crate::export::ExportDocument;
use crate::geometry::ImageSize;
use crate::measure::Measurement;
use crate::render::{self, LabelFont};
use crate::session::MeasureSession;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to encode annotated image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("save delivery failed: {0}")]
    Delivery(String),
}

/// Value snapshot of everything the save pipeline needs. Detached from the
/// live session, so edits made while a save is in flight cannot bleed into
/// its output.
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub image_name: String,
    pub image_url: String,
    pub size: Option<ImageSize>,
    pub measurements: Vec<Measurement>,
}

impl ExportSnapshot {
    pub fn document(&self) -> ExportDocument {
        ExportDocument::new(&self.image_name, &self.image_url, &self.measurements)
    }
}

impl MeasureSession {
    pub fn export_snapshot(&self) -> ExportSnapshot {
        ExportSnapshot {
            image_name: self.image_name().to_string(),
            image_url: self.image_reference().to_string(),
            size: self.image_size(),
            measurements: self.measurements().to_vec(),
        }
    }
}

/// What a completed save delivers downstream: the full measurement set and
/// the annotated image as a PNG data URI (or the bare image reference when
/// rasterization was impossible).
#[derive(Debug, Clone)]
pub struct SaveOutput {
    pub measurements: Vec<Measurement>,
    pub annotated_image_uri: String,
}

/// Delivery seam for the embedding application, mockable in tests.
pub trait SaveCollaborator {
    fn deliver(&mut self, output: SaveOutput) -> Result<(), OutputError>;
}

/// Rasterizes the snapshot's measurements over `base` at the image's native
/// dimensions, ignoring any interactive zoom. Rendering trouble falls back
/// to the unannotated image rather than failing the save.
pub fn render_snapshot(
    snapshot: &ExportSnapshot,
    base: &RgbaImage,
    font: Option<&LabelFont>,
) -> RgbaImage {
    let rendered = render::rgba_image_to_pixmap(base).and_then(|base_pixmap| {
        let mut pixmap = tiny_skia::Pixmap::new(base.width(), base.height())?;
        render::render_scene(
            &mut pixmap,
            Some(&base_pixmap),
            &snapshot.measurements,
            1.0,
            font,
        );
        Some(pixmap)
    });
    match rendered {
        Some(pixmap) => render::pixmap_to_rgba_image(&pixmap),
        None => {
            tracing::warn!("annotation raster failed, saving unannotated image");
            base.clone()
        }
    }
}

pub fn encode_png_data_uri(image: &RgbaImage) -> Result<String, OutputError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&buf)))
}

/// Runs the full save: rasterize, encode, deliver. A missing decoded image
/// degrades to delivering the original reference unannotated.
pub fn run_save<C: SaveCollaborator>(
    snapshot: &ExportSnapshot,
    base: Option<&RgbaImage>,
    font: Option<&LabelFont>,
    collaborator: &mut C,
) -> Result<(), OutputError> {
    let annotated_image_uri = match base {
        Some(base) => encode_png_data_uri(&render_snapshot(snapshot, base, font))?,
        None => {
            tracing::warn!("no decoded image available, saving unannotated reference");
            snapshot.image_url.clone()
        }
    };
    collaborator.deliver(SaveOutput {
        measurements: snapshot.measurements.clone(),
        annotated_image_uri,
    })
}
