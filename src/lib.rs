//! Line-measurement annotation engine for product images.
//!
//! A session owns one image and its measurements; the embedding shell feeds
//! pointer events in and re-renders the interactive canvas after each
//! mutation. Saving rasterizes the annotations over the image at its native
//! dimensions and serializes the collection for downstream tooling.

pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod loader;
pub mod logging;
pub mod measure;
pub mod output;
pub mod render;
pub mod session;

pub use error::{AppError, AppResult};

use std::path::Path;

use loader::{FileImageSource, ImageSource};

/// Batch entrypoint used by the bundled CLI: re-render stored measurements
/// over an image at native resolution and write the export JSON and the
/// annotated PNG next to it.
pub fn run(image_path: &str, measurements_path: Option<&str>) -> AppResult<()> {
    logging::init();
    tracing::info!(image = %image_path, "starting linemark");

    let app_config = config::load_app_config();
    let image_name = Path::new(image_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    let mut session = session::MeasureSession::with_defaults(
        image_name.clone(),
        image_path,
        app_config.measurement_defaults(),
    );
    let image = FileImageSource.load(image_path)?;
    session.image_ready(geometry::ImageSize::new(image.width(), image.height()));

    if let Some(path) = measurements_path {
        session.load_existing(loader::read_measurements(path)?);
    }

    let font = match app_config.font_path.as_deref() {
        Some(path) => Some(render::LabelFont::from_file(path)?),
        None => None,
    };

    let snapshot = session.export_snapshot();
    let export_path = Path::new(image_path).with_file_name(export::export_file_name(&image_name));
    let file = std::fs::File::create(&export_path).map_err(export::ExportError::from)?;
    snapshot.document().write_json(file)?;

    let annotated = output::render_snapshot(&snapshot, &image, font.as_ref());
    let stem = Path::new(image_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let annotated_path = Path::new(image_path).with_file_name(format!("{stem}_annotated.png"));
    annotated
        .save(&annotated_path)
        .map_err(output::OutputError::from)?;

    tracing::info!(
        export = %export_path.display(),
        annotated = %annotated_path.display(),
        measurements = snapshot.measurements.len(),
        "wrote export artifacts"
    );
    Ok(())
}
