//! Decoding of the product image backing a session.

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::ImageSize;
use crate::session::MeasureSession;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read stored measurements: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse stored measurements: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("image has empty dimensions")]
    EmptyImage,
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Seam between the session and wherever its image actually comes from.
/// The engine ships a filesystem source; embedding shells with remote
/// storage provide their own.
pub trait ImageSource {
    fn load(&self, reference: &str) -> LoadResult<RgbaImage>;
}

/// Loads images from local paths via the `image` crate's format sniffing.
#[derive(Debug, Default)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn load(&self, reference: &str) -> LoadResult<RgbaImage> {
        let image = image::open(reference)?.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(LoadError::EmptyImage);
        }
        Ok(image)
    }
}

/// Reads a measurement collection stored in the wire JSON format.
pub fn read_measurements(path: impl AsRef<std::path::Path>) -> LoadResult<Vec<crate::measure::Measurement>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Resolves the session's image through `source` and advances the session
/// lifecycle accordingly. Returns the decoded image for rendering and
/// saving; a failed load leaves the session in its failed phase.
pub fn attach_image(session: &mut MeasureSession, source: &dyn ImageSource) -> Option<RgbaImage> {
    match source.load(session.image_reference()) {
        Ok(image) => {
            debug!(
                reference = %session.image_reference(),
                width = image.width(),
                height = image.height(),
                "image decoded"
            );
            session.image_ready(ImageSize::new(image.width(), image.height()));
            Some(image)
        }
        Err(error) => {
            warn!(reference = %session.image_reference(), %error, "image load failed");
            session.image_failed();
            None
        }
    }
}
