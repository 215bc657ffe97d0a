//! Local OCR: image binarization and the recognition engine seam.

mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use preprocessing::binarize;
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;

use crate::error::BackendError;

/// Image-to-text engine used by the local OCR adapter.
pub trait TextRecognizer {
    /// Recognize all text on the image, in reading order.
    ///
    /// An image without text yields an empty string, not an error.
    fn recognize(&self, image: &DynamicImage) -> Result<String, BackendError>;
}
