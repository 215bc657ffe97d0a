//! Image binarization for OCR.

use image::DynamicImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

/// Convert to grayscale and apply a global Otsu threshold.
///
/// Pixels strictly above the level become white, the rest black.
pub fn binarize(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let level = otsu_level(&gray);
    debug!("Otsu threshold: {}", level);

    DynamicImage::ImageLuma8(threshold(&gray, level, ThresholdType::Binary))
}
