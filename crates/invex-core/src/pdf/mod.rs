//! PDF text-layer reading and page rasterization.

mod extractor;
mod raster;

pub use extractor::{EmbeddedImageRasterizer, LopdfTextReader, PdfExtractor};
pub use raster::PdftoppmRasterizer;

use std::path::Path;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Reads the embedded text layer of a PDF, page by page.
pub trait PdfTextReader {
    /// Text of every page in page order; `None` where a page has no text layer.
    ///
    /// Fails for malformed documents.
    fn page_texts(&self, data: &[u8]) -> Result<Vec<Option<String>>>;

    /// Number of pages in the document.
    fn page_count(&self, data: &[u8]) -> Result<u32> {
        Ok(self.page_texts(data)?.len() as u32)
    }
}

/// Renders every page of a PDF to an image.
pub trait PdfRasterizer {
    /// One image per page, in page order.
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>>;
}
