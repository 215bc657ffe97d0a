//! Extraction backends.
//!
//! Every adapter turns its input into a [`RawOutput`] and never returns an
//! error: backend and parse failures are folded into degraded variants so a
//! bad page cannot abort the document.

pub mod document_ai;
pub mod local_ocr;
pub mod vision;

pub use document_ai::{DocumentAiAdapter, DocumentAiClient, DocumentAiRestClient, ProcessedDocument};
pub use local_ocr::LocalOcrAdapter;
pub use vision::{OpenAiVisionClient, VisionAdapter, VisionModel, VisionRequest, EXTRACTION_PROMPT};

use crate::models::raw::RawOutput;
use crate::preprocess::PageUnit;

/// Backend that works one page at a time.
pub trait PageAdapter {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Extract raw output for a single page.
    fn process(&self, unit: &PageUnit) -> RawOutput;
}
