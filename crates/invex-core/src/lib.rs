//! Core library for invoice data extraction.
//!
//! This crate provides:
//! - Document preprocessing (PDF text layers, page rasterization, images)
//! - Three extraction backends: local OCR, a vision-language model and a
//!   managed document-AI processor
//! - Normalization of every backend's output into one invoice record schema
//! - Page reconciliation into an ordered per-document result

pub mod adapters;
pub mod error;
pub mod extractor;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod reconcile;

pub use error::{BackendError, InvexError, PdfError, Result};
pub use extractor::{Backend, Extractor};
pub use models::config::{InvexConfig, ProcessorKind, Strategy};
pub use models::invoice::{ExtractionResult, ExtractionStatus, InvoiceRecord, LineItem};
pub use models::raw::{PageOutput, RawOutput};
pub use normalize::Normalizer;
pub use preprocess::{PageUnit, PreparePolicy, Preprocessor};
pub use reconcile::reconcile;
