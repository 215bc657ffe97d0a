//! Error types for the invex-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the invex library.
///
/// These are the structural failures that abort an extraction. Backend
/// failures never surface here; adapters turn them into degraded records.
#[derive(Error, Debug)]
pub enum InvexError {
    /// The input path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The input extension is not one of the recognized document types.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A required setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Page records were not numbered 1..=N.
    #[error("page order violated: expected page {expected}, found page {found}")]
    PageOrder { expected: u32, found: u32 },

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to rasterize pages.
    #[error("failed to render pages: {0}")]
    Render(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors raised by an extraction backend.
///
/// Adapters catch these at their boundary and downgrade the page.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport-level failure talking to a remote service.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with a body we could not decode.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The OCR engine failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The input could not be encoded for the backend.
    #[error("failed to encode input: {0}")]
    Encode(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
