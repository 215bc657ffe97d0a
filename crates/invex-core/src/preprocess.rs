//! Turns an input document into per-page units for the adapters.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::{InvexError, PdfError, Result};
use crate::models::config::{PdfConfig, RasterizerKind};
use crate::pdf::{
    EmbeddedImageRasterizer, LopdfTextReader, PdfRasterizer, PdfTextReader, PdftoppmRasterizer,
};

/// Extensions accepted as input, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "gif", "webp"];

/// DPI used when scanned PDFs are rasterized.
pub const DEFAULT_RENDER_DPI: u32 = 200;

/// Broad input category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Check that `path` exists and has a supported extension.
    pub fn detect(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InvexError::FileNotFound(path.to_path_buf()));
        }

        let extension = extension_of(path);
        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            ext if SUPPORTED_EXTENSIONS.contains(&ext) => Ok(DocumentKind::Image),
            "" => Err(InvexError::UnsupportedFileType("(no extension)".to_string())),
            other => Err(InvexError::UnsupportedFileType(format!(".{}", other))),
        }
    }
}

/// MIME type for a supported input path.
pub fn mime_type(path: &Path) -> &'static str {
    match extension_of(path).as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tiff" => "image/tiff",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// One renderable page.
#[derive(Debug, Clone)]
pub enum PageUnit {
    /// Page taken from a PDF text layer.
    DigitalText { page: u32, text: String },
    /// Page image, either rasterized or loaded directly.
    RasterImage { page: u32, image: DynamicImage },
}

impl PageUnit {
    /// Page number (1-indexed).
    pub fn page(&self) -> u32 {
        match self {
            PageUnit::DigitalText { page, .. } | PageUnit::RasterImage { page, .. } => *page,
        }
    }
}

/// Whether a PDF's text layer may be used instead of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreparePolicy {
    /// Use the text layer when any page has one, otherwise rasterize.
    #[default]
    PreferText,
    /// Always rasterize PDFs.
    AlwaysRaster,
}

/// Loads documents and decides between text-layer and raster pages.
pub struct Preprocessor {
    text_reader: Box<dyn PdfTextReader>,
    rasterizer: Box<dyn PdfRasterizer>,
    render_dpi: u32,
}

impl Preprocessor {
    /// Create a preprocessor from explicit collaborators.
    pub fn new(text_reader: Box<dyn PdfTextReader>, rasterizer: Box<dyn PdfRasterizer>) -> Self {
        Self {
            text_reader,
            rasterizer,
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }

    /// Create a preprocessor from configuration.
    pub fn from_config(config: &PdfConfig) -> Self {
        let rasterizer: Box<dyn PdfRasterizer> = match config.rasterizer {
            RasterizerKind::Pdftoppm => Box::new(PdftoppmRasterizer::new(&config.pdftoppm_path)),
            RasterizerKind::Embedded => Box::new(EmbeddedImageRasterizer),
        };
        Self::new(Box::new(LopdfTextReader), rasterizer).with_render_dpi(config.render_dpi)
    }

    /// Set rasterization DPI.
    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    /// Prepare a document, preferring its text layer.
    pub fn prepare(&self, path: &Path) -> Result<Vec<PageUnit>> {
        self.prepare_with(path, PreparePolicy::PreferText)
    }

    /// Prepare a document with an explicit policy.
    pub fn prepare_with(&self, path: &Path, policy: PreparePolicy) -> Result<Vec<PageUnit>> {
        let units = match DocumentKind::detect(path)? {
            DocumentKind::Image => {
                let image = image::ImageReader::open(path)?
                    .with_guessed_format()?
                    .decode()?;
                vec![PageUnit::RasterImage { page: 1, image }]
            }
            DocumentKind::Pdf => self.prepare_pdf(path, policy)?,
        };

        info!("Prepared {} page(s) from {}", units.len(), path.display());
        Ok(units)
    }

    /// Number of pages in a document without rendering it.
    pub fn page_count(&self, path: &Path) -> Result<u32> {
        match DocumentKind::detect(path)? {
            DocumentKind::Image => Ok(1),
            DocumentKind::Pdf => {
                let data = std::fs::read(path)?;
                Ok(self.text_reader.page_count(&data)?)
            }
        }
    }

    fn prepare_pdf(&self, path: &Path, policy: PreparePolicy) -> Result<Vec<PageUnit>> {
        if policy == PreparePolicy::PreferText {
            let data = std::fs::read(path)?;
            match self.text_reader.page_texts(&data) {
                Ok(texts) if texts.iter().any(|t| has_text(t.as_deref())) => {
                    debug!("PDF has a text layer; using {} digital pages", texts.len());
                    return Ok(texts
                        .into_iter()
                        .zip(1u32..)
                        .map(|(text, page)| PageUnit::DigitalText {
                            page,
                            text: text.unwrap_or_default(),
                        })
                        .collect());
                }
                Ok(_) => debug!("PDF has no text layer, rasterizing"),
                Err(e) => debug!("Text layer unreadable ({}), rasterizing", e),
            }
        }

        let images = self.rasterizer.rasterize(path, self.render_dpi)?;
        if images.is_empty() {
            return Err(PdfError::NoPages.into());
        }

        debug!("Rasterized {} pages at {} DPI", images.len(), self.render_dpi);
        Ok(images
            .into_iter()
            .zip(1u32..)
            .map(|(image, page)| PageUnit::RasterImage { page, image })
            .collect())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::from_config(&PdfConfig::default())
    }
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedTexts(Vec<Option<String>>);

    impl PdfTextReader for FixedTexts {
        fn page_texts(&self, _data: &[u8]) -> crate::pdf::Result<Vec<Option<String>>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenReader;

    impl PdfTextReader for BrokenReader {
        fn page_texts(&self, _data: &[u8]) -> crate::pdf::Result<Vec<Option<String>>> {
            Err(PdfError::Parse("bad xref".into()))
        }
    }

    struct BlankPages {
        count: usize,
        calls: Arc<AtomicUsize>,
    }

    impl PdfRasterizer for BlankPages {
        fn rasterize(&self, _path: &Path, dpi: u32) -> crate::pdf::Result<Vec<DynamicImage>> {
            assert_eq!(dpi, DEFAULT_RENDER_DPI);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.count).map(|_| DynamicImage::new_rgb8(4, 4)).collect())
        }
    }

    fn pdf_file() -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        std::fs::write(file.path(), b"%PDF-1.4").unwrap();
        file
    }

    fn preprocessor(reader: impl PdfTextReader + 'static, pages: usize) -> (Preprocessor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let rasterizer = BlankPages {
            count: pages,
            calls: calls.clone(),
        };
        (Preprocessor::new(Box::new(reader), Box::new(rasterizer)), calls)
    }

    #[test]
    fn test_missing_file() {
        let (pre, _) = preprocessor(FixedTexts(vec![]), 1);
        let err = pre.prepare(Path::new("/no/such/invoice.pdf")).unwrap_err();
        assert!(matches!(err, InvexError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        let (pre, _) = preprocessor(FixedTexts(vec![]), 1);
        let err = pre.prepare(file.path()).unwrap_err();
        assert!(matches!(err, InvexError::UnsupportedFileType(ext) if ext == ".docx"));
    }

    #[test]
    fn test_any_text_page_makes_whole_pdf_digital() {
        let file = pdf_file();
        let reader = FixedTexts(vec![None, Some("Invoice 42".into()), None]);
        let (pre, calls) = preprocessor(reader, 3);

        let units = pre.prepare(file.path()).unwrap();

        assert_eq!(units.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(units
            .iter()
            .all(|u| matches!(u, PageUnit::DigitalText { .. })));
        let pages: Vec<u32> = units.iter().map(PageUnit::page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_text_layer_rasterizes_every_page() {
        let file = pdf_file();
        let reader = FixedTexts(vec![Some("   ".into()), None]);
        let (pre, calls) = preprocessor(reader, 2);

        let units = pre.prepare(file.path()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(units.len(), 2);
        assert!(units
            .iter()
            .all(|u| matches!(u, PageUnit::RasterImage { .. })));
    }

    #[test]
    fn test_unreadable_text_layer_rasterizes() {
        let file = pdf_file();
        let (pre, _) = preprocessor(BrokenReader, 4);

        let units = pre.prepare(file.path()).unwrap();
        assert_eq!(units.len(), 4);
        assert_eq!(units[3].page(), 4);
    }

    #[test]
    fn test_always_raster_skips_text_layer() {
        let file = pdf_file();
        let reader = FixedTexts(vec![Some("digital".into())]);
        let (pre, calls) = preprocessor(reader, 1);

        let units = pre
            .prepare_with(file.path(), PreparePolicy::AlwaysRaster)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(units[0], PageUnit::RasterImage { page: 1, .. }));
    }

    #[test]
    fn test_single_image_is_one_page() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        DynamicImage::new_rgb8(8, 8)
            .save_with_format(file.path(), image::ImageFormat::Png)
            .unwrap();
        let (pre, calls) = preprocessor(FixedTexts(vec![]), 5);

        let units = pre.prepare(file.path()).unwrap();
        assert_eq!(units.len(), 1);
        assert!(matches!(units[0], PageUnit::RasterImage { page: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(pre.page_count(file.path()).unwrap(), 1);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a.PDF")), "application/pdf");
        assert_eq!(mime_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type(Path::new("a")), "application/octet-stream");
    }
}
