//! End-to-end extraction for a single document.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::adapters::{DocumentAiAdapter, LocalOcrAdapter, PageAdapter, VisionAdapter};
use crate::error::{InvexError, Result};
use crate::models::config::{InvexConfig, Strategy};
use crate::models::invoice::ExtractionResult;
use crate::models::raw::PageOutput;
use crate::normalize::Normalizer;
use crate::preprocess::{mime_type, DocumentKind, PreparePolicy, Preprocessor};
use crate::reconcile::reconcile;

/// The adapter selected for an [`Extractor`].
pub enum Backend {
    LocalOcr(LocalOcrAdapter),
    Vision(VisionAdapter),
    DocumentAi(DocumentAiAdapter),
}

impl Backend {
    /// Build the adapter for `config.strategy`, loading models or creating
    /// the HTTP client as needed.
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        match config.strategy {
            Strategy::LocalOcr => local_ocr(config),
            Strategy::VisionLlm => Ok(Backend::Vision(VisionAdapter::from_config(&config.vision)?)),
            Strategy::DocumentAi => Ok(Backend::DocumentAi(DocumentAiAdapter::from_config(
                &config.document_ai,
            )?)),
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Backend::LocalOcr(_) => Strategy::LocalOcr,
            Backend::Vision(_) => Strategy::VisionLlm,
            Backend::DocumentAi(_) => Strategy::DocumentAi,
        }
    }
}

#[cfg(feature = "native")]
fn local_ocr(config: &InvexConfig) -> Result<Backend> {
    Ok(Backend::LocalOcr(LocalOcrAdapter::from_config(&config.ocr)?))
}

#[cfg(not(feature = "native"))]
fn local_ocr(_config: &InvexConfig) -> Result<Backend> {
    Err(InvexError::Config(
        "local OCR needs the `native` feature".to_string(),
    ))
}

/// Preprocess, extract, normalize and reconcile one document.
pub struct Extractor {
    preprocessor: Preprocessor,
    normalizer: Normalizer,
    backend: Backend,
}

impl Extractor {
    /// Validate `config` and build the configured backend.
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        config.validate()?;
        let backend = Backend::from_config(config)?;
        info!("Initialized {} extractor", backend.strategy());

        Ok(Self::with_backend(
            Preprocessor::from_config(&config.pdf),
            Normalizer::from_config(&config.extraction),
            backend,
        ))
    }

    /// Assemble an extractor from explicit parts.
    pub fn with_backend(preprocessor: Preprocessor, normalizer: Normalizer, backend: Backend) -> Self {
        Self {
            preprocessor,
            normalizer,
            backend,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.backend.strategy()
    }

    /// Extract one record per page of `path`.
    ///
    /// Backend failures degrade individual pages; only structural problems
    /// (missing or unsupported file, unreadable PDF) return an error.
    pub fn extract(&self, path: &Path) -> Result<ExtractionResult> {
        let start = Instant::now();
        info!("Extracting {} with {}", path.display(), self.strategy());

        let outputs = match &self.backend {
            Backend::LocalOcr(adapter) => self.run_pages(adapter, path, PreparePolicy::PreferText)?,
            Backend::Vision(adapter) => self.run_pages(adapter, path, PreparePolicy::AlwaysRaster)?,
            Backend::DocumentAi(adapter) => self.run_document(adapter, path)?,
        };

        // Page numbers come from the backend; reconcile rejects gaps.
        let records = outputs
            .iter()
            .enumerate()
            .map(|(index, output)| self.normalizer.normalize(&output.raw, output.page, index == 0))
            .collect();

        let result = reconcile(path, self.strategy(), records)?;
        info!(
            "Extracted {} pages from {} in {}ms",
            result.len(),
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    fn run_pages(
        &self,
        adapter: &dyn PageAdapter,
        path: &Path,
        policy: PreparePolicy,
    ) -> Result<Vec<PageOutput>> {
        let units = self.preprocessor.prepare_with(path, policy)?;
        let total = units.len();

        Ok(units
            .iter()
            .map(|unit| {
                info!("Page {}/{} via {}", unit.page(), total, adapter.name());
                PageOutput::new(unit.page(), adapter.process(unit))
            })
            .collect())
    }

    fn run_document(&self, adapter: &DocumentAiAdapter, path: &Path) -> Result<Vec<PageOutput>> {
        DocumentKind::detect(path)?;
        let content = std::fs::read(path)?;

        let page_count = match self.preprocessor.page_count(path) {
            Ok(count) => count,
            Err(InvexError::Pdf(e)) => {
                warn!("Could not count pages of {}: {}", path.display(), e);
                1
            }
            Err(e) => return Err(e),
        };

        Ok(adapter.process_document(&content, mime_type(path), page_count))
    }
}
