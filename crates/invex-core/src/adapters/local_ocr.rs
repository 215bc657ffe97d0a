//! Local OCR adapter.

use tracing::{debug, warn};

use super::PageAdapter;
use crate::models::raw::RawOutput;
use crate::ocr::{binarize, TextRecognizer};
use crate::preprocess::PageUnit;

/// Runs page images through a local OCR engine and returns free text.
pub struct LocalOcrAdapter {
    recognizer: Box<dyn TextRecognizer>,
}

impl LocalOcrAdapter {
    pub fn new(recognizer: Box<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Build the adapter around the `pure-onnx-ocr` engine.
    #[cfg(feature = "native")]
    pub fn from_config(config: &crate::models::config::OcrConfig) -> crate::Result<Self> {
        let engine = crate::ocr::PureOcrEngine::from_config(config)?;
        Ok(Self::new(Box::new(engine)))
    }
}

impl PageAdapter for LocalOcrAdapter {
    fn name(&self) -> &'static str {
        "local_ocr"
    }

    fn process(&self, unit: &PageUnit) -> RawOutput {
        match unit {
            PageUnit::DigitalText { page, text } => {
                debug!("Page {} has a text layer, skipping OCR", page);
                RawOutput::Text { text: text.clone() }
            }
            PageUnit::RasterImage { page, image } => {
                let binary = binarize(image);
                match self.recognizer.recognize(&binary) {
                    Ok(text) => {
                        debug!("Page {}: OCR produced {} characters", page, text.len());
                        RawOutput::Text {
                            text: text.trim().to_string(),
                        }
                    }
                    Err(e) => {
                        warn!("OCR failed on page {}: {}", page, e);
                        RawOutput::failed(e.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct CountingOcr {
        calls: std::rc::Rc<Cell<usize>>,
    }

    impl TextRecognizer for CountingOcr {
        fn recognize(&self, image: &DynamicImage) -> Result<String, BackendError> {
            self.calls.set(self.calls.get() + 1);
            // Binarized input arrives as single-channel luma.
            assert!(matches!(image, DynamicImage::ImageLuma8(_)));
            Ok("  TOTAL 12.00  \n".to_string())
        }
    }

    struct FailingOcr;

    impl TextRecognizer for FailingOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, BackendError> {
            Err(BackendError::Ocr("model crashed".into()))
        }
    }

    #[test]
    fn test_digital_text_skips_ocr() {
        let calls = std::rc::Rc::new(Cell::new(0));
        let adapter = LocalOcrAdapter::new(Box::new(CountingOcr { calls: calls.clone() }));

        let output = adapter.process(&PageUnit::DigitalText {
            page: 1,
            text: "Invoice".into(),
        });

        assert_eq!(output, RawOutput::Text { text: "Invoice".into() });
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_raster_image_is_binarized_and_recognized() {
        let calls = std::rc::Rc::new(Cell::new(0));
        let adapter = LocalOcrAdapter::new(Box::new(CountingOcr { calls: calls.clone() }));

        let output = adapter.process(&PageUnit::RasterImage {
            page: 1,
            image: DynamicImage::new_rgb8(16, 16),
        });

        assert_eq!(output, RawOutput::Text { text: "TOTAL 12.00".into() });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_engine_failure_degrades() {
        let adapter = LocalOcrAdapter::new(Box::new(FailingOcr));
        let output = adapter.process(&PageUnit::RasterImage {
            page: 2,
            image: DynamicImage::new_rgb8(4, 4),
        });
        assert!(matches!(output, RawOutput::Failed { message } if message.contains("model crashed")));
    }
}
