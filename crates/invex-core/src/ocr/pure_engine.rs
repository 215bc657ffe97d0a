//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::{BackendError, InvexError};
use crate::models::config::OcrConfig;

use super::TextRecognizer;

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
    keep_unk: bool,
}

/// A recognized line with the top edge and left edge of its box.
struct Line {
    top: f64,
    left: f64,
    text: String,
}

impl PureOcrEngine {
    /// Load detection/recognition models and the dictionary named in `config`.
    pub fn from_config(config: &OcrConfig) -> Result<Self, InvexError> {
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(config.detection_path())
            .rec_model_path(config.recognition_path())
            .dictionary_path(config.dictionary_path())
            .build()
            .map_err(|e| InvexError::Config(format!("failed to load OCR models: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self {
            engine,
            keep_unk: config.keep_unk,
        })
    }
}

impl TextRecognizer for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, BackendError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| BackendError::Ocr(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut lines: Vec<Line> = results
            .iter()
            .map(|r| {
                let (left, top) = r
                    .bounding_box
                    .exterior()
                    .coords()
                    .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| {
                        (x.min(c.x), y.min(c.y))
                    });
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Line { top, left, text }
            })
            .collect();

        // Reading order: rows of ~20px, then left to right
        lines.sort_by(|a, b| {
            let row_a = (a.top / 20.0) as i64;
            let row_b = (b.top / 20.0) as i64;
            row_a
                .cmp(&row_b)
                .then(a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "OCR complete on {}x{}: {} lines in {}ms",
            width,
            height,
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }
}
