//! Page rendering through poppler's `pdftoppm`.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tracing::debug;

use super::{PdfRasterizer, Result};
use crate::error::PdfError;

const PAGE_PREFIX: &str = "page";

/// Rasterizer that shells out to `pdftoppm`.
///
/// Pages are written to a temporary directory, loaded into memory, and the
/// directory is removed before returning.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>> {
        let work_dir = tempfile::tempdir()
            .map_err(|e| PdfError::Render(format!("failed to create temp dir: {}", e)))?;
        let out_prefix = work_dir.path().join(PAGE_PREFIX);

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&out_prefix)
            .output()
            .map_err(|e| {
                PdfError::Render(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(PdfError::Render(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_pages(work_dir.path())?;
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Rendered {} pages at {} DPI", pages.len(), dpi);

        pages
            .into_iter()
            .map(|(_, page_path)| {
                image::open(&page_path).map_err(|e| {
                    PdfError::Render(format!("failed to load {}: {}", page_path.display(), e))
                })
            })
            .collect()
    }
}

/// Rendered page files sorted by page number.
///
/// `pdftoppm` zero-pads the page suffix to the width of the last page
/// number (`page-1.png` or `page-01.png`), so ordering is numeric.
fn collect_pages(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PdfError::Render(e.to_string()))?;

    let mut pages: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let number = page_number(path.file_name()?.to_str()?)?;
            Some((number, path))
        })
        .collect();

    pages.sort_by_key(|(number, _)| *number);
    Ok(pages)
}

fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
