//! Assembles per-page records into the final result.

use std::path::Path;

use tracing::info;

use crate::error::{InvexError, Result};
use crate::models::config::Strategy;
use crate::models::invoice::{ExtractionResult, InvoiceRecord};

/// Check that `records` are numbered 1..=N in order and wrap them.
///
/// Records are passed through untouched; a gap or reordering is a backend
/// bug and fails the whole document.
pub fn reconcile(
    source: &Path,
    strategy: Strategy,
    records: Vec<InvoiceRecord>,
) -> Result<ExtractionResult> {
    for (index, record) in records.iter().enumerate() {
        let expected = index as u32 + 1;
        if record.page != expected {
            return Err(InvexError::PageOrder {
                expected,
                found: record.page,
            });
        }
    }

    let result = ExtractionResult {
        source: source.to_path_buf(),
        strategy,
        pages: records,
    };

    info!(
        "Reconciled {} pages for {} ({} degraded)",
        result.len(),
        source.display(),
        result.degraded_count()
    );

    Ok(result)
}
