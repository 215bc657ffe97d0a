//! Output formatting shared by `process` and `batch`.

use std::fmt::Write as _;

use invex_core::{ExtractionResult, InvoiceRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

const CSV_HEADER: [&str; 11] = [
    "page",
    "status",
    "date",
    "vendor_name",
    "invoice_number",
    "total_amount",
    "currency",
    "item_description",
    "item_amount",
    "raw_text",
    "error",
];

/// One row per line item; pages without items still get one row.
fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;

    for record in result {
        if record.line_items.is_empty() {
            wtr.write_record(csv_row(record, "", ""))?;
        }
        for item in &record.line_items {
            wtr.write_record(csv_row(record, &item.description, &item.amount))?;
        }
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn csv_row(record: &InvoiceRecord, description: &str, amount: &str) -> [String; 11] {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        record.page.to_string(),
        record.status.to_string(),
        text(&record.date),
        text(&record.vendor_name),
        text(&record.invoice_number),
        text(&record.total_amount),
        text(&record.currency),
        description.to_string(),
        amount.to_string(),
        text(&record.raw_text),
        text(&record.error_message),
    ]
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();
    let missing = "-";

    let _ = writeln!(output, "Source:   {}", result.source.display());
    let _ = writeln!(output, "Strategy: {}", result.strategy);
    let _ = writeln!(
        output,
        "Pages:    {} ({} degraded)",
        result.len(),
        result.degraded_count()
    );

    for record in result {
        output.push('\n');
        let _ = writeln!(output, "Page {} [{}]", record.page, record.status);
        let _ = writeln!(output, "  Date:           {}", record.date.as_deref().unwrap_or(missing));
        let _ = writeln!(output, "  Vendor:         {}", record.vendor_name.as_deref().unwrap_or(missing));
        let _ = writeln!(output, "  Invoice number: {}", record.invoice_number.as_deref().unwrap_or(missing));
        let _ = writeln!(
            output,
            "  Total:          {} {}",
            record.total_amount.as_deref().unwrap_or(missing),
            record.currency.as_deref().unwrap_or("")
        );

        if !record.line_items.is_empty() {
            output.push_str("  Line items:\n");
            for item in &record.line_items {
                let _ = writeln!(output, "    - {}: {}", item.description, item.amount);
            }
        }

        if let Some(error) = &record.error_message {
            let _ = writeln!(output, "  Error:          {}", error);
        }
    }

    output
}
