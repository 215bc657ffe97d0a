//! Batch processing command for multiple invoice files.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use invex_core::preprocess::SUPPORTED_EXTENSIONS;
use invex_core::{ExtractionResult, Extractor, InvexConfig, InvoiceRecord, Strategy};

use super::load_config;
use super::output::{format_result, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy; overrides the config file
    #[arg(short, long)]
    strategy: Option<Strategy>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileOutcome {
    index: usize,
    path: PathBuf,
    result: Result<ExtractionResult, String>,
    processing_time_ms: u64,
}

/// Files not yet claimed by a worker, with their input order.
type WorkQueue = Arc<Mutex<VecDeque<(usize, PathBuf)>>>;

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.validate()?;

    let files = expand_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process with {}",
        style("ℹ").blue(),
        files.len(),
        config.strategy
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let workers = args.jobs.clamp(1, files.len());
    let queue: WorkQueue = Arc::new(Mutex::new(files.into_iter().enumerate().collect()));
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel::<FileOutcome>();

    let mut set = JoinSet::new();
    for worker in 0..workers {
        let config = config.clone();
        let queue = queue.clone();
        let stop = stop.clone();
        let tx = tx.clone();
        set.spawn_blocking(move || run_worker(worker, &config, &queue, &stop, &tx));
    }
    drop(tx);

    let mut outcomes = Vec::new();
    while let Some(outcome) = rx.recv().await {
        overall_pb.inc(1);
        if let Err(message) = &outcome.result {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", outcome.path.display(), message);
            } else {
                error!("Failed to process {}: {}", outcome.path.display(), message);
                stop.store(true, Ordering::SeqCst);
            }
        }
        outcomes.push(outcome);
    }

    while let Some(joined) = set.join_next().await {
        joined??;
    }

    overall_pb.finish_with_message("Complete");
    outcomes.sort_by_key(|o| o.index);

    if !args.continue_on_error {
        if let Some(failed) = outcomes.iter().find(|o| o.result.is_err()) {
            anyhow::bail!(
                "Processing failed for {}: {}",
                failed.path.display(),
                failed.result.as_ref().err().map(String::as_str).unwrap_or("unknown error")
            );
        }
    }

    if let Some(output_dir) = &args.output_dir {
        for outcome in &outcomes {
            if let Ok(result) = &outcome.result {
                let output_path = output_path_for(output_dir, &outcome.path, args.format);
                fs::write(&output_path, format_result(result, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    let degraded: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(ExtractionResult::degraded_count)
        .sum();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed, {} degraded pages",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red(),
        style(degraded).yellow()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for outcome in &failed {
            if let Err(message) = &outcome.result {
                eprintln!("  - {}: {}", outcome.path.display(), message);
            }
        }
    }

    Ok(())
}

/// Expand the glob and keep files with a supported extension.
fn expand_inputs(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    Ok(glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .collect())
}

/// Build one extractor and drain the queue until it is empty or stopped.
fn run_worker(
    worker: usize,
    config: &InvexConfig,
    queue: &WorkQueue,
    stop: &AtomicBool,
    tx: &mpsc::UnboundedSender<FileOutcome>,
) -> anyhow::Result<()> {
    let extractor = Extractor::from_config(config)?;
    debug!("Worker {} ready", worker);

    while !stop.load(Ordering::SeqCst) {
        let next = queue
            .lock()
            .map_err(|_| anyhow::anyhow!("work queue poisoned"))?
            .pop_front();
        let Some((index, path)) = next else {
            break;
        };

        let file_start = Instant::now();
        let result = extractor.extract(&path).map_err(|e| e.to_string());
        let outcome = FileOutcome {
            index,
            path,
            result,
            processing_time_ms: file_start.elapsed().as_millis() as u64,
        };

        if tx.send(outcome).is_err() {
            break;
        }
    }

    Ok(())
}

fn output_path_for(output_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("invoice");
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

/// One row per file, header fields taken from the first page.
fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "pages",
        "degraded_pages",
        "date",
        "vendor_name",
        "invoice_number",
        "total_amount",
        "currency",
        "line_items",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let time = outcome.processing_time_ms.to_string();

        match &outcome.result {
            Ok(result) => {
                let first = result.pages.first().cloned().unwrap_or_else(|| InvoiceRecord::new(1));
                let field = |value: &Option<String>| value.clone().unwrap_or_default();
                let items: usize = result.iter().map(|r| r.line_items.len()).sum();

                wtr.write_record([
                    filename,
                    "success",
                    &result.len().to_string(),
                    &result.degraded_count().to_string(),
                    &field(&first.date),
                    &field(&first.vendor_name),
                    &field(&first.invoice_number),
                    &field(&first.total_amount),
                    &field(&first.currency),
                    &items.to_string(),
                    &time,
                    "",
                ])?;
            }
            Err(message) => {
                wtr.write_record([
                    filename, "error", "", "", "", "", "", "", "", "", &time, message,
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
