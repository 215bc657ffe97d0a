//! Process command - extract data from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::preprocess::DocumentKind;
use invex_core::{Extractor, Strategy};

use super::load_config;
use super::output::{format_result, OutputFormat};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (local-ocr, vision-llm, document-ai); overrides the config file
    #[arg(short, long)]
    strategy: Option<Strategy>,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }

    // Fail on a bad input before loading models or clients.
    DocumentKind::detect(&args.input)?;
    info!("Processing {} with {}", args.input.display(), config.strategy);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Extracting with {}...", config.strategy));

    let input = args.input.clone();
    let result = tokio::task::spawn_blocking(move || {
        let extractor = Extractor::from_config(&config)?;
        extractor.extract(&input)
    })
    .await??;

    pb.finish_and_clear();

    if result.degraded_count() > 0 {
        eprintln!(
            "{} {} of {} pages could not be extracted",
            style("⚠").yellow(),
            result.degraded_count(),
            result.len()
        );
    }

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
