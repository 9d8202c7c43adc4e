//! Batch processing command for multiple OCR dumps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use invx_core::invoice::HybridExtractor;
use invx_core::models::invoice::ExtractionResult;

use super::config::load_config;
use super::output::{format_results, OutputFormat};
use super::process::extract_file;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input glob pattern (e.g. "scans/*.json")
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

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
struct ProcessResult {
    path: PathBuf,
    pages: Option<Vec<ExtractionResult>>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    // Expand glob pattern; sorted so output order is stable
    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "json" | "txt")
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    // Extraction is synchronous and CPU-bound: one blocking task per file,
    // at most `jobs` at a time
    let extractor = Arc::new(HybridExtractor::new(config));
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let extractor = extractor.clone();
        let pb = pb.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let file_start = Instant::now();
            let outcome = extract_file(&extractor, &path);
            let processing_time_ms = file_start.elapsed().as_millis() as u64;
            pb.inc(1);
            drop(permit);

            match outcome {
                Ok(pages) => ProcessResult {
                    path,
                    pages: Some(pages),
                    error: None,
                    processing_time_ms,
                },
                Err(e) => ProcessResult {
                    path,
                    pages: None,
                    error: Some(format!("{:#}", e)),
                    processing_time_ms,
                },
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await?;
        if let Some(error_msg) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), error_msg);
            } else {
                error!("Failed to process {}: {}", result.path.display(), error_msg);
                pb.abandon();
                anyhow::bail!("Processing failed: {}", error_msg);
            }
        }
        results.push(result);
    }

    pb.finish_with_message("Complete");

    // Write outputs
    let successful: Vec<_> = results.iter().filter(|r| r.pages.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(pages) = &result.pages {
                let output_path = output_path(output_dir, &result.path, args.format);
                fs::write(&output_path, format_results(pages, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    // Generate summary if requested
    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let review_count = successful
        .iter()
        .filter_map(|r| r.pages.as_ref())
        .flatten()
        .filter(|p| p.needs_review)
        .count();

    // Print summary
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} pages need review",
        style(successful.len()).green(),
        style(failed.len()).red(),
        style(review_count).yellow()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn output_path(output_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let output_name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("invoice");

    output_dir.join(format!("{}.{}", output_name, format.extension()))
}

/// One row per page, one error row per failed file.
fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "page",
        "supplier",
        "invoice_number",
        "invoice_date",
        "grand_total",
        "currency",
        "items",
        "method",
        "confidence",
        "needs_review",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        match &result.pages {
            Some(pages) => {
                for page in pages {
                    wtr.write_record([
                        filename,
                        "success",
                        &page.page.to_string(),
                        page.supplier.as_deref().unwrap_or(""),
                        page.invoice_number.as_deref().unwrap_or(""),
                        &page.invoice_date.map(|d| d.to_string()).unwrap_or_default(),
                        &page.grand_total.map(|t| t.to_string()).unwrap_or_default(),
                        page.currency.as_deref().unwrap_or(""),
                        &page.line_items.len().to_string(),
                        &page.method_used.to_string(),
                        &format!("{:.2}", page.confidence),
                        &page.needs_review.to_string(),
                        &result.processing_time_ms.to_string(),
                        "",
                    ])?;
                }
            }
            None => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    &result.processing_time_ms.to_string(),
                    result.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
