//! Process command - extract line items from a single OCR dump.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::{debug, info};

use invx_core::invoice::{HybridExtractor, InvoiceExtractor};
use invx_core::models::invoice::ExtractionResult;
use invx_core::models::token::DocumentInput;

use super::config::load_config;
use super::output::{format_results, OutputFormat};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file: OCR words as JSON, or plain page text (.txt)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,

    /// Exit with an error when any page needs review
    #[arg(long)]
    strict: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let extractor = HybridExtractor::new(config);
    let results = extract_file(&extractor, &args.input)?;

    for result in results.iter().filter(|r| r.needs_review) {
        eprintln!(
            "{} Page {} needs review:",
            style("!").yellow(),
            result.page
        );
        for error in &result.validation_errors {
            eprintln!("  - {}", error);
        }
    }

    // Format output
    let output = format_results(&results, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    // Show summary
    if args.show_confidence {
        println!();
        for result in &results {
            println!(
                "{} Page {}: {} items via {}, confidence {:.1}%",
                style("ℹ").blue(),
                result.page,
                result.line_items.len(),
                result.method_used,
                result.confidence * 100.0
            );
        }
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            start.elapsed().as_millis()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if args.strict && results.iter().any(|r| r.needs_review) {
        anyhow::bail!("{} page(s) need review", results.iter().filter(|r| r.needs_review).count());
    }

    Ok(())
}

/// Run the extractor over one input file.
///
/// `.txt` files are treated as the linear text of a single page; anything
/// else must be a JSON page or `{ "pages": [...] }` document.
pub fn extract_file(extractor: &HybridExtractor, path: &Path) -> anyhow::Result<Vec<ExtractionResult>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension == "txt" {
        if content.trim().is_empty() {
            anyhow::bail!("No text in {}", path.display());
        }
        return Ok(vec![extractor.extract_text(&content)]);
    }

    let document = DocumentInput::from_json(&content)
        .with_context(|| format!("Invalid OCR document {}", path.display()))?;
    let results = extractor.extract_document(&document);

    debug!("{}: {} pages", path.display(), results.len());
    Ok(results)
}
