//! Output formatting shared by `process` and `batch`.

use invx_core::invoice::rules::format_amount;
use invx_core::models::invoice::{ExtractionResult, LineItem, Money};

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
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Render the results of one document.
pub fn format_results(results: &[ExtractionResult], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => format_json(results),
        OutputFormat::Csv => format_csv(results),
        OutputFormat::Text => Ok(format_text(results)),
    }
}

/// A single page is written as an object, several pages as an array.
fn format_json(results: &[ExtractionResult]) -> anyhow::Result<String> {
    match results {
        [single] => Ok(serde_json::to_string_pretty(single)?),
        _ => Ok(serde_json::to_string_pretty(results)?),
    }
}

fn format_csv(results: &[ExtractionResult]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    // Write header
    wtr.write_record([
        "page",
        "supplier",
        "invoice_number",
        "invoice_date",
        "description",
        "quantity",
        "unit_price",
        "total",
        "currency",
        "method",
        "needs_review",
    ])?;

    for result in results {
        for item in &result.line_items {
            wtr.write_record([
                &result.page.to_string(),
                result.supplier.as_deref().unwrap_or(""),
                result.invoice_number.as_deref().unwrap_or(""),
                &result.invoice_date.map(|d| d.to_string()).unwrap_or_default(),
                &item.description,
                &item.quantity.map(|q| q.normalize().to_string()).unwrap_or_default(),
                &item.unit_price.map(|p| p.to_string()).unwrap_or_default(),
                &item.total.map(|t| t.to_string()).unwrap_or_default(),
                result.currency.as_deref().unwrap_or(""),
                &item.source_method.to_string(),
                &result.needs_review.to_string(),
            ])?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(results: &[ExtractionResult]) -> String {
    let mut output = String::new();

    for result in results {
        let currency = result.currency.as_deref();
        let money = |amount| format_amount(amount, currency);

        output.push_str(&format!("Page {}\n", result.page));
        output.push_str(&format!(
            "Supplier: {}\n",
            result.supplier.as_deref().unwrap_or("-")
        ));
        output.push_str(&format!(
            "Invoice: {}\n",
            result.invoice_number.as_deref().unwrap_or("-")
        ));
        output.push_str(&format!(
            "Date: {}\n",
            result.invoice_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        ));
        output.push('\n');

        output.push_str(&format!(
            "Line items ({}, {}):\n",
            result.line_items.len(),
            result.method_used
        ));
        for item in &result.line_items {
            output.push_str(&format!("  {}\n", format_item(item, &money)));
        }
        output.push('\n');

        if let Some(subtotal) = result.subtotal {
            output.push_str(&format!("  Subtotal: {}\n", money(subtotal)));
        }
        if let Some(vat) = result.vat_total {
            output.push_str(&format!("  VAT:      {}\n", money(vat)));
        }
        match result.grand_total {
            Some(total) => output.push_str(&format!("  Total:    {}\n", money(total))),
            None => output.push_str("  Total:    -\n"),
        }

        output.push_str(&format!("\nConfidence: {:.0}%\n", result.confidence * 100.0));
        if result.needs_review {
            output.push_str("NEEDS REVIEW\n");
            for error in &result.validation_errors {
                output.push_str(&format!("  - {}\n", error));
            }
        }
        output.push('\n');
    }

    output
}

fn format_item(item: &LineItem, money: &impl Fn(Money) -> String) -> String {
    let quantity = item
        .quantity
        .map(|q| q.normalize().to_string())
        .unwrap_or_else(|| "?".to_string());
    let unit_price = item.unit_price.map(money).unwrap_or_else(|| "?".to_string());
    let total = item.total.map(money).unwrap_or_else(|| "?".to_string());

    format!("{} x {} @ {} = {}", quantity, item.description, unit_price, total)
}
