//! WASM bindings for hybrid invoice extraction.
//!
//! This crate provides WebAssembly bindings for use in browsers and Node.js.
//! Results are plain JS objects shaped like the JSON output of the CLI.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use invx_core::invoice::rules::{format_amount, parse_amount, DateExtractor, FieldExtractor};
use invx_core::invoice::{HybridExtractor, InvoiceExtractor as _};
use invx_core::models::config::InvxConfig;
use invx_core::models::token::{DocumentInput, PageInput, RawBBox, RawWord};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_error)
}

/// Extract invoice data from page text.
///
/// Without geometry only the semantic strategy can find line items.
#[wasm_bindgen]
pub fn extract_invoice_from_text(text: &str) -> Result<JsValue, JsValue> {
    to_js(&HybridExtractor::default().extract_text(text))
}

/// Extract invoice data from an OCR document in JSON form: a single page
/// `{ "width", "height", "text", "words": [...] }` or `{ "pages": [...] }`.
///
/// Returns one result per page.
#[wasm_bindgen]
pub fn extract_invoice(json: &str) -> Result<JsValue, JsValue> {
    let document = DocumentInput::from_json(json).map_err(js_error)?;
    to_js(&HybridExtractor::default().extract_document(&document))
}

/// Invoice extractor class for browser use.
#[wasm_bindgen]
pub struct InvoiceExtractor {
    extractor: HybridExtractor,
}

#[wasm_bindgen]
impl InvoiceExtractor {
    /// Create an extractor, optionally from a JSON configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<InvoiceExtractor, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str::<InvxConfig>(&json).map_err(js_error)?,
            None => InvxConfig::default(),
        };
        config.validate().map_err(js_error)?;
        Ok(Self {
            extractor: HybridExtractor::new(config),
        })
    }

    /// Current configuration as JSON.
    #[wasm_bindgen]
    pub fn config(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.extractor.config()).map_err(js_error)
    }

    /// Extract from a page or document object.
    #[wasm_bindgen]
    pub fn extract(&self, document: JsValue) -> Result<JsValue, JsValue> {
        let document: DocumentInput = serde_wasm_bindgen::from_value(document).map_err(js_error)?;
        to_js(&self.extractor.extract_document(&document))
    }

    /// Extract from page text.
    #[wasm_bindgen]
    pub fn extract_text(&self, text: &str) -> Result<JsValue, JsValue> {
        to_js(&self.extractor.extract_text(text))
    }
}

/// OCR output collected word by word from browser-side processing.
#[wasm_bindgen]
pub struct OcrResultJs {
    page: PageInput,
}

#[wasm_bindgen]
impl OcrResultJs {
    #[wasm_bindgen(constructor)]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            page: PageInput {
                width: Some(width),
                height: Some(height),
                ..PageInput::default()
            },
        }
    }

    /// Add a recognized word with its four corner points.
    #[wasm_bindgen]
    pub fn add_box(
        &mut self,
        text: &str,
        x1: f64, y1: f64,
        x2: f64, y2: f64,
        x3: f64, y3: f64,
        x4: f64, y4: f64,
        confidence: f64,
    ) {
        self.page.words.push(RawWord {
            text: text.to_string(),
            bbox: Some(RawBBox::Quad(vec![[x1, y1], [x2, y2], [x3, y3], [x4, y4]])),
            confidence: Some(confidence),
            page: None,
        });
    }

    /// Set the full page text. Rebuilt from the words when not set.
    #[wasm_bindgen]
    pub fn set_text(&mut self, text: &str) {
        self.page.text = Some(text.to_string());
    }

    /// Number of words added so far.
    #[wasm_bindgen]
    pub fn word_count(&self) -> usize {
        self.page.words.len()
    }

    /// Extract invoice from this OCR result.
    #[wasm_bindgen]
    pub fn extract_invoice(&self) -> Result<JsValue, JsValue> {
        to_js(&HybridExtractor::default().extract_page(&self.page))
    }
}

/// Amount and date helpers.
#[wasm_bindgen]
pub struct InvoiceUtils;

#[wasm_bindgen]
impl InvoiceUtils {
    /// Parse a printed amount (e.g., "£1,234.50", "(12.00)", "1.234,50").
    #[wasm_bindgen]
    pub fn parse_amount(amount: &str) -> Option<f64> {
        parse_amount(amount).map(|d| d.to_string().parse().unwrap_or(0.0))
    }

    /// Format a printed amount with thousands separators and an optional
    /// currency symbol.
    #[wasm_bindgen]
    pub fn format_amount(amount: &str, currency: Option<String>) -> Option<String> {
        parse_amount(amount).map(|d| format_amount(d, currency.as_deref()))
    }

    /// First date in the text, as ISO 8601.
    #[wasm_bindgen]
    pub fn parse_date(date_str: &str) -> Option<String> {
        DateExtractor::new()
            .extract(date_str)
            .map(|m| m.value.to_string())
    }
}
