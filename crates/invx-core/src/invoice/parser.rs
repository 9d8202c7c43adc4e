//! Hybrid extraction pipeline: header, both line-item strategies,
//! selection, repair and validation.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::layout::{
    normalize_words, page_extent, reading_order_text, usable_tokens, SpatialExtractor, StrategyOutcome,
};
use crate::models::config::InvxConfig;
use crate::models::invoice::ExtractionResult;
use crate::models::token::{DocumentInput, PageInput, Token};

use super::header::HeaderExtractor;
use super::hybrid::select;
use super::repair::repair_items;
use super::semantic::SemanticMatcher;
use super::validate::Validator;
use super::InvoiceExtractor;

/// Page-level extractor combining the spatial and semantic strategies.
///
/// Holds configuration only; every call is independent, so one instance
/// can be shared across threads.
pub struct HybridExtractor {
    config: InvxConfig,
    header: HeaderExtractor,
    semantic: SemanticMatcher,
    validator: Validator,
}

impl Default for HybridExtractor {
    fn default() -> Self {
        Self::new(InvxConfig::default())
    }
}

impl HybridExtractor {
    /// Create an extractor with the given configuration.
    pub fn new(config: InvxConfig) -> Self {
        Self {
            header: HeaderExtractor::new(config.header.clone()),
            semantic: SemanticMatcher::new(),
            validator: Validator::new(config.validation.clone()),
            config,
        }
    }

    /// Replace the semantic row battery.
    pub fn with_semantic_matcher(mut self, matcher: SemanticMatcher) -> Self {
        self.semantic = matcher;
        self
    }

    pub fn config(&self) -> &InvxConfig {
        &self.config
    }

    /// Extract every page of a document. Pages are independent.
    pub fn extract_document(&self, document: &DocumentInput) -> Vec<ExtractionResult> {
        match document {
            DocumentInput::Pages { pages } => pages.iter().map(|p| self.extract_page(p)).collect(),
            DocumentInput::Single(page) => vec![self.extract_page(page)],
        }
    }

    /// Extract from normalized tokens.
    ///
    /// Degenerate tokens are excluded. `page_text` is rebuilt from the
    /// tokens when absent or blank; `width` and `height` fall back to the
    /// token span.
    pub fn extract_tokens(
        &self,
        page: u32,
        tokens: &[Token],
        page_text: Option<&str>,
        width: Option<f64>,
        height: Option<f64>,
    ) -> ExtractionResult {
        let tokens = &usable_tokens(tokens)[..];
        let (image_width, image_height) = page_extent(tokens, width, height);
        let y_tolerance = self.config.layout.y_tolerance(image_height);

        let text = match page_text {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => reading_order_text(tokens, y_tolerance),
        };

        let header = self.header.extract(&text, tokens, image_height, y_tolerance);

        let layout = self.config.layout_for(header.supplier.as_deref());
        let spatial = if tokens.is_empty() {
            StrategyOutcome::default()
        } else {
            SpatialExtractor::new(layout)
                .extract(tokens, image_width, image_height)
                .unwrap_or_else(|e| {
                    debug!("Spatial strategy unavailable: {}", e);
                    StrategyOutcome::default()
                })
        };
        let semantic = self.semantic.extract(&text);

        let mut selection = select(spatial, semantic, &self.config.selection);
        repair_items(&mut selection.items);

        let mut result = ExtractionResult {
            supplier: header.supplier,
            invoice_date: header.invoice_date,
            invoice_number: header.invoice_number,
            currency: header.currency,
            subtotal: header.subtotal,
            vat_total: header.vat_total,
            grand_total: header.grand_total,
            line_items: selection.items,
            method_used: selection.method,
            ..ExtractionResult::empty(page)
        };
        self.validator.apply(&mut result, selection.confidence);

        if result.needs_review {
            warn!(
                "Page {} needs review: {}",
                page,
                result.validation_errors.join("; ")
            );
        }

        result
    }
}

impl InvoiceExtractor for HybridExtractor {
    fn extract_page(&self, page: &PageInput) -> ExtractionResult {
        let start = Instant::now();

        let tokens = normalize_words(&page.words, page.page, self.config.layout.box_format);
        let result = self.extract_tokens(page.page, &tokens, page.text.as_deref(), page.width, page.height);

        info!(
            "Page {}: {} items via {}, confidence {:.2} ({}ms)",
            page.page,
            result.line_items.len(),
            result.method_used,
            result.confidence,
            start.elapsed().as_millis()
        );

        result
    }

    fn extract_text(&self, text: &str) -> ExtractionResult {
        self.extract_tokens(1, &[], Some(text), None, None)
    }
}

/// Extract one page with the default configuration.
pub fn extract(tokens: &[Token], page_text: &str, image_width: f64, image_height: f64) -> ExtractionResult {
    let page = tokens.first().map(|t| t.page).unwrap_or(1);
    HybridExtractor::default().extract_tokens(
        page,
        tokens,
        Some(page_text),
        Some(image_width),
        Some(image_height),
    )
}
