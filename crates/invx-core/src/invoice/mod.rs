//! Invoice field and line-item extraction.

pub mod header;
pub mod hybrid;
mod parser;
pub mod repair;
pub mod rules;
pub mod semantic;
pub mod validate;

pub use header::{HeaderExtractor, HeaderFields};
pub use hybrid::{select, Selection};
pub use parser::{extract, HybridExtractor};
pub use repair::{repair_item, repair_items, round_money};
pub use semantic::{RowPattern, RowShape, SemanticMatcher, ROW_PATTERNS};
pub use validate::{Validation, ValidationIssue, Validator};

use crate::models::invoice::ExtractionResult;
use crate::models::token::PageInput;

/// A page-level invoice extractor.
///
/// Extraction never fails: the worst case is a result without line items
/// that needs review.
pub trait InvoiceExtractor {
    /// Extract from one page of OCR words.
    fn extract_page(&self, page: &PageInput) -> ExtractionResult;

    /// Extract from plain page text, without geometry.
    fn extract_text(&self, text: &str) -> ExtractionResult;
}
