//! Core library for hybrid invoice line-item extraction.
//!
//! This crate provides:
//! - OCR word normalization (bounding box shapes, confidence scales)
//! - Spatial column clustering, column role profiling and row reconstruction
//! - Regex row patterns for tight-column invoices
//! - Header fields and grand total scoring
//! - Field repair and arithmetic validation
//!
//! The core performs no I/O. One call processes one page.

pub mod error;
pub mod invoice;
pub mod layout;
pub mod models;

pub use error::{ExtractionError, InvxError, Result};
pub use invoice::{extract, HybridExtractor, InvoiceExtractor, ValidationIssue};
pub use models::config::InvxConfig;
pub use models::invoice::{ExtractionMethod, ExtractionResult, ItemFlag, LineItem, Money};
pub use models::token::{BBox, DocumentInput, PageInput, RawBBox, RawWord, Token};
