//! Structured invoice records produced by the extraction pipeline.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Monetary amount.
pub type Money = Decimal;

/// Strategy that produced a set of line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Column geometry (gap clustering and row bucketing).
    #[default]
    Spatial,
    /// Row-shape regular expressions over linear text.
    Semantic,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Spatial => write!(f, "spatial"),
            ExtractionMethod::Semantic => write!(f, "semantic"),
        }
    }
}

/// Notes attached to a line item by repair or parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFlag {
    /// Unit price derived from total / quantity.
    UnitPriceInferred,
    /// Total derived from quantity x unit price.
    TotalInferred,
    /// Quantity not printed; assumed to be 1.
    QuantityDefaulted,
    /// Quantity is zero, so no unit price could be derived.
    ZeroQuantity,
}

/// A single line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product/service description.
    pub description: String,

    /// Quantity.
    pub quantity: Option<Decimal>,

    /// Unit price.
    pub unit_price: Option<Money>,

    /// Line total.
    pub total: Option<Money>,

    /// Strategy that produced this item.
    pub source_method: ExtractionMethod,

    /// Item confidence (0.0 - 1.0).
    pub confidence: f64,

    /// Repairs and anomalies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ItemFlag>,
}

impl LineItem {
    /// Create an item with no numeric fields.
    pub fn new(description: impl Into<String>, source_method: ExtractionMethod) -> Self {
        Self {
            description: description.into(),
            quantity: None,
            unit_price: None,
            total: None,
            source_method,
            confidence: 0.0,
            flags: Vec::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn with_total(mut self, total: Money) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Record a flag once.
    pub fn flag(&mut self, flag: ItemFlag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn has_flag(&self, flag: ItemFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Number of populated numeric fields.
    pub fn numeric_fields(&self) -> usize {
        [
            self.quantity.is_some(),
            self.unit_price.is_some(),
            self.total.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Line total, falling back to quantity x unit price.
    ///
    /// `None` when neither is available or the product is out of range.
    pub fn effective_total(&self) -> Option<Money> {
        self.total.or_else(|| match (self.quantity, self.unit_price) {
            (Some(q), Some(p)) => q.checked_mul(p),
            _ => None,
        })
    }
}

/// Structured record for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 1-based page number.
    pub page: u32,

    /// Supplier name.
    pub supplier: Option<String>,

    /// Invoice date.
    pub invoice_date: Option<NaiveDate>,

    /// Invoice number/identifier.
    pub invoice_number: Option<String>,

    /// ISO currency code.
    pub currency: Option<String>,

    /// Net amount before VAT.
    pub subtotal: Option<Money>,

    /// VAT amount.
    pub vat_total: Option<Money>,

    /// Amount payable.
    pub grand_total: Option<Money>,

    /// Line items.
    pub line_items: Vec<LineItem>,

    /// Strategy whose line items were kept.
    pub method_used: ExtractionMethod,

    /// Overall confidence (0.0 - 1.0).
    pub confidence: f64,

    /// The result must be confirmed by a person before it is finalized.
    pub needs_review: bool,

    /// Human-readable validation failures.
    pub validation_errors: Vec<String>,
}

impl ExtractionResult {
    /// An empty result for the given page. This is the worst-case output.
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            supplier: None,
            invoice_date: None,
            invoice_number: None,
            currency: None,
            subtotal: None,
            vat_total: None,
            grand_total: None,
            line_items: Vec::new(),
            method_used: ExtractionMethod::Spatial,
            confidence: 0.0,
            needs_review: true,
            validation_errors: Vec::new(),
        }
    }

    /// Fraction of supplier, date, number and grand total that were found.
    pub fn header_completeness(&self) -> f64 {
        let found = [
            self.supplier.is_some(),
            self.invoice_date.is_some(),
            self.invoice_number.is_some(),
            self.grand_total.is_some(),
        ]
        .iter()
        .filter(|f| **f)
        .count();
        found as f64 / 4.0
    }
}
