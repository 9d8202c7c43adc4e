//! Arithmetic validation and final scoring.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::models::config::ValidationConfig;
use crate::models::invoice::{ExtractionResult, ItemFlag, LineItem, Money};

/// An inconsistency that sends the result to review.
///
/// Rendered into `validation_errors`; never raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("no line items extracted")]
    NoLineItems,

    #[error("grand total not found")]
    MissingGrandTotal,

    #[error("line {index} ({description}): {quantity} x {unit_price} = {expected}, printed total {total}")]
    LineMismatch {
        index: usize,
        description: String,
        quantity: Decimal,
        unit_price: Money,
        expected: Money,
        total: Money,
    },

    #[error("line items sum to {sum}, grand total is {grand_total}")]
    TotalMismatch { sum: Money, grand_total: Money },

    #[error("subtotal {subtotal} + VAT {vat} = {expected}, grand total is {grand_total}")]
    VatMismatch {
        subtotal: Money,
        vat: Money,
        expected: Money,
        grand_total: Money,
    },

    #[error("line {index} ({description}): zero quantity, unit price not derived")]
    ZeroQuantity { index: usize, description: String },

    #[error("line {index} ({description}): unit price not derived from {total} / {quantity}")]
    UnitPriceNotDerived {
        index: usize,
        description: String,
        quantity: Decimal,
        total: Money,
    },

    #[error("line {index} ({description}): {quantity} x {unit_price} is out of range")]
    LineOutOfRange {
        index: usize,
        description: String,
        quantity: Decimal,
        unit_price: Money,
    },

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Outcome of validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub confidence: f64,
    pub needs_review: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Arithmetic checks over a finished result.
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Check the result and compute its final confidence.
    ///
    /// Confidence is `0.7 x method confidence + 0.3 x header completeness`,
    /// capped when the result needs review.
    pub fn validate(&self, result: &ExtractionResult, method_confidence: f64) -> Validation {
        let mut issues = Vec::new();

        if result.line_items.is_empty() {
            issues.push(ValidationIssue::NoLineItems);
        }

        for (index, item) in result.line_items.iter().enumerate() {
            if item.has_flag(ItemFlag::ZeroQuantity) {
                issues.push(ValidationIssue::ZeroQuantity {
                    index: index + 1,
                    description: item.description.clone(),
                });
            } else if let (Some(quantity), None, Some(total)) = (item.quantity, item.unit_price, item.total) {
                if !self.is_meta_row(item) {
                    issues.push(ValidationIssue::UnitPriceNotDerived {
                        index: index + 1,
                        description: item.description.clone(),
                        quantity,
                        total,
                    });
                }
            }
            if let Some(issue) = self.check_line(index, item) {
                issues.push(issue);
            }
        }

        match result.grand_total {
            None => issues.push(ValidationIssue::MissingGrandTotal),
            Some(grand_total) if !result.line_items.is_empty() => {
                match self.line_sum(&result.line_items) {
                    Some(sum) if !within(sum, grand_total, self.config.total_tolerance) => {
                        issues.push(ValidationIssue::TotalMismatch { sum, grand_total });
                    }
                    Some(_) => {}
                    None => issues.push(ValidationIssue::OutOfRange("line item sum")),
                }
            }
            Some(_) => {}
        }

        if let (Some(subtotal), Some(vat), Some(grand_total)) =
            (result.subtotal, result.vat_total, result.grand_total)
        {
            match subtotal.checked_add(vat) {
                Some(expected) if !within(expected, grand_total, self.config.vat_tolerance) => {
                    issues.push(ValidationIssue::VatMismatch {
                        subtotal,
                        vat,
                        expected,
                        grand_total,
                    });
                }
                Some(_) => {}
                None => issues.push(ValidationIssue::OutOfRange("subtotal + VAT")),
            }
        }

        let completeness = result.header_completeness();

        let needs_review = !issues.is_empty();
        let mut confidence = (0.7 * method_confidence + 0.3 * completeness).clamp(0.0, 1.0);
        if needs_review {
            confidence = confidence.min(self.config.review_confidence_cap);
        }

        debug!(
            "Validation: {} issues, confidence {:.2}, review {}",
            issues.len(),
            confidence,
            needs_review
        );

        Validation {
            confidence,
            needs_review,
            issues,
        }
    }

    /// Validate and write the outcome into the result.
    pub fn apply(&self, result: &mut ExtractionResult, method_confidence: f64) {
        let validation = self.validate(result, method_confidence);
        result.confidence = validation.confidence;
        result.needs_review = validation.needs_review;
        result.validation_errors = validation.issues.iter().map(ToString::to_string).collect();
    }

    fn check_line(&self, index: usize, item: &LineItem) -> Option<ValidationIssue> {
        let (quantity, unit_price) = (item.quantity?, item.unit_price?);
        let Some(expected) = quantity.checked_mul(unit_price) else {
            return Some(ValidationIssue::LineOutOfRange {
                index: index + 1,
                description: item.description.clone(),
                quantity,
                unit_price,
            });
        };
        let total = item.total?;

        // Free-of-charge lines print a zero total
        let consistent = if total.is_zero() {
            expected.is_zero()
        } else {
            within(expected, total, self.config.line_tolerance)
        };

        (!consistent).then(|| ValidationIssue::LineMismatch {
            index: index + 1,
            description: item.description.clone(),
            quantity,
            unit_price,
            expected: expected.round_dp(2),
            total,
        })
    }

    /// Sum of line totals, excluding payment and rounding rows. `None` on
    /// overflow.
    fn line_sum(&self, items: &[LineItem]) -> Option<Money> {
        items
            .iter()
            .filter(|item| !self.is_meta_row(item))
            .filter_map(LineItem::effective_total)
            .try_fold(Money::ZERO, |sum, total| sum.checked_add(total))
    }

    fn is_meta_row(&self, item: &LineItem) -> bool {
        let description = item.description.to_lowercase();
        description
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| self.config.meta_rows.iter().any(|m| m == word))
    }
}

/// `|actual - reference| / |reference| <= tolerance`. Out-of-range
/// differences are never within tolerance.
fn within(actual: Money, reference: Money, tolerance: Decimal) -> bool {
    if reference.is_zero() {
        return actual.is_zero();
    }
    actual
        .checked_sub(reference)
        .and_then(|diff| diff.abs().checked_div(reference.abs()))
        .is_some_and(|ratio| ratio <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::ExtractionMethod;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(desc: &str, q: &str, p: &str, t: &str) -> LineItem {
        LineItem::new(desc, ExtractionMethod::Spatial)
            .with_quantity(dec(q))
            .with_unit_price(dec(p))
            .with_total(dec(t))
    }

    fn result(items: Vec<LineItem>, grand_total: Option<&str>) -> ExtractionResult {
        let mut result = ExtractionResult::empty(1);
        result.supplier = Some("ACME FOODS LTD".to_string());
        result.invoice_date = chrono::NaiveDate::from_ymd_opt(2024, 3, 12);
        result.invoice_number = Some("INV-1".to_string());
        result.grand_total = grand_total.map(dec);
        result.line_items = items;
        result
    }

    #[test]
    fn test_consistent_result() {
        let validator = Validator::new(ValidationConfig::default());
        let r = result(
            vec![
                item("Crate of Beer", "12", "3.56", "42.66"),
                item("Lemons", "3", "0.50", "1.50"),
            ],
            Some("44.16"),
        );

        let v = validator.validate(&r, 1.0);
        assert!(v.issues.is_empty());
        assert!(!v.needs_review);
        assert!((v.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_mismatch_forces_review() {
        let validator = Validator::new(ValidationConfig::default());
        let r = result(vec![item("Crate of Beer", "12", "4.00", "42.66")], Some("42.66"));

        let v = validator.validate(&r, 1.0);
        assert!(v.needs_review);
        assert_eq!(v.confidence, 0.5);
        assert!(matches!(v.issues[0], ValidationIssue::LineMismatch { index: 1, .. }));
        assert_eq!(
            v.issues[0].to_string(),
            "line 1 (Crate of Beer): 12 x 4.00 = 48.00, printed total 42.66"
        );
    }

    #[test]
    fn test_total_mismatch() {
        let validator = Validator::new(ValidationConfig::default());
        let r = result(vec![item("Crate of Beer", "12", "3.56", "42.66")], Some("657.64"));

        let v = validator.validate(&r, 0.9);
        assert_eq!(
            v.issues,
            vec![ValidationIssue::TotalMismatch {
                sum: dec("42.66"),
                grand_total: dec("657.64"),
            }]
        );
    }

    #[test]
    fn test_meta_rows_excluded_from_sum() {
        let validator = Validator::new(ValidationConfig::default());
        let mut change = LineItem::new("Change", ExtractionMethod::Semantic).with_total(dec("5.00"));
        change.quantity = Some(Decimal::ONE);
        let r = result(vec![item("Crate of Beer", "12", "3.56", "42.66"), change], Some("42.66"));

        assert!(validator.validate(&r, 1.0).issues.is_empty());
    }

    #[test]
    fn test_free_of_charge_line() {
        let validator = Validator::new(ValidationConfig::default());
        let r = result(
            vec![
                item("Crate of Beer", "12", "3.56", "42.66"),
                item("Sample glass FOC", "2", "0", "0"),
            ],
            Some("42.66"),
        );
        assert!(validator.validate(&r, 1.0).issues.is_empty());
    }

    #[test]
    fn test_missing_items_and_total() {
        let validator = Validator::new(ValidationConfig::default());
        let mut r = result(Vec::new(), None);
        validator.apply(&mut r, 0.0);

        assert!(r.needs_review);
        assert_eq!(
            r.validation_errors,
            vec!["no line items extracted".to_string(), "grand total not found".to_string()]
        );
        assert!((r.confidence - 0.225).abs() < 1e-9);
    }

    #[test]
    fn test_vat_check() {
        let validator = Validator::new(ValidationConfig::default());
        let mut r = result(vec![item("Crate of Beer", "12", "3.56", "42.66")], Some("42.66"));
        r.subtotal = Some(dec("35.55"));
        r.vat_total = Some(dec("7.11"));
        assert!(validator.validate(&r, 1.0).issues.is_empty());

        r.vat_total = Some(dec("9.00"));
        assert!(matches!(
            validator.validate(&r, 1.0).issues[..],
            [ValidationIssue::VatMismatch { .. }]
        ));
    }

    #[test]
    fn test_zero_quantity_is_reported() {
        let validator = Validator::new(ValidationConfig::default());
        let mut zero = LineItem::new("Returned crate", ExtractionMethod::Spatial)
            .with_quantity(Decimal::ZERO)
            .with_total(dec("42.66"));
        zero.flag(ItemFlag::ZeroQuantity);
        let r = result(vec![zero], Some("42.66"));

        let v = validator.validate(&r, 1.0);
        assert!(v.needs_review);
        assert!(matches!(v.issues[0], ValidationIssue::ZeroQuantity { index: 1, .. }));
    }

    #[test]
    fn test_missing_unit_price_is_reported() {
        let validator = Validator::new(ValidationConfig::default());
        let tiny = LineItem::new("Bulk grain", ExtractionMethod::Spatial)
            .with_quantity(dec("0.0001"))
            .with_total(Decimal::MAX);
        let r = result(vec![tiny], Some("1.00"));

        let v = validator.validate(&r, 1.0);
        assert!(v.needs_review);
        assert!(matches!(v.issues[0], ValidationIssue::UnitPriceNotDerived { index: 1, .. }));
    }

    #[test]
    fn test_out_of_range_amounts_force_review() {
        let validator = Validator::new(ValidationConfig::default());

        let r = result(vec![item("Widget", "1", "1.00", "1.00")], Some("1.00"));
        let mut huge = r.clone();
        huge.line_items[0].quantity = Some(dec("9999"));
        huge.line_items[0].unit_price = Some(Decimal::MAX);
        let v = validator.validate(&huge, 1.0);
        assert!(v.needs_review);
        assert!(matches!(v.issues[0], ValidationIssue::LineOutOfRange { index: 1, .. }));

        let mut sum = result(
            vec![
                LineItem::new("Widget", ExtractionMethod::Spatial).with_total(Decimal::MAX),
                LineItem::new("Gadget", ExtractionMethod::Spatial).with_total(Decimal::MAX),
            ],
            Some("1.00"),
        );
        validator.apply(&mut sum, 1.0);
        assert!(sum.needs_review);
        assert_eq!(sum.validation_errors, vec!["line item sum is out of range".to_string()]);

        let mut vat = r;
        vat.subtotal = Some(Decimal::MAX);
        vat.vat_total = Some(Decimal::MAX);
        assert_eq!(
            validator.validate(&vat, 1.0).issues,
            vec![ValidationIssue::OutOfRange("subtotal + VAT")]
        );
    }

    #[test]
    fn test_within_handles_extreme_references() {
        assert!(!within(Decimal::MAX, Decimal::MIN, Decimal::ONE));
        assert!(within(dec("42.66"), dec("42.66"), Decimal::ZERO));
    }
}
