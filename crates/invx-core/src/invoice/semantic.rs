//! Line items from linear page text, using row-shape regular expressions.
//!
//! This strategy ignores geometry entirely. It exists for invoices whose
//! columns are too tight to separate by x-position: structure is recovered
//! from token order and numeric shape alone.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::layout::StrategyOutcome;
use crate::models::invoice::{ExtractionMethod, ItemFlag, LineItem};

use super::rules::{is_skip_line, is_summary_line, is_table_header, parse_amount};

/// Capture group layout of a row pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShape {
    pub quantity: Option<usize>,
    pub description: usize,
    pub unit_price: Option<usize>,
    pub total: usize,
}

/// One entry of the row battery.
#[derive(Debug, Clone)]
pub struct RowPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub shape: RowShape,
    /// Confidence of items matched by this pattern.
    pub confidence: f64,
}

impl RowPattern {
    pub fn new(name: &'static str, pattern: &str, shape: RowShape, confidence: f64) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            shape,
            confidence,
        })
    }
}

const PRICE: &str = r"[£$€]?\s*[\d,]+\.?\d{0,4}";

lazy_static! {
    /// The default battery, evaluated in order; the first match wins.
    pub static ref ROW_PATTERNS: Vec<RowPattern> = vec![
        // "6  12 LITTRE PEPSI  78.49"
        RowPattern::new(
            "qty_first",
            &format!(r"^\s*(\d{{1,4}})\s+(.+?)\s+({PRICE})\s*$"),
            RowShape { quantity: Some(1), description: 2, unit_price: None, total: 3 },
            0.8,
        ).unwrap(),
        // "Crate of Beer 12 3.56 42.66"
        RowPattern::new(
            "qty_middle_with_unit",
            &format!(r"^(.+?)\s+(\d{{1,4}})\s+({PRICE})\s+({PRICE})\s*$"),
            RowShape { quantity: Some(2), description: 1, unit_price: Some(3), total: 4 },
            0.9,
        ).unwrap(),
        // "Crate of Beer 12 42.66"
        RowPattern::new(
            "description_first",
            &format!(r"^(.+?)\s+(\d{{1,4}})\s+({PRICE})\s*$"),
            RowShape { quantity: Some(2), description: 1, unit_price: None, total: 3 },
            0.75,
        ).unwrap(),
        // "Delivery charge 5.00"
        RowPattern::new(
            "implicit_qty",
            &format!(r"^(.+?)\s+({PRICE})\s*$"),
            RowShape { quantity: None, description: 1, unit_price: None, total: 2 },
            0.6,
        ).unwrap(),
    ];

    static ref TRAILING_PRICE: Regex = Regex::new(
        r"^(.*\S)\s+([£$€]?\d[\d,]*\.\d{2})$"
    ).unwrap();
}

/// Regex-battery line-item matcher.
#[derive(Debug, Clone)]
pub struct SemanticMatcher {
    patterns: Vec<RowPattern>,
    /// Confidence multiplier when no item-table heading was found.
    unanchored_scale: f64,
}

impl Default for SemanticMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticMatcher {
    pub fn new() -> Self {
        Self {
            patterns: ROW_PATTERNS.clone(),
            unanchored_scale: 0.7,
        }
    }

    /// Use a custom battery instead of the default one.
    pub fn with_patterns(mut self, patterns: Vec<RowPattern>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Extract line items from the page text.
    pub fn extract(&self, text: &str) -> StrategyOutcome {
        let lines: Vec<&str> = text.lines().collect();

        let (section, scale) = match lines.iter().position(|l| is_table_header(l)) {
            Some(start) => {
                let body: Vec<&str> = lines[start + 1..]
                    .iter()
                    .copied()
                    .take_while(|l| !is_summary_line(l))
                    .collect();
                (body, 1.0)
            }
            None => {
                debug!("Semantic: no item-table heading, scanning the whole page");
                (lines, self.unanchored_scale)
            }
        };

        let mut items = Vec::new();
        for line in section {
            let line = line.trim();
            if line.is_empty() || is_skip_line(line) {
                continue;
            }

            if let Some(mut item) = self.match_line(line) {
                item.confidence *= scale;
                items.push(item);
            }
        }

        debug!("Semantic: {} items", items.len());
        StrategyOutcome::new(items)
    }

    /// Match one line against the battery.
    ///
    /// A pattern whose captures do not parse counts as a non-match, so the
    /// next pattern is tried.
    pub fn match_line(&self, line: &str) -> Option<LineItem> {
        self.patterns.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(line)?;
            let item = build_item(&caps, pattern)?;
            debug!("Semantic: {:?} matched {}", line, pattern.name);
            Some(item)
        })
    }
}

fn build_item(caps: &regex::Captures<'_>, pattern: &RowPattern) -> Option<LineItem> {
    let shape = &pattern.shape;
    let group = |i: usize| caps.get(i).map(|m| m.as_str().trim());

    let mut description = group(shape.description)?.to_string();
    if !description.chars().any(char::is_alphabetic) {
        return None;
    }

    let total = parse_amount(group(shape.total)?)?;
    let quantity = match shape.quantity {
        Some(i) => Some(parse_amount(group(i)?)?),
        None => None,
    };
    let mut unit_price = match shape.unit_price {
        Some(i) => Some(parse_amount(group(i)?)?),
        None => None,
    };

    // "12 Crate of Beer 3.56 42.66": the unit price ended up in the description
    if let (Some(q), None) = (quantity, unit_price) {
        if shape.quantity == Some(1) {
            if let Some((rest, price)) = split_trailing_price(&description, q, total) {
                description = rest;
                unit_price = Some(price);
            }
        }
    }

    let mut item = LineItem::new(description, ExtractionMethod::Semantic)
        .with_total(total)
        .with_confidence(pattern.confidence);
    item.unit_price = unit_price;

    match quantity {
        Some(q) => item.quantity = Some(q),
        None => {
            item.quantity = Some(Decimal::ONE);
            item.flag(ItemFlag::QuantityDefaulted);
        }
    }

    Some(item)
}

fn split_trailing_price(description: &str, quantity: Decimal, total: Decimal) -> Option<(String, Decimal)> {
    let caps = TRAILING_PRICE.captures(description)?;
    let price = parse_amount(&caps[2])?;

    let expected = quantity.checked_mul(price)?;
    let tolerance = total.abs().checked_mul(Decimal::new(2, 2))?;
    if total.is_zero() || expected.checked_sub(total)?.abs() > tolerance {
        return None;
    }

    Some((caps[1].to_string(), price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_qty_first_line() {
        let item = SemanticMatcher::new()
            .match_line("6  12 LITTRE PEPSI  78.49")
            .unwrap();
        assert_eq!(item.quantity, Some(dec("6")));
        assert_eq!(item.description, "12 LITTRE PEPSI");
        assert_eq!(item.unit_price, None);
        assert_eq!(item.total, Some(dec("78.49")));
        assert_eq!(item.source_method, ExtractionMethod::Semantic);
    }

    #[test]
    fn test_qty_middle_with_unit() {
        let item = SemanticMatcher::new()
            .match_line("Crate of Beer 12 £3.56 £42.66")
            .unwrap();
        assert_eq!(item.description, "Crate of Beer");
        assert_eq!(item.quantity, Some(dec("12")));
        assert_eq!(item.unit_price, Some(dec("3.56")));
        assert_eq!(item.total, Some(dec("42.66")));
        assert_eq!(item.confidence, 0.9);
    }

    #[test]
    fn test_description_first_and_implicit_qty() {
        let matcher = SemanticMatcher::new();

        let item = matcher.match_line("Crate of Beer 12 42.66").unwrap();
        assert_eq!(item.quantity, Some(dec("12")));
        assert_eq!(item.total, Some(dec("42.66")));
        assert!(!item.has_flag(ItemFlag::QuantityDefaulted));

        let item = matcher.match_line("Delivery charge 5.00").unwrap();
        assert_eq!(item.quantity, Some(Decimal::ONE));
        assert_eq!(item.total, Some(dec("5.00")));
        assert!(item.has_flag(ItemFlag::QuantityDefaulted));
    }

    #[test]
    fn test_unit_price_recovered_from_description() {
        let item = SemanticMatcher::new()
            .match_line("12 Crate of Beer 3.56 42.66")
            .unwrap();
        assert_eq!(item.description, "Crate of Beer");
        assert_eq!(item.unit_price, Some(dec("3.56")));

        // 9.99 does not explain the total, so it stays in the description
        let item = SemanticMatcher::new()
            .match_line("2 Gift box 9.99 42.66")
            .unwrap();
        assert_eq!(item.description, "Gift box 9.99");
        assert_eq!(item.unit_price, None);
    }

    #[test]
    fn test_unparseable_capture_falls_through() {
        // The stray "," is captured as a unit price by the second pattern but
        // does not parse, so the implicit-quantity pattern takes the line
        let item = SemanticMatcher::new()
            .match_line("Crate of Beer 12 , 42.66")
            .unwrap();
        assert_eq!(item.total, Some(dec("42.66")));
        assert!(item.has_flag(ItemFlag::QuantityDefaulted));

        assert!(SemanticMatcher::new().match_line("12 34").is_none());
        assert!(SemanticMatcher::new().match_line("4 Napkins ,").is_none());
    }

    #[test]
    fn test_section_markers() {
        let text = "ACME FOODS LTD\nInvoice No: 4411\nQty Description Amount\n\
                    6  12 LITTRE PEPSI  78.49\n12 Crate of Beer 42.66\n\
                    Subtotal 121.15\nDelivery 5.00";

        let outcome = SemanticMatcher::new().extract(text);
        assert_eq!(outcome.items.len(), 2);
        assert!((outcome.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_product_names_with_contact_words_are_items() {
        let text = "Description Qty Price Total\n\
                    Phone charger 2 5.00 10.00\n\
                    Tel: 0113 496 0000 5.00\n\
                    Total 10.00";

        let outcome = SemanticMatcher::new().extract(text);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].description, "Phone charger");
    }

    #[test]
    fn test_whole_page_scan_is_discounted() {
        let text = "Crate of Beer 12 3.56 42.66\nInvoice Total 42.66";

        let outcome = SemanticMatcher::new().extract(text);
        assert_eq!(outcome.items.len(), 1);
        assert!((outcome.confidence - 0.63).abs() < 1e-9);
    }

    #[test]
    fn test_custom_battery() {
        let only_d = vec![ROW_PATTERNS[3].clone()];
        let item = SemanticMatcher::new()
            .with_patterns(only_d)
            .match_line("Crate of Beer 12 42.66")
            .unwrap();
        assert_eq!(item.description, "Crate of Beer 12");
        assert_eq!(item.quantity, Some(Decimal::ONE));
    }
}
