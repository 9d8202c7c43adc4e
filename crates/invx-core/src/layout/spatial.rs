//! Geometry-driven line-item extraction.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ExtractionError;
use crate::invoice::rules::{is_numeric_text, is_skip_line, is_summary_line, is_table_header, parse_amount};
use crate::layout::columns::{cluster_columns, split_leading_numbers};
use crate::layout::profile::{profile_columns, ColumnRole};
use crate::layout::rows::{group_lines, reconstruct_rows, RowCandidate};
use crate::models::config::LayoutConfig;
use crate::models::invoice::{ExtractionMethod, LineItem};
use crate::models::token::Token;

/// Items produced by one extraction strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutcome {
    pub items: Vec<LineItem>,
    /// Mean item confidence (0.0 - 1.0).
    pub confidence: f64,
}

impl StrategyOutcome {
    pub fn new(items: Vec<LineItem>) -> Self {
        let confidence = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|i| i.confidence).sum::<f64>() / items.len() as f64
        };
        Self { items, confidence }
    }
}

/// Spatial strategy: gap clustering, column profiling and row bucketing.
pub struct SpatialExtractor {
    layout: LayoutConfig,
}

impl SpatialExtractor {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    /// Extract line items from positioned tokens.
    ///
    /// Fails with `InsufficientEvidence` when the page has no usable column
    /// structure; the caller falls back to the semantic strategy.
    pub fn extract(
        &self,
        tokens: &[Token],
        image_width: f64,
        image_height: f64,
    ) -> Result<StrategyOutcome, ExtractionError> {
        let lines = group_lines(tokens, self.layout.y_tolerance(image_height));
        let region = table_region(&lines);

        if region.is_empty() {
            return Err(ExtractionError::InsufficientEvidence(
                "empty line-item section".to_string(),
            ));
        }

        let numeric_x: Vec<f64> = region
            .iter()
            .flatten()
            .filter(|t| is_numeric_text(&t.text))
            .map(Token::center_x)
            .collect();

        let boundaries = cluster_columns(&numeric_x, image_width, &self.layout).ok_or_else(|| {
            ExtractionError::InsufficientEvidence(
                "fewer than 2 distinct numeric x-positions".to_string(),
            )
        })?;
        let boundaries = split_leading_numbers(&boundaries, &region);

        let rows = reconstruct_rows(&region, &boundaries);

        let samples: Vec<&RowCandidate> = rows
            .iter()
            .filter(|row| row.tokens().any(|t| is_numeric_text(&t.text)))
            .take(self.layout.profile_sample_rows)
            .collect();
        let roles = profile_columns(&samples, boundaries.column_count());

        if !roles.contains(&ColumnRole::Description) {
            return Err(ExtractionError::InsufficientEvidence(
                "no description column".to_string(),
            ));
        }

        let items = build_items(&rows, &roles);
        debug!(
            "Spatial: {} rows, {} columns, {} items",
            rows.len(),
            boundaries.column_count(),
            items.len()
        );

        Ok(StrategyOutcome::new(items))
    }
}

/// Lines between the item-table heading and the totals block.
///
/// Without a heading the whole page is the region. Lines that can never be
/// items are dropped.
fn table_region(lines: &[Vec<Token>]) -> Vec<Vec<Token>> {
    let line_text = |line: &Vec<Token>| {
        line.iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let start = lines
        .iter()
        .position(|line| is_table_header(&line_text(line)))
        .map(|i| i + 1)
        .unwrap_or(0);

    lines[start..]
        .iter()
        .take_while(|line| !is_summary_line(&line_text(line)))
        .filter(|line| !is_skip_line(&line_text(line)))
        .cloned()
        .collect()
}

fn build_items(rows: &[RowCandidate], roles: &[ColumnRole]) -> Vec<LineItem> {
    let columns_with = |role: ColumnRole| -> Vec<usize> {
        roles
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == role)
            .map(|(i, _)| i)
            .collect()
    };

    let description_cols = columns_with(ColumnRole::Description);
    let quantity_cols = columns_with(ColumnRole::Quantity);
    let price_cols = columns_with(ColumnRole::UnitPrice);
    let total_cols = columns_with(ColumnRole::Total);

    let mut items: Vec<LineItem> = Vec::new();

    for row in rows {
        let description = description_cols
            .iter()
            .filter_map(|c| row.column_text(*c))
            .collect::<Vec<_>>()
            .join(" ");

        let quantity = first_value(row, &quantity_cols);
        let unit_price = first_value(row, &price_cols);
        let total = first_value(row, &total_cols);

        if quantity.is_none() && unit_price.is_none() && total.is_none() {
            // Wrapped description continues the previous item
            match items.last_mut() {
                Some(prev) if !description.is_empty() => {
                    prev.description.push(' ');
                    prev.description.push_str(&description);
                }
                _ => debug!("Spatial: discarding non-item row {:?}", row.text()),
            }
            continue;
        }

        if description.is_empty() {
            debug!("Spatial: discarding row without description {:?}", row.text());
            continue;
        }

        let mut item = LineItem::new(description, ExtractionMethod::Spatial);
        item.quantity = quantity;
        item.unit_price = unit_price;
        item.total = total;

        let found = 1 + item.numeric_fields();
        item.confidence = found as f64 / 4.0 * row.mean_confidence();
        items.push(item);
    }

    items
}

/// Parsed value of the first populated column in `cols`.
///
/// The whole cell is tried first, then its last numeric token.
fn first_value(row: &RowCandidate, cols: &[usize]) -> Option<Decimal> {
    cols.iter().find_map(|c| {
        let tokens = row.columns.get(c)?;
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        parse_amount(&joined).or_else(|| tokens.iter().rev().find_map(|t| parse_amount(&t.text)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::BBox;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn token(text: &str, x: f64, y: f64) -> Token {
        Token::new(text, BBox::new(x, y, 60.0, 20.0), 1.0, 1)
    }

    fn table(rows: &[&[(&str, f64)]], top: f64) -> Vec<Token> {
        rows.iter()
            .enumerate()
            .flat_map(|(i, cells)| {
                let y = top + i as f64 * 50.0;
                cells.iter().map(move |(text, x)| token(text, *x, y))
            })
            .collect()
    }

    #[test]
    fn test_single_row_table() {
        let tokens = table(
            &[&[("Crate", 10.0), ("of", 80.0), ("Beer", 120.0), ("12", 780.0), ("3.56", 980.0), ("42.66", 1180.0)]],
            100.0,
        );

        let outcome = SpatialExtractor::new(LayoutConfig::default())
            .extract(&tokens, 1250.0, 1800.0)
            .unwrap();

        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.description, "Crate of Beer");
        assert_eq!(item.quantity, Some(dec("12")));
        assert_eq!(item.unit_price, Some(dec("3.56")));
        assert_eq!(item.total, Some(dec("42.66")));
        assert_eq!(item.confidence, 1.0);
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn test_region_and_continuation_rows() {
        let tokens = table(
            &[
                &[("ACME", 10.0), ("FOODS", 90.0)],
                &[("Description", 10.0), ("Qty", 780.0), ("Price", 980.0), ("Total", 1180.0)],
                &[("Crate", 10.0), ("of", 80.0), ("Beer", 120.0), ("12", 780.0), ("3.56", 980.0), ("42.66", 1180.0)],
                &[("(returnable)", 10.0)],
                &[("Lemons", 10.0), ("3", 780.0), ("0.50", 980.0), ("1.50", 1180.0)],
                &[("Subtotal", 10.0), ("44.16", 1180.0)],
                &[("Page", 10.0), ("1", 80.0)],
            ],
            100.0,
        );

        let outcome = SpatialExtractor::new(LayoutConfig::default())
            .extract(&tokens, 1250.0, 1800.0)
            .unwrap();

        let descriptions: Vec<&str> = outcome.items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Crate of Beer (returnable)", "Lemons"]);
        assert_eq!(outcome.items[1].total, Some(dec("1.50")));
    }

    #[test]
    fn test_missing_unit_price_column() {
        let tokens = table(
            &[
                &[("Crate", 10.0), ("of", 80.0), ("Beer", 120.0), ("12", 780.0), ("42.66", 1180.0)],
                &[("Lemons", 10.0), ("3", 780.0), ("1.50", 1180.0)],
            ],
            100.0,
        );

        let outcome = SpatialExtractor::new(LayoutConfig::default())
            .extract(&tokens, 1250.0, 1800.0)
            .unwrap();

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].quantity, Some(dec("12")));
        assert_eq!(outcome.items[0].unit_price, None);
        assert_eq!(outcome.items[0].total, Some(dec("42.66")));
        assert_eq!(outcome.items[0].confidence, 0.75);
    }

    #[test]
    fn test_tight_columns_are_insufficient() {
        // Every number sits at the same x-position
        let tokens = table(
            &[
                &[("6 12 LITTRE PEPSI 78.49", 10.0)],
                &[("12 Crate of Beer 42.66", 10.0)],
            ],
            100.0,
        );

        let err = SpatialExtractor::new(LayoutConfig::default())
            .extract(&tokens, 1250.0, 1800.0)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InsufficientEvidence(_)));
    }
}
