//! Arbitration between the spatial and semantic strategies.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use crate::layout::StrategyOutcome;
use crate::models::config::SelectionConfig;
use crate::models::invoice::{ExtractionMethod, LineItem};

/// Line items kept for the page, with the strategy that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub items: Vec<LineItem>,
    pub method: ExtractionMethod,
    pub confidence: f64,
}

/// Pick the winning strategy.
///
/// Rules, in order:
/// 1. spatial with at least `spatial_min_items` items and confidence above
///    `spatial_min_confidence`;
/// 2. semantic with at least one item;
/// 3. strictly more items, then higher confidence, then spatial.
pub fn select(spatial: StrategyOutcome, semantic: StrategyOutcome, config: &SelectionConfig) -> Selection {
    let method = if spatial.items.len() >= config.spatial_min_items
        && spatial.confidence > config.spatial_min_confidence
    {
        ExtractionMethod::Spatial
    } else if !semantic.items.is_empty() {
        ExtractionMethod::Semantic
    } else {
        match spatial.items.len().cmp(&semantic.items.len()) {
            Ordering::Greater => ExtractionMethod::Spatial,
            Ordering::Less => ExtractionMethod::Semantic,
            Ordering::Equal => {
                if semantic.confidence > spatial.confidence {
                    ExtractionMethod::Semantic
                } else {
                    ExtractionMethod::Spatial
                }
            }
        }
    };

    debug!(
        "Selector: spatial {} items ({:.2}), semantic {} items ({:.2}) -> {}",
        spatial.items.len(),
        spatial.confidence,
        semantic.items.len(),
        semantic.confidence,
        method
    );

    let (mut winner, loser) = match method {
        ExtractionMethod::Spatial => (spatial, semantic),
        ExtractionMethod::Semantic => (semantic, spatial),
    };

    if config.merge_equal_counts && winner.items.len() == loser.items.len() {
        for (item, other) in winner.items.iter_mut().zip(&loser.items) {
            fill_missing(item, other);
        }
    }

    Selection {
        items: winner.items,
        method,
        confidence: winner.confidence,
    }
}

/// Copy numeric fields the item lacks from the same row of the other strategy.
fn fill_missing(item: &mut LineItem, other: &LineItem) {
    if !share_word(&item.description, &other.description) {
        return;
    }

    let before = item.numeric_fields();
    item.quantity = item.quantity.or(other.quantity);
    item.unit_price = item.unit_price.or(other.unit_price);
    item.total = item.total.or(other.total);

    if item.numeric_fields() > before {
        debug!("Selector: filled {:?} from the other strategy", item.description);
    }
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn share_word(a: &str, b: &str) -> bool {
    !words(a).is_disjoint(&words(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn outcome(method: ExtractionMethod, n: usize, confidence: f64) -> StrategyOutcome {
        let items: Vec<LineItem> = (0..n)
            .map(|i| {
                LineItem::new(format!("Item number {}", i), method)
                    .with_total(Decimal::from(i as i64 + 1))
                    .with_confidence(confidence)
            })
            .collect();
        StrategyOutcome::new(items)
    }

    #[test]
    fn test_confident_spatial_wins() {
        let config = SelectionConfig::default();
        let spatial = outcome(ExtractionMethod::Spatial, 2, 0.9);
        let semantic = outcome(ExtractionMethod::Semantic, 5, 0.9);

        let selection = select(spatial, semantic, &config);
        assert_eq!(selection.method, ExtractionMethod::Spatial);
        assert_eq!(selection.items.len(), 2);
    }

    #[test]
    fn test_semantic_safety_net() {
        let config = SelectionConfig::default();
        let spatial = outcome(ExtractionMethod::Spatial, 0, 0.0);
        let semantic = outcome(ExtractionMethod::Semantic, 12, 0.8);

        let selection = select(spatial, semantic, &config);
        assert_eq!(selection.method, ExtractionMethod::Semantic);
        assert_eq!(selection.items.len(), 12);
        assert!((selection.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_spatial_loses_to_any_semantic() {
        let config = SelectionConfig::default();
        let spatial = outcome(ExtractionMethod::Spatial, 4, 0.5);
        let semantic = outcome(ExtractionMethod::Semantic, 1, 0.6);
        assert_eq!(select(spatial, semantic, &config).method, ExtractionMethod::Semantic);
    }

    #[test]
    fn test_fallback_by_count_then_spatial() {
        let config = SelectionConfig::default();

        let spatial = outcome(ExtractionMethod::Spatial, 1, 0.3);
        let semantic = outcome(ExtractionMethod::Semantic, 0, 0.0);
        assert_eq!(select(spatial, semantic, &config).method, ExtractionMethod::Spatial);

        let spatial = outcome(ExtractionMethod::Spatial, 0, 0.0);
        let semantic = outcome(ExtractionMethod::Semantic, 0, 0.0);
        let selection = select(spatial, semantic, &config);
        assert_eq!(selection.method, ExtractionMethod::Spatial);
        assert!(selection.items.is_empty());
    }

    #[test]
    fn test_equal_counts_fill_missing_fields() {
        let config = SelectionConfig::default();
        let spatial = StrategyOutcome::new(vec![
            LineItem::new("Crate of Beer", ExtractionMethod::Spatial)
                .with_quantity(Decimal::from(12))
                .with_total(Decimal::new(4266, 2))
                .with_confidence(0.75),
            LineItem::new("Lemons", ExtractionMethod::Spatial)
                .with_total(Decimal::new(150, 2))
                .with_confidence(0.75),
        ]);
        let semantic = StrategyOutcome::new(vec![
            LineItem::new("Crate of Beer", ExtractionMethod::Semantic)
                .with_quantity(Decimal::from(12))
                .with_unit_price(Decimal::new(356, 2))
                .with_total(Decimal::new(4266, 2)),
            LineItem::new("Delivery", ExtractionMethod::Semantic)
                .with_quantity(Decimal::from(3))
                .with_total(Decimal::new(150, 2)),
        ]);

        let selection = select(spatial, semantic, &config);
        assert_eq!(selection.method, ExtractionMethod::Spatial);
        assert_eq!(selection.items[0].unit_price, Some(Decimal::new(356, 2)));
        // Different descriptions: nothing copied
        assert_eq!(selection.items[1].quantity, None);
    }

    #[test]
    fn test_share_word() {
        assert!(share_word("Crate of Beer", "CRATE BEER 24x"));
        assert!(!share_word("12 x 4", "12 x 5"));
    }
}
