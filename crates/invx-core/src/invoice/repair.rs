//! Arithmetic back-filling of missing line-item fields.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::models::invoice::{ItemFlag, LineItem};

/// Round to pence, half to even.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Fill missing numeric fields of one item. Present values are never
/// overwritten.
pub fn repair_item(item: &mut LineItem) {
    match (item.quantity, item.unit_price, item.total) {
        (Some(q), None, Some(total)) => {
            if q.is_zero() {
                item.flag(ItemFlag::ZeroQuantity);
            } else if let Some(price) = total.checked_div(q) {
                item.unit_price = Some(round_money(price));
                item.flag(ItemFlag::UnitPriceInferred);
            } else {
                debug!("Field repair: unit price of {:?} out of range", item.description);
            }
        }
        (Some(q), Some(price), None) => match q.checked_mul(price) {
            Some(total) => {
                item.total = Some(round_money(total));
                item.flag(ItemFlag::TotalInferred);
            }
            None => debug!("Field repair: total of {:?} out of range", item.description),
        },
        (Some(q), _, _) if q.is_zero() => item.flag(ItemFlag::ZeroQuantity),
        _ => {}
    }
}

/// Repair every item in place.
pub fn repair_items(items: &mut [LineItem]) {
    for item in items.iter_mut() {
        repair_item(item);
    }

    let repaired = items
        .iter()
        .filter(|i| i.has_flag(ItemFlag::UnitPriceInferred) || i.has_flag(ItemFlag::TotalInferred))
        .count();
    debug!("Field repair: {} of {} items back-filled", repaired, items.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::ExtractionMethod;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item() -> LineItem {
        LineItem::new("Crate of Beer", ExtractionMethod::Spatial)
    }

    #[test]
    fn test_unit_price_back_filled() {
        let mut i = item().with_quantity(dec("12")).with_total(dec("42.66"));
        repair_item(&mut i);
        assert_eq!(i.unit_price, Some(dec("3.56")));
        assert!(i.has_flag(ItemFlag::UnitPriceInferred));
    }

    #[test]
    fn test_zero_quantity_is_flagged() {
        let mut i = item().with_quantity(Decimal::ZERO).with_total(dec("5.00"));
        repair_item(&mut i);
        assert_eq!(i.unit_price, None);
        assert!(i.has_flag(ItemFlag::ZeroQuantity));
    }

    #[test]
    fn test_total_back_filled() {
        let mut i = item().with_quantity(dec("3")).with_unit_price(dec("0.333"));
        repair_item(&mut i);
        assert_eq!(i.total, Some(dec("1.00")));
        assert!(i.has_flag(ItemFlag::TotalInferred));
    }

    #[test]
    fn test_present_values_untouched() {
        let mut i = item()
            .with_quantity(dec("12"))
            .with_unit_price(dec("3.50"))
            .with_total(dec("42.66"));
        repair_item(&mut i);
        assert_eq!(i.unit_price, Some(dec("3.50")));
        assert!(i.flags.is_empty());
    }

    #[test]
    fn test_out_of_range_values_are_left_absent() {
        let huge = Decimal::MAX;
        let mut i = item().with_quantity(dec("9999")).with_unit_price(huge);
        repair_item(&mut i);
        assert_eq!(i.total, None);
        assert!(i.flags.is_empty());

        let mut i = item().with_quantity(dec("0.0001")).with_total(huge);
        repair_item(&mut i);
        assert_eq!(i.unit_price, None);
    }

    #[test]
    fn test_bankers_rounding() {
        assert_eq!(round_money(dec("3.555")), dec("3.56"));
        assert_eq!(round_money(dec("3.545")), dec("3.54"));
        assert_eq!(round_money(dec("-1.005")), dec("-1.00"));
    }

    #[test]
    fn test_self_healing_invariant() {
        let mut items: Vec<LineItem> = [("7", "10.00"), ("3", "1.00"), ("11", "99.99"), ("6", "78.49")]
            .iter()
            .map(|(q, t)| item().with_quantity(dec(q)).with_total(dec(t)))
            .collect();
        repair_items(&mut items);

        for i in &items {
            let (q, p, t) = (i.quantity.unwrap(), i.unit_price.unwrap(), i.total.unwrap());
            assert!((round_money(t / q) - p).abs() <= dec("0.01"));
        }
    }
}
