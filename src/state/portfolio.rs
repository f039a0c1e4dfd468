use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::error::InputError;

/// Held quantities per asset. Quantities are exact decimals and never
/// negative: an adjustment that would take a holding below zero is rejected
/// and leaves the book unchanged.
#[derive(Clone, Debug, Default)]
pub struct Portfolio {
    holdings: BTreeMap<String, Decimal>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the holding for `asset_id`, creating it at zero.
    /// Returns the new quantity.
    pub fn adjust(&mut self, asset_id: &str, delta: Decimal) -> Result<Decimal, InputError> {
        let held = self.quantity(asset_id);
        let next = held
            .checked_add(delta)
            .ok_or_else(|| InputError::InvalidQuantity(delta.to_string()))?;

        if next < Decimal::ZERO {
            return Err(InputError::NegativeQuantity {
                asset_id: asset_id.to_string(),
                held: held.to_string(),
                delta: delta.to_string(),
            });
        }

        self.holdings.insert(asset_id.to_string(), next.normalize());
        Ok(next)
    }

    pub fn quantity(&self, asset_id: &str) -> Decimal {
        self.holdings.get(asset_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Holdings sorted by asset id.
    pub fn holdings(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.holdings.iter()
    }
}

/// quantity × price, `None` when no price is known.
pub fn valuation(quantity: Decimal, price: Option<f64>) -> Option<f64> {
    Some(quantity.to_f64()? * price?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn adjust_is_additive() {
        let mut book = Portfolio::new();
        assert_eq!(book.adjust("bitcoin", dec("0.5")).unwrap(), dec("0.5"));
        assert_eq!(book.adjust("bitcoin", dec("0.25")).unwrap(), dec("0.75"));
        assert_eq!(book.adjust("bitcoin", dec("-0.75")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn adjust_below_zero_is_rejected_without_mutation() {
        let mut book = Portfolio::new();
        book.adjust("bitcoin", dec("1")).unwrap();

        let err = book.adjust("bitcoin", dec("-1.0001")).unwrap_err();
        assert!(matches!(err, InputError::NegativeQuantity { .. }));
        assert_eq!(book.quantity("bitcoin"), dec("1"));

        assert!(book.adjust("ethereum", dec("-3")).is_err());
        assert!(book.holdings().all(|(id, _)| id != "ethereum"));
    }

    #[test]
    fn quantities_never_go_negative_under_mixed_sequences() {
        let mut book = Portfolio::new();
        let deltas = ["1", "-2", "0.3", "-0.2", "-0.2", "5", "-5.1", "-0.1", "-0.0000001"];

        for delta in deltas {
            let _ = book.adjust("bitcoin", dec(delta));
            assert!(book.quantity("bitcoin") >= Decimal::ZERO);
        }
        assert_eq!(book.quantity("bitcoin"), dec("0.6999999"));
    }

    #[test]
    fn valuation_needs_a_price() {
        assert_eq!(valuation(dec("2"), Some(1_500.0)), Some(3_000.0));
        assert_eq!(valuation(dec("2"), None), None);
    }

    proptest! {
        /// Over any delta sequence, accepted deltas add exactly, rejected
        /// ones leave the holding untouched, and nothing goes below zero.
        #[test]
        fn holdings_stay_non_negative(cents in prop::collection::vec(-100_000i64..100_000, 0..64)) {
            let mut book = Portfolio::new();

            for raw in cents {
                let delta = Decimal::new(raw, 2);
                let before = book.quantity("bitcoin");

                match book.adjust("bitcoin", delta) {
                    Ok(next) => {
                        prop_assert_eq!(next, before + delta);
                    }
                    Err(_) => {
                        prop_assert!(before + delta < Decimal::ZERO);
                        prop_assert_eq!(book.quantity("bitcoin"), before);
                    }
                }
                prop_assert!(book.quantity("bitcoin") >= Decimal::ZERO);
            }
        }
    }
}
