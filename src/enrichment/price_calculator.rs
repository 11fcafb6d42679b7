//! # Price Calculator Stage
//!
//! Derives major-unit price, discount, and per-serving / per-100 g / per-unit
//! prices. Every derived monetary value is rounded to two decimals.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, Form, ParsedProduct, RawProduct, Source};
use crate::text_processing::round_to;

pub const PRICE_CONFIDENCE: f64 = 1.0;
pub const PER_AMOUNT_CONFIDENCE: f64 = 0.95;

/// Price and price-per-amount metrics
pub struct PriceCalculator;

impl PriceCalculator {
    /// Discount percentage (one decimal) when the sale price undercuts the regular price
    pub fn discount_pct(regular_cents: i64, sale_cents: i64) -> Option<f64> {
        if regular_cents > 0 && sale_cents > 0 && sale_cents < regular_cents {
            let pct = (regular_cents - sale_cents) as f64 * 100.0 / regular_cents as f64;
            Some(round_to(pct, 1))
        } else {
            None
        }
    }

    /// Weight used for per-100 g pricing
    ///
    /// A stored weight that looks like a single serving, or is under 60% of
    /// `serving_size_g × servings`, is replaced by that product.
    pub fn effective_weight(so_far: &ParsedProduct) -> Option<f64> {
        let stored = so_far.net_weight_g.filter(|w| *w > 0.0);
        let derived = match (so_far.serving_size_g, so_far.servings) {
            (Some(size), Some(n)) if size > 0.0 && n > 0 => Some((size, size * f64::from(n))),
            _ => None,
        };
        match (stored, derived) {
            (Some(w), Some((size, total))) if w <= 1.5 * size || w < 0.6 * total => Some(total),
            (Some(w), _) => Some(w),
            (None, Some((_, total))) => Some(total),
            (None, None) => None,
        }
    }
}

impl EnrichmentStage for PriceCalculator {
    fn name(&self) -> &'static str {
        "PriceCalculator"
    }

    fn apply(&self, raw: &RawProduct, so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();

        if let (Some(regular), Some(sale)) = (raw.regular_price_cents, raw.sale_price_cents) {
            match Self::discount_pct(regular, sale) {
                Some(pct) => {
                    delta.set(Field::DiscountPct, FieldValue::Number(pct), Source::Derived, PRICE_CONFIDENCE);
                    delta.set(Field::IsOnSale, FieldValue::Flag(true), Source::Derived, PRICE_CONFIDENCE);
                }
                None => delta.set(Field::IsOnSale, FieldValue::Flag(false), Source::Derived, PRICE_CONFIDENCE),
            }
        }

        let Some(price) = raw.price_cents.filter(|c| *c >= 0).map(|c| c as f64 / 100.0) else {
            return Ok(StageOutput::new(delta, Vec::new()));
        };
        delta.set(Field::Price, FieldValue::Number(round_to(price, 2)), Source::Derived, PRICE_CONFIDENCE);

        match so_far.servings.filter(|n| *n > 0) {
            Some(n) => delta.set(
                Field::PricePerServing,
                FieldValue::Number(round_to(price / f64::from(n), 2)),
                Source::Derived,
                PER_AMOUNT_CONFIDENCE,
            ),
            None => {
                // Larger pack means cheaper per serving: min uses the max count
                if let Some(max) = so_far.servings_max.filter(|n| *n > 0) {
                    delta.set(
                        Field::PricePerServingMin,
                        FieldValue::Number(round_to(price / f64::from(max), 2)),
                        Source::Derived,
                        PER_AMOUNT_CONFIDENCE,
                    );
                }
                if let Some(min) = so_far.servings_min.filter(|n| *n > 0) {
                    delta.set(
                        Field::PricePerServingMax,
                        FieldValue::Number(round_to(price / f64::from(min), 2)),
                        Source::Derived,
                        PER_AMOUNT_CONFIDENCE,
                    );
                }
            }
        }

        if Form::is_weight_based(so_far.form) {
            if let Some(weight) = Self::effective_weight(so_far) {
                delta.set(
                    Field::PricePer100g,
                    FieldValue::Number(round_to(price * 100.0 / weight, 2)),
                    Source::Derived,
                    PER_AMOUNT_CONFIDENCE,
                );
            }
        }

        if let Some(count) = so_far.unit_count.filter(|n| *n > 0) {
            delta.set(
                Field::PricePerUnit,
                FieldValue::Number(round_to(price / f64::from(count), 2)),
                Source::Derived,
                PER_AMOUNT_CONFIDENCE,
            );
        }

        Ok(StageOutput::new(delta, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(cents: i64) -> ParsedProduct {
        let raw = RawProduct::new("p1", "Whey").with_prices(cents, Some(cents), None);
        ParsedProduct::from_raw(&raw)
    }

    fn run(so_far: &ParsedProduct) -> EnrichmentDelta {
        PriceCalculator.apply(&so_far.raw, so_far).unwrap().delta
    }

    #[test]
    fn test_price_and_per_serving() {
        let mut so_far = priced(2990);
        so_far.servings = Some(30);
        so_far.net_weight_g = Some(900.0);
        so_far.form = Some(Form::Powder);
        let delta = run(&so_far);
        assert_eq!(delta.get(Field::Price), Some(&FieldValue::Number(29.9)));
        assert_eq!(delta.get(Field::PricePerServing), Some(&FieldValue::Number(1.0)));
        assert_eq!(delta.get(Field::PricePer100g), Some(&FieldValue::Number(3.32)));
    }

    #[test]
    fn test_discount() {
        assert_eq!(PriceCalculator::discount_pct(3000, 2000), Some(33.3));
        assert_eq!(PriceCalculator::discount_pct(3000, 3000), None);

        let raw = RawProduct::new("p1", "Whey").with_prices(2000, Some(3000), Some(2000));
        let delta = run(&ParsedProduct::from_raw(&raw));
        assert_eq!(delta.get(Field::DiscountPct), Some(&FieldValue::Number(33.3)));
        assert_eq!(delta.get(Field::IsOnSale), Some(&FieldValue::Flag(true)));
    }

    #[test]
    fn test_per_serving_range_inverts() {
        let mut so_far = priced(3000);
        so_far.servings_min = Some(30);
        so_far.servings_max = Some(60);
        let delta = run(&so_far);
        assert_eq!(delta.get(Field::PricePerServingMin), Some(&FieldValue::Number(0.5)));
        assert_eq!(delta.get(Field::PricePerServingMax), Some(&FieldValue::Number(1.0)));
        assert!(delta.get(Field::PricePerServing).is_none());
    }

    #[test]
    fn test_count_based_skips_per_100g() {
        let mut so_far = priced(1500);
        so_far.form = Some(Form::Capsules);
        so_far.net_weight_g = Some(120.0);
        so_far.unit_count = Some(60);
        let delta = run(&so_far);
        assert!(delta.get(Field::PricePer100g).is_none());
        assert_eq!(delta.get(Field::PricePerUnit), Some(&FieldValue::Number(0.25)));
    }

    #[test]
    fn test_per_100g_uses_rederived_weight() {
        let mut so_far = priced(3000);
        so_far.net_weight_g = Some(5.0);
        so_far.serving_size_g = Some(5.0);
        so_far.servings = Some(60);
        let delta = run(&so_far);
        assert_eq!(delta.get(Field::PricePer100g), Some(&FieldValue::Number(10.0)));
    }

    #[test]
    fn test_no_price_no_metrics() {
        let mut so_far = ParsedProduct::from_raw(&RawProduct::new("p1", "Whey"));
        so_far.servings = Some(30);
        assert!(run(&so_far).is_empty());
    }
}
