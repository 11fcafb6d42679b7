//! Servings derived from net weight and serving size.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, ParsedProduct, RawProduct, Source};

pub const DERIVED_CONFIDENCE: f64 = 0.85;
const MAX_SERVINGS: f64 = 1000.0;

/// Fills `servings = round(net_weight_g / serving_size_g)` when no count or range exists
pub struct ServingCalculator;

impl EnrichmentStage for ServingCalculator {
    fn name(&self) -> &'static str {
        "ServingCalculator"
    }

    fn apply(&self, raw: &RawProduct, so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();
        let mut warnings = Vec::new();

        let has_range = so_far.servings_min.is_some() || so_far.servings_max.is_some();
        if has_range || so_far.servings.is_some() {
            return Ok(StageOutput::empty());
        }

        if let (Some(weight), Some(size)) = (so_far.net_weight_g, so_far.serving_size_g) {
            let servings = if size > 0.0 { weight / size } else { f64::INFINITY };
            let rounded = servings.round();
            if servings > 0.0 && servings <= MAX_SERVINGS && rounded >= 1.0 {
                delta.set(Field::Servings, FieldValue::Count(rounded as u32), Source::Derived, DERIVED_CONFIDENCE);
            } else {
                warnings.push(
                    Warn::unit_ambiguity(&raw.id, Field::Servings.as_str())
                        .with_evidence(format!("{weight} g / {size} g")),
                );
            }
        }

        Ok(StageOutput::new(delta, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::warn::WarnCode;

    fn parsed(weight: Option<f64>, size: Option<f64>) -> ParsedProduct {
        let mut parsed = ParsedProduct::from_raw(&RawProduct::new("p1", "Whey"));
        parsed.net_weight_g = weight;
        parsed.serving_size_g = size;
        parsed
    }

    #[test]
    fn test_derives_servings() {
        let so_far = parsed(Some(1000.0), Some(30.0));
        let out = ServingCalculator.apply(&so_far.raw, &so_far).unwrap();
        assert_eq!(out.delta.get(Field::Servings), Some(&FieldValue::Count(33)));
        assert_eq!(out.delta.updates()[0].confidence, Some(0.85));
    }

    #[test]
    fn test_out_of_range_warns() {
        let so_far = parsed(Some(5000.0), Some(0.5));
        let out = ServingCalculator.apply(&so_far.raw, &so_far).unwrap();
        assert!(out.delta.is_empty());
        assert!(out.warnings[0].is(WarnCode::UnitAmbiguity, "servings"));
    }

    #[test]
    fn test_range_blocks_derivation() {
        let mut so_far = parsed(Some(300.0), Some(5.0));
        so_far.servings_min = Some(30);
        so_far.servings_max = Some(60);
        let out = ServingCalculator.apply(&so_far.raw, &so_far).unwrap();
        assert!(out.delta.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_missing_inputs_do_nothing() {
        let so_far = parsed(Some(300.0), None);
        let out = ServingCalculator.apply(&so_far.raw, &so_far).unwrap();
        assert!(out.delta.is_empty());
        assert!(out.warnings.is_empty());
    }
}
