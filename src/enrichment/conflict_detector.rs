//! # Conflict Detector Stage
//!
//! Runs last. Proposes a final form fallback, flags title text that
//! contradicts the chosen form, and reports critical fields that are still
//! missing for the effective form.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::measurement_patterns::{CAPSULE_TOKEN, TABLET_TOKEN};
use crate::product_model::{Field, FieldValue, Form, ParsedProduct, RawProduct, Source};
use tracing::debug;

pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Final consistency and completeness check
pub struct ConflictDetector;

impl ConflictDetector {
    /// Capsules or tabs from plain text hints, `None` without any hint
    pub fn fallback_form(raw: &RawProduct) -> Option<Form> {
        let text = format!("{} {}", raw.name_or_empty(), raw.text());
        if TABLET_TOKEN.is_match(&text) {
            Some(Form::Tabs)
        } else if CAPSULE_TOKEN.is_match(&text) {
            Some(Form::Capsules)
        } else {
            None
        }
    }

    /// Title contradictions against an already chosen form
    pub fn title_conflicts(raw: &RawProduct, form: Form) -> Vec<Warn> {
        let name = raw.name_or_empty().to_lowercase();
        let field = Field::Form.as_str();
        let mut warnings = Vec::new();

        if form.is_count_based() && (name.contains("powder") || name.contains("pulber")) {
            warnings.push(Warn::title_conflict(&raw.id, field, form.as_str(), "powder").with_evidence(name.clone()));
        }
        if form == Form::Powder && (CAPSULE_TOKEN.is_match(&name) || TABLET_TOKEN.is_match(&name)) {
            warnings.push(Warn::title_conflict(&raw.id, field, form.as_str(), "capsules/tabs").with_evidence(name));
        }
        warnings
    }

    /// Critical fields missing for `form`
    ///
    /// Count-based products need servings only when units-per-serving
    /// evidence exists, and never need a net weight.
    pub fn missing_critical(so_far: &ParsedProduct, form: Option<Form>) -> Vec<Field> {
        let count_based = form.is_some_and(|f| f.is_count_based());
        let has_servings = so_far.servings.is_some() || so_far.servings_min.is_some() || so_far.servings_max.is_some();
        let servings_critical = !count_based || so_far.units_per_serving.is_some();

        let mut missing = Vec::new();
        if servings_critical && !has_servings {
            missing.push(Field::Servings);
        }
        if !count_based && so_far.net_weight_g.is_none() {
            missing.push(Field::NetWeightG);
        }
        if form.is_none() {
            missing.push(Field::Form);
        }
        missing
    }
}

impl EnrichmentStage for ConflictDetector {
    fn name(&self) -> &'static str {
        "ConflictDetector"
    }

    fn apply(&self, raw: &RawProduct, so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();
        let mut warnings = Vec::new();

        let effective_form = match so_far.form {
            Some(form) => {
                warnings.extend(Self::title_conflicts(raw, form));
                Some(form)
            }
            None => {
                let proposed = Self::fallback_form(raw);
                if let Some(form) = proposed {
                    debug!(product_id = %raw.id, form = form.as_str(), "Fallback form from text hints");
                    delta.set(Field::Form, FieldValue::Form(form), Source::Heuristic, FALLBACK_CONFIDENCE);
                }
                proposed
            }
        };

        for field in Self::missing_critical(so_far, effective_form) {
            warnings.push(Warn::missing_critical(&raw.id, field.as_str()));
        }

        Ok(StageOutput::new(delta, warnings))
    }
}
