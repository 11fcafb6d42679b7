//! Stage output: field updates with per-field source and confidence.

use crate::enrichment::warn::Warn;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, ParsedProduct, Source};

/// One field update
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: Field,
    pub value: FieldValue,
    pub source: Option<Source>,
    pub confidence: Option<f64>,
}

/// A stage's partial output, merged into the accumulator by the pipeline
///
/// Updates keep insertion order; setting the same field twice keeps the last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentDelta {
    updates: Vec<FieldUpdate>,
}

impl EnrichmentDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value with its source and confidence
    pub fn set(&mut self, field: Field, value: FieldValue, source: Source, confidence: f64) {
        self.push(FieldUpdate {
            field,
            value,
            source: Some(source),
            confidence: Some(confidence),
        });
    }

    fn push(&mut self, update: FieldUpdate) {
        self.updates.retain(|u| u.field != update.field);
        self.updates.push(update);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn updates(&self) -> &[FieldUpdate] {
        &self.updates
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.updates
            .iter()
            .find(|u| u.field == field)
            .map(|u| &u.value)
    }

    pub fn fields(&self) -> Vec<Field> {
        self.updates.iter().map(|u| u.field).collect()
    }

    /// Merge into the accumulator
    ///
    /// Every update is type-checked first; a delta with any mistyped value is
    /// rejected as a whole so the accumulator never holds half a stage's output.
    pub fn apply_to(&self, product: &mut ParsedProduct) -> Result<Vec<Field>, EnrichError> {
        for update in &self.updates {
            ParsedProduct::check_field(update.field, &update.value)?;
        }
        for update in &self.updates {
            product.apply_field(
                update.field,
                update.value.clone(),
                update.source,
                update.confidence,
            )?;
        }
        Ok(self.fields())
    }
}

/// What one stage returns: its delta and its warnings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub delta: EnrichmentDelta,
    pub warnings: Vec<Warn>,
}

impl StageOutput {
    pub fn new(delta: EnrichmentDelta, warnings: Vec<Warn>) -> Self {
        Self { delta, warnings }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
