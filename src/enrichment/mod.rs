//! # Enrichment Module
//!
//! The deterministic enrichment pipeline: a fixed, ordered list of stages that
//! each read the raw record and the accumulator so far and return a delta plus
//! warnings.
//!
//! Stage order is significant. Later stages may overwrite earlier values (for
//! example the form fallbacks in `UnitParser` and `ConflictDetector`), so the
//! list built by [`EnrichmentPipeline`] must not be reordered.

pub mod conflict_detector;
pub mod delta;
pub mod ingredient_tokenizer;
pub mod normalizer;
pub mod pipeline;
pub mod price_calculator;
pub mod serving_calculator;
pub mod taxonomy_parser;
pub mod title_composer;
pub mod unit_parser;
pub mod variation_grouper;
pub mod warn;

use crate::enrichment_errors::EnrichError;
use crate::product_model::{ParsedProduct, RawProduct};

pub use delta::{EnrichmentDelta, StageOutput};
pub use pipeline::{EnrichmentPipeline, EnrichmentResult};
pub use warn::{Warn, WarnCode};

/// One deterministic pipeline stage
///
/// Stages are pure: they never mutate the raw record or the accumulator, and
/// they hold no state between calls.
pub trait EnrichmentStage: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Whether the stage applies to this product at all
    fn supports(&self, _raw: &RawProduct) -> bool {
        true
    }

    /// Compute this stage's delta and warnings
    fn apply(&self, raw: &RawProduct, so_far: &ParsedProduct) -> Result<StageOutput, EnrichError>;
}
