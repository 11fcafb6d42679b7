//! # Enrichment Pipeline
//!
//! Runs the fixed stage list over one product, merging deltas into the
//! accumulator and collecting warnings.
//!
//! A stage that fails (returns an error or produces a mistyped delta) is logged
//! and skipped; the product is always enriched as far as the remaining stages
//! allow.

use crate::config::PipelineConfig;
use crate::enrichment::conflict_detector::ConflictDetector;
use crate::enrichment::ingredient_tokenizer::IngredientTokenizer;
use crate::enrichment::normalizer::Normalizer;
use crate::enrichment::price_calculator::PriceCalculator;
use crate::enrichment::serving_calculator::ServingCalculator;
use crate::enrichment::taxonomy_parser::TaxonomyParser;
use crate::enrichment::title_composer::TitleComposer;
use crate::enrichment::unit_parser::UnitParser;
use crate::enrichment::variation_grouper::VariationGrouper;
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::product_model::{EnrichedProduct, ParsedProduct, RawProduct};
use tracing::{debug, info, warn};

/// Output of one `enrich` call
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub product: EnrichedProduct,
    pub warnings: Vec<Warn>,
}

/// Ordered, stateless stage list
pub struct EnrichmentPipeline {
    stages: Vec<Box<dyn EnrichmentStage>>,
}

impl Default for EnrichmentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrichmentPipeline {
    /// Pipeline with every stage enabled
    pub fn new() -> Self {
        Self::with_config(&PipelineConfig::default())
    }

    /// Build the stage list
    ///
    /// Order: Normalizer, UnitParser, ServingCalculator, PriceCalculator,
    /// TaxonomyParser, IngredientTokenizer, VariationGrouper, TitleComposer
    /// (when enabled), ConflictDetector.
    pub fn with_config(config: &PipelineConfig) -> Self {
        let mut stages: Vec<Box<dyn EnrichmentStage>> = vec![
            Box::new(Normalizer),
            Box::new(UnitParser),
            Box::new(ServingCalculator),
            Box::new(PriceCalculator),
            Box::new(TaxonomyParser),
            Box::new(IngredientTokenizer),
            Box::new(VariationGrouper),
        ];
        if config.title_composer_enabled {
            stages.push(Box::new(TitleComposer));
        }
        stages.push(Box::new(ConflictDetector));
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage and return the accumulator with the collected warnings
    pub fn run(&self, raw: &RawProduct) -> (ParsedProduct, Vec<Warn>) {
        let mut parsed = ParsedProduct::from_raw(raw);
        let mut warnings: Vec<Warn> = Vec::new();

        for stage in &self.stages {
            if !stage.supports(raw) {
                continue;
            }
            let output = match stage.apply(raw, &parsed) {
                Ok(output) => output,
                Err(e) => {
                    warn!(product_id = %raw.id, stage = stage.name(), "Stage failed: {}", e);
                    continue;
                }
            };
            match output.delta.apply_to(&mut parsed) {
                Ok(updated) => {
                    debug!(
                        product_id = %raw.id,
                        stage = stage.name(),
                        "Applied stage, updates: {:?}",
                        updated.iter().map(|f| f.as_str()).collect::<Vec<_>>()
                    );
                }
                Err(e) => {
                    warn!(product_id = %raw.id, stage = stage.name(), "Rejected delta: {}", e);
                    continue;
                }
            }
            warnings.extend(output.warnings);
        }

        (parsed, warnings)
    }

    /// Enrich one product
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::EnrichmentPipeline;
    /// use catalog_enrichment::product_model::{Form, RawProduct};
    ///
    /// let pipeline = EnrichmentPipeline::new();
    /// let raw = RawProduct::new("wc_1", "Creatine Monohydrate 300g")
    ///     .with_attr("attr_pa_valjalaske-vorm", "pulber-et");
    /// let result = pipeline.enrich(&raw);
    /// assert_eq!(result.product.parsed.form, Some(Form::Powder));
    /// assert_eq!(result.product.parsed.net_weight_g, Some(300.0));
    /// ```
    pub fn enrich(&self, raw: &RawProduct) -> EnrichmentResult {
        info!(product_id = %raw.id, "Starting enrichment");
        let (parsed, warnings) = self.run(raw);
        let product = EnrichedProduct::from_parsed(parsed, &warnings);
        info!(product_id = %raw.id, warnings = warnings.len(), "Completed enrichment");
        EnrichmentResult { product, warnings }
    }
}
