//! # Batch Enrichment Module
//!
//! Runs the deterministic pipeline, and the AI lane when one is configured,
//! over many products with a bounded number of concurrent workers. Output
//! order always matches input order.
//!
//! Input is JSON Lines: each line is either a store-feed product object or an
//! already adapted `RawProduct`. A malformed line is logged and skipped.

use crate::ai::enricher::AiEnricher;
use crate::ai::transport::ChatTransport;
use crate::enrichment::{EnrichmentPipeline, EnrichmentResult};
use crate::product_model::RawProduct;
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Decode one input line
///
/// Store-feed objects are recognised by a `prices` block or a numeric id.
///
/// # Examples
///
/// ```rust
/// use catalog_enrichment::batch::parse_input_line;
///
/// let store = parse_input_line(r#"{"id": 7, "name": "Whey", "prices": {"price": "1990"}}"#).unwrap();
/// assert_eq!(store.id, "wc_7");
/// assert_eq!(store.price_cents, Some(1990));
///
/// let raw = parse_input_line(r#"{"id": "wc_8", "name": "Creatine"}"#).unwrap();
/// assert_eq!(raw.id, "wc_8");
/// ```
pub fn parse_input_line(line: &str) -> Result<RawProduct> {
    let value: Value = serde_json::from_str(line).context("Failed to parse input line as JSON")?;
    let is_store_json = value.get("prices").is_some() || value.get("id").is_some_and(Value::is_number);
    if is_store_json {
        return Ok(RawProduct::from_store_json(&value));
    }
    serde_json::from_value(value).context("Failed to decode RawProduct")
}

/// Read every product from a JSON Lines reader, skipping blank and malformed lines
pub fn read_products<R: BufRead>(reader: R) -> Result<Vec<RawProduct>> {
    let mut products = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_input_line(&line) {
            Ok(product) => products.push(product),
            Err(e) => warn!(line = index + 1, "Skipping malformed product: {:#}", e),
        }
    }
    Ok(products)
}

/// Bounded-parallelism enrichment over a product list
pub struct BatchEnricher<T: ChatTransport + 'static> {
    pipeline: Arc<EnrichmentPipeline>,
    ai: Option<Arc<AiEnricher<T>>>,
    concurrency: usize,
}

impl<T: ChatTransport + 'static> BatchEnricher<T> {
    pub fn new(pipeline: EnrichmentPipeline, ai: Option<AiEnricher<T>>, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            ai: ai.map(Arc::new),
            concurrency: concurrency.max(1),
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.is_some()
    }

    /// Deterministic pipeline, then the AI lane merged into UX fields
    pub async fn enrich_one(
        pipeline: &EnrichmentPipeline,
        ai: Option<&AiEnricher<T>>,
        raw: &RawProduct,
    ) -> EnrichmentResult {
        let mut result = pipeline.enrich(raw);
        if let Some(ai) = ai {
            let augmentation = ai.enrich(raw, &result.product.parsed).await;
            let added = result.product.merge_ai(augmentation);
            result.warnings.extend(added);
        }
        result
    }

    /// Enrich every product; results come back in input order
    pub async fn run(&self, products: Vec<RawProduct>) -> Vec<EnrichmentResult> {
        let total = products.len();
        info!(products = total, concurrency = self.concurrency, ai = self.ai_enabled(), "Starting batch");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);
        for raw in products {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let ai = self.ai.clone();
            handles.push((
                raw.id.clone(),
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    Self::enrich_one(&pipeline, ai.as_deref(), &raw).await
                }),
            ));
        }

        let mut results = Vec::with_capacity(total);
        for (product_id, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => error!(product_id = %product_id, "Enrichment task failed: {}", e),
            }
        }

        let warnings: usize = results.iter().map(|r| r.warnings.len()).sum();
        info!(products = results.len(), warnings, "Completed batch");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::model::RawChatResponse;
    use crate::ai::transport::{ChatRequest, OpenAiTransport};
    use crate::enrichment_errors::AiError;
    use std::io::Cursor;

    struct UnusedTransport;

    impl ChatTransport for UnusedTransport {
        async fn complete(&self, _request: &ChatRequest) -> Result<RawChatResponse, AiError> {
            Err(AiError::EmptyChoices)
        }
    }

    #[test]
    fn test_read_products_skips_bad_lines() {
        let input = "{\"id\": \"a\", \"name\": \"Whey\"}\n\nnot json\n{\"id\": 5, \"name\": \"BCAA\"}\n";
        let products = read_products(Cursor::new(input)).unwrap();
        let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "wc_5"]);
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let batch = BatchEnricher::<UnusedTransport>::new(EnrichmentPipeline::new(), None, 3);
        let products: Vec<RawProduct> = (0..10)
            .map(|i| RawProduct::new(format!("p{i}"), format!("Creatine {}g", 100 + i)))
            .collect();
        let results = batch.run(products).await;
        let ids: Vec<_> = results.iter().map(|r| r.product.id().to_string()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("p{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_deterministic_only_batch() {
        let batch = BatchEnricher::<OpenAiTransport>::new(EnrichmentPipeline::new(), None, 1);
        assert!(!batch.ai_enabled());
        let results = batch.run(vec![RawProduct::default()]).await;
        assert_eq!(results.len(), 1);
    }
}
