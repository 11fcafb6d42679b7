//! # AI Enricher Module
//!
//! Optional augmentation lane: one structured-output chat call per distinct
//! product input per cache lifetime.
//!
//! ## Flow
//!
//! 1. Build the canonical input JSON and hash it (SHA-256)
//! 2. Look up `model:v1:hash` in the cache; a fresh hit returns immediately
//! 3. Reserve rate-limit budget, call the transport (nudging and retrying on 429)
//! 4. Record token usage, parse the message content as JSON
//! 5. Stamp hash/timestamp/version, persist to the cache, return
//!
//! Every failure along the way is logged and turned into an empty
//! [`AiEnrichment`]; deterministic output never depends on this lane.

use crate::ai::cache::{CacheStore, TIMESTAMP_KEY};
use crate::ai::model::{AiEnrichment, RawChatResponse, GOAL_CATEGORIES};
use crate::ai::rate_limiter::RateLimiter;
use crate::ai::token_accounting::UsageSink;
use crate::ai::transport::{ChatRequest, ChatTransport};
use crate::config::{AiConfig, CacheKeyMode, CACHE_VERSION};
use crate::enrichment_errors::AiError;
use crate::product_model::{ParsedProduct, RawProduct};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ENRICHMENT_VERSION: u32 = 1;

/// Completion budget added to the prompt estimate when reserving tokens
const COMPLETION_TOKEN_ALLOWANCE: u64 = 800;

const SYSTEM_PROMPT: &str = "You are a product enrichment engine. Reply STRICT JSON per schema.";

/// AI augmentation lane over a chat transport
pub struct AiEnricher<T: ChatTransport> {
    transport: T,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<RateLimiter>,
    usage: Arc<dyn UsageSink>,
    model: String,
    cache_key_mode: CacheKeyMode,
    max_retries: u32,
}

impl<T: ChatTransport> AiEnricher<T> {
    pub fn new(
        transport: T,
        cache: Arc<dyn CacheStore>,
        limiter: Arc<RateLimiter>,
        usage: Arc<dyn UsageSink>,
        config: &AiConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            limiter,
            usage,
            model: config.model.clone(),
            cache_key_mode: config.cache_key_mode,
            max_retries: config.max_retries,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Catalog fields only
    pub fn raw_input(raw: &RawProduct) -> Value {
        json!({
            "id": raw.id,
            "name": raw.name,
            "slug": raw.slug,
            "sku": raw.sku,
            "search_text": raw.text(),
            "brand": raw.brand_name,
            "categories": raw.category_names,
            "attrs": raw.dynamic_attrs,
        })
    }

    /// Catalog fields plus the deterministic parsed core
    pub fn full_input(raw: &RawProduct, parsed: &ParsedProduct) -> Value {
        let mut input = Self::raw_input(raw);
        input["parsed"] = json!({
            "form": parsed.form.map(|f| f.as_str()),
            "flavor": parsed.flavor,
            "net_weight_g": parsed.net_weight_g,
            "servings": parsed.servings,
            "servings_min": parsed.servings_min,
            "servings_max": parsed.servings_max,
            "serving_size_g": parsed.serving_size_g,
            "goal_tags": parsed.goal_tags,
            "diet_tags": parsed.diet_tags,
        });
        input
    }

    /// SHA-256 hex of the input selected by the cache-key mode
    pub fn input_hash(&self, raw: &RawProduct, parsed: &ParsedProduct) -> String {
        let input = match self.cache_key_mode {
            CacheKeyMode::Raw => Self::raw_input(raw),
            CacheKeyMode::RawParsed => Self::full_input(raw, parsed),
        };
        format!("{:x}", Sha256::digest(input.to_string().as_bytes()))
    }

    pub fn cache_key(&self, input_hash: &str) -> String {
        format!("{}:{}:{}", self.model, CACHE_VERSION, input_hash)
    }

    /// User prompt carrying the reply schema, the rules and the input JSON
    pub fn build_prompt(input_json: &str) -> String {
        let goals = GOAL_CATEGORIES
            .iter()
            .map(|g| format!("{g}: {{score, confidence}}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Given product JSON below, validate parsed fields and fill nulls; then generate UX fields and goal relevance scores. \
             Return ONLY this JSON object with keys fill, generate, safety_flags, conflicts, goal_scores.\n\
             Schema: {{ fill: {{form, flavor, servings, servings_min, servings_max, serving_size_g, ingredients_key, goal_tags, diet_tags}}, \
             generate: {{benefit_snippet, faq: [{{q,a}}], synonyms_multi: {{en:[], ru:[], et:[]}}, dosage_text, timing_text}}, \
             safety_flags: [{{flag, confidence, evidence}}], conflicts: [{{field, det_value, ai_value, evidence}}], \
             goal_scores: {{ {goals} }} }}.\n\
             Rules: Prefer explicit numeric evidence. Title, slug or SKU cues like '60caps' or '90 tablets' count as evidence for servings. \
             dosage_text is one concise line such as '2 capsules per day'; timing_text is one concise line such as 'With meals' and never repeats dosage. \
             If the label states a range, prefer servings_min/servings_max. \
             Only report a conflict when a deterministic value exists and yours differs; otherwise put your value under fill. \
             Use short evidence quotes. Max 160 chars for benefit_snippet. \
             Scores and confidences are in [0.0, 1.0].\n\
             INPUT:{input_json}"
        )
    }

    /// Enrich one product; never fails
    pub async fn enrich(&self, raw: &RawProduct, parsed: &ParsedProduct) -> AiEnrichment {
        match self.try_enrich(raw, parsed).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                warn!(product_id = %raw.id, "AI enrichment failed: {}", e);
                AiEnrichment::empty()
            }
        }
    }

    async fn try_enrich(&self, raw: &RawProduct, parsed: &ParsedProduct) -> Result<AiEnrichment, AiError> {
        let input_hash = self.input_hash(raw, parsed);
        let cache_key = self.cache_key(&input_hash);
        let now = chrono::Utc::now().timestamp();

        if let Some(cached) = self.cache.get_fresh(&cache_key, now) {
            info!(product_id = %raw.id, cache_key = %cache_key, "AI cache hit");
            return Ok(AiEnrichment::from_value(&cached));
        }

        let input = Self::full_input(raw, parsed).to_string();
        let request = ChatRequest::json_object(&self.model, SYSTEM_PROMPT, &Self::build_prompt(&input));
        info!(product_id = %raw.id, model = %self.model, hash = %input_hash, "AI request");

        let response = self.call_with_retries(&request).await?;
        if let Some(usage) = &response.usage {
            let model = response.model.as_deref().unwrap_or(&self.model);
            self.usage.record(model, usage);
        }

        let content = response
            .choices
            .first()
            .ok_or(AiError::EmptyChoices)?
            .message
            .content
            .clone()
            .ok_or(AiError::EmptyChoices)?;
        let mut reply: Value = serde_json::from_str(&content)?;
        let object = reply
            .as_object_mut()
            .ok_or_else(|| AiError::Parse("reply is not a JSON object".to_string()))?;
        object.insert("ai_input_hash".to_string(), json!(input_hash));
        object.insert(TIMESTAMP_KEY.to_string(), json!(chrono::Utc::now().timestamp()));
        object.insert("enrichment_version".to_string(), json!(ENRICHMENT_VERSION));

        self.cache.put(&cache_key, reply.clone());
        debug!(product_id = %raw.id, cache_key = %cache_key, "Stored AI reply");
        Ok(AiEnrichment::from_value(&reply))
    }

    async fn call_with_retries(&self, request: &ChatRequest) -> Result<RawChatResponse, AiError> {
        let estimate = RateLimiter::estimate_tokens(&request.prompt_text()) + COMPLETION_TOKEN_ALLOWANCE;
        let mut attempt = 0;
        loop {
            self.limiter.acquire(estimate).await;
            match self.transport.complete(request).await {
                Err(AiError::Status { status: 429, .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    self.limiter.on_rate_limit_hit().await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::cache::MemoryCacheStore;
    use crate::ai::token_accounting::TokenAccounting;
    use crate::config::RateLimitConfig;

    struct NeverTransport;

    impl ChatTransport for NeverTransport {
        async fn complete(&self, _request: &ChatRequest) -> Result<RawChatResponse, AiError> {
            Err(AiError::Http("offline".into()))
        }
    }

    fn enricher(mode: CacheKeyMode) -> AiEnricher<NeverTransport> {
        let config = AiConfig {
            cache_key_mode: mode,
            ..AiConfig::default()
        };
        AiEnricher::new(
            NeverTransport,
            Arc::new(MemoryCacheStore::new()),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            Arc::new(TokenAccounting::new()),
            &config,
        )
    }

    #[test]
    fn test_raw_mode_hash_ignores_parsed_core() {
        let raw = RawProduct::new("p1", "Whey");
        let empty = ParsedProduct::from_raw(&raw);
        let mut filled = empty.clone();
        filled.servings = Some(30);

        let raw_mode = enricher(CacheKeyMode::Raw);
        assert_eq!(raw_mode.input_hash(&raw, &empty), raw_mode.input_hash(&raw, &filled));
        assert_eq!(raw_mode.input_hash(&raw, &empty).len(), 64);

        let parsed_mode = enricher(CacheKeyMode::RawParsed);
        assert_ne!(parsed_mode.input_hash(&raw, &empty), parsed_mode.input_hash(&raw, &filled));
    }

    #[test]
    fn test_cache_key_format() {
        let enricher = enricher(CacheKeyMode::Raw);
        assert_eq!(enricher.cache_key("abc"), "gpt-4o-mini:v1:abc");
    }

    #[test]
    fn test_prompt_lists_every_goal() {
        let prompt = AiEnricher::<NeverTransport>::build_prompt("{}");
        for goal in GOAL_CATEGORIES {
            assert!(prompt.contains(goal));
        }
        assert!(prompt.ends_with("INPUT:{}"));
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_empty() {
        let raw = RawProduct::new("p1", "Whey");
        let result = enricher(CacheKeyMode::Raw)
            .enrich(&raw, &ParsedProduct::from_raw(&raw))
            .await;
        assert!(result.is_empty());
    }
}
