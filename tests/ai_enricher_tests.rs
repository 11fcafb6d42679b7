#[cfg(test)]
mod tests {
    use catalog_enrichment::ai::cache::{CacheStore, FileCacheStore, MemoryCacheStore};
    use catalog_enrichment::ai::model::RawChatResponse;
    use catalog_enrichment::ai::{AiEnricher, ChatRequest, ChatTransport, RateLimiter, TokenAccounting};
    use catalog_enrichment::batch::BatchEnricher;
    use catalog_enrichment::config::{AiConfig, RateLimitConfig, CACHE_TTL_SECS};
    use catalog_enrichment::enrichment::{EnrichmentPipeline, WarnCode};
    use catalog_enrichment::enrichment_errors::AiError;
    use catalog_enrichment::product_model::{ParsedProduct, RawProduct};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    enum Step {
        RateLimited,
        Reply(String),
    }

    /// Scripted transport; once the script runs out it keeps returning `fallback`
    struct ScriptedTransport {
        calls: Arc<AtomicUsize>,
        script: Mutex<VecDeque<Step>>,
        fallback: String,
    }

    impl ScriptedTransport {
        fn new(calls: Arc<AtomicUsize>, fallback: &str) -> Self {
            Self {
                calls,
                script: Mutex::new(VecDeque::new()),
                fallback: fallback.to_string(),
            }
        }

        fn then(self, step: Step) -> Self {
            self.script.lock().unwrap().push_back(step);
            self
        }
    }

    impl ChatTransport for ScriptedTransport {
        async fn complete(&self, _request: &ChatRequest) -> Result<RawChatResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();
            let content = match step {
                Some(Step::RateLimited) => {
                    return Err(AiError::Status {
                        status: 429,
                        body: "slow down".to_string(),
                    })
                }
                Some(Step::Reply(content)) => content,
                None => self.fallback.clone(),
            };
            Ok(serde_json::from_value(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"message": {"role": "assistant", "content": content}}],
                "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
            }))
            .unwrap())
        }
    }

    fn reply() -> String {
        json!({
            "fill": {"flavor": "vanilla"},
            "generate": {
                "benefit_snippet": "Fast-digesting whey for recovery.",
                "faq": [{"q": "When to take?", "a": "After training."}],
                "synonyms_multi": {"en": ["whey"], "et": ["vadak"]},
                "dosage_text": "1 scoop per day",
                "timing_text": "After training"
            },
            "safety_flags": [],
            "conflicts": [{"field": "servings", "det_value": 30, "ai_value": 33, "evidence": "33 servings"}],
            "goal_scores": {"recovery": {"score": 0.9, "confidence": 0.8}, "unknown_goal": {"score": 1.0, "confidence": 1.0}}
        })
        .to_string()
    }

    fn enricher(
        transport: ScriptedTransport,
        cache: Arc<dyn CacheStore>,
        accounting: Arc<TokenAccounting>,
    ) -> AiEnricher<ScriptedTransport> {
        AiEnricher::new(
            transport,
            cache,
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            accounting,
            &AiConfig::default(),
        )
    }

    fn product() -> (RawProduct, ParsedProduct) {
        let raw = RawProduct::new("wc_1", "Whey Protein 900 g").with_description("30 servings");
        let parsed = EnrichmentPipeline::new().run(&raw).0;
        (raw, parsed)
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_second_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(MemoryCacheStore::new());
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), cache.clone(), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let first = ai.enrich(&raw, &parsed).await;
        let second = ai.enrich(&raw, &parsed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first.benefit_snippet.as_deref(), Some("Fast-digesting whey for recovery."));
        assert_eq!(first.dosage_text.as_deref(), Some("1 scoop per day"));
        assert_eq!(first.enrichment_version, Some(1));
        assert_eq!(first.ai_input_hash.as_ref().map(String::len), Some(64));
        assert!(first.goal_scores.contains_key("recovery"));
        assert!(!first.goal_scores.contains_key("unknown_goal"));
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(MemoryCacheStore::new());
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), cache.clone(), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let key = ai.cache_key(&ai.input_hash(&raw, &parsed));
        let stale_ts = chrono::Utc::now().timestamp() - CACHE_TTL_SECS - 60;
        cache.put(&key, json!({"generate": {"benefit_snippet": "old"}, "ai_enrichment_ts": stale_ts}));

        let result = ai.enrich(&raw, &parsed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.benefit_snippet.as_deref(), Some("Fast-digesting whey for recovery."));
    }

    #[tokio::test]
    async fn test_fresh_entry_without_timestamp_is_served() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(MemoryCacheStore::new());
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), cache.clone(), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let key = ai.cache_key(&ai.input_hash(&raw, &parsed));
        cache.put(&key, json!({"generate": {"benefit_snippet": "cached"}}));

        let result = ai.enrich(&raw, &parsed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.benefit_snippet.as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = ScriptedTransport::new(calls.clone(), &reply()).then(Step::RateLimited);
        let ai = enricher(transport, Arc::new(MemoryCacheStore::new()), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let result = ai.enrich(&raw, &parsed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!result.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = ScriptedTransport::new(calls.clone(), &reply())
            .then(Step::RateLimited)
            .then(Step::RateLimited)
            .then(Step::RateLimited);
        let ai = enricher(transport, Arc::new(MemoryCacheStore::new()), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let result = ai.enrich(&raw, &parsed).await;
        // One attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_degrades_to_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(MemoryCacheStore::new());
        let ai = enricher(ScriptedTransport::new(calls.clone(), "not json at all"), cache.clone(), Arc::new(TokenAccounting::new()));
        let (raw, parsed) = product();

        let result = ai.enrich(&raw, &parsed).await;
        assert!(result.is_empty());
        assert!(cache.is_empty());

        let array = ScriptedTransport::new(calls.clone(), "[1, 2, 3]");
        let ai = enricher(array, cache.clone(), Arc::new(TokenAccounting::new()));
        assert!(ai.enrich(&raw, &parsed).await.is_empty());
    }

    #[tokio::test]
    async fn test_usage_is_recorded_per_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let accounting = Arc::new(TokenAccounting::new());
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), Arc::new(MemoryCacheStore::new()), accounting.clone());
        let (raw, parsed) = product();
        let other = RawProduct::new("wc_2", "Creatine 300 g");

        ai.enrich(&raw, &parsed).await;
        ai.enrich(&other, &ParsedProduct::from_raw(&other)).await;

        let snapshot = accounting.snapshot();
        let usage = snapshot.get("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(usage.total_tokens, 400);
        assert_eq!(accounting.total().prompt_tokens, 240);
    }

    #[tokio::test]
    async fn test_file_cache_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let calls = Arc::new(AtomicUsize::new(0));
        let (raw, parsed) = product();

        {
            let cache = Arc::new(FileCacheStore::open(&path));
            let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), cache, Arc::new(TokenAccounting::new()));
            ai.enrich(&raw, &parsed).await;
        }
        assert!(path.exists());

        let cache = Arc::new(FileCacheStore::open(&path));
        assert_eq!(cache.len(), 1);
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), cache.clone(), Arc::new(TokenAccounting::new()));
        let result = ai.enrich(&raw, &parsed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!result.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_cache_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let cache = FileCacheStore::open(&path);
        assert!(cache.is_empty());

        cache.put("k", json!({"a": 1}));
        let reopened = FileCacheStore::open(&path);
        assert_eq!(reopened.get("k"), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_batch_merges_ai_conflicts_as_warnings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ai = enricher(ScriptedTransport::new(calls.clone(), &reply()), Arc::new(MemoryCacheStore::new()), Arc::new(TokenAccounting::new()));
        let batch = BatchEnricher::new(EnrichmentPipeline::new(), Some(ai), 2);
        let (raw, _) = product();

        let results = batch.run(vec![raw]).await;
        let result = &results[0];

        assert!(result.warnings.iter().any(|w| w.is(WarnCode::FieldConflict, "servings")));
        assert!(result.product.warnings.iter().any(|w| w.starts_with("FIELD_CONFLICT")));
        assert_eq!(result.product.conflicts.len(), 1);
        assert_eq!(result.product.timing_text.as_deref(), Some("After training"));
        // Deterministic fields are never overwritten by the model
        assert_eq!(result.product.parsed.servings, Some(30));
        assert_eq!(result.product.parsed.flavor, None);
        assert_eq!(
            result.product.ai_fill.as_ref().and_then(|f| f.flavor.as_deref()),
            Some("vanilla")
        );

        let serialized: Value = serde_json::to_value(&result.product).unwrap();
        assert_eq!(serialized["servings"], json!(30));
        assert_eq!(serialized["faq"][0]["q"], json!("When to take?"));
    }

    #[tokio::test]
    async fn test_rate_limiter_under_concurrent_acquire() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            rpm: 1000,
            tpm: 1_000_000,
            min_sleep_ms: 1,
        }));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire(100).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        // A minute boundary may fall between acquisitions
        let (requests, tokens) = limiter.used();
        assert!((1..=16).contains(&requests));
        assert_eq!(tokens, u64::from(requests) * 100);
    }

    #[test]
    fn test_rate_limiter_budget_is_shared_across_threads() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            rpm: 10,
            tpm: 1_000_000,
            min_sleep_ms: 1,
        }));
        let granted = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let granted = Arc::clone(&granted);
                std::thread::spawn(move || {
                    if limiter.try_acquire_at(5_000, 100).is_ok() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(granted.load(Ordering::SeqCst), 10);
        assert_eq!(limiter.used(), (10, 1000));
    }

    #[test]
    fn test_rate_limiter_window_is_exhausted_then_resets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            rpm: 2,
            tpm: 1_000,
            min_sleep_ms: 1,
        });
        assert!(limiter.try_acquire_at(1_000, 10).is_ok());
        assert!(limiter.try_acquire_at(2_000, 10).is_ok());
        let wait = limiter.try_acquire_at(3_000, 10).unwrap_err();
        assert_eq!(wait.as_millis(), 57_000);
        assert!(limiter.try_acquire_at(60_000, 10).is_ok());
    }
}
