//! Per-model token usage totals for one batch run.

use crate::ai::model::TokenUsage;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Receives token usage reported by the chat endpoint
pub trait UsageSink: Send + Sync {
    fn record(&self, model: &str, usage: &TokenUsage);
}

/// In-process usage aggregation, keyed by model name
#[derive(Debug, Default)]
pub struct TokenAccounting {
    usage: Mutex<BTreeMap<String, TokenUsage>>,
}

impl TokenAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, TokenUsage> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sum over every model
    pub fn total(&self) -> TokenUsage {
        self.snapshot().values().fold(TokenUsage::default(), |acc, u| TokenUsage {
            prompt_tokens: acc.prompt_tokens + u.prompt_tokens,
            completion_tokens: acc.completion_tokens + u.completion_tokens,
            total_tokens: acc.total_tokens + u.total_tokens,
        })
    }
}

impl UsageSink for TokenAccounting {
    fn record(&self, model: &str, usage: &TokenUsage) {
        let model = if model.trim().is_empty() { "unknown" } else { model.trim() };
        let mut totals = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = totals.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u64, completion: u64) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_aggregates_per_model() {
        let accounting = TokenAccounting::new();
        accounting.record("gpt-4o-mini", &usage(100, 20));
        accounting.record("gpt-4o-mini", &usage(50, 10));
        accounting.record("", &usage(1, 1));

        let snapshot = accounting.snapshot();
        assert_eq!(snapshot["gpt-4o-mini"], usage(150, 30));
        assert_eq!(snapshot["unknown"].total_tokens, 2);
        assert_eq!(accounting.total().total_tokens, 182);

        accounting.reset();
        assert!(accounting.snapshot().is_empty());
    }
}
