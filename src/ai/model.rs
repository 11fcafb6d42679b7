//! # AI Augmentation Model Module
//!
//! Value types for the AI lane: the parsed model reply (`AiEnrichment`) and the
//! chat-completion envelope (`RawChatResponse`, `TokenUsage`).
//!
//! The model reply is parsed section by section, so a malformed `faq` does not
//! discard an otherwise usable `benefit_snippet`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Goal categories the model scores a product against
pub const GOAL_CATEGORIES: &[&str] = &[
    "preworkout",
    "strength",
    "endurance",
    "lean_muscle",
    "recovery",
    "weight_loss",
    "wellness",
];

/// Nulls the model proposes to fill; kept apart from deterministic fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFill {
    pub form: Option<String>,
    pub flavor: Option<String>,
    pub servings: Option<f64>,
    pub servings_min: Option<f64>,
    pub servings_max: Option<f64>,
    pub serving_size_g: Option<f64>,
    pub ingredients_key: Option<Vec<String>>,
    pub goal_tags: Option<Vec<String>>,
    pub diet_tags: Option<Vec<String>>,
}

impl AiFill {
    fn is_empty(&self) -> bool {
        *self == AiFill::default()
    }
}

/// One question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub q: String,
    pub a: String,
}

/// A safety concern reported by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyFlag {
    pub flag: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// A disagreement between a deterministic value and the model's reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConflict {
    pub field: String,
    #[serde(default)]
    pub det_value: Value,
    #[serde(default)]
    pub ai_value: Value,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// Render a JSON scalar without quotes, anything else as compact JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Product fit for one goal category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalScore {
    pub score: f64,
    #[serde(default)]
    pub confidence: f64,
}

/// Parsed AI reply plus cache metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiEnrichment {
    pub fill: Option<AiFill>,
    pub benefit_snippet: Option<String>,
    pub faq: Vec<FaqEntry>,
    pub synonyms_multi: BTreeMap<String, Vec<String>>,
    pub dosage_text: Option<String>,
    pub timing_text: Option<String>,
    pub safety_flags: Vec<SafetyFlag>,
    pub conflicts: Vec<AiConflict>,
    pub goal_scores: BTreeMap<String, GoalScore>,
    pub ai_input_hash: Option<String>,
    pub ai_enrichment_ts: Option<i64>,
    pub enrichment_version: Option<u32>,
}

impl AiEnrichment {
    /// The degraded result returned on any AI-lane failure
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse the cached/returned reply object
    ///
    /// Top-level sections are `fill`, `generate`, `safety_flags`, `conflicts`
    /// and `goal_scores`; each is decoded independently and a section that
    /// does not match its shape is dropped.
    pub fn from_value(value: &Value) -> Self {
        let generate = value.get("generate").cloned().unwrap_or(Value::Null);
        let fill = section::<AiFill>(value.get("fill")).filter(|f| !f.is_empty());

        let goal_scores = section::<BTreeMap<String, GoalScore>>(value.get("goal_scores"))
            .unwrap_or_default()
            .into_iter()
            .filter(|(goal, _)| GOAL_CATEGORIES.contains(&goal.as_str()))
            .map(|(goal, s)| {
                let clamped = GoalScore {
                    score: s.score.clamp(0.0, 1.0),
                    confidence: s.confidence.clamp(0.0, 1.0),
                };
                (goal, clamped)
            })
            .collect();

        Self {
            fill,
            benefit_snippet: non_blank(generate.get("benefit_snippet")),
            faq: section(generate.get("faq")).unwrap_or_default(),
            synonyms_multi: section(generate.get("synonyms_multi")).unwrap_or_default(),
            dosage_text: non_blank(generate.get("dosage_text")),
            timing_text: non_blank(generate.get("timing_text")),
            safety_flags: section(value.get("safety_flags")).unwrap_or_default(),
            conflicts: section(value.get("conflicts")).unwrap_or_default(),
            goal_scores,
            ai_input_hash: value
                .get("ai_input_hash")
                .and_then(Value::as_str)
                .map(str::to_string),
            ai_enrichment_ts: value.get("ai_enrichment_ts").and_then(Value::as_i64),
            enrichment_version: value
                .get("enrichment_version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
        }
    }
}

fn section<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Token counts reported by the chat endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Chat-completion response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RawChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}
