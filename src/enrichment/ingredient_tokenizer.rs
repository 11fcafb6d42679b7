//! # Ingredient Tokenizer Stage
//!
//! Conservative extraction of an explicit ingredient list. Only a section that
//! starts with an `Ingredients:` style header is considered; free prose is never
//! mined for ingredient names.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, ParsedProduct, RawProduct, Source};
use crate::text_processing::{collapse_whitespace, html_to_lines};
use lazy_static::lazy_static;
use regex::Regex;

pub const CONFIDENCE: f64 = 0.9;
const MAX_TOKEN_WORDS: usize = 3;
const MIN_HEAD_LETTERS: usize = 3;

const STOPWORDS: &[&str] = &[
    "and", "or", "with", "from", "of", "the", "a", "an", "in", "to", "sisaldab", "koos", "ja", "või",
    "из", "и", "с", "для", "в",
];

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"(?i)(?:ingredients|koostisosad|koostis|состав)\s*:")
        .expect("Ingredient header pattern should be valid");
    static ref SENTENCE_END: Regex = Regex::new(r"\.(?:\s|$)").expect("Sentence end pattern should be valid");
    static ref PARENTHETICAL: Regex = Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("Parenthetical pattern should be valid");
    static ref QUANTITY: Regex = Regex::new(r"(?i)\d+(?:[.,]\d+)?\s*(?:(?:mcg|µg|mg|kg|g|ml|iu)\b|%)?")
        .expect("Quantity pattern should be valid");
    static ref NON_LETTER: Regex = Regex::new(r"[^\p{L}\- ]").expect("Letter pattern should be valid");
}

/// Ingredient list scraping
pub struct IngredientTokenizer;

impl IngredientTokenizer {
    /// Tokens from the ingredient section, or `None` when there is no header
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::ingredient_tokenizer::IngredientTokenizer;
    ///
    /// let tokens = IngredientTokenizer::extract("<p>Ingredients: Whey protein (milk), cocoa, sweetener (sucralose).</p>");
    /// assert_eq!(tokens, Some(vec!["whey protein".to_string(), "cocoa".to_string(), "sweetener".to_string()]));
    /// ```
    pub fn extract(description: &str) -> Option<Vec<String>> {
        let lines = html_to_lines(description).to_lowercase();
        let header = HEADER.find(&lines)?;
        let after = &lines[header.end()..];

        let mut segment = after.split('\n').next().unwrap_or("");
        if let Some(end) = SENTENCE_END.find(segment) {
            segment = &segment[..end.start()];
        }
        let segment = PARENTHETICAL.replace_all(segment, " ");

        let mut tokens: Vec<String> = Vec::new();
        for part in segment.split([',', ';']) {
            let without_amounts = QUANTITY.replace_all(part, " ");
            let cleaned = collapse_whitespace(&NON_LETTER.replace_all(&without_amounts, " "));
            let token = cleaned.trim_matches('-').trim().to_string();
            if token.is_empty() {
                continue;
            }
            let words: Vec<&str> = token.split(' ').collect();
            if words.len() > MAX_TOKEN_WORDS {
                continue;
            }
            let head = words[0];
            if STOPWORDS.contains(&head) || head.chars().filter(|c| c.is_alphabetic()).count() < MIN_HEAD_LETTERS {
                continue;
            }
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        Some(tokens)
    }
}

impl EnrichmentStage for IngredientTokenizer {
    fn name(&self) -> &'static str {
        "IngredientTokenizer"
    }

    fn supports(&self, raw: &RawProduct) -> bool {
        raw.description.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    fn apply(&self, raw: &RawProduct, _so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();
        let mut warnings = Vec::new();

        match raw.description.as_deref().and_then(Self::extract) {
            Some(tokens) if !tokens.is_empty() => {
                delta.set(Field::IngredientsKey, FieldValue::Tags(tokens), Source::Regex, CONFIDENCE);
            }
            Some(_) => warnings.push(Warn::ingredient_parse_fail(&raw.id)),
            None => {}
        }

        Ok(StageOutput::new(delta, warnings))
    }
}
