//! # Title Composer Stage
//!
//! Builds `display_title` for listing UIs without touching the canonical
//! name: a leading brand token is stripped and the brand is appended as a
//! `" — Brand"` suffix instead.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, ParsedProduct, RawProduct, Source};
use crate::text_processing::sanitize_title;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

pub const CONFIDENCE: f64 = 0.7;

lazy_static! {
    static ref TRADEMARKS: Regex = Regex::new(r"[®™]").expect("Trademark pattern should be valid");
    static ref NON_ALNUM: Regex = Regex::new(r"[^A-Za-z0-9]").expect("Compact pattern should be valid");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("Space pattern should be valid");
    static ref DASH_SPACING: Regex = Regex::new(r"\s*([\-–—])\s*").expect("Dash spacing pattern should be valid");
}

/// Display title composition
pub struct TitleComposer;

impl TitleComposer {
    /// Brand spellings that may prefix a product name, most specific first
    pub fn brand_aliases(brand_name: Option<&str>, brand_slug: Option<&str>) -> Vec<String> {
        let mut aliases: Vec<String> = Vec::new();
        let mut add = |alias: String| {
            if !alias.trim().is_empty() && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        };

        if let Some(name) = brand_name {
            let cleaned = TRADEMARKS.replace_all(name, "").trim().to_string();
            if let Some(first) = cleaned.split_whitespace().next() {
                let first = first.to_string();
                let acronym: String = cleaned.chars().filter(|c| c.is_uppercase()).collect();
                let compact = NON_ALNUM.replace_all(&cleaned, "").to_string();
                add(cleaned);
                add(first);
                if acronym.chars().count() >= 2 {
                    add(acronym);
                }
                add(compact);
            }
        }

        if let Some(slug) = brand_slug.map(str::trim).filter(|s| !s.is_empty()) {
            add(slug.to_string());
            if let Some(head) = slug.split('-').next() {
                add(head.to_string());
            }
        }
        aliases
    }

    /// Strip brand aliases from the start of `name` until none matches
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::title_composer::TitleComposer;
    ///
    /// let aliases = TitleComposer::brand_aliases(Some("Optimum Nutrition"), Some("optimum-nutrition"));
    /// assert_eq!(TitleComposer::strip_leading_brand("ON - Gold Standard Whey", &aliases), "Gold Standard Whey");
    /// assert_eq!(TitleComposer::strip_leading_brand("Optimum Nutrition: Gold Standard", &aliases), "Gold Standard");
    /// ```
    pub fn strip_leading_brand(name: &str, aliases: &[String]) -> String {
        let patterns: Vec<Regex> = aliases.iter().filter_map(|alias| Self::alias_pattern(alias)).collect();
        let mut result = name.trim().to_string();

        'outer: loop {
            for pattern in &patterns {
                let stripped = pattern.replace(&result, "").trim().to_string();
                if stripped != result {
                    trace!(from = %result, to = %stripped, "Stripped brand prefix");
                    result = stripped;
                    continue 'outer;
                }
            }
            break;
        }
        result
    }

    fn alias_pattern(alias: &str) -> Option<Regex> {
        let escaped = SPACES.replace_all(&regex::escape(alias.trim()), r"\s+").to_string();
        let ends_alnum = alias.trim().chars().last().is_some_and(char::is_alphanumeric);
        let boundary = if ends_alnum { r"\b" } else { "" };
        Regex::new(&format!(r"(?i)^\s*(?:{escaped}){boundary}[\x{{00A0}}\s]*[:;\-–—|]*\s*")).ok()
    }

    fn normalize_spacing(text: &str) -> String {
        let text = text.replace('\u{00A0}', " ");
        let text = SPACES.replace_all(&text, " ");
        DASH_SPACING.replace_all(&text, "$1").trim().to_string()
    }

    /// `display_title` for a product, `None` when the stripped name is blank
    pub fn compose(name: &str, brand_name: Option<&str>, brand_slug: Option<&str>) -> Option<String> {
        let brand_name = brand_name.map(str::trim).filter(|b| !b.is_empty());
        let brand_slug = brand_slug.map(str::trim).filter(|b| !b.is_empty());

        let aliases = Self::brand_aliases(brand_name, brand_slug);
        let base = Self::normalize_spacing(&Self::strip_leading_brand(name, &aliases));
        if base.is_empty() {
            return None;
        }
        let base = sanitize_title(&base);

        let display = match brand_name.or(brand_slug) {
            Some(brand) => format!("{base} — {brand}"),
            None => base,
        };
        Some(display.trim().to_string()).filter(|d| !d.is_empty())
    }
}

impl EnrichmentStage for TitleComposer {
    fn name(&self) -> &'static str {
        "TitleComposer"
    }

    fn supports(&self, raw: &RawProduct) -> bool {
        raw.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    fn apply(&self, raw: &RawProduct, _so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();
        let composed = Self::compose(
            raw.name_or_empty(),
            raw.brand_name.as_deref(),
            raw.brand_slug.as_deref(),
        );
        if let Some(title) = composed {
            delta.set(Field::DisplayTitle, FieldValue::Text(title), Source::Compose, CONFIDENCE);
        }
        Ok(StageOutput::new(delta, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_brand_first_word() {
        assert_eq!(
            TitleComposer::compose("MST Citrulline RAW 300g Unflavored", Some("MST Nutrition®"), Some("mst-nutrition")),
            Some("Citrulline RAW 300g Unflavored — MST Nutrition®".to_string())
        );
    }

    #[test]
    fn test_keeps_variant_tokens() {
        assert_eq!(
            TitleComposer::compose(
                "Cellucor C4 Original Pre‑Workout 30 servings (Cherry Lime)",
                Some("Cellucor"),
                Some("cellucor")
            ),
            Some("C4 Original Pre‑Workout 30 servings (Cherry Lime) — Cellucor".to_string())
        );
    }

    #[test]
    fn test_no_brand_keeps_name() {
        assert_eq!(TitleComposer::compose("Whey Protein 1 kg", None, None), Some("Whey Protein 1 kg".to_string()));
    }

    #[test]
    fn test_slug_used_as_suffix_and_alias() {
        assert_eq!(
            TitleComposer::compose("Scitec - Jumbo 4,4 kg", None, Some("scitec-nutrition")),
            Some("Jumbo 4,4 kg — scitec-nutrition".to_string())
        );
    }

    #[test]
    fn test_alias_needs_word_boundary() {
        let aliases = TitleComposer::brand_aliases(Some("Now Foods"), Some("now-foods"));
        assert_eq!(TitleComposer::strip_leading_brand("Nowhere Bar", &aliases), "Nowhere Bar");
        assert_eq!(TitleComposer::strip_leading_brand("NOW Foods | Omega-3", &aliases), "Omega-3");
    }

    #[test]
    fn test_dash_spacing_normalized() {
        assert_eq!(
            TitleComposer::compose("Gold  Whey  –  Double\u{00A0}Chocolate", None, None),
            Some("Gold Whey–Double Chocolate".to_string())
        );
    }

    #[test]
    fn test_brand_only_name_yields_no_delta() {
        let raw = RawProduct::new("p1", "Cellucor").with_brand("cellucor", "Cellucor");
        let out = TitleComposer.apply(&raw, &ParsedProduct::from_raw(&raw)).unwrap();
        assert!(out.delta.is_empty());
    }

    #[test]
    fn test_delta_source_is_compose() {
        let raw = RawProduct::new("p1", "Whey").with_brand("acme", "Acme");
        let out = TitleComposer.apply(&raw, &ParsedProduct::from_raw(&raw)).unwrap();
        assert_eq!(out.delta.updates()[0].source, Some(Source::Compose));
        assert_eq!(out.delta.get(Field::DisplayTitle), Some(&FieldValue::Text("Whey — Acme".into())));
    }
}
