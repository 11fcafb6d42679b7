//! # Variation Grouper Stage
//!
//! Builds a grouping key shared by the flavor/size variants of one product:
//! `slugify(brand_slug + "-" + base_title(name))`.
//!
//! `variant_group_id` currently mirrors `parent_id`; there is no separate
//! variant axis.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{Field, FieldValue, ParsedProduct, RawProduct, Source};
use crate::text_processing::slugify;
use lazy_static::lazy_static;
use regex::Regex;

pub const CONFIDENCE: f64 = 0.8;

lazy_static! {
    static ref BRACKETED_TAIL: Regex = Regex::new(r"\s*[\(（【\[][^\)）】\]]{1,40}[\)）】\]]\s*$")
        .expect("Bracketed tail pattern should be valid");
    static ref FLAVOR_WORDS: Regex = Regex::new(
        r"\b(?:unflavored|flavored|vanilla|vanill|chocolate|sokolaad|šokolaad|cocoa|strawberry|maasikas|raspberry|vaarikas|berry|blueberry|mustikas|metsamarja|banana|banaan|banaanijogurt|jogurt|citrus|orange|apelsin|lemon|sidrun|lime|laim|cola|kola|cherry|kirss|apple|õun|oun|mango|peach|virsik|pear|pirn|coffee|kohv|mocha|caramel|karamell|coconut|kookos|tropical|troopiline)\b"
    ).expect("Flavor word pattern should be valid");
    static ref FLAVOR_SUFFIX: Regex = Regex::new(r"\s*-\s*maitse.*$").expect("Flavor suffix pattern should be valid");
    static ref SIZE: Regex = Regex::new(r"\b\d{1,4}(?:[.,]\d+)?\s*(?:g|gramm|kg|ml|l)\b")
        .expect("Size pattern should be valid");
    static ref COUNT: Regex = Regex::new(
        r"\b\d{1,3}\s*(?:servings?|portsjonid?|portsjonit|capsules?|kapslid|kapslit|softgels?|tablets?|tabletid|tabs|caps)\b"
    ).expect("Count pattern should be valid");
    static ref FORM_SUFFIX: Regex = Regex::new(
        r"\s*(?:powder|pulber|capsules?|kapslid|tablets?|tabletid|tabs|drink|jook|gel|geel|bar|batoon)\s*$"
    ).expect("Form suffix pattern should be valid");
    static ref SPACES: Regex = Regex::new(r"[\s\x{00A0}]+").expect("Space pattern should be valid");
    static ref TRAILING_DASHES: Regex = Regex::new(r"\s*[-–—]+\s*$").expect("Dash pattern should be valid");
}

/// Parent/variant grouping keys
pub struct VariationGrouper;

impl VariationGrouper {
    /// Lowercased name without flavor words, sizes, counts and a trailing form noun
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::variation_grouper::VariationGrouper;
    ///
    /// assert_eq!(VariationGrouper::base_title("Whey Gold 2,27 kg Chocolate"), "whey gold");
    /// assert_eq!(VariationGrouper::base_title("Creatine Powder 500g (Unflavored)"), "creatine");
    /// ```
    pub fn base_title(name: &str) -> String {
        let mut title = name.to_lowercase();
        for pattern in [&*BRACKETED_TAIL, &*FLAVOR_WORDS, &*FLAVOR_SUFFIX, &*SIZE, &*COUNT] {
            title = pattern.replace_all(&title, "").to_string();
        }
        title = SPACES.replace_all(&title, " ").trim().to_string();
        title = FORM_SUFFIX.replace(&title, "").to_string();
        title = SPACES.replace_all(&title, " ").to_string();
        title = TRAILING_DASHES.replace(&title, "").to_string();
        title.trim().to_string()
    }

    pub fn parent_id(brand_slug: &str, name: &str) -> Option<String> {
        let base = Self::base_title(name);
        if slugify(&base).is_empty() {
            return None;
        }
        Some(slugify(&format!("{brand_slug}-{base}"))).filter(|id| !id.is_empty())
    }
}

impl EnrichmentStage for VariationGrouper {
    fn name(&self) -> &'static str {
        "VariationGrouper"
    }

    fn apply(&self, raw: &RawProduct, _so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let name = raw.name.as_deref().filter(|n| !n.trim().is_empty());
        let brand = raw.brand_slug.as_deref().filter(|b| !b.trim().is_empty());
        let (Some(name), Some(brand)) = (name, brand) else {
            return Ok(StageOutput::empty());
        };

        let mut delta = EnrichmentDelta::new();
        match Self::parent_id(brand, name) {
            Some(id) => {
                delta.set(Field::ParentId, FieldValue::Text(id.clone()), Source::Heuristic, CONFIDENCE);
                delta.set(Field::VariantGroupId, FieldValue::Text(id), Source::Heuristic, CONFIDENCE);
                Ok(StageOutput::new(delta, Vec::new()))
            }
            None => Ok(StageOutput::new(
                delta,
                vec![Warn::bad_variation_group(&raw.id).with_evidence(name)],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::warn::WarnCode;

    #[test]
    fn test_variants_share_parent() {
        let a = VariationGrouper::parent_id("mst-nutrition", "MST Citrulline RAW 300g Unflavored");
        let b = VariationGrouper::parent_id("mst-nutrition", "MST Citrulline RAW 500g Lemon");
        assert_eq!(a.as_deref(), Some("mst-nutrition-mst-citrulline-raw"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_counts_and_maitse_suffix() {
        assert_eq!(VariationGrouper::base_title("Omega-3 120 softgels"), "omega-3");
        assert_eq!(VariationGrouper::base_title("Isotonic jook - maitse apelsin"), "isotonic");
        assert_eq!(VariationGrouper::base_title("C4 Original 30 servings"), "c4 original");
    }

    #[test]
    fn test_missing_brand_no_delta() {
        let raw = RawProduct::new("p1", "Whey 1kg");
        let out = VariationGrouper.apply(&raw, &ParsedProduct::from_raw(&raw)).unwrap();
        assert!(out.delta.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_empty_base_warns() {
        let raw = RawProduct::new("p1", "Vanilla 1kg").with_brand("acme", "Acme");
        let out = VariationGrouper.apply(&raw, &ParsedProduct::from_raw(&raw)).unwrap();
        assert!(out.delta.is_empty());
        assert_eq!(out.warnings[0].code, WarnCode::BadVariationGroup);
    }

    #[test]
    fn test_variant_group_mirrors_parent() {
        let raw = RawProduct::new("p1", "Gold Whey 2kg Cocoa").with_brand("optimum", "Optimum");
        let out = VariationGrouper.apply(&raw, &ParsedProduct::from_raw(&raw)).unwrap();
        assert_eq!(out.delta.get(Field::ParentId), out.delta.get(Field::VariantGroupId));
        assert_eq!(
            out.delta.get(Field::ParentId),
            Some(&FieldValue::Text("optimum-gold-whey".into()))
        );
    }
}
