//! # Normalizer Stage
//!
//! Maps the taxonomy form and flavor attributes to canonical values.
//!
//! Form lookup order:
//! 1. exact match of the attribute slug in the form table
//! 2. the same after stripping a `-et`/`-ru`/`-en` locale suffix
//! 3. substring match against the form table
//! 4. text heuristic over name, search text and categories (confidence 0.6)
//!
//! Flavor uses the same table approach with no text heuristic; a flavor
//! slug that matches nothing in the table is dropped.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::measurement_patterns::{
    CAPSULE_TOKEN, GRAMS_TOKEN, POWDER_TOKEN, STRONG_POWDER_TOKEN, TABLET_TOKEN,
};
use crate::product_model::{attr_keys, Field, FieldValue, Form, ParsedProduct, RawProduct, Source};
use crate::text_processing::strip_locale_suffix;
use tracing::trace;

pub const ATTRIBUTE_CONFIDENCE: f64 = 0.95;
pub const HEURISTIC_CONFIDENCE: f64 = 0.6;

const FORM_TABLE: &[(&str, Form)] = &[
    ("pulber", Form::Powder),
    ("kapslid", Form::Capsules),
    ("tabletid", Form::Tabs),
    ("jook", Form::Drink),
    ("geel", Form::Gel),
    ("baar", Form::Bar),
];

/// Substring fallback, checked in order
const FORM_FRAGMENTS: &[(&str, Form)] = &[
    ("kapsl", Form::Capsules),
    ("capsul", Form::Capsules),
    ("softgel", Form::Capsules),
    ("tablet", Form::Tabs),
    ("pulb", Form::Powder),
    ("powder", Form::Powder),
    ("jook", Form::Drink),
    ("drink", Form::Drink),
    ("geel", Form::Gel),
    ("gel", Form::Gel),
    ("batoon", Form::Bar),
    ("baar", Form::Bar),
    ("bar", Form::Bar),
];

/// Checked in order: specific flavors before the generic "maitse", and
/// "sokolaad" before "kola"
const FLAVOR_TABLE: &[(&str, &str)] = &[
    ("ei-mingit-maitset", "unflavored"),
    ("unflavored", "unflavored"),
    ("sokolaad", "chocolate"),
    ("chocolate", "chocolate"),
    ("vaanil", "vanilla"),
    ("vanil", "vanilla"),
    ("maasika", "strawberry"),
    ("strawberr", "strawberry"),
    ("vaarika", "raspberry"),
    ("mustika", "blueberry"),
    ("marja", "berry"),
    ("banaan", "banana"),
    ("apelsin", "orange"),
    ("sidrun", "lemon"),
    ("laim", "lime"),
    ("tsitrus", "citrus"),
    ("kirs", "cherry"),
    ("mango", "mango"),
    ("virsik", "peach"),
    ("karamell", "caramel"),
    ("kookos", "coconut"),
    ("troopili", "tropical"),
    ("kohv", "coffee"),
    ("kola", "cola"),
    ("maitse", "flavored"),
];

/// Category keywords that hint at a form
const CATEGORY_HINTS: &[(&str, Form)] = &[
    ("kapsl", Form::Capsules),
    ("capsul", Form::Capsules),
    ("tablet", Form::Tabs),
    ("pulber", Form::Powder),
    ("powder", Form::Powder),
    ("jook", Form::Drink),
    ("joog", Form::Drink),
    ("drink", Form::Drink),
    ("напит", Form::Drink),
    ("batoon", Form::Bar),
    ("bar", Form::Bar),
    ("батонч", Form::Bar),
    ("geel", Form::Gel),
    ("gel", Form::Gel),
];

/// Canonical form and flavor from taxonomy attributes
pub struct Normalizer;

impl Normalizer {
    /// Map a form attribute slug to a canonical form
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::normalizer::Normalizer;
    /// use catalog_enrichment::product_model::Form;
    ///
    /// assert_eq!(Normalizer::map_form("kapslid-et"), Some(Form::Capsules));
    /// assert_eq!(Normalizer::map_form("pehmekapslid"), Some(Form::Capsules));
    /// assert_eq!(Normalizer::map_form("muu"), None);
    /// ```
    pub fn map_form(slug: &str) -> Option<Form> {
        let slug = slug.trim().to_lowercase();
        let lookup = |s: &str| FORM_TABLE.iter().find(|(k, _)| *k == s).map(|(_, f)| *f);
        lookup(&slug)
            .or_else(|| lookup(strip_locale_suffix(&slug)))
            .or_else(|| {
                FORM_FRAGMENTS
                    .iter()
                    .find(|(fragment, _)| slug.contains(fragment))
                    .map(|(_, f)| *f)
            })
    }

    /// Map a flavor attribute slug to a canonical flavor, `None` when unknown
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::normalizer::Normalizer;
    ///
    /// assert_eq!(Normalizer::map_flavor("maasika-maitse-et").as_deref(), Some("strawberry"));
    /// assert_eq!(Normalizer::map_flavor("draakonivili"), None);
    /// ```
    pub fn map_flavor(slug: &str) -> Option<String> {
        let slug = slug.trim().to_lowercase();
        let stripped = strip_locale_suffix(&slug);
        if stripped.is_empty() {
            return None;
        }
        let mapped = FLAVOR_TABLE
            .iter()
            .find(|(k, _)| *k == stripped)
            .or_else(|| FLAVOR_TABLE.iter().find(|(k, _)| stripped.contains(k)))
            .map(|(_, v)| v.to_string());
        if mapped.is_none() {
            trace!(slug = stripped, "Unknown flavor slug");
        }
        mapped
    }

    /// Infer a form from text tokens and category hints
    ///
    /// An explicit "pulber" with no capsule/tablet signal wins; otherwise
    /// capsule and tablet tokens beat weaker powder/grams evidence.
    pub fn infer_form(raw: &RawProduct) -> Option<Form> {
        let text = format!("{} {}", raw.name_or_empty(), raw.text());
        let categories = raw
            .category_names
            .iter()
            .chain(raw.category_slugs.iter())
            .map(|c| c.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let category_hint = CATEGORY_HINTS
            .iter()
            .find(|(k, _)| categories.contains(k))
            .map(|(_, f)| *f);

        let caps = CAPSULE_TOKEN.is_match(&text) || category_hint == Some(Form::Capsules);
        let tabs = TABLET_TOKEN.is_match(&text) || category_hint == Some(Form::Tabs);
        let strong_powder = STRONG_POWDER_TOKEN.is_match(&text);
        let weak_powder = POWDER_TOKEN.is_match(&text)
            || GRAMS_TOKEN.is_match(&text)
            || category_hint == Some(Form::Powder);

        trace!(caps, tabs, strong_powder, weak_powder, hint = ?category_hint, "Form evidence");

        if strong_powder && !caps && !tabs {
            Some(Form::Powder)
        } else if caps {
            Some(Form::Capsules)
        } else if tabs {
            Some(Form::Tabs)
        } else if weak_powder {
            Some(Form::Powder)
        } else {
            category_hint.filter(|f| matches!(f, Form::Drink | Form::Bar | Form::Gel))
        }
    }
}

impl EnrichmentStage for Normalizer {
    fn name(&self) -> &'static str {
        "Normalizer"
    }

    fn apply(&self, raw: &RawProduct, _so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();

        match raw.attr(attr_keys::FORM).and_then(Self::map_form) {
            Some(form) => delta.set(Field::Form, FieldValue::Form(form), Source::Attribute, ATTRIBUTE_CONFIDENCE),
            None => {
                if let Some(form) = Self::infer_form(raw) {
                    delta.set(Field::Form, FieldValue::Form(form), Source::Heuristic, HEURISTIC_CONFIDENCE);
                }
            }
        }

        if let Some(flavor) = raw.attr(attr_keys::FLAVOR).and_then(Self::map_flavor) {
            delta.set(Field::Flavor, FieldValue::Text(flavor), Source::Attribute, ATTRIBUTE_CONFIDENCE);
        }

        Ok(StageOutput::new(delta, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(raw: &RawProduct) -> EnrichmentDelta {
        Normalizer
            .apply(raw, &ParsedProduct::from_raw(raw))
            .unwrap()
            .delta
    }

    #[test]
    fn test_form_from_attribute() {
        let raw = RawProduct::new("p1", "Creatine").with_attr(attr_keys::FORM, "pulber-et");
        let delta = run(&raw);
        assert_eq!(delta.get(Field::Form), Some(&FieldValue::Form(Form::Powder)));
        assert_eq!(delta.updates()[0].source, Some(Source::Attribute));
        assert_eq!(delta.updates()[0].confidence, Some(0.95));
    }

    #[test]
    fn test_flavor_mapping() {
        assert_eq!(Normalizer::map_flavor("ei-mingit-maitset-et").as_deref(), Some("unflavored"));
        assert_eq!(Normalizer::map_flavor("sokolaadi-maitse").as_deref(), Some("chocolate"));
        assert_eq!(Normalizer::map_flavor("maasikas").as_deref(), Some("strawberry"));
        assert_eq!(Normalizer::map_flavor("sokolaadi-kola").as_deref(), Some("chocolate"));
        assert_eq!(Normalizer::map_flavor(""), None);
    }

    #[test]
    fn test_unknown_flavor_is_dropped() {
        assert_eq!(Normalizer::map_flavor("draakonivili-et"), None);
        let raw = RawProduct::new("p1", "Whey").with_attr(attr_keys::FLAVOR, "salapärane-et");
        assert!(run(&raw).get(Field::Flavor).is_none());
    }

    #[test]
    fn test_no_flavor_without_attribute() {
        let delta = run(&RawProduct::new("p1", "Omega 3 60 softgels"));
        assert!(delta.get(Field::Flavor).is_none());
    }

    #[test]
    fn test_heuristic_softgels() {
        let raw = RawProduct::new("p1", "Omega-3").with_description("Pehmekapslid (softgels). 60 softgels.");
        let delta = run(&raw);
        assert_eq!(delta.get(Field::Form), Some(&FieldValue::Form(Form::Capsules)));
        assert_eq!(delta.updates()[0].source, Some(Source::Heuristic));
        assert_eq!(delta.updates()[0].confidence, Some(0.6));
    }

    #[test]
    fn test_heuristic_caps_beat_grams() {
        let raw = RawProduct::new("p1", "Magnesium 90 caps").with_description("Each capsule 0.5 g");
        assert_eq!(Normalizer::infer_form(&raw), Some(Form::Capsules));
    }

    #[test]
    fn test_heuristic_strong_powder() {
        let raw = RawProduct::new("p1", "Kreatiin pulber 500 g");
        assert_eq!(Normalizer::infer_form(&raw), Some(Form::Powder));
    }

    #[test]
    fn test_heuristic_tablets_and_category() {
        let raw = RawProduct::new("p1", "Zinc 100 tablets");
        assert_eq!(Normalizer::infer_form(&raw), Some(Form::Tabs));

        let raw = RawProduct::new("p2", "Energy Rush").with_category("spordijoogid", "Spordijoogid");
        assert_eq!(Normalizer::infer_form(&raw), Some(Form::Drink));

        assert_eq!(Normalizer::infer_form(&RawProduct::new("p3", "Mystery")), None);
    }
}
