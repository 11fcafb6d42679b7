//! # Unit Parser Stage
//!
//! Extracts quantities from attributes and free text:
//!
//! - `net_weight_g`: attribute, then regex (name before description), then
//!   `serving_size_g × servings`, then `unit_count × unit_mass_g`
//! - `servings`: attribute, then an explicit "N servings" reading, else a
//!   "A-B servings" range into `servings_min`/`servings_max` (daily dosing
//!   and ranges below a typical pack size excluded), else
//!   `unit_count ÷ units_per_serving` when per-serving unit evidence exists
//! - `serving_size_g`: forward, reverse and parenthetical readings; the
//!   largest plausible candidate wins, and milligram doses are ignored for
//!   capsules and tabs
//! - `unit_count`, `units_per_serving`, `unit_mass_g`: capsule/tablet vocabulary
//!
//! Two sanity passes then repair values that contradict each other:
//! a net weight that looks like a single serving is recomputed from
//! `serving_size_g × servings`, and a servings count far from
//! `net_weight_g ÷ serving_size_g` is replaced by the derived count. Both are
//! retagged `corrected`; warnings are only raised for extreme corrections on
//! products with unusually small counts.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::measurement_patterns::{
    capture_count, capture_measurement, capture_number, find_net_weights, find_unit_counts,
    window_after, CAPSULE_TOKEN, PORTION_WORD, SERVINGS_EXPLICIT, SERVINGS_RANGE,
    SERVING_SIZE_FORWARD, SERVING_SIZE_PAREN, SERVING_SIZE_REVERSE, TABLET_TOKEN, UNITS_PER_SERVING_LEAD,
    UNITS_PER_SERVING_TRAIL, UNIT_MASS_PAREN, UNIT_MASS_PER_LEAD, UNIT_MASS_PER_TRAIL,
};
use crate::measurement_types::{MeasureUnit, MeasurementMatch};
use crate::product_model::{attr_keys, Field, FieldValue, Form, ParsedProduct, RawProduct, Source};
use crate::text_processing::{parse_count, round_to};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

pub const ATTRIBUTE_CONFIDENCE: f64 = 0.95;
pub const REGEX_CONFIDENCE: f64 = 0.8;
pub const COUNT_EVIDENCE_CONFIDENCE: f64 = 0.75;
pub const DERIVED_CONFIDENCE: f64 = 0.7;
pub const CORRECTED_CONFIDENCE: f64 = 0.7;
pub const UNIT_EVIDENCE_CONFIDENCE: f64 = 0.55;

/// Largest plausible serving size in grams
const MAX_SERVING_SIZE_G: f64 = 500.0;
/// Plausible pack counts for regex unit counts
const UNIT_COUNT_RANGE: (u32, u32) = (10, 1000);
const UNITS_PER_SERVING_RANGE: (u32, u32) = (1, 10);
const UNIT_MASS_RANGE_G: (f64, f64) = (0.05, 5.0);
const MAX_SERVINGS: u32 = 1000;
/// Servings counts outside this range trigger a consistency check
const TYPICAL_SERVINGS: (u32, u32) = (8, 180);
/// Corrections at or beyond this ratio are considered extreme
const EXTREME_RATIO: f64 = 8.0;
/// Counts at or above this are realistic packaging counts
const REALISTIC_COUNT: u32 = 10;
/// Characters after "portsjon" searched for a parenthetical serving size
const PORTION_WINDOW_CHARS: usize = 120;

lazy_static! {
    static ref WEIGHT_ATTRIBUTE: Regex = Regex::new(r"(?i)^\s*(\d+(?:[.,]\d+)?)\s*-?\s*(kg|g|ml|l)?\b")
        .expect("Weight attribute pattern should be valid");
    static ref DAILY_TAIL: Regex = Regex::new(r"(?i)^\s*(?:per\s+day|a\s+day|daily|päevas|ööpäevas|в\s+день)")
        .expect("Daily dosing pattern should be valid");
}

/// A value with the source and confidence it would be written with
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading<T> {
    value: T,
    source: Source,
    confidence: f64,
}

impl<T> Reading<T> {
    fn new(value: T, source: Source, confidence: f64) -> Self {
        Self {
            value,
            source,
            confidence,
        }
    }
}

/// Servings readings from free text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServingsText {
    pub exact: Option<u32>,
    pub range: Option<(u32, u32)>,
}

/// Weight, serving and unit-count extraction
pub struct UnitParser;

impl UnitParser {
    /// Parse a weight attribute ("300", "2,5 kg", "1-kg"); grams are assumed without a unit
    pub fn parse_weight_attribute(value: &str) -> Option<f64> {
        let caps = WEIGHT_ATTRIBUTE.captures(value)?;
        let number = capture_number(&caps, 1)?;
        let unit = caps
            .get(2)
            .and_then(|u| MeasureUnit::parse(u.as_str()))
            .unwrap_or(MeasureUnit::Gram);
        Some(unit.to_grams(number)).filter(|g| *g > 0.0)
    }

    /// Net weight from name first, then the full text
    pub fn parse_net_weight_text(name: &str, text: &str) -> Option<f64> {
        let first = |s: &str| find_net_weights(s).first().map(MeasurementMatch::grams);
        first(name).or_else(|| first(text))
    }

    /// Largest plausible serving size in grams
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::unit_parser::UnitParser;
    ///
    /// assert_eq!(UnitParser::parse_serving_size("5 g per serving"), Some(5.0));
    /// assert_eq!(UnitParser::parse_serving_size("Serving size: 2200 mg"), Some(2.2));
    /// assert_eq!(UnitParser::parse_serving_size("500 mg per serving"), None);
    /// ```
    pub fn parse_serving_size(text: &str) -> Option<f64> {
        Self::parse_serving_size_for(text, false)
    }

    /// Serving size for a product of known kind
    ///
    /// For capsules and tabs a milligram figure is an active-ingredient dose,
    /// not the weight of a serving, so only gram readings count.
    pub fn parse_serving_size_for(text: &str, count_based: bool) -> Option<f64> {
        let mut candidates: Vec<MeasurementMatch> = Vec::new();
        candidates.extend(
            SERVING_SIZE_FORWARD
                .captures_iter(text)
                .filter_map(|c| capture_measurement(&c, 1, 2)),
        );
        candidates.extend(
            SERVING_SIZE_REVERSE
                .captures_iter(text)
                .filter_map(|c| capture_measurement(&c, 1, 2)),
        );
        for portion in PORTION_WORD.find_iter(text) {
            let window = window_after(text, portion.start(), PORTION_WINDOW_CHARS);
            candidates.extend(
                SERVING_SIZE_PAREN
                    .captures_iter(window)
                    .filter_map(|c| capture_measurement(&c, 1, 2)),
            );
        }

        candidates
            .iter()
            .filter(|m| m.unit != MeasureUnit::Milligram || (!count_based && m.grams() >= 1.0))
            .map(MeasurementMatch::grams)
            .filter(|g| *g > 0.0 && *g <= MAX_SERVING_SIZE_G)
            .inspect(|g| trace!("Serving size candidate {}", g))
            .fold(None, |best: Option<f64>, g| Some(best.map_or(g, |b| b.max(g))))
    }

    /// Explicit servings count and servings range
    ///
    /// Daily dosing ("2-3 servings per day") is not a pack count, and a range
    /// starting below a typical pack size is read as dosing too.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::enrichment::unit_parser::UnitParser;
    ///
    /// assert_eq!(UnitParser::parse_servings_text("30-60 servings").range, Some((30, 60)));
    /// assert_eq!(UnitParser::parse_servings_text("Use 2-3 servings per day.").range, None);
    /// assert_eq!(UnitParser::parse_servings_text("Take 2 servings daily").exact, None);
    /// ```
    pub fn parse_servings_text(text: &str) -> ServingsText {
        let is_daily = |end: usize| DAILY_TAIL.is_match(&text[end..]);
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut range = None;
        for caps in SERVINGS_RANGE.captures_iter(text) {
            let (Some(a), Some(b), Some(whole)) = (capture_count(&caps, 1), capture_count(&caps, 2), caps.get(0)) else {
                continue;
            };
            spans.push((whole.start(), whole.end()));
            let (lo, hi) = (a.min(b), a.max(b));
            if is_daily(whole.end()) || lo < TYPICAL_SERVINGS.0 {
                trace!(lo, hi, "Servings range reads as dosing");
                continue;
            }
            if range.is_none() && hi <= MAX_SERVINGS && lo < hi {
                range = Some((lo, hi));
            }
        }

        let exact = SERVINGS_EXPLICIT
            .captures_iter(text)
            .filter(|caps| {
                caps.get(0).is_some_and(|m| {
                    !spans.iter().any(|(s, e)| m.start() >= *s && m.start() < *e) && !is_daily(m.end())
                })
            })
            .filter_map(|caps| capture_count(&caps, 1))
            .find(|n| *n > 0 && *n <= MAX_SERVINGS);

        ServingsText { exact, range }
    }

    /// Pack count from capsule/tablet vocabulary; the largest plausible count wins
    pub fn parse_unit_count_text(text: &str) -> Option<u32> {
        find_unit_counts(text)
            .into_iter()
            .map(|c| c.count)
            .filter(|n| (UNIT_COUNT_RANGE.0..=UNIT_COUNT_RANGE.1).contains(n))
            .max()
    }

    /// Units taken per serving ("Take 4 capsules daily", "2 tablets per day")
    pub fn parse_units_per_serving(text: &str) -> Option<u32> {
        UNITS_PER_SERVING_LEAD
            .captures_iter(text)
            .chain(UNITS_PER_SERVING_TRAIL.captures_iter(text))
            .filter_map(|caps| capture_count(&caps, 1))
            .find(|n| (UNITS_PER_SERVING_RANGE.0..=UNITS_PER_SERVING_RANGE.1).contains(n))
    }

    /// Mass of one capsule/tablet in grams
    pub fn parse_unit_mass(text: &str) -> Option<f64> {
        let in_range = |g: &f64| *g >= UNIT_MASS_RANGE_G.0 && *g <= UNIT_MASS_RANGE_G.1;

        let direct = UNIT_MASS_PER_LEAD
            .captures_iter(text)
            .chain(UNIT_MASS_PER_TRAIL.captures_iter(text))
            .filter_map(|c| capture_measurement(&c, 1, 2))
            .map(|m| m.grams())
            .find(in_range);
        if direct.is_some() {
            return direct;
        }

        UNIT_MASS_PAREN
            .captures_iter(text)
            .filter_map(|c| {
                let count = capture_count(&c, 1).filter(|n| *n > 0)?;
                let m = capture_measurement(&c, 2, 3)?;
                Some(m.grams() / f64::from(count))
            })
            .find(in_range)
    }
}

impl EnrichmentStage for UnitParser {
    fn name(&self) -> &'static str {
        "UnitParser"
    }

    fn apply(&self, raw: &RawProduct, so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let id = raw.id.as_str();
        let name = raw.name_or_empty();
        let text = raw.text();
        let mut warnings = Vec::new();
        let mut delta = EnrichmentDelta::new();

        // Unit evidence
        let unit_count = match raw.attr(attr_keys::UNIT_COUNT) {
            Some(value) => match parse_count(value).filter(|n| *n > 0) {
                Some(n) => Some(Reading::new(n, Source::Attribute, ATTRIBUTE_CONFIDENCE)),
                None => {
                    warnings.push(Warn::unit_ambiguity(id, Field::UnitCount.as_str()).with_evidence(value));
                    None
                }
            },
            None => None,
        }
        .or_else(|| {
            Self::parse_unit_count_text(&format!("{name} {text}"))
                .map(|n| Reading::new(n, Source::Regex, COUNT_EVIDENCE_CONFIDENCE))
        });
        let units_per_serving = Self::parse_units_per_serving(&text)
            .map(|n| Reading::new(n, Source::Regex, COUNT_EVIDENCE_CONFIDENCE));
        let unit_mass = Self::parse_unit_mass(&text).map(|g| Reading::new(g, Source::Regex, COUNT_EVIDENCE_CONFIDENCE));
        let has_unit_evidence = unit_count.is_some() || units_per_serving.is_some() || unit_mass.is_some();
        let count_based = so_far.form.map_or(has_unit_evidence, |f| f.is_count_based());

        // Serving size
        let serving_size = Self::parse_serving_size_for(&text, count_based)
            .map(|g| Reading::new(g, Source::Regex, REGEX_CONFIDENCE));

        // Servings
        let servings_text = Self::parse_servings_text(&text);
        let mut range = None;
        let mut servings = match raw.attr(attr_keys::SERVINGS) {
            Some(value) => match parse_count(value).filter(|n| *n > 0 && *n <= MAX_SERVINGS) {
                Some(n) => Some(Reading::new(n, Source::Attribute, ATTRIBUTE_CONFIDENCE)),
                None => {
                    warnings.push(Warn::unit_ambiguity(id, Field::Servings.as_str()).with_evidence(value));
                    None
                }
            },
            None => None,
        };
        if servings.is_none() {
            servings = servings_text
                .exact
                .map(|n| Reading::new(n, Source::Regex, REGEX_CONFIDENCE));
        }
        if servings.is_none() {
            range = servings_text.range;
        }
        if servings.is_none() && range.is_none() {
            if let (Some(count), Some(per)) = (unit_count, units_per_serving) {
                let derived = (f64::from(count.value) / f64::from(per.value)).round() as u32;
                if derived > 0 && derived <= MAX_SERVINGS {
                    servings = Some(Reading::new(derived, Source::Derived, COUNT_EVIDENCE_CONFIDENCE));
                }
            }
        }

        // Net weight
        let mut net_weight = match raw.attr(attr_keys::NET_WEIGHT) {
            Some(value) => match Self::parse_weight_attribute(value) {
                Some(g) => Some(Reading::new(g, Source::Attribute, ATTRIBUTE_CONFIDENCE)),
                None => {
                    warnings.push(Warn::unit_ambiguity(id, Field::NetWeightG.as_str()).with_evidence(value));
                    None
                }
            },
            None => None,
        };
        if net_weight.is_none() {
            net_weight = Self::parse_net_weight_text(name, &text)
                .map(|g| Reading::new(g, Source::Regex, REGEX_CONFIDENCE));
        }
        if net_weight.is_none() {
            if let (Some(size), Some(n)) = (serving_size, servings) {
                net_weight = Some(Reading::new(
                    round_to(size.value * f64::from(n.value), 2),
                    Source::Derived,
                    DERIVED_CONFIDENCE,
                ));
            }
        }
        if net_weight.is_none() {
            if let (Some(count), Some(mass)) = (unit_count, unit_mass) {
                net_weight = Some(Reading::new(
                    round_to(f64::from(count.value) * mass.value, 2),
                    Source::Derived,
                    DERIVED_CONFIDENCE,
                ));
            }
        }

        // Net weight sanity against serving size × servings
        if let (Some(w), Some(size), Some(n)) = (net_weight, serving_size, servings) {
            if w.source != Source::Derived {
                let expected = size.value * f64::from(n.value);
                if w.value <= 1.5 * size.value || w.value < 0.6 * expected {
                    let ratio = expected / w.value;
                    let extreme = ratio >= EXTREME_RATIO || w.value < 0.25 * size.value;
                    debug!(product_id = id, from = w.value, to = expected, "Correcting net weight");
                    net_weight = Some(Reading::new(round_to(expected, 2), Source::Corrected, CORRECTED_CONFIDENCE));
                    if extreme && n.value < REALISTIC_COUNT {
                        warnings.push(
                            Warn::unit_ambiguity(id, Field::NetWeightG.as_str())
                                .with_evidence(format!("{} g vs {} g", w.value, round_to(expected, 2))),
                        );
                    }
                }
            }
        }

        // Servings sanity against net weight ÷ serving size
        if let (Some(n), Some(w), Some(size)) = (servings, net_weight, serving_size) {
            let trusted_weight = matches!(w.source, Source::Attribute | Source::Regex);
            let direct_servings = matches!(n.source, Source::Attribute | Source::Regex);
            if trusted_weight && direct_servings && size.value > 0.0 {
                let derived = w.value / size.value;
                let rel_err = (f64::from(n.value) - derived).abs() / derived;
                let atypical = n.value < TYPICAL_SERVINGS.0 || n.value > TYPICAL_SERVINGS.1;
                let rounded = derived.round() as u32;
                if (rel_err > 0.4 || atypical) && rounded != n.value && rounded > 0 && rounded <= MAX_SERVINGS {
                    let ratio = (f64::from(n.value) / derived).max(derived / f64::from(n.value));
                    debug!(product_id = id, from = n.value, to = rounded, "Correcting servings");
                    servings = Some(Reading::new(rounded, Source::Corrected, CORRECTED_CONFIDENCE));
                    if ratio >= EXTREME_RATIO && derived < f64::from(REALISTIC_COUNT) {
                        warnings.push(
                            Warn::unit_ambiguity(id, Field::Servings.as_str())
                                .with_evidence(format!("{} vs {}", n.value, rounded)),
                        );
                    }
                }
            }
        }

        if let Some(r) = net_weight {
            delta.set(Field::NetWeightG, FieldValue::Number(r.value), r.source, r.confidence);
        }
        if let Some(r) = servings {
            delta.set(Field::Servings, FieldValue::Count(r.value), r.source, r.confidence);
        }
        if let Some((lo, hi)) = range {
            delta.set(Field::ServingsMin, FieldValue::Count(lo), Source::Regex, REGEX_CONFIDENCE);
            delta.set(Field::ServingsMax, FieldValue::Count(hi), Source::Regex, REGEX_CONFIDENCE);
        }
        if let Some(r) = serving_size {
            delta.set(Field::ServingSizeG, FieldValue::Number(round_to(r.value, 3)), r.source, r.confidence);
        }
        if let Some(r) = unit_count {
            delta.set(Field::UnitCount, FieldValue::Count(r.value), r.source, r.confidence);
        }
        if let Some(r) = units_per_serving {
            delta.set(Field::UnitsPerServing, FieldValue::Count(r.value), r.source, r.confidence);
        }
        if let Some(r) = unit_mass {
            delta.set(Field::UnitMassG, FieldValue::Number(round_to(r.value, 3)), r.source, r.confidence);
        }

        // Form from unit evidence when nothing earlier decided it
        if so_far.form.is_none() && has_unit_evidence {
            let form = if TABLET_TOKEN.is_match(&text) && !CAPSULE_TOKEN.is_match(&text) {
                Form::Tabs
            } else {
                Form::Capsules
            };
            delta.set(Field::Form, FieldValue::Form(form), Source::UnitEvidence, UNIT_EVIDENCE_CONFIDENCE);
        }

        Ok(StageOutput::new(delta, warnings))
    }
}
