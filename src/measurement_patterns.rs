//! # Measurement Patterns Module
//!
//! This module contains the regex tables shared by the extractors, plus small
//! scanners that turn matches into [`MeasurementMatch`] / [`CountMatch`] values.
//!
//! Vocabulary covers English, Estonian and Russian product copy. Decimal commas
//! are accepted everywhere a number is.

use crate::measurement_types::{CountMatch, MeasureUnit, MeasurementMatch};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Count-unit vocabulary (capsules, softgels, tablets) used inside larger patterns
const UNIT_NOUNS: &str = r"(?:softgels?|capsules?|vcaps|veg\s*caps|caps|tablet\w*|tabs|pehmekapsl\w*|kapsl\w*|таблет\w*|капсул\w*)";

lazy_static! {
    // Form tokens
    pub static ref CAPSULE_TOKEN: Regex = Regex::new(
        r"(?i)\b(?:capsules?\b|caps\b|vcaps\b|softgels?\b|pehmekapsl\w*|kapsl\w*|капсул\w*)"
    ).expect("Capsule token pattern should be valid");
    pub static ref TABLET_TOKEN: Regex = Regex::new(
        r"(?i)\b(?:tablet\w*|tabs\b|таблет\w*)"
    ).expect("Tablet token pattern should be valid");
    pub static ref POWDER_TOKEN: Regex = Regex::new(
        r"(?i)\b(?:powder|pulbri|pulber|порошок)"
    ).expect("Powder token pattern should be valid");
    pub static ref STRONG_POWDER_TOKEN: Regex = Regex::new(
        r"(?i)\bpulber\b"
    ).expect("Strong powder pattern should be valid");
    pub static ref GRAMS_TOKEN: Regex = Regex::new(
        r"(?i)\b\d+(?:[.,]\d+)?\s*(?:kg|g)\b"
    ).expect("Grams pattern should be valid");

    // Net weight / volume
    pub static ref NET_WEIGHT: Regex = Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(kg|g|ml|l)\b"
    ).expect("Net weight pattern should be valid");
    static ref PER_SERVING_AFTER: Regex = Regex::new(
        r"(?i)^\s*(?:(?:per|/)\s*(?:serving|portsjon|annus|порци|päev|day|scoop)|(?:of\s+)?(?:protein|valku|carb|süsivesik|sugar|suhkru|fat|rasva|fib|kiudain|белк|углевод))"
    ).expect("Per-serving suffix pattern should be valid");
    static ref PER_SERVING_BEFORE: Regex = Regex::new(
        r"(?i)(?:serving size|per serving|portsjoni suurus|portsjon|annus|scoop|mõõtlusikas|lusikas|размер порции|порция)\W{0,4}$"
    ).expect("Per-serving prefix pattern should be valid");

    // Servings
    pub static ref SERVINGS_EXPLICIT: Regex = Regex::new(
        r"(?i)\b(\d+)\s*(?:servings?|annust|portsjonit|portsjonid|порций|порции)"
    ).expect("Servings pattern should be valid");
    pub static ref SERVINGS_RANGE: Regex = Regex::new(
        r"(?i)\b(\d+)\s*[-–]\s*(\d+)\s*(?:servings?|annust|portsjonit|portsjonid|порций|порции)"
    ).expect("Servings range pattern should be valid");

    // Serving size
    pub static ref SERVING_SIZE_FORWARD: Regex = Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(g|mg|ml)\b\s*(?:per|/)\s*(?:serving|portsjon|annus|порци)"
    ).expect("Forward serving size pattern should be valid");
    pub static ref SERVING_SIZE_REVERSE: Regex = Regex::new(
        r"(?i)(?:serving size|per serving|portsjoni suurus|annus|размер порции)\s*[:\-]?\s*(\d+(?:[.,]\d+)?)\s*(g|mg|ml)\b"
    ).expect("Reverse serving size pattern should be valid");
    pub static ref SERVING_SIZE_PAREN: Regex = Regex::new(
        r"(?i)\((\d+(?:[.,]\d+)?)\s*(g|ml)\)"
    ).expect("Parenthetical serving size pattern should be valid");
    pub static ref PORTION_WORD: Regex = Regex::new(
        r"(?i)portsjon"
    ).expect("Portion word pattern should be valid");

    // Unit counts
    pub static ref UNIT_COUNT: Regex = Regex::new(
        &format!(r"(?i)\b(\d+)\s*{UNIT_NOUNS}")
    ).expect("Unit count pattern should be valid");
    pub static ref UNITS_PER_SERVING_LEAD: Regex = Regex::new(
        &format!(r"(?i)(?:take|võta|võtta|per serving|serving size|portsjon\w*|annus\w*|принимать)\D{{0,20}}?\b(\d{{1,2}})\s*{UNIT_NOUNS}")
    ).expect("Units per serving pattern should be valid");
    pub static ref UNITS_PER_SERVING_TRAIL: Regex = Regex::new(
        &format!(r"(?i)\b(\d{{1,2}})\s*{UNIT_NOUNS}\s*(?:daily|a day|per day|per serving|päevas|в день)")
    ).expect("Units per day pattern should be valid");

    // Unit mass
    pub static ref UNIT_MASS_PER_LEAD: Regex = Regex::new(
        r"(?i)per\s+(?:softgel|capsule|caps|tablet|tab|kapsel|kapsli|tableti)\w*\s*[:\-]?\s*(\d+(?:[.,]\d+)?)\s*(mg|g)\b"
    ).expect("Unit mass pattern should be valid");
    pub static ref UNIT_MASS_PER_TRAIL: Regex = Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(mg|g)\s*(?:per|/)\s*(?:softgel|capsule|caps|tablet|tab|kapsel|kapsli|tableti)"
    ).expect("Unit mass pattern should be valid");
    pub static ref UNIT_MASS_PAREN: Regex = Regex::new(
        &format!(r"(?i)\b(\d{{1,2}})\s*{UNIT_NOUNS}\s*\(\s*(\d+(?:[.,]\d+)?)\s*(mg|g)\s*\)")
    ).expect("Unit mass pattern should be valid");
}

/// Parse a captured number with an optional decimal comma
pub fn capture_number(caps: &Captures, group: usize) -> Option<f64> {
    caps.get(group)?
        .as_str()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
}

/// Parse a captured unsigned integer
pub fn capture_count(caps: &Captures, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse::<u32>().ok()
}

/// Build a measurement from a `(number)(unit)` capture pair
pub fn capture_measurement(
    caps: &Captures,
    value_group: usize,
    unit_group: usize,
) -> Option<MeasurementMatch> {
    let whole = caps.get(0)?;
    let value = capture_number(caps, value_group)?;
    let unit = MeasureUnit::parse(caps.get(unit_group)?.as_str())?;
    Some(MeasurementMatch {
        text: whole.as_str().to_string(),
        value,
        unit,
        start: whole.start(),
        end: whole.end(),
    })
}

/// Net-weight readings that do not sit in a per-serving or per-nutrient context
///
/// "5 g per serving", "serving size 5 g" and "24 g protein" are skipped.
pub fn find_net_weights(text: &str) -> Vec<MeasurementMatch> {
    NET_WEIGHT
        .captures_iter(text)
        .filter_map(|caps| capture_measurement(&caps, 1, 2))
        .filter(|m| m.value > 0.0)
        .filter(|m| {
            !PER_SERVING_AFTER.is_match(&text[m.end..]) && !PER_SERVING_BEFORE.is_match(&text[..m.start])
        })
        .collect()
}

/// Counts of capsules/softgels/tablets ("400 capsules", "60 pehmekapslit")
pub fn find_unit_counts(text: &str) -> Vec<CountMatch> {
    UNIT_COUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(CountMatch {
                text: whole.as_str().to_string(),
                count: capture_count(&caps, 1)?,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Slice of at most `max_chars` characters starting at byte offset `start`
pub fn window_after(text: &str, start: usize, max_chars: usize) -> &str {
    let tail = &text[start..];
    match tail.char_indices().nth(max_chars) {
        Some((offset, _)) => &tail[..offset],
        None => tail,
    }
}
