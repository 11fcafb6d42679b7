//! # Text Processing Module
//!
//! This module provides the text utilities shared by the enrichment stages:
//!
//! - HTML stripping and whitespace normalisation for catalog descriptions
//! - Decimal-comma aware number parsing ("2,5" and "2.5" are the same value)
//! - Locale-suffix stripping for taxonomy slugs (`kapslid-et` -> `kapslid`)
//! - Slug generation for grouping keys
//! - Negation-aware keyword matching ("Non-vegan" is not a vegan claim)
//! - Conservative display-title sanitising

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("HTML tag pattern should be valid");
    static ref BLOCK_TAG: Regex = Regex::new(r"(?i)<\s*(?:br\s*/?|/p|/li|/div|/h[1-6]|/tr)\s*>")
        .expect("Block tag pattern should be valid");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("Whitespace pattern should be valid");
    static ref INLINE_WHITESPACE: Regex =
        Regex::new(r"[ \t\x{00A0}]+").expect("Inline whitespace pattern should be valid");
    static ref FIRST_NUMBER: Regex =
        Regex::new(r"\d+(?:[.,]\d+)?").expect("Number pattern should be valid");
    static ref FIRST_INTEGER: Regex = Regex::new(r"\d+").expect("Integer pattern should be valid");
    static ref SLUG_INVALID: Regex = Regex::new(r"[^a-z0-9-]").expect("Slug pattern should be valid");
    static ref SLUG_DASHES: Regex = Regex::new(r"-+").expect("Dash pattern should be valid");
    static ref LEADING_SEPARATORS: Regex =
        Regex::new(r"^(?:\s*[\-–—|:;·•]+\s*)+").expect("Leading separator pattern should be valid");
    static ref TRAILING_SEPARATORS: Regex =
        Regex::new(r"(?:\s*[\-–—|:;·•]+\s*)+$").expect("Trailing separator pattern should be valid");
    static ref CLAUSE_BREAK: Regex = Regex::new(r"\s[\-–—]+\s|[.!?;,:/()\n]")
        .expect("Clause break pattern should be valid");
}

/// Words that negate a keyword when they appear just before it
const NEGATION_WORDS: &[&str] = &["non", "not", "no", "mitte", "ei", "не", "нет"];

/// How many words before a keyword are inspected for a negation
const NEGATION_WINDOW_WORDS: usize = 3;

/// Result of scanning a text for a keyword pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    /// At least one match without a nearby negation
    pub positive: bool,
    /// At least one match preceded by a negation ("non-vegan", "not vegan")
    pub negated: bool,
}

/// Replace HTML tags with spaces, decode common entities and collapse whitespace
///
/// # Examples
///
/// ```rust
/// use catalog_enrichment::text_processing::strip_html;
///
/// assert_eq!(strip_html("<p>Whey&nbsp;<b>Isolate</b></p>"), "Whey Isolate");
/// ```
pub fn strip_html(html: &str) -> String {
    let without_tags = HTML_TAG.replace_all(html, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

/// Convert HTML into plain text lines, keeping block boundaries as newlines
pub fn html_to_lines(html: &str) -> String {
    let with_breaks = BLOCK_TAG.replace_all(html, "\n");
    let without_tags = HTML_TAG.replace_all(&with_breaks, " ");
    let decoded = decode_entities(&without_tags);
    decoded
        .lines()
        .map(|line| INLINE_WHITESPACE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#8211;", "–")
        .replace("&#8212;", "—")
}

/// Normalise non-breaking spaces, collapse runs of whitespace and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE
        .replace_all(&text.replace('\u{00A0}', " "), " ")
        .trim()
        .to_string()
}

/// Build the flattened search text: name + stripped description + category names + brand
pub fn build_search_text(
    name: Option<&str>,
    description: Option<&str>,
    category_names: &[String],
    brand_name: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
        parts.push(name.trim().to_string());
    }
    if let Some(description) = description {
        let stripped = strip_html(description);
        if !stripped.is_empty() {
            parts.push(stripped);
        }
    }
    if !category_names.is_empty() {
        parts.push(category_names.join(" "));
    }
    if let Some(brand) = brand_name.filter(|b| !b.trim().is_empty()) {
        parts.push(brand.trim().to_string());
    }
    collapse_whitespace(&parts.join(" "))
}

/// Parse the first decimal number in a string, accepting a comma as decimal separator
///
/// # Examples
///
/// ```rust
/// use catalog_enrichment::text_processing::parse_decimal;
///
/// assert_eq!(parse_decimal("2,5"), Some(2.5));
/// assert_eq!(parse_decimal("300g"), Some(300.0));
/// assert_eq!(parse_decimal("none"), None);
/// ```
pub fn parse_decimal(text: &str) -> Option<f64> {
    let found = FIRST_NUMBER.find(text)?;
    found.as_str().replace(',', ".").parse::<f64>().ok()
}

/// Parse the first unsigned integer in a string
pub fn parse_count(text: &str) -> Option<u32> {
    FIRST_INTEGER.find(text)?.as_str().parse::<u32>().ok()
}

/// Remove a trailing `-et`, `-ru` or `-en` locale suffix from a taxonomy slug
pub fn strip_locale_suffix(slug: &str) -> &str {
    for suffix in ["-et", "-ru", "-en"] {
        if let Some(stripped) = slug.strip_suffix(suffix) {
            return stripped;
        }
    }
    slug
}

/// Lowercase, hyphenate whitespace, drop anything outside `[a-z0-9-]`, collapse dashes
///
/// # Examples
///
/// ```rust
/// use catalog_enrichment::text_processing::slugify;
///
/// assert_eq!(slugify("MST  Creatine -- Monohydrate!"), "mst-creatine-monohydrate");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let hyphenated = WHITESPACE.replace_all(&lowered, "-");
    let cleaned = SLUG_INVALID.replace_all(&hyphenated, "");
    let collapsed = SLUG_DASHES.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Scan `text` for `pattern` and classify each match as negated or positive
///
/// A match is negated when one of the few words before it, within the same
/// clause, is a negation word (`non`, `not`, `no`, `mitte`, `ei`, `не`, `нет`).
/// Punctuation, slashes and spaced dashes end a clause; a hyphen glued to a
/// word ("non-vegan") does not.
pub fn keyword_hits(pattern: &Regex, text: &str) -> KeywordHits {
    let mut hits = KeywordHits::default();
    for found in pattern.find_iter(text) {
        if is_negated_before(&text[..found.start()]) {
            trace!("Negated keyword '{}'", found.as_str());
            hits.negated = true;
        } else {
            hits.positive = true;
        }
    }
    hits
}

fn is_negated_before(prefix: &str) -> bool {
    let clause = CLAUSE_BREAK
        .find_iter(prefix)
        .last()
        .map_or(prefix, |brk| &prefix[brk.end()..]);
    clause
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '/'))
        .filter(|w| !w.is_empty())
        .rev()
        .take(NEGATION_WINDOW_WORDS)
        .any(|w| NEGATION_WORDS.contains(&w.to_lowercase().as_str()))
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clean a title for display
///
/// Rules applied in order:
/// - non-breaking spaces become spaces and whitespace runs collapse
/// - separator garbage (dashes, pipes, colons, bullets) is removed at both ends
/// - an accidentally repeated final word is dropped ("Unflavored unflavored")
///
/// When nothing is left, the trimmed input is returned instead.
///
/// # Examples
///
/// ```rust
/// use catalog_enrichment::text_processing::sanitize_title;
///
/// assert_eq!(sanitize_title("— |  Whey 1 kg  | —"), "Whey 1 kg");
/// assert_eq!(sanitize_title("C4 Original — Cellucor"), "C4 Original — Cellucor");
/// ```
pub fn sanitize_title(input: &str) -> String {
    let mut title = collapse_whitespace(input);
    for _ in 0..2 {
        title = LEADING_SEPARATORS.replace(&title, "").to_string();
        title = TRAILING_SEPARATORS.replace(&title, "").to_string();
    }
    title = drop_repeated_last_word(&title);
    let title = title.trim().to_string();
    if title.is_empty() {
        input.trim().to_string()
    } else {
        title
    }
}

fn drop_repeated_last_word(title: &str) -> String {
    let words: Vec<&str> = title.split(' ').collect();
    if words.len() < 2 {
        return title.to_string();
    }
    let last = words[words.len() - 1];
    let previous = words[words.len() - 2];
    let is_word = |w: &str| !w.is_empty() && w.chars().all(char::is_alphanumeric);
    if is_word(last) && is_word(previous) && last.to_lowercase() == previous.to_lowercase() {
        words[..words.len() - 1].join(" ")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_locale_suffix() {
        assert_eq!(strip_locale_suffix("kapslid-et"), "kapslid");
        assert_eq!(strip_locale_suffix("pulber-ru"), "pulber");
        assert_eq!(strip_locale_suffix("tabletid"), "tabletid");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("400"), Some(400));
        assert_eq!(parse_count("60-kapslit"), Some(60));
        assert_eq!(parse_count("many"), None);
    }

    #[test]
    fn test_keyword_hits_negation() {
        let vegan = Regex::new(r"(?i)\bvegan").unwrap();

        let hits = keyword_hits(&vegan, "High-quality whey isolate. Non-vegan formula.");
        assert!(hits.negated);
        assert!(!hits.positive);

        let hits = keyword_hits(&vegan, "Vegan protein from peas");
        assert!(hits.positive);
        assert!(!hits.negated);

        let hits = keyword_hits(&vegan, "Not suitable for vegans");
        assert!(hits.negated);
        assert!(!hits.positive);
    }

    #[test]
    fn test_negation_does_not_cross_clauses() {
        let vegan = Regex::new(r"(?i)\bvegan").unwrap();
        let hits = keyword_hits(&vegan, "No artificial sweeteners, vegan friendly");
        assert!(hits.positive);
        assert!(!hits.negated);

        for text in [
            "Plant based formula with no artificial sweeteners - vegan friendly",
            "No added sugar – vegan",
            "No dairy: vegan",
            "No soy / vegan",
        ] {
            let hits = keyword_hits(&vegan, text);
            assert!(hits.positive, "{text}");
            assert!(!hits.negated, "{text}");
        }
    }

    #[test]
    fn test_glued_hyphen_still_negates() {
        let vegan = Regex::new(r"(?i)\bvegan").unwrap();
        let hits = keyword_hits(&vegan, "Whey blend - non-vegan");
        assert!(hits.negated);
        assert!(!hits.positive);
    }

    #[test]
    fn test_sanitize_title_rules() {
        assert_eq!(sanitize_title("XTEND EAA 40 servings Tropical —  "), "XTEND EAA 40 servings Tropical");
        assert_eq!(sanitize_title(" —  |  :  C4 Original 30 servings"), "C4 Original 30 servings");
        assert_eq!(sanitize_title("Whey  Protein  Isolate  –  Vanilla"), "Whey Protein Isolate – Vanilla");
        assert_eq!(sanitize_title("   —  "), "—");
        assert_eq!(
            sanitize_title("MST Citrulline RAW 300g Unflavored unflavored"),
            "MST Citrulline RAW 300g Unflavored"
        );
    }

    #[test]
    fn test_html_to_lines_keeps_blocks() {
        let lines = html_to_lines("<p>Ingredients: whey, cocoa</p><p>Use daily</p>");
        let lines: Vec<&str> = lines.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Ingredients: whey, cocoa", "Use daily"]);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.2345, 2), 1.23);
        assert_eq!(round_to(16.666, 1), 16.7);
    }
}
