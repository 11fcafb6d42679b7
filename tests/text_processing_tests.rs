#[cfg(test)]
mod tests {
    use catalog_enrichment::measurement_patterns::{
        find_net_weights, find_unit_counts, CAPSULE_TOKEN, GRAMS_TOKEN, POWDER_TOKEN, SERVINGS_EXPLICIT,
        SERVINGS_RANGE, TABLET_TOKEN,
    };
    use catalog_enrichment::measurement_types::MeasureUnit;
    use catalog_enrichment::text_processing::{
        build_search_text, collapse_whitespace, html_to_lines, keyword_hits, parse_decimal, sanitize_title,
        slugify, strip_html, strip_locale_suffix,
    };
    use regex::Regex;

    #[test]
    fn test_search_text_assembly() {
        let text = build_search_text(
            Some("  Whey Isolate "),
            Some("<p>Great&amp;tasty</p><ul><li>Fast</li></ul>"),
            &["Valgud".to_string(), "Protein".to_string()],
            Some("Acme"),
        );
        assert_eq!(text, "Whey Isolate Great&tasty Fast Valgud Protein Acme");
    }

    #[test]
    fn test_search_text_skips_blank_parts() {
        assert_eq!(build_search_text(None, Some("<br/>"), &[], Some("  ")), "");
        assert_eq!(build_search_text(Some("BCAA"), None, &[], None), "BCAA");
    }

    #[test]
    fn test_html_helpers() {
        assert_eq!(strip_html("<div>Omega&nbsp;3<br>1000 mg</div>"), "Omega 3 1000 mg");
        let lines = html_to_lines("Line one<br/>Line &lt;two&gt;");
        assert_eq!(lines, "Line one\nLine <two>");
        assert_eq!(collapse_whitespace(" a \u{00A0} b\n\tc "), "a b c");
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(parse_decimal("Net 2,27 kg"), Some(2.27));
        assert_eq!(parse_decimal("Net 1.5 kg"), Some(1.5));
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_locale_suffixes() {
        assert_eq!(strip_locale_suffix("kapslid-en"), "kapslid");
        assert_eq!(strip_locale_suffix("ei-mingit-maitset-et"), "ei-mingit-maitset");
        assert_eq!(strip_locale_suffix("et"), "et");
    }

    #[test]
    fn test_slugify_grouping_keys() {
        assert_eq!(slugify("Optimum Nutrition Gold Whey 2,27 kg"), "optimum-nutrition-gold-whey-227-kg");
        assert_eq!(slugify("  --Omega-3--  "), "omega-3");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_negation_in_estonian() {
        let vegan = Regex::new(r"(?i)\bvegan").unwrap();
        let hits = keyword_hits(&vegan, "Toode ei ole vegan.");
        assert!(hits.negated);
        assert!(!hits.positive);

        let hits = keyword_hits(&vegan, "Non-vegan. Vegan shaker sold separately");
        assert!(hits.negated);
        assert!(hits.positive);
    }

    #[test]
    fn test_sanitize_title_keeps_inner_separators() {
        assert_eq!(sanitize_title("Whey | "), "Whey");
        assert_eq!(sanitize_title("EAA: Mango - Lime"), "EAA: Mango - Lime");
        assert_eq!(sanitize_title("Vitamin D3 D3"), "Vitamin D3");
    }

    #[test]
    fn test_net_weight_context_filtering() {
        let grams: Vec<f64> = find_net_weights("Whey 2,27 kg (24 g protein per serving)")
            .iter()
            .map(|m| m.grams())
            .collect();
        assert_eq!(grams, vec![2270.0]);

        let found = find_net_weights("Serving size: 30 g");
        assert!(found.is_empty());

        let drink = find_net_weights("Isotonic 500 ml");
        assert_eq!(drink[0].unit, MeasureUnit::Millilitre);
        assert_eq!(drink[0].text, "500 ml");
    }

    #[test]
    fn test_unit_count_positions() {
        let text = "Magnesium 90 caps";
        let counts = find_unit_counts(text);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 90);
        assert_eq!(&text[counts[0].start..counts[0].end], counts[0].text);
    }

    #[test]
    fn test_servings_patterns() {
        let caps = SERVINGS_EXPLICIT.captures("Contains 60 portsjonit").unwrap();
        assert_eq!(&caps[1], "60");
        let caps = SERVINGS_RANGE.captures("30–60 servings").unwrap();
        assert_eq!((&caps[1], &caps[2]), ("30", "60"));
    }

    #[test]
    fn test_form_tokens() {
        assert!(CAPSULE_TOKEN.is_match("120 vcaps"));
        assert!(CAPSULE_TOKEN.is_match("90 капсул"));
        assert!(TABLET_TOKEN.is_match("60 Tabs"));
        assert!(POWDER_TOKEN.is_match("kreatiini pulbri kujul"));
        assert!(GRAMS_TOKEN.is_match("1,2 kg"));
        assert!(!GRAMS_TOKEN.is_match("500 mg"));
    }
}
