//! # Taxonomy Parser Stage
//!
//! Infers goal and diet tags from category names/slugs, the flattened search
//! text and taxonomy attributes.
//!
//! Goal keywords are matched at word starts, so "clean" never counts as
//! "lean". Diet keywords go through negation-aware matching:
//!
//! 1. an explicit vegan attribute of `ei`/`no` rules vegan out
//! 2. an explicit `jah`/`yes` attribute tags vegan with source `attribute`
//! 3. any negated mention ("Non-vegan", "not suitable for vegans") rules the
//!    tag out, regardless of positive hits elsewhere in the text
//! 4. otherwise a positive mention tags it
//!
//! A positive text claim overruled by rule 1 or 3 is reported as
//! `UNSUPPORTED_CLAIM`.

use crate::enrichment::delta::{EnrichmentDelta, StageOutput};
use crate::enrichment::warn::Warn;
use crate::enrichment::EnrichmentStage;
use crate::enrichment_errors::EnrichError;
use crate::product_model::{attr_keys, Field, FieldValue, ParsedProduct, RawProduct, Source};
use crate::text_processing::{keyword_hits, strip_locale_suffix};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::trace;

pub const GOAL_CONFIDENCE: f64 = 0.8;
pub const DIET_CONFIDENCE: f64 = 0.9;

const GOAL_KEYWORDS: &[(&str, &[&str])] = &[
    ("preworkout", &["preworkout", "pre-workout", "enne treeningut", "до тренировки"]),
    (
        "strength",
        &["strength", "jõud", "joud", "сила", "muscle", "lihas", "creatine", "kreatiin", "креатин"],
    ),
    (
        "endurance",
        &["endurance", "vastupidavus", "выносливость", "stamina", "creatine", "kreatiin", "креатин"],
    ),
    ("lean_muscle", &["lean muscle", "lean lihas", "lean", "похудение"]),
    ("recovery", &["recovery", "taastumine", "восстановление", "post-workout"]),
    ("weight_loss", &["weight loss", "kaalulangus", "похудение", "fat burn"]),
    ("wellness", &["wellness", "tervis", "здоровье", "vitamin", "vitamiin"]),
];

/// Cues in the goal-intent attribute: (goal, any of these fragments)
const INTENT_CUES: &[(&str, &[&str])] = &[
    ("strength", &["jõud", "joudu", "joud", "strength"]),
    ("endurance", &["vastupidavus", "endurance"]),
    ("recovery", &["taastumine", "recovery"]),
    ("weight_loss", &["kaal", "weight"]),
    ("wellness", &["tervis", "wellness"]),
];

lazy_static! {
    static ref GOAL_PATTERNS: Vec<(&'static str, Regex)> = GOAL_KEYWORDS
        .iter()
        .map(|(goal, words)| {
            let alternation = words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
            let pattern = format!(r"(?i)(?:^|[^\w])(?:{alternation})");
            (*goal, Regex::new(&pattern).expect("Goal keyword pattern should be valid"))
        })
        .collect();
    static ref DIET_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("vegan", Regex::new(r"(?i)\b(?:vegan|веган)\w*").expect("Vegan pattern should be valid")),
        (
            "gluten_free",
            Regex::new(r"(?i)gluteenivaba|gluten.?free|без глютена").expect("Gluten pattern should be valid"),
        ),
        (
            "lactose_free",
            Regex::new(r"(?i)laktoosivaba|lactose.?free|без лактозы").expect("Lactose pattern should be valid"),
        ),
        (
            "sugar_free",
            Regex::new(r"(?i)sugar.?free|без сахара|suhkruvaba").expect("Sugar pattern should be valid"),
        ),
    ];
}

/// Explicit vegan attribute reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VeganAttribute {
    Yes,
    No,
    Unknown,
}

impl VeganAttribute {
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return VeganAttribute::Unknown;
        };
        let value = value.trim().to_lowercase();
        match strip_locale_suffix(&value) {
            "jah" | "yes" | "true" | "да" => VeganAttribute::Yes,
            "ei" | "no" | "false" | "нет" => VeganAttribute::No,
            other if other.starts_with("ei-") || other.starts_with("no-") => VeganAttribute::No,
            _ => VeganAttribute::Unknown,
        }
    }
}

/// Goal and diet tag inference
pub struct TaxonomyParser;

impl TaxonomyParser {
    /// Goal tags from categories, search text and the goal-intent attribute
    pub fn goal_tags(raw: &RawProduct) -> BTreeSet<String> {
        let mut goals = BTreeSet::new();
        let mut sources: Vec<String> = raw
            .category_names
            .iter()
            .chain(raw.category_slugs.iter())
            .map(|c| c.replace('-', " "))
            .collect();
        sources.push(raw.text().into_owned());

        for source in &sources {
            for (goal, pattern) in GOAL_PATTERNS.iter() {
                if pattern.is_match(source) {
                    goals.insert(goal.to_string());
                }
            }
        }

        let intent = raw.attr_values(attr_keys::GOAL_INTENT).join(" ").to_lowercase();
        if !intent.is_empty() {
            for (goal, cues) in INTENT_CUES {
                if cues.iter().any(|cue| intent.contains(cue)) {
                    goals.insert(goal.to_string());
                }
            }
            if intent.contains("enne") && intent.contains("treeningut") {
                goals.insert("preworkout".to_string());
            }
        }
        goals
    }

    /// Diet tags, whether the vegan tag came from the attribute, and overruled claims
    pub fn diet_tags(raw: &RawProduct) -> (BTreeSet<String>, bool, Vec<String>) {
        let text = raw.text();
        let vegan_attr = VeganAttribute::parse(raw.attr(attr_keys::VEGAN));
        let mut diets = BTreeSet::new();
        let mut from_attribute = false;
        let mut overruled = Vec::new();

        for (diet, pattern) in DIET_PATTERNS.iter() {
            let hits = keyword_hits(pattern, &text);
            trace!(diet, positive = hits.positive, negated = hits.negated, "Diet keyword hits");

            if *diet == "vegan" {
                match vegan_attr {
                    VeganAttribute::No => {
                        if hits.positive {
                            overruled.push(diet.to_string());
                        }
                        continue;
                    }
                    VeganAttribute::Yes => {
                        diets.insert(diet.to_string());
                        from_attribute = true;
                        continue;
                    }
                    VeganAttribute::Unknown => {}
                }
            }

            if hits.negated {
                if hits.positive {
                    overruled.push(diet.to_string());
                }
            } else if hits.positive {
                diets.insert(diet.to_string());
            }
        }
        (diets, from_attribute, overruled)
    }
}

impl EnrichmentStage for TaxonomyParser {
    fn name(&self) -> &'static str {
        "TaxonomyParser"
    }

    fn apply(&self, raw: &RawProduct, _so_far: &ParsedProduct) -> Result<StageOutput, EnrichError> {
        let mut delta = EnrichmentDelta::new();
        let mut warnings = Vec::new();

        let goals = Self::goal_tags(raw);
        if !goals.is_empty() {
            delta.set(
                Field::GoalTags,
                FieldValue::Tags(goals.into_iter().collect()),
                Source::Heuristic,
                GOAL_CONFIDENCE,
            );
        }

        let (diets, from_attribute, overruled) = Self::diet_tags(raw);
        if !diets.is_empty() {
            let source = if from_attribute { Source::Attribute } else { Source::Heuristic };
            delta.set(Field::DietTags, FieldValue::Tags(diets.into_iter().collect()), source, DIET_CONFIDENCE);
        }
        for claim in overruled {
            warnings.push(Warn::unsupported_claim(&raw.id, &claim));
        }

        Ok(StageOutput::new(delta, warnings))
    }
}
