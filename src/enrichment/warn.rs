//! Advisory warnings collected per product during one enrichment run.

use serde::{Deserialize, Serialize};

/// Closed set of warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarnCode {
    FieldConflict,
    MissingCritical,
    UnitAmbiguity,
    BadVariationGroup,
    UnsupportedClaim,
    IngredientParseFail,
}

impl WarnCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarnCode::FieldConflict => "FIELD_CONFLICT",
            WarnCode::MissingCritical => "MISSING_CRITICAL",
            WarnCode::UnitAmbiguity => "UNIT_AMBIGUITY",
            WarnCode::BadVariationGroup => "BAD_VARIATION_GROUP",
            WarnCode::UnsupportedClaim => "UNSUPPORTED_CLAIM",
            WarnCode::IngredientParseFail => "INGREDIENT_PARSE_FAIL",
        }
    }
}

impl std::fmt::Display for WarnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning attributed to one product and, where applicable, one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warn {
    pub product_id: String,
    pub code: WarnCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Warn {
    fn new(product_id: &str, code: WarnCode, field: Option<&str>, message: String) -> Self {
        Self {
            product_id: product_id.to_string(),
            code,
            field: field.map(str::to_string),
            message,
            evidence: None,
        }
    }

    pub fn field_conflict(product_id: &str, field: &str, det_value: &str, other_value: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::FieldConflict,
            Some(field),
            format!("Deterministic value '{det_value}' conflicts with AI value '{other_value}'"),
        )
    }

    /// Chosen value contradicted by the product title
    pub fn title_conflict(product_id: &str, field: &str, chosen: &str, mentioned: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::FieldConflict,
            Some(field),
            format!("Title mentions {mentioned} while {field} is '{chosen}'"),
        )
    }

    pub fn missing_critical(product_id: &str, field: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::MissingCritical,
            Some(field),
            format!("Critical field '{field}' is missing"),
        )
    }

    pub fn unit_ambiguity(product_id: &str, field: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::UnitAmbiguity,
            Some(field),
            format!("Unit ambiguity in field '{field}'"),
        )
    }

    pub fn bad_variation_group(product_id: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::BadVariationGroup,
            None,
            "Failed to group product variations".to_string(),
        )
    }

    pub fn unsupported_claim(product_id: &str, claim: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::UnsupportedClaim,
            None,
            format!("Unsupported claim: {claim}"),
        )
    }

    pub fn ingredient_parse_fail(product_id: &str) -> Self {
        Self::new(
            product_id,
            WarnCode::IngredientParseFail,
            Some("ingredients_key"),
            "Failed to parse ingredients".to_string(),
        )
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// `CODE: message`
    pub fn render(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }

    pub fn is(&self, code: WarnCode, field: &str) -> bool {
        self.code == code && self.field.as_deref() == Some(field)
    }
}

impl std::fmt::Display for Warn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.product_id, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_format() {
        let warn = Warn::missing_critical("wc_1", "servings");
        assert_eq!(warn.render(), "MISSING_CRITICAL: Critical field 'servings' is missing");
        assert!(warn.is(WarnCode::MissingCritical, "servings"));
        assert_eq!(warn.to_string(), "[wc_1] MISSING_CRITICAL: Critical field 'servings' is missing");
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&WarnCode::IngredientParseFail).unwrap();
        assert_eq!(json, "\"INGREDIENT_PARSE_FAIL\"");
    }
}
