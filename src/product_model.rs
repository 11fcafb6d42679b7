//! # Product Model Module
//!
//! This module defines the records that flow through the enrichment pipeline:
//!
//! - [`RawProduct`]: the immutable catalog record as fetched from the store feed
//! - [`ParsedProduct`]: the accumulator that stage deltas are merged into, with
//!   per-field provenance and confidence
//! - [`EnrichedProduct`]: the final record with optional AI fields and warnings
//!
//! Enriched fields are addressed through the closed [`Field`] enum and carry typed
//! [`FieldValue`]s, so a delta can never write a number into a tag list.

use crate::ai::model::{display_value, AiConflict, AiEnrichment, AiFill, FaqEntry, GoalScore, SafetyFlag};
use crate::enrichment::warn::Warn;
use crate::enrichment_errors::EnrichError;
use crate::text_processing::build_search_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Taxonomy attribute keys used by the extractors
pub mod attr_keys {
    pub const FORM: &str = "attr_pa_valjalaske-vorm";
    pub const FLAVOR: &str = "attr_pa_maitse";
    pub const NET_WEIGHT: &str = "attr_pa_grammide-arv";
    pub const SERVINGS: &str = "attr_pa_portsjonite-arv";
    pub const UNIT_COUNT: &str = "attr_pa_tablettide-arv";
    pub const VEGAN: &str = "attr_pa_kas-see-on-veganisobralik";
    pub const GOAL_INTENT: &str = "attr_pa_milleks";
    /// Store taxonomy holding the brand term
    pub const BRAND_TAXONOMY: &str = "pa_tootja";
}

/// Canonical physical product form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Powder,
    Capsules,
    Tabs,
    Drink,
    Gel,
    Bar,
}

impl Form {
    pub fn as_str(&self) -> &'static str {
        match self {
            Form::Powder => "powder",
            Form::Capsules => "capsules",
            Form::Tabs => "tabs",
            Form::Drink => "drink",
            Form::Gel => "gel",
            Form::Bar => "bar",
        }
    }

    /// Sold by discrete unit rather than by weight or volume
    pub fn is_count_based(&self) -> bool {
        matches!(self, Form::Capsules | Form::Tabs)
    }

    /// Forms for which a price per 100 g is meaningful
    pub fn is_weight_based(form: Option<Form>) -> bool {
        !form.is_some_and(|f| f.is_count_based())
    }
}

impl std::fmt::Display for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field holds its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Attribute,
    Regex,
    Derived,
    Heuristic,
    Corrected,
    Compose,
    UnitEvidence,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Attribute => "attribute",
            Source::Regex => "regex",
            Source::Derived => "derived",
            Source::Heuristic => "heuristic",
            Source::Corrected => "corrected",
            Source::Compose => "compose",
            Source::UnitEvidence => "unit_evidence",
        }
    }
}

/// Enriched fields a stage may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Form,
    Flavor,
    NetWeightG,
    Servings,
    ServingsMin,
    ServingsMax,
    ServingSizeG,
    UnitCount,
    UnitsPerServing,
    UnitMassG,
    Price,
    PricePerServing,
    PricePerServingMin,
    PricePerServingMax,
    PricePer100g,
    PricePerUnit,
    DiscountPct,
    IsOnSale,
    GoalTags,
    DietTags,
    IngredientsKey,
    ParentId,
    VariantGroupId,
    DisplayTitle,
}

/// The kind of value a field stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Form,
    Text,
    Number,
    Count,
    Flag,
    Tags,
}

impl ValueKind {
    fn describe(&self) -> &'static str {
        match self {
            ValueKind::Form => "a form",
            ValueKind::Text => "text",
            ValueKind::Number => "a number",
            ValueKind::Count => "a count",
            ValueKind::Flag => "a flag",
            ValueKind::Tags => "a tag list",
        }
    }
}

impl Field {
    pub const ALL: [Field; 24] = [
        Field::Form,
        Field::Flavor,
        Field::NetWeightG,
        Field::Servings,
        Field::ServingsMin,
        Field::ServingsMax,
        Field::ServingSizeG,
        Field::UnitCount,
        Field::UnitsPerServing,
        Field::UnitMassG,
        Field::Price,
        Field::PricePerServing,
        Field::PricePerServingMin,
        Field::PricePerServingMax,
        Field::PricePer100g,
        Field::PricePerUnit,
        Field::DiscountPct,
        Field::IsOnSale,
        Field::GoalTags,
        Field::DietTags,
        Field::IngredientsKey,
        Field::ParentId,
        Field::VariantGroupId,
        Field::DisplayTitle,
    ];

    /// Name used in provenance, warnings and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Form => "form",
            Field::Flavor => "flavor",
            Field::NetWeightG => "net_weight_g",
            Field::Servings => "servings",
            Field::ServingsMin => "servings_min",
            Field::ServingsMax => "servings_max",
            Field::ServingSizeG => "serving_size_g",
            Field::UnitCount => "unit_count",
            Field::UnitsPerServing => "units_per_serving",
            Field::UnitMassG => "unit_mass_g",
            Field::Price => "price",
            Field::PricePerServing => "price_per_serving",
            Field::PricePerServingMin => "price_per_serving_min",
            Field::PricePerServingMax => "price_per_serving_max",
            Field::PricePer100g => "price_per_100g",
            Field::PricePerUnit => "price_per_unit",
            Field::DiscountPct => "discount_pct",
            Field::IsOnSale => "is_on_sale",
            Field::GoalTags => "goal_tags",
            Field::DietTags => "diet_tags",
            Field::IngredientsKey => "ingredients_key",
            Field::ParentId => "parent_id",
            Field::VariantGroupId => "variant_group_id",
            Field::DisplayTitle => "display_title",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Field::Form => ValueKind::Form,
            Field::Flavor | Field::ParentId | Field::VariantGroupId | Field::DisplayTitle => {
                ValueKind::Text
            }
            Field::Servings
            | Field::ServingsMin
            | Field::ServingsMax
            | Field::UnitCount
            | Field::UnitsPerServing => ValueKind::Count,
            Field::IsOnSale => ValueKind::Flag,
            Field::GoalTags | Field::DietTags | Field::IngredientsKey => ValueKind::Tags,
            _ => ValueKind::Number,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value carried by a delta
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Form(Form),
    Text(String),
    Number(f64),
    Count(u32),
    Flag(bool),
    Tags(Vec<String>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Form(_) => ValueKind::Form,
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::Count(_) => ValueKind::Count,
            FieldValue::Flag(_) => ValueKind::Flag,
            FieldValue::Tags(_) => ValueKind::Tags,
        }
    }
}

/// Immutable catalog record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProduct {
    pub id: String,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub sku: Option<String>,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub permalink: Option<String>,
    pub description: Option<String>,
    /// Current price in minor currency units
    pub price_cents: Option<i64>,
    pub regular_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub currency: Option<String>,
    pub in_stock: Option<bool>,
    pub low_stock_remaining: Option<i64>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub images: Vec<String>,
    pub category_ids: Vec<i64>,
    pub category_slugs: Vec<String>,
    pub category_names: Vec<String>,
    pub brand_slug: Option<String>,
    pub brand_name: Option<String>,
    /// Taxonomy attribute key -> term values
    pub dynamic_attrs: BTreeMap<String, Vec<String>>,
    pub search_text: Option<String>,
}

impl RawProduct {
    /// Create a product with an id and a name
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::product_model::RawProduct;
    ///
    /// let product = RawProduct::new("wc_1", "Creatine 300g")
    ///     .with_attr("attr_pa_valjalaske-vorm", "pulber-et");
    /// assert_eq!(product.attr("attr_pa_valjalaske-vorm"), Some("pulber-et"));
    /// assert!(product.text().contains("Creatine"));
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a value to a taxonomy attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dynamic_attrs
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_brand(mut self, slug: impl Into<String>, name: impl Into<String>) -> Self {
        self.brand_slug = Some(slug.into());
        self.brand_name = Some(name.into());
        self
    }

    pub fn with_category(mut self, slug: impl Into<String>, name: impl Into<String>) -> Self {
        self.category_slugs.push(slug.into());
        self.category_names.push(name.into());
        self
    }

    pub fn with_prices(mut self, price: i64, regular: Option<i64>, sale: Option<i64>) -> Self {
        self.price_cents = Some(price);
        self.regular_price_cents = regular;
        self.sale_price_cents = sale;
        self
    }

    /// First value of a taxonomy attribute, if any
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.dynamic_attrs
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// All values of a taxonomy attribute
    pub fn attr_values(&self, key: &str) -> &[String] {
        self.dynamic_attrs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// The flattened search text, computed on the fly when the feed did not carry it
    pub fn text(&self) -> Cow<'_, str> {
        match self.search_text.as_deref() {
            Some(text) if !text.trim().is_empty() => Cow::Borrowed(text),
            _ => Cow::Owned(build_search_text(
                self.name.as_deref(),
                self.description.as_deref(),
                &self.category_names,
                self.brand_name.as_deref(),
            )),
        }
    }

    /// Adapt a store API product object
    ///
    /// Prices arrive as strings in minor units under `prices`; `pa_*` taxonomy
    /// attributes become `attr_pa_*` keys holding term slugs, and the brand is
    /// taken from the first `pa_tootja` term.
    pub fn from_store_json(node: &Value) -> Self {
        let text = |v: Option<&Value>| -> Option<String> {
            v.and_then(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        let cents = |v: Option<&Value>| -> Option<i64> {
            v.and_then(|v| match v {
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            })
        };

        let id = text(node.get("id")).map(|id| format!("wc_{id}")).unwrap_or_default();
        let prices = node.get("prices");

        let mut product = RawProduct {
            id,
            product_type: text(node.get("type")),
            sku: text(node.get("sku")),
            slug: text(node.get("slug")),
            name: text(node.get("name")),
            permalink: text(node.get("permalink")),
            description: text(node.get("description")),
            price_cents: cents(prices.and_then(|p| p.get("price"))),
            regular_price_cents: cents(prices.and_then(|p| p.get("regular_price"))),
            sale_price_cents: cents(prices.and_then(|p| p.get("sale_price"))),
            currency: text(prices.and_then(|p| p.get("currency_code"))),
            in_stock: node.get("is_in_stock").and_then(Value::as_bool),
            low_stock_remaining: node.get("low_stock_remaining").and_then(Value::as_i64),
            rating: node.get("average_rating").and_then(|v| match v {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            }),
            review_count: node
                .get("review_count")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
            ..RawProduct::default()
        };

        for image in node.get("images").and_then(Value::as_array).into_iter().flatten() {
            if let Some(src) = text(image.get("src")) {
                product.images.push(src);
            }
        }

        for category in node.get("categories").and_then(Value::as_array).into_iter().flatten() {
            if let Some(id) = category.get("id").and_then(Value::as_i64) {
                product.category_ids.push(id);
            }
            if let Some(slug) = text(category.get("slug")) {
                product.category_slugs.push(slug);
            }
            if let Some(name) = text(category.get("name")) {
                product.category_names.push(name);
            }
        }

        for attribute in node.get("attributes").and_then(Value::as_array).into_iter().flatten() {
            let Some(taxonomy) = text(attribute.get("taxonomy")) else {
                continue;
            };
            if !taxonomy.starts_with("pa_") {
                continue;
            }
            let terms: Vec<&Value> = attribute
                .get("terms")
                .and_then(Value::as_array)
                .map(|t| t.iter().collect())
                .unwrap_or_default();

            if taxonomy == attr_keys::BRAND_TAXONOMY {
                if let Some(first) = terms.first() {
                    product.brand_slug = text(first.get("slug"));
                    product.brand_name = text(first.get("name"));
                }
            }

            let slugs: Vec<String> = terms.iter().filter_map(|t| text(t.get("slug"))).collect();
            if !slugs.is_empty() {
                product
                    .dynamic_attrs
                    .insert(format!("attr_{taxonomy}"), slugs);
            }
        }

        product.search_text = Some(build_search_text(
            product.name.as_deref(),
            product.description.as_deref(),
            &product.category_names,
            product.brand_name.as_deref(),
        ));
        product
    }
}

/// Working record that stage deltas are merged into
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedProduct {
    #[serde(flatten)]
    pub raw: RawProduct,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_weight_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_size_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_per_serving: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_mass_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_serving: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_serving_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_serving_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_100g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_on_sale: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goal_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diet_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients_key: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    /// Field name -> source of the current value
    #[serde(default)]
    pub provenance: BTreeMap<String, Source>,
    /// Field name -> confidence of the current value
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
}

impl ParsedProduct {
    /// Seed the accumulator with a copy of every raw field
    pub fn from_raw(raw: &RawProduct) -> Self {
        Self {
            raw: raw.clone(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.raw.id
    }

    /// Current value of an enriched field
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        let tags = |v: &Vec<String>| (!v.is_empty()).then(|| FieldValue::Tags(v.clone()));
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match field {
            Field::Form => self.form.map(FieldValue::Form),
            Field::Flavor => text(&self.flavor),
            Field::NetWeightG => self.net_weight_g.map(FieldValue::Number),
            Field::Servings => self.servings.map(FieldValue::Count),
            Field::ServingsMin => self.servings_min.map(FieldValue::Count),
            Field::ServingsMax => self.servings_max.map(FieldValue::Count),
            Field::ServingSizeG => self.serving_size_g.map(FieldValue::Number),
            Field::UnitCount => self.unit_count.map(FieldValue::Count),
            Field::UnitsPerServing => self.units_per_serving.map(FieldValue::Count),
            Field::UnitMassG => self.unit_mass_g.map(FieldValue::Number),
            Field::Price => self.price.map(FieldValue::Number),
            Field::PricePerServing => self.price_per_serving.map(FieldValue::Number),
            Field::PricePerServingMin => self.price_per_serving_min.map(FieldValue::Number),
            Field::PricePerServingMax => self.price_per_serving_max.map(FieldValue::Number),
            Field::PricePer100g => self.price_per_100g.map(FieldValue::Number),
            Field::PricePerUnit => self.price_per_unit.map(FieldValue::Number),
            Field::DiscountPct => self.discount_pct.map(FieldValue::Number),
            Field::IsOnSale => self.is_on_sale.map(FieldValue::Flag),
            Field::GoalTags => tags(&self.goal_tags),
            Field::DietTags => tags(&self.diet_tags),
            Field::IngredientsKey => tags(&self.ingredients_key),
            Field::ParentId => text(&self.parent_id),
            Field::VariantGroupId => text(&self.variant_group_id),
            Field::DisplayTitle => text(&self.display_title),
        }
    }

    pub fn is_populated(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    /// Fields that currently hold a value
    pub fn populated_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.is_populated(*f))
            .collect()
    }

    /// Check that a value fits a field without writing it
    pub fn check_field(field: Field, value: &FieldValue) -> Result<(), EnrichError> {
        if field.kind() == value.kind() {
            Ok(())
        } else {
            Err(EnrichError::FieldType {
                field: field.as_str().to_string(),
                expected: field.kind().describe(),
            })
        }
    }

    /// Write one value together with its provenance
    ///
    /// An empty tag list clears the field and its provenance, keeping the
    /// "value iff source tag" pairing intact.
    pub fn apply_field(
        &mut self,
        field: Field,
        value: FieldValue,
        source: Option<Source>,
        confidence: Option<f64>,
    ) -> Result<(), EnrichError> {
        Self::check_field(field, &value)?;
        let cleared = matches!(&value, FieldValue::Tags(tags) if tags.is_empty());

        match (field, value) {
            (Field::Form, FieldValue::Form(v)) => self.form = Some(v),
            (Field::Flavor, FieldValue::Text(v)) => self.flavor = Some(v),
            (Field::ParentId, FieldValue::Text(v)) => self.parent_id = Some(v),
            (Field::VariantGroupId, FieldValue::Text(v)) => self.variant_group_id = Some(v),
            (Field::DisplayTitle, FieldValue::Text(v)) => self.display_title = Some(v),
            (Field::NetWeightG, FieldValue::Number(v)) => self.net_weight_g = Some(v),
            (Field::ServingSizeG, FieldValue::Number(v)) => self.serving_size_g = Some(v),
            (Field::UnitMassG, FieldValue::Number(v)) => self.unit_mass_g = Some(v),
            (Field::Price, FieldValue::Number(v)) => self.price = Some(v),
            (Field::PricePerServing, FieldValue::Number(v)) => self.price_per_serving = Some(v),
            (Field::PricePerServingMin, FieldValue::Number(v)) => {
                self.price_per_serving_min = Some(v)
            }
            (Field::PricePerServingMax, FieldValue::Number(v)) => {
                self.price_per_serving_max = Some(v)
            }
            (Field::PricePer100g, FieldValue::Number(v)) => self.price_per_100g = Some(v),
            (Field::PricePerUnit, FieldValue::Number(v)) => self.price_per_unit = Some(v),
            (Field::DiscountPct, FieldValue::Number(v)) => self.discount_pct = Some(v),
            (Field::Servings, FieldValue::Count(v)) => self.servings = Some(v),
            (Field::ServingsMin, FieldValue::Count(v)) => self.servings_min = Some(v),
            (Field::ServingsMax, FieldValue::Count(v)) => self.servings_max = Some(v),
            (Field::UnitCount, FieldValue::Count(v)) => self.unit_count = Some(v),
            (Field::UnitsPerServing, FieldValue::Count(v)) => self.units_per_serving = Some(v),
            (Field::IsOnSale, FieldValue::Flag(v)) => self.is_on_sale = Some(v),
            (Field::GoalTags, FieldValue::Tags(v)) => self.goal_tags = v,
            (Field::DietTags, FieldValue::Tags(v)) => self.diet_tags = v,
            (Field::IngredientsKey, FieldValue::Tags(v)) => self.ingredients_key = v,
            (field, _) => {
                return Err(EnrichError::FieldType {
                    field: field.as_str().to_string(),
                    expected: field.kind().describe(),
                })
            }
        }

        let key = field.as_str().to_string();
        if cleared {
            self.provenance.remove(&key);
            self.confidence.remove(&key);
            return Ok(());
        }
        match source {
            Some(source) => {
                self.provenance.insert(key.clone(), source);
            }
            None => {
                self.provenance.remove(&key);
            }
        }
        match confidence {
            Some(c) => {
                self.confidence.insert(key, c.clamp(0.0, 1.0));
            }
            None => {
                self.confidence.remove(&key);
            }
        }
        Ok(())
    }

    pub fn source_of(&self, field: Field) -> Option<Source> {
        self.provenance.get(field.as_str()).copied()
    }
}

/// Final record handed to the indexing collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    #[serde(flatten)]
    pub parsed: ParsedProduct,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefit_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faq: Vec<FaqEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub synonyms_multi: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_flags: Vec<SafetyFlag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<AiConflict>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub goal_scores: BTreeMap<String, GoalScore>,
    /// Values the model proposed for empty deterministic fields; never merged into them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_fill: Option<AiFill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_input_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_enrichment_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_version: Option<u32>,
    /// Rendered as `CODE: message`
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl EnrichedProduct {
    pub fn from_parsed(parsed: ParsedProduct, warnings: &[Warn]) -> Self {
        Self {
            parsed,
            warnings: warnings.iter().map(Warn::render).collect(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        self.parsed.id()
    }

    /// Merge an AI augmentation result
    ///
    /// Only UX fields are taken over. Each AI-reported conflict is kept and also
    /// surfaced as a `FIELD_CONFLICT` warning. Returns the added warnings.
    pub fn merge_ai(&mut self, ai: AiEnrichment) -> Vec<Warn> {
        if ai.is_empty() {
            return Vec::new();
        }
        let added: Vec<Warn> = ai
            .conflicts
            .iter()
            .map(|c| {
                let warn = Warn::field_conflict(
                    self.id(),
                    &c.field,
                    &display_value(&c.det_value),
                    &display_value(&c.ai_value),
                );
                match &c.evidence {
                    Some(evidence) => warn.with_evidence(evidence),
                    None => warn,
                }
            })
            .collect();
        self.warnings.extend(added.iter().map(Warn::render));

        self.benefit_snippet = ai.benefit_snippet;
        self.faq = ai.faq;
        self.synonyms_multi = ai.synonyms_multi;
        self.dosage_text = ai.dosage_text;
        self.timing_text = ai.timing_text;
        self.safety_flags = ai.safety_flags;
        self.conflicts = ai.conflicts;
        self.goal_scores = ai.goal_scores;
        self.ai_fill = ai.fill;
        self.ai_input_hash = ai.ai_input_hash;
        self.ai_enrichment_ts = ai.ai_enrichment_ts;
        self.enrichment_version = ai.enrichment_version;
        added
    }
}
