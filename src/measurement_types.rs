//! # Measurement Types Module
//!
//! This module defines the value types produced when scanning catalog text for
//! weights, volumes and unit counts.

/// Unit attached to a mass or volume reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureUnit {
    Milligram,
    Gram,
    Kilogram,
    Millilitre,
    Litre,
}

impl MeasureUnit {
    /// Parse a unit token (`mg`, `g`, `gramm`, `kg`, `ml`, `l`), case-insensitive
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "mg" => Some(MeasureUnit::Milligram),
            "g" | "gr" | "gramm" | "grammi" | "grams" | "gram" => Some(MeasureUnit::Gram),
            "kg" => Some(MeasureUnit::Kilogram),
            "ml" => Some(MeasureUnit::Millilitre),
            "l" => Some(MeasureUnit::Litre),
            _ => None,
        }
    }

    /// Convert to grams; volumes are treated as 1 ml = 1 g
    pub fn to_grams(&self, value: f64) -> f64 {
        match self {
            MeasureUnit::Milligram => value / 1000.0,
            MeasureUnit::Gram | MeasureUnit::Millilitre => value,
            MeasureUnit::Kilogram | MeasureUnit::Litre => value * 1000.0,
        }
    }
}

/// A detected mass/volume reading in text
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementMatch {
    /// The matched text (e.g. "2,5 kg")
    pub text: String,
    /// Numeric value as written
    pub value: f64,
    pub unit: MeasureUnit,
    /// Byte offset where the match starts
    pub start: usize,
    /// Byte offset where the match ends
    pub end: usize,
}

impl MeasurementMatch {
    pub fn grams(&self) -> f64 {
        self.unit.to_grams(self.value)
    }
}

/// A detected count of discrete units ("60 softgels")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatch {
    pub text: String,
    pub count: u32,
    pub start: usize,
    pub end: usize,
}
