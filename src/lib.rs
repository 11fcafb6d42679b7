//! # Catalog Enrichment
//!
//! Turns raw supplement-store catalog records into normalized, search-ready
//! records: canonical form and flavor, weight/serving/price metrics, goal and
//! diet tags, variant grouping keys and a display title. Every value carries
//! its source and confidence, and contradictions are reported as warnings.
//!
//! An optional AI lane adds UX copy and goal scores behind a content-hash
//! cache and a shared rate limiter.

pub mod ai;
pub mod batch;
pub mod config;
pub mod enrichment;
pub mod enrichment_errors;
pub mod measurement_patterns;
pub mod measurement_types;
pub mod product_model;
pub mod text_processing;
