//! # AI Augmentation Module
//!
//! Optional lane that asks a chat-completion model for UX copy, goal scores,
//! safety flags and conflicts. Results are cached by content hash and every
//! call goes through one shared [`RateLimiter`].
//!
//! The lane only feeds UX fields of [`crate::product_model::EnrichedProduct`];
//! deterministic stages never read its output.

pub mod cache;
pub mod enricher;
pub mod model;
pub mod rate_limiter;
pub mod token_accounting;
pub mod transport;

pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use enricher::AiEnricher;
pub use model::{AiEnrichment, TokenUsage};
pub use rate_limiter::RateLimiter;
pub use token_accounting::{TokenAccounting, UsageSink};
pub use transport::{ChatRequest, ChatTransport, OpenAiTransport};
