// Adaptive translation pipeline
//
// Leaf components, bottom-up:
// - fingerprint: content keys for (text, source, target)
// - cache: bounded LRU of confirmed translations
// - dedup: collapse segments to unique text and expand results back
// - strategy: per language pair strategy scoring
// - batch: strategy execution with the delimiter -> individual -> cache cascade
// - libre: HTTP provider client

pub mod backend;
pub mod batch;
pub mod cache;
pub mod dedup;
pub mod fingerprint;
pub mod languages;
pub mod libre;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::TranslationBackend;
pub use batch::{BatchTranslator, SingleOutcome, DELIMITERS};
pub use cache::{CacheStats, TranslationCache};
pub use dedup::{deduplicate, reconstruct};
pub use fingerprint::Fingerprint;
pub use languages::{is_supported, language_name, SUPPORTED_LANGUAGES};
pub use libre::LibreTranslateClient;
pub use strategy::{BatchStrategy, StrategyMetrics, StrategyReport, StrategySelector};
