//! Strategy execution against the remote provider.
//!
//! `translate_unique` never fails: a corrupted delimiter batch rotates through
//! the alternative delimiters, then falls back to one call per text, and any
//! text that still cannot be translated is passed through unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SegtransError;
use crate::retry::CircuitBreaker;
use crate::subtitle::Segment;
use super::backend::TranslationBackend;
use super::cache::TranslationCache;
use super::fingerprint::Fingerprint;
use super::strategy::{BatchStrategy, StrategySelector};

/// Sentinels used to join texts into one request, in order of preference.
pub const DELIMITERS: [&str; 3] = [
    "\n<|SEGMENT|>\n",
    "\n###SEG###\n",
    "\n|||SEG|||\n",
];

/// Where a single translation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleOutcome {
    Cached(String),
    Translated(String),
    /// Provider unavailable, the input text is returned as-is
    Passthrough(String),
}

impl SingleOutcome {
    pub fn into_text(self) -> String {
        match self {
            Self::Cached(text) | Self::Translated(text) | Self::Passthrough(text) => text,
        }
    }
}

pub struct BatchTranslator {
    backend: Arc<dyn TranslationBackend>,
    cache: Arc<TranslationCache>,
    selector: StrategySelector,
    breaker: CircuitBreaker,
    request_timeout: Duration,
    per_segment_timeout: Duration,
    max_concurrent_requests: usize,
}

impl BatchTranslator {
    pub fn new(backend: Arc<dyn TranslationBackend>, cache: Arc<TranslationCache>, config: &Config) -> Self {
        Self {
            backend,
            cache,
            selector: StrategySelector::new(),
            breaker: CircuitBreaker::from_config(&config.circuit_breaker),
            request_timeout: config.translate.request_timeout(),
            per_segment_timeout: config.translate.per_segment_timeout(),
            max_concurrent_requests: config.translate.max_concurrent_requests.max(1),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Translate unique segments, returning exactly one segment per input in
    /// the same order.
    ///
    /// Callers look `unique_segments` up in the cache first; the lookups made
    /// here do not count toward the cache stats.
    pub async fn translate_unique(&self, unique_segments: &[Segment], source: &str, target: &str) -> Vec<Segment> {
        if unique_segments.is_empty() {
            return Vec::new();
        }

        let strategy = if self.breaker.is_rejecting() {
            BatchStrategy::CachedOnly
        } else {
            self.selector.get_best_strategy(source, target, unique_segments.len())
        };

        info!(
            "Strategy: {} for {} segments ({}->{})",
            strategy,
            unique_segments.len(),
            source,
            target
        );

        match strategy {
            BatchStrategy::Delimiter if unique_segments.len() > 1 => {
                match self.translate_delimited(unique_segments, source, target).await {
                    Some(translated) => translated,
                    None => {
                        warn!("Delimiter batch failed, falling back to individual");
                        self.translate_individually(unique_segments, source, target).await
                    }
                }
            }
            BatchStrategy::Delimiter | BatchStrategy::Individual => {
                self.translate_individually(unique_segments, source, target).await
            }
            BatchStrategy::CachedOnly => {
                warn!("Circuit breaker is open, serving {}->{} from cache only", source, target);
                self.serve_from_cache(unique_segments, source, target)
            }
        }
    }

    /// Translate one text with cache lookup, breaker protection and
    /// passthrough on failure.
    pub async fn translate_single(&self, text: &str, source: &str, target: &str) -> String {
        self.translate_single_outcome(text, source, target).await.into_text()
    }

    pub async fn translate_single_outcome(&self, text: &str, source: &str, target: &str) -> SingleOutcome {
        self.translate_text(text, source, target, true).await
    }

    /// `count_lookup` is off when the caller already recorded a miss for this
    /// text, so a single request never counts twice in the cache stats.
    async fn translate_text(&self, text: &str, source: &str, target: &str, count_lookup: bool) -> SingleOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() || source == target {
            return SingleOutcome::Passthrough(text.to_string());
        }

        let fingerprint = Fingerprint::new(trimmed, source, target);
        let cached = if count_lookup {
            self.cache.get(&fingerprint)
        } else {
            self.cache.peek(&fingerprint)
        };
        if let Some(cached) = cached {
            debug!("Cache hit: {}", fingerprint);
            return SingleOutcome::Cached(cached);
        }

        let result = self
            .breaker
            .call(|| self.backend.translate(trimmed, source, target, self.request_timeout))
            .await;

        match result {
            Ok(translated) => {
                self.cache.set(fingerprint, translated.clone());
                SingleOutcome::Translated(translated)
            }
            Err(e) => {
                warn!(
                    "Translation failed for {}->{} ({} chars, strategy={}), using original: {}",
                    source,
                    target,
                    trimmed.len(),
                    BatchStrategy::Individual,
                    e
                );
                SingleOutcome::Passthrough(text.to_string())
            }
        }
    }

    /// One remote call for the whole batch. `None` means the caller must
    /// fall back to a more conservative strategy.
    async fn translate_delimited(&self, unique_segments: &[Segment], source: &str, target: &str) -> Option<Vec<Segment>> {
        let texts: Vec<&str> = unique_segments.iter().map(|s| s.text.trim()).collect();
        let timeout = self
            .request_timeout
            .max(self.per_segment_timeout * texts.len() as u32);

        for (delimiter_idx, &delimiter) in DELIMITERS.iter().enumerate() {
            let combined = texts.join(delimiter);
            let started = Instant::now();
            let result = self
                .breaker
                .call(|| self.backend.translate(&combined, source, target, timeout))
                .await;
            let latency = started.elapsed();

            let translated = match result {
                Ok(translated) => translated,
                Err(e) => {
                    warn!(
                        "Delimiter batch failed for {}->{} ({} segments, {} chars, strategy={}): {}",
                        source,
                        target,
                        texts.len(),
                        combined.len(),
                        BatchStrategy::Delimiter,
                        e
                    );
                    if e.is_transient() {
                        self.selector
                            .record_attempt(source, target, BatchStrategy::Delimiter, false, latency, false);
                    }
                    return None;
                }
            };

            let parts: Vec<&str> = translated.split(delimiter).map(str::trim).collect();
            if parts.len() != texts.len() || parts.iter().any(|part| part.is_empty()) {
                let corruption = SegtransError::BatchCorruption {
                    expected: texts.len(),
                    actual: parts.iter().filter(|part| !part.is_empty()).count(),
                };
                warn!("{} with delimiter #{}", corruption, delimiter_idx);
                self.selector
                    .record_attempt(source, target, BatchStrategy::Delimiter, false, latency, true);
                if delimiter_idx + 1 < DELIMITERS.len() {
                    info!("Retrying with delimiter #{}", delimiter_idx + 1);
                }
                continue;
            }

            self.selector
                .record_attempt(source, target, BatchStrategy::Delimiter, true, latency, false);

            let translated_segments = unique_segments
                .iter()
                .zip(texts.iter().zip(parts))
                .map(|(segment, (text, part))| {
                    self.cache
                        .set(Fingerprint::new(text, source, target), part.to_string());
                    segment.with_text(part)
                })
                .collect();
            return Some(translated_segments);
        }

        None
    }

    /// One remote call per text, bounded concurrency, order preserved.
    async fn translate_individually(&self, unique_segments: &[Segment], source: &str, target: &str) -> Vec<Segment> {
        let started = Instant::now();

        let translated: Vec<Segment> = stream::iter(unique_segments.iter().cloned())
            .map(|segment| async move {
                let text = self.translate_text(&segment.text, source, target, false).await.into_text();
                segment.with_text(text)
            })
            .buffered(self.max_concurrent_requests)
            .collect()
            .await;

        self.selector.record_attempt(
            source,
            target,
            BatchStrategy::Individual,
            true,
            started.elapsed(),
            false,
        );

        translated
    }

    fn serve_from_cache(&self, unique_segments: &[Segment], source: &str, target: &str) -> Vec<Segment> {
        unique_segments
            .iter()
            .map(|segment| {
                let fingerprint = Fingerprint::new(&segment.text, source, target);
                match self.cache.peek(&fingerprint) {
                    Some(cached) => segment.with_text(cached),
                    None => segment.clone(),
                }
            })
            .collect()
    }
}
