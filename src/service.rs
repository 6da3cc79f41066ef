use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SegtransError};
use crate::retry::{with_fallback, CircuitState};
use crate::subtitle::Segment;
use crate::translate::{
    deduplicate, is_supported, language_name, reconstruct, BatchTranslator, CacheStats, Fingerprint,
    LibreTranslateClient, SingleOutcome, StrategyReport, TranslationBackend, TranslationCache,
    SUPPORTED_LANGUAGES,
};

/// Snapshot of pipeline counters for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub available: bool,
    pub total_segments: u64,
    pub unique_segments: u64,
    pub cache_hits: u64,
    pub total_time_secs: f64,
    /// Segments per second across all `translate_segments` calls
    pub avg_throughput: f64,
    /// Unique over total segments, 1.0 before any traffic
    pub dedup_ratio: f64,
    pub cache: CacheStats,
    pub circuit_state: CircuitState,
    pub strategies: Vec<StrategyReport>,
}

#[derive(Debug, Clone, Default)]
struct Counters {
    total_segments: u64,
    unique_segments: u64,
    cache_hits: u64,
    total_time: Duration,
}

pub struct TranslationService {
    config: Config,
    backend: Arc<dyn TranslationBackend>,
    cache: Arc<TranslationCache>,
    translator: BatchTranslator,
    available: AtomicBool,
    counters: Mutex<Counters>,
}

impl TranslationService {
    /// Build a service around an existing provider. Performs no I/O.
    pub fn new(config: Config, backend: Arc<dyn TranslationBackend>) -> Self {
        let cache = Arc::new(TranslationCache::new(config.cache.capacity));
        let translator = BatchTranslator::new(Arc::clone(&backend), Arc::clone(&cache), &config);

        Self {
            config,
            backend,
            cache,
            translator,
            available: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Build a service talking to the configured LibreTranslate endpoint and
    /// probe it once. An unreachable provider is reported, not fatal.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let client = LibreTranslateClient::from_config(&config)?;
        let service = Self::new(config, Arc::new(client));

        let healthy = service.probe_health().await;
        info!("TranslationService initialized: {}", service.endpoint());
        info!("   Cache capacity: {}", service.cache.capacity());
        info!("   Supported languages: {}", SUPPORTED_LANGUAGES.len());
        if !healthy {
            warn!("Translation provider unavailable, segments will pass through untranslated until it recovers");
        }

        Ok(service)
    }

    /// Ask the provider for its language list and record the outcome.
    pub async fn probe_health(&self) -> bool {
        let timeout = self.config.translate.health_timeout();
        let probe = async {
            let codes = self.backend.languages(timeout).await?;
            Ok::<_, SegtransError>(!codes.is_empty())
        };
        let healthy = with_fallback(probe, false, "Translation provider health check").await;
        self.available.store(healthy, Ordering::SeqCst);
        healthy
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> &str {
        &self.config.translate.endpoint
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supported_languages(&self) -> &'static [(&'static str, &'static str)] {
        SUPPORTED_LANGUAGES
    }

    /// Display name for a language code, or the code itself when unknown.
    pub fn language_name<'a>(&self, code: &'a str) -> &'a str {
        language_name(code)
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn translator(&self) -> &BatchTranslator {
        &self.translator
    }

    fn ensure_supported(target: &str) -> Result<()> {
        if is_supported(target) {
            Ok(())
        } else {
            Err(SegtransError::UnsupportedLanguage(target.to_string()))
        }
    }

    /// Translate a single string. Only an unsupported target is an error;
    /// provider trouble yields the input text.
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() || source == target {
            return Ok(text.to_string());
        }
        Self::ensure_supported(target)?;

        let outcome = self.translator.translate_single_outcome(text, source, target).await;
        if matches!(outcome, SingleOutcome::Cached(_)) {
            self.counters.lock().cache_hits += 1;
        }
        Ok(outcome.into_text())
    }

    /// Translate a segment list, returning exactly one segment per input in
    /// input order with timing untouched.
    pub async fn translate_segments(&self, segments: &[Segment], source: &str, target: &str) -> Result<Vec<Segment>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        if source == target {
            return Ok(segments.to_vec());
        }
        Self::ensure_supported(target)?;

        let started = Instant::now();
        let total = segments.len();
        info!("Translating {} segments: {} -> {}", total, source, target);

        let (unique_segments, text_to_indices) = deduplicate(segments);
        let unique_count = unique_segments.len();

        let mut translations: HashMap<String, String> = HashMap::new();
        let mut to_translate = Vec::new();
        for segment in &unique_segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            match self.cache.get(&Fingerprint::new(text, source, target)) {
                Some(cached) => {
                    translations.insert(text.to_string(), cached);
                }
                None => to_translate.push(segment.clone()),
            }
        }

        let cache_hit_count = translations.len();
        if cache_hit_count > 0 {
            info!(
                "Cache hits: {}/{} ({:.1}%)",
                cache_hit_count,
                unique_count,
                cache_hit_count as f64 / unique_count as f64 * 100.0
            );
        }

        if !to_translate.is_empty() {
            let translated = self.translator.translate_unique(&to_translate, source, target).await;
            for (original, result) in to_translate.iter().zip(translated) {
                // Untranslated texts are left out so every occurrence keeps its own text
                if result.text != original.text {
                    translations.insert(original.text.trim().to_string(), result.text);
                }
            }
        }

        let result = reconstruct(segments, &text_to_indices, &translations);

        let elapsed = started.elapsed();
        {
            let mut counters = self.counters.lock();
            counters.total_segments += total as u64;
            counters.unique_segments += unique_count as u64;
            counters.cache_hits += cache_hit_count as u64;
            counters.total_time += elapsed;
        }

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { total as f64 / secs } else { 0.0 };
        info!(
            "Translation complete: {} segments in {:.2}s ({:.1} seg/s)",
            total, secs, throughput
        );
        info!(
            "   Stats: {} unique, {} cached ({:.1}% dedup efficiency)",
            unique_count,
            cache_hit_count,
            (total - unique_count) as f64 / total as f64 * 100.0
        );

        Ok(result)
    }

    pub fn metrics(&self) -> ServiceMetrics {
        let counters = self.counters.lock().clone();
        let total_time_secs = counters.total_time.as_secs_f64();

        ServiceMetrics {
            available: self.is_available(),
            total_segments: counters.total_segments,
            unique_segments: counters.unique_segments,
            cache_hits: counters.cache_hits,
            total_time_secs,
            avg_throughput: if total_time_secs > 0.0 {
                counters.total_segments as f64 / total_time_secs
            } else {
                0.0
            },
            dedup_ratio: if counters.total_segments > 0 {
                counters.unique_segments as f64 / counters.total_segments as f64
            } else {
                1.0
            },
            cache: self.cache.stats(),
            circuit_state: self.translator.breaker().state(),
            strategies: self.translator.selector().reports(),
        }
    }
}
