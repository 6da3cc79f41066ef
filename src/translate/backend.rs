use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Remote machine-translation provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `text`, giving up after `timeout`.
    ///
    /// Connection failures, timeouts, non-success statuses and empty results
    /// are all reported as transient errors. Only connection failures,
    /// timeouts, 429 and 5xx are retryable.
    async fn translate(&self, text: &str, source: &str, target: &str, timeout: Duration) -> Result<String>;

    /// Language codes the provider advertises. Used as an availability probe.
    async fn languages(&self, timeout: Duration) -> Result<Vec<String>>;
}
