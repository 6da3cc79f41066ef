use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SegtransError};
use crate::retry::{retry_with_backoff, RetryPolicy};
use super::backend::TranslationBackend;

#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    pub q: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub format: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// HTTP client for a LibreTranslate-compatible provider.
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.translate.endpoint, RetryPolicy::from_config(&config.retry))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_request_error(&self, e: reqwest::Error, timeout: Duration) -> SegtransError {
        if e.is_timeout() {
            SegtransError::RemoteUnavailable(format!("timeout after {:.1}s", timeout.as_secs_f64()))
        } else if e.is_connect() {
            SegtransError::RemoteUnavailable(format!("connection failed: {}", self.base_url))
        } else if e.is_request() {
            SegtransError::RemoteUnavailable(format!("request failed: {}", e))
        } else {
            SegtransError::RemoteRejected(format!("request failed: {}", e))
        }
    }

    /// 429 and 5xx are worth another attempt, any other status is final.
    fn status_error(status: StatusCode, body: &str) -> SegtransError {
        let preview: String = body.chars().take(200).collect();
        let message = format!("API error {}: {}", status, preview);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            SegtransError::RemoteUnavailable(message)
        } else {
            SegtransError::RemoteRejected(message)
        }
    }

    async fn translate_once(&self, text: &str, source: &str, target: &str, timeout: Duration) -> Result<String> {
        let url = self.url("translate");
        let request = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
        };

        debug!("Sending translation request to: {} ({} chars)", url, text.len());

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| SegtransError::RemoteRejected(format!("Failed to parse response: {}", e)))?;

        let translated = parsed.translated_text.trim();
        if translated.is_empty() {
            return Err(SegtransError::RemoteRejected("Empty translation returned".to_string()));
        }
        Ok(translated.to_string())
    }

    async fn languages_once(&self, timeout: Duration) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("languages"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.map_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        let entries: Vec<LanguageEntry> = response
            .json()
            .await
            .map_err(|e| SegtransError::RemoteRejected(format!("Failed to parse languages: {}", e)))?;
        Ok(entries.into_iter().map(|entry| entry.code).collect())
    }
}

#[async_trait]
impl TranslationBackend for LibreTranslateClient {
    async fn translate(&self, text: &str, source: &str, target: &str, timeout: Duration) -> Result<String> {
        retry_with_backoff(&self.retry, "translate", || {
            self.translate_once(text, source, target, timeout)
        })
        .await
    }

    async fn languages(&self, timeout: Duration) -> Result<Vec<String>> {
        match self.languages_once(timeout).await {
            Ok(codes) => {
                info!("Translation provider at {} is healthy ({} languages)", self.base_url, codes.len());
                Ok(codes)
            }
            Err(e) => {
                warn!("Translation provider health check failed: {}", e);
                Err(e)
            }
        }
    }
}
