use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegtransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unsupported target language: {0}")]
    UnsupportedLanguage(String),

    #[error("Translation provider unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Translation provider rejected the request: {0}")]
    RemoteRejected(String),

    #[error("Batch corrupted: expected {expected} segments, got {actual}")]
    BatchCorruption { expected: usize, actual: usize },

    #[error("Circuit breaker is open - translation provider unavailable")]
    CircuitOpen,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl SegtransError {
    /// Whether the failure counts against the circuit breaker.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::RemoteRejected(_) | Self::Http(_))
    }

    /// Whether repeating the same request may succeed: connection failures,
    /// timeouts, 429 and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteUnavailable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SegtransError>;
