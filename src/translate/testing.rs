//! Deterministic in-process provider for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SegtransError};
use crate::subtitle::Segment;
use super::backend::TranslationBackend;

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

pub(crate) struct ScriptedBackend {
    respond: Responder,
    healthy: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new(respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            healthy: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn uppercase() -> Self {
        Self::new(|text| Ok(text.to_uppercase()))
    }

    pub(crate) fn failing() -> Self {
        let mut backend = Self::new(|_| Err(SegtransError::RemoteUnavailable("connection refused".to_string())));
        backend.healthy = false;
        backend
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TranslationBackend for ScriptedBackend {
    async fn translate(&self, text: &str, _source: &str, _target: &str, _timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(text.to_string());
        (self.respond)(text)
    }

    async fn languages(&self, _timeout: Duration) -> Result<Vec<String>> {
        if self.healthy {
            Ok(vec!["en".to_string(), "es".to_string()])
        } else {
            Err(SegtransError::RemoteUnavailable("connection refused".to_string()))
        }
    }
}

pub(crate) fn seg(start: f64, text: &str) -> Segment {
    Segment::new(start, start + 1.0, text)
}
