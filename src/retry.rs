//! Failure isolation around remote calls.
//!
//! `CircuitBreaker` stops calling a provider after repeated transient failures
//! and lets a single trial call through once the cooldown has elapsed.
//! `retry_with_backoff` and `with_fallback` are plain async combinators that
//! wrap any fallible operation.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::error::{Result, SegtransError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing, calls are rejected
    Open,
    /// Cooldown elapsed, one trial call in progress
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerState>,
}

/// Admission ticket for one protected call. Releases the half-open trial
/// slot if the call is dropped before it settles.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.inner.lock().trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, config.recovery_timeout())
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// True while calls would be rejected without reaching the provider.
    pub fn is_rejecting(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => !self.cooldown_elapsed(&inner),
            CircuitState::HalfOpen => inner.trial_in_flight,
        }
    }

    /// Run `op` under breaker protection.
    ///
    /// Only transient errors count toward opening the circuit; other errors
    /// pass through without touching the failure count.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut admission = self.admit()?;
        let result = op().await;
        admission.settled = true;

        match &result {
            Ok(_) => self.on_success(admission.trial),
            Err(e) if e.is_transient() => self.on_failure(),
            Err(_) => {
                if admission.trial {
                    self.inner.lock().trial_in_flight = false;
                }
            }
        }
        result
    }

    fn cooldown_elapsed(&self, inner: &BreakerState) -> bool {
        inner
            .last_failure_time
            .map_or(true, |at| at.elapsed() >= self.recovery_timeout)
    }

    fn admit(&self) -> Result<Admission<'_>> {
        let mut inner = self.inner.lock();
        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if !self.cooldown_elapsed(&inner) {
                    return Err(SegtransError::CircuitOpen);
                }
                info!("Circuit breaker entering HALF_OPEN state");
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(SegtransError::CircuitOpen);
                }
                inner.trial_in_flight = true;
                true
            }
        };

        Ok(Admission {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Only the half-open trial may close the circuit. A success from a call
    /// admitted before the circuit opened leaves the state alone.
    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            _ if trial => {
                info!("Circuit breaker recovered, entering CLOSED state");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
            }
            _ => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::HalfOpen => {
                warn!("Circuit breaker trial call failed, re-opening");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.failure_threshold => {
                error!("Circuit breaker OPEN after {} failures", inner.failure_count);
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }
}

/// Exponential backoff schedule for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    /// Delay before the retry that follows `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }
}

/// Retry `op` on retryable errors with exponential backoff.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                error!("Non-recoverable error in {}: {}", operation, e);
                return Err(e);
            }
            Err(e) if attempt >= policy.max_attempts => {
                if policy.max_attempts > 1 {
                    error!("Max retries ({}) exceeded for {}", policy.max_attempts, operation);
                }
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {:.2}s...",
                    attempt,
                    policy.max_attempts,
                    operation,
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Await `fut`, substituting `fallback` on any error.
pub async fn with_fallback<Fut, T>(fut: Fut, fallback: T, operation: &str) -> T
where
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => value,
        Err(e) => {
            warn!("{} failed, returning fallback value: {}", operation, e);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> SegtransError {
        SegtransError::RemoteUnavailable("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        let calls = &AtomicU32::new(0);

        for _ in 0..5 {
            let result: Result<()> = breaker
                .call(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let result: Result<()> = breaker
            .call(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SegtransError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(breaker.is_rejecting());
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new(2, Duration::from_millis(40));
        for _ in 0..2 {
            let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!breaker.is_rejecting());

        let result = breaker.call(|| async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(30));
        let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // Cooldown restarts from the failed trial
        let result: Result<()> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(SegtransError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_non_transient_errors_do_not_count() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let result: Result<()> = breaker
            .call(|| async { Err(SegtransError::UnsupportedLanguage("xx".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        }
        assert_eq!(breaker.failure_count(), 2);
        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.call(|| async move {
            let _ = release_rx.await;
            Ok(())
        });
        let competitor = async {
            tokio::task::yield_now().await;
            let result: Result<()> = breaker.call(|| async { Ok(()) }).await;
            let _ = release_tx.send(());
            result
        };

        let (trial_result, competitor_result) = tokio::join!(trial, competitor);
        assert!(trial_result.is_ok());
        assert!(matches!(competitor_result, Err(SegtransError::CircuitOpen)));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_late_success_keeps_circuit_open() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let slow = breaker.call(|| async move {
            let _ = release_rx.await;
            Ok(())
        });
        let failing = async {
            tokio::task::yield_now().await;
            let result: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
            let _ = release_tx.send(());
            result
        };

        let (slow_result, failing_result) = tokio::join!(slow, failing);
        assert!(slow_result.is_ok());
        assert!(failing_result.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.failure_count(), 1);
        assert!(breaker.is_rejecting());
    }

    #[tokio::test]
    async fn test_dropped_trial_releases_slot() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        let _: Result<()> = breaker.call(|| async { Err(unavailable()) }).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        {
            let pending = breaker.call(|| std::future::pending::<Result<()>>());
            let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.is_rejecting());
        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            exponential_base: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
        };
        let calls = &AtomicU32::new(0);
        let result = retry_with_backoff(&policy, "flaky", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_and_skips_permanent_errors() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            exponential_base: 1.0,
        };
        let calls = &AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&policy, "down", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let permanent_errors: [fn() -> SegtransError; 2] = [
            || SegtransError::UnsupportedLanguage("xx".into()),
            || SegtransError::RemoteRejected("400 Bad Request".into()),
        ];
        for permanent in permanent_errors {
            let calls = &AtomicU32::new(0);
            let result: Result<()> = retry_with_backoff(&policy, "invalid", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(permanent())
            })
            .await;
            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_with_fallback() {
        let healthy = with_fallback(async { Ok(true) }, false, "probe").await;
        assert!(healthy);
        let unhealthy = with_fallback(async { Err(unavailable()) }, false, "probe").await;
        assert!(!unhealthy);
    }
}
