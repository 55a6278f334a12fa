// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry policy for directory API calls.
//!
//! The directory API is rate limited and returns transient 429/5xx responses.
//! Failed attempts are retried with exponential backoff plus additive random
//! jitter so that many concurrent admin sessions do not retry in lockstep.
//!
//! # Delay Formula
//!
//! After failed attempt `n` (1-based), before attempt `n + 1`:
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + uniform(0, max_jitter)
//! ```
//!
//! A `Retry-After` hint on the error raises the delay to at least the hint,
//! still capped at `max_delay`.
//!
//! After `max_attempts` attempts the last error propagates to the caller.
//! Errors that report themselves as non-retryable propagate immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use rolegate_core::retry::{RetryConfig, RetryPolicy};
//!
//! let policy = RetryPolicy::exponential(RetryConfig::default());
//! let result = policy.execute(|| async {
//!     directory.is_super_admin(&token, "user-1").await
//! }).await;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, DirectoryError};

// =============================================================================
// Retryable
// =============================================================================

/// Errors that know whether another attempt may succeed.
pub trait Retryable {
    /// Returns `true` if the failure is transient.
    fn is_retryable(&self) -> bool;

    /// Short error label for logging.
    fn error_type(&self) -> &'static str;

    /// Minimum wait requested by the server.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for DirectoryError {
    fn is_retryable(&self) -> bool {
        DirectoryError::is_retryable(self)
    }

    fn error_type(&self) -> &'static str {
        DirectoryError::error_type(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        DirectoryError::retry_after(self)
    }
}

impl Retryable for AuthError {
    fn is_retryable(&self) -> bool {
        AuthError::is_retryable(self)
    }

    fn error_type(&self) -> &'static str {
        AuthError::error_type(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        AuthError::retry_after(self)
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Configuration for retry strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry.
    #[serde(default = "default_base_delay", with = "duration_millis")]
    pub base_delay: Duration,

    /// Upper bound of the uniformly random jitter added to every delay.
    #[serde(default = "default_max_jitter", with = "duration_millis")]
    pub max_jitter: Duration,

    /// Cap on the exponential part of the delay.
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_jitter: default_max_jitter(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Sets the total number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the jitter bound.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Sets the cap on the exponential delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Retry Decision
// =============================================================================

/// Decision on whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Do not retry, return the error.
    DoNotRetry,
}

// =============================================================================
// Retry Strategy Trait
// =============================================================================

/// A strategy for deciding when and how long to wait before retrying.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    /// Returns the name of this strategy for logging.
    fn name(&self) -> &str;

    /// Decides what to do after `attempt` (1-based) failed with `error`.
    fn should_retry(&self, error: &dyn Retryable, attempt: u32) -> RetryDecision;
}

// =============================================================================
// No Retry Strategy
// =============================================================================

/// A strategy that never retries.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl NoRetry {
    /// Creates a new no-retry strategy.
    pub fn new() -> Self {
        Self
    }
}

impl RetryStrategy for NoRetry {
    fn name(&self) -> &str {
        "no_retry"
    }

    fn should_retry(&self, _error: &dyn Retryable, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

// =============================================================================
// Exponential Backoff Strategy
// =============================================================================

/// Exponentially increasing delays with additive jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// The deterministic part of the delay after failed attempt `attempt`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base_ms = self.config.base_delay.as_millis() as u64;
        let scaled = base_ms.saturating_mul(1u64 << exponent);
        let capped = scaled.min(self.config.max_delay.as_millis() as u64);

        Duration::from_millis(capped)
    }

    fn jitter(&self) -> Duration {
        let bound = self.config.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential_backoff"
    }

    fn should_retry(&self, error: &dyn Retryable, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_attempts.max(1) {
            return RetryDecision::DoNotRetry;
        }

        if !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }

        let delay = self.calculate_delay(attempt) + self.jitter();
        // Retry-After is a floor, still bounded by max_delay
        match error.retry_after() {
            Some(hint) => RetryDecision::Retry(delay.max(hint.min(self.config.max_delay))),
            None => RetryDecision::Retry(delay),
        }
    }
}

// =============================================================================
// Retry Metrics
// =============================================================================

/// Counters for retried operations.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    total_operations: AtomicU64,
    first_try_success: AtomicU64,
    retry_success: AtomicU64,
    exhausted: AtomicU64,
    total_retries: AtomicU64,
}

impl RetryMetrics {
    /// Creates new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful first-try operation.
    pub fn record_first_try_success(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.first_try_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful operation after retries.
    pub fn record_retry_success(&self, retries: u32) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.retry_success.fetch_add(1, Ordering::Relaxed);
        self.total_retries.fetch_add(retries as u64, Ordering::Relaxed);
    }

    /// Records an operation that gave up.
    pub fn record_exhausted(&self, retries: u32) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        self.total_retries.fetch_add(retries as u64, Ordering::Relaxed);
    }

    /// Returns a snapshot of the metrics.
    pub fn snapshot(&self) -> RetryMetricsSnapshot {
        let total = self.total_operations.load(Ordering::Relaxed);
        let first_success = self.first_try_success.load(Ordering::Relaxed);
        let retry_success = self.retry_success.load(Ordering::Relaxed);

        let success_rate = if total > 0 {
            (first_success + retry_success) as f64 / total as f64
        } else {
            0.0
        };

        RetryMetricsSnapshot {
            total_operations: total,
            first_try_success: first_success,
            retry_success,
            exhausted: self.exhausted.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            success_rate,
        }
    }
}

/// A snapshot of retry metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryMetricsSnapshot {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that succeeded on first try.
    pub first_try_success: u64,
    /// Operations that succeeded after retry.
    pub retry_success: u64,
    /// Operations that gave up.
    pub exhausted: u64,
    /// Total retries across all operations.
    pub total_retries: u64,
    /// Overall success rate (0.0 to 1.0).
    pub success_rate: f64,
}

// =============================================================================
// Retry Observer
// =============================================================================

/// Hook called whenever a retry is scheduled.
pub trait RetryObserver: Send + Sync {
    /// Called after attempt `attempt` failed and before sleeping `delay`.
    fn on_retry(&self, attempt: u32, delay: Duration, error_type: &'static str);
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Runs operations under a [`RetryStrategy`], recording metrics.
#[derive(Clone)]
pub struct RetryPolicy {
    strategy: Arc<dyn RetryStrategy>,
    metrics: Arc<RetryMetrics>,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Creates a policy from any strategy.
    pub fn new(strategy: Arc<dyn RetryStrategy>) -> Self {
        Self {
            strategy,
            metrics: Arc::new(RetryMetrics::new()),
            observer: None,
        }
    }

    /// Attaches an observer notified of every scheduled retry.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Exponential backoff with the given configuration.
    pub fn exponential(config: RetryConfig) -> Self {
        Self::new(Arc::new(ExponentialBackoff::new(config)))
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(Arc::new(NoRetry::new()))
    }

    /// Returns the metrics.
    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }

    /// Returns the strategy name.
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Executes `operation`, retrying failures the strategy accepts.
    ///
    /// `operation` is called once per attempt and must build a fresh future
    /// each time. The last error is returned once the strategy gives up.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt == 1 {
                        self.metrics.record_first_try_success();
                    } else {
                        self.metrics.record_retry_success(attempt - 1);
                    }
                    return Ok(value);
                }
                Err(error) => match self.strategy.should_retry(&error, attempt) {
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(
                            strategy = %self.strategy.name(),
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying operation"
                        );
                        if let Some(observer) = &self.observer {
                            observer.on_retry(attempt, delay, error.error_type());
                        }
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry => {
                        self.metrics.record_exhausted(attempt - 1);
                        tracing::debug!(
                            strategy = %self.strategy.name(),
                            attempts = attempt,
                            error_type = error.error_type(),
                            retryable = error.is_retryable(),
                            "Giving up on operation"
                        );
                        return Err(error);
                    }
                },
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(RetryConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.max_jitter, Duration::from_millis(1000));
    }

    #[test]
    fn test_exponential_delays_without_jitter() {
        let strategy = ExponentialBackoff::new(
            RetryConfig::default().with_max_jitter(Duration::ZERO),
        );

        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_exponential_delay_caps_at_max() {
        let strategy = ExponentialBackoff::new(
            RetryConfig::default()
                .with_max_delay(Duration::from_millis(1500))
                .with_max_jitter(Duration::ZERO),
        );
        assert_eq!(strategy.calculate_delay(10), Duration::from_millis(1500));
        assert_eq!(strategy.calculate_delay(64), Duration::from_millis(1500));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let strategy = ExponentialBackoff::default();
        let error = DirectoryError::rate_limited();

        for _ in 0..100 {
            match strategy.should_retry(&error, 1) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= Duration::from_millis(1000));
                    assert!(delay < Duration::from_millis(2000));
                }
                RetryDecision::DoNotRetry => panic!("expected retry"),
            }
        }
    }

    #[test]
    fn test_non_retryable_errors_stop_immediately() {
        let strategy = ExponentialBackoff::default();
        assert_eq!(
            strategy.should_retry(&DirectoryError::forbidden("no"), 1),
            RetryDecision::DoNotRetry
        );
        assert_eq!(
            strategy.should_retry(&DirectoryError::rate_limited(), 3),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_retry_after_raises_the_delay() {
        let strategy = ExponentialBackoff::new(
            RetryConfig::default().with_max_jitter(Duration::ZERO),
        );
        let hinted = |secs| DirectoryError::from_status(429, "slow down", Some(Duration::from_secs(secs)));

        assert_eq!(strategy.should_retry(&hinted(7), 1), RetryDecision::Retry(Duration::from_secs(7)));
        // shorter than the backoff: backoff wins
        assert_eq!(strategy.should_retry(&hinted(1), 2), RetryDecision::Retry(Duration::from_millis(2000)));
        // capped by max_delay
        assert_eq!(strategy.should_retry(&hinted(600), 1), RetryDecision::Retry(Duration::from_secs(30)));

        let wrapped = AuthError::check_failed(hinted(7));
        assert_eq!(strategy.should_retry(&wrapped, 1), RetryDecision::Retry(Duration::from_secs(7)));
    }

    #[test]
    fn test_config_serialization_uses_millis() {
        let json = serde_json::to_value(RetryConfig::default()).unwrap();
        assert_eq!(json["base_delay"], 1000);

        let parsed: RetryConfig = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(parsed.max_attempts, 5);
        assert_eq!(parsed.base_delay, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_runs_exactly_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), DirectoryError> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(DirectoryError::server(503, "unavailable")) }
            })
            .await;

        assert!(matches!(result, Err(DirectoryError::Server { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(policy.metrics().snapshot().exhausted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_increase_between_attempts() {
        let stamps = std::sync::Mutex::new(Vec::<Instant>::new());
        let policy = RetryPolicy::default();

        let _: Result<(), DirectoryError> = policy
            .execute(|| {
                stamps.lock().unwrap().push(Instant::now());
                async { Err(DirectoryError::rate_limited()) }
            })
            .await;

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        let first_gap = stamps[1] - stamps[0];
        let second_gap = stamps[2] - stamps[1];
        assert!(first_gap >= Duration::from_millis(1000));
        assert!(second_gap >= Duration::from_millis(2000));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<u32, DirectoryError> = policy
            .execute(|| {
                let current = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if current < 1 {
                        Err(DirectoryError::transport("connection reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        let snapshot = policy.metrics().snapshot();
        assert_eq!(snapshot.retry_success, 1);
        assert_eq!(snapshot.total_retries, 1);
    }

    #[derive(Default)]
    struct RecordingObserver {
        delays: std::sync::Mutex<Vec<(u32, Duration)>>,
    }

    impl RetryObserver for RecordingObserver {
        fn on_retry(&self, attempt: u32, delay: Duration, _error_type: &'static str) {
            self.delays.lock().unwrap().push((attempt, delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_scheduled_delay() {
        let observer = Arc::new(RecordingObserver::default());
        let policy = RetryPolicy::exponential(RetryConfig::default().with_max_jitter(Duration::ZERO))
            .with_observer(observer.clone());

        let _: Result<(), DirectoryError> = policy
            .execute(|| async { Err(DirectoryError::rate_limited()) })
            .await;

        assert_eq!(
            *observer.delays.lock().unwrap(),
            vec![(1, Duration::from_millis(1000)), (2, Duration::from_millis(2000))]
        );
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_one_attempt() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::no_retry();

        let result: Result<(), DirectoryError> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(DirectoryError::rate_limited()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
