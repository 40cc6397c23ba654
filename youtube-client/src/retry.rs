use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info};
use tubemood_core::{CoreError, ErrorExt};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000, // 1 second
            max_delay_ms: 30000, // 30 seconds
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

impl RetryConfig {
    /// Retry config for the YouTube Data API: 1s, 2s, 4s between four attempts
    pub fn youtube() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry no sooner than the server-specified delay
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    if !error.is_retryable() {
        return RetryStrategy::NoRetry;
    }

    match error.retry_after() {
        Some(delay) => RetryStrategy::RetryWithDelay(delay),
        None => RetryStrategy::Retry,
    }
}

/// Exponential backoff without jitter: `base * multiplier^attempt`, capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration, multiplier: f64) -> Duration {
    let factor = multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
    let millis = base.as_millis() as f64 * factor;
    if !millis.is_finite() || millis >= cap.as_millis() as f64 {
        cap
    } else {
        Duration::from_millis(millis as u64)
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let exponential_delay = backoff_delay(
        attempt,
        Duration::from_millis(config.base_delay_ms),
        max_delay,
        config.backoff_multiplier,
    );

    // Add jitter to prevent thundering herd
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = if jitter_range > 0 {
        fastrand::u64(0..=jitter_range)
    } else {
        0
    };
    let final_delay = exponential_delay + Duration::from_millis(jitter);

    // Ensure we don't exceed max delay
    final_delay.min(max_delay)
}

/// Upper bound for waits that start from a server `Retry-After`.
pub const MAX_SERVER_DELAY: Duration = Duration::from_secs(600);

/// Wait before retrying after the server asked for `requested`.
///
/// The request is a floor. Each later wait grows by the backoff multiplier
/// from the previous one, so waits keep increasing even past `max_delay_ms`.
pub fn server_delay(
    requested: Duration,
    previous: Option<Duration>,
    attempt: u32,
    config: &RetryConfig,
) -> Duration {
    let ceiling = MAX_SERVER_DELAY.max(requested);
    let escalated = previous
        .map(|previous| {
            Duration::try_from_secs_f64(
                previous.as_secs_f64() * config.backoff_multiplier.max(1.0),
            )
            .unwrap_or(ceiling)
        })
        .unwrap_or_default();

    requested
        .max(calculate_delay(attempt, config))
        .max(escalated)
        .min(ceiling)
}

/// Retry metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
    pub average_retry_delay_ms: f64,
}

/// Result of one retried operation, with the attempts and waits it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, CoreError>,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// Retry executor that wraps operations with retry logic
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Arc<Mutex<RetryMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.run(operation_name, operation).await.result
    }

    /// Execute an operation with retry logic, reporting every backoff taken.
    ///
    /// Non-retryable errors are returned as-is after the first attempt. A
    /// retryable error that survives every attempt becomes
    /// [`CoreError::Unavailable`].
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> RetryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delays = Vec::new();
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let start_time = Instant::now();
            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        self.record_success(attempt, &delays);
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return RetryOutcome {
                        result: Ok(result),
                        attempts: attempt + 1,
                        delays,
                    };
                }
                Err(error) => error,
            };

            debug!(
                "Attempt {} failed for {} after {:?}: {}",
                attempt + 1,
                operation_name,
                start_time.elapsed(),
                error
            );

            let strategy = get_retry_strategy(&error);
            let has_attempts_left = attempt + 1 < max_attempts;

            let delay = match strategy {
                RetryStrategy::NoRetry => {
                    debug!(
                        "Not retrying {} due to error type: {}",
                        operation_name, error
                    );
                    self.record_failure();
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt + 1,
                        delays,
                    };
                }
                _ if !has_attempts_left => {
                    self.record_failure();
                    error!(
                        "Operation {} failed after {} attempts: {}",
                        operation_name, max_attempts, error
                    );
                    return RetryOutcome {
                        result: Err(CoreError::Unavailable {
                            operation: operation_name.to_string(),
                            attempts: attempt + 1,
                            last_error: error.to_string(),
                        }),
                        attempts: attempt + 1,
                        delays,
                    };
                }
                RetryStrategy::Retry => calculate_delay(attempt, &self.config),
                RetryStrategy::RetryWithDelay(requested) => {
                    server_delay(requested, delays.last().copied(), attempt, &self.config)
                }
            };

            info!(
                "Retrying {} in {:?} due to: {}",
                operation_name, delay, error
            );
            delays.push(delay);
            sleep(delay).await;
            attempt += 1;
        }
    }

    fn record_success(&self, retries: u32, delays: &[Duration]) {
        let total_delay_ms: u128 = delays.iter().map(Duration::as_millis).sum();
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        metrics.total_retries += retries as u64;
        metrics.successful_retries += 1;
        metrics.average_retry_delay_ms = (metrics.average_retry_delay_ms
            * (metrics.successful_retries - 1) as f64
            + total_delay_ms as f64)
            / metrics.successful_retries as f64;
    }

    fn record_failure(&self) {
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        metrics.failed_operations += 1;
    }

    /// Get current retry metrics
    pub fn get_metrics(&self) -> RetryMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Reset metrics (useful for testing or periodic cleanup)
    pub fn reset_metrics(&self) {
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        *metrics = RetryMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tubemood_core::YouTubeApiError;

    fn rate_limited() -> CoreError {
        CoreError::YouTubeApi(YouTubeApiError::RateLimitExceeded {
            reason: "rateLimitExceeded".to_string(),
            retry_after: None,
        })
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_retry_config_youtube() {
        let config = RetryConfig::youtube();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay_ms, 1000);
        assert!(config.jitter_factor <= 1.0);
    }

    #[test]
    fn test_retry_strategy_for_errors() {
        assert_eq!(get_retry_strategy(&rate_limited()), RetryStrategy::Retry);

        let with_header = CoreError::YouTubeApi(YouTubeApiError::RateLimitExceeded {
            reason: "rateLimitExceeded".to_string(),
            retry_after: Some(60),
        });
        assert_eq!(
            get_retry_strategy(&with_header),
            RetryStrategy::RetryWithDelay(Duration::from_secs(60))
        );

        let server_error = CoreError::YouTubeApi(YouTubeApiError::ServerError { status_code: 503 });
        assert_eq!(get_retry_strategy(&server_error), RetryStrategy::Retry);

        let not_found = CoreError::YouTubeApi(YouTubeApiError::VideoNotFound {
            video_id: "x".to_string(),
        });
        assert_eq!(get_retry_strategy(&not_found), RetryStrategy::NoRetry);

        let bad_key = CoreError::YouTubeApi(YouTubeApiError::InvalidApiKey);
        assert_eq!(get_retry_strategy(&bad_key), RetryStrategy::NoRetry);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0, // No jitter for predictable test
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(2, &config), Duration::from_millis(4000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));

        // Should cap at max_delay_ms
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10000));
        assert_eq!(calculate_delay(200, &config), Duration::from_millis(10000));
    }

    #[test]
    fn test_backoff_is_strictly_increasing_until_cap() {
        let base = Duration::from_millis(250);
        let cap = Duration::from_secs(8);
        let delays: Vec<Duration> = (0..5).map(|a| backoff_delay(a, base, cap, 2.0)).collect();

        for pair in delays.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(backoff_delay(6, base, cap, 2.0), cap);
    }

    #[test]
    fn test_jitter_stays_within_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5, // 50% jitter
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000)); // base 2000 + 50% jitter
        }
    }

    #[tokio::test]
    async fn test_retry_executor_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_config(3));

        let outcome = executor
            .run("test_operation", || async { Ok::<i32, CoreError>(42) })
            .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 0);
        assert_eq!(metrics.successful_retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_succeeds_on_third_attempt() {
        let executor = RetryExecutor::new(fast_config(4));
        let attempt_count = Arc::new(AtomicU32::new(0));

        let counter = attempt_count.clone();
        let outcome = executor
            .run("videos.list", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(rate_limited())
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "payload");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.delays.len(), 2);
        assert!(outcome.delays[1] > outcome.delays[0]);

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.successful_retries, 1);
        assert_eq!(metrics.failed_operations, 0);
    }

    #[tokio::test]
    async fn test_no_retry_on_terminal_error() {
        let executor = RetryExecutor::new(fast_config(4));
        let attempt_count = Arc::new(AtomicU32::new(0));

        let counter = attempt_count.clone();
        let outcome = executor
            .run("videos.list", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, CoreError>(CoreError::YouTubeApi(YouTubeApiError::InvalidApiKey))
                }
            })
            .await;

        assert!(matches!(
            outcome.result,
            Err(CoreError::YouTubeApi(YouTubeApiError::InvalidApiKey))
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
        assert!(outcome.delays.is_empty());
        assert_eq!(executor.get_metrics().failed_operations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_unavailable() {
        let executor = RetryExecutor::new(fast_config(3));

        let outcome = executor
            .run("commentThreads.list", || async {
                Err::<i32, CoreError>(CoreError::YouTubeApi(YouTubeApiError::ServerError {
                    status_code: 503,
                }))
            })
            .await;

        match outcome.result {
            Err(CoreError::Unavailable {
                operation,
                attempts,
                last_error,
            }) => {
                assert_eq!(operation, "commentThreads.list");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("Expected Unavailable, got {:?}", other),
        }
        assert_eq!(
            outcome.delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_retry_after_is_respected() {
        let executor = RetryExecutor::new(fast_config(2));
        let attempt_count = Arc::new(AtomicU32::new(0));

        let counter = attempt_count.clone();
        let outcome = executor
            .run("videos.list", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CoreError::YouTubeApi(YouTubeApiError::RateLimitExceeded {
                            reason: "rateLimitExceeded".to_string(),
                            retry_after: Some(5),
                        }))
                    } else {
                        Ok(1)
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), 1);
        assert_eq!(outcome.delays, vec![Duration::from_secs(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_delays_keep_growing() {
        let executor = RetryExecutor::new(RetryConfig::youtube().without_jitter());

        let outcome = executor
            .run("commentThreads.list", || async {
                Err::<i32, CoreError>(CoreError::YouTubeApi(YouTubeApiError::RateLimitExceeded {
                    reason: "quotaExceeded".to_string(),
                    retry_after: Some(10),
                }))
            })
            .await;

        assert!(matches!(outcome.result, Err(CoreError::Unavailable { attempts: 4, .. })));
        assert_eq!(
            outcome.delays,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40)
            ]
        );
        for pair in outcome.delays.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_server_delay_bounds() {
        let config = fast_config(4);

        // Backoff wins when it is longer than the request
        let late = RetryConfig {
            base_delay_ms: 8000,
            ..fast_config(4)
        };
        assert_eq!(
            server_delay(Duration::from_secs(1), None, 1, &late),
            Duration::from_secs(10)
        );

        assert_eq!(
            server_delay(Duration::from_secs(10), Some(Duration::from_secs(400)), 2, &config),
            MAX_SERVER_DELAY
        );
        assert_eq!(
            server_delay(Duration::from_secs(900), None, 0, &config),
            Duration::from_secs(900)
        );
    }
}
