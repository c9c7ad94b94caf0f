use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for calls to the completion service
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Policy used by the OpenAI client: three tries, waits capped at 5s
    pub fn api_call() -> Self {
        Self::new(3, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(2.0)
    }

    /// Wait before try number `attempt`; the first try starts immediately
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::api_call()
    }
}

/// Run an async operation, retrying failures that `should_retry` accepts.
///
/// Errors rejected by `should_retry` are returned immediately. Once every
/// attempt is used up the last error is returned.
///
/// # Panics
/// Panics if `config.max_attempts` is 0
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    assert!(
        config.max_attempts >= 1,
        "RetryConfig.max_attempts must be >= 1, got {}",
        config.max_attempts
    );

    let mut attempt = 0;
    loop {
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "Waiting {:?} before {} try {} of {}",
                delay,
                operation_name,
                attempt + 1,
                config.max_attempts
            );
            sleep(delay).await;
        }

        let error = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} recovered on try {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !should_retry(&error) {
            debug!("{} failed with a permanent error: {}", operation_name, error);
            return Err(error);
        }

        attempt += 1;
        let remaining = config.max_attempts - attempt;
        if remaining == 0 {
            warn!(
                "{} gave up after {} tries: {}",
                operation_name, config.max_attempts, error
            );
            return Err(error);
        }

        warn!("{} failed ({}), tries left: {}", operation_name, error, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(1))
    }

    /// Runs `with_retry_if` over a scripted list of outcomes, one per try,
    /// and returns the result with the number of tries made.
    async fn run_script(
        config: &RetryConfig,
        script: &'static [Result<u32, &'static str>],
        retryable: fn(&&'static str) -> bool,
    ) -> (Result<u32, &'static str>, u32) {
        let tries = Arc::new(AtomicU32::new(0));
        let result = with_retry_if(
            config,
            "completion",
            || {
                let tries = tries.clone();
                async move {
                    let n = tries.fetch_add(1, Ordering::SeqCst) as usize;
                    script[n.min(script.len() - 1)]
                }
            },
            retryable,
        )
        .await;
        (result, tries.load(Ordering::SeqCst))
    }

    #[test]
    fn test_api_call_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let config = RetryConfig::new(8, Duration::from_millis(250))
            .with_backoff_multiplier(3.0)
            .with_max_delay(Duration::from_secs(2));

        let waits: Vec<u128> = (0..6).map(|n| config.delay_for_attempt(n).as_millis()).collect();
        assert_eq!(waits, vec![0, 250, 750, 2000, 2000, 2000]);
    }

    #[tokio::test]
    async fn test_first_success_makes_one_call() {
        let (result, tries) = run_script(&instant(3), &[Ok(7)], |_| true).await;
        assert_eq!(result, Ok(7));
        assert_eq!(tries, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let script = &[Err("429 Too Many Requests"), Err("502 Bad Gateway"), Ok(1)];
        let (result, tries) = run_script(&instant(3), script, |_| true).await;
        assert_eq!(result, Ok(1));
        assert_eq!(tries, 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let script = &[Err("400 Bad Request"), Ok(1)];
        let (result, tries) = run_script(&instant(5), script, |e| !e.starts_with('4')).await;
        assert_eq!(result, Err("400 Bad Request"));
        assert_eq!(tries, 1);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let script = &[Err("500"), Err("503"), Err("504"), Ok(1)];
        let (result, tries) = run_script(&instant(3), script, |_| true).await;
        assert_eq!(result, Err("504"));
        assert_eq!(tries, 3);
    }

    #[tokio::test]
    async fn test_stops_when_error_turns_permanent() {
        let script = &[Err("503 Service Unavailable"), Err("401 Unauthorized"), Ok(1)];
        let (result, tries) = run_script(&instant(5), script, |e| e.starts_with('5')).await;
        assert_eq!(result, Err("401 Unauthorized"));
        assert_eq!(tries, 2);
    }

    #[tokio::test]
    #[should_panic(expected = "max_attempts must be >= 1")]
    async fn test_zero_attempts_panics() {
        let _ = run_script(&instant(0), &[Ok(1)], |_| true).await;
    }
}
