//! Reliability wrapper: timeout + retry-with-backoff around a caller's
//! tool invocation. Not part of the engine pipeline — callers apply it
//! around the tool handle they obtained from the registry, then report
//! the outcome back to the breaker via `record_outcome`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct ReliabilityConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReliabilityError<E> {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("exhausted {attempts} attempts, last error: {source}")]
    MaxRetriesExceeded { attempts: u32, source: E },
}

/// Wrap an async, retryable operation with per-attempt timeout and
/// exponential backoff with optional jitter.
pub async fn call_with_reliability<F, Fut, T, E>(
    config: &ReliabilityConfig,
    mut operation: F,
) -> Result<T, ReliabilityError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match tokio::time::timeout(config.timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(attempt, "tool call attempt failed");
                last_error = Some(err);
            }
            Err(_) => {
                warn!(attempt, timeout = ?config.timeout, "tool call attempt timed out");
                if attempt == config.max_attempts {
                    return Err(ReliabilityError::Timeout(config.timeout));
                }
                last_error = None;
            }
        }

        if attempt < config.max_attempts {
            let delay = backoff_delay(config, attempt);
            tokio::time::sleep(delay).await;
        }
    }

    match last_error {
        Some(source) => Err(ReliabilityError::MaxRetriesExceeded {
            attempts: config.max_attempts,
            source,
        }),
        None => Err(ReliabilityError::Timeout(config.timeout)),
    }
}

fn backoff_delay(config: &ReliabilityConfig, attempt: u32) -> Duration {
    let exp = config.exponential_base.powi(attempt as i32 - 1);
    let base = config.initial_delay.as_secs_f64() * exp;
    let capped = base.min(config.max_delay.as_secs_f64());
    let delay = if config.jitter {
        let mut rng = rand::thread_rng();
        let factor: f64 = rng.gen_range(0.5..1.5);
        capped * factor
    } else {
        capped
    };
    Duration::from_secs_f64(delay.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let config = ReliabilityConfig::default();
        let result: Result<u32, ReliabilityError<&str>> =
            call_with_reliability(&config, || async { Ok::<u32, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let config = ReliabilityConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..ReliabilityConfig::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<u32, ReliabilityError<&str>> = call_with_reliability(&config, move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(99)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries() {
        let config = ReliabilityConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..ReliabilityConfig::default()
        };

        let result: Result<u32, ReliabilityError<&str>> =
            call_with_reliability(&config, || async { Err("always fails") }).await;

        match result {
            Err(ReliabilityError::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out() {
        let config = ReliabilityConfig {
            timeout: Duration::from_millis(10),
            max_attempts: 1,
            ..ReliabilityConfig::default()
        };

        let result: Result<u32, ReliabilityError<&str>> = call_with_reliability(&config, || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(1)
        })
        .await;

        assert!(matches!(result, Err(ReliabilityError::Timeout(_))));
    }
}
