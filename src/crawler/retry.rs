//! Retry policy around single fetches

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, FetchMode, Fetcher};
use std::time::Duration;

/// Limits applied by [`fetch_with_retry`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for a request failing with a transient error
    pub max_attempts: u32,

    /// Backoff before the first transient retry; doubles on each retry
    pub backoff: Duration,

    /// Consecutive rate-limit responses tolerated before giving up
    pub rate_limit_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff),
            rate_limit_attempts: config.rate_limit_attempts.max(1),
        }
    }
}

/// Fetches a page, retrying transient failures and rate limiting
///
/// Network failures back off exponentially up to `max_attempts`. A rate-limit
/// response lengthens the fetcher's delay gate and is retried until
/// `rate_limit_attempts` consecutive responses, after which it is returned.
/// Every other error is returned immediately.
pub async fn fetch_with_retry(
    fetcher: &mut Fetcher,
    url: &str,
    mode: &FetchMode,
    policy: &RetryPolicy,
) -> Result<String, FetchError> {
    let mut transient_failures = 0u32;
    let mut rate_limits = 0u32;

    loop {
        match fetcher.fetch(url, mode).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() => {
                transient_failures += 1;
                rate_limits = 0;
                if transient_failures >= policy.max_attempts {
                    return Err(e);
                }
                let backoff = policy.backoff * 2u32.saturating_pow(transient_failures - 1);
                tracing::warn!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    transient_failures,
                    policy.max_attempts,
                    url,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) if e.is_rate_limited() => {
                rate_limits += 1;
                if rate_limits >= policy.rate_limit_attempts {
                    return Err(e);
                }
                tracing::warn!(
                    "Rate limited on {} ({}/{}), delay now {:?}",
                    url,
                    rate_limits,
                    policy.rate_limit_attempts,
                    fetcher.current_delay()
                );
            }
            Err(e) => return Err(e),
        }
    }
}
