//! HTTP clients for the remote collaborators the agent consumes.

pub mod gemini;
pub mod openai;
pub mod pinecone;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::warn;

/// Exponential backoff applied to rate-limit and overload responses only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, base_delay: Duration::from_secs(4), max_delay: Duration::from_secs(60) }
    }

    /// Delay before retry number `attempt` (0-based): base, 2x base, 4x base... capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE)
}

/// Sends the request built by `build`, retrying 429/503 per `policy`.
/// Any other non-success status fails immediately with the response body.
pub(crate) async fn send_with_retry<F>(
    policy: &RetryPolicy,
    provider: &'static str,
    mut build: F,
) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let response =
            build().send().await.with_context(|| format!("{provider} request failed"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if is_retryable(status) && attempt < policy.max_retries {
            let delay = policy.delay_for(attempt);
            warn!(
                event_name = "provider.retry_scheduled",
                provider,
                status = %status,
                attempt = attempt + 1,
                delay_secs = delay.as_secs(),
                "provider throttled the request, backing off"
            );
            sleep(delay).await;
            attempt += 1;
            continue;
        }

        let body = response.text().await.unwrap_or_default();
        bail!("{provider} returned {status}: {}", truncate(&body, 300));
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{is_retryable, truncate, RetryPolicy};

    #[test]
    fn backoff_doubles_from_four_seconds_and_caps_at_a_minute() {
        let policy = RetryPolicy::new(5);
        let delays: Vec<u64> = (0..6).map(|attempt| policy.delay_for(attempt).as_secs()).collect();
        assert_eq!(delays, vec![4, 8, 16, 32, 60, 60]);
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn only_throttling_statuses_are_retried() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("café con leche", 4), "café");
        assert_eq!(truncate("corto", 10), "corto");
    }
}
