//! Single-page fetching with pacing, timeout, retry and status classification.
//!
//! [`PageFetcher::fetch`] is the only place that talks to the transport.
//! Every scan variant goes through it and differs only in the
//! [`FetchPolicy`] it passes.

use crate::cursor::Cursor;
use crate::error::{Result, ScanError};
use crate::rate_limiter::RateLimiter;
use crate::transport::{ListingTransport, TransportError};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracked_core::{FetchConfig, ServerInstance};

/// Decoded listing payload: `{ data: [...], nextPageCursor: ... }`.
///
/// Both fields are kept loosely typed so that a page with a missing `data`
/// array or a sentinel cursor can be classified by the caller instead of
/// failing to decode as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    /// The page entries; expected to be an array
    #[serde(default)]
    pub data: Option<Value>,
    /// Raw continuation token
    #[serde(default)]
    pub next_page_cursor: Option<Value>,
}

impl ListingPage {
    /// The entries, or `None` when the page has no `data` array.
    #[must_use]
    pub fn entries(&self) -> Option<&[Value]> {
        self.data.as_ref().and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Entries that decode into a [`ServerInstance`], in page order.
    ///
    /// Structurally invalid entries are skipped.
    #[must_use]
    pub fn instances(&self) -> Vec<ServerInstance> {
        self.entries()
            .unwrap_or_default()
            .iter()
            .filter_map(decode_instance)
            .collect()
    }

    /// The continuation cursor, if the listing has more pages.
    #[must_use]
    pub fn next_cursor(&self) -> Option<Cursor> {
        Cursor::from_wire(self.next_page_cursor.as_ref())
    }
}

/// Decode one raw listing entry, `None` when it is structurally invalid.
#[must_use]
pub fn decode_instance(entry: &Value) -> Option<ServerInstance> {
    serde_json::from_value::<ServerInstance>(entry.clone())
        .ok()
        .filter(|server| !server.id.is_empty())
}

/// How a single fetch call paces and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Delay before every request, retries included
    pub pacing: Duration,
    /// Deadline for one request
    pub timeout: Duration,
    /// Retries allowed after the first attempt
    pub retry_attempts: u32,
}

impl FetchPolicy {
    /// The paginated-scan policy from configuration.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            pacing: config.pacing_delay(),
            timeout: config.request_timeout(),
            retry_attempts: config.retry_attempts,
        }
    }

    /// One unpaced attempt; a 429 trips the limiter immediately.
    ///
    /// Used by the polling variants, which space requests themselves.
    #[must_use]
    pub fn single_shot(timeout: Duration) -> Self {
        Self {
            pacing: Duration::ZERO,
            timeout,
            retry_attempts: 0,
        }
    }
}

/// Exponential backoff curve with random jitter and a cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_ms: u64,
    factor: f64,
    cap_ms: u64,
    jitter_ms: u64,
}

impl Backoff {
    /// Curve used after an HTTP 429.
    #[must_use]
    pub fn rate_limited(config: &FetchConfig) -> Self {
        Self {
            base_ms: config.rate_limit_backoff_base_ms,
            factor: config.rate_limit_backoff_factor,
            cap_ms: config.rate_limit_backoff_cap_ms,
            jitter_ms: config.rate_limit_jitter_ms,
        }
    }

    /// Curve used after any other failure.
    #[must_use]
    pub fn transient(config: &FetchConfig) -> Self {
        Self {
            base_ms: config.transient_backoff_base_ms,
            factor: config.transient_backoff_factor,
            cap_ms: config.transient_backoff_cap_ms,
            jitter_ms: config.transient_jitter_ms,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let jitter = if self.jitter_ms == 0 {
            0.0
        } else {
            rand::thread_rng().gen_range(0.0..self.jitter_ms as f64)
        };
        self.delay_with_jitter(attempt, jitter)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    fn delay_with_jitter(&self, attempt: u32, jitter_ms: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let exponential = self.base_ms as f64 * self.factor.powi(exponent);
        let millis = (exponential + jitter_ms).min(self.cap_ms as f64).max(0.0);
        Duration::from_millis(millis as u64)
    }
}

/// Wait for `duration` unless the token is cancelled first.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        () = cancel.cancelled() => Err(ScanError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Outcome of one request attempt, before retry policy is applied.
enum AttemptFailure {
    /// HTTP 429
    Throttled,
    /// Worth another attempt within the budget
    Retryable(ScanError),
    /// Must not be retried
    Fatal(ScanError),
}

/// Fetches one listing page per call.
pub struct PageFetcher {
    transport: Arc<dyn ListingTransport>,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_backoff: Backoff,
    transient_backoff: Backoff,
    rate_limit_cooldown: Duration,
}

impl PageFetcher {
    /// Create a fetcher over a transport, gated by a shared limiter.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ListingTransport>,
        rate_limiter: Arc<RateLimiter>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            transport,
            rate_limiter,
            rate_limit_backoff: Backoff::rate_limited(config),
            transient_backoff: Backoff::transient(config),
            rate_limit_cooldown: config.rate_limit_cooldown(),
        }
    }

    /// The limiter this fetcher trips and checks.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Fetch and decode one page.
    ///
    /// Issues at most `policy.retry_attempts + 1` requests:
    /// - HTTP 429 backs off on the rate-limit curve; when the budget is spent
    ///   the shared limiter is tripped and `RateLimited` is returned.
    /// - HTTP 403 / 404 fail immediately.
    /// - Other statuses, network errors, timeouts and undecodable bodies back
    ///   off on the transient curve and surface once the budget is spent.
    pub async fn fetch(
        &self,
        url: &str,
        policy: &FetchPolicy,
        cancel: &CancellationToken,
    ) -> Result<ListingPage> {
        let mut attempt: u32 = 1;

        loop {
            self.rate_limiter.check()?;
            pause(policy.pacing, cancel).await?;

            tracing::debug!("GET {} (attempt {})", url, attempt);

            let failure = match self.attempt(url, policy, cancel).await {
                Ok(page) => return Ok(page),
                Err(failure) => failure,
            };

            let budget_spent = attempt > policy.retry_attempts;
            match failure {
                AttemptFailure::Fatal(err) => return Err(err),
                AttemptFailure::Throttled if budget_spent => {
                    self.rate_limiter.trip(self.rate_limit_cooldown);
                    return Err(ScanError::RateLimited {
                        retry_after: self.rate_limit_cooldown,
                    });
                }
                AttemptFailure::Throttled => {
                    let delay = self.rate_limit_backoff.delay_for(attempt);
                    tracing::warn!(
                        "HTTP 429 (attempt {}/{}), backing off for {:?}",
                        attempt,
                        policy.retry_attempts + 1,
                        delay
                    );
                    pause(delay, cancel).await?;
                }
                AttemptFailure::Retryable(err) if budget_spent => return Err(err),
                AttemptFailure::Retryable(err) => {
                    let delay = self.transient_backoff.delay_for(attempt);
                    tracing::warn!(
                        "Fetch failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt,
                        policy.retry_attempts + 1,
                        err,
                        delay
                    );
                    pause(delay, cancel).await?;
                }
            }

            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        url: &str,
        policy: &FetchPolicy,
        cancel: &CancellationToken,
    ) -> std::result::Result<ListingPage, AttemptFailure> {
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(AttemptFailure::Fatal(ScanError::Cancelled)),
            result = tokio::time::timeout(policy.timeout, self.transport.get(url)) => result,
        };

        let response = match response {
            Err(_elapsed) => {
                return Err(AttemptFailure::Retryable(ScanError::Timeout {
                    timeout: policy.timeout,
                }))
            }
            Ok(Err(TransportError::Timeout)) => {
                return Err(AttemptFailure::Retryable(ScanError::Timeout {
                    timeout: policy.timeout,
                }))
            }
            Ok(Err(err)) => {
                return Err(AttemptFailure::Retryable(ScanError::TransientNetwork(
                    err.to_string(),
                )))
            }
            Ok(Ok(response)) => response,
        };

        match response.status {
            429 => Err(AttemptFailure::Throttled),
            403 => Err(AttemptFailure::Fatal(ScanError::Forbidden {
                url: url.to_string(),
            })),
            404 => Err(AttemptFailure::Fatal(ScanError::NotFound {
                url: url.to_string(),
            })),
            status if !(200..300).contains(&status) => Err(AttemptFailure::Retryable(
                ScanError::TransientNetwork(format!("HTTP {status}")),
            )),
            _ => serde_json::from_str::<ListingPage>(&response.body).map_err(|e| {
                AttemptFailure::Retryable(ScanError::MalformedResponse(e.to_string()))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rate_limit_backoff_curve() {
        let backoff = Backoff::rate_limited(&FetchConfig::default());
        assert_eq!(backoff.delay_with_jitter(1, 0.0), Duration::from_secs(5));
        assert_eq!(backoff.delay_with_jitter(2, 0.0), Duration::from_secs(10));
        assert_eq!(backoff.delay_with_jitter(3, 0.0), Duration::from_secs(20));
        assert_eq!(backoff.delay_with_jitter(4, 0.0), Duration::from_secs(30));
        assert_eq!(backoff.delay_with_jitter(3, 2999.0), Duration::from_millis(22_999));
    }

    #[test]
    fn test_transient_backoff_curve() {
        let backoff = Backoff::transient(&FetchConfig::default());
        assert_eq!(backoff.delay_with_jitter(1, 0.0), Duration::from_millis(3000));
        assert_eq!(backoff.delay_with_jitter(2, 0.0), Duration::from_millis(4500));
        assert_eq!(backoff.delay_with_jitter(3, 0.0), Duration::from_millis(6750));
        assert_eq!(backoff.delay_with_jitter(10, 999.0), Duration::from_secs(15));
    }

    #[test]
    fn test_backoff_jitter_stays_within_cap() {
        let backoff = Backoff::rate_limited(&FetchConfig::default());
        for attempt in 1..=6 {
            let delay = backoff.delay_for(attempt);
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_policies() {
        let policy = FetchPolicy::from_config(&FetchConfig::default());
        assert_eq!(policy.pacing, Duration::from_millis(1500));
        assert_eq!(policy.timeout, Duration::from_secs(15));
        assert_eq!(policy.retry_attempts, 2);

        let single = FetchPolicy::single_shot(Duration::from_secs(6));
        assert_eq!(single.retry_attempts, 0);
        assert!(single.pacing.is_zero());
    }

    #[test]
    fn test_listing_page_decoding() {
        let page: ListingPage = serde_json::from_value(json!({
            "previousPageCursor": null,
            "nextPageCursor": "next-token",
            "data": [
                {"id": "a", "playing": 1, "maxPlayers": 10},
                {"playing": 1, "maxPlayers": 10},
                {"id": "", "playing": 0, "maxPlayers": 10},
                {"id": "b", "playing": "two", "maxPlayers": 10},
                null,
                {"id": "c", "playing": 3, "maxPlayers": 10, "ping": 90, "fps": 59.9}
            ]
        }))
        .expect("decode page");

        assert_eq!(page.entries().map(<[Value]>::len), Some(6));
        let ids: Vec<_> = page.instances().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(page.next_cursor().map(|c| c.to_string()), Some("next-token".to_string()));
    }

    #[test]
    fn test_listing_page_without_data() {
        let page: ListingPage =
            serde_json::from_value(json!({"errors": [{"code": 0}]})).expect("decode page");
        assert!(page.entries().is_none());
        assert!(page.instances().is_empty());
        assert!(page.next_cursor().is_none());

        let page: ListingPage =
            serde_json::from_value(json!({"data": {"id": "x"}})).expect("decode page");
        assert!(page.entries().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_honors_cancellation() {
        let cancel = CancellationToken::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { pause(Duration::from_secs(3600), &cancel).await })
        };
        cancel.cancel();
        let result = waiter.await.expect("join pause task");
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }
}
