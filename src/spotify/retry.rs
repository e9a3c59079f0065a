//! Bounded retry with backoff for resource requests.
//!
//! Each logical request runs as a small state machine: obtain a token, issue
//! the GET, then [`RetryPolicy::classify`] the response into a [`Step`]. The
//! classification is pure so the backoff schedule and the terminal/retryable
//! split can be tested without a network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::error::ApiError;
use super::token::TokenManager;

/// Retry knobs shared by token acquisition and resource requests.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * base_delay` before attempt `n + 1`.
    pub base_delay: Duration,
    /// Renew the token and retry immediately on a resource 401.
    pub retry_on_auth_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            retry_on_auth_error: true,
        }
    }
}

/// What the executor does after one attempt.
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    /// Terminal success.
    Done(Value),
    /// Stale token: drop it and go again with no sleep.
    RenewToken,
    /// Transient failure: wait, then go again if attempts remain.
    Retry { error: ApiError, delay: Duration },
    /// Terminal failure.
    Fail(ApiError),
}

impl RetryPolicy {
    /// Linear backoff: `base_delay * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Wait before retrying a 429, honouring a numeric `Retry-After`.
    pub fn rate_limit_delay(&self, retry_after: Option<u64>, attempt: u32) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self.delay_for(attempt),
        }
    }

    /// Classify one response. `retry_after` is the raw `Retry-After` header.
    pub(crate) fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<&str>,
        body: &str,
        attempt: u32,
    ) -> Step {
        if status.is_success() {
            return match serde_json::from_str(body) {
                Ok(value) => Step::Done(value),
                Err(e) => Step::Retry {
                    error: ApiError::Protocol(format!("invalid JSON body: {}", e)),
                    delay: self.delay_for(attempt),
                },
            };
        }

        if status == StatusCode::UNAUTHORIZED && self.retry_on_auth_error {
            return Step::RenewToken;
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after.and_then(parse_retry_after);
            return Step::Retry {
                error: ApiError::RateLimited { retry_after },
                delay: self.rate_limit_delay(retry_after, attempt),
            };
        }

        if status.is_client_error() {
            return Step::Fail(ApiError::Client {
                status: status.as_u16(),
                message: error_message(status, body),
            });
        }

        Step::Retry {
            error: ApiError::UpstreamServer {
                status: status.as_u16(),
            },
            delay: self.delay_for(attempt),
        }
    }
}

/// Leading integer seconds of a `Retry-After` value. HTTP-date forms yield `None`.
fn parse_retry_after(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// `error.message` from a Spotify error body, else the status reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string())
}

/// Runs one logical GET to completion under a [`RetryPolicy`].
pub(crate) struct Executor {
    http: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    policy: RetryPolicy,
}

impl Executor {
    pub(crate) fn new(
        http: Client,
        base_url: String,
        tokens: Arc<TokenManager>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            tokens,
            policy,
        }
    }

    /// GET `base_url + endpoint [+ '?' + query]` and return the parsed JSON.
    pub(crate) async fn request(&self, endpoint: &str, query: &str) -> Result<Value, ApiError> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        };
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            // Token failures have already been retried by the token manager.
            let token = self.tokens.get_token().await?;

            let step = match self.attempt(&url, &token, attempt).await {
                Ok(step) => step,
                Err(error) if error.is_retryable() => Step::Retry {
                    error,
                    delay: self.policy.delay_for(attempt),
                },
                Err(error) => Step::Fail(error),
            };

            match step {
                Step::Done(value) => return Ok(value),
                Step::RenewToken => {
                    tracing::warn!(endpoint, attempt, "access token rejected, renewing");
                    self.tokens.invalidate().await;
                    last_error = Some(ApiError::Client {
                        status: StatusCode::UNAUTHORIZED.as_u16(),
                        message: "access token rejected".into(),
                    });
                }
                Step::Retry { error, delay } => {
                    tracing::warn!(endpoint, attempt, error = %error, ?delay, "request attempt failed");
                    last_error = Some(error);
                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Step::Fail(error) => {
                    tracing::warn!(endpoint, attempt, error = %error, "request failed");
                    return Err(error);
                }
            }
        }

        Err(ApiError::RequestExhausted {
            endpoint: endpoint.to_string(),
            attempts: max_attempts,
            last: last_error.map(Box::new),
        })
    }

    async fn attempt(&self, url: &str, token: &str, attempt: u32) -> Result<Step, ApiError> {
        let res = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = res.status();
        let retry_after = res
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = res.text().await?;

        Ok(self
            .policy
            .classify(status, retry_after.as_deref(), &body, attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn default_backoff_schedule() {
        let p = policy();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay_for(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn success_parses_body() {
        let step = policy().classify(StatusCode::OK, None, r#"{"ok":true}"#, 1);
        assert_eq!(step, Step::Done(serde_json::json!({"ok": true})));
    }

    #[test]
    fn success_with_garbage_body_is_retryable_protocol_error() {
        match policy().classify(StatusCode::OK, None, "<html>", 2) {
            Step::Retry { error: ApiError::Protocol(_), delay } => {
                assert_eq!(delay, Duration::from_millis(2000))
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn unauthorized_renews_without_delay() {
        assert_eq!(
            policy().classify(StatusCode::UNAUTHORIZED, None, "", 1),
            Step::RenewToken
        );
    }

    #[test]
    fn unauthorized_is_terminal_when_auth_retry_disabled() {
        let p = RetryPolicy {
            retry_on_auth_error: false,
            ..RetryPolicy::default()
        };
        match p.classify(StatusCode::UNAUTHORIZED, None, "", 1) {
            Step::Fail(ApiError::Client { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn rate_limit_honours_retry_after() {
        match policy().classify(StatusCode::TOO_MANY_REQUESTS, Some("5"), "", 1) {
            Step::Retry { error, delay } => {
                assert_eq!(error, ApiError::RateLimited { retry_after: Some(5) });
                assert_eq!(delay, Duration::from_secs(5));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn rate_limit_without_header_backs_off() {
        match policy().classify(StatusCode::TOO_MANY_REQUESTS, None, "", 2) {
            Step::Retry { delay, .. } => assert_eq!(delay, Duration::from_millis(2000)),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn not_found_is_terminal_with_body_message() {
        let body = r#"{"error":{"status":404,"message":"Non existing id"}}"#;
        match policy().classify(StatusCode::NOT_FOUND, None, body, 1) {
            Step::Fail(ApiError::Client { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Non existing id");
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn server_error_is_retryable() {
        match policy().classify(StatusCode::SERVICE_UNAVAILABLE, None, "", 1) {
            Step::Retry { error, delay } => {
                assert_eq!(error, ApiError::UpstreamServer { status: 503 });
                assert_eq!(delay, Duration::from_millis(1000));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn classification_agrees_with_error_retryability() {
        let p = policy();
        for status in [400u16, 403, 404, 429, 500, 502, 503] {
            let status = StatusCode::from_u16(status).unwrap();
            match p.classify(status, None, "", 1) {
                Step::Retry { error, .. } => assert!(error.is_retryable(), "{status}"),
                Step::Fail(error) => assert!(!error.is_retryable(), "{status}"),
                other => panic!("unexpected step for {status}: {other:?}"),
            }
        }
        match p.classify(StatusCode::OK, None, "not json", 1) {
            Step::Retry { error, .. } => assert!(error.is_retryable()),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after("5"), Some(5));
        assert_eq!(parse_retry_after(" 12 "), Some(12));
        assert_eq!(parse_retry_after("3.5"), Some(3));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
