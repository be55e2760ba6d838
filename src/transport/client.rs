//! Rate-limit aware transport
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx | Reset shared counter, return the response |
//! | HTTP 429 | Increment shared counter, sleep, retry |
//! | Other HTTP status | Reset shared counter, fail with a body snippet |
//! | Network error | Reset shared counter, fail immediately |
//! | Counter reaches `max_attempts` | Reset shared counter, fail with `RetryExhausted` |
//!
//! The counter lives in the transport instance, so concurrent callers back
//! off together: a 429 seen by one task lengthens the next delay for all.

use crate::config::TransportConfig;
use crate::transport::exchange::{Exchange, HttpExchange};
use crate::transport::retry::{RetryPolicy, RetryState};
use crate::transport::{snippet, Request, Response, StatusClass, TransportError, TransportResult};
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// HTTP transport with shared 429 backoff
pub struct ResilientTransport<E = HttpExchange> {
    exchange: E,
    policy: RetryPolicy,
    state: Mutex<RetryState>,
    cancel: CancellationToken,
}

impl ResilientTransport<HttpExchange> {
    /// Builds a reqwest-backed transport from configuration
    pub fn from_config(config: &TransportConfig) -> TransportResult<Self> {
        Ok(Self::new(HttpExchange::new(config)?, RetryPolicy::from(config)))
    }
}

impl<E: Exchange> ResilientTransport<E> {
    pub fn new(exchange: E, policy: RetryPolicy) -> Self {
        Self {
            exchange,
            policy,
            state: Mutex::new(RetryState::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts in-flight requests and pending backoff sleeps when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the shared retry state
    pub fn retry_state(&self) -> RetryState {
        *self.lock_state()
    }

    /// Sends a GET request
    pub async fn get(&self, url: &str) -> TransportResult<Response> {
        self.execute(Request::get(url)).await
    }

    /// Sends a GET request with extra headers
    pub async fn get_with_headers(&self, url: &str, headers: &HeaderMap) -> TransportResult<Response> {
        self.execute(Request::get(url).with_headers(headers)).await
    }

    /// Sends a request with an arbitrary method and headers
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> TransportResult<Response> {
        self.execute(Request::new(method, url).with_headers(headers))
            .await
    }

    /// Executes a request, retrying while the remote answers 429
    ///
    /// # Returns
    ///
    /// * `Ok(Response)` - 2xx response
    /// * `Err(TransportError::Status)` - any other non-429 status
    /// * `Err(TransportError::Network)` - the request could not be completed
    /// * `Err(TransportError::RetryExhausted)` - `max_attempts` consecutive 429s
    /// * `Err(TransportError::Cancelled)` - the cancellation token fired
    pub async fn execute(&self, request: Request) -> TransportResult<Response> {
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&request));
            }

            let outcome = tokio::select! {
                outcome = self.exchange.send(&request) => outcome,
                _ = self.cancel.cancelled() => return Err(self.cancelled(&request)),
            };

            let response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    self.lock_state().reset();
                    return Err(e);
                }
            };

            match StatusClass::of(response.status) {
                StatusClass::Success => {
                    self.lock_state().reset();
                    return Ok(response);
                }
                StatusClass::Failure => {
                    self.lock_state().reset();
                    return Err(TransportError::Status {
                        url: request.url.clone(),
                        status: response.status,
                        snippet: snippet(&response.body),
                    });
                }
                StatusClass::RateLimited => {
                    attempts += 1;
                    let delay = self.register_throttle(attempts);

                    let Some(delay) = delay else {
                        tracing::warn!(
                            "Rate limited by {}, giving up after {} attempts",
                            request.url,
                            attempts
                        );
                        return Err(TransportError::RetryExhausted {
                            url: request.url.clone(),
                            attempts,
                        });
                    };

                    tracing::warn!(
                        "Rate limited by {}, retrying in {:?} (attempt {})",
                        request.url,
                        delay,
                        attempts
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(self.cancelled(&request)),
                    }
                }
            }
        }
    }

    /// Updates the shared state after a 429
    ///
    /// Returns the delay to wait, or `None` once either the shared counter or
    /// this call's own `attempts` reached the maximum. The per-call bound keeps
    /// one caller from retrying forever while others keep resetting the
    /// counter with successes.
    fn register_throttle(&self, attempts: u32) -> Option<std::time::Duration> {
        let mut state = self.lock_state();
        let delay = state.register_throttle(&self.policy);

        if state.is_exhausted(&self.policy) || attempts >= self.policy.max_attempts {
            state.reset();
            None
        } else {
            Some(delay)
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RetryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancelled(&self, request: &Request) -> TransportError {
        TransportError::Cancelled {
            url: request.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Answers with scripted statuses, then with `fallback` forever
    struct ScriptedExchange {
        statuses: Mutex<VecDeque<u16>>,
        fallback: u16,
        calls: AtomicU32,
    }

    impl ScriptedExchange {
        fn new(statuses: &[u16], fallback: u16) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                fallback,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Exchange for ScriptedExchange {
        async fn send(&self, request: &Request) -> TransportResult<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback);
            Ok(Response {
                url: request.url.clone(),
                status,
                body: format!("status {}", status),
            })
        }
    }

    #[async_trait]
    impl<T: Exchange> Exchange for Arc<T> {
        async fn send(&self, request: &Request) -> TransportResult<Response> {
            self.as_ref().send(request).await
        }
    }

    /// Always fails at the network level
    struct BrokenExchange;

    #[async_trait]
    impl Exchange for BrokenExchange {
        async fn send(&self, request: &Request) -> TransportResult<Response> {
            Err(TransportError::Network {
                url: request.url.clone(),
                message: "Connection refused".to_string(),
            })
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let exchange = Arc::new(ScriptedExchange::new(&[], 200));
        let transport = ResilientTransport::new(exchange.clone(), fast_policy(3));

        let response = transport.get("https://shop.example/").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_always_rate_limited_exhausts_after_max_attempts() {
        let exchange = Arc::new(ScriptedExchange::new(&[], 429));
        let transport = ResilientTransport::new(exchange.clone(), fast_policy(3));

        let result = transport.get("https://shop.example/").await;
        assert!(matches!(
            result,
            Err(TransportError::RetryExhausted { attempts: 3, .. })
        ));
        assert_eq!(exchange.calls(), 3);
        assert_eq!(transport.retry_state().attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let exchange = Arc::new(ScriptedExchange::new(&[429, 429], 200));
        let policy = RetryPolicy::new(Duration::from_millis(2), Duration::from_millis(3), 5);
        let transport = ResilientTransport::new(exchange.clone(), policy);

        let response = transport.get("https://shop.example/").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(exchange.calls(), 3);

        let state = transport.retry_state();
        assert_eq!(state.attempt_count(), 0);
        assert_eq!(state.last_delay(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_other_status_fails_immediately() {
        let exchange = Arc::new(ScriptedExchange::new(&[500], 200));
        let transport = ResilientTransport::new(exchange.clone(), fast_policy(5));

        let result = transport.get("https://shop.example/").await;
        match result {
            Err(TransportError::Status {
                status, snippet, ..
            }) => {
                assert_eq!(status, 500);
                assert_eq!(snippet, "status 500");
            }
            other => panic!("expected status error, got {:?}", other),
        }
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_429_failure_resets_counter() {
        let exchange = Arc::new(ScriptedExchange::new(&[429, 404], 200));
        let transport = ResilientTransport::new(exchange.clone(), fast_policy(5));

        assert!(transport.get("https://shop.example/").await.is_err());
        assert_eq!(transport.retry_state().attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let transport = ResilientTransport::new(BrokenExchange, fast_policy(5));
        let result = transport.get("https://shop.example/").await;
        assert!(matches!(result, Err(TransportError::Network { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_budget() {
        let exchange = Arc::new(ScriptedExchange::new(&[], 429));
        let transport = Arc::new(ResilientTransport::new(exchange.clone(), fast_policy(4)));

        let (a, b) = tokio::join!(
            transport.get("https://shop.example/a"),
            transport.get("https://shop.example/b")
        );

        assert!(matches!(a, Err(TransportError::RetryExhausted { .. })));
        assert!(matches!(b, Err(TransportError::RetryExhausted { .. })));
        assert!(exchange.calls() <= 8);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let exchange = Arc::new(ScriptedExchange::new(&[], 429));
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(60), 5);
        let cancel = CancellationToken::new();
        let transport = ResilientTransport::new(exchange, policy).with_cancellation(cancel.clone());

        let started = Instant::now();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), transport.get("https://shop.example/"))
            .await
            .expect("backoff sleep was not interrupted");
        canceller.await.unwrap();

        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let exchange = Arc::new(ScriptedExchange::new(&[], 200));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let transport =
            ResilientTransport::new(exchange.clone(), fast_policy(3)).with_cancellation(cancel);

        assert!(transport.get("https://shop.example/").await.unwrap_err().is_cancelled());
        assert_eq!(exchange.calls(), 0);
    }
}
