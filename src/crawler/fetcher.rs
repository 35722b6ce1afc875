//! HTTP fetching with bounded retries and failure classification
//!
//! One fetcher serves both worker pools. Every attempt goes through the
//! shared [`RateLimiter`](super::rate_limit::RateLimiter) first. Outcomes are
//! classified as retryable (timeouts, connection errors, HTTP 429 and 5xx)
//! or terminal (other 4xx); retryable failures back off exponentially with
//! jitter until the retry budget runs out.
//!
//! The transport is a trait so the retry and classification logic is tested
//! without network I/O; the production transport wraps `reqwest`.

use crate::config::{Config, RateLimitConfig};
use crate::crawler::rate_limit::{RateLimiter, RateSignal};
use rand::Rng;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// A completed HTTP exchange as seen by the fetcher
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Server-provided wait hint in seconds, from a `Retry-After` header
    pub retry_after: Option<u64>,
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Transport-level failures, all retryable
#[derive(Debug, Clone)]
pub enum TransportError {
    Timeout,
    Connect(String),
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timeout"),
            TransportError::Connect(msg) => write!(f, "connection error: {}", msg),
            TransportError::Other(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Performs one GET request; retry policy lives in the fetcher, not here
pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Production transport over a shared `reqwest` client
pub struct HttpTransport {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.rate_limit.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
        })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.user_agents.len());
        Some(&self.user_agents[idx])
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Other(e.to_string())
                }
            })?
            .to_vec();

        Ok(TransportResponse {
            status,
            retry_after,
            content_type,
            final_url,
            body,
        })
    }
}

/// Successful fetch result
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Terminal fetch failure; retryable errors never escape the fetcher
#[derive(Debug, Clone)]
pub enum FetchFailure {
    /// The server rejected the URL outright (404, 403, ...); never retried
    Terminal { status: Option<u16>, message: String },
    /// Every retry attempt was consumed without success
    RetriesExhausted { attempts: u32, last_error: String },
}

impl FetchFailure {
    pub fn message(&self) -> String {
        match self {
            FetchFailure::Terminal { status, message } => match status {
                Some(code) => format!("HTTP {}: {}", code, message),
                None => message.clone(),
            },
            FetchFailure::RetriesExhausted {
                attempts,
                last_error,
            } => format!("retry budget exhausted after {} attempts: {}", attempts, last_error),
        }
    }
}

/// Retry policy taken from the rate-limit configuration section
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub delay_ceiling: Duration,
}

impl From<&RateLimitConfig> for FetchPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            delay_ceiling: Duration::from_millis(config.retry_delay_ceiling_ms),
        }
    }
}

/// Backoff wait after the k-th failed attempt (1-indexed):
/// `min(base * 2^(k-1) + jitter, ceiling)`
pub fn backoff_delay(
    attempt: u32,
    base: Duration,
    ceiling: Duration,
    jitter: Duration,
) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let scaled = base.saturating_mul(1u32 << exponent);
    scaled.saturating_add(jitter).min(ceiling)
}

fn random_jitter() -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0))
}

/// Rate-limited retrying fetcher shared by page and image workers
pub struct Fetcher<T: Transport> {
    transport: T,
    limiter: Arc<RateLimiter>,
    policy: FetchPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, limiter: Arc<RateLimiter>, policy: FetchPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    /// Fetches a URL, retrying retryable failures with backoff
    ///
    /// Touches no shared state beyond the rate limiter, so concurrent
    /// fetches are otherwise independent.
    pub async fn fetch(&self, url: &str) -> Result<FetchedBody, FetchFailure> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.policy.max_retries {
            self.limiter.acquire().await;

            match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    self.limiter.report(RateSignal::Ok).await;
                    return Ok(FetchedBody {
                        final_url: response.final_url,
                        status: response.status,
                        content_type: response.content_type,
                        bytes: response.body,
                    });
                }

                Ok(response) if response.status == 429 => {
                    self.limiter.report(RateSignal::Limited).await;
                    last_error = format!("HTTP 429 for {}", url);

                    if attempt < self.policy.max_retries {
                        // Prefer the server's wait hint over our own backoff
                        let wait = match response.retry_after {
                            Some(secs) => {
                                Duration::from_secs(secs).min(self.policy.delay_ceiling)
                            }
                            None => backoff_delay(
                                attempt,
                                self.policy.base_delay,
                                self.policy.delay_ceiling,
                                random_jitter(),
                            ),
                        };
                        tracing::warn!(
                            "Rate limited for {}, waiting {:?} (attempt {}/{})",
                            url,
                            wait,
                            attempt,
                            self.policy.max_retries
                        );
                        sleep(wait).await;
                    }
                }

                Ok(response) if (500..600).contains(&response.status) => {
                    last_error = format!("HTTP {} for {}", response.status, url);

                    if attempt < self.policy.max_retries {
                        let wait = backoff_delay(
                            attempt,
                            self.policy.base_delay,
                            self.policy.delay_ceiling,
                            random_jitter(),
                        );
                        tracing::warn!(
                            "Server error {} for {}, retrying in {:?} (attempt {}/{})",
                            response.status,
                            url,
                            wait,
                            attempt,
                            self.policy.max_retries
                        );
                        sleep(wait).await;
                    }
                }

                Ok(response) => {
                    // Remaining 4xx (and anything else non-retryable)
                    return Err(FetchFailure::Terminal {
                        status: Some(response.status),
                        message: format!("terminal response for {}", url),
                    });
                }

                Err(err) => {
                    last_error = err.to_string();

                    if attempt < self.policy.max_retries {
                        let wait = backoff_delay(
                            attempt,
                            self.policy.base_delay,
                            self.policy.delay_ceiling,
                            random_jitter(),
                        );
                        tracing::warn!(
                            "Transport error for {}: {}, retrying in {:?} (attempt {}/{})",
                            url,
                            err,
                            wait,
                            attempt,
                            self.policy.max_retries
                        );
                        sleep(wait).await;
                    }
                }
            }
        }

        Err(FetchFailure::RetriesExhausted {
            attempts: self.policy.max_retries,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted transport: pops one canned result per call
    struct MockTransport {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        calls: AtomicU32,
    }

    impl MockTransport {
        fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        async fn get(&self, _url: &str) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    fn response(status: u16) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status,
            retry_after: None,
            content_type: Some("text/html".to_string()),
            final_url: "https://docs.example.com/".to_string(),
            body: b"<html></html>".to_vec(),
        })
    }

    fn test_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(&RateLimitConfig {
            initial_delay_ms: 250,
            min_delay_ms: 250,
            max_delay_ms: 2000,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_delay_ceiling_ms: 15_000,
            request_timeout_secs: 30,
        }))
    }

    fn test_policy() -> FetchPolicy {
        FetchPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            delay_ceiling: Duration::from_secs(15),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = MockTransport::new(vec![response(200)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let body = fetcher.fetch("https://docs.example.com/").await.unwrap();
        assert_eq!(body.status, 200);
        assert_eq!(fetcher.transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_404_is_terminal_without_retry() {
        let transport = MockTransport::new(vec![response(404)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let err = fetcher.fetch("https://docs.example.com/gone").await.unwrap_err();
        assert!(matches!(
            err,
            FetchFailure::Terminal {
                status: Some(404),
                ..
            }
        ));
        assert_eq!(fetcher.transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_403_is_terminal() {
        let transport = MockTransport::new(vec![response(403)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let err = fetcher.fetch("https://docs.example.com/denied").await.unwrap_err();
        assert!(matches!(err, FetchFailure::Terminal { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_429_exhausts_budget() {
        let transport = MockTransport::new(vec![response(429), response(429), response(429)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let err = fetcher.fetch("https://docs.example.com/busy").await.unwrap_err();
        assert!(matches!(
            err,
            FetchFailure::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(fetcher.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_raises_shared_delay() {
        let transport = MockTransport::new(vec![response(429), response(200)]);
        let limiter = test_limiter();
        let fetcher = Fetcher::new(transport, limiter.clone(), test_policy());

        fetcher.fetch("https://docs.example.com/").await.unwrap();
        // One Limited then one Ok: 250 * 1.5 * 0.9 = 337.5ms
        assert!(limiter.current_delay().await > Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_then_success() {
        let transport = MockTransport::new(vec![response(500), response(503), response(200)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let body = fetcher.fetch("https://docs.example.com/flaky").await.unwrap();
        assert_eq!(body.status, 200);
        assert_eq!(fetcher.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_then_success() {
        let transport = MockTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Connect("refused".to_string())),
            response(200),
        ]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let body = fetcher.fetch("https://docs.example.com/slow").await.unwrap();
        assert_eq!(body.status, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_honored() {
        let mut hinted = response(429).unwrap();
        hinted.retry_after = Some(4);
        let transport = MockTransport::new(vec![Ok(hinted), response(200)]);
        let fetcher = Fetcher::new(transport, test_limiter(), test_policy());

        let start = tokio::time::Instant::now();
        fetcher.fetch("https://docs.example.com/").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_delays_non_decreasing_and_capped() {
        let base = Duration::from_secs(1);
        let ceiling = Duration::from_secs(15);

        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = backoff_delay(attempt, base, ceiling, Duration::ZERO);
            assert!(delay >= previous, "delay shrank at attempt {}", attempt);
            assert!(delay <= ceiling, "delay exceeded ceiling at attempt {}", attempt);
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_jitter_still_capped() {
        let base = Duration::from_secs(1);
        let ceiling = Duration::from_secs(15);
        let jitter = Duration::from_secs(1);

        for attempt in 1..=10 {
            let delay = backoff_delay(attempt, base, ceiling, jitter);
            assert!(delay <= ceiling);
        }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        let ceiling = Duration::from_secs(60);

        assert_eq!(
            backoff_delay(1, base, ceiling, Duration::ZERO),
            Duration::from_secs(1)
        );
        assert_eq!(
            backoff_delay(2, base, ceiling, Duration::ZERO),
            Duration::from_secs(2)
        );
        assert_eq!(
            backoff_delay(3, base, ceiling, Duration::ZERO),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_failure_messages_distinguish_causes() {
        let terminal = FetchFailure::Terminal {
            status: Some(404),
            message: "terminal response".to_string(),
        };
        let exhausted = FetchFailure::RetriesExhausted {
            attempts: 3,
            last_error: "HTTP 429".to_string(),
        };

        assert!(terminal.message().contains("404"));
        assert!(exhausted.message().contains("exhausted"));
    }
}
