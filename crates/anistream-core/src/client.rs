//! HTTP client with rate limiting and retry logic for provider calls
//!
//! Request spacing is tracked per origin, so one client shared across
//! unrelated embed hosts never queues one host behind another. Every call
//! carries its own timeout, which includes any wait for the origin's rate
//! limit; dropping the returned future cancels the underlying request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::TransportError;
use crate::url::origin_of;

/// Configuration for the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Maximum requests per second (default: 2.0)
    pub requests_per_second: f64,
    /// Per-call timeout in seconds (default: 8)
    pub timeout_secs: u64,
    /// Maximum retry attempts after HTTP 429 (default: 1)
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            timeout_secs: 8,
            max_retries: 1,
        }
    }
}

/// Rate limiter to control request frequency
///
/// Ensures requests are spaced at least `min_interval` apart.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// A non-positive rate disables spacing.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits until the minimum interval since the previous request has elapsed
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Content type a request negotiates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Json,
    Html,
}

impl Accept {
    fn header_value(self) -> HeaderValue {
        match self {
            Accept::Json => HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
            Accept::Html => HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        }
    }
}

/// HTTP client wrapper with rate limiting and retry logic
///
/// Handles all outbound communication, including:
/// - Rate limiting per origin
/// - Retry with exponential backoff after HTTP 429
/// - Browser-like headers and per-request `Accept`
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    requests_per_second: f64,
    limiters: Arc<Mutex<HashMap<String, RateLimiter>>>,
    timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            requests_per_second: config.requests_per_second,
            limiters: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            max_retries: config.max_retries,
        })
    }

    /// Fetches a page as text
    ///
    /// # Errors
    /// - `Status` for any non-success response, keeping the upstream code
    /// - `Timeout` when the per-call deadline passes
    /// - `Network` for connection failures
    pub async fn get_text(
        &self,
        url: &str,
        accept: Accept,
        referer: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut attempt = 0;

        loop {
            match self.do_fetch(url, accept, referer).await {
                Err(TransportError::Status { status: 429, .. }) if attempt < self.max_retries => {
                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(1 << attempt.min(4));
                    tracing::debug!(url, attempt, "rate limited upstream, backing off");
                    sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Fetches and decodes a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let body = self.get_text(url, Accept::Json, None).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn do_fetch(
        &self,
        url: &str,
        accept: Accept,
        referer: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut request = self.client.get(url).header(ACCEPT, accept.header_value());
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let limiter = self.rate_limiter_for(url).await;
        let fetch = async {
            limiter.acquire().await;
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            Ok::<_, TransportError>(response.text().await?)
        };

        // Also bounds the rate-limit wait and any wait for a pooled connection.
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(url.to_string())),
        }
    }

    /// Limiter shared by every request to the URL's origin
    pub async fn rate_limiter_for(&self, url: &str) -> RateLimiter {
        let origin = origin_of(url).unwrap_or_default();
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(origin)
            .or_insert_with(|| RateLimiter::new(self.requests_per_second))
            .clone()
    }
}
