//! HTTP transport shared by the catalog and protection clients
//!
//! One [`HttpClient`] is built by the caller and cloned into each adapter.
//! Transient failures (connection errors, 5xx, 429) are retried a fixed number
//! of times with exponential backoff; everything else is handed back to the
//! adapter on the first attempt.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tagsync_core::HttpConfig;

use crate::adapter::ApiError;

/// Fixed-count retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Statuses worth another attempt
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..600).contains(&status) && status != 501)
}

/// reqwest client plus retry policy
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build a client from the `[http]` settings
    pub fn new(config: &HttpConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a request, retrying transient failures
    ///
    /// `build` is called once per attempt. Any response that is not retryable,
    /// or the last retryable one, is returned as-is so the caller can inspect
    /// the status (e.g. to treat 409 as success).
    pub async fn send<F>(&self, what: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;

        loop {
            let result = build(&self.client).send().await;
            let retries_left = attempt < self.retry.max_retries;

            match result {
                Ok(response) if retries_left && is_retryable_status(response.status().as_u16()) => {
                    tracing::warn!(
                        request = what,
                        status = response.status().as_u16(),
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        "Request failed, retrying"
                    );
                }
                Ok(response) => {
                    tracing::debug!(request = what, status = response.status().as_u16(), "Request completed");
                    return Ok(response);
                }
                Err(e) if retries_left => {
                    tracing::warn!(
                        request = what,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        "Request failed, retrying"
                    );
                }
                Err(e) => {
                    tracing::error!(request = what, error = %e, "Request failed after all retries");
                    return Err(ApiError::NetworkError(format!("{}: {}", what, e)));
                }
            }

            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    /// Send and require a 2xx status
    pub async fn send_ok<F>(&self, what: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let response = self.send(what, build).await?;
        ensure_success(what, response).await
    }

    /// Send, require a 2xx status and decode the JSON body
    pub async fn get_json<T, F>(&self, what: &str, build: F) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let response = self.send_ok(what, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)))
    }
}

/// Turn a non-2xx response into an [`ApiError`]
pub async fn ensure_success(what: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(request = what, status = status.as_u16(), body = %body, "Request rejected");
    Err(ApiError::from_status(status.as_u16(), body))
}

/// Whether a response means "already exists"
pub fn is_conflict(status: StatusCode) -> bool {
    status == StatusCode::CONFLICT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local server answering each connection with the next scripted status
    async fn scripted_server(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses.get(n).or(statuses.last()).copied().unwrap_or(200);

                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/resource", addr), hits)
    }

    fn fast_retries() -> HttpClient {
        HttpClient::with_client(
            reqwest::Client::new(),
            RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        )
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3));
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from_config(&HttpConfig::default());
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(501));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(409));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn conflict_status() {
        assert!(is_conflict(StatusCode::CONFLICT));
        assert!(!is_conflict(StatusCode::CREATED));
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_network_error() {
        let http = HttpClient::with_client(reqwest::Client::new(), RetryPolicy::none());

        // Port 9 on localhost is the discard port and normally closed
        let result = http
            .send("fetch", |client| client.get("http://127.0.0.1:9/unreachable"))
            .await;

        assert!(matches!(result, Err(ApiError::NetworkError(_))));
    }

    #[tokio::test]
    async fn transient_statuses_are_retried() {
        let (url, hits) = scripted_server(vec![503, 503, 200]).await;
        let http = fast_retries();

        let response = http.send_ok("fetch", |client| client.get(&url)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn last_transient_response_is_returned() {
        let (url, hits) = scripted_server(vec![503]).await;
        let http = fast_retries();

        let response = http.send("fetch", |client| client.get(&url)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn conflict_is_not_retried() {
        let (url, hits) = scripted_server(vec![409, 200]).await;
        let http = fast_retries();

        let response = http.send("govern column", |client| client.post(&url)).await.unwrap();

        assert!(is_conflict(response.status()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let (url, hits) = scripted_server(vec![400, 200]).await;
        let http = fast_retries();

        let result = http.send_ok("register database", |client| client.post(&url)).await;

        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
