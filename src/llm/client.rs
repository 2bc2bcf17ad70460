//! LLM HTTP Client
//!
//! This module provides a reusable HTTP client for making requests to LLM APIs,
//! with built-in retry logic, exponential backoff, and error handling.

use crate::error::{Result, SqlChatError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial retry delay in milliseconds
const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default timeout for HTTP requests (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP client for LLM API requests
#[derive(Clone)]
pub struct LLMHttpClient {
    /// Reqwest HTTP client
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial retry delay in milliseconds
    initial_delay_ms: u64,
}

impl LLMHttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
        })
    }

    /// Make a POST request, retrying transient failures
    ///
    /// # Arguments
    /// * `provider` - Provider name used in error messages
    /// * `url` - Request URL
    /// * `headers` - Request headers
    /// * `body` - Request body (serializable)
    ///
    /// # Returns
    /// Response body as string
    pub async fn post_with_retry<T: Serialize>(
        &self,
        provider: &str,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<String> {
        let mut attempt = 0;
        loop {
            debug!(provider, attempt, "sending LLM request");
            let sent = self
                .client
                .post(url)
                .headers(headers.clone())
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    let delay = self.calculate_delay(attempt);
                    warn!(provider, attempt, delay_ms = delay, "request failed, retrying: {}", e);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(SqlChatError::Http(e)),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }

            if self.should_retry(status, attempt) {
                let delay = self.calculate_delay(attempt);
                warn!(provider, attempt, delay_ms = delay, %status, "retryable status, backing off");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
                continue;
            }

            let response_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            return Err(SqlChatError::LLMApiError {
                provider: provider.to_string(),
                message: response_text,
                status: status.as_u16(),
            });
        }
    }

    /// Check if a request should be retried
    fn should_retry(&self, status: StatusCode, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        // Rate limiting, timeouts and server errors are transient
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    /// Calculate retry delay with exponential backoff
    fn calculate_delay(&self, attempt: u32) -> u64 {
        self.initial_delay_ms * 2_u64.pow(attempt)
    }

    /// Build standard headers for API requests
    pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SqlChatError::InvalidHeader("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = LLMHttpClient::new().unwrap();
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_http_client_with_timeout() {
        let client = LLMHttpClient::with_timeout(30).unwrap();
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(client.initial_delay_ms, DEFAULT_INITIAL_DELAY_MS);
    }

    #[test]
    fn test_retry_logic() {
        let client = LLMHttpClient::new().unwrap();

        // Should retry on server errors
        assert!(client.should_retry(StatusCode::INTERNAL_SERVER_ERROR, 0));
        assert!(client.should_retry(StatusCode::SERVICE_UNAVAILABLE, 0));

        // Should retry on rate limiting
        assert!(client.should_retry(StatusCode::TOO_MANY_REQUESTS, 0));

        // Should not retry on client errors
        assert!(!client.should_retry(StatusCode::BAD_REQUEST, 0));
        assert!(!client.should_retry(StatusCode::UNAUTHORIZED, 0));

        // Should not retry after max attempts
        assert!(!client.should_retry(StatusCode::INTERNAL_SERVER_ERROR, 5));
    }

    #[test]
    fn test_exponential_backoff() {
        let client = LLMHttpClient::new().unwrap();

        assert_eq!(client.calculate_delay(0), 1000);
        assert_eq!(client.calculate_delay(1), 2000);
        assert_eq!(client.calculate_delay(2), 4000);
    }

    #[test]
    fn test_headers_building() {
        let headers = LLMHttpClient::build_headers("test-key").unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer test-key");

        assert!(LLMHttpClient::build_headers("bad\nkey").is_err());
    }
}
