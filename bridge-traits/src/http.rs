//! HTTP Client Abstraction
//!
//! Provides async HTTP operations with ranged downloads, retry logic, and TLS support.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Request a byte range `[offset, offset + length)` of the resource.
    pub fn range(self, offset: u64, length: u64) -> Self {
        let end = offset.saturating_add(length).saturating_sub(1);
        self.header("Range", format!("bytes={}-{}", offset, end))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Get response body as UTF-8 string
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Async HTTP client trait
///
/// This trait abstracts HTTP operations to allow platform-specific
/// implementations. Implementations should handle:
/// - TLS certificate validation
/// - Connection pooling and keep-alive
/// - Separate connect and read timeouts
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
///
/// async fn fetch_data(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::get("https://api.example.com/data");
///     let response = client.execute(request).await?;
///     response.text()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - TLS validation fails
    /// - Request times out
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Download a byte range `[offset, offset + length)` from a URL.
    ///
    /// Servers that honor the `Range` header answer 206 with the requested
    /// window (possibly shorter at end of stream). Servers that ignore it
    /// answer 200 with the full resource from byte zero; the requested
    /// window is carved out of that body so callers always receive bytes
    /// starting at `offset`.
    async fn download_range(&self, url: &str, offset: u64, length: u64) -> Result<Bytes> {
        let request = HttpRequest::get(url).range(offset, length);
        let response = self.execute(request).await?;
        match response.status {
            206 => Ok(response.body),
            200 => {
                let start = offset as usize;
                if response.body.len() <= start {
                    return Err(BridgeError::OperationFailed(format!(
                        "Full response for {} ({} bytes) does not reach offset {}",
                        url,
                        response.body.len(),
                        offset
                    )));
                }
                let end = start.saturating_add(length as usize).min(response.body.len());
                Ok(response.body.slice(start..end))
            }
            status => Err(BridgeError::OperationFailed(format!(
                "Range request for {} returned HTTP {}",
                url, status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::get("https://example.com")
            .header("User-Agent", "test")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[test]
    fn test_range_header() {
        let request = HttpRequest::get("https://example.com/media").range(1024, 512);
        assert_eq!(
            request.headers.get("Range"),
            Some(&"bytes=1024-1535".to_string())
        );
    }

    #[test]
    fn test_http_response_status_checks() {
        let response = HttpResponse {
            status: 206,
            headers: HashMap::new(),
            body: Bytes::from("test"),
        };

        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());
    }

    struct FixedResponseClient {
        status: u16,
        body: Bytes,
    }

    #[async_trait]
    impl HttpClient for FixedResponseClient {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: self.body.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_download_range_passes_partial_content_through() {
        let client = FixedResponseClient {
            status: 206,
            body: Bytes::from_static(b"cdef"),
        };
        let body = client.download_range("https://m/x", 2, 4).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"cdef"));
    }

    #[tokio::test]
    async fn test_download_range_slices_full_response() {
        // A server that ignores Range and answers 200 with the whole
        // resource must not be mistaken for the requested window.
        let client = FixedResponseClient {
            status: 200,
            body: Bytes::from_static(b"abcdefghij"),
        };
        let body = client.download_range("https://m/x", 2, 4).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"cdef"));

        // Window running past the end of the resource is truncated.
        let body = client.download_range("https://m/x", 8, 100).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"ij"));
    }

    #[tokio::test]
    async fn test_download_range_rejects_body_short_of_offset() {
        let client = FixedResponseClient {
            status: 200,
            body: Bytes::from_static(b"abc"),
        };
        assert!(client.download_range("https://m/x", 10, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_download_range_rejects_error_status() {
        let client = FixedResponseClient {
            status: 404,
            body: Bytes::new(),
        };
        assert!(client.download_range("https://m/x", 0, 4).await.is_err());
    }
}
