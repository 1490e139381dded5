//! services/api/src/adapters/deepseek.rs
//!
//! HTTP transport to the DeepSeek chat-completions API. It implements the
//! `CompletionTransport` port and knows nothing about caching or retries.

use async_trait::async_trait;
use autodoc_core::ports::{CompletionTransport, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DeepSeekTransport {
    client: Client,
    api_url: String,
    api_key: String,
}

impl DeepSeekTransport {
    /// Builds the shared HTTP client with a fixed request timeout.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        let api_key = api_key.into();
        if api_key.is_empty() {
            warn!("DEEPSEEK_API_KEY is empty; AI requests will be rejected by the API");
        }
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl CompletionTransport for DeepSeekTransport {
    async fn post_json(&self, endpoint: &str, payload: &Value) -> PortResult<Value> {
        let url = self.url_for(endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::Upstream {
                status: None,
                message: format!("Request to {} failed: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream {
                status: Some(status.as_u16()),
                message: api_error_message(status, &body),
            });
        }

        let body = response.bytes().await.map_err(|e| PortError::Upstream {
            status: None,
            message: format!("Reading the response from {} failed: {}", url, e),
        })?;
        decode_success_body(&url, &body)
    }
}

/// A success reply that is not JSON was still billed, so it must not be retried.
fn decode_success_body(url: &str, body: &[u8]) -> PortResult<Value> {
    serde_json::from_slice(body)
        .map_err(|e| PortError::Unexpected(format!("Invalid JSON from {}: {}", url, e)))
}

/// Prefers the API's own `error.message`, falling back to the status line.
fn api_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_comes_from_the_body_when_present() {
        let body =
            r#"{"error": {"message": "Authentication Fails", "type": "authentication_error"}}"#;
        assert_eq!(api_error_message(StatusCode::UNAUTHORIZED, body), "Authentication Fails");
        assert_eq!(
            api_error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            "HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn endpoint_is_joined_onto_the_base_url() {
        let transport = DeepSeekTransport::new(
            "https://api.deepseek.com/v1/",
            "key",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            transport.url_for("chat/completions"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn unparseable_success_body_is_not_retryable() {
        let err = decode_success_body("https://api.deepseek.com/v1/chat/completions", b"<html>")
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
        assert!(!err.is_transient());

        let ok = decode_success_body("u", br#"{"choices": []}"#).unwrap();
        assert_eq!(ok["choices"], serde_json::json!([]));
    }
}
