// ABOUTME: Outbound HTTP helper shared by reactors and the Discord REST calls
// ABOUTME: Wraps reqwest with JSON in/out and a typed error for transport, status and decode failures

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use reqwest::Method;

const USER_AGENT: &str = concat!("igor/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shared HTTP client. Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, RequestError> {
        let mut defaults = HeaderMap::new();
        defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(defaults)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| RequestError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    /// Send a request and decode the JSON reply.
    ///
    /// `body`, when present, is sent as JSON. A successful reply with an
    /// empty body decodes to `Value::Null`. Non-2xx replies become
    /// [`RequestError::Status`] carrying a truncated body.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value, RequestError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RequestError::Invalid(format!("bad url {}: {}", url, e)))?;

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RequestError::Invalid(format!("bad header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RequestError::Invalid(format!("bad header value for {}: {}", name, e)))?;
            header_map.insert(name, value);
        }

        tracing::debug!(method = %method, host = ?parsed.host_str(), "Sending request");

        let mut builder = self.client.request(method.clone(), parsed).headers(header_map);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| RequestError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| RequestError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(RequestError::Status {
                method,
                url: url.to_string(),
                status,
                body,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| RequestError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, RequestError> {
        self.request(Method::GET, url, None, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_sending() {
        let client = HttpClient::new().unwrap();
        let err = client.get_json("not a url").await.unwrap_err();
        assert!(matches!(err, RequestError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected() {
        let client = HttpClient::new().unwrap();
        let err = client
            .request(Method::GET, "http://127.0.0.1:1/", None, &[("bad header", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Invalid(_)));
    }

    #[test]
    fn test_status_accessor() {
        let err = RequestError::Invalid("x".to_string());
        assert!(err.status().is_none());
    }
}
