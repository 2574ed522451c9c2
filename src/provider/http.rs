//! JSON-over-HTTP provider adapter.
//!
//! Each call is a `POST` of `{"operation": ..., "payload": ...}` to the
//! configured endpoint. A 2xx response body is returned as the call's value.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

use crate::error::{ProviderFailure, RelayError};
use crate::provider::ProviderAdapter;
use crate::resilience::Deadline;

/// Longest response body kept in a status failure message.
const MAX_BODY_CHARS: usize = 256;

#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: reqwest::Client,
    endpoint: Url,
    health_url: Option<Url>,
}

impl HttpAdapter {
    /// `api_key`, when set, is sent as a bearer token on every request.
    pub fn new(
        name: &str,
        endpoint: Url,
        api_key: Option<&str>,
        health_url: Option<Url>,
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| {
                RelayError::Adapter {
                    name: name.to_string(),
                    reason: "api key is not a valid header value".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("provider-relay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| RelayError::Adapter {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            health_url,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderFailure {
    let (timeout, connect, decode, request) = (
        error.is_timeout(),
        error.is_connect(),
        error.is_decode(),
        error.is_request() || error.is_body(),
    );
    let message = error.without_url().to_string();
    if timeout {
        ProviderFailure::Timeout(message)
    } else if connect || request {
        ProviderFailure::Connection(message)
    } else if decode {
        ProviderFailure::other("decode", message)
    } else {
        ProviderFailure::other("transport", message)
    }
}

async fn status_failure(response: reqwest::Response) -> ProviderFailure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message: String = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.chars().take(MAX_BODY_CHARS).collect()
    };
    ProviderFailure::status(status.as_u16(), message)
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    async fn call(
        &self,
        operation: &str,
        payload: &Value,
        deadline: Deadline,
    ) -> Result<Value, ProviderFailure> {
        if deadline.is_expired() {
            return Err(ProviderFailure::Timeout("deadline expired before send".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(deadline.remaining())
            .json(&json!({ "operation": operation, "payload": payload }))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(status_failure(response).await);
        }

        response.json::<Value>().await.map_err(map_transport_error)
    }

    async fn health_check(&self, deadline: Deadline) -> Result<bool, ProviderFailure> {
        let Some(url) = &self.health_url else {
            return Ok(false);
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(deadline.remaining())
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            Ok(true)
        } else {
            Err(status_failure(response).await)
        }
    }
}
