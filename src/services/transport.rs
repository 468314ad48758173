//! HTTP transport collaborator used by active rules.
//!
//! The engine never opens sockets itself; it hands an [`HttpRequest`] to an
//! [`HttpSender`] and gets back the received response, synchronously from
//! the rule's point of view.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::http::{HttpRequest, HttpResponse};

/// Sends one request and returns the received response.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ScanError>;
}

/// Production sender over a shared reqwest client.
///
/// Redirects are not followed: attack-and-compare rules need to see the raw
/// response to each probe. Invalid certificates are tolerated since scan
/// targets frequently run self-signed staging TLS.
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(timeout_secs: u64) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ScanError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ScanError::Validation(format!("invalid method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            version: "HTTP/1.1".to_string(),
            headers,
            body,
        })
    }
}
