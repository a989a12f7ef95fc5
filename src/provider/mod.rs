// src/provider/mod.rs

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use url::Url;

use crate::error::{AppError, Result};
use crate::request::{Endpoint, ProviderRequest};

pub mod auth;
#[cfg(test)]
pub(crate) mod mock;

pub use auth::{bearer_headers, HeaderSource, TokenAuth};

/// The external analytics provider: one JSON POST per call.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<Value>;

    async fn send(&self, request: &ProviderRequest) -> Result<Value> {
        self.call(request.endpoint, &request.payload).await
    }
}

/// Join an endpoint onto the API base, tolerating a base without a trailing slash.
pub fn endpoint_url(base: &Url, endpoint: Endpoint) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(endpoint.path())
        .map_err(|e| AppError::Configuration(format!("bad endpoint url for {}: {}", endpoint, e)))
}

/// `reqwest`-backed provider. Auth headers come from an injected [`HeaderSource`].
pub struct HttpProvider {
    client: Client,
    base: Url,
    auth: Arc<dyn HeaderSource>,
}

impl HttpProvider {
    pub fn new(client: Client, base: Url, auth: Arc<dyn HeaderSource>) -> Self {
        Self { client, base, auth }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    #[instrument(level = "info", skip(self, payload), fields(endpoint = %endpoint))]
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<Value> {
        let headers = self.auth.headers().await?;
        let url = endpoint_url(&self.base, endpoint)?;
        debug!(%url, %payload, "POST");

        let resp = self
            .client
            .post(url)
            .headers(headers)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "provider returned non-success");
            return Err(AppError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        debug!(bytes = body.len(), "provider response decoded");
        Ok(value)
    }
}
