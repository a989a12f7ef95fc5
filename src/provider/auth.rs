// src/provider/auth.rs

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::endpoint_url;
use crate::error::{AppError, Result};
use crate::request::Endpoint;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Supplies the headers for every provider call.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    async fn headers(&self) -> Result<HeaderMap>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client-credentials token, cached in memory until `ttl` elapses.
pub struct TokenAuth {
    client: Client,
    base: Url,
    client_id: Option<String>,
    client_secret: Option<String>,
    ttl: Duration,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenAuth {
    pub fn new(
        client: Client,
        base: Url,
        client_id: Option<String>,
        client_secret: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            base,
            client_id,
            client_secret,
            ttl,
            cache: Mutex::new(None),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok((id, secret)),
            _ => Err(AppError::Configuration(
                "API credentials not configured".to_string(),
            )),
        }
    }

    /// Return the cached token or fetch a new one.
    pub async fn token(&self) -> Result<String> {
        let (id, secret) = self.credentials()?;

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(self.ttl, Instant::now()) {
                debug!("using cached token");
                return Ok(cached.token.clone());
            }
        }

        info!("fetching new access token");
        let url = endpoint_url(&self.base, Endpoint::Token)?;
        let resp = self
            .client
            .post(url)
            .basic_auth(id, Some(secret))
            .json(&serde_json::json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = resp.json().await?;
        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Provider {
                status: status.as_u16(),
                body: "no access token in response".to_string(),
            })?;

        *cache = Some(CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        });
        info!("token cached");
        Ok(token)
    }
}

#[async_trait]
impl HeaderSource for TokenAuth {
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token().await?;
        bearer_headers(&token)
    }
}

pub fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| AppError::Configuration(format!("token is not a valid header: {}", e)))?;
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}
