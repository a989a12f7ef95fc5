// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::provider::auth::DEFAULT_TOKEN_TTL;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_API_BASE: &str = "https://api.bluecitrus.co/";
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Process settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub port: u16,
    pub api_base: Url,
    /// Origin allowed by CORS.
    pub app_url: String,
    pub projections_file: Option<PathBuf>,
    pub token_ttl: Duration,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("API_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::Configuration(format!("bad port {:?}: {}", raw, e)))?,
            None => DEFAULT_PORT,
        };

        let raw_base = get("BC_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&raw_base).map_err(|e| {
            AppError::Configuration(format!("bad BC_API_BASE {:?}: {}", raw_base, e))
        })?;

        let token_ttl = match get("TOKEN_TTL_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                AppError::Configuration(format!("bad TOKEN_TTL_SECS {:?}: {}", raw, e))
            })?,
            None => DEFAULT_TOKEN_TTL,
        };

        let raw_app_url = get("NEXT_PUBLIC_APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let app_url = app_origin(&raw_app_url)?;

        Ok(Self {
            client_id: get("BC_CLIENT_ID"),
            client_secret: get("BC_CLIENT_SECRET"),
            port,
            api_base,
            app_url,
            projections_file: get("PROJECTIONS_FILE").map(PathBuf::from),
            token_ttl,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Reduce the app URL to `scheme://host[:port]`, the form CORS compares against.
fn app_origin(raw: &str) -> Result<String> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::Configuration(format!("bad NEXT_PUBLIC_APP_URL {:?}: {}", raw, e)))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(AppError::Configuration(format!(
            "NEXT_PUBLIC_APP_URL {:?} has no origin",
            raw
        )));
    }
    Ok(origin.ascii_serialization())
}
