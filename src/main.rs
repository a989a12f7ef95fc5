use anyhow::Result;
use keyword_lens::api::{self, Diagnostics};
use keyword_lens::config::Settings;
use keyword_lens::service::KeywordService;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    // ─── 1) init logging ─────────────────────────────────────────────
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(settings.log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();

    info!("Starting keyword tools service");

    // ─── 2) wire provider + service ──────────────────────────────────
    let service = Arc::new(KeywordService::from_settings(&settings)?);
    let diag = Diagnostics {
        has_client_id: settings.client_id.is_some(),
        has_client_secret: settings.client_secret.is_some(),
    };

    // ─── 3) serve ────────────────────────────────────────────────────
    let routes = api::routes(service, diag, &settings.app_url);
    let port = settings.port;

    info!(port, api_base = %settings.api_base, "Server starting");
    info!("Health check: http://localhost:{}/health", port);
    info!(origin = %settings.app_url, "CORS origin");

    warp::serve(routes).run(([0, 0, 0, 0], port)).await;

    Ok(())
}
