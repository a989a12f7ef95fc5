// src/api/mod.rs
//! warp routes for the keyword tools.

use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::error::{AppError, Result};
use crate::request::Intent;
use crate::service::KeywordService;
use crate::table::Table;

const DEFAULT_SEARCH_TYPE: &str = "ai-phrase";

/// What `/api/debug` may reveal: presence of credentials, never their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    pub has_client_id: bool,
    pub has_client_secret: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinderBody {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    search_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniverseBody {
    #[serde(default)]
    keywords: Option<String>,
    #[serde(default)]
    asins: Option<String>,
    #[serde(default)]
    levels: Option<i64>,
    #[serde(default)]
    own_brand: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    keywords: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn error_response(status: StatusCode, error: String, details: Option<String>) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error, details }), status)
        .into_response()
}

fn respond(route: &'static str, result: Result<Table>) -> Response {
    match result {
        Ok(table) => {
            info!(route, rows = table.len(), "ok");
            warp::reply::json(&table).into_response()
        }
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            warn!(route, status = status.as_u16(), error = %err, "request failed");
            let details = match &err {
                AppError::Validation(v) => Some(v.code().to_string()),
                _ => None,
            };
            error_response(status, err.to_string(), details)
        }
    }
}

async fn health_check() -> std::result::Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME")
    })))
}

async fn debug_info(diag: Diagnostics) -> std::result::Result<impl Reply, Rejection> {
    let body = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "hasClientId": diag.has_client_id,
        "hasClientSecret": diag.has_client_secret,
    });
    Ok(warp::reply::with_header(
        warp::reply::json(&body),
        "cache-control",
        "no-store, no-cache, must-revalidate",
    ))
}

async fn keyword_finder(
    body: FinderBody,
    service: Arc<KeywordService>,
) -> std::result::Result<Response, Rejection> {
    let search_type = body.search_type.as_deref().unwrap_or(DEFAULT_SEARCH_TYPE);
    let result = match Intent::from_search_type(search_type) {
        Ok(intent) => service.search(intent, body.input.as_deref().unwrap_or("")).await,
        Err(e) => Err(e.into()),
    };
    Ok(respond("keyword-finder", result))
}

async fn keyword_universe(
    body: UniverseBody,
    service: Arc<KeywordService>,
) -> std::result::Result<Response, Rejection> {
    let result = service
        .expand(
            body.keywords.as_deref().unwrap_or(""),
            body.asins.as_deref().unwrap_or(""),
            body.levels,
            body.own_brand.as_deref(),
        )
        .await;
    Ok(respond("keyword-universe", result))
}

async fn keyword_history(
    body: HistoryBody,
    service: Arc<KeywordService>,
) -> std::result::Result<Response, Rejection> {
    let result = service
        .history(body.keywords.as_deref().unwrap_or(""))
        .await;
    Ok(respond("keyword-history", result))
}

/// Map warp's own rejections onto the same `{error, details}` body.
async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    let (status, message, details) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string(), None)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            "invalid request body".to_string(),
            Some(e.to_string()),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
            None,
        )
    } else {
        warn!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
            None,
        )
    };
    Ok(error_response(status, message, details))
}

fn with_service(
    service: Arc<KeywordService>,
) -> impl Filter<Extract = (Arc<KeywordService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// All routes, without CORS.
pub fn api(
    service: Arc<KeywordService>,
    diag: Diagnostics,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check)
        .map(Reply::into_response);

    let debug = warp::path!("api" / "debug")
        .and(warp::get())
        .and(warp::any().map(move || diag))
        .and_then(debug_info)
        .map(Reply::into_response);

    let finder = warp::path!("api" / "keyword-finder")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(keyword_finder);

    let universe = warp::path!("api" / "keyword-universe")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(keyword_universe);

    let history = warp::path!("api" / "keyword-history")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(keyword_history);

    health
        .or(debug)
        .unify()
        .or(finder)
        .unify()
        .or(universe)
        .unify()
        .or(history)
        .unify()
        .recover(handle_rejection)
        .unify()
}

/// The served filter: routes plus CORS for the app origin and request tracing.
pub fn routes(
    service: Arc<KeywordService>,
    diag: Diagnostics,
    app_origin: &str,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_origin(app_origin)
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"])
        .allow_credentials(true);

    api(service, diag)
        .with(cors)
        .with(warp::trace::request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ProjectionSpecs;
    use crate::provider::mock::MockProvider;
    use crate::request::Endpoint;
    use serde_json::Value;

    fn filter(
        mock: MockProvider,
    ) -> (
        Arc<MockProvider>,
        impl Filter<Extract = (Response,), Error = Infallible> + Clone,
    ) {
        let mock = Arc::new(mock);
        let service = Arc::new(
            KeywordService::new(mock.clone(), ProjectionSpecs::default()).with_decay_seed(3),
        );
        let diag = Diagnostics {
            has_client_id: true,
            has_client_secret: false,
        };
        (mock, api(service, diag))
    }

    fn body<B: AsRef<[u8]>>(resp: &warp::http::Response<B>) -> Value {
        serde_json::from_slice(resp.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_, api) = filter(MockProvider::new());
        let resp = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["status"], "healthy");
    }

    #[tokio::test]
    async fn debug_reports_presence_only() {
        let (_, api) = filter(MockProvider::new());
        let resp = warp::test::request().path("/api/debug").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["cache-control"],
            "no-store, no-cache, must-revalidate"
        );
        let v = body(&resp);
        assert_eq!(v["hasClientId"], true);
        assert_eq!(v["hasClientSecret"], false);
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
        assert!(v["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn finder_defaults_to_phrase_search() {
        let (mock, api) = filter(MockProvider::new().reply(
            Endpoint::LikeTerms,
            json!([{"search_term": "tent", "search_volume": 10, "relevancy": 1}]),
        ));
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-finder")
            .json(&json!({"input": "tent"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body(&resp),
            json!([["Relevancy Rank", "Search Term", "Search Volume"], [1, "tent", 10]])
        );
        assert_eq!(mock.calls()[0].0, Endpoint::LikeTerms);
    }

    #[tokio::test]
    async fn unknown_search_type_is_400() {
        let (mock, api) = filter(MockProvider::new());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-finder")
            .json(&json!({"input": "tent", "searchType": "telepathy"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["details"], "unknown-search-type");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn universe_without_input_is_400() {
        let (mock, api) = filter(MockProvider::new());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-universe")
            .json(&json!({"keywords": "", "asins": "", "levels": 2}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["details"], "missing-input");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn universe_sentinel_on_empty() {
        let (_, api) = filter(
            MockProvider::new()
                .reply(Endpoint::KeywordFlatLandscape, json!({"overview": []}))
                .fail(Endpoint::LikeTerms, 500, "down"),
        );
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-universe")
            .json(&json!({"keywords": "tent", "ownBrand": "Acme"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp), json!([["NO DATA"]]));
    }

    #[tokio::test]
    async fn provider_failure_is_502() {
        let (_, api) = filter(MockProvider::new().fail(Endpoint::KeywordVolumeHistory, 401, "expired"));
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-history")
            .json(&json!({"keywords": "tent"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let v = body(&resp);
        assert!(v["error"].as_str().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (_, api) = filter(MockProvider::new());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/keyword-history")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["error"], "invalid request body");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (_, api) = filter(MockProvider::new());
        let resp = warp::test::request().path("/api/nope").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_app_origin() {
        let service = Arc::new(KeywordService::new(
            Arc::new(MockProvider::new()),
            ProjectionSpecs::default(),
        ));
        let routes = routes(service, Diagnostics::default(), "http://localhost:3000");
        let resp = warp::test::request()
            .path("/health")
            .header("origin", "http://localhost:3000")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
