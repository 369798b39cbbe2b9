//! Route configuration and setup.

mod health;

use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use health::{liveness_check, readiness_check};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tubely_core::Config;
use tubely_processing::AssetClass;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected_routes = protected_routes(&state).layer(axum::middleware::from_fn_with_state(
        state.jwt.clone(),
        crate::auth::middleware::auth_middleware,
    ));

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let app = public_routes(config)
        .merge(protected_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn protected_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let body_limit = |class: AssetClass| {
        let max = state.media.ingest.validator(class).max_file_size();
        DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD_BYTES))
    };

    Router::new()
        .route(
            "/videos/{id}/video",
            post(handlers::video_upload::upload_video).layer(body_limit(AssetClass::Video)),
        )
        .route(
            "/videos/{id}/thumbnail",
            post(handlers::thumbnail_upload::upload_thumbnail)
                .layer(body_limit(AssetClass::Thumbnail)),
        )
}

fn public_routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
        .route(
            "/thumbnails/{id}",
            get(handlers::thumbnail_get::get_thumbnail),
        )
        .route(
            "/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .nest_service("/assets", ServeDir::new(config.assets_root()))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
