//! Weather by place name: geocode, validate the requested instant, then serve
//! current or historical conditions through a TTL cache.

pub mod api_client;
pub mod auth;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod geocoding;
pub mod handlers;
pub mod openapi;
pub mod window;

use axum::{Router, middleware, routing::get};
use common::http_client::HttpClient;
use common::models::NormalizedForecast;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::Credentials;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::forecast::ForecastService;
use crate::handlers::AppState;

/// Wire the HTTP client, cache and forecast pipeline from `config`
pub async fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let http_client = Arc::new(HttpClient::new(config.request_timeout_secs)?);

    let cache: TtlCache<NormalizedForecast> = match &config.cache_dir {
        Some(dir) => TtlCache::persistent(dir, config.cache_ttl_seconds).await?,
        None => TtlCache::in_memory(config.cache_ttl_seconds),
    };
    info!(
        ttl_seconds = config.cache_ttl_seconds,
        persistent = config.cache_dir.is_some(),
        "Cache ready"
    );

    let forecast = ForecastService::new(config, http_client, Arc::new(cache));

    Ok(AppState {
        forecast: Arc::new(forecast),
    })
}

/// Load basic auth credentials when a users file is configured
pub async fn load_credentials(
    config: &Config,
) -> Result<Option<Arc<Credentials>>, Box<dyn std::error::Error>> {
    match &config.auth_users_file {
        Some(path) => Ok(Some(Arc::new(Credentials::load(path).await?))),
        None => Ok(None),
    }
}

pub fn create_router(state: AppState, credentials: Option<Arc<Credentials>>) -> Router {
    let mut forecast_routes = Router::new()
        .route("/forecast/{city}", get(handlers::get_forecast))
        .route("/forecast/{city}/", get(handlers::get_forecast));

    if let Some(credentials) = credentials {
        forecast_routes = forecast_routes.route_layer(middleware::from_fn_with_state(
            credentials,
            auth::require_basic_auth,
        ));
    }

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
        .route("/ping/", get(handlers::ping));

    public_routes
        .merge(forecast_routes)
        .merge(openapi::swagger_ui())
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
