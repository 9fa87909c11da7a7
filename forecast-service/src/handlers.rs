use axum::{
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use common::errors::AppError;
use common::models::{ErrorResponse, NormalizedForecast, PingResponse};
use serde::Deserialize;
use std::any::Any;
use std::sync::Arc;
use tracing::info;
use utoipa::IntoParams;

use crate::forecast::{ForecastQuery, ForecastService};

#[derive(Clone)]
pub struct AppState {
    pub forecast: Arc<ForecastService>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health check")
    )
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "forecast-service" }))
}

#[utoipa::path(
    get,
    path = "/ping",
    responses(
        (status = 200, description = "Service name, status and version", body = PingResponse)
    )
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ForecastParams {
    /// ISO 8601 date or datetime; omit for current conditions
    pub at: Option<String>,
}

#[utoipa::path(
    get,
    path = "/forecast/{city}",
    params(
        ("city" = String, Path, description = "City name"),
        ForecastParams,
    ),
    responses(
        (status = 200, description = "Weather for the city", body = NormalizedForecast),
        (status = 400, description = "Malformed request or out-of-range date", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 404, description = "City could not be resolved", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "forecast"
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    city: Result<Path<String>, PathRejection>,
    params: Result<Query<ForecastParams>, QueryRejection>,
) -> Result<Json<NormalizedForecast>, AppError> {
    let Path(city) = city?;
    let Query(params) = params?;
    info!(city = %city, at = ?params.at, "Forecast request received");

    let query = ForecastQuery::new(city, params.at);
    let forecast = state.forecast.forecast(&query).await?;

    Ok(Json(forecast))
}

pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            error_code: "not_found".to_string(),
        }),
    )
}

/// Turn a handler panic into the uniform 500 body
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    AppError::internal(detail).into_response()
}
