use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Every failure the forecast pipeline can surface to a caller.
///
/// `Clone` so one upstream outcome can be handed to every request that
/// waited on it.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Cannot find city '{0}'")]
    CityNotFound(String),

    #[error("Geocoding lookup for '{city}' failed: {reason}")]
    GeocodingUnavailable { city: String, reason: String },

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Date must not be earlier than {earliest}")]
    DateTooFarPast { earliest: String },

    #[error("Date must not be more than {horizon_days} days in the future")]
    DateTooFarFuture { horizon_days: i64 },

    #[error("{message}")]
    UpstreamError { status: u16, message: String },

    #[error("Invalid data format in upstream response: {0}")]
    InvalidUpstreamFormat(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError(message.into())
    }

    pub fn invalid_upstream(message: impl Into<String>) -> Self {
        Self::InvalidUpstreamFormat(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::CityNotFound(_) | AppError::GeocodingUnavailable { .. } => {
                StatusCode::NOT_FOUND
            }
            AppError::InvalidDateFormat(_)
            | AppError::DateTooFarPast { .. }
            | AppError::DateTooFarFuture { .. } => StatusCode::BAD_REQUEST,
            AppError::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::InvalidUpstreamFormat(_) => StatusCode::BAD_GATEWAY,
            AppError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::CityNotFound(_) | AppError::GeocodingUnavailable { .. } => "city_not_found",
            AppError::InvalidDateFormat(_) => "invalid_date_format",
            AppError::DateTooFarPast { .. } | AppError::DateTooFarFuture { .. } => "invalid_date",
            AppError::UpstreamError { .. } => "upstream_error",
            AppError::InvalidUpstreamFormat(_) => "invalid_upstream_format",
            AppError::TimeoutError(_) | AppError::NetworkError(_) => "upstream_unavailable",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::AuthError(_) => "unauthorized",
            AppError::InternalError(_) => "internal_server_error",
        }
    }

    /// Message exposed to the caller. Geocoding failures keep the
    /// city-not-found wording and internal failures hide their cause.
    fn public_message(&self) -> String {
        match self {
            AppError::GeocodingUnavailable { city, .. } => format!("Cannot find city '{}'", city),
            AppError::InternalError(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::TimeoutError(err.to_string())
        } else {
            AppError::NetworkError(err.to_string())
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::InternalError(cause) = &self {
            error!(cause = %cause, "Unhandled failure");
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });

        if matches!(self, AppError::AuthError(_)) {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"forecast\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}
