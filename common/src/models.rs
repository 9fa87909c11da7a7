use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable forecast contract, whichever upstream shape produced it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct NormalizedForecast {
    #[schema(example = "15C")]
    pub temperature: String,
    #[schema(example = "1013hPa")]
    pub pressure: String,
    #[schema(example = "73%")]
    pub humidity: String,
    #[schema(example = "90%")]
    pub clouds: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "0.5mm")]
    pub rain: Option<String>,
}

/// Best-match position of a place name
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Error body returned for every non-200 response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[schema(example = "city_not_found")]
    pub error_code: String,
}

/// Liveness response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PingResponse {
    pub name: String,
    pub status: String,
    pub version: String,
}
