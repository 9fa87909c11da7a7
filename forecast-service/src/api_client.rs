use chrono::{DateTime, Utc};
use common::errors::AppError;
use common::http_client::HttpClient;
use common::models::{Coordinates, NormalizedForecast};
use serde::Deserialize;
use serde_json::Number;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::config::Config;

const EXCLUDE: &str = "minutely,daily,alerts";

/// One observation as the One Call API reports it
#[derive(Debug, Deserialize)]
pub struct DataPoint {
    temp: Option<Number>,
    pressure: Option<Number>,
    humidity: Option<Number>,
    clouds: Option<Number>,
    rain: Option<Rain>,
}

#[derive(Debug, Deserialize)]
struct Rain {
    #[serde(rename = "1h")]
    one_hour: Option<Number>,
}

/// The two shapes the provider answers with. `data` wins when both fields
/// are present.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    Historical { data: Vec<DataPoint> },
    Current { current: DataPoint },
}

impl UpstreamPayload {
    /// Reduce either shape to the stable forecast contract.
    pub fn normalize(self) -> Result<NormalizedForecast, AppError> {
        let point = match self {
            UpstreamPayload::Current { current } => current,
            UpstreamPayload::Historical { data } => data
                .into_iter()
                .next()
                .ok_or_else(|| AppError::invalid_upstream("historical response has no data points"))?,
        };

        Ok(NormalizedForecast {
            temperature: with_unit(point.temp.as_ref(), "C"),
            pressure: with_unit(point.pressure.as_ref(), "hPa"),
            humidity: with_unit(point.humidity.as_ref(), "%"),
            clouds: with_unit(point.clouds.as_ref(), "%"),
            rain: point
                .rain
                .and_then(|rain| rain.one_hour)
                .map(|mm| format!("{}mm", mm)),
        })
    }
}

fn with_unit(value: Option<&Number>, unit: &str) -> String {
    match value {
        Some(value) => format!("{}{}", value, unit),
        None => format!("N/A{}", unit),
    }
}

/// Client for the current and time-machine weather endpoints
pub struct OneCallClient {
    http_client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
}

impl OneCallClient {
    pub fn new(http_client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            http_client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Current conditions when `instant` is `None`, otherwise the historical
    /// data point at `instant`. One request, no retry.
    #[instrument(skip(self, coordinates), fields(lat = coordinates.lat, lon = coordinates.lon))]
    pub async fn fetch(
        &self,
        coordinates: Coordinates,
        instant: Option<DateTime<Utc>>,
    ) -> Result<NormalizedForecast, AppError> {
        let log_url = self.request_url(coordinates, instant);
        let url = format!("{}&appid={}", log_url, urlencoding::encode(&self.api_key));

        info!(url = %log_url, "Fetching weather from API");

        let payload: UpstreamPayload = self.http_client.get_json(&url, &log_url).await?;

        payload.normalize().inspect_err(|e| {
            error!(error = %e, "Invalid data format in response");
        })
    }

    fn request_url(&self, coordinates: Coordinates, instant: Option<DateTime<Utc>>) -> String {
        let endpoint = match instant {
            Some(_) => format!("{}/timemachine", self.base_url),
            None => self.base_url.clone(),
        };

        let mut url = format!(
            "{}?lat={}&lon={}&units=metric&exclude={}",
            endpoint,
            coordinates.lat,
            coordinates.lon,
            urlencoding::encode(EXCLUDE)
        );
        if let Some(instant) = instant {
            url.push_str(&format!("&dt={}", instant.timestamp()));
        }
        url
    }
}
