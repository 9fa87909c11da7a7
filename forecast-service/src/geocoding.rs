use common::http_client::HttpClient;
use common::models::Coordinates;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::Config;

/// Why a place name could not be turned into coordinates.
///
/// Both variants surface to callers as `city_not_found`; they are kept apart
/// so logs show whether the city is unknown or the geocoder is failing.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no geocoding candidates")]
    NotFound,

    #[error("geocoding lookup failed: {0}")]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
struct GeocodingCandidate {
    lat: f64,
    lon: f64,
}

pub struct CoordinateResolver {
    http_client: Arc<HttpClient>,
    geocoding_url: String,
    api_key: String,
}

impl CoordinateResolver {
    pub fn new(http_client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            http_client,
            geocoding_url: config.geocoding_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    #[instrument(skip(self), fields(place = %place))]
    pub async fn resolve(&self, place: &str) -> Result<Coordinates, ResolveError> {
        let encoded_place = urlencoding::encode(place);
        let log_url = format!("{}?q={}&limit=1", self.geocoding_url, encoded_place);
        let url = format!("{}&appid={}", log_url, urlencoding::encode(&self.api_key));

        let candidates: Vec<GeocodingCandidate> = self
            .http_client
            .get_json(&url, &log_url)
            .await
            .map_err(|e| {
                error!(place = %place, error = %e, "Geocoding API error");
                ResolveError::Unavailable(e.to_string())
            })?;

        let Some(best) = candidates.into_iter().next() else {
            warn!(place = %place, "City not found");
            return Err(ResolveError::NotFound);
        };

        info!(place = %place, lat = best.lat, lon = best.lon, "Resolved coordinates");
        Ok(Coordinates {
            lat: best.lat,
            lon: best.lon,
        })
    }
}
