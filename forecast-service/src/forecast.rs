use chrono::{DateTime, Utc};
use common::errors::AppError;
use common::http_client::HttpClient;
use common::models::{Coordinates, NormalizedForecast};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api_client::OneCallClient;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::geocoding::{CoordinateResolver, ResolveError};
use crate::window;

/// One incoming lookup: a place name and the `at` parameter exactly as the
/// caller sent it. Validation into an instant happens in
/// [`ForecastService::forecast`].
#[derive(Debug, Clone)]
pub struct ForecastQuery {
    pub place: String,
    pub raw_at: Option<String>,
}

impl ForecastQuery {
    pub fn new(place: impl Into<String>, raw_at: Option<String>) -> Self {
        Self {
            place: place.into(),
            raw_at,
        }
    }
}

/// Cache key for a point, `current` standing in for "no instant"
pub fn cache_key(coordinates: Coordinates, instant: Option<DateTime<Utc>>) -> String {
    let when = instant
        .map(|t| t.timestamp().to_string())
        .unwrap_or_else(|| "current".to_string());
    format!("{},{},{}", coordinates.lat, coordinates.lon, when)
}

type Outcome = Result<NormalizedForecast, AppError>;

/// Resolves a place, validates the instant, then serves the forecast from
/// the cache or from exactly one upstream call.
pub struct ForecastService {
    resolver: CoordinateResolver,
    weather: OneCallClient,
    cache: Arc<TtlCache<NormalizedForecast>>,
    in_flight: InFlight,
}

impl ForecastService {
    pub fn new(
        config: &Config,
        http_client: Arc<HttpClient>,
        cache: Arc<TtlCache<NormalizedForecast>>,
    ) -> Self {
        Self {
            resolver: CoordinateResolver::new(http_client.clone(), config),
            weather: OneCallClient::new(http_client, config),
            cache,
            in_flight: InFlight::default(),
        }
    }

    pub fn cache(&self) -> &TtlCache<NormalizedForecast> {
        &self.cache
    }

    #[instrument(skip(self, query), fields(place = %query.place, at = ?query.raw_at))]
    pub async fn forecast(&self, query: &ForecastQuery) -> Result<NormalizedForecast, AppError> {
        let coordinates = self
            .resolver
            .resolve(&query.place)
            .await
            .map_err(|e| match e {
                ResolveError::NotFound => AppError::CityNotFound(query.place.clone()),
                ResolveError::Unavailable(reason) => AppError::GeocodingUnavailable {
                    city: query.place.clone(),
                    reason,
                },
            })?;

        let instant = window::validate(query.raw_at.as_deref())?;
        let key = cache_key(coordinates, instant);

        if let Some(cached) = self.cache.get(&key).await {
            info!(key = %key, "Cache hit");
            return Ok(cached);
        }

        loop {
            match self.in_flight.join(&key) {
                Flight::Leader(lead) => {
                    // A previous leader may have filled the cache between our
                    // miss and taking the lead.
                    if let Some(cached) = self.cache.get(&key).await {
                        return Ok(cached);
                    }

                    let outcome = self.weather.fetch(coordinates, instant).await;
                    if let Ok(forecast) = &outcome {
                        self.cache.set(key.clone(), forecast.clone()).await;
                    }
                    lead.finish(&outcome);
                    return outcome;
                }
                Flight::Follower(outcome) => {
                    if let Some(outcome) = wait_for_leader(outcome).await {
                        info!(key = %key, ok = outcome.is_ok(), "Shared outcome of concurrent request");
                        return outcome;
                    }
                    // The leader was cancelled before it finished: take over.
                    warn!(key = %key, "Concurrent request abandoned its fetch");
                }
            }
        }
    }
}

async fn wait_for_leader(mut outcome: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    match outcome.wait_for(Option::is_some).await {
        Ok(ready) => ready.clone(),
        Err(_) => None,
    }
}

/// Upstream fetches currently running, one per cache key
#[derive(Default)]
struct InFlight {
    flights: Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>,
}

enum Flight<'a> {
    Leader(FlightLead<'a>),
    Follower(watch::Receiver<Option<Outcome>>),
}

impl InFlight {
    fn join(&self, key: &str) -> Flight<'_> {
        let mut flights = self.flights.lock();
        if let Some(outcome) = flights.get(key) {
            return Flight::Follower(outcome.clone());
        }

        let (sender, receiver) = watch::channel(None);
        flights.insert(key.to_string(), receiver);
        Flight::Leader(FlightLead {
            owner: self,
            key: key.to_string(),
            sender,
        })
    }
}

/// Held by the one request that calls upstream for a key
struct FlightLead<'a> {
    owner: &'a InFlight,
    key: String,
    sender: watch::Sender<Option<Outcome>>,
}

impl FlightLead<'_> {
    fn finish(self, outcome: &Outcome) {
        self.sender.send_replace(Some(outcome.clone()));
    }
}

impl Drop for FlightLead<'_> {
    fn drop(&mut self) {
        // Runs before `sender` drops, so woken followers never find this key.
        self.owner.flights.lock().remove(&self.key);
    }
}
