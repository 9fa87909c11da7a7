use crate::errors::AppError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Message field carried by upstream error bodies
#[derive(Deserialize)]
struct UpstreamErrorBody {
    message: Option<String>,
}

/// HTTP client that issues exactly one bounded request per call.
///
/// Failures are reported as-is: no retry, no backoff. Callers that need a
/// different error kind map the returned [`AppError`] themselves.
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Fetch JSON from `url`.
    ///
    /// `log_url` is what ends up in logs, so API keys can be left out of it.
    #[instrument(skip(self, url, log_url), fields(url = %log_url))]
    pub async fn get_json<T>(&self, url: &str, log_url: &str) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| AppError::timeout(format!("Request to {} timed out", log_url)))?
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::timeout(format!("Request to {} timed out", log_url))
                } else {
                    AppError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(AppError::from)?;

        // Only 200 carries a forecast body; anything else is passed through.
        if status != StatusCode::OK {
            let message = serde_json::from_str::<UpstreamErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(status = status.as_u16(), message = %message, "Upstream returned an error");
            return Err(AppError::upstream(status.as_u16(), message));
        }

        info!(status = status.as_u16(), "Request successful");

        serde_json::from_str(&text).map_err(|e| AppError::invalid_upstream(e.to_string()))
    }
}
