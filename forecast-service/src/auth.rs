use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use common::errors::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Cannot read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credentials file {path} is not a JSON object of user to bcrypt hash: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Username to bcrypt hash
#[derive(Debug, Default)]
pub struct Credentials {
    users: HashMap<String, String>,
}

impl Credentials {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    pub async fn load(path: &Path) -> Result<Self, CredentialsError> {
        let payload = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let users: HashMap<String, String> =
            serde_json::from_str(&payload).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), users = users.len(), "Loaded basic auth credentials");
        Ok(Self::new(users))
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|hash| bcrypt::verify(password, hash).unwrap_or(false))
    }
}

/// Extract `(user, password)` from an `Authorization: Basic` header
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::auth("Missing Authorization header"))?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or_else(|| AppError::auth("Invalid Authorization header format"))?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| AppError::auth("Invalid Authorization header encoding"))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AppError::auth("Invalid Authorization header format"))?;

    Ok((username.to_string(), password.to_string()))
}

/// Middleware rejecting requests without valid basic auth credentials
pub async fn require_basic_auth(
    State(credentials): State<Arc<Credentials>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (username, password) = basic_credentials(request.headers())?;

    if !credentials.verify(&username, &password) {
        warn!(user = %username, "Rejected basic auth credentials");
        return Err(AppError::auth("Invalid username or password"));
    }

    Ok(next.run(request).await)
}
