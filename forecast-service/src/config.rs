use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub base_url: String,
    pub geocoding_url: String,
    pub cache_ttl_seconds: u64,
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub auth_users_file: Option<PathBuf>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_var("PORT", 8080)?,
            api_key: env::var("OPENWEATHER_API_KEY")
                .map_err(|_| ConfigError::Missing("OPENWEATHER_API_KEY"))?,
            base_url: env::var("OPENWEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org/data/3.0/onecall".to_string()),
            geocoding_url: env::var("OPENWEATHER_GEOCODING_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org/geo/1.0/direct".to_string()),
            cache_ttl_seconds: parse_var("CACHE_TTL_SECONDS", 10)?,
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 5)?,
            auth_users_file: env::var("AUTH_USERS_FILE").ok().map(PathBuf::from),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        })
    }

    /// Configuration pointing at the given upstream, with caching in memory
    /// and authentication off
    pub fn for_upstream(base_url: impl Into<String>, geocoding_url: impl Into<String>) -> Self {
        Self {
            port: 0,
            api_key: "test_api_key".to_string(),
            base_url: base_url.into(),
            geocoding_url: geocoding_url.into(),
            cache_ttl_seconds: 10,
            cache_dir: None,
            request_timeout_secs: 5,
            auth_users_file: None,
            log_format: "pretty".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u64 = parse_var("FORECAST_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_for_upstream_disables_optional_layers() {
        let config = Config::for_upstream("http://weather", "http://geo");
        assert_eq!(config.base_url, "http://weather");
        assert_eq!(config.geocoding_url, "http://geo");
        assert!(config.cache_dir.is_none());
        assert!(config.auth_users_file.is_none());
    }
}
