use crate::{
    Result,
    error::ValidationError,
};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const STATUS_CACHE_TTL: Duration = Duration::from_millis(2_000);
pub const BASE_URL_ENV: &str = "SUPRA_API_BASE_URL";
pub const STATUS_TTL_ENV: &str = "SUPRA_STATUS_TTL_MS";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub status_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            status_ttl: STATUS_CACHE_TTL,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads `SUPRA_API_BASE_URL` and `SUPRA_STATUS_TTL_MS`, keeping defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            config.base_url = trim_base_url(url);
        }
        if let Some(raw) = lookup(STATUS_TTL_ENV) {
            let millis = raw.trim().parse::<u64>().map_err(|_| {
                ValidationError::invalid(
                    STATUS_TTL_ENV,
                    format!("expected milliseconds, got '{raw}'"),
                )
            })?;
            config.status_ttl = Duration::from_millis(millis);
        }
        tracing::debug!(
            "supra client configured for {} (status ttl {:?})",
            config.base_url,
            config.status_ttl
        );
        Ok(config)
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn from_lookup__uses_defaults_when_unset() {
        // when
        let config = ClientConfig::from_lookup(|_| None).unwrap();

        // then
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.status_ttl, Duration::from_secs(2));
    }

    #[test]
    fn from_lookup__reads_overrides_and_trims_trailing_slash() {
        // given
        let vars = HashMap::from([
            (BASE_URL_ENV, "https://supra.example/api/"),
            (STATUS_TTL_ENV, "500"),
        ]);

        // when
        let config =
            ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
                .unwrap();

        // then
        assert_eq!(config.base_url, "https://supra.example/api");
        assert_eq!(config.status_ttl, Duration::from_millis(500));
    }

    #[test]
    fn from_lookup__rejects_non_numeric_ttl() {
        // given
        let lookup = |key: &str| (key == STATUS_TTL_ENV).then(|| "soon".to_string());

        // when
        let result = ClientConfig::from_lookup(lookup);

        // then
        assert!(result.unwrap_err().is_validation());
    }
}
