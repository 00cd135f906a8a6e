//! Provider configuration.
//!
//! Values come from the provider block first, then from the environment,
//! then from defaults. The environment is passed in as a lookup function so
//! resolution never reads process state on its own.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Default nOps API URL.
pub const DEFAULT_HOST: &str = "https://app.nops.io";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "NOPS_API_KEY";

/// Environment variable holding the API URL.
pub const HOST_ENV: &str = "NOPS_HOST";

/// Ceiling for a single HTTP call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared environment lookup, `std::env::var` in production.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by the process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name).ok())
}

/// The provider block as written by the practitioner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProviderConfig {
    /// API key, may also come from `NOPS_API_KEY`.
    #[serde(default)]
    pub nops_api_key: Option<String>,
    /// API URL, may also come from `NOPS_HOST`.
    #[serde(default)]
    pub nops_host: Option<String>,
}

/// Fully resolved client configuration.
#[derive(Debug)]
pub struct ProviderConfig {
    /// API key sent as `X-Nops-Api-Key`. Only the client exposes it.
    pub api_key: SecretString,
    /// Base URL, without trailing slash.
    pub host: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Build a configuration directly.
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            host: host.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the configuration in priority order: explicit value,
    /// environment variable, default. Empty strings count as unset.
    ///
    /// A missing API key is a configuration error.
    pub fn resolve(
        raw: &RawProviderConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = first_non_empty(raw.nops_api_key.clone(), env(API_KEY_ENV)).ok_or_else(
            || {
                ProviderError::Configuration(format!(
                    "The provider cannot create the nOps API client as there is a missing or empty value for the nOps API key. \
                     Set the API key value in the configuration or use the {} environment variable. \
                     If either is already set, ensure the value is not empty.",
                    API_KEY_ENV
                ))
            },
        )?;

        let host = first_non_empty(raw.nops_host.clone(), env(HOST_ENV))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        Ok(Self::new(api_key, host))
    }
}

fn first_non_empty(explicit: Option<String>, from_env: Option<String>) -> Option<String> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| from_env.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_values_win() {
        let raw = RawProviderConfig {
            nops_api_key: Some("explicit-key".to_string()),
            nops_host: Some("https://staging.nops.io/".to_string()),
        };
        let env = env_of(&[(API_KEY_ENV, "env-key"), (HOST_ENV, "https://env.nops.io")]);

        let config = ProviderConfig::resolve(&raw, &env).unwrap();
        assert_eq!(config.api_key.expose_secret(), "explicit-key");
        assert_eq!(config.host, "https://staging.nops.io");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_environment_fallback() {
        let env = env_of(&[(API_KEY_ENV, "env-key"), (HOST_ENV, "https://env.nops.io")]);

        let config = ProviderConfig::resolve(&RawProviderConfig::default(), &env).unwrap();
        assert_eq!(config.api_key.expose_secret(), "env-key");
        assert_eq!(config.host, "https://env.nops.io");
    }

    #[test]
    fn test_default_host() {
        let raw = RawProviderConfig {
            nops_api_key: Some("key".to_string()),
            nops_host: Some(String::new()),
        };
        let config = ProviderConfig::resolve(&raw, &env_of(&[])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_missing_api_key() {
        let raw = RawProviderConfig {
            nops_api_key: Some(String::new()),
            nops_host: None,
        };
        let err = ProviderConfig::resolve(&raw, &env_of(&[(API_KEY_ENV, "")])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains(API_KEY_ENV));
    }

    #[test]
    fn test_raw_config_deserialization() {
        let raw: RawProviderConfig =
            serde_json::from_value(serde_json::json!({"nops_api_key": "k"})).unwrap();
        assert_eq!(raw.nops_api_key.as_deref(), Some("k"));
        assert!(raw.nops_host.is_none());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = ProviderConfig::new("super-secret-key", DEFAULT_HOST);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("REDACTED"));
        assert!(rendered.contains(DEFAULT_HOST));
    }
}
