//! Engine configuration.
//!
//! [`ApiConfig`] is plain serde data so it can live in any configuration
//! file. Durations use humantime notation:
//!
//! ```
//! use std::time::Duration;
//! use restbox::ApiConfig;
//!
//! let config: ApiConfig = serde_json::from_str(r#"{"default_ttl": "10m"}"#).unwrap();
//! assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
//! ```

use std::time::Duration;

use restbox_core::RequestData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// TTL applied when neither the request nor the configuration sets one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Error returned when a configuration value cannot be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The value does not describe an [`ApiConfig`].
    #[error("invalid api configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Settings shared by every query of an [`Api`](crate::Api).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// TTL for requests without an override (e.g., "30s", "10m").
    /// Falls back to [`DEFAULT_TTL`].
    #[serde(with = "humantime_serde")]
    pub default_ttl: Option<Duration>,
}

impl ApiConfig {
    /// Creates a configuration with the given default TTL.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        ApiConfig {
            default_ttl: Some(ttl),
        }
    }

    /// Reads a configuration from an already parsed document.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Resolves the TTL for `request`: its own override, then
    /// [`default_ttl`](Self::default_ttl), then [`DEFAULT_TTL`].
    pub fn ttl_for(&self, request: &RequestData) -> Duration {
        request
            .ttl()
            .or(self.default_ttl)
            .unwrap_or(DEFAULT_TTL)
    }
}
