//! Bridge configuration.
//!
//! # Examples
//!
//! ```rust
//! use did_bridge_node::BridgeConfig;
//! use std::time::Duration;
//!
//! let config = BridgeConfig {
//!     transaction_timeout: Duration::from_secs(30),
//!     ..Default::default()
//! };
//! assert_eq!(config.max_in_flight, 16);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resolver endpoint used when none is configured.
pub const DEFAULT_RESOLVER_URL: &str = "https://coreservices-didsidechain-privnet.elastos.org";

/// Configuration for a bridge runtime.
///
/// Passed at construction; the bridge never mutates it. Operations that change
/// a setting for one store (such as `setResolverUrl`) install new objects
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Directory under which stores are rooted, one subdirectory per store id.
    pub data_dir: PathBuf,

    /// Resolver endpoint for DID resolution.
    pub resolver_url: String,

    /// Timeout of resolver HTTP requests.
    #[serde(with = "millis")]
    pub http_timeout: Duration,

    /// How long a publish waits for `setTransactionResult`.
    #[serde(with = "millis")]
    pub transaction_timeout: Duration,

    /// Worker operations allowed to run at once.
    pub max_in_flight: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/did_stores"),
            resolver_url: DEFAULT_RESOLVER_URL.to_string(),
            http_timeout: Duration::from_secs(30),
            transaction_timeout: Duration::from_secs(120),
            max_in_flight: 16,
        }
    }
}

impl BridgeConfig {
    /// Loads a configuration from JSON; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are unusable
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy of this configuration with another resolver endpoint.
    #[must_use]
    pub fn with_resolver_url(&self, url: impl Into<String>) -> Self {
        Self {
            resolver_url: url.into(),
            ..self.clone()
        }
    }

    /// Root directory of a store.
    #[must_use]
    pub fn store_root(&self, store_id: &str) -> PathBuf {
        self.data_dir.join(store_id)
    }

    /// Checks that the values can drive a runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty, a timeout is zero, or the
    /// resolver URL is not HTTP(S)
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(Error::InvalidConfig("maxInFlight must be at least 1".into()));
        }
        if self.transaction_timeout.is_zero() || self.http_timeout.is_zero() {
            return Err(Error::InvalidConfig("timeouts must be positive".into()));
        }
        if !is_http_url(&self.resolver_url) {
            return Err(Error::InvalidConfig(format!(
                "resolver URL must be http(s): {}",
                self.resolver_url
            )));
        }
        Ok(())
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
