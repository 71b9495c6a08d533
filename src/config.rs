//! Configuration module for the feed ingestion core

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{FeedError, Result};

/// Default L2 order-book endpoint (OKX BTC-USDT perpetual)
pub const DEFAULT_ENDPOINT: &str =
    "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP";

/// Prefix for environment overrides, e.g. `L2FEED_ENDPOINT_URL`
const ENV_PREFIX: &str = "L2FEED";

/// Optional config file looked up in the working directory (any supported extension)
const CONFIG_FILE_STEM: &str = "l2feed";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebSocket endpoint streaming L2 snapshots
    pub endpoint_url: String,

    /// Reconnection settings
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_secs: f64,
    /// 1.0 keeps the delay fixed; larger values back off per attempt
    pub reconnect_backoff_multiplier: f64,
    pub max_reconnect_delay_secs: f64,
    /// Run the health probe again before every reconnect
    pub reprobe_on_reconnect: bool,

    /// Internet reachability probe
    pub connectivity_check_addr: String,
    pub connectivity_check_timeout_secs: f64,

    /// Transport timeouts
    pub connect_timeout_secs: f64,
    pub idle_timeout_secs: f64,

    /// Capacity of the rolling processing-latency buffer
    pub latency_capacity: usize,

    /// Forces the tunnel check result when set
    pub tunnel_override: Option<bool>,

    /// Bind address for the health/metrics server
    pub health_addr: String,
}

impl Config {
    /// Load configuration from `.env`, an optional `l2feed.*` file and `L2FEED_*` variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = ::config::Config::builder()
            .add_source(::config::File::with_name(CONFIG_FILE_STEM).required(false));

        Self::finish(builder)
    }

    /// Load configuration from an explicit file, still honouring `L2FEED_*` overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ::config::Config::builder().add_source(::config::File::from(path));

        Self::finish(builder)
    }

    fn finish(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Config = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!(endpoint = %config.endpoint_url, "Configuration validated");

        Ok(config)
    }

    /// Reject settings the session cannot run with
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FeedError::Config(format!(
                "endpoint_url must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        for (name, value) in [
            ("reconnect_delay_secs", self.reconnect_delay_secs),
            ("max_reconnect_delay_secs", self.max_reconnect_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FeedError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("connectivity_check_timeout_secs", self.connectivity_check_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FeedError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if !self.reconnect_backoff_multiplier.is_finite() || self.reconnect_backoff_multiplier < 1.0
        {
            return Err(FeedError::Config(format!(
                "reconnect_backoff_multiplier must be >= 1.0, got {}",
                self.reconnect_backoff_multiplier
            )));
        }

        if self.latency_capacity == 0 {
            return Err(FeedError::Config(
                "latency_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_delay_secs)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_reconnect_delay_secs)
    }

    pub fn connectivity_check_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connectivity_check_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.idle_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            max_reconnect_attempts: 10,
            reconnect_delay_secs: 5.0,
            reconnect_backoff_multiplier: 1.0,
            max_reconnect_delay_secs: 60.0,
            reprobe_on_reconnect: true,
            connectivity_check_addr: "8.8.8.8:53".to_string(),
            connectivity_check_timeout_secs: 3.0,
            connect_timeout_secs: 10.0,
            idle_timeout_secs: 30.0,
            latency_capacity: 1000,
            tunnel_override: None,
            health_addr: "0.0.0.0:9090".to_string(),
        }
    }
}
