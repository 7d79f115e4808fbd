//! Server configuration.
//!
//! Loaded from an optional JSON file named by `RIDE_CONFIG`, then
//! overridden field by field from the environment. Every section may be
//! omitted; missing fields take their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::coupons::CouponOffer;
use crate::directions::{CacheConfig, DirectionsConfig};
use crate::dispatch::{DispatchConfig, DispatchSettings};
use crate::locator::LocatorConfig;
use crate::pricing::{PricingConfig, SurgeConfig};

/// Names a config file to load.
pub const CONFIG_ENV: &str = "RIDE_CONFIG";
/// Overrides [`ServerConfig::bind`].
pub const BIND_ENV: &str = "RIDE_BIND";
/// Overrides [`ServerConfig::snapshot_path`].
pub const SNAPSHOT_ENV: &str = "RIDE_SNAPSHOT";
/// Overrides the directions base URL.
pub const DIRECTIONS_URL_ENV: &str = "RIDE_DIRECTIONS_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid bind address {0:?}")]
    InvalidBind(String),

    #[error("invalid {section} settings: {reason}")]
    OutOfRange {
        section: &'static str,
        reason: String,
    },
}

/// Everything the server process needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub bind: String,

    /// Where the store snapshot lives. `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,

    pub dispatch: DispatchConfig,
    pub pricing: PricingConfig,
    pub surge: SurgeConfig,
    pub locator: LocatorConfig,
    pub directions: DirectionsConfig,
    pub directions_cache: CacheConfig,

    /// Coupons the built-in catalog honours.
    pub coupons: Vec<CouponOffer>,
}

impl ServerConfig {
    /// Load from `RIDE_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Check the bind address and every bounded setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.dispatch
            .validate()
            .map_err(|reason| ConfigError::OutOfRange {
                section: "dispatch",
                reason,
            })?;
        self.surge
            .validate()
            .map_err(|reason| ConfigError::OutOfRange {
                section: "surge",
                reason,
            })
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Override fields from environment variables looked up with `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = bind;
        }
        if let Some(path) = lookup(SNAPSHOT_ENV) {
            self.snapshot_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Some(url) = lookup(DIRECTIONS_URL_ENV) {
            self.directions.base_url = (!url.is_empty()).then_some(url);
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }

    /// The parts of the configuration the dispatcher consumes.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            dispatch: self.dispatch.clone(),
            pricing: self.pricing.clone(),
            surge: self.surge.clone(),
            locator: self.locator.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            snapshot_path: None,
            dispatch: DispatchConfig::default(),
            pricing: PricingConfig::default(),
            surge: SurgeConfig::default(),
            locator: LocatorConfig::default(),
            directions: DirectionsConfig::default(),
            directions_cache: CacheConfig::default(),
            coupons: Vec::new(),
        }
    }
}
