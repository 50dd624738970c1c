// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_STAKING_REGISTRY_API_PORT: u16 = 3600;
pub const DEFAULT_RPC_ENDPOINT: &str = "http://localhost:8545";

/// Mainnet staking router.
pub const DEFAULT_STAKING_ROUTER_ADDRESS: Address = Address::new([
    0xfd, 0xdf, 0x38, 0x94, 0x7a, 0xfb, 0x03, 0xc6, 0x21, 0xc7, 0x1b, 0x06, 0xc9, 0xc7, 0x0b, 0xce,
    0x73, 0xf1, 0x29, 0x99,
]);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

const DEFAULT_ROOT_DIRECTORY: &str = ".staking-registry-api";
const CONFIG_DIR: &str = "config";
const DEFAULT_CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    UnknownHomeDirectory,

    #[error("failed to access the config file at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the config file at '{}' is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialise the config: {0}")]
    Serialisation(#[from] toml::ser::Error),

    #[error("the refresh interval must be non-zero")]
    ZeroRefreshInterval,

    #[error("the watchdog timeout ({watchdog_timeout:?}) must be longer than the refresh interval ({refresh_interval:?})")]
    WatchdogTimeoutTooShort {
        watchdog_timeout: Duration,
        refresh_interval: Duration,
    },

    #[error("the maximum number of concurrent fetches must be non-zero")]
    ZeroFetchConcurrency,
}

fn default_root_directory() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_ROOT_DIRECTORY))
        .ok_or(ConfigError::UnknownHomeDirectory)
}

pub fn default_config_directory<P: AsRef<Path>>(id: P) -> Result<PathBuf, ConfigError> {
    Ok(default_root_directory()?.join(id).join(CONFIG_DIR))
}

pub fn default_config_filepath<P: AsRef<Path>>(id: P) -> Result<PathBuf, ConfigError> {
    Ok(default_config_directory(id)?.join(DEFAULT_CONFIG_FILENAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub base: Base,

    #[serde(default)]
    pub chain: Chain,

    #[serde(default)]
    pub registry_cache: RegistryCache,

    #[serde(default)]
    pub http: Http,
}

impl Config {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Config {
            base: Base { id: id.into() },
            chain: Default::default(),
            registry_cache: Default::default(),
            http: Default::default(),
        }
    }

    pub fn read_from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("attempting to load configuration file from {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from_default_path<S: AsRef<str>>(id: S) -> Result<Self, ConfigError> {
        Self::read_from_toml_file(default_config_filepath(id.as_ref())?)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, toml::to_string_pretty(self)?).map_err(io_err)
    }

    pub fn default_location(&self) -> Result<PathBuf, ConfigError> {
        default_config_filepath(&self.base.id)
    }

    pub fn save_to_default_location(&self) -> Result<(), ConfigError> {
        self.save_to_path(self.default_location()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.registry_cache;
        if cache.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if cache.watchdog_timeout <= cache.refresh_interval {
            return Err(ConfigError::WatchdogTimeoutTooShort {
                watchdog_timeout: cache.watchdog_timeout,
                refresh_interval: cache.refresh_interval,
            });
        }
        if cache.max_concurrent_fetches == 0 {
            return Err(ConfigError::ZeroFetchConcurrency);
        }
        Ok(())
    }

    #[must_use]
    pub fn with_rpc_endpoint(mut self, rpc_endpoint: Url) -> Self {
        self.chain.rpc_endpoint = rpc_endpoint;
        self
    }

    #[must_use]
    pub fn with_staking_router_address(mut self, address: Address) -> Self {
        self.chain.staking_router_address = address;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.chain.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.registry_cache.refresh_interval = refresh_interval;
        self
    }

    #[must_use]
    pub fn with_watchdog_timeout(mut self, watchdog_timeout: Duration) -> Self {
        self.registry_cache.watchdog_timeout = watchdog_timeout;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max_concurrent_fetches: usize) -> Self {
        self.registry_cache.max_concurrent_fetches = max_concurrent_fetches;
        self
    }

    #[must_use]
    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.http.bind_address = bind_address;
        self
    }

    /// Applies `f` only if the value has been provided.
    #[must_use]
    pub fn with_optional<F, T>(self, f: F, val: Option<T>) -> Self
    where
        F: Fn(Self, T) -> Self,
    {
        match val {
            Some(val) => f(self, val),
            None => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Base {
    /// Human readable ID of this particular instance, used for the config location.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Chain {
    /// JSON-RPC endpoint of the execution layer node.
    pub rpc_endpoint: Url,

    /// Address of the staking router contract enumerating the staking modules.
    pub staking_router_address: Address,

    /// Transport-level timeout of every individual rpc request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Chain {
    fn default() -> Self {
        // SAFETY: the default endpoint is a well-formed constant
        #[allow(clippy::expect_used)]
        let rpc_endpoint = DEFAULT_RPC_ENDPOINT
            .parse()
            .expect("default rpc endpoint is malformed!");

        Chain {
            rpc_endpoint,
            staking_router_address: DEFAULT_STAKING_ROUTER_ADDRESS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryCache {
    /// Interval between scheduled refreshes of the staking module registry.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Maximum time allowed without any completed refresh before the process terminates.
    #[serde(with = "humantime_serde")]
    pub watchdog_timeout: Duration,

    /// Maximum number of module registries fetched concurrently within a single refresh.
    pub max_concurrent_fetches: usize,
}

impl Default for RegistryCache {
    fn default() -> Self {
        RegistryCache {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Http {
    /// Socket address the HTTP API binds to.
    pub bind_address: SocketAddr,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            bind_address: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                DEFAULT_STAKING_REGISTRY_API_PORT,
            ),
        }
    }
}
