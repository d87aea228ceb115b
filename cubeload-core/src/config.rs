use crate::{DEFAULT_REPLICA, DEFAULT_SETTLE_DELAY, DEFAULT_WAIT_BOUND};
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No server named `{0}` in config")]
    NoServer(String),

    #[error("At least one concurrency level is required")]
    EmptyLevels,
}

/// Connection parameters for one server instance.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub ssl: bool,
    /// Verify the server certificate when `ssl` is set.
    #[serde(default = "default_verify")]
    pub verify: bool,
    /// Overrides the URL derived from `address`, `port` and `ssl`.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ServerConfig {
    /// Skip certificate checks. Applies to `base_url` endpoints as well as `ssl`.
    pub fn accept_invalid_certs(&self) -> bool {
        !self.verify
    }

    /// Root of the REST API, without a trailing slash.
    pub fn api_root(&self) -> String {
        if let Some(base_url) = &self.base_url {
            return base_url.trim_end_matches('/').to_string();
        }
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}/api/v1", self.address, self.port)
    }
}

fn default_verify() -> bool {
    true
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("ssl", &self.ssl)
            .field("verify", &self.verify)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub levels: Vec<NonZeroUsize>,
    pub replica: u32,
    #[serde(rename = "settle_secs")]
    #[serde_as(as = "DurationSeconds<f64>")]
    pub settle: Duration,
    #[serde(rename = "wait_bound_secs")]
    #[serde_as(as = "DurationSeconds<f64>")]
    pub wait_bound: Duration,
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            levels: crate::default_levels(),
            replica: DEFAULT_REPLICA,
            settle: DEFAULT_SETTLE_DELAY,
            wait_bound: DEFAULT_WAIT_BOUND,
            output_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::EmptyLevels);
        }

        if self.levels.windows(2).any(|pair| pair[1] < pair[0]) {
            warn!("Concurrency levels are not ascending: {:?}", self.levels);
        }

        Ok(())
    }
}

/// Contents of the config file: a `[run]` table plus one table per server.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(flatten)]
    pub servers: HashMap<String, ServerConfig>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = contents.parse()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn server(&self, name: &str) -> Result<&ServerConfig, ConfigError> {
        self.servers
            .get(name)
            .ok_or_else(|| ConfigError::NoServer(name.to_string()))
    }
}

impl FromStr for ConfigFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
