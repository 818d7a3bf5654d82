//! Configuration loading and typed config structures for Worldcast.
//!
//! The configuration lives in `worldcast.yaml`. Every field has a default,
//! so a missing file or an empty document yields a working server. A small
//! set of environment variables override file values after parsing.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable overriding [`ServerSettings::host`].
pub const ENV_HOST: &str = "WORLDCAST_HOST";

/// Environment variable overriding [`ServerSettings::port`].
pub const ENV_PORT: &str = "PORT";

/// Environment variable overriding [`ServerSettings::static_dir`].
pub const ENV_STATIC_DIR: &str = "WORLDCAST_STATIC_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `worldcast.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldcastConfig {
    /// Listening address and static assets.
    #[serde(default)]
    pub server: ServerSettings,

    /// Subscriber mailbox behaviour.
    #[serde(default)]
    pub subscribers: SubscriberSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorldcastConfig {
    /// Load configuration the way the server binary does, then apply
    /// overrides from the process environment.
    ///
    /// An `explicit` path must exist. Otherwise `fallback` is read if it
    /// exists, and defaults are used if it does not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the chosen file cannot be read, or
    /// [`ConfigError::Yaml`] if its content is not valid YAML.
    pub fn load(explicit: Option<&Path>, fallback: &Path) -> Result<LoadedConfig, ConfigError> {
        Self::load_with(explicit, fallback, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// As for [`load`](Self::load).
    pub fn load_with<F>(
        explicit: Option<&Path>,
        fallback: &Path,
        lookup: F,
    ) -> Result<LoadedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, source) = match explicit {
            Some(path) => (Self::from_file(path)?, path.display().to_string()),
            None if fallback.exists() => (Self::from_file(fallback)?, fallback.display().to_string()),
            None => (Self::default(), String::from("defaults")),
        };
        let rejected = config.apply_overrides(lookup);
        Ok(LoadedConfig {
            config,
            source,
            rejected,
        })
    }

    /// Load configuration from a YAML file. No environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string. No environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values from an arbitrary variable lookup.
    ///
    /// Returns the overrides that were rejected. A `PORT` value that is not
    /// a valid port number is rejected and the configured port is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<RejectedOverride>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rejected = Vec::new();
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => rejected.push(RejectedOverride {
                    variable: ENV_PORT,
                    value: raw,
                    reason: e.to_string(),
                }),
            }
        }
        if let Some(dir) = lookup(ENV_STATIC_DIR) {
            self.server.static_dir = PathBuf::from(dir);
        }
        rejected
    }
}

/// A configuration together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// The effective configuration.
    pub config: WorldcastConfig,
    /// The file it was read from, or `"defaults"`.
    pub source: String,
    /// Environment overrides that were ignored.
    pub rejected: Vec<RejectedOverride>,
}

/// An environment override that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    /// The environment variable.
    pub variable: &'static str,
    /// Its raw value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl std::fmt::Display for RejectedOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ignoring {}={:?}: {}", self.variable, self.value, self.reason)
    }
}

/// Where the HTTP server listens and what it serves under `/static`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Host name or address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on (`0` picks a free port).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Subscriber mailbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriberSettings {
    /// Maximum undelivered messages per subscriber before it is
    /// disconnected. `0` means unbounded.
    #[serde(default)]
    pub mailbox_limit: usize,

    /// Whether a new subscriber first receives the whole world as one
    /// message.
    #[serde(default)]
    pub send_snapshot_on_connect: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (trace, debug, info, warn, error), used when
    /// `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_log_level() -> String {
    String::from("info")
}
