//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::admission::{TimeWindow, GLOBAL_LIMIT, SCOPE_LIMIT};
use crate::error::{Result, TurnstileError};

/// Prefix for environment overrides, e.g. `TURNSTILE__ADMISSION__GLOBAL_LIMIT`.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Quota configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Quota configuration. Fixed once the controller is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum admitted events per window, all callers combined
    #[serde(default = "default_global_limit")]
    pub global_limit: u64,

    /// Maximum admitted events per window for a single identity
    #[serde(default = "default_identity_limit")]
    pub identity_limit: u64,

    /// Sliding window length
    #[serde(default)]
    pub window: TimeWindow,

    /// Seconds between idle-identity sweeps; 0 disables eviction
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            global_limit: default_global_limit(),
            identity_limit: default_identity_limit(),
            window: TimeWindow::default(),
            eviction_interval_secs: default_eviction_interval(),
        }
    }
}

fn default_global_limit() -> u64 {
    GLOBAL_LIMIT
}

fn default_identity_limit() -> u64 {
    SCOPE_LIMIT
}

fn default_eviction_interval() -> u64 {
    300
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from defaults, an optional YAML file and the environment.
    ///
    /// Later sources win: environment variables override the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        let config: TurnstileConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig =
            serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would refuse every request.
    pub fn validate(&self) -> Result<()> {
        if self.admission.global_limit == 0 {
            return Err(TurnstileError::Config(
                "admission.global_limit must be greater than zero".to_string(),
            ));
        }
        if self.admission.identity_limit == 0 {
            return Err(TurnstileError::Config(
                "admission.identity_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
