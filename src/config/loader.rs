//! Configuration loading from disk and the command line.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command line of the gateway binary.
///
/// The three positional addresses are required, mirroring
/// `rpc-gateway localhost:6000 0.0.0.0:6080 0.0.0.0:6081`.
#[derive(Debug, Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "HTTP/JSON gateway in front of a gRPC backend", long_about = None)]
pub struct Cli {
    /// gRPC backend endpoint (host:port).
    pub upstream: String,

    /// REST listener address (host:port or :port).
    pub rest: String,

    /// Documentation listener address (host:port or :port).
    pub docs: String,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Translation ruleset file.
    #[arg(long)]
    pub ruleset: Option<PathBuf>,

    /// Directory served under /swaggerui/.
    #[arg(long)]
    pub swagger_dir: Option<PathBuf>,

    /// Directory served under /grpc/.
    #[arg(long)]
    pub schema_dir: Option<PathBuf>,

    /// Default per-request deadline in seconds.
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags.
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };

        config.upstream.address = self.upstream;
        config.gateway.bind_address = self.rest;
        config.assets.bind_address = self.docs;

        if let Some(path) = self.ruleset {
            config.ruleset.path = path;
        }
        if let Some(dir) = self.swagger_dir {
            config.assets.swagger_ui_dir = dir;
        }
        if let Some(dir) = self.schema_dir {
            config.assets.schema_dir = dir;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.gateway.request_timeout_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}
