//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// RPC backend connection settings.
    pub upstream: UpstreamConfig,

    /// Public REST listener.
    pub gateway: ListenerConfig,

    /// Documentation/schema asset listener.
    pub assets: AssetsConfig,

    /// Translation ruleset location.
    pub ruleset: RulesetConfig,

    /// JSON marshaling options.
    pub codec: CodecConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Upstream (RPC backend) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address (e.g., "localhost:6000").
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// HTTP/2 keepalive ping interval in seconds.
    pub keepalive_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6000".to_string(),
            connect_timeout_secs: 10,
            keepalive_secs: 30,
        }
    }
}

/// REST listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:6080").
    pub bind_address: String,

    /// Default per-request deadline in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Static asset listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Bind address (e.g., "0.0.0.0:6081").
    pub bind_address: String,

    /// Directory served under `/swaggerui/`.
    pub swagger_ui_dir: PathBuf,

    /// Directory served under `/grpc/`.
    pub schema_dir: PathBuf,

    /// Treat a runtime failure of this listener as fatal for the process.
    pub required: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6081".to_string(),
            swagger_ui_dir: PathBuf::from("./grpc-gateway/swaggerui"),
            schema_dir: PathBuf::from("./grpc-gateway"),
            required: false,
        }
    }
}

/// Ruleset location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesetConfig {
    /// Path to the TOML ruleset produced by the schema compiler.
    pub path: PathBuf,
}

impl Default for RulesetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./grpc-gateway/ruleset.toml"),
        }
    }
}

/// JSON marshaling options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Emit fields holding their default value.
    pub emit_defaults: bool,

    /// Use the proto field names instead of lowerCamelCase JSON names.
    pub use_proto_names: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            emit_defaults: false,
            use_proto_names: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
