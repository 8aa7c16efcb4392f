//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (three positional addresses + flags)
//!     → loader.rs (optional TOML file, flag overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the process never reloads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod endpoint;
pub mod loader;
pub mod schema;
pub mod validation;

pub use endpoint::EndpointAddress;
pub use loader::{Cli, ConfigError};
pub use schema::{AssetsConfig, CodecConfig, GatewayConfig, ListenerConfig, UpstreamConfig};
