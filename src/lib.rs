//! HTTP/JSON → gRPC translating gateway library.

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use config::schema::GatewayConfig;
pub use error::{DispatchError, LifecycleError, StartupError};
pub use lifecycle::{Gateway, Shutdown};
pub use routing::{GatewayRouter, Ruleset};
