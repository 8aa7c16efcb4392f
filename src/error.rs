//! Error taxonomy.
//!
//! - [`DispatchError`]: per-request failures (routing, payload, upstream).
//!   Always recovered at the request boundary and rendered as an HTTP
//!   response; never escapes a connection task.
//! - [`StartupError`]: configuration, ruleset, bind or initial upstream
//!   connection failures. Fatal.
//! - [`LifecycleError`]: everything that can end `serve`, i.e. startup
//!   errors plus an accept loop dying.

use axum::http::Method;
use thiserror::Error;
use tonic::{Code, Status};

use crate::config::endpoint::EndpointError;
use crate::config::ConfigError;
use crate::net::listener::{ListenerError, ListenerRole};
use crate::routing::rules::RulesetError;
use crate::upstream::ConnectError;

/// A request that could not be translated or whose RPC failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No translation rule matches the method and path.
    #[error("no rule matches {method} {path}")]
    NotFound { method: Method, path: String },

    /// A parameter or body does not fit the RPC input message.
    #[error("{0}")]
    InvalidArgument(String),

    /// The RPC itself failed; carried verbatim.
    #[error("{}", .0.message())]
    Upstream(#[from] Status),

    /// The upstream answered with bytes that do not decode.
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    /// The RPC status code this error is reported as.
    pub fn code(&self) -> Code {
        match self {
            DispatchError::NotFound { .. } => Code::NotFound,
            DispatchError::InvalidArgument(_) => Code::InvalidArgument,
            DispatchError::Upstream(status) => status.code(),
            DispatchError::Internal(_) => Code::Internal,
        }
    }

    /// True for failures decided locally, before any upstream call.
    pub fn is_routing_error(&self) -> bool {
        matches!(
            self,
            DispatchError::NotFound { .. } | DispatchError::InvalidArgument(_)
        )
    }
}

/// Fatal error while bringing the process up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("ruleset error: {0}")]
    Ruleset(#[from] RulesetError),

    #[error("upstream connection failed: {0}")]
    Upstream(#[from] ConnectError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("metrics exporter failed: {0}")]
    Metrics(String),
}

/// Anything that terminates the serving process abnormally.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("{role} listener failed: {source}")]
    ListenerFatal {
        role: ListenerRole,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variant() {
        let not_found = DispatchError::NotFound {
            method: Method::GET,
            path: "/nope".into(),
        };
        assert_eq!(not_found.code(), Code::NotFound);
        assert!(not_found.is_routing_error());

        let upstream = DispatchError::from(Status::unavailable("backend down"));
        assert_eq!(upstream.code(), Code::Unavailable);
        assert_eq!(upstream.to_string(), "backend down");
        assert!(!upstream.is_routing_error());
    }
}
