//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the gateway and asset listeners to their configured addresses
//! - Report which listener failed and on which address
//!
//! # Design Decisions
//! - Binding happens before any traffic is served; a bind failure is fatal
//! - The accept loop itself is driven by `axum::serve`

use std::fmt;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::EndpointAddress;

/// Which of the two HTTP surfaces a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerRole {
    Gateway,
    Assets,
}

impl fmt::Display for ListenerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerRole::Gateway => write!(f, "gateway"),
            ListenerRole::Assets => write!(f, "assets"),
        }
    }
}

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("{role} listener failed to bind {address}: {source}")]
    Bind {
        role: ListenerRole,
        address: String,
        source: std::io::Error,
    },
}

/// Bind a listener for `role`.
pub async fn bind(role: ListenerRole, address: &EndpointAddress) -> Result<TcpListener, ListenerError> {
    let bind_error = |source| ListenerError::Bind {
        role,
        address: address.to_string(),
        source,
    };

    let listener = TcpListener::bind((address.host(), address.port()))
        .await
        .map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    tracing::info!(role = %role, address = %local_addr, "Listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let address = EndpointAddress::parse("127.0.0.1:0", "127.0.0.1").unwrap();
        let first = bind(ListenerRole::Gateway, &address).await.unwrap();
        let taken = EndpointAddress::parse(&first.local_addr().unwrap().to_string(), "127.0.0.1").unwrap();

        let err = bind(ListenerRole::Assets, &taken).await.unwrap_err();
        assert!(err.to_string().starts_with("assets listener failed to bind"));
    }
}
