//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! EndpointAddress (from config)
//!     → listener.rs (bind, log local address)
//!     → Hand off to the HTTP layer (axum::serve accept loop)
//! ```
//!
//! # Design Decisions
//! - Two independent listeners: gateway and assets
//! - Plaintext only; TLS termination belongs in front of the gateway

pub mod listener;

pub use listener::{bind, ListenerError, ListenerRole};
