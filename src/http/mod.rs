//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway listener:
//!     TCP connection
//!     → server.rs (Axum setup, request ID, trace span, request context)
//!     → routing::GatewayRouter (translate, call upstream, encode)
//!     → response.rs (errors → status + JSON body)
//!     → Send to client
//!
//! Asset listener:
//!     TCP connection → assets.rs (static files) → Send to client
//! ```

pub mod assets;
pub mod request;
pub mod response;
pub mod server;

pub use assets::AssetServer;
pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use server::GatewayServer;
