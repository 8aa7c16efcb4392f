//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Load ruleset → Connect upstream → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Cancel open calls and streams → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: ruleset first, then upstream, then listeners
//! - One lifecycle token is the ancestor of every cancellable operation

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, supervise, Gateway};
