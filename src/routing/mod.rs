//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Ruleset compilation (at startup):
//!     ruleset.toml + descriptor set
//!     → rules.rs (resolve selectors and field paths)
//!     → template.rs (parse path templates)
//!     → Freeze as immutable Ruleset
//!
//! Incoming request (method, path, query, headers, body):
//!     → router.rs (first matching rule)
//!     → params.rs (typed path and query bindings)
//!     → codec (body decode) → upstream call → codec (encode)
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Deterministic: declaration order decides between overlapping rules
//! - Parameter type errors are reported before the upstream is contacted

pub mod params;
pub mod router;
pub mod rules;
pub mod template;

pub use router::GatewayRouter;
pub use rules::{Ruleset, RulesetError, TranslationRule};
