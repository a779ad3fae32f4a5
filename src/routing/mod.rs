//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (ordered rule table)
//!     → matcher.rs (prefix conditions)
//!     → Return: Route (an upstream target or the static asset server)
//! ```
//!
//! # Design Decisions
//! - Rule table built once, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same path always yields the same route
//! - First match wins; rule order is the priority

pub mod matcher;
pub mod router;

pub use router::{Route, RouteTable};
