//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce the route's deadline)
//!     → On failure: a single classified ProxyFailure, no retry
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream exchange has a deadline
//! - Timeout errors are distinct from other failures

pub mod timeouts;
