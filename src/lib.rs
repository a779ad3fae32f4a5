//! Front gateway library.
//!
//! Unifies a server-rendered front-end and a backend API under one public
//! origin, and serves committed uploads from disk.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
