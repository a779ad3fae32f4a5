//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request IDs, dispatch)
//!     → routing (choose upstream target or static assets)
//!     → forwarding.rs + rewrite.rs (outbound request and headers)
//!     → upstream forwarder, or static_files.rs
//!     → response.rs (502 envelope on failure)
//!     → Send to client
//! ```

pub mod forwarding;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod server;
pub mod static_files;

pub use forwarding::{rewrite, ForwardingContext, Outbound};
pub use request::{IncomingRequest, UuidRequestId};
pub use server::HttpServer;
pub use static_files::StaticAssets;
