//! Startup summary.

use std::path::Path;

use crate::config::schema::format_duration;
use crate::config::GatewayConfig;

/// Log the effective configuration once the listener is bound.
pub fn log_startup(config: &GatewayConfig, uploads_root: &Path) {
    let timeouts = &config.timeouts;
    tracing::info!(
        port = config.proxy_port,
        base_url = config.base_url().unwrap_or("(none)"),
        frontend = %config.frontend_url,
        api = %config.api_url,
        read = %format_duration(timeouts.read),
        write = %format_duration(timeouts.write),
        idle = %format_duration(timeouts.idle),
        upload_read = %format_duration(timeouts.upload_read),
        log_requests = config.log_requests,
        "Gateway configuration"
    );
    tracing::info!(uploads = %uploads_root.display(), "Serving static uploads at /f/");
    if let Some(base) = config.base_url() {
        tracing::info!(url = %base, "Application available");
    }
}
