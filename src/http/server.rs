//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the single dispatching handler
//! - Wire up middleware (request IDs, tracing)
//! - Accept connections, bounding keep-alive idle time and response writes
//! - Drain in-flight connections on shutdown
//! - Dispatch requests through the route table
//! - Forward requests to upstreams or serve committed uploads
//!
//! # Design Decisions
//! - Connections are served by hyper directly so the idle timeout can be
//!   applied to every inbound connection
//! - The write deadline starts when the response head is ready and covers
//!   the whole body, for every route

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::{util::MapResponseLayer, ServiceBuilder, ServiceExt};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, GatewayConfig, Origins};
use crate::http::forwarding::rewrite;
use crate::http::request::{IncomingRequest, UuidRequestId};
use crate::http::response;
use crate::http::static_files::StaticAssets;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::timeouts::DeadlineBody;
use crate::routing::{Route, RouteTable};
use crate::upstream::{UpstreamTarget, Upstreams};

/// Application state injected into handlers. Read-only for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub origins: Arc<Origins>,
    pub routes: Arc<RouteTable>,
    pub upstreams: Arc<Upstreams>,
    pub assets: Arc<StaticAssets>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
    uploads_root: PathBuf,
}

/// The router paired with per-connection settings.
#[derive(Clone)]
struct ConnectionSettings {
    router: Router,
    idle: Duration,
}

impl HttpServer {
    /// Validate the configuration and build every subsystem.
    ///
    /// A configuration error here is fatal; no request is ever served.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let origins = validate_config(&config).map_err(ConfigError::Validation)?;
        let uploads_root = resolve_uploads_root(&config.uploads_dir);

        let upstreams = Upstreams::new(&config, &origins);
        let assets = StaticAssets::new(&uploads_root, config.timeouts.write);
        let config = Arc::new(config);

        let state = AppState {
            config: config.clone(),
            origins: Arc::new(origins),
            routes: Arc::new(RouteTable::gateway()),
            upstreams: Arc::new(upstreams),
            assets: Arc::new(assets),
        };

        Ok(Self {
            router: Self::build_router(state),
            config,
            uploads_root,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let write = state.config.timeouts.write;
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(MapResponseLayer::new(move |response: Response| {
                        response.map(|body| Body::new(DeadlineBody::new(body, write)))
                    })),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight connections.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let settings = ConnectionSettings {
            router: self.router,
            idle: self.config.timeouts.idle,
        };
        let connection_shutdown = shutdown.resubscribe();
        let stop = Shutdown::signalled(shutdown);
        tokio::pin!(stop);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        stream,
                        remote,
                        settings.clone(),
                        connection_shutdown.resubscribe(),
                    ));
                }
            }
        }

        drop(listener);
        tracing::info!(in_flight = connections.len(), "Draining connections");
        while connections.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Absolute uploads root the static asset server reads from.
    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }
}

/// Serve one inbound connection until it closes, idles out, or shutdown drains it.
async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    settings: ConnectionSettings,
    shutdown: broadcast::Receiver<()>,
) {
    let router = settings.router;
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(remote));
        router.clone().oneshot(request)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(settings.idle)
        .keep_alive(true);
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let stop = Shutdown::signalled(shutdown);
    tokio::pin!(stop);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = &mut stop => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(client = %remote, error = %e, "Connection ended with error");
    }
}

fn resolve_uploads_root(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir)
        .or_else(|_| std::path::absolute(dir))
        .unwrap_or_else(|_| dir.to_path_buf())
}

/// Dispatch one request through the route table.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = state.routes.resolve(request.uri().path());

    if state.config.log_requests {
        tracing::info!(
            method = %method,
            path = %request.uri().path(),
            route = %route,
            "Request"
        );
    }

    let response = match route {
        Route::StaticAssets => state.assets.serve(request).await,
        Route::Upstream(target) => {
            let remote = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            proxy(&state, target, IncomingRequest::new(request, remote)).await
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), route, start);
    response
}

/// Rewrite and forward to the target's upstream.
///
/// If the client disconnects, this future is dropped and the upstream call with it.
async fn proxy(state: &AppState, target: UpstreamTarget, incoming: IncomingRequest<Body>) -> Response {
    let method = incoming.request.method().clone();
    let outbound = match rewrite(incoming, target, &state.origins) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build upstream request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let forwarder = state.upstreams.get(outbound.target);
    if outbound.target != target && state.config.log_requests {
        tracing::info!(
            method = %method,
            path = %outbound.request.uri().path(),
            upstream = %forwarder.configured_url(),
            "Internal API request redirected"
        );
    }

    match forwarder.forward(outbound.request).await {
        Ok(response) => response,
        Err(failure) => response::upstream_failure(forwarder.target(), forwarder.configured_url(), failure),
    }
}
