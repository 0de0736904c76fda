pub mod api;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod health;
pub mod infer;
pub mod info;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod rdf;
pub mod resolve;
pub mod schema;
pub mod server;
pub mod shapemap;
pub mod shutdown;
pub mod state;
pub mod syntax;
pub mod tools;
pub mod uml;
pub mod validation;

pub use config::{CliArgs, ServerConfig, TransportKind};
pub use error::{ErrorCode, to_mcp_error};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use server::RdfShapeServer;
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};

use anyhow::Result;
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use shutdown::TelemetryShutdownHandler;
use state::AppState;
use std::{future::IntoFuture, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const HTTP_SERVICE_PATH: &str = "/mcp";

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone())?);

    tracing::info!(
        transport = %config.transport,
        base = %config.default_base_iri,
        follow_depth = config.endpoint_follow_depth,
        "starting rdfshape MCP server",
    );

    match config.transport {
        TransportKind::Stdio => {
            let server = RdfShapeServer::from_state(state);
            server.run_stdio().await
        }
        TransportKind::Http => run_stream_http_transport(config, state).await,
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> (axum::http::StatusCode, String) {
    let metrics_text = metrics::METRICS.encode();
    (axum::http::StatusCode::OK, metrics_text)
}

/// Everything served over HTTP: the MCP endpoint, the JSON API, health
/// probes and metrics. Readiness follows `shutdown`.
pub fn http_router(
    config: Arc<ServerConfig>,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Router {
    let service_state = state.clone();
    let service = StreamableHttpService::new(
        move || Ok(RdfShapeServer::from_state(service_state.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let health_checker =
        Arc::new(health::HealthChecker::new(config, state.clone()).with_shutdown_token(shutdown));

    let probes = Router::new()
        .route("/health", axum::routing::get(health::liveness_handler))
        .route("/ready", axum::routing::get(health::readiness_handler))
        .route(
            "/health/components",
            axum::routing::get(health::components_handler),
        )
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(health_checker);

    Router::new()
        .nest_service(HTTP_SERVICE_PATH, service)
        .nest(api::API_PREFIX, api::router(state))
        .merge(probes)
}

async fn run_stream_http_transport(config: Arc<ServerConfig>, state: Arc<AppState>) -> Result<()> {
    let shutdown_config =
        ShutdownConfig::default().with_total_timeout(config.graceful_shutdown_timeout_secs);
    let coordinator = Arc::new(
        ShutdownCoordinator::new(shutdown_config)
            .with_tracker(state.tracker().clone())
            .with_handler(Box::new(TelemetryShutdownHandler)),
    );

    let router = http_router(config.clone(), state.clone(), coordinator.token());
    let listener = TcpListener::bind(config.http_bind_address).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(transport = "http", bind = %actual_addr, path = HTTP_SERVICE_PATH, "listening");

    let shutdown_coordinator = coordinator.clone();
    let server_result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_coordinator.wait_for_signal().await;
        })
        .into_future()
        .await;

    tracing::info!(
        live_graphs = state.tracker().live(),
        graphs_served = state.tracker().total_acquired(),
        "server stopped, draining"
    );
    coordinator.shutdown().await?;

    server_result.map_err(anyhow::Error::from)
}
