use crate::config::{KNOWN_TOOLS, ServerConfig};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

/// Health status for a component or the overall system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is functioning but with degraded performance or partial failures
    Degraded,
    /// Component is not functioning
    Unhealthy,
}

impl HealthStatus {
    /// Returns the HTTP status code for this health status
    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK, // Still serve traffic but indicate degradation
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Combines two health statuses, returning the worse of the two
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub component: String,
    /// Health status
    pub status: HealthStatus,
    /// Optional error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of the check
    pub timestamp: i64,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    /// Creates a healthy component health check
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            error: None,
            timestamp: Self::now(),
            details: None,
        }
    }

    /// Creates a healthy component health check with details
    pub fn healthy_with_details(component: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            error: None,
            timestamp: Self::now(),
            details: Some(details),
        }
    }

    /// Creates a degraded component health check
    pub fn degraded(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            error: Some(error.into()),
            timestamp: Self::now(),
            details: None,
        }
    }

    /// Creates a degraded component health check with details
    pub fn degraded_with_details(
        component: impl Into<String>,
        error: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            error: Some(error.into()),
            timestamp: Self::now(),
            details: Some(details),
        }
    }

    /// Creates an unhealthy component health check
    pub fn unhealthy(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            error: Some(error.into()),
            timestamp: Self::now(),
            details: None,
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Timestamp of the check
    pub timestamp: i64,
    /// Server version
    pub version: String,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status = self.status.status_code();
        (status, Json(self)).into_response()
    }
}

/// Readiness check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Readiness status
    pub ready: bool,
    /// Overall health status
    pub status: HealthStatus,
    /// Timestamp of the check
    pub timestamp: i64,
    /// Components that are not ready
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_ready: Vec<String>,
}

impl IntoResponse for ReadinessResponse {
    fn into_response(self) -> Response {
        let status = if self.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// Detailed component health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Timestamp of the check
    pub timestamp: i64,
    /// Individual component health checks
    pub components: HashMap<String, ComponentHealth>,
}

impl IntoResponse for ComponentHealthResponse {
    fn into_response(self) -> Response {
        let status = self.status.status_code();
        (status, Json(self)).into_response()
    }
}

/// Live resolved graphs above which the service reports itself degraded.
pub const LIVE_GRAPH_WARNING: usize = 256;

/// Main health checker coordinator
#[derive(Clone)]
pub struct HealthChecker {
    config: Arc<ServerConfig>,
    state: Arc<AppState>,
    shutdown: Option<CancellationToken>,
}

impl HealthChecker {
    /// Creates a new health checker
    pub fn new(config: Arc<ServerConfig>, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            shutdown: None,
        }
    }

    /// Reports not ready once `token` is cancelled.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Performs a liveness check - returns healthy if server is running
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            timestamp: Self::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Performs a readiness check - returns ready if server can accept requests
    pub async fn readiness(&self) -> ReadinessResponse {
        let components = self.check_all_components().await;
        let mut overall = HealthStatus::Healthy;
        let mut not_ready = Vec::new();

        for (name, health) in &components {
            overall = overall.combine(health.status);
            if health.status == HealthStatus::Unhealthy {
                not_ready.push(name.clone());
            }
        }
        not_ready.sort();

        ReadinessResponse {
            ready: overall != HealthStatus::Unhealthy,
            status: overall,
            timestamp: Self::now(),
            not_ready,
        }
    }

    /// Performs detailed component health checks
    pub async fn components(&self) -> ComponentHealthResponse {
        let components = self.check_all_components().await;
        let mut overall = HealthStatus::Healthy;

        for health in components.values() {
            overall = overall.combine(health.status);
        }

        ComponentHealthResponse {
            status: overall,
            timestamp: Self::now(),
            components,
        }
    }

    async fn check_all_components(&self) -> HashMap<String, ComponentHealth> {
        let mut components = HashMap::new();
        components.insert("registry".to_string(), self.check_registry());
        components.insert("graphs".to_string(), self.check_graphs());
        components.insert("tools".to_string(), self.check_tools());
        components.insert("lifecycle".to_string(), self.check_lifecycle());
        components
    }

    fn check_registry(&self) -> ComponentHealth {
        let catalog = self.state.resolver().registry.catalog();
        if catalog.data_formats.is_empty() || catalog.schema_engines.is_empty() {
            return ComponentHealth::unhealthy("registry", "format registry is empty");
        }
        ComponentHealth::healthy_with_details(
            "registry",
            serde_json::json!({
                "data_formats": catalog.data_formats.len(),
                "schema_engines": catalog.schema_engines.len(),
                "inference_engines": catalog.inference_engines,
            }),
        )
    }

    /// Resolved graphs still alive; a growing count means leaked handles.
    fn check_graphs(&self) -> ComponentHealth {
        let tracker = self.state.tracker();
        let live = tracker.live();
        let details = serde_json::json!({
            "live": live,
            "total_acquired": tracker.total_acquired(),
            "warning_threshold": LIVE_GRAPH_WARNING,
        });
        if live > LIVE_GRAPH_WARNING {
            ComponentHealth::degraded_with_details(
                "graphs",
                format!("{live} resolved graphs are still held"),
                details,
            )
        } else {
            ComponentHealth::healthy_with_details("graphs", details)
        }
    }

    fn check_tools(&self) -> ComponentHealth {
        let enabled = KNOWN_TOOLS
            .iter()
            .filter(|tool| self.config.is_tool_enabled(tool))
            .copied()
            .collect::<Vec<_>>();
        if enabled.is_empty() {
            return ComponentHealth::unhealthy("tools", "every tool is disabled");
        }
        ComponentHealth::healthy_with_details("tools", serde_json::json!({ "enabled": enabled }))
    }

    fn check_lifecycle(&self) -> ComponentHealth {
        match &self.shutdown {
            Some(token) if token.is_cancelled() => {
                ComponentHealth::unhealthy("lifecycle", "shutdown in progress")
            }
            _ => ComponentHealth::healthy("lifecycle"),
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Axum handler for liveness endpoint
pub async fn liveness_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.liveness()
}

/// Axum handler for readiness endpoint
pub async fn readiness_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.readiness().await
}

/// Axum handler for components endpoint
pub async fn components_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.components().await
}
