/// Prometheus metrics for the validation service
///
/// Request counters and latency per tool, validation outcomes per engine,
/// resolution failures per pipeline stage and the number of resolved graphs
/// currently held by in-flight requests.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

/// Labels for request metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// Tool name (e.g., "validate", "convert_schema")
    pub tool: String,
    /// Request status ("success", "error")
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub tool: String,
    pub error_type: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ToolLabels {
    pub tool: String,
}

/// Labels for validation outcomes
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// Schema engine ("ShEx", "SHACL", or "unresolved")
    pub engine: String,
    /// "conformant", "non_conformant", "resolution_error" or "engine_failure"
    pub outcome: String,
}

/// Labels for resolution failures
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StageLabels {
    /// "data", "schema" or "trigger"
    pub stage: String,
    pub kind: String,
}

/// Central metrics collector with Prometheus registry
pub struct MetricsCollector {
    registry: RwLock<Registry>,

    /// Total requests by tool and status
    pub requests_total: Family<RequestLabels, Counter>,

    /// Request duration in seconds by tool
    pub request_duration_seconds: Family<ToolLabels, Histogram>,

    /// Currently active requests by tool
    pub active_requests: Family<ToolLabels, Gauge>,

    /// Total errors by tool and error type
    pub errors_total: Family<ErrorLabels, Counter>,

    /// Validation outcomes by engine
    pub validations_total: Family<OutcomeLabels, Counter>,

    /// Time spent inside validation engines
    pub validation_engine_seconds: Histogram,

    /// Resolution failures by stage and error kind
    pub resolution_errors_total: Family<StageLabels, Counter>,

    /// Resolved graphs currently held by requests
    pub resolved_graphs_live: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "rdfshape_requests_total",
            "Total number of requests",
            requests_total.clone(),
        );

        let request_duration_seconds = Family::<ToolLabels, Histogram>::new_with_constructor(|| {
            // Buckets: 10ms, 25ms, 62ms, 156ms, 390ms, 976ms, 2.4s, 6.1s, 15s, 38s
            Histogram::new(exponential_buckets(0.01, 2.5, 10))
        });
        registry.register(
            "rdfshape_request_duration_seconds",
            "Request latency histogram in seconds",
            request_duration_seconds.clone(),
        );

        let active_requests = Family::<ToolLabels, Gauge>::default();
        registry.register(
            "rdfshape_active_requests",
            "Number of requests currently being processed",
            active_requests.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "rdfshape_errors_total",
            "Total number of errors by tool and error type",
            errors_total.clone(),
        );

        let validations_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "rdfshape_validations_total",
            "Validation outcomes by schema engine",
            validations_total.clone(),
        );

        let validation_engine_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "rdfshape_validation_engine_seconds",
            "Time spent inside the validation engine",
            validation_engine_seconds.clone(),
        );

        let resolution_errors_total = Family::<StageLabels, Counter>::default();
        registry.register(
            "rdfshape_resolution_errors_total",
            "Resolution failures by pipeline stage",
            resolution_errors_total.clone(),
        );

        let resolved_graphs_live = Gauge::default();
        registry.register(
            "rdfshape_resolved_graphs_live",
            "Resolved graphs currently held by in-flight requests",
            resolved_graphs_live.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            requests_total,
            request_duration_seconds,
            active_requests,
            errors_total,
            validations_total,
            validation_engine_seconds,
            resolution_errors_total,
            resolved_graphs_live,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(error) = encode(&mut buffer, &registry) {
            tracing::warn!(%error, "failed to encode metrics");
        }
        buffer
    }

    pub fn record_request_success(&self, tool: &str, duration: Duration) {
        self.requests_total
            .get_or_create(&RequestLabels {
                tool: tool.to_string(),
                status: "success".to_string(),
            })
            .inc();

        self.request_duration_seconds
            .get_or_create(&ToolLabels {
                tool: tool.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_request_error(&self, tool: &str, duration: Duration, error_type: &str) {
        self.requests_total
            .get_or_create(&RequestLabels {
                tool: tool.to_string(),
                status: "error".to_string(),
            })
            .inc();

        self.request_duration_seconds
            .get_or_create(&ToolLabels {
                tool: tool.to_string(),
            })
            .observe(duration.as_secs_f64());

        self.errors_total
            .get_or_create(&ErrorLabels {
                tool: tool.to_string(),
                error_type: error_type.to_string(),
            })
            .inc();
    }

    pub fn record_validation(&self, engine: &str, outcome: &str, engine_time: Option<Duration>) {
        self.validations_total
            .get_or_create(&OutcomeLabels {
                engine: engine.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
        if let Some(elapsed) = engine_time {
            self.validation_engine_seconds
                .observe(elapsed.as_secs_f64());
        }
    }

    pub fn record_resolution_error(&self, stage: &str, kind: &str) {
        self.resolution_errors_total
            .get_or_create(&StageLabels {
                stage: stage.to_string(),
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn graph_acquired(&self) {
        self.resolved_graphs_live.inc();
    }

    pub fn graph_released(&self) {
        self.resolved_graphs_live.dec();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for automatic request timing and metric recording
///
/// Records the request as an error when dropped without an explicit outcome,
/// which covers cancelled requests.
///
/// ```no_run
/// use rdfshape_mcp::metrics::RequestMetrics;
///
/// async fn handle_request(tool: &str) -> anyhow::Result<()> {
///     let metrics = RequestMetrics::new(tool);
///     metrics.success();
///     Ok(())
/// }
/// ```
pub struct RequestMetrics {
    tool: String,
    start: Instant,
    completed: bool,
}

impl RequestMetrics {
    pub fn new(tool: &str) -> Self {
        METRICS
            .active_requests
            .get_or_create(&ToolLabels {
                tool: tool.to_string(),
            })
            .inc();

        Self {
            tool: tool.to_string(),
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn success(mut self) {
        METRICS.record_request_success(&self.tool, self.start.elapsed());
        self.finish();
    }

    pub fn error(mut self, error_type: &str) {
        METRICS.record_request_error(&self.tool, self.start.elapsed(), error_type);
        self.finish();
    }

    fn finish(&mut self) {
        self.completed = true;
        METRICS
            .active_requests
            .get_or_create(&ToolLabels {
                tool: self.tool.clone(),
            })
            .dec();
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.completed {
            METRICS.record_request_error(&self.tool, self.start.elapsed(), "cancelled");
            self.finish();
        }
    }
}

/// Wraps a tool body with request metrics.
#[macro_export]
macro_rules! with_metrics {
    ($tool:expr, $body:expr) => {{
        let metrics = $crate::metrics::RequestMetrics::new($tool);
        let result = $body;
        match &result {
            Ok(_) => metrics.success(),
            Err(error) => metrics.error($crate::error::classify(error).category()),
        }
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        let output = collector.encode();

        assert!(output.contains("rdfshape_requests_total"));
        assert!(output.contains("rdfshape_request_duration_seconds"));
        assert!(output.contains("rdfshape_validation_engine_seconds"));
        assert!(output.contains("rdfshape_resolved_graphs_live"));
    }

    #[test]
    fn test_record_request_error() {
        let collector = MetricsCollector::new();
        collector.record_request_error("validate", Duration::from_millis(50), "network_error");

        let output = collector.encode();
        assert!(output.contains("validate"));
        assert!(output.contains("network_error"));
    }

    #[test]
    fn test_validation_outcomes() {
        let collector = MetricsCollector::new();
        collector.record_validation("ShEx", "conformant", Some(Duration::from_millis(3)));
        collector.record_validation("SHACL", "non_conformant", Some(Duration::from_millis(1)));
        collector.record_validation("unresolved", "resolution_error", None);

        let output = collector.encode();
        assert!(output.contains("non_conformant"));
        assert!(output.contains("resolution_error"));
    }

    #[test]
    fn test_live_graph_gauge() {
        let collector = MetricsCollector::new();
        collector.graph_acquired();
        collector.graph_acquired();
        collector.graph_released();

        let output = collector.encode();
        assert!(output.contains("rdfshape_resolved_graphs_live 1"));
    }

    #[test]
    fn test_resolution_errors_by_stage() {
        let collector = MetricsCollector::new();
        collector.record_resolution_error("data", "network");
        collector.record_resolution_error("trigger", "shape_map");

        let output = collector.encode();
        assert!(output.contains("stage=\"data\""));
        assert!(output.contains("kind=\"shape_map\""));
    }
}
