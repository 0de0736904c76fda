//! Tracing setup and the spans a request carries through resolution,
//! validation and inference.
//!
//! Output is chosen with `LOG_FORMAT` (`pretty` or `json`), `LOG_OUTPUT`
//! (`stderr`, `stdout` or `file`) and `LOG_DIR`. Setting
//! `OTEL_EXPORTER_OTLP_ENDPOINT` adds an OTLP span exporter. With the stdio
//! transport the protocol owns stdout, so keep `LOG_OUTPUT` off `stdout`.

use anyhow::{Context, Result};
use opentelemetry::{
    KeyValue,
    trace::{TraceError, TracerProvider as _},
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use std::env;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use strum::EnumString;
use tracing::Span;
use tracing::field::Empty;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_FILTER: &str = "info,hyper=warn,h2=warn,reqwest=warn,tower=info";
const OTLP_EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rolling files under `log_dir`.
    File,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    pub log_dir: PathBuf,
    /// Present only when OTLP export is wanted.
    pub otlp_endpoint: Option<String>,
    /// Fraction of root traces kept, clamped to `0.0..=1.0`.
    pub otel_sampling_rate: f64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            otlp_endpoint: None,
            otel_sampling_rate: 1.0,
        }
    }
}

impl LoggingConfig {
    /// Reads the `LOG_*` and `OTEL_*` variables. Unparseable values keep the
    /// default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(format) = env_parse::<LogFormat>("LOG_FORMAT") {
            config.format = format;
        }
        if let Some(output) = env_parse::<LogOutput>("LOG_OUTPUT") {
            config.output = output;
        }
        if let Ok(dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        config.otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());
        if let Some(rate) = env_parse::<f64>("OTEL_SAMPLING_RATE") {
            config.otel_sampling_rate = rate.clamp(0.0, 1.0);
        }
        config
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                SERVICE_NAME,
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ),
            KeyValue::new("service.namespace", "rdfshape"),
        ])
    }

    fn sampler(&self) -> Sampler {
        if self.otel_sampling_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.otel_sampling_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.otel_sampling_rate,
            )))
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

/// Installs the global subscriber. Hold the returned guard until exit so
/// buffered lines are flushed.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (writer, guard) = match config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir)
                .with_context(|| format!("failed to create log directory {}", config.log_dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(&config.log_dir, SERVICE_NAME))
        }
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(matches!(config.output, LogOutput::Stderr))
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match init_tracer_provider(&config, endpoint) {
            Ok(provider) => Some(tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))),
            Err(error) => {
                eprintln!("OpenTelemetry export to {endpoint} disabled: {error}");
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(otel_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        format = ?config.format,
        output = ?config.output,
        otlp = config.otlp_endpoint.is_some(),
        "logging initialized"
    );
    Ok(guard)
}

fn init_tracer_provider(config: &LoggingConfig, endpoint: &str) -> Result<TracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(OTLP_EXPORT_TIMEOUT);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(config.sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(config.resource()),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Flushes pending spans to the OTLP exporter.
pub fn shutdown_telemetry() {
    tracing::info!("shutting down telemetry");
    opentelemetry::global::shutdown_tracer_provider();
}

/// One tool invocation, whichever transport it came from.
pub fn tool_span(tool: &str, transport: &'static str) -> Span {
    tracing::info_span!("mcp_tool", mcp.tool = tool, transport)
}

/// One validation run. The schema engine, trigger mode and outcome are
/// recorded once known, see [`record_validation_inputs`] and
/// [`record_validation_outcome`].
pub fn validation_span(data_source: &'static str) -> Span {
    tracing::info_span!(
        "validation",
        data.source = data_source,
        schema.engine = Empty,
        trigger.mode = Empty,
        outcome = Empty,
    )
}

pub fn record_validation_inputs(span: &Span, schema_engine: &str, trigger_mode: &str) {
    span.record("schema.engine", schema_engine);
    span.record("trigger.mode", trigger_mode);
}

pub fn record_validation_outcome(span: &Span, outcome: &str) {
    span.record("outcome", outcome);
}

/// Loading one input: `stage` is `data` or `schema`, `source` the kind of
/// source read.
pub fn resolution_span(stage: &'static str, source: &'static str) -> Span {
    tracing::debug_span!("resolve", stage, source)
}

/// One schema inference. The engine is recorded once the request's engine
/// name has been checked.
pub fn inference_span(node_selector: &str) -> Span {
    tracing::info_span!("inference", selector = node_selector, schema.engine = Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(run: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, run);
        let text = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        text
    }

    #[test]
    fn defaults_log_pretty_to_stderr() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn environment_selects_format_output_and_exporter() {
        unsafe {
            env::set_var("LOG_FORMAT", "JSON");
            env::set_var("LOG_OUTPUT", "file");
            env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317");
            env::set_var("OTEL_SAMPLING_RATE", "7");
        }
        let config = LoggingConfig::from_env();
        unsafe {
            env::remove_var("LOG_FORMAT");
            env::remove_var("LOG_OUTPUT");
            env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT");
            env::remove_var("OTEL_SAMPLING_RATE");
        }

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
        assert_eq!(config.otel_sampling_rate, 1.0);
    }

    #[test]
    #[serial_test::serial]
    fn unknown_values_keep_the_defaults() {
        unsafe {
            env::set_var("LOG_FORMAT", "xml");
            env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", " ");
        }
        let config = LoggingConfig::from_env();
        unsafe {
            env::remove_var("LOG_FORMAT");
            env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT");
        }

        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn validation_events_carry_the_request_shape() {
        let logs = captured(|| {
            let span = validation_span("compound");
            let _entered = span.enter();
            record_validation_inputs(&span, "ShEx", "TargetDecls");
            record_validation_outcome(&span, "conformant");
            tracing::info!("validation finished");
        });
        assert!(logs.contains("validation{"), "{logs}");
        assert!(logs.contains("compound"), "{logs}");
        assert!(logs.contains("ShEx"), "{logs}");
        assert!(logs.contains("TargetDecls"), "{logs}");
        assert!(logs.contains("conformant"), "{logs}");
    }

    #[test]
    fn resolution_events_name_stage_and_source() {
        let logs = captured(|| {
            let _entered = resolution_span("data", "url").entered();
            tracing::debug!("fetched");
        });
        assert!(logs.contains("resolve{"), "{logs}");
        assert!(logs.contains("stage=\"data\"") || logs.contains("stage=data"), "{logs}");
        assert!(logs.contains("url"), "{logs}");
    }
}
