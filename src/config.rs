use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_IRI: &str = "internal://base/";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_FETCH_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_ENDPOINT_FOLLOW_DEPTH: usize = 2;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Tool names accepted by `--enabled-tools`.
pub const KNOWN_TOOLS: &[&str] = &[
    "validate",
    "convert_schema",
    "infer_schema",
    "schema_info",
    "data_info",
    "convert_data",
    "list_formats",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[value(alias = "stream-http", alias = "stream_http")]
    #[serde(alias = "stream-http", alias = "stream_http")]
    Http,
    Stdio,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Http => write!(f, "http"),
            TransportKind::Stdio => write!(f, "stdio"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub http_bind_address: SocketAddr,
    /// Base for relative IRIs in requests that carry none.
    pub default_base_iri: String,
    pub fetch_timeout_secs: u64,
    pub max_fetch_bytes: usize,
    /// Hops followed from focus nodes when materialising SPARQL data.
    pub endpoint_follow_depth: usize,
    pub enabled_tools: Option<HashSet<String>>,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Http,
            http_bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            default_base_iri: DEFAULT_BASE_IRI.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            endpoint_follow_depth: DEFAULT_ENDPOINT_FOLLOW_DEPTH,
            enabled_tools: None,
            graceful_shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            transport: cli_transport,
            http_bind: cli_http_bind,
            default_base_iri: cli_base,
            fetch_timeout_secs: cli_fetch_timeout,
            max_fetch_bytes: cli_max_fetch_bytes,
            endpoint_follow_depth: cli_follow_depth,
            enabled_tools: cli_enabled_tools,
            graceful_shutdown_timeout_secs: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            transport: file_transport,
            http_bind: file_http_bind,
            default_base_iri: file_base,
            fetch_timeout_secs: file_fetch_timeout,
            max_fetch_bytes: file_max_fetch_bytes,
            endpoint_follow_depth: file_follow_depth,
            enabled_tools: file_enabled_tools,
            graceful_shutdown_timeout_secs: file_shutdown_timeout,
        } = file_config;

        let enabled_tools = cli_enabled_tools
            .or(file_enabled_tools)
            .map(|tools| {
                tools
                    .into_iter()
                    .map(|tool| tool.trim().to_ascii_lowercase())
                    .filter(|tool| !tool.is_empty())
                    .collect::<HashSet<_>>()
            })
            .filter(|set| !set.is_empty());

        let http_bind_address = match cli_http_bind.or(file_http_bind) {
            Some(address) => address,
            None => DEFAULT_HTTP_BIND
                .parse()
                .context("default bind address is invalid")?,
        };

        let config = Self {
            transport: cli_transport.or(file_transport).unwrap_or(TransportKind::Http),
            http_bind_address,
            default_base_iri: cli_base
                .or(file_base)
                .unwrap_or_else(|| DEFAULT_BASE_IRI.to_string()),
            fetch_timeout_secs: cli_fetch_timeout
                .or(file_fetch_timeout)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            max_fetch_bytes: cli_max_fetch_bytes
                .or(file_max_fetch_bytes)
                .unwrap_or(DEFAULT_MAX_FETCH_BYTES),
            endpoint_follow_depth: cli_follow_depth
                .or(file_follow_depth)
                .unwrap_or(DEFAULT_ENDPOINT_FOLLOW_DEPTH),
            enabled_tools,
            graceful_shutdown_timeout_secs: cli_shutdown_timeout
                .or(file_shutdown_timeout)
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.default_base_iri)
            .with_context(|| format!("default base IRI {:?} is not absolute", self.default_base_iri))?;
        anyhow::ensure!(
            !base.cannot_be_a_base(),
            "default base IRI {:?} cannot resolve relative IRIs",
            self.default_base_iri
        );
        anyhow::ensure!(self.fetch_timeout_secs > 0, "fetch timeout must be at least one second");
        anyhow::ensure!(self.max_fetch_bytes > 0, "max fetch bytes must be positive");
        if let Some(tools) = &self.enabled_tools {
            let unknown = tools
                .iter()
                .filter(|tool| !KNOWN_TOOLS.contains(&tool.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            anyhow::ensure!(
                unknown.is_empty(),
                "unknown tools {:?}; expected some of {:?}",
                unknown,
                KNOWN_TOOLS
            );
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        match &self.enabled_tools {
            Some(set) => set.contains(&tool.to_ascii_lowercase()),
            None => true,
        }
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "rdfshape-mcp", about = "RDF shape validation MCP server", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_TRANSPORT",
        value_enum,
        value_name = "TRANSPORT",
        help = "Transport to expose (http or stdio)"
    )]
    pub transport: Option<TransportKind>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address when using http transport"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_DEFAULT_BASE_IRI",
        value_name = "IRI",
        help = "Base IRI for requests that do not provide one"
    )]
    pub default_base_iri: Option<String>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_FETCH_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Timeout for remote documents and SPARQL queries",
        value_parser = clap::value_parser!(u64)
    )]
    pub fetch_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_MAX_FETCH_BYTES",
        value_name = "BYTES",
        help = "Largest remote document accepted",
        value_parser = clap::value_parser!(usize)
    )]
    pub max_fetch_bytes: Option<usize>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_ENDPOINT_FOLLOW_DEPTH",
        value_name = "N",
        help = "Hops followed from focus nodes when reading SPARQL endpoints",
        value_parser = clap::value_parser!(usize)
    )]
    pub endpoint_follow_depth: Option<usize>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_ENABLED_TOOLS",
        value_name = "TOOL",
        value_delimiter = ',',
        help = "Restrict execution to the provided tool names"
    )]
    pub enabled_tools: Option<Vec<String>>,

    #[arg(
        long,
        env = "RDFSHAPE_MCP_GRACEFUL_SHUTDOWN_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Time allowed for in-flight requests on shutdown",
        value_parser = clap::value_parser!(u64)
    )]
    pub graceful_shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    transport: Option<TransportKind>,
    http_bind: Option<SocketAddr>,
    default_base_iri: Option<String>,
    fetch_timeout_secs: Option<u64>,
    max_fetch_bytes: Option<usize>,
    endpoint_follow_depth: Option<usize>,
    enabled_tools: Option<Vec<String>>,
    graceful_shutdown_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
