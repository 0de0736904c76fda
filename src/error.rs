//! Error taxonomy for the validation service
//!
//! This module provides:
//! - Typed errors for every stage of the pipeline (resolution, network,
//!   entailment, conversion, inference, engine execution)
//! - MCP error codes (JSON-RPC standard + custom codes)
//! - Conversion of any error into an rmcp error payload

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// MCP ERROR CODES
// =============================================================================

/// MCP error codes following JSON-RPC 2.0 specification plus custom codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    // Standard JSON-RPC errors (-32700 to -32603)
    /// Invalid JSON was received by the server
    ParseError = -32700,
    /// The JSON sent is not a valid Request object
    InvalidRequest = -32600,
    /// Invalid method parameter(s)
    InvalidParams = -32602,
    /// Internal JSON-RPC error
    InternalError = -32603,

    // Custom application errors (-32000 to -32099)
    /// Data, schema or shape map could not be resolved
    ResolutionFailed = -32001,
    /// A remote source could not be fetched
    NetworkFailure = -32002,
    /// Unknown entailment regime requested
    UnknownInferenceEngine = -32003,
    /// Schema conversion failed or is unsupported
    ConversionFailed = -32004,
    /// Schema inference failed
    InferenceFailed = -32005,
    /// The validation engine failed unexpectedly
    EngineFailure = -32006,
    /// Tool disabled by configuration
    ToolDisabled = -32014,
}

impl ErrorCode {
    /// Get the integer code
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Network fetches are never retried automatically, but a client may.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::NetworkFailure | ErrorCode::InternalError)
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::ParseError | ErrorCode::InvalidRequest | ErrorCode::InvalidParams => {
                "client_error"
            }
            ErrorCode::ToolDisabled => "not_found",
            ErrorCode::InternalError | ErrorCode::EngineFailure => "server_error",
            ErrorCode::ResolutionFailed | ErrorCode::UnknownInferenceEngine => "resolution_error",
            ErrorCode::NetworkFailure => "network_error",
            ErrorCode::ConversionFailed | ErrorCode::InferenceFailed => "schema_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Anything that can be reported with a stable MCP error code.
pub trait HasErrorCode {
    fn error_code(&self) -> ErrorCode;
}

// =============================================================================
// PIPELINE ERRORS
// =============================================================================

/// A remote fetch failed. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("failed to fetch {url}: {message}")]
    Request { url: String, message: String },
    #[error("fetching {url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("response from {url} exceeds the limit of {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl NetworkError {
    pub fn url(&self) -> &str {
        match self {
            NetworkError::Request { url, .. }
            | NetworkError::Status { url, .. }
            | NetworkError::TooLarge { url, .. } => url,
        }
    }
}

/// An entailment regime name that the registry does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown inference engine '{name}' (supported: {supported})")]
pub struct InferenceEngineError {
    pub name: String,
    pub supported: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("unknown {kind} format '{name}'")]
    UnknownFormat { kind: &'static str, name: String },
    #[error("unknown schema engine '{0}'")]
    UnknownEngine(String),
    #[error("format '{format}' is not supported by schema engine {engine}")]
    UnsupportedFormat { format: String, engine: String },
    #[error("no {0} was supplied")]
    MissingSource(String),
    #[error("unknown {kind} source selector '{name}'")]
    UnknownSelector { kind: &'static str, name: String },
    #[error("failed to parse {format}: {message}")]
    Parse { format: String, message: String },
    #[error("invalid IRI '{iri}': {message}")]
    InvalidIri { iri: String, message: String },
    #[error("unknown trigger mode '{0}'")]
    UnknownTriggerMode(String),
    #[error("invalid shape map: {0}")]
    ShapeMap(String),
    #[error("compound data source #{index} failed: {source}")]
    Compound {
        index: usize,
        #[source]
        source: Box<ResolutionError>,
    },
    #[error("SPARQL endpoint {endpoint} failed: {message}")]
    Endpoint { endpoint: String, message: String },
    #[error("extractor '{extractor}' failed: {message}")]
    Extraction { extractor: String, message: String },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    InferenceEngine(#[from] InferenceEngineError),
}

impl ResolutionError {
    pub fn parse(format: impl Into<String>, message: impl fmt::Display) -> Self {
        ResolutionError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_iri(iri: impl Into<String>, message: impl fmt::Display) -> Self {
        ResolutionError::InvalidIri {
            iri: iri.into(),
            message: message.to_string(),
        }
    }

    /// Short label used by metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionError::UnknownFormat { .. } => "unknown_format",
            ResolutionError::UnknownEngine(_) => "unknown_engine",
            ResolutionError::UnsupportedFormat { .. } => "unsupported_format",
            ResolutionError::MissingSource(_) => "missing_source",
            ResolutionError::UnknownSelector { .. } => "unknown_selector",
            ResolutionError::Parse { .. } => "parse",
            ResolutionError::InvalidIri { .. } => "invalid_iri",
            ResolutionError::UnknownTriggerMode(_) => "unknown_trigger_mode",
            ResolutionError::ShapeMap(_) => "shape_map",
            ResolutionError::Compound { source, .. } => source.kind(),
            ResolutionError::Endpoint { .. } => "endpoint",
            ResolutionError::Extraction { .. } => "extraction",
            ResolutionError::Network(_) => "network",
            ResolutionError::InferenceEngine(_) => "inference_engine",
        }
    }

    /// Walks through compound wrappers to the failure that caused them.
    pub fn root(&self) -> &ResolutionError {
        match self {
            ResolutionError::Compound { source, .. } => source.root(),
            other => other,
        }
    }
}

impl HasErrorCode for ResolutionError {
    fn error_code(&self) -> ErrorCode {
        match self.root() {
            ResolutionError::Network(_) => ErrorCode::NetworkFailure,
            ResolutionError::InferenceEngine(_) => ErrorCode::UnknownInferenceEngine,
            _ => ErrorCode::ResolutionFailed,
        }
    }
}

/// Serialising a graph, schema or shape map failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to serialize as {format}: {message}")]
pub struct SerializationError {
    pub format: String,
    pub message: String,
}

impl SerializationError {
    pub fn new(format: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            format: format.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("conversion from {from} to {to} is not supported")]
    UnsupportedEnginePair { from: String, to: String },
    #[error("schema translation failed: {0}")]
    Translation(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl HasErrorCode for ConversionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ConversionError::Resolution(inner) => inner.error_code(),
            _ => ErrorCode::ConversionFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("invalid node selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("node selector '{0}' matches no node in the data")]
    NoMatchingNodes(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl HasErrorCode for InferenceError {
    fn error_code(&self) -> ErrorCode {
        match self {
            InferenceError::Resolution(inner) => inner.error_code(),
            _ => ErrorCode::InferenceFailed,
        }
    }
}

/// The validation engine raised instead of producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation engine failure: {message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl HasErrorCode for EngineFailure {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::EngineFailure
    }
}

// =============================================================================
// CONVERSION TO MCP ERRORS
// =============================================================================

/// Tool rejected by configuration.
#[derive(Debug, Error)]
#[error("tool '{tool_name}' is disabled by server configuration")]
pub struct ToolDisabledError {
    tool_name: String,
}

impl ToolDisabledError {
    pub fn new(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_ascii_lowercase(),
        }
    }
}

/// Classify an application error by walking the typed errors it may wrap.
pub fn classify(error: &anyhow::Error) -> ErrorCode {
    if error.downcast_ref::<ToolDisabledError>().is_some() {
        return ErrorCode::ToolDisabled;
    }
    if let Some(inner) = error.downcast_ref::<ResolutionError>() {
        return inner.error_code();
    }
    if let Some(inner) = error.downcast_ref::<ConversionError>() {
        return inner.error_code();
    }
    if let Some(inner) = error.downcast_ref::<InferenceError>() {
        return inner.error_code();
    }
    if error.downcast_ref::<NetworkError>().is_some() {
        return ErrorCode::NetworkFailure;
    }
    if error.downcast_ref::<InferenceEngineError>().is_some() {
        return ErrorCode::UnknownInferenceEngine;
    }
    if let Some(inner) = error.downcast_ref::<EngineFailure>() {
        return inner.error_code();
    }
    if error.downcast_ref::<serde_json::Error>().is_some() {
        return ErrorCode::InvalidParams;
    }
    ErrorCode::InternalError
}

/// Convert an application error into the rmcp wire error.
pub fn to_mcp_error(error: anyhow::Error) -> rmcp::ErrorData {
    let code = classify(&error);
    let causes = error
        .chain()
        .skip(1)
        .take(3)
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>();
    let data = serde_json::json!({
        "code": code.code(),
        "category": code.category(),
        "retryable": code.is_retryable(),
        "causes": causes,
    });
    let message = error.to_string();

    match code {
        ErrorCode::InvalidRequest | ErrorCode::ToolDisabled => {
            rmcp::ErrorData::invalid_request(message, Some(data))
        }
        ErrorCode::InvalidParams | ErrorCode::ParseError => {
            rmcp::ErrorData::invalid_params(message, Some(data))
        }
        ErrorCode::InternalError => rmcp::ErrorData::internal_error(message, Some(data)),
        custom => rmcp::ErrorData::new(rmcp::model::ErrorCode(custom.code()), message, Some(data)),
    }
}
