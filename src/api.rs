//! JSON API under `/api`, mirroring the MCP tools one route per tool.

use crate::error::{ErrorCode, ToolDisabledError, classify};
use crate::state::AppState;
use crate::tools;
use crate::with_metrics;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

pub const API_PREFIX: &str = "/api";

/// Routes relative to [`API_PREFIX`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/schema/convert", post(convert_schema))
        .route("/schema/infer", post(infer_schema))
        .route("/schema/info", post(schema_info))
        .route("/data/info", post(data_info))
        .route("/data/convert", post(convert_data))
        .route("/formats", get(list_formats))
        .with_state(state)
}

/// An application error rendered with its MCP code.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

#[derive(Serialize)]
struct ErrorBody {
    code: i32,
    category: &'static str,
    message: String,
}

impl ApiError {
    fn status(code: ErrorCode) -> StatusCode {
        match code {
            ErrorCode::ToolDisabled => StatusCode::FORBIDDEN,
            ErrorCode::NetworkFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError | ErrorCode::EngineFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ParseError
            | ErrorCode::InvalidRequest
            | ErrorCode::InvalidParams
            | ErrorCode::ResolutionFailed
            | ErrorCode::UnknownInferenceEngine
            | ErrorCode::ConversionFailed
            | ErrorCode::InferenceFailed => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = classify(&self.0);
        let body = ErrorBody {
            code: code.code(),
            category: code.category(),
            message: self.0.to_string(),
        };
        (Self::status(code), Json(body)).into_response()
    }
}

async fn run<T, F>(state: &AppState, tool: &'static str, operation: F) -> Result<Json<T>, ApiError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    with_metrics!(tool, async {
        if !state.config().is_tool_enabled(tool) {
            return Err(ToolDisabledError::new(tool).into());
        }
        operation.await
    }
    .instrument(crate::logging::tool_span(tool, "http"))
    .await)
    .map(Json)
    .map_err(ApiError)
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::ValidateParams>,
) -> Result<Json<crate::model::ValidateResponse>, ApiError> {
    run(&state, "validate", tools::validate(state.clone(), params)).await
}

async fn convert_schema(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::ConvertSchemaParams>,
) -> Result<Json<crate::model::ConvertSchemaResponse>, ApiError> {
    run(&state, "convert_schema", tools::convert_schema(state.clone(), params)).await
}

async fn infer_schema(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::InferSchemaParams>,
) -> Result<Json<crate::model::InferSchemaResponse>, ApiError> {
    run(&state, "infer_schema", tools::infer_schema(state.clone(), params)).await
}

async fn schema_info(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::SchemaInfoParams>,
) -> Result<Json<crate::model::SchemaInfoResponse>, ApiError> {
    run(&state, "schema_info", tools::schema_info(state.clone(), params)).await
}

async fn data_info(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::DataParamsWithBase>,
) -> Result<Json<crate::model::DataInfoResponse>, ApiError> {
    run(&state, "data_info", tools::data_info(state.clone(), params)).await
}

async fn convert_data(
    State(state): State<Arc<AppState>>,
    Json(params): Json<tools::DataParamsWithBase>,
) -> Result<Json<crate::model::ConvertDataResponse>, ApiError> {
    run(&state, "convert_data", tools::convert_data(state.clone(), params)).await
}

async fn list_formats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<crate::format::FormatCatalog>, ApiError> {
    run(&state, "list_formats", tools::list_formats(state.clone(), tools::ListFormatsParams {})).await
}
