//! Tool parameters and the operations behind them. Shared by the MCP server
//! and the HTTP API so both transports accept the same payloads.

use crate::format::FormatCatalog;
use crate::infer::{InferenceOptions, InferenceRequest};
use crate::model::*;
use crate::resolve::{DataParams, DataSpec, SchemaParams, SchemaSpec, ShapeMapSources};
use crate::state::AppState;
use anyhow::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateParams {
    #[serde(flatten)]
    pub data: DataParams,
    #[serde(flatten)]
    pub schema: SchemaParams,
    #[serde(flatten)]
    pub shape_map: ShapeMapSources,
    /// Base IRI for relative IRIs in every input
    pub base: Option<String>,
    /// Also render the result as an HTML fragment
    #[serde(default)]
    pub html: bool,
}

/// Validation never fails at this level: problems come back inside the
/// response with `isError` set.
pub async fn validate(state: Arc<AppState>, params: ValidateParams) -> Result<ValidateResponse> {
    let outcome = match (DataSpec::from_params(&params.data), SchemaSpec::from_params(&params.schema)) {
        (Ok(data), Ok(schema)) => {
            state
                .validation()
                .validate(&data, &schema, &params.shape_map, params.base.as_deref())
                .await
        }
        (Err(error), _) | (_, Err(error)) => {
            tracing::info!(%error, "validation request rejected");
            crate::metrics::METRICS.record_resolution_error("request", error.kind());
            crate::validation::ValidationOutcome::unresolved(
                &error,
                params.shape_map.active_shape_map_tab.clone(),
            )
        }
    };
    Ok(ValidateResponse::from_outcome(outcome, params.html))
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSchemaParams {
    #[serde(flatten)]
    pub schema: SchemaParams,
    /// Output format; the target engine's default when absent
    pub target_schema_format: Option<String>,
    /// Output engine; the source engine when absent
    pub target_schema_engine: Option<String>,
    pub base: Option<String>,
}

pub async fn convert_schema(
    state: Arc<AppState>,
    params: ConvertSchemaParams,
) -> Result<ConvertSchemaResponse> {
    let spec = SchemaSpec::from_params(&params.schema)?;
    let output = state
        .conversion()
        .convert_schema(
            &spec,
            params.target_schema_format.as_deref(),
            params.target_schema_engine.as_deref(),
            params.base.as_deref(),
        )
        .await?;
    Ok(output.into())
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferSchemaParams {
    #[serde(flatten)]
    pub data: DataParams,
    /// Nodes to infer from, in shape map syntax: `ex:alice`, `{FOCUS a ex:Person}`
    pub node_selector: String,
    pub schema_engine: Option<String>,
    pub schema_format: Option<String>,
    /// Label of the inferred shape
    pub shape_label: Option<String>,
    #[serde(default)]
    pub options: InferenceOptions,
    /// Also render a PlantUML diagram and an SVG
    #[serde(default)]
    pub visualize: bool,
    pub base: Option<String>,
}

pub async fn infer_schema(state: Arc<AppState>, params: InferSchemaParams) -> Result<InferSchemaResponse> {
    let request = InferenceRequest {
        data: DataSpec::from_params(&params.data)?,
        node_selector: params.node_selector,
        engine: params.schema_engine,
        label: params.shape_label,
        format: params.schema_format,
        options: params.options,
        visualize: params.visualize,
        base: params.base,
    };
    let output = state.inference().infer_schema(&request).await?;
    Ok(output.into())
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfoParams {
    #[serde(flatten)]
    pub schema: SchemaParams,
    /// Data carrying the shapes when `schemaEmbedded` is set
    #[serde(flatten)]
    pub data: DataParams,
    pub base: Option<String>,
}

pub async fn schema_info(state: Arc<AppState>, params: SchemaInfoParams) -> Result<SchemaInfoResponse> {
    let spec = SchemaSpec::from_params(&params.schema)?;
    let data = if spec.embedded_in_data {
        Some(DataSpec::from_params(&params.data)?)
    } else {
        None
    };
    let info = state
        .schema()
        .info(&spec, data.as_ref(), params.base.as_deref())
        .await?;
    Ok(info.into())
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataParamsWithBase {
    #[serde(flatten)]
    pub data: DataParams,
    pub base: Option<String>,
}

pub async fn data_info(state: Arc<AppState>, params: DataParamsWithBase) -> Result<DataInfoResponse> {
    let spec = DataSpec::from_params(&params.data)?;
    let info = state.data().info(&spec, params.base.as_deref()).await?;
    Ok(info.into())
}

pub async fn convert_data(state: Arc<AppState>, params: DataParamsWithBase) -> Result<ConvertDataResponse> {
    let spec = DataSpec::from_params(&params.data)?;
    let conversion = state.data().convert(&spec, params.base.as_deref()).await?;
    Ok(conversion.into())
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListFormatsParams {}

pub async fn list_formats(state: Arc<AppState>, _params: ListFormatsParams) -> Result<FormatCatalog> {
    Ok(state.schema().list_formats())
}
