//! Tool responses. Field names are camelCase on the wire for both transports.

use crate::convert::ConversionOutput;
use crate::infer::InferenceOutput;
use crate::info::{DataConversion, DataInfo, SchemaInfo};
use crate::shapemap::ShapeLabel;
use crate::validation::ValidationOutcome;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    /// `true` when the engine did not run or failed.
    pub is_error: bool,
    pub message: String,
    /// Full result: result shape map or SHACL report.
    pub result: serde_json::Value,
    /// Trigger the engine ran with; absent when inputs did not resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<serde_json::Value>,
    pub elapsed_nanos: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_shape_map_tab: Option<String>,
    /// Echo of inline or uploaded data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl ValidateResponse {
    pub fn from_outcome(outcome: ValidationOutcome, with_html: bool) -> Self {
        let ValidationOutcome {
            result,
            trigger,
            elapsed_nanos,
            active_tab,
            data_echo,
        } = outcome;
        Self {
            valid: result.valid,
            is_error: result.is_error(),
            message: result.message.clone(),
            html: with_html.then(|| result.to_html()),
            result: result.to_json(),
            trigger: trigger.as_ref().map(|trigger| trigger.to_json()),
            elapsed_nanos,
            active_shape_map_tab: active_tab,
            data: data_echo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSchemaResponse {
    pub schema: String,
    pub source_engine: String,
    pub target_engine: String,
    pub target_format: String,
    /// Associations reproducing the source targets; empty for reserialisation.
    pub shape_map: serde_json::Value,
    pub shape_map_compact: String,
}

impl From<ConversionOutput> for ConvertSchemaResponse {
    fn from(output: ConversionOutput) -> Self {
        Self {
            shape_map: output.shape_map.to_json(),
            shape_map_compact: output.shape_map.to_compact(),
            schema: output.text,
            source_engine: output.source_engine.to_string(),
            target_engine: output.target_engine.to_string(),
            target_format: output.target_format.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferSchemaResponse {
    pub schema: String,
    pub engine: String,
    pub format: String,
    pub label: String,
    pub shapes: Vec<String>,
    /// Selected nodes, all conformant to the inferred shape.
    pub shape_map: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
}

impl From<InferenceOutput> for InferSchemaResponse {
    fn from(output: InferenceOutput) -> Self {
        Self {
            shape_map: serde_json::to_value(&output.shape_map).unwrap_or_default(),
            label: match &output.label {
                ShapeLabel::Iri(iri) => iri.as_str().to_string(),
                other => other.to_string(),
            },
            schema: output.text,
            engine: output.engine.to_string(),
            format: output.format.to_string(),
            shapes: output.shapes,
            uml: output.uml,
            svg: output.svg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfoResponse {
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub shapes: Vec<String>,
    pub prefixes: BTreeMap<String, String>,
}

impl From<SchemaInfo> for SchemaInfoResponse {
    fn from(info: SchemaInfo) -> Self {
        Self {
            engine: info.engine.to_string(),
            format: info.format.map(|format| format.to_string()),
            shapes: info.shapes,
            prefixes: info.prefixes.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataInfoResponse {
    pub triples: usize,
    pub subjects: usize,
    pub predicates: Vec<String>,
    pub prefixes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    pub inference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl From<DataInfo> for DataInfoResponse {
    fn from(info: DataInfo) -> Self {
        Self {
            triples: info.triples,
            subjects: info.subjects,
            predicates: info.predicates,
            prefixes: info.prefixes.into_iter().collect(),
            endpoints: info.endpoints,
            inference: info.inference,
            data: info.echo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertDataResponse {
    pub data: String,
    pub format: String,
    pub media_type: String,
    pub triples: usize,
}

impl From<DataConversion> for ConvertDataResponse {
    fn from(conversion: DataConversion) -> Self {
        Self {
            data: conversion.text,
            format: conversion.format,
            media_type: conversion.media_type,
            triples: conversion.triples,
        }
    }
}
