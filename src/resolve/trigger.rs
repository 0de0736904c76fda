//! Shape map sources, their merge and the resulting validation trigger.
//!
//! Clients may send a shape map in several fields at once. Exactly one wins,
//! by the fixed priority
//!
//! `shapeMap > shapeMapAlt > shapeMapUrl > shapeMapFile > (none)`
//!
//! and the losers are logged, never rejected.

use super::Resolver;
use crate::error::ResolutionError;
use crate::format::{FormatRegistry, ShapeMapFormat, TriggerMode, non_blank};
use crate::rdf::prefix::PrefixMap;
use crate::shapemap::{NodeSelector, QueryShapeMap, ShapeLabel, parse_node_selector, parse_shape_label};
use oxigraph::model::Term;
use schemars::JsonSchema;
use serde::Deserialize;

/// Shape map and trigger fields of a request, as a client sends them.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShapeMapSources {
    /// Shape map text, e.g. `ex:alice@ex:Person`
    #[serde(default)]
    pub shape_map: Option<String>,
    #[serde(default)]
    pub shape_map_format: Option<String>,
    /// Shape map text from a secondary input
    #[serde(default)]
    pub shape_map_alt: Option<String>,
    #[serde(default)]
    pub shape_map_alt_format: Option<String>,
    /// URL to fetch a shape map from
    #[serde(default)]
    pub shape_map_url: Option<String>,
    #[serde(default)]
    pub shape_map_url_format: Option<String>,
    /// Contents of an uploaded shape map file
    #[serde(default)]
    pub shape_map_file: Option<String>,
    #[serde(default)]
    pub shape_map_file_format: Option<String>,
    /// ShapeMap, TargetDecls or NodeShape
    #[serde(default)]
    pub trigger_mode: Option<String>,
    /// Focus node for the NodeShape mode
    #[serde(default)]
    pub node: Option<String>,
    /// Shape label for the NodeShape mode
    #[serde(default)]
    pub shape: Option<String>,
    /// Client UI hint, echoed back unchanged
    #[serde(default)]
    pub active_shape_map_tab: Option<String>,
}

impl ShapeMapSources {
    pub fn shape_map(text: impl Into<String>) -> Self {
        Self {
            shape_map: Some(text.into()),
            ..Default::default()
        }
    }

    /// The URL to fetch, only when no higher-priority field is set and the
    /// trigger mode can use a shape map at all.
    pub fn url_to_fetch(&self) -> Option<&str> {
        let declarative = matches!(
            non_blank(self.trigger_mode.as_deref()).map(str::to_ascii_lowercase).as_deref(),
            Some("targetdecls" | "nodeshape")
        );
        if declarative
            || non_blank(self.shape_map.as_deref()).is_some()
            || non_blank(self.shape_map_alt.as_deref()).is_some()
        {
            return None;
        }
        non_blank(self.shape_map_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    ShapeMap { source: String, format: ShapeMapFormat },
    TargetDecls,
    NodeShape { node: String, shape: String },
}

/// The merged trigger description, before prefix maps are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerModeSpec {
    pub trigger: TriggerSpec,
    pub active_tab: Option<String>,
}

/// Fetches the shape map URL when it would be the winning source.
pub async fn fetch_shape_map(
    resolver: &Resolver,
    sources: &ShapeMapSources,
) -> Result<Option<String>, ResolutionError> {
    let Some(url) = sources.url_to_fetch() else {
        return Ok(None);
    };
    let bytes = resolver.fetcher.fetch(url).await?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|error| ResolutionError::ShapeMap(format!("{url} is not UTF-8: {error}")))
}

/// Merges the client fields into one trigger description.
///
/// `fetched` is the body of `shapeMapUrl`, when it was fetched.
pub fn merge(
    sources: &ShapeMapSources,
    fetched: Option<&str>,
    registry: &FormatRegistry,
) -> Result<TriggerModeSpec, ResolutionError> {
    let active_tab = non_blank(sources.active_shape_map_tab.as_deref()).map(str::to_string);
    let trigger = match registry.trigger_mode(sources.trigger_mode.as_deref())? {
        Some(TriggerMode::TargetDecls) => TriggerSpec::TargetDecls,
        Some(TriggerMode::NodeShape) => {
            let node = non_blank(sources.node.as_deref())
                .ok_or_else(|| ResolutionError::MissingSource("node for the NodeShape trigger".to_string()))?;
            let shape = non_blank(sources.shape.as_deref())
                .ok_or_else(|| ResolutionError::MissingSource("shape for the NodeShape trigger".to_string()))?;
            TriggerSpec::NodeShape {
                node: node.to_string(),
                shape: shape.to_string(),
            }
        }
        Some(TriggerMode::ShapeMap) | None => pick_shape_map(sources, fetched, registry)?,
    };
    Ok(TriggerModeSpec { trigger, active_tab })
}

fn pick_shape_map(
    sources: &ShapeMapSources,
    fetched: Option<&str>,
    registry: &FormatRegistry,
) -> Result<TriggerSpec, ResolutionError> {
    // The URL counts as present even when its body was not fetched.
    let url_candidate = fetched.or_else(|| non_blank(sources.shape_map_url.as_deref()).map(|_| ""));
    let candidates = [
        ("shapeMap", non_blank(sources.shape_map.as_deref()), &sources.shape_map_format),
        ("shapeMapAlt", non_blank(sources.shape_map_alt.as_deref()), &sources.shape_map_alt_format),
        ("shapeMapUrl", url_candidate, &sources.shape_map_url_format),
        ("shapeMapFile", non_blank(sources.shape_map_file.as_deref()), &sources.shape_map_file_format),
    ];
    let present = candidates
        .iter()
        .filter(|(_, text, _)| text.is_some())
        .collect::<Vec<_>>();

    let Some((winner, Some(text), format)) = present.first().copied() else {
        return Ok(TriggerSpec::TargetDecls);
    };
    let ignored = present[1..]
        .iter()
        .filter(|(_, other, _)| *other != Some(*text))
        .map(|(field, _, _)| *field)
        .collect::<Vec<_>>();
    if !ignored.is_empty() {
        tracing::warn!(
            used = winner,
            ignored = ?ignored,
            "several shape maps supplied, using the highest-priority one"
        );
    }
    if text.trim().is_empty() {
        return Ok(TriggerSpec::TargetDecls);
    }
    Ok(TriggerSpec::ShapeMap {
        source: text.to_string(),
        format: registry.shape_map_format(format.as_deref())?,
    })
}

/// What the engine is asked to check, bound to both prefix maps.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationTrigger {
    ShapeMap(QueryShapeMap),
    TargetDecls,
    NodeShape { node: Term, shape: ShapeLabel },
}

impl ValidationTrigger {
    pub fn mode(&self) -> TriggerMode {
        match self {
            ValidationTrigger::ShapeMap(_) => TriggerMode::ShapeMap,
            ValidationTrigger::TargetDecls => TriggerMode::TargetDecls,
            ValidationTrigger::NodeShape { .. } => TriggerMode::NodeShape,
        }
    }

    /// Echo of the trigger for responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ValidationTrigger::ShapeMap(query) => serde_json::json!({
                "mode": self.mode().to_string(),
                "shapeMap": query.to_compact(),
            }),
            ValidationTrigger::TargetDecls => serde_json::json!({ "mode": self.mode().to_string() }),
            ValidationTrigger::NodeShape { node, shape } => serde_json::json!({
                "mode": self.mode().to_string(),
                "node": node.to_string(),
                "shape": shape.to_string(),
            }),
        }
    }
}

/// Binds the merged trigger to the data and schema prefix maps.
pub fn derive_trigger(
    spec: &TriggerModeSpec,
    data_prefixes: &PrefixMap,
    schema_prefixes: &PrefixMap,
    base: Option<&str>,
) -> Result<ValidationTrigger, ResolutionError> {
    match &spec.trigger {
        TriggerSpec::TargetDecls => Ok(ValidationTrigger::TargetDecls),
        TriggerSpec::ShapeMap { source, format } => {
            let query = QueryShapeMap::parse(source, *format, data_prefixes, schema_prefixes, base)
                .map_err(|error| ResolutionError::ShapeMap(error.to_string()))?;
            if query.is_empty() {
                Ok(ValidationTrigger::TargetDecls)
            } else {
                Ok(ValidationTrigger::ShapeMap(query))
            }
        }
        TriggerSpec::NodeShape { node, shape } => {
            let mut node_prefixes = data_prefixes.clone();
            node_prefixes.merge(schema_prefixes);
            let mut shape_prefixes = schema_prefixes.clone();
            shape_prefixes.merge(data_prefixes);
            let node_term = match parse_node_selector(node, &node_prefixes, base) {
                Ok(NodeSelector::Node(term)) => term,
                Ok(_) => return Err(ResolutionError::invalid_iri(node.as_str(), "expected a single node")),
                Err(error) => return Err(ResolutionError::invalid_iri(node.as_str(), error)),
            };
            let shape_label = parse_shape_label(shape, &shape_prefixes, base)
                .map_err(|error| ResolutionError::invalid_iri(shape.as_str(), error))?;
            Ok(ValidationTrigger::NodeShape {
                node: node_term,
                shape: shape_label,
            })
        }
    }
}
