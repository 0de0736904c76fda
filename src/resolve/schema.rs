//! Schema sources and their resolution into a parsed [`Schema`].

use super::{ResolvedGraph, Resolver};
use crate::error::ResolutionError;
use crate::format::{SchemaEngine, non_blank};
use crate::logging::resolution_span;
use crate::schema::Schema;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    Inline { text: String },
    Url { url: String },
    File { bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaSpec {
    /// `None` only when the shapes are embedded in the data.
    pub source: Option<SchemaSource>,
    pub format: Option<String>,
    pub engine: Option<String>,
    pub embedded_in_data: bool,
}

impl SchemaSpec {
    pub fn inline(text: impl Into<String>, format: Option<&str>, engine: Option<&str>) -> Self {
        Self {
            source: Some(SchemaSource::Inline { text: text.into() }),
            format: format.map(str::to_string),
            engine: engine.map(str::to_string),
            embedded_in_data: false,
        }
    }

    pub fn from_params(params: &SchemaParams) -> Result<Self, ResolutionError> {
        let text = non_blank(params.schema.as_deref());
        let url = non_blank(params.schema_url.as_deref());
        let file = params.schema_file.as_deref().filter(|file| !file.is_empty());
        let embedded = params.schema_embedded.unwrap_or(false);

        let source = match non_blank(params.active_schema_source.as_deref()) {
            Some(selector) => {
                let missing = |field: &str| ResolutionError::MissingSource(format!("schema {field}"));
                let normalized = selector.to_ascii_lowercase();
                match normalized.strip_prefix("by").unwrap_or(&normalized) {
                    "text" | "inline" | "schema" => Some(SchemaSource::Inline {
                        text: text.ok_or_else(|| missing("text"))?.to_string(),
                    }),
                    "url" | "uri" => Some(SchemaSource::Url {
                        url: url.ok_or_else(|| missing("URL"))?.to_string(),
                    }),
                    "file" => Some(SchemaSource::File {
                        bytes: file.ok_or_else(|| missing("file"))?.as_bytes().to_vec(),
                    }),
                    _ => {
                        return Err(ResolutionError::UnknownSelector {
                            kind: "schema",
                            name: selector.to_string(),
                        });
                    }
                }
            }
            None => url
                .map(|url| SchemaSource::Url { url: url.to_string() })
                .or_else(|| file.map(|file| SchemaSource::File { bytes: file.as_bytes().to_vec() }))
                .or_else(|| text.map(|text| SchemaSource::Inline { text: text.to_string() })),
        };

        Ok(Self {
            source: if embedded { None } else { source },
            format: non_blank(params.schema_format.as_deref()).map(str::to_string),
            engine: non_blank(params.schema_engine.as_deref()).map(str::to_string),
            embedded_in_data: embedded,
        })
    }
}

/// Schema fields of a request, as a client sends them.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaParams {
    /// Schema as text
    #[serde(default)]
    pub schema: Option<String>,
    /// URL to fetch the schema from
    #[serde(default)]
    pub schema_url: Option<String>,
    /// Contents of an uploaded schema file
    #[serde(default)]
    pub schema_file: Option<String>,
    /// Schema syntax (default ShExC for ShEx, Turtle for SHACL)
    #[serde(default)]
    pub schema_format: Option<String>,
    /// Schema engine: ShEx or SHACL (default ShEx)
    #[serde(default)]
    pub schema_engine: Option<String>,
    /// Which source to use: byText, byUrl or byFile
    #[serde(default)]
    pub active_schema_source: Option<String>,
    /// Read SHACL shapes from the data graph instead of a separate schema
    #[serde(default)]
    pub schema_embedded: Option<bool>,
}

/// Resolves `spec` into a parsed schema.
///
/// Engine and format are checked against the registry before any fetch.
/// Embedded shapes are read from `data`, which must already be resolved.
pub async fn resolve_schema(
    resolver: &Resolver,
    spec: &SchemaSpec,
    data: Option<&ResolvedGraph>,
    base: Option<&str>,
) -> Result<Schema, ResolutionError> {
    if spec.embedded_in_data {
        let engine = match non_blank(spec.engine.as_deref()) {
            None => SchemaEngine::Shacl,
            Some(name) => resolver.registry.schema_engine(Some(name))?,
        };
        if engine != SchemaEngine::Shacl {
            return Err(ResolutionError::UnsupportedFormat {
                format: "embedded shapes".to_string(),
                engine: engine.to_string(),
            });
        }
        let data = data.ok_or_else(|| ResolutionError::MissingSource("data for embedded shapes".to_string()))?;
        if data.is_live() {
            return Err(ResolutionError::UnsupportedFormat {
                format: "embedded shapes in a SPARQL endpoint".to_string(),
                engine: engine.to_string(),
            });
        }
        return Schema::from_graph(data.graph());
    }

    let engine = resolver.registry.schema_engine(spec.engine.as_deref())?;
    let format = resolver.registry.schema_format(engine, spec.format.as_deref())?;
    let source = spec
        .source
        .as_ref()
        .ok_or_else(|| ResolutionError::MissingSource("schema".to_string()))?;

    let text = match source {
        SchemaSource::Inline { text } => text.clone(),
        SchemaSource::File { bytes } => utf8(bytes.clone(), format.name())?,
        SchemaSource::Url { url } => {
            let bytes = resolver
                .fetcher
                .fetch(url)
                .instrument(resolution_span("schema", "url"))
                .await?;
            utf8(bytes, format.name())?
        }
    };
    let schema = Schema::parse(&text, &format, engine, base)?;
    tracing::debug!(engine = %engine, format = %format, shapes = schema.shapes().len(), "resolved schema");
    Ok(schema)
}

fn utf8(bytes: Vec<u8>, format: &str) -> Result<String, ResolutionError> {
    String::from_utf8(bytes).map_err(|error| ResolutionError::parse(format, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn url_wins_without_a_selector() {
        let params = SchemaParams {
            schema: Some("<S> {}".to_string()),
            schema_url: Some("http://example.org/schema.shex".to_string()),
            ..Default::default()
        };
        assert_matches!(
            SchemaSpec::from_params(&params).unwrap().source,
            Some(SchemaSource::Url { .. })
        );
    }

    #[test]
    fn selector_needs_its_field() {
        let params = SchemaParams {
            schema: Some("<S> {}".to_string()),
            active_schema_source: Some("byFile".to_string()),
            ..Default::default()
        };
        assert_matches!(
            SchemaSpec::from_params(&params),
            Err(ResolutionError::MissingSource(field)) if field == "schema file"
        );
    }

    #[test]
    fn embedded_schemas_have_no_source() {
        let params = SchemaParams {
            schema: Some("ignored".to_string()),
            schema_embedded: Some(true),
            ..Default::default()
        };
        let spec = SchemaSpec::from_params(&params).unwrap();
        assert!(spec.embedded_in_data);
        assert!(spec.source.is_none());
    }
}
