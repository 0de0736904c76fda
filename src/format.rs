//! Registry of the data formats, schema engines, schema formats, shape map
//! formats, trigger modes and entailment regimes the service understands.
//!
//! The registry is built once at startup and shared read-only; every lookup
//! is case-insensitive and falls back to the documented default when the
//! requested name is absent or blank.

use crate::error::{InferenceEngineError, ResolutionError};
use crate::rdf::extract::HTML_JSONLD;
use crate::rdf::inference::InferenceEngine;
use oxigraph::io::RdfFormat;
use schemars::JsonSchema;
use serde::Serialize;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const DEFAULT_DATA_FORMAT: &str = "Turtle";
pub const DEFAULT_SCHEMA_ENGINE: SchemaEngine = SchemaEngine::ShEx;
pub const DEFAULT_SHEX_FORMAT: &str = "ShExC";
pub const DEFAULT_SHACL_FORMAT: &str = "Turtle";
pub const DEFAULT_SHAPE_MAP_FORMAT: ShapeMapFormat = ShapeMapFormat::Compact;
pub const DEFAULT_TRIGGER_MODE: TriggerMode = TriggerMode::ShapeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Rdf(RdfFormat),
    Extractor,
}

/// A named syntax for RDF data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFormat {
    pub name: &'static str,
    pub media_type: &'static str,
    pub extension: &'static str,
    #[serde(skip)]
    pub syntax: Syntax,
}

impl DataFormat {
    pub fn rdf_format(&self) -> Option<RdfFormat> {
        match self.syntax {
            Syntax::Rdf(format) => Some(format),
            Syntax::Extractor => None,
        }
    }

    pub fn is_extractor(&self) -> bool {
        self.syntax == Syntax::Extractor
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, JsonSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum SchemaEngine {
    #[strum(to_string = "ShEx")]
    #[serde(rename = "ShEx")]
    ShEx,
    #[strum(to_string = "SHACL", serialize = "SHACLex", serialize = "JenaSHACL")]
    #[serde(rename = "SHACL")]
    Shacl,
}

impl SchemaEngine {
    pub fn default_format(&self) -> &'static str {
        match self {
            SchemaEngine::ShEx => DEFAULT_SHEX_FORMAT,
            SchemaEngine::Shacl => DEFAULT_SHACL_FORMAT,
        }
    }
}

/// The serialisation of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaFormat {
    ShExC,
    ShExJ,
    Rdf(DataFormat),
}

impl SchemaFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaFormat::ShExC => "ShExC",
            SchemaFormat::ShExJ => "ShExJ",
            SchemaFormat::Rdf(format) => format.name,
        }
    }
}

impl std::fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, JsonSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum ShapeMapFormat {
    #[strum(to_string = "Compact", serialize = "ShapeMap")]
    Compact,
    #[strum(to_string = "JSON", serialize = "ShapeMapJson")]
    #[serde(rename = "JSON")]
    Json,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, JsonSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum TriggerMode {
    ShapeMap,
    TargetDecls,
    NodeShape,
}

/// Serialisable description of everything the registry supports.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatCatalog {
    pub data_formats: Vec<String>,
    pub extractor_formats: Vec<String>,
    pub schema_engines: Vec<SchemaEngineFormats>,
    pub shape_map_formats: Vec<String>,
    pub trigger_modes: Vec<String>,
    pub inference_engines: Vec<String>,
    pub defaults: CatalogDefaults,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEngineFormats {
    pub engine: String,
    pub formats: Vec<String>,
    pub default_format: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDefaults {
    pub data_format: String,
    pub schema_engine: String,
    pub shape_map_format: String,
    pub trigger_mode: String,
    pub inference_engine: String,
}

/// Immutable lookup table of supported formats.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    data_formats: Vec<DataFormat>,
}

const CANDIDATE_FORMATS: &[(&str, &str, &str)] = &[
    ("Turtle", "text/turtle", "ttl"),
    ("N-Triples", "application/n-triples", "nt"),
    ("N-Quads", "application/n-quads", "nq"),
    ("TriG", "application/trig", "trig"),
    ("RDF/XML", "application/rdf+xml", "rdf"),
    ("N3", "text/n3", "n3"),
    ("JSON-LD", "application/ld+json", "jsonld"),
];

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '/' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FormatRegistry {
    /// Every RDF syntax the linked parser supports, plus the extractor formats.
    pub fn standard() -> Self {
        let mut data_formats = CANDIDATE_FORMATS
            .iter()
            .filter_map(|&(name, media_type, extension)| {
                RdfFormat::from_media_type(media_type).map(|format| DataFormat {
                    name,
                    media_type,
                    extension,
                    syntax: Syntax::Rdf(format),
                })
            })
            .collect::<Vec<_>>();
        data_formats.push(DataFormat {
            name: HTML_JSONLD,
            media_type: "text/html",
            extension: "html",
            syntax: Syntax::Extractor,
        });
        Self { data_formats }
    }

    pub fn data_formats(&self) -> &[DataFormat] {
        &self.data_formats
    }

    fn find_data_format(&self, name: &str) -> Option<&DataFormat> {
        let wanted = normalize(name);
        self.data_formats.iter().find(|format| {
            normalize(format.name) == wanted
                || format.extension == wanted
                || format.media_type.eq_ignore_ascii_case(name.trim())
        })
    }

    /// Any data format, extractor formats included.
    pub fn data_format(&self, name: Option<&str>) -> Result<&DataFormat, ResolutionError> {
        let name = non_blank(name).unwrap_or(DEFAULT_DATA_FORMAT);
        self.find_data_format(name)
            .ok_or_else(|| ResolutionError::UnknownFormat {
                kind: "data",
                name: name.to_string(),
            })
    }

    /// A data format that can also be serialised.
    pub fn rdf_format(&self, name: Option<&str>) -> Result<(&DataFormat, RdfFormat), ResolutionError> {
        let format = self.data_format(name)?;
        format
            .rdf_format()
            .map(|rdf| (format, rdf))
            .ok_or_else(|| ResolutionError::UnknownFormat {
                kind: "RDF",
                name: format.name.to_string(),
            })
    }

    pub fn schema_engine(&self, name: Option<&str>) -> Result<SchemaEngine, ResolutionError> {
        match non_blank(name) {
            None => Ok(DEFAULT_SCHEMA_ENGINE),
            Some(name) => SchemaEngine::from_str(name)
                .map_err(|_| ResolutionError::UnknownEngine(name.to_string())),
        }
    }

    /// Validates `name` as a serialisation of `engine`.
    pub fn schema_format(
        &self,
        engine: SchemaEngine,
        name: Option<&str>,
    ) -> Result<SchemaFormat, ResolutionError> {
        let name = non_blank(name).unwrap_or(engine.default_format());
        let unsupported = || ResolutionError::UnsupportedFormat {
            format: name.to_string(),
            engine: engine.to_string(),
        };
        match (engine, normalize(name).as_str()) {
            (SchemaEngine::ShEx, "shexc" | "shex") => Ok(SchemaFormat::ShExC),
            (SchemaEngine::ShEx, "shexj" | "json") => Ok(SchemaFormat::ShExJ),
            (SchemaEngine::ShEx, _) => {
                if self.find_data_format(name).is_some() {
                    Err(unsupported())
                } else {
                    Err(ResolutionError::UnknownFormat {
                        kind: "schema",
                        name: name.to_string(),
                    })
                }
            }
            (SchemaEngine::Shacl, _) => match self.find_data_format(name) {
                Some(format) if !format.is_extractor() => Ok(SchemaFormat::Rdf(format.clone())),
                Some(_) => Err(unsupported()),
                None => Err(ResolutionError::UnknownFormat {
                    kind: "schema",
                    name: name.to_string(),
                }),
            },
        }
    }

    pub fn schema_formats(&self, engine: SchemaEngine) -> Vec<String> {
        match engine {
            SchemaEngine::ShEx => vec!["ShExC".to_string(), "ShExJ".to_string()],
            SchemaEngine::Shacl => self
                .data_formats
                .iter()
                .filter(|format| !format.is_extractor())
                .map(|format| format.name.to_string())
                .collect(),
        }
    }

    pub fn shape_map_format(&self, name: Option<&str>) -> Result<ShapeMapFormat, ResolutionError> {
        match non_blank(name) {
            None => Ok(DEFAULT_SHAPE_MAP_FORMAT),
            Some(name) => ShapeMapFormat::from_str(name).map_err(|_| ResolutionError::UnknownFormat {
                kind: "shape map",
                name: name.to_string(),
            }),
        }
    }

    /// `None` when no mode was named.
    pub fn trigger_mode(&self, name: Option<&str>) -> Result<Option<TriggerMode>, ResolutionError> {
        non_blank(name)
            .map(|name| {
                TriggerMode::from_str(name)
                    .map_err(|_| ResolutionError::UnknownTriggerMode(name.to_string()))
            })
            .transpose()
    }

    pub fn inference_engine(&self, name: Option<&str>) -> Result<InferenceEngine, InferenceEngineError> {
        InferenceEngine::parse(name)
    }

    pub fn catalog(&self) -> FormatCatalog {
        FormatCatalog {
            data_formats: self
                .data_formats
                .iter()
                .filter(|format| !format.is_extractor())
                .map(|format| format.name.to_string())
                .collect(),
            extractor_formats: self
                .data_formats
                .iter()
                .filter(|format| format.is_extractor())
                .map(|format| format.name.to_string())
                .collect(),
            schema_engines: SchemaEngine::iter()
                .map(|engine| SchemaEngineFormats {
                    engine: engine.to_string(),
                    formats: self.schema_formats(engine),
                    default_format: engine.default_format().to_string(),
                })
                .collect(),
            shape_map_formats: ShapeMapFormat::iter().map(|f| f.to_string()).collect(),
            trigger_modes: TriggerMode::iter().map(|m| m.to_string()).collect(),
            inference_engines: InferenceEngine::iter().map(|e| e.to_string()).collect(),
            defaults: CatalogDefaults {
                data_format: DEFAULT_DATA_FORMAT.to_string(),
                schema_engine: DEFAULT_SCHEMA_ENGINE.to_string(),
                shape_map_format: DEFAULT_SHAPE_MAP_FORMAT.to_string(),
                trigger_mode: DEFAULT_TRIGGER_MODE.to_string(),
                inference_engine: InferenceEngine::None.to_string(),
            },
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn data_format_lookup_accepts_aliases() {
        let registry = FormatRegistry::standard();
        assert_eq!(registry.data_format(Some("turtle")).unwrap().name, "Turtle");
        assert_eq!(registry.data_format(Some("ttl")).unwrap().name, "Turtle");
        assert_eq!(registry.data_format(Some("ntriples")).unwrap().name, "N-Triples");
        assert_eq!(registry.data_format(Some("rdfxml")).unwrap().name, "RDF/XML");
        assert_eq!(registry.data_format(None).unwrap().name, "Turtle");
        assert!(registry.data_format(Some("html-jsonld")).unwrap().is_extractor());
    }

    #[test]
    fn unknown_names_are_resolution_errors() {
        let registry = FormatRegistry::standard();
        assert_matches!(
            registry.data_format(Some("yaml")),
            Err(ResolutionError::UnknownFormat { kind: "data", .. })
        );
        assert_matches!(
            registry.schema_engine(Some("ShExZ")),
            Err(ResolutionError::UnknownEngine(_))
        );
        assert_matches!(
            registry.trigger_mode(Some("everything")),
            Err(ResolutionError::UnknownTriggerMode(_))
        );
    }

    #[test]
    fn schema_formats_are_checked_against_the_engine() {
        let registry = FormatRegistry::standard();
        assert_eq!(
            registry.schema_format(SchemaEngine::ShEx, None).unwrap(),
            SchemaFormat::ShExC
        );
        assert_eq!(
            registry.schema_format(SchemaEngine::ShEx, Some("shexj")).unwrap(),
            SchemaFormat::ShExJ
        );
        assert_matches!(
            registry.schema_format(SchemaEngine::ShEx, Some("Turtle")),
            Err(ResolutionError::UnsupportedFormat { .. })
        );
        assert_matches!(
            registry.schema_format(SchemaEngine::Shacl, Some("ShExC")),
            Err(ResolutionError::UnknownFormat { .. })
        );
        assert_matches!(
            registry.schema_format(SchemaEngine::Shacl, None),
            Ok(SchemaFormat::Rdf(format)) if format.name == "Turtle"
        );
    }

    #[test]
    fn engines_are_case_insensitive_with_aliases() {
        let registry = FormatRegistry::standard();
        assert_eq!(registry.schema_engine(Some("shex")).unwrap(), SchemaEngine::ShEx);
        assert_eq!(registry.schema_engine(Some("shaclex")).unwrap(), SchemaEngine::Shacl);
        assert_eq!(registry.schema_engine(Some("")).unwrap(), SchemaEngine::ShEx);
    }

    #[test]
    fn catalog_lists_defaults() {
        let catalog = FormatRegistry::standard().catalog();
        assert!(catalog.data_formats.contains(&"Turtle".to_string()));
        assert_eq!(catalog.extractor_formats, vec![HTML_JSONLD.to_string()]);
        assert_eq!(catalog.defaults.schema_engine, "ShEx");
        assert_eq!(catalog.inference_engines, vec!["None", "RDFS", "OWL"]);
    }
}
