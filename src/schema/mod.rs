//! Parsed schemas of either engine behind one interface.

pub mod result;
pub mod shacl;
pub mod shex;

pub use result::ValidationResult;
pub use shacl::ShaclSchema;
pub use shex::ShexSchema;

use crate::error::{EngineFailure, ResolutionError, SerializationError};
use crate::format::{SchemaEngine, SchemaFormat};
use crate::rdf::graph::RdfGraph;
use crate::rdf::prefix::PrefixMap;
use crate::resolve::trigger::ValidationTrigger;
use crate::shapemap::{ResultShapeMap, ShapeLabel};
use oxigraph::model::Term;

#[derive(Debug, Clone)]
pub enum Schema {
    ShEx(ShexSchema),
    Shacl(ShaclSchema),
}

impl Schema {
    /// Parses `text` as `format`, which the registry has already checked
    /// against `engine`.
    pub fn parse(
        text: &str,
        format: &SchemaFormat,
        engine: SchemaEngine,
        base: Option<&str>,
    ) -> Result<Self, ResolutionError> {
        match (engine, format) {
            (SchemaEngine::ShEx, SchemaFormat::ShExC) => shex::parse_shexc(text, base)
                .map(Schema::ShEx)
                .map_err(|error| ResolutionError::parse("ShExC", error)),
            (SchemaEngine::ShEx, SchemaFormat::ShExJ) => shex::from_shexj(text)
                .map(Schema::ShEx)
                .map_err(|error| ResolutionError::parse("ShExJ", error)),
            (SchemaEngine::Shacl, SchemaFormat::Rdf(data_format)) => {
                let rdf = data_format.rdf_format().ok_or_else(|| {
                    ResolutionError::UnsupportedFormat {
                        format: data_format.name.to_string(),
                        engine: engine.to_string(),
                    }
                })?;
                ShaclSchema::parse(text, rdf, base).map(Schema::Shacl)
            }
            (engine, format) => Err(ResolutionError::UnsupportedFormat {
                format: format.name().to_string(),
                engine: engine.to_string(),
            }),
        }
    }

    /// SHACL shapes embedded in a data graph.
    pub fn from_graph(graph: &RdfGraph) -> Result<Self, ResolutionError> {
        ShaclSchema::from_graph(graph.clone()).map(Schema::Shacl)
    }

    pub fn engine(&self) -> SchemaEngine {
        match self {
            Schema::ShEx(_) => SchemaEngine::ShEx,
            Schema::Shacl(_) => SchemaEngine::Shacl,
        }
    }

    pub fn name(&self) -> String {
        self.engine().to_string()
    }

    /// Shape identifiers in declaration order: absolute IRIs or `_:label`.
    pub fn shapes(&self) -> Vec<String> {
        match self {
            Schema::ShEx(schema) => schema
                .labels()
                .iter()
                .map(|label| match label {
                    ShapeLabel::Iri(iri) => iri.as_str().to_string(),
                    other => other.to_string(),
                })
                .collect(),
            Schema::Shacl(schema) => schema
                .shapes()
                .iter()
                .map(|shape| match &shape.id {
                    Term::NamedNode(iri) => iri.as_str().to_string(),
                    other => other.to_string(),
                })
                .collect(),
        }
    }

    pub fn prefix_map(&self) -> &PrefixMap {
        match self {
            Schema::ShEx(schema) => &schema.prefixes,
            Schema::Shacl(schema) => schema.prefix_map(),
        }
    }

    pub fn serialize(&self, format: &SchemaFormat) -> Result<String, SerializationError> {
        match (self, format) {
            (Schema::ShEx(schema), SchemaFormat::ShExC) => Ok(shex::to_shexc(schema)),
            (Schema::ShEx(schema), SchemaFormat::ShExJ) => {
                serde_json::to_string_pretty(&shex::to_shexj(schema))
                    .map_err(|error| SerializationError::new("ShExJ", error))
            }
            (Schema::Shacl(schema), SchemaFormat::Rdf(data_format)) => {
                let rdf = data_format.rdf_format().ok_or_else(|| {
                    SerializationError::new(data_format.name, "not an RDF syntax")
                })?;
                schema.serialize(rdf)
            }
            (schema, format) => Err(SerializationError::new(
                format.name(),
                format!("{} schemas cannot be written in this format", schema.name()),
            )),
        }
    }

    /// Runs the engine. Non-conformance is reported in the result; `Err` means
    /// the trigger could not be applied to this schema at all.
    pub fn validate(
        &self,
        graph: &RdfGraph,
        trigger: &ValidationTrigger,
    ) -> Result<ValidationResult, EngineFailure> {
        match self {
            Schema::ShEx(schema) => {
                let pairs = match trigger {
                    ValidationTrigger::ShapeMap(query) => query.fix(graph),
                    ValidationTrigger::NodeShape { node, shape } => {
                        vec![(node.clone(), shape.clone())]
                    }
                    ValidationTrigger::TargetDecls => {
                        let labels = if schema.start.is_some() {
                            vec![ShapeLabel::Start]
                        } else {
                            schema.labels()
                        };
                        if labels.is_empty() {
                            return Err(EngineFailure::new(
                                "the ShEx schema declares no shapes to validate",
                            ));
                        }
                        let subjects = graph.subjects();
                        labels
                            .iter()
                            .flat_map(|label| {
                                subjects.iter().map(move |subject| (subject.clone(), label.clone()))
                            })
                            .collect()
                    }
                };
                let mut shape_map = match trigger {
                    ValidationTrigger::ShapeMap(query) => ResultShapeMap::from(query),
                    _ => ResultShapeMap::new(graph.prefix_map().clone(), schema.prefixes.clone()),
                };
                shex::ShexValidator::new(schema, graph).validate(&pairs, &mut shape_map);
                Ok(ValidationResult::new(SchemaEngine::ShEx, shape_map, Vec::new()))
            }
            Schema::Shacl(schema) => {
                let validator = shacl::ShaclValidator::new(schema, graph);
                let (report, shape_map) = match trigger {
                    ValidationTrigger::TargetDecls => validator.validate_targets(),
                    ValidationTrigger::ShapeMap(query) => validator.validate_pairs(&query.fix(graph)),
                    ValidationTrigger::NodeShape { node, shape } => {
                        validator.validate_pairs(&[(node.clone(), shape.clone())])
                    }
                };
                Ok(ValidationResult::new(
                    SchemaEngine::Shacl,
                    shape_map,
                    report.into_results(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatRegistry;
    use assert_matches::assert_matches;
    use oxigraph::io::RdfFormat;
    use oxigraph::model::NamedNode;

    const SHEX: &str = "PREFIX ex: <http://example.org/>\nex:S { ex:p . }\n_:T { }";

    fn shex() -> Schema {
        Schema::parse(SHEX, &SchemaFormat::ShExC, SchemaEngine::ShEx, None).unwrap()
    }

    #[test]
    fn shapes_are_absolute_identifiers_in_order() {
        assert_eq!(shex().shapes(), vec!["http://example.org/S", "_:T"]);
        assert_eq!(shex().prefix_map().get("ex"), Some("http://example.org/"));
        assert_eq!(shex().name(), "ShEx");
    }

    #[test]
    fn format_and_engine_mismatches_are_rejected() {
        let turtle = FormatRegistry::standard()
            .schema_format(SchemaEngine::Shacl, Some("Turtle"))
            .unwrap();
        assert_matches!(
            Schema::parse(SHEX, &turtle, SchemaEngine::ShEx, None),
            Err(ResolutionError::UnsupportedFormat { .. })
        );
        assert_matches!(
            shex().serialize(&turtle),
            Err(SerializationError { format, .. }) if format == "Turtle"
        );
        assert_matches!(
            Schema::parse("{", &SchemaFormat::ShExJ, SchemaEngine::ShEx, None),
            Err(ResolutionError::Parse { format, .. }) if format == "ShExJ"
        );
    }

    #[test]
    fn shexj_reserialization_keeps_the_shapes() {
        let json = shex().serialize(&SchemaFormat::ShExJ).unwrap();
        let reparsed = Schema::parse(&json, &SchemaFormat::ShExJ, SchemaEngine::ShEx, None).unwrap();
        assert_eq!(reparsed.shapes(), shex().shapes());
    }

    #[test]
    fn node_shape_trigger_validates_one_pair() {
        let graph = RdfGraph::parse(
            b"<http://example.org/x> <http://example.org/p> 1 .",
            RdfFormat::NTriples,
            None,
        )
        .unwrap();
        let trigger = ValidationTrigger::NodeShape {
            node: Term::NamedNode(NamedNode::new("http://example.org/x").unwrap()),
            shape: ShapeLabel::Iri(NamedNode::new("http://example.org/S").unwrap()),
        };
        let result = shex().validate(&graph, &trigger).unwrap();
        assert!(result.valid);
        assert_eq!(result.shape_map.len(), 1);
    }

    #[test]
    fn target_declarations_without_start_check_every_shape() {
        let graph = RdfGraph::parse(
            b"<http://example.org/x> <http://example.org/p> 1 .",
            RdfFormat::NTriples,
            None,
        )
        .unwrap();
        let result = shex().validate(&graph, &ValidationTrigger::TargetDecls).unwrap();
        assert_eq!(result.shape_map.len(), 2);
        assert!(result.valid, "{result:?}");
    }

    #[test]
    fn target_declarations_need_some_shape_in_shex() {
        let empty = Schema::parse(
            "PREFIX ex: <http://example.org/>",
            &SchemaFormat::ShExC,
            SchemaEngine::ShEx,
            None,
        )
        .unwrap();
        let graph = RdfGraph::new();
        assert!(empty.validate(&graph, &ValidationTrigger::TargetDecls).is_err());
    }

    #[test]
    fn embedded_shapes_are_read_as_shacl() {
        let graph = RdfGraph::parse(
            b"@prefix sh: <http://www.w3.org/ns/shacl#> .\n@prefix ex: <http://example.org/> .\nex:S a sh:NodeShape ; sh:targetNode ex:x ; sh:property [ sh:path ex:p ; sh:minCount 1 ] .\nex:x ex:p 1 .",
            RdfFormat::Turtle,
            None,
        )
        .unwrap();
        let schema = Schema::from_graph(&graph).unwrap();
        assert_eq!(schema.engine(), SchemaEngine::Shacl);
        let result = schema.validate(&graph, &ValidationTrigger::TargetDecls).unwrap();
        assert!(result.valid, "{result:?}");
        assert_eq!(result.shape_map.len(), 1);
    }
}
