//! Schema conversion: reserialisation within one engine and the SHACL to
//! ShEx bridge.

use crate::error::{ConversionError, ResolutionError};
use crate::format::{SchemaEngine, SchemaFormat};
use crate::resolve::schema::resolve_schema;
use crate::resolve::{Resolver, SchemaSpec};
use crate::schema::shacl::{self, Constraint, NodeShape, Path, PropertyShape, ShaclSchema, Target};
use crate::schema::shex::{
    Cardinality, Facet, NodeConstraint, NodeKind, Shape, ShapeExpr, ShexSchema, TripleConstraint,
    TripleExpr, ValueSetValue,
};
use crate::schema::Schema;
use crate::shapemap::{NodeSelector, QueryShapeMap, ShapeLabel};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, Term};
use std::sync::Arc;

/// Translates a SHACL shapes graph into ShEx.
///
/// Besides the schema, a translator derives the shape map that reproduces
/// the SHACL targets, since ShEx schemas carry none.
pub trait SchemaTranslator: Send + Sync {
    fn shacl_to_shex(&self, schema: &ShaclSchema) -> Result<(ShexSchema, QueryShapeMap), ConversionError>;
}

/// Maps SHACL Core constraints one by one onto ShEx constructs.
///
/// | SHACL | ShEx |
/// |-------|------|
/// | property shape | triple constraint, `^` for inverse paths |
/// | `minCount`/`maxCount` | cardinality |
/// | `datatype`, `nodeKind`, `in`, facets | node constraint |
/// | `class` | `{ EXTRA rdf:type ; rdf:type [C] }` |
/// | `node` | shape reference |
/// | `hasValue` | an extra triple constraint with a one-value set |
/// | `closed`/`ignoredProperties` | `CLOSED` plus optional triple constraints |
///
/// `uniqueLang` has no ShEx counterpart and is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralTranslator;

impl SchemaTranslator for StructuralTranslator {
    fn shacl_to_shex(&self, schema: &ShaclSchema) -> Result<(ShexSchema, QueryShapeMap), ConversionError> {
        let mut shex = ShexSchema {
            prefixes: schema.prefix_map().clone(),
            ..Default::default()
        };
        let mut shape_map = QueryShapeMap {
            associations: Vec::new(),
            node_prefixes: schema.prefix_map().clone(),
            shape_prefixes: schema.prefix_map().clone(),
        };
        for shape in schema.shapes() {
            if shape.deactivated {
                tracing::debug!(shape = %shape.id, "skipping deactivated shape");
                continue;
            }
            let label = label_of(&shape.id)?;
            shex.shapes.insert(label.clone(), translate_node_shape(shape)?);
            for target in &shape.targets {
                shape_map.push(target_selector(target), label.clone());
            }
        }
        Ok((shex, shape_map))
    }
}

fn label_of(term: &Term) -> Result<ShapeLabel, ConversionError> {
    match term {
        Term::NamedNode(iri) => Ok(ShapeLabel::Iri(iri.clone())),
        Term::BlankNode(node) => Ok(ShapeLabel::BNode(node.clone())),
        other => Err(ConversionError::Translation(format!(
            "{other} cannot be a ShEx shape label"
        ))),
    }
}

fn target_selector(target: &Target) -> NodeSelector {
    match target {
        Target::Node(node) => NodeSelector::Node(node.clone()),
        Target::Class(class) => NodeSelector::SubjectsOf {
            predicate: rdf::TYPE.into_owned(),
            object: Some(Term::NamedNode(class.clone())),
        },
        Target::SubjectsOf(predicate) => NodeSelector::SubjectsOf {
            predicate: predicate.clone(),
            object: None,
        },
        Target::ObjectsOf(predicate) => NodeSelector::ObjectsOf {
            subject: None,
            predicate: predicate.clone(),
        },
    }
}

fn translate_node_shape(shape: &NodeShape) -> Result<ShapeExpr, ConversionError> {
    let mut expressions = Vec::new();
    for property in shape.properties.iter().filter(|property| !property.deactivated) {
        expressions.extend(translate_property(property)?);
    }
    if shape.closed {
        for ignored in &shape.ignored_properties {
            expressions.push(TripleExpr::Constraint(TripleConstraint::new(
                ignored.clone(),
                None,
                Cardinality::new(0, None),
            )));
        }
    }
    let body = ShapeExpr::shape(Shape {
        closed: shape.closed,
        extra: Vec::new(),
        expression: each_of(expressions),
        annotations: Vec::new(),
    });
    let mut parts = value_parts(&shape.constraints, &shape.id)?;
    if parts.is_empty() {
        return Ok(body);
    }
    parts.push(body);
    Ok(ShapeExpr::And(parts))
}

fn each_of(mut expressions: Vec<TripleExpr>) -> Option<TripleExpr> {
    match expressions.len() {
        0 => None,
        1 => expressions.pop(),
        _ => Some(TripleExpr::EachOf {
            expressions,
            cardinality: Cardinality::ONE,
        }),
    }
}

fn translate_property(property: &PropertyShape) -> Result<Vec<TripleExpr>, ConversionError> {
    let (predicate, inverse) = match &property.path {
        Path::Predicate(predicate) => (predicate.clone(), false),
        Path::Inverse(predicate) => (predicate.clone(), true),
    };
    let mut min = 0u32;
    let mut max = None;
    let mut fixed = Vec::new();
    for constraint in &property.constraints {
        match constraint {
            Constraint::MinCount(count) => min = saturate(*count),
            Constraint::MaxCount(count) => max = Some(saturate(*count)),
            Constraint::HasValue(value) => fixed.push(value.clone()),
            Constraint::UniqueLang => {
                tracing::debug!(property = %property.id, "sh:uniqueLang has no ShEx equivalent, dropped");
            }
            _ => {}
        }
    }

    let mut triples = Vec::new();
    for value in &fixed {
        let Some(set_value) = value_set_value(value) else {
            tracing::debug!(property = %property.id, value = %value, "blank node sh:hasValue dropped");
            continue;
        };
        let mut constraint = TripleConstraint::new(
            predicate.clone(),
            Some(ShapeExpr::NodeConstraint(NodeConstraint {
                values: Some(vec![set_value]),
                ..Default::default()
            })),
            Cardinality::ONE,
        );
        constraint.inverse = inverse;
        triples.push(TripleExpr::Constraint(constraint));
        min = min.saturating_sub(1);
        max = max.map(|max: u32| max.saturating_sub(1));
    }

    if max == Some(0) && !fixed.is_empty() {
        return Ok(triples);
    }
    let parts = value_parts(&property.constraints, &property.id)?;
    let value = match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(ShapeExpr::And(parts)),
    };
    let mut constraint = TripleConstraint::new(predicate, value, Cardinality::new(min, max));
    constraint.inverse = inverse;
    triples.insert(0, TripleExpr::Constraint(constraint));
    Ok(triples)
}

fn saturate(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// The value-level constraints of a shape as ShEx expressions: one node
/// constraint plus class shapes, node kind unions and references.
fn value_parts(constraints: &[Constraint], owner: &Term) -> Result<Vec<ShapeExpr>, ConversionError> {
    let mut node = NodeConstraint::default();
    let mut parts = Vec::new();
    for constraint in constraints {
        match constraint {
            Constraint::Datatype(datatype) => node.datatype = Some(datatype.clone()),
            Constraint::NodeKind(kind) => match kind {
                shacl::NodeKind::Iri => node.node_kind = Some(NodeKind::Iri),
                shacl::NodeKind::BlankNode => node.node_kind = Some(NodeKind::BNode),
                shacl::NodeKind::Literal => node.node_kind = Some(NodeKind::Literal),
                shacl::NodeKind::BlankNodeOrIri => node.node_kind = Some(NodeKind::NonLiteral),
                shacl::NodeKind::BlankNodeOrLiteral => {
                    parts.push(kind_union(NodeKind::BNode, NodeKind::Literal))
                }
                shacl::NodeKind::IriOrLiteral => parts.push(kind_union(NodeKind::Iri, NodeKind::Literal)),
            },
            Constraint::MinLength(length) => node.facets.push(Facet::MinLength(*length)),
            Constraint::MaxLength(length) => node.facets.push(Facet::MaxLength(*length)),
            Constraint::Pattern { pattern, flags } => node.facets.push(Facet::Pattern {
                pattern: pattern.clone(),
                flags: flags.clone(),
            }),
            Constraint::MinInclusive(bound) => node.facets.push(Facet::MinInclusive(bound.clone())),
            Constraint::MinExclusive(bound) => node.facets.push(Facet::MinExclusive(bound.clone())),
            Constraint::MaxInclusive(bound) => node.facets.push(Facet::MaxInclusive(bound.clone())),
            Constraint::MaxExclusive(bound) => node.facets.push(Facet::MaxExclusive(bound.clone())),
            Constraint::In(values) => {
                let values = values.iter().filter_map(value_set_value).collect::<Vec<_>>();
                node.values = Some(values);
            }
            Constraint::Class(class) => parts.push(class_shape(class)),
            Constraint::Node(reference) => parts.push(ShapeExpr::Ref(label_of(reference).map_err(
                |_| ConversionError::Translation(format!("{owner} refers to a literal shape {reference}")),
            )?)),
            Constraint::MinCount(_)
            | Constraint::MaxCount(_)
            | Constraint::HasValue(_)
            | Constraint::UniqueLang => {}
        }
    }
    if !node.is_empty() {
        parts.insert(0, ShapeExpr::NodeConstraint(node));
    }
    Ok(parts)
}

fn kind_union(first: NodeKind, second: NodeKind) -> ShapeExpr {
    let constraint = |kind| {
        ShapeExpr::NodeConstraint(NodeConstraint {
            node_kind: Some(kind),
            ..Default::default()
        })
    };
    ShapeExpr::Or(vec![constraint(first), constraint(second)])
}

fn class_shape(class: &NamedNode) -> ShapeExpr {
    let typed = TripleConstraint::new(
        rdf::TYPE.into_owned(),
        Some(ShapeExpr::NodeConstraint(NodeConstraint {
            values: Some(vec![ValueSetValue::Iri(class.clone())]),
            ..Default::default()
        })),
        Cardinality::ONE,
    );
    ShapeExpr::shape(Shape {
        closed: false,
        extra: vec![rdf::TYPE.into_owned()],
        expression: Some(TripleExpr::Constraint(typed)),
        annotations: Vec::new(),
    })
}

fn value_set_value(term: &Term) -> Option<ValueSetValue> {
    match term {
        Term::NamedNode(iri) => Some(ValueSetValue::Iri(iri.clone())),
        Term::Literal(literal) => Some(ValueSetValue::Literal(literal.clone())),
        _ => None,
    }
}

/// A converted schema.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub text: String,
    pub source_engine: SchemaEngine,
    pub target_engine: SchemaEngine,
    pub target_format: SchemaFormat,
    /// Shape map reproducing the source targets; empty for reserialisation.
    pub shape_map: QueryShapeMap,
}

#[derive(Clone)]
pub struct ConversionService {
    resolver: Resolver,
    translator: Arc<dyn SchemaTranslator>,
    default_base: Option<String>,
}

impl ConversionService {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            translator: Arc::new(StructuralTranslator),
            default_base: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn SchemaTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = Some(base.into());
        self
    }

    /// Converts `spec` into `target_format` of `target_engine`.
    ///
    /// A missing target engine keeps the source engine; a missing target
    /// format picks the default of the target engine.
    pub async fn convert_schema(
        &self,
        spec: &SchemaSpec,
        target_format: Option<&str>,
        target_engine: Option<&str>,
        base: Option<&str>,
    ) -> Result<ConversionOutput, ConversionError> {
        let registry = &self.resolver.registry;
        let base = base.or(self.default_base.as_deref());
        let source_engine = if spec.embedded_in_data {
            SchemaEngine::Shacl
        } else {
            registry.schema_engine(spec.engine.as_deref())?
        };
        let target_engine = match target_engine.map(str::trim).filter(|name| !name.is_empty()) {
            None => source_engine,
            Some(name) => registry.schema_engine(Some(name))?,
        };
        if source_engine != target_engine
            && !(source_engine == SchemaEngine::Shacl && target_engine == SchemaEngine::ShEx)
        {
            return Err(ConversionError::UnsupportedEnginePair {
                from: source_engine.to_string(),
                to: target_engine.to_string(),
            });
        }
        let format = registry.schema_format(target_engine, target_format)?;
        if spec.embedded_in_data {
            return Err(ResolutionError::MissingSource(
                "schema source (embedded shapes need data to convert)".to_string(),
            )
            .into());
        }

        let schema = resolve_schema(&self.resolver, spec, None, base).await?;
        let (converted, shape_map) = match &schema {
            same if same.engine() == target_engine => (None, QueryShapeMap::default()),
            Schema::Shacl(shacl) => {
                let (shex, shape_map) = self.translator.shacl_to_shex(shacl)?;
                (Some(Schema::ShEx(shex)), shape_map)
            }
            Schema::ShEx(_) => {
                return Err(ConversionError::UnsupportedEnginePair {
                    from: source_engine.to_string(),
                    to: target_engine.to_string(),
                });
            }
        };
        let text = converted.as_ref().unwrap_or(&schema).serialize(&format)?;
        tracing::info!(
            from = %source_engine,
            to = %target_engine,
            format = %format,
            targets = shape_map.len(),
            "converted schema"
        );
        Ok(ConversionOutput {
            text,
            source_engine,
            target_engine,
            target_format: format,
            shape_map,
        })
    }
}
