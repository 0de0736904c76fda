//! Schema inference: derive a ShEx or SHACL shape from the neighbourhood of
//! selected nodes.
//!
//! For every predicate used by the selected nodes the inferred shape records
//! how often it occurs (cardinality) and what its values look like
//! (datatype, node kind, a class set for `rdf:type`, or a nested shape).

use crate::error::{InferenceError, ResolutionError};
use crate::format::{SchemaEngine, SchemaFormat, non_blank};
use crate::logging::inference_span;
use crate::rdf::graph::RdfGraph;
use crate::rdf::prefix::{PrefixMap, resolve_iri};
use crate::rdf::vocab::sh;
use crate::resolve::data::{construct_into, materialize, resolve_data, selector_query};
use crate::resolve::{DataSpec, Resolver};
use crate::schema::shacl::ShaclSchema;
use crate::schema::shex::{
    Annotation, Cardinality, NodeConstraint, NodeKind, Shape, ShapeExpr, ShexSchema,
    TripleConstraint, TripleExpr, ValueSetValue,
};
use crate::schema::Schema;
use crate::shapemap::{ResultShapeMap, ShapeLabel, parse_node_selector, parse_shape_label};
use crate::uml::{PlantUmlRenderer, SchemaRenderer};
use indexmap::{IndexMap, IndexSet};
use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{BlankNode, Literal, NamedNode, Term, Triple};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{Instrument, Span};

pub const DEFAULT_LABEL: &str = "Shape";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, JsonSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum SortBy {
    /// Predicates in lexical IRI order
    #[default]
    IriLexical,
    /// Most used predicates first
    Frequency,
}

/// Knobs of the inference algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceOptions {
    /// Infer IRI/BNODE node kinds for non-literal values instead of `.`
    pub infer_type_plain_node: bool,
    /// Language of the `rdfs:label` annotations copied onto constraints
    pub label_lang: Option<String>,
    /// Extra prefixes for the generated schema
    pub possible_prefixes: BTreeMap<String, String>,
    /// Shape levels to infer; values of level `max_follow_on` are not followed
    pub max_follow_on: usize,
    /// Minimum occurrences of a predicate before its values get a nested shape
    pub follow_on_threshold: Option<usize>,
    pub sort_by: SortBy,
    /// Minimum fraction of selected nodes that must use a predicate
    pub acceptance_threshold: f64,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            infer_type_plain_node: true,
            label_lang: None,
            possible_prefixes: BTreeMap::new(),
            max_follow_on: 1,
            follow_on_threshold: None,
            sort_by: SortBy::IriLexical,
            acceptance_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum InferredValue {
    Any,
    Datatype(NamedNode),
    Kind(NodeKind),
    Classes(Vec<NamedNode>),
    Ref(ShapeLabel),
}

#[derive(Debug, Clone)]
struct InferredProperty {
    predicate: NamedNode,
    min: u32,
    max: Option<u32>,
    value: InferredValue,
    label: Option<Literal>,
}

/// An inferred schema and the selected nodes it was inferred from.
#[derive(Debug, Clone)]
pub struct InferredSchema {
    pub schema: Schema,
    pub shape_map: ResultShapeMap,
    pub label: ShapeLabel,
}

#[derive(Debug, Clone)]
pub struct Visualized {
    pub inferred: InferredSchema,
    pub uml: String,
    pub svg: String,
}

/// Infers one shape for the nodes `selector` picks out of `graph`.
///
/// The selector uses shape map syntax (`ex:alice`, `{FOCUS a ex:Person}`)
/// with the graph prefixes and `base`.
pub fn infer(
    graph: &RdfGraph,
    selector: &str,
    engine: SchemaEngine,
    label: Option<&str>,
    options: &InferenceOptions,
    base: Option<&str>,
) -> Result<InferredSchema, InferenceError> {
    let nodes = select_nodes(graph, selector, base)?;
    let mut prefixes = graph.prefix_map().clone();
    for (prefix, namespace) in &options.possible_prefixes {
        if prefixes.get(prefix).is_none() {
            prefixes.insert(prefix.clone(), namespace.clone());
        }
    }
    let root = shape_label(label, &prefixes, base)?;
    let shapes = Inferrer { graph, options }.run(&root, &nodes)?;

    let schema = match engine {
        SchemaEngine::ShEx => Schema::ShEx(to_shex(&shapes, prefixes.clone())),
        SchemaEngine::Shacl => Schema::Shacl(to_shacl(&shapes, prefixes.clone())?),
    };
    let mut shape_map = ResultShapeMap::new(graph.prefix_map().clone(), prefixes);
    for node in nodes {
        shape_map.conformant(node, root.clone());
    }
    tracing::debug!(
        shapes = shapes.len(),
        nodes = shape_map.len(),
        engine = %engine,
        "inferred schema"
    );
    Ok(InferredSchema {
        schema,
        shape_map,
        label: root,
    })
}

/// [`infer`] plus a diagram. A diagram that cannot be drawn leaves the
/// inferred schema intact and carries the error text instead.
pub fn infer_with_visualization(
    graph: &RdfGraph,
    selector: &str,
    engine: SchemaEngine,
    label: Option<&str>,
    options: &InferenceOptions,
    base: Option<&str>,
    renderer: &dyn SchemaRenderer,
) -> Result<Visualized, InferenceError> {
    let inferred = infer(graph, selector, engine, label, options, base)?;
    let (uml, svg) = match renderer.render(&inferred.schema) {
        Ok(rendered) => (rendered.uml, rendered.svg),
        Err(error) => {
            tracing::warn!(%error, "could not render the inferred schema");
            let message = format!("error: {error}");
            (message.clone(), message)
        }
    };
    Ok(Visualized { inferred, uml, svg })
}

fn select_nodes(graph: &RdfGraph, selector: &str, base: Option<&str>) -> Result<Vec<Term>, InferenceError> {
    let parsed = parse_node_selector(selector, graph.prefix_map(), base).map_err(|error| {
        InferenceError::InvalidSelector {
            selector: selector.to_string(),
            message: error.to_string(),
        }
    })?;
    let nodes = parsed
        .select(graph)
        .into_iter()
        .filter(|node| graph.contains_node(node))
        .collect::<Vec<_>>();
    if nodes.is_empty() {
        return Err(InferenceError::NoMatchingNodes(selector.to_string()));
    }
    Ok(nodes)
}

fn shape_label(label: Option<&str>, prefixes: &PrefixMap, base: Option<&str>) -> Result<ShapeLabel, InferenceError> {
    let text = non_blank(label).unwrap_or(DEFAULT_LABEL);
    match parse_shape_label(text, prefixes, base) {
        Ok(ShapeLabel::Start) | Err(_) => {
            let iri = resolve_iri(base, text).map_err(|message| ResolutionError::invalid_iri(text, message))?;
            NamedNode::new(iri.as_str())
                .map(ShapeLabel::Iri)
                .map_err(|error| ResolutionError::invalid_iri(iri, error).into())
        }
        Ok(parsed) => Ok(parsed),
    }
}

struct Inferrer<'a> {
    graph: &'a RdfGraph,
    options: &'a InferenceOptions,
}

impl Inferrer<'_> {
    fn run(
        &self,
        root: &ShapeLabel,
        nodes: &[Term],
    ) -> Result<IndexMap<ShapeLabel, Vec<InferredProperty>>, InferenceError> {
        let mut shapes = IndexMap::new();
        let mut used = IndexSet::from([root.clone()]);
        let mut queue = VecDeque::from([(root.clone(), nodes.to_vec(), 1usize)]);
        while let Some((label, nodes, level)) = queue.pop_front() {
            let mut properties = Vec::new();
            for (predicate, counts, values) in self.summarize(&nodes) {
                let occurrences = counts.iter().sum::<usize>();
                let min = counts.iter().copied().min().unwrap_or(0);
                let max = counts.iter().copied().max().unwrap_or(0);
                let mut value = self.value_of(&predicate, &values);
                let follow = level < self.options.max_follow_on
                    && predicate.as_ref() != rdf::TYPE
                    && matches!(value, InferredValue::Kind(NodeKind::Iri | NodeKind::BNode | NodeKind::NonLiteral))
                    && self.options.follow_on_threshold.is_none_or(|threshold| occurrences >= threshold);
                if follow {
                    let nested = nested_label(&label, &predicate, &used)?;
                    used.insert(nested.clone());
                    queue.push_back((nested.clone(), values.into_iter().collect(), level + 1));
                    value = InferredValue::Ref(nested);
                }
                properties.push(InferredProperty {
                    label: self.annotation(&predicate),
                    predicate,
                    min: u32::try_from(min).unwrap_or(u32::MAX),
                    max: match max {
                        0 | 1 => Some(1),
                        _ => None,
                    },
                    value,
                });
            }
            shapes.insert(label, properties);
        }
        Ok(shapes)
    }

    /// Per predicate: occurrences per node and the distinct values, filtered
    /// by the acceptance threshold and sorted as requested.
    fn summarize(&self, nodes: &[Term]) -> Vec<(NamedNode, Vec<usize>, IndexSet<Term>)> {
        let mut table: IndexMap<NamedNode, (Vec<usize>, IndexSet<Term>)> = IndexMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for (predicate, object) in self.graph.outgoing(node) {
                let (counts, values) = table
                    .entry(predicate)
                    .or_insert_with(|| (vec![0; nodes.len()], IndexSet::new()));
                counts[index] += 1;
                values.insert(object);
            }
        }
        let total = nodes.len().max(1) as f64;
        let mut rows = table
            .into_iter()
            .filter(|(_, (counts, _))| {
                let used_by = counts.iter().filter(|count| **count > 0).count() as f64;
                used_by / total >= self.options.acceptance_threshold
            })
            .map(|(predicate, (counts, values))| (predicate, counts, values))
            .collect::<Vec<_>>();
        match self.options.sort_by {
            SortBy::IriLexical => rows.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str())),
            SortBy::Frequency => rows.sort_by(|a, b| {
                let total = |row: &(NamedNode, Vec<usize>, IndexSet<Term>)| row.1.iter().sum::<usize>();
                total(b).cmp(&total(a)).then_with(|| a.0.as_str().cmp(b.0.as_str()))
            }),
        }
        rows
    }

    fn value_of(&self, predicate: &NamedNode, values: &IndexSet<Term>) -> InferredValue {
        let all = |test: fn(&Term) -> bool| values.iter().all(test);
        if predicate.as_ref() == rdf::TYPE && all(|term| matches!(term, Term::NamedNode(_))) {
            let mut classes = values
                .iter()
                .filter_map(|term| match term {
                    Term::NamedNode(class) => Some(class.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>();
            classes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            return InferredValue::Classes(classes);
        }
        if all(|term| matches!(term, Term::Literal(_))) {
            let datatypes = values
                .iter()
                .filter_map(|term| match term {
                    Term::Literal(literal) => Some(literal.datatype().into_owned()),
                    _ => None,
                })
                .collect::<IndexSet<_>>();
            return match datatypes.len() {
                1 => datatypes
                    .into_iter()
                    .next()
                    .map_or(InferredValue::Any, InferredValue::Datatype),
                _ => InferredValue::Kind(NodeKind::Literal),
            };
        }
        if !self.options.infer_type_plain_node {
            return InferredValue::Any;
        }
        if all(|term| matches!(term, Term::NamedNode(_))) {
            InferredValue::Kind(NodeKind::Iri)
        } else if all(|term| matches!(term, Term::BlankNode(_))) {
            InferredValue::Kind(NodeKind::BNode)
        } else if all(|term| !matches!(term, Term::Literal(_))) {
            InferredValue::Kind(NodeKind::NonLiteral)
        } else {
            InferredValue::Any
        }
    }

    fn annotation(&self, predicate: &NamedNode) -> Option<Literal> {
        let lang = self.options.label_lang.as_deref()?;
        self.graph
            .objects(&Term::NamedNode(predicate.clone()), rdfs::LABEL)
            .into_iter()
            .find_map(|term| match term {
                Term::Literal(literal)
                    if literal
                        .language()
                        .is_some_and(|tag| tag.eq_ignore_ascii_case(lang)) =>
                {
                    Some(literal)
                }
                _ => None,
            })
    }
}

fn nested_label(
    parent: &ShapeLabel,
    predicate: &NamedNode,
    used: &IndexSet<ShapeLabel>,
) -> Result<ShapeLabel, InferenceError> {
    let ShapeLabel::Iri(parent) = parent else {
        return Ok(ShapeLabel::BNode(BlankNode::default()));
    };
    let local = predicate
        .as_str()
        .rsplit(['#', '/'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>();
    let stem = format!("{}_{}", parent.as_str(), if local.is_empty() { "value" } else { &local });
    let mut candidate = stem.clone();
    let mut suffix = 1;
    loop {
        let label = NamedNode::new(candidate.as_str())
            .map(ShapeLabel::Iri)
            .map_err(|error| ResolutionError::invalid_iri(candidate.as_str(), error))?;
        if !used.contains(&label) {
            return Ok(label);
        }
        suffix += 1;
        candidate = format!("{stem}{suffix}");
    }
}

fn cardinality(property: &InferredProperty) -> Cardinality {
    match (property.min, property.max) {
        (0, Some(_)) => Cardinality::new(0, Some(1)),
        (_, Some(_)) => Cardinality::ONE,
        (0, None) => Cardinality::new(0, None),
        (_, None) => Cardinality::new(1, None),
    }
}

fn to_shex(shapes: &IndexMap<ShapeLabel, Vec<InferredProperty>>, prefixes: PrefixMap) -> ShexSchema {
    let mut schema = ShexSchema {
        prefixes,
        ..Default::default()
    };
    for (label, properties) in shapes {
        let mut expressions = properties
            .iter()
            .map(|property| {
                let value = match &property.value {
                    InferredValue::Any => None,
                    InferredValue::Datatype(datatype) => Some(ShapeExpr::NodeConstraint(NodeConstraint {
                        datatype: Some(datatype.clone()),
                        ..Default::default()
                    })),
                    InferredValue::Kind(kind) => Some(ShapeExpr::NodeConstraint(NodeConstraint {
                        node_kind: Some(*kind),
                        ..Default::default()
                    })),
                    InferredValue::Classes(classes) => Some(ShapeExpr::NodeConstraint(NodeConstraint {
                        values: Some(classes.iter().cloned().map(ValueSetValue::Iri).collect()),
                        ..Default::default()
                    })),
                    InferredValue::Ref(target) => Some(ShapeExpr::Ref(target.clone())),
                };
                let mut constraint = TripleConstraint::new(property.predicate.clone(), value, cardinality(property));
                if let Some(label) = &property.label {
                    constraint.annotations.push(Annotation {
                        predicate: rdfs::LABEL.into_owned(),
                        object: Term::Literal(label.clone()),
                    });
                }
                TripleExpr::Constraint(constraint)
            })
            .collect::<Vec<_>>();
        let expression = match expressions.len() {
            0 => None,
            1 => expressions.pop(),
            _ => Some(TripleExpr::EachOf {
                expressions,
                cardinality: Cardinality::ONE,
            }),
        };
        schema.shapes.insert(
            label.clone(),
            ShapeExpr::shape(Shape {
                expression,
                ..Default::default()
            }),
        );
    }
    schema
}

fn to_shacl(
    shapes: &IndexMap<ShapeLabel, Vec<InferredProperty>>,
    mut prefixes: PrefixMap,
) -> Result<ShaclSchema, InferenceError> {
    let term = |label: &ShapeLabel| -> Term {
        match label {
            ShapeLabel::Iri(iri) => Term::NamedNode(iri.clone()),
            ShapeLabel::BNode(node) => Term::BlankNode(node.clone()),
            ShapeLabel::Start => Term::BlankNode(BlankNode::default()),
        }
    };
    let mut triples = Vec::new();
    for (label, properties) in shapes {
        let shape = term(label);
        let Some(subject) = crate::rdf::graph::as_subject(&shape) else {
            continue;
        };
        triples.push(Triple::new(subject.clone(), rdf::TYPE, sh::NODE_SHAPE.into_owned()));
        for property in properties {
            let node = BlankNode::default();
            triples.push(Triple::new(subject.clone(), sh::PROPERTY, node.clone()));
            triples.push(Triple::new(node.clone(), sh::PATH, property.predicate.clone()));
            if property.min > 0 {
                triples.push(Triple::new(node.clone(), sh::MIN_COUNT, count(property.min)));
            }
            if let Some(max) = property.max {
                triples.push(Triple::new(node.clone(), sh::MAX_COUNT, count(max)));
            }
            match &property.value {
                InferredValue::Any => {}
                InferredValue::Datatype(datatype) => {
                    triples.push(Triple::new(node.clone(), sh::DATATYPE, datatype.clone()));
                }
                InferredValue::Kind(kind) => {
                    let kind = match kind {
                        NodeKind::Iri => sh::IRI,
                        NodeKind::BNode => sh::BLANK_NODE,
                        NodeKind::Literal => sh::LITERAL,
                        NodeKind::NonLiteral => sh::BLANK_NODE_OR_IRI,
                    };
                    triples.push(Triple::new(node.clone(), sh::NODE_KIND, kind.into_owned()));
                }
                InferredValue::Classes(classes) => {
                    let head = list(classes.iter().cloned().map(Term::NamedNode), &mut triples);
                    triples.push(Triple::new(node.clone(), sh::IN, head));
                }
                InferredValue::Ref(target) => {
                    triples.push(Triple::new(node.clone(), sh::NODE, term(target)));
                }
            }
            if let Some(name) = &property.label {
                triples.push(Triple::new(node.clone(), sh::NAME, name.clone()));
            }
        }
    }
    if prefixes.get("sh").is_none() {
        prefixes.insert("sh", sh::NAMESPACE);
    }
    if prefixes.get("xsd").is_none() {
        prefixes.insert("xsd", "http://www.w3.org/2001/XMLSchema#");
    }
    let mut graph = RdfGraph::from_triples(triples);
    *graph.prefix_map_mut() = prefixes;
    Ok(ShaclSchema::from_graph(graph)?)
}

fn count(value: u32) -> Literal {
    Literal::new_typed_literal(value.to_string(), xsd::INTEGER)
}

/// Writes an RDF collection and returns its head.
fn list(items: impl DoubleEndedIterator<Item = Term>, triples: &mut Vec<Triple>) -> Term {
    let mut head = Term::NamedNode(rdf::NIL.into_owned());
    for item in items.rev() {
        let cell = BlankNode::default();
        triples.push(Triple::new(cell.clone(), rdf::FIRST, item));
        triples.push(Triple::new(cell.clone(), rdf::REST, head));
        head = Term::BlankNode(cell);
    }
    head
}

/// An inference request over resolved data.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub data: DataSpec,
    pub node_selector: String,
    pub engine: Option<String>,
    pub label: Option<String>,
    pub format: Option<String>,
    pub options: InferenceOptions,
    pub visualize: bool,
    pub base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub text: String,
    pub engine: SchemaEngine,
    pub format: SchemaFormat,
    pub label: ShapeLabel,
    pub shapes: Vec<String>,
    pub shape_map: ResultShapeMap,
    pub uml: Option<String>,
    pub svg: Option<String>,
}

#[derive(Clone)]
pub struct InferenceService {
    resolver: Resolver,
    renderer: Arc<dyn SchemaRenderer>,
    follow_depth: usize,
    default_base: Option<String>,
}

impl InferenceService {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            renderer: Arc::new(PlantUmlRenderer),
            follow_depth: 2,
            default_base: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn SchemaRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_follow_depth(mut self, depth: usize) -> Self {
        self.follow_depth = depth;
        self
    }

    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = Some(base.into());
        self
    }

    pub async fn infer_schema(&self, request: &InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        self.run(request)
            .instrument(inference_span(&request.node_selector))
            .await
    }

    async fn run(&self, request: &InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        let registry = &self.resolver.registry;
        let base = request.base.as_deref().or(self.default_base.as_deref());
        let engine = registry.schema_engine(request.engine.as_deref())?;
        Span::current().record("schema.engine", tracing::field::display(engine));
        let format = registry.schema_format(engine, request.format.as_deref())?;

        let mut resolved = resolve_data(&self.resolver, &request.data, base).await?;
        if resolved.is_live() {
            let selector = parse_node_selector(&request.node_selector, resolved.prefix_map(), base)
                .map_err(|error| InferenceError::InvalidSelector {
                    selector: request.node_selector.clone(),
                    message: error.to_string(),
                })?;
            if let Some(query) = selector_query(&selector) {
                construct_into(&self.resolver, &mut resolved, &query).await?;
            }
            let seeds = selector.select(resolved.graph());
            materialize(&self.resolver, &mut resolved, seeds, self.follow_depth).await?;
        }

        let graph = resolved.graph();
        let label = request.label.as_deref();
        let (inferred, uml, svg) = if request.visualize {
            let visualized = infer_with_visualization(
                graph,
                &request.node_selector,
                engine,
                label,
                &request.options,
                base,
                self.renderer.as_ref(),
            )?;
            (visualized.inferred, Some(visualized.uml), Some(visualized.svg))
        } else {
            (
                infer(graph, &request.node_selector, engine, label, &request.options, base)?,
                None,
                None,
            )
        };
        let text = inferred.schema.serialize(&format)?;
        Ok(InferenceOutput {
            text,
            engine,
            format,
            shapes: inferred.schema.shapes(),
            label: inferred.label,
            shape_map: inferred.shape_map,
            uml,
            svg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use oxigraph::io::RdfFormat;

    const DATA: &str = r#"
@prefix ex: <http://example.org/> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
ex:alice a ex:Person ; ex:name "Alice" ; ex:knows ex:bob ; ex:age 30 .
ex:bob a ex:Person ; ex:name "Bob" ; ex:knows ex:alice , ex:carol .
ex:carol ex:name "Carol" .
ex:name rdfs:label "name"@en , "nom"@fr .
"#;

    fn graph() -> RdfGraph {
        RdfGraph::parse(DATA.as_bytes(), RdfFormat::Turtle, None).unwrap()
    }

    fn constraint<'a>(schema: &'a ShexSchema, label: &ShapeLabel, local: &str) -> &'a TripleConstraint {
        let Some(ShapeExpr::Shape(shape)) = schema.get(label) else {
            panic!("{label} is not a shape");
        };
        shape
            .expression
            .as_ref()
            .unwrap()
            .constraints()
            .into_iter()
            .find(|constraint| constraint.predicate.as_str() == format!("http://example.org/{local}"))
            .unwrap()
    }

    #[test]
    fn infers_cardinalities_and_values() {
        let inferred = infer(
            &graph(),
            "{FOCUS a ex:Person}",
            SchemaEngine::ShEx,
            Some("ex:PersonShape"),
            &InferenceOptions::default(),
            None,
        )
        .unwrap();
        let Schema::ShEx(schema) = &inferred.schema else {
            panic!("expected ShEx");
        };
        let label = inferred.label.clone();
        assert_eq!(label.to_string(), "<http://example.org/PersonShape>");
        assert_eq!(constraint(schema, &label, "name").cardinality, Cardinality::ONE);
        assert_eq!(constraint(schema, &label, "age").cardinality, Cardinality::new(0, Some(1)));
        assert_eq!(constraint(schema, &label, "knows").cardinality, Cardinality::new(1, None));
        assert_matches!(
            constraint(schema, &label, "knows").value.as_deref(),
            Some(ShapeExpr::NodeConstraint(NodeConstraint { node_kind: Some(NodeKind::Iri), .. }))
        );
        assert_eq!(inferred.shape_map.len(), 2);
        assert!(inferred.shape_map.conforms());
    }

    #[test]
    fn follows_on_to_nested_shapes() {
        let options = InferenceOptions {
            max_follow_on: 2,
            label_lang: Some("fr".to_string()),
            ..Default::default()
        };
        let inferred = infer(&graph(), "ex:alice", SchemaEngine::ShEx, Some("ex:S"), &options, None).unwrap();
        let Schema::ShEx(schema) = &inferred.schema else {
            panic!("expected ShEx");
        };
        assert_eq!(
            inferred.schema.shapes(),
            vec!["http://example.org/S", "http://example.org/S_knows"]
        );
        let knows = constraint(schema, &inferred.label, "knows");
        assert_matches!(knows.value.as_deref(), Some(ShapeExpr::Ref(ShapeLabel::Iri(iri))) if iri.as_str() == "http://example.org/S_knows");
        let name = constraint(schema, &inferred.label, "name");
        assert_eq!(name.annotations.len(), 1);
        assert_eq!(name.annotations[0].object.to_string(), "\"nom\"@fr");
    }

    #[test]
    fn acceptance_threshold_drops_rare_predicates() {
        let options = InferenceOptions {
            acceptance_threshold: 0.6,
            ..Default::default()
        };
        let inferred = infer(&graph(), "{FOCUS ex:name _}", SchemaEngine::ShEx, Some("ex:S"), &options, None).unwrap();
        let Schema::ShEx(schema) = &inferred.schema else {
            panic!("expected ShEx");
        };
        let Some(ShapeExpr::Shape(shape)) = schema.get(&inferred.label) else {
            panic!("missing shape");
        };
        let predicates = shape
            .expression
            .as_ref()
            .unwrap()
            .constraints()
            .iter()
            .map(|constraint| constraint.predicate.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            predicates,
            vec![
                "http://example.org/knows",
                "http://example.org/name",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
            ]
        );
    }

    #[test]
    fn infers_shacl_that_loads() {
        let inferred = infer(
            &graph(),
            "{FOCUS a ex:Person}",
            SchemaEngine::Shacl,
            None,
            &InferenceOptions::default(),
            Some("http://example.org/"),
        )
        .unwrap();
        assert_eq!(inferred.schema.shapes(), vec!["http://example.org/Shape"]);
        let Schema::Shacl(shacl) = &inferred.schema else {
            panic!("expected SHACL");
        };
        assert_eq!(shacl.shapes()[0].properties.len(), 4);
    }

    #[test]
    fn selector_errors() {
        assert_matches!(
            infer(&graph(), "{FOCUS", SchemaEngine::ShEx, None, &InferenceOptions::default(), None),
            Err(InferenceError::InvalidSelector { .. })
        );
        assert_matches!(
            infer(&graph(), "ex:nobody", SchemaEngine::ShEx, None, &InferenceOptions::default(), None),
            Err(InferenceError::NoMatchingNodes(selector)) if selector == "ex:nobody"
        );
    }

    #[test]
    fn render_failures_keep_the_schema() {
        struct Broken;
        impl SchemaRenderer for Broken {
            fn render(&self, _: &Schema) -> Result<crate::uml::Rendered, crate::uml::RenderError> {
                Err(crate::uml::RenderError::Empty)
            }
        }
        let visualized = infer_with_visualization(
            &graph(),
            "ex:alice",
            SchemaEngine::ShEx,
            Some("ex:S"),
            &InferenceOptions::default(),
            None,
            &Broken,
        )
        .unwrap();
        assert!(visualized.uml.starts_with("error:"));
        assert!(visualized.svg.starts_with("error:"));
        assert_eq!(visualized.inferred.schema.shapes().len(), 1);
    }
}
