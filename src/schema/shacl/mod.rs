//! SHACL Core shapes graphs
//!
//! Shapes are read from any RDF graph:
//! - **Node shapes**: `sh:NodeShape` instances, anything with a target, the
//!   subjects of `sh:property` and the objects of `sh:node`
//! - **Property shapes**: the objects of `sh:property`, or `sh:PropertyShape`
//!   instances with their own targets
//! - **Targets**: explicit `sh:target*` declarations and implicit class
//!   targets for shapes that are also `rdfs:Class`

mod validator;

pub use validator::{ReportEntry, ShaclValidator, ValidationReport};

use crate::error::ResolutionError;
use crate::rdf::graph::{RdfGraph, display_term};
use crate::rdf::prefix::PrefixMap;
use crate::rdf::vocab::sh;
use indexmap::IndexSet;
use oxigraph::io::RdfFormat;
use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Term};
use serde::Serialize;

const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";

// =============================================================================
// Severity Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Violation,
}

impl Severity {
    pub fn from_iri(iri: &NamedNode) -> Self {
        match iri.as_ref() {
            i if i == sh::INFO => Severity::Info,
            i if i == sh::WARNING => Severity::Warning,
            _ => Severity::Violation, // Unknown severities count as violations
        }
    }

    pub fn to_iri(&self) -> NamedNode {
        match self {
            Severity::Info => sh::INFO.into_owned(),
            Severity::Warning => sh::WARNING.into_owned(),
            Severity::Violation => sh::VIOLATION.into_owned(),
        }
    }
}

// =============================================================================
// Targets and Paths
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(Term),
    Class(NamedNode),
    SubjectsOf(NamedNode),
    ObjectsOf(NamedNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Path {
    Predicate(NamedNode),
    Inverse(NamedNode),
}

impl Path {
    pub fn predicate(&self) -> &NamedNode {
        match self {
            Path::Predicate(predicate) | Path::Inverse(predicate) => predicate,
        }
    }

    /// Value nodes reached from `focus` along this path.
    pub fn values(&self, graph: &RdfGraph, focus: &Term) -> Vec<Term> {
        let values = match self {
            Path::Predicate(predicate) => graph.objects(focus, predicate.as_ref()),
            Path::Inverse(predicate) => graph.subjects_with(predicate.as_ref(), focus),
        };
        values.into_iter().collect::<IndexSet<_>>().into_iter().collect()
    }

    pub fn display(&self, prefixes: &PrefixMap) -> String {
        match self {
            Path::Predicate(predicate) => prefixes.qualify(predicate.as_str()),
            Path::Inverse(predicate) => format!("^{}", prefixes.qualify(predicate.as_str())),
        }
    }
}

// =============================================================================
// Constraints
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Iri,
    BlankNode,
    Literal,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        Some(match iri {
            i if i == sh::IRI => NodeKind::Iri,
            i if i == sh::BLANK_NODE => NodeKind::BlankNode,
            i if i == sh::LITERAL => NodeKind::Literal,
            i if i == sh::BLANK_NODE_OR_IRI => NodeKind::BlankNodeOrIri,
            i if i == sh::BLANK_NODE_OR_LITERAL => NodeKind::BlankNodeOrLiteral,
            i if i == sh::IRI_OR_LITERAL => NodeKind::IriOrLiteral,
            _ => return None,
        })
    }

    pub fn to_iri(&self) -> NamedNode {
        match self {
            NodeKind::Iri => sh::IRI,
            NodeKind::BlankNode => sh::BLANK_NODE,
            NodeKind::Literal => sh::LITERAL,
            NodeKind::BlankNodeOrIri => sh::BLANK_NODE_OR_IRI,
            NodeKind::BlankNodeOrLiteral => sh::BLANK_NODE_OR_LITERAL,
            NodeKind::IriOrLiteral => sh::IRI_OR_LITERAL,
        }
        .into_owned()
    }

    pub fn matches(&self, term: &Term) -> bool {
        let (iri, blank, literal) = match term {
            Term::NamedNode(_) => (true, false, false),
            Term::BlankNode(_) => (false, true, false),
            _ => (false, false, true),
        };
        match self {
            NodeKind::Iri => iri,
            NodeKind::BlankNode => blank,
            NodeKind::Literal => literal,
            NodeKind::BlankNodeOrIri => blank || iri,
            NodeKind::BlankNodeOrLiteral => blank || literal,
            NodeKind::IriOrLiteral => iri || literal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Class(NamedNode),
    Datatype(NamedNode),
    NodeKind(NodeKind),
    MinCount(usize),
    MaxCount(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern { pattern: String, flags: String },
    MinInclusive(Literal),
    MinExclusive(Literal),
    MaxInclusive(Literal),
    MaxExclusive(Literal),
    In(Vec<Term>),
    HasValue(Term),
    UniqueLang,
    Node(Term),
}

impl Constraint {
    /// Constraint component reported in results.
    pub fn component(&self) -> &'static str {
        match self {
            Constraint::Class(_) => "sh:ClassConstraintComponent",
            Constraint::Datatype(_) => "sh:DatatypeConstraintComponent",
            Constraint::NodeKind(_) => "sh:NodeKindConstraintComponent",
            Constraint::MinCount(_) => "sh:MinCountConstraintComponent",
            Constraint::MaxCount(_) => "sh:MaxCountConstraintComponent",
            Constraint::MinLength(_) => "sh:MinLengthConstraintComponent",
            Constraint::MaxLength(_) => "sh:MaxLengthConstraintComponent",
            Constraint::Pattern { .. } => "sh:PatternConstraintComponent",
            Constraint::MinInclusive(_) => "sh:MinInclusiveConstraintComponent",
            Constraint::MinExclusive(_) => "sh:MinExclusiveConstraintComponent",
            Constraint::MaxInclusive(_) => "sh:MaxInclusiveConstraintComponent",
            Constraint::MaxExclusive(_) => "sh:MaxExclusiveConstraintComponent",
            Constraint::In(_) => "sh:InConstraintComponent",
            Constraint::HasValue(_) => "sh:HasValueConstraintComponent",
            Constraint::UniqueLang => "sh:UniqueLangConstraintComponent",
            Constraint::Node(_) => "sh:NodeConstraintComponent",
        }
    }
}

// =============================================================================
// Shapes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyShape {
    pub id: Term,
    pub path: Path,
    pub constraints: Vec<Constraint>,
    pub severity: Severity,
    pub message: Option<String>,
    pub deactivated: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub id: Term,
    pub targets: Vec<Target>,
    pub constraints: Vec<Constraint>,
    pub properties: Vec<PropertyShape>,
    pub severity: Severity,
    pub message: Option<String>,
    pub deactivated: bool,
    pub closed: bool,
    pub ignored_properties: Vec<NamedNode>,
    pub name: Option<String>,
}

impl NodeShape {
    /// Predicates a closed shape accepts.
    pub fn allowed_predicates(&self) -> IndexSet<NamedNode> {
        let mut allowed = self
            .properties
            .iter()
            .filter_map(|property| match &property.path {
                Path::Predicate(predicate) => Some(predicate.clone()),
                Path::Inverse(_) => None,
            })
            .collect::<IndexSet<_>>();
        allowed.extend(self.ignored_properties.iter().cloned());
        allowed
    }
}

/// A parsed SHACL shapes graph.
#[derive(Debug, Clone)]
pub struct ShaclSchema {
    source: RdfGraph,
    shapes: Vec<NodeShape>,
}

impl ShaclSchema {
    pub fn parse(text: &str, format: RdfFormat, base: Option<&str>) -> Result<Self, ResolutionError> {
        Self::from_graph(RdfGraph::parse(text.as_bytes(), format, base)?)
    }

    /// Loads every shape declared in `graph`.
    pub fn from_graph(source: RdfGraph) -> Result<Self, ResolutionError> {
        let shapes = ShapeLoader { graph: &source }.load()?;
        tracing::debug!(shapes = shapes.len(), "loaded SHACL shapes graph");
        Ok(Self { source, shapes })
    }

    pub fn shapes(&self) -> &[NodeShape] {
        &self.shapes
    }

    pub fn shape(&self, id: &Term) -> Option<&NodeShape> {
        self.shapes.iter().find(|shape| &shape.id == id)
    }

    pub fn source(&self) -> &RdfGraph {
        &self.source
    }

    pub fn prefix_map(&self) -> &PrefixMap {
        self.source.prefix_map()
    }

    pub fn serialize(&self, format: RdfFormat) -> Result<String, crate::error::SerializationError> {
        self.source.serialize(format)
    }

    pub fn display(&self, term: &Term) -> String {
        display_term(term, self.prefix_map())
    }
}

struct ShapeLoader<'a> {
    graph: &'a RdfGraph,
}

const TARGET_PREDICATES: [NamedNodeRef<'static>; 4] = [
    sh::TARGET_NODE,
    sh::TARGET_CLASS,
    sh::TARGET_SUBJECTS_OF,
    sh::TARGET_OBJECTS_OF,
];

impl ShapeLoader<'_> {
    fn load(&self) -> Result<Vec<NodeShape>, ResolutionError> {
        let property_ids = self
            .graph
            .pairs(sh::PROPERTY)
            .into_iter()
            .map(|(_, property)| property)
            .collect::<IndexSet<_>>();

        let mut ids = IndexSet::new();
        ids.extend(
            self.graph
                .subjects_with(rdf::TYPE, &sh::NODE_SHAPE.into_owned().into()),
        );
        for predicate in TARGET_PREDICATES {
            ids.extend(self.graph.pairs(predicate).into_iter().map(|(shape, _)| shape));
        }
        ids.extend(self.graph.pairs(sh::PROPERTY).into_iter().map(|(shape, _)| shape));
        ids.extend(self.graph.pairs(sh::NODE).into_iter().map(|(_, shape)| shape));
        ids.extend(
            self.graph
                .subjects_with(rdf::TYPE, &sh::PROPERTY_SHAPE.into_owned().into()),
        );

        let mut shapes = Vec::new();
        for id in ids {
            if matches!(id, Term::Literal(_)) {
                return Err(invalid(format!("literal {id} used as a shape")));
            }
            let standalone_property = self.graph.object(&id, sh::PATH).is_some();
            if standalone_property && property_ids.contains(&id) {
                continue;
            }
            shapes.push(self.node_shape(id, standalone_property)?);
        }
        Ok(shapes)
    }

    /// A property shape used as a top-level shape is wrapped so its targets
    /// and constraints apply like any node shape's.
    fn node_shape(&self, id: Term, standalone_property: bool) -> Result<NodeShape, ResolutionError> {
        let mut properties = Vec::new();
        let constraints = if standalone_property {
            properties.push(self.property_shape(&id)?);
            Vec::new()
        } else {
            for property in self.graph.objects(&id, sh::PROPERTY) {
                properties.push(self.property_shape(&property)?);
            }
            self.constraints(&id, false)?
        };
        Ok(NodeShape {
            targets: self.targets(&id),
            constraints,
            properties,
            severity: self.severity(&id),
            message: self.string(&id, sh::MESSAGE),
            deactivated: self.boolean(&id, sh::DEACTIVATED)?,
            closed: self.boolean(&id, sh::CLOSED)?,
            ignored_properties: self
                .graph
                .object(&id, sh::IGNORED_PROPERTIES)
                .map(|head| self.graph.list_items(&head))
                .unwrap_or_default()
                .into_iter()
                .filter_map(|term| match term {
                    Term::NamedNode(predicate) => Some(predicate),
                    _ => None,
                })
                .collect(),
            name: self.string(&id, sh::NAME),
            id,
        })
    }

    fn property_shape(&self, id: &Term) -> Result<PropertyShape, ResolutionError> {
        let path = self.graph.object(id, sh::PATH).ok_or_else(|| {
            invalid(format!("property shape {} has no sh:path", self.show(id)))
        })?;
        let path = match &path {
            Term::NamedNode(predicate) => Path::Predicate(predicate.clone()),
            other => match self.graph.object(other, sh::INVERSE_PATH) {
                Some(Term::NamedNode(predicate)) => Path::Inverse(predicate),
                _ => {
                    return Err(invalid(format!(
                        "property shape {} uses an unsupported path; only predicates and sh:inversePath are supported",
                        self.show(id)
                    )));
                }
            },
        };
        Ok(PropertyShape {
            id: id.clone(),
            path,
            constraints: self.constraints(id, true)?,
            severity: self.severity(id),
            message: self.string(id, sh::MESSAGE),
            deactivated: self.boolean(id, sh::DEACTIVATED)?,
            name: self.string(id, sh::NAME),
        })
    }

    fn targets(&self, id: &Term) -> Vec<Target> {
        let mut targets = Vec::new();
        targets.extend(self.graph.objects(id, sh::TARGET_NODE).into_iter().map(Target::Node));
        targets.extend(self.iris(id, sh::TARGET_CLASS).into_iter().map(Target::Class));
        targets.extend(
            self.iris(id, sh::TARGET_SUBJECTS_OF)
                .into_iter()
                .map(Target::SubjectsOf),
        );
        targets.extend(
            self.iris(id, sh::TARGET_OBJECTS_OF)
                .into_iter()
                .map(Target::ObjectsOf),
        );
        if let Term::NamedNode(class) = id {
            let types = self.graph.types_of(id);
            if types
                .iter()
                .any(|t| t.as_ref() == rdfs::CLASS || t.as_str() == OWL_CLASS)
            {
                targets.push(Target::Class(class.clone()));
            }
        }
        targets
    }

    fn constraints(&self, id: &Term, property: bool) -> Result<Vec<Constraint>, ResolutionError> {
        let mut constraints = Vec::new();
        constraints.extend(self.iris(id, sh::CLASS).into_iter().map(Constraint::Class));
        constraints.extend(self.iris(id, sh::DATATYPE).into_iter().map(Constraint::Datatype));
        for kind in self.iris(id, sh::NODE_KIND) {
            let kind = NodeKind::from_iri(kind.as_ref())
                .ok_or_else(|| invalid(format!("unknown sh:nodeKind {kind}")))?;
            constraints.push(Constraint::NodeKind(kind));
        }
        if property {
            if let Some(n) = self.count(id, sh::MIN_COUNT)? {
                constraints.push(Constraint::MinCount(n));
            }
            if let Some(n) = self.count(id, sh::MAX_COUNT)? {
                constraints.push(Constraint::MaxCount(n));
            }
            if self.boolean(id, sh::UNIQUE_LANG)? {
                constraints.push(Constraint::UniqueLang);
            }
        }
        if let Some(n) = self.count(id, sh::MIN_LENGTH)? {
            constraints.push(Constraint::MinLength(n));
        }
        if let Some(n) = self.count(id, sh::MAX_LENGTH)? {
            constraints.push(Constraint::MaxLength(n));
        }
        let flags = self.string(id, sh::FLAGS).unwrap_or_default();
        for pattern in self.graph.objects(id, sh::PATTERN) {
            let Term::Literal(pattern) = pattern else {
                return Err(invalid(format!("sh:pattern of {} is not a literal", self.show(id))));
            };
            crate::schema::shex::compile_pattern(pattern.value(), &flags).map_err(invalid)?;
            constraints.push(Constraint::Pattern {
                pattern: pattern.value().to_string(),
                flags: flags.clone(),
            });
        }
        let bounds: [(NamedNodeRef<'static>, fn(Literal) -> Constraint); 4] = [
            (sh::MIN_INCLUSIVE, Constraint::MinInclusive),
            (sh::MIN_EXCLUSIVE, Constraint::MinExclusive),
            (sh::MAX_INCLUSIVE, Constraint::MaxInclusive),
            (sh::MAX_EXCLUSIVE, Constraint::MaxExclusive),
        ];
        for (predicate, make) in bounds {
            for bound in self.graph.objects(id, predicate) {
                match bound {
                    Term::Literal(bound) => constraints.push(make(bound)),
                    other => {
                        return Err(invalid(format!(
                            "{} of {} is not a literal: {other}",
                            self.graph.prefix_map().qualify(predicate.as_str()),
                            self.show(id)
                        )));
                    }
                }
            }
        }
        for head in self.graph.objects(id, sh::IN) {
            constraints.push(Constraint::In(self.graph.list_items(&head)));
        }
        constraints.extend(self.graph.objects(id, sh::HAS_VALUE).into_iter().map(Constraint::HasValue));
        constraints.extend(self.graph.objects(id, sh::NODE).into_iter().map(Constraint::Node));
        Ok(constraints)
    }

    fn severity(&self, id: &Term) -> Severity {
        match self.graph.object(id, sh::SEVERITY) {
            Some(Term::NamedNode(iri)) => Severity::from_iri(&iri),
            _ => Severity::Violation,
        }
    }

    fn iris(&self, id: &Term, predicate: NamedNodeRef<'_>) -> Vec<NamedNode> {
        self.graph
            .objects(id, predicate)
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(iri) => Some(iri),
                _ => None,
            })
            .collect()
    }

    fn string(&self, id: &Term, predicate: NamedNodeRef<'_>) -> Option<String> {
        match self.graph.object(id, predicate) {
            Some(Term::Literal(literal)) => Some(literal.value().to_string()),
            _ => None,
        }
    }

    fn boolean(&self, id: &Term, predicate: NamedNodeRef<'_>) -> Result<bool, ResolutionError> {
        match self.graph.object(id, predicate) {
            None => Ok(false),
            Some(Term::Literal(literal)) if literal.datatype() == xsd::BOOLEAN => {
                match literal.value() {
                    "true" | "1" => Ok(true),
                    "false" | "0" => Ok(false),
                    other => Err(invalid(format!("invalid boolean '{other}'"))),
                }
            }
            Some(other) => Err(invalid(format!(
                "{} of {} must be a boolean, found {other}",
                self.graph.prefix_map().qualify(predicate.as_str()),
                self.show(id)
            ))),
        }
    }

    fn count(&self, id: &Term, predicate: NamedNodeRef<'_>) -> Result<Option<usize>, ResolutionError> {
        match self.graph.object(id, predicate) {
            None => Ok(None),
            Some(Term::Literal(literal)) => literal.value().parse().map(Some).map_err(|_| {
                invalid(format!(
                    "{} of {} must be a non-negative integer, found '{}'",
                    self.graph.prefix_map().qualify(predicate.as_str()),
                    self.show(id),
                    literal.value()
                ))
            }),
            Some(other) => Err(invalid(format!("expected an integer, found {other}"))),
        }
    }

    fn show(&self, term: &Term) -> String {
        display_term(term, self.graph.prefix_map())
    }
}

fn invalid(message: impl std::fmt::Display) -> ResolutionError {
    ResolutionError::parse("SHACL", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(super) const SHAPES: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix ex: <http://example.org/> .

        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [
                sh:path ex:name ;
                sh:datatype xsd:string ;
                sh:minCount 1 ;
                sh:maxCount 1 ;
            ] ;
            sh:property [
                sh:path [ sh:inversePath ex:knows ] ;
                sh:nodeKind sh:IRI ;
                sh:severity sh:Warning ;
            ] .

        ex:Company a rdfs:Class, sh:NodeShape ;
            sh:closed true ;
            sh:ignoredProperties ( ex:note ) ;
            sh:property [ sh:path ex:label ; sh:in ( "A" "B" ) ] .
    "#;

    fn schema() -> ShaclSchema {
        ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap()
    }

    fn iri(local: &str) -> Term {
        Term::NamedNode(NamedNode::new(format!("http://example.org/{local}")).unwrap())
    }

    #[test]
    fn loads_node_and_property_shapes() {
        let schema = schema();
        assert_eq!(schema.shapes().len(), 2);
        let person = schema.shape(&iri("PersonShape")).unwrap();
        assert_eq!(
            person.targets,
            vec![Target::Class(NamedNode::new("http://example.org/Person").unwrap())]
        );
        assert_eq!(person.properties.len(), 2);
        let name = person
            .properties
            .iter()
            .find(|property| matches!(&property.path, Path::Predicate(_)))
            .unwrap();
        assert!(name.constraints.contains(&Constraint::MinCount(1)));
        assert!(name.constraints.contains(&Constraint::MaxCount(1)));
        let known = person
            .properties
            .iter()
            .find(|property| matches!(&property.path, Path::Inverse(_)))
            .unwrap();
        assert_eq!(known.path.predicate().as_str(), "http://example.org/knows");
        assert_eq!(known.severity, Severity::Warning);
    }

    #[test]
    fn classes_that_are_shapes_target_their_instances() {
        let schema = schema();
        let company = schema.shape(&iri("Company")).unwrap();
        assert!(company.closed);
        assert_eq!(
            company.targets,
            vec![Target::Class(NamedNode::new("http://example.org/Company").unwrap())]
        );
        let allowed = company.allowed_predicates();
        assert!(allowed.contains(&NamedNode::new("http://example.org/note").unwrap()));
        assert_matches!(&company.properties[0].constraints[0], Constraint::In(values) if values.len() == 2);
    }

    #[test]
    fn malformed_shapes_are_parse_errors() {
        let missing_path = r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix ex: <http://example.org/> .
            ex:S a sh:NodeShape ; sh:property [ sh:minCount 1 ] .
        "#;
        assert_matches!(
            ShaclSchema::parse(missing_path, RdfFormat::Turtle, None),
            Err(ResolutionError::Parse { format, message }) if format == "SHACL" && message.contains("sh:path")
        );

        let bad_count = r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix ex: <http://example.org/> .
            ex:S a sh:NodeShape ; sh:property [ sh:path ex:p ; sh:minCount "many" ] .
        "#;
        assert_matches!(
            ShaclSchema::parse(bad_count, RdfFormat::Turtle, None),
            Err(ResolutionError::Parse { .. })
        );
    }

    #[test]
    fn severity_conversion() {
        assert_eq!(Severity::from_iri(&sh::WARNING.into_owned()), Severity::Warning);
        assert_eq!(Severity::Info.to_iri().as_ref(), sh::INFO);
        assert_eq!(
            Severity::from_iri(&NamedNode::new("http://example.org/Custom").unwrap()),
            Severity::Violation
        );
    }
}
