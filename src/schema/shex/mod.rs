//! Shape Expressions: schema model, ShExC and ShExJ syntaxes, and validator.

mod json;
mod parser;
mod validator;
mod writer;

pub use json::{from_shexj, to_shexj};
pub use parser::parse_shexc;
pub use validator::ShexValidator;
pub(crate) use validator::{compile_pattern, number, numeric_value};
pub use writer::to_shexc;

use crate::rdf::prefix::PrefixMap;
use crate::shapemap::ShapeLabel;
use indexmap::IndexMap;
use oxigraph::model::{Literal, NamedNode, Term};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShexSchema {
    pub prefixes: PrefixMap,
    pub base: Option<String>,
    pub start: Option<ShapeExpr>,
    /// Declarations in source order; labels are IRIs or blank nodes.
    pub shapes: IndexMap<ShapeLabel, ShapeExpr>,
}

impl ShexSchema {
    pub fn labels(&self) -> Vec<ShapeLabel> {
        self.shapes.keys().cloned().collect()
    }

    /// Resolves a label to its expression; `START` yields the start expression.
    pub fn get(&self, label: &ShapeLabel) -> Option<&ShapeExpr> {
        match label {
            ShapeLabel::Start => self.start.as_ref(),
            other => self.shapes.get(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeExpr {
    And(Vec<ShapeExpr>),
    Or(Vec<ShapeExpr>),
    Not(Box<ShapeExpr>),
    NodeConstraint(NodeConstraint),
    Shape(Box<Shape>),
    External,
    Ref(ShapeLabel),
}

impl ShapeExpr {
    pub fn shape(shape: Shape) -> Self {
        ShapeExpr::Shape(Box::new(shape))
    }

    /// Visits every shape reference reachable without following references.
    pub fn references(&self) -> Vec<&ShapeLabel> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a ShapeLabel>) {
        match self {
            ShapeExpr::And(parts) | ShapeExpr::Or(parts) => {
                parts.iter().for_each(|part| part.collect_references(found))
            }
            ShapeExpr::Not(inner) => inner.collect_references(found),
            ShapeExpr::Ref(label) => found.push(label),
            ShapeExpr::Shape(shape) => {
                if let Some(expression) = &shape.expression {
                    for constraint in expression.constraints() {
                        if let Some(value) = &constraint.value {
                            value.collect_references(found);
                        }
                    }
                }
            }
            ShapeExpr::NodeConstraint(_) | ShapeExpr::External => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Iri,
    BNode,
    NonLiteral,
    Literal,
}

impl NodeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            NodeKind::Iri => "IRI",
            NodeKind::BNode => "BNODE",
            NodeKind::NonLiteral => "NONLITERAL",
            NodeKind::Literal => "LITERAL",
        }
    }

    pub fn matches(&self, term: &Term) -> bool {
        matches!(
            (self, term),
            (NodeKind::Iri, Term::NamedNode(_))
                | (NodeKind::BNode, Term::BlankNode(_))
                | (NodeKind::NonLiteral, Term::NamedNode(_) | Term::BlankNode(_))
                | (NodeKind::Literal, Term::Literal(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueSetValue {
    Iri(NamedNode),
    IriStem(String),
    Literal(Literal),
    Language(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern { pattern: String, flags: String },
    MinInclusive(Literal),
    MinExclusive(Literal),
    MaxInclusive(Literal),
    MaxExclusive(Literal),
    TotalDigits(usize),
    FractionDigits(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConstraint {
    pub node_kind: Option<NodeKind>,
    pub datatype: Option<NamedNode>,
    pub values: Option<Vec<ValueSetValue>>,
    pub facets: Vec<Facet>,
}

impl NodeConstraint {
    pub fn is_empty(&self) -> bool {
        self.node_kind.is_none()
            && self.datatype.is_none()
            && self.values.is_none()
            && self.facets.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub closed: bool,
    pub extra: Vec<NamedNode>,
    pub expression: Option<TripleExpr>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cardinality {
    pub min: u32,
    /// `None` is unbounded.
    pub max: Option<u32>,
}

impl Cardinality {
    pub const ONE: Cardinality = Cardinality {
        min: 1,
        max: Some(1),
    };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn is_one(&self) -> bool {
        *self == Self::ONE
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::ONE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripleExpr {
    EachOf {
        expressions: Vec<TripleExpr>,
        cardinality: Cardinality,
    },
    OneOf {
        expressions: Vec<TripleExpr>,
        cardinality: Cardinality,
    },
    Constraint(TripleConstraint),
}

impl TripleExpr {
    /// Every triple constraint, depth first.
    pub fn constraints(&self) -> Vec<&TripleConstraint> {
        match self {
            TripleExpr::Constraint(constraint) => vec![constraint],
            TripleExpr::EachOf { expressions, .. } | TripleExpr::OneOf { expressions, .. } => {
                expressions.iter().flat_map(TripleExpr::constraints).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripleConstraint {
    pub inverse: bool,
    pub predicate: NamedNode,
    /// `None` accepts any value.
    pub value: Option<Box<ShapeExpr>>,
    pub cardinality: Cardinality,
    pub annotations: Vec<Annotation>,
}

impl TripleConstraint {
    pub fn new(predicate: NamedNode, value: Option<ShapeExpr>, cardinality: Cardinality) -> Self {
        Self {
            inverse: false,
            predicate,
            value: value.map(Box::new),
            cardinality,
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub predicate: NamedNode,
    pub object: Term,
}
