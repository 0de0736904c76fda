//! Shape maps: the association of node selectors with shape labels.
//!
//! A [`QueryShapeMap`] is what a client asks for; [`QueryShapeMap::fix`]
//! turns it into concrete `(node, shape)` pairs against a graph, and engines
//! answer with a [`ResultShapeMap`].

mod parser;

pub use parser::{parse_node_selector, parse_shape_label};

use crate::format::ShapeMapFormat;
use crate::rdf::graph::{RdfGraph, display_term};
use crate::rdf::prefix::PrefixMap;
use crate::syntax::SyntaxError;
use indexmap::IndexSet;
use oxigraph::model::{BlankNode, NamedNode, Term};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// Identifier of a shape in a schema. `Start` designates the schema's start
/// shape expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeLabel {
    Iri(NamedNode),
    BNode(BlankNode),
    Start,
}

impl ShapeLabel {
    pub fn display(&self, prefixes: &PrefixMap) -> String {
        match self {
            ShapeLabel::Iri(iri) => prefixes.qualify(iri.as_str()),
            other => other.to_string(),
        }
    }

    pub fn as_term(&self) -> Option<Term> {
        match self {
            ShapeLabel::Iri(iri) => Some(Term::NamedNode(iri.clone())),
            ShapeLabel::BNode(node) => Some(Term::BlankNode(node.clone())),
            ShapeLabel::Start => None,
        }
    }
}

impl fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeLabel::Iri(iri) => write!(f, "{iri}"),
            ShapeLabel::BNode(node) => write!(f, "{node}"),
            ShapeLabel::Start => f.write_str("START"),
        }
    }
}

impl From<NamedNode> for ShapeLabel {
    fn from(iri: NamedNode) -> Self {
        ShapeLabel::Iri(iri)
    }
}

/// Selects focus nodes in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeSelector {
    Node(Term),
    /// `{FOCUS p o}`, `o` may be the wildcard `_`.
    SubjectsOf {
        predicate: NamedNode,
        object: Option<Term>,
    },
    /// `{s p FOCUS}`, `s` may be the wildcard `_`.
    ObjectsOf {
        subject: Option<Term>,
        predicate: NamedNode,
    },
}

impl NodeSelector {
    pub fn select(&self, graph: &RdfGraph) -> Vec<Term> {
        match self {
            NodeSelector::Node(node) => vec![node.clone()],
            NodeSelector::SubjectsOf { predicate, object } => {
                let selected = match object {
                    Some(object) => graph.subjects_with(predicate.as_ref(), object),
                    None => graph
                        .pairs(predicate.as_ref())
                        .into_iter()
                        .map(|(subject, _)| subject)
                        .collect(),
                };
                dedup(selected)
            }
            NodeSelector::ObjectsOf { subject, predicate } => {
                let selected = match subject {
                    Some(subject) => graph.objects(subject, predicate.as_ref()),
                    None => graph
                        .pairs(predicate.as_ref())
                        .into_iter()
                        .map(|(_, object)| object)
                        .collect(),
                };
                dedup(selected)
            }
        }
    }

    pub fn display(&self, prefixes: &PrefixMap) -> String {
        let optional = |term: &Option<Term>| match term {
            Some(term) => display_term(term, prefixes),
            None => "_".to_string(),
        };
        match self {
            NodeSelector::Node(node) => display_term(node, prefixes),
            NodeSelector::SubjectsOf { predicate, object } => format!(
                "{{FOCUS {} {}}}",
                prefixes.qualify(predicate.as_str()),
                optional(object)
            ),
            NodeSelector::ObjectsOf { subject, predicate } => format!(
                "{{{} {} FOCUS}}",
                optional(subject),
                prefixes.qualify(predicate.as_str())
            ),
        }
    }
}

fn dedup(nodes: Vec<Term>) -> Vec<Term> {
    nodes.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Association {
    pub node: NodeSelector,
    pub shape: ShapeLabel,
}

/// A parsed shape map bound to the prefix maps used to read it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryShapeMap {
    pub associations: Vec<Association>,
    pub node_prefixes: PrefixMap,
    pub shape_prefixes: PrefixMap,
}

impl QueryShapeMap {
    /// Node selectors are read with the data prefixes first and shape labels
    /// with the schema prefixes first; each falls back on the other map.
    pub fn parse(
        text: &str,
        format: ShapeMapFormat,
        data_prefixes: &PrefixMap,
        schema_prefixes: &PrefixMap,
        base: Option<&str>,
    ) -> Result<Self, SyntaxError> {
        let mut node_prefixes = data_prefixes.clone();
        node_prefixes.merge(schema_prefixes);
        let mut shape_prefixes = schema_prefixes.clone();
        shape_prefixes.merge(data_prefixes);
        let associations = match format {
            ShapeMapFormat::Compact => {
                parser::parse_compact(text, &node_prefixes, &shape_prefixes, base)?
            }
            ShapeMapFormat::Json => parser::parse_json(text, &node_prefixes, &shape_prefixes, base)?,
        };
        Ok(Self {
            associations,
            node_prefixes,
            shape_prefixes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn push(&mut self, node: NodeSelector, shape: ShapeLabel) {
        self.associations.push(Association { node, shape });
    }

    /// Concrete `(node, shape)` pairs, without duplicates.
    pub fn fix(&self, graph: &RdfGraph) -> Vec<(Term, ShapeLabel)> {
        let mut pairs = IndexSet::new();
        for association in &self.associations {
            for node in association.node.select(graph) {
                pairs.insert((node, association.shape.clone()));
            }
        }
        pairs.into_iter().collect()
    }

    /// Nodes named explicitly, ignoring pattern selectors.
    pub fn explicit_nodes(&self) -> Vec<Term> {
        self.associations
            .iter()
            .filter_map(|association| match &association.node {
                NodeSelector::Node(node) => Some(node.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_compact(&self) -> String {
        self.associations
            .iter()
            .map(|association| {
                format!(
                    "{}@{}",
                    association.node.display(&self.node_prefixes),
                    association.shape.display(&self.shape_prefixes)
                )
            })
            .collect::<Vec<_>>()
            .join(",\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.associations
                .iter()
                .map(|association| {
                    serde_json::json!({
                        "node": association.node.display(&PrefixMap::new()),
                        "shape": association.shape.display(&PrefixMap::new()),
                    })
                })
                .collect(),
        )
    }

    pub fn serialize_as(&self, format: ShapeMapFormat) -> String {
        match format {
            ShapeMapFormat::Compact => self.to_compact(),
            ShapeMapFormat::Json => self.to_json().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Conformant,
    Nonconformant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub node: Term,
    pub shape: ShapeLabel,
    pub status: Status,
    pub reason: Option<String>,
}

/// Per node and shape outcome of a validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultShapeMap {
    entries: Vec<ResultEntry>,
    node_prefixes: PrefixMap,
    shape_prefixes: PrefixMap,
}

impl ResultShapeMap {
    pub fn new(node_prefixes: PrefixMap, shape_prefixes: PrefixMap) -> Self {
        Self {
            entries: Vec::new(),
            node_prefixes,
            shape_prefixes,
        }
    }

    pub fn conformant(&mut self, node: Term, shape: ShapeLabel) {
        self.entries.push(ResultEntry {
            node,
            shape,
            status: Status::Conformant,
            reason: None,
        });
    }

    pub fn nonconformant(&mut self, node: Term, shape: ShapeLabel, reason: impl Into<String>) {
        self.entries.push(ResultEntry {
            node,
            shape,
            status: Status::Nonconformant,
            reason: Some(reason.into()),
        });
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn conforms(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.status == Status::Conformant)
    }

    pub fn status(&self, node: &Term, shape: &ShapeLabel) -> Option<Status> {
        self.entries
            .iter()
            .find(|entry| &entry.node == node && &entry.shape == shape)
            .map(|entry| entry.status)
    }

    pub fn node_display(&self, entry: &ResultEntry) -> String {
        display_term(&entry.node, &self.node_prefixes)
    }

    pub fn shape_display(&self, entry: &ResultEntry) -> String {
        entry.shape.display(&self.shape_prefixes)
    }

    pub fn to_compact(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let negation = match entry.status {
                    Status::Conformant => "",
                    Status::Nonconformant => "!",
                };
                format!(
                    "{}@{negation}{}",
                    self.node_display(entry),
                    self.shape_display(entry)
                )
            })
            .collect::<Vec<_>>()
            .join(",\n")
    }
}

impl From<&QueryShapeMap> for ResultShapeMap {
    fn from(query: &QueryShapeMap) -> Self {
        Self::new(query.node_prefixes.clone(), query.shape_prefixes.clone())
    }
}

struct EntryView<'a> {
    map: &'a ResultShapeMap,
    entry: &'a ResultEntry,
}

impl Serialize for EntryView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResultEntry", 4)?;
        state.serialize_field("node", &self.map.node_display(self.entry))?;
        state.serialize_field("shape", &self.map.shape_display(self.entry))?;
        state.serialize_field("status", &self.entry.status)?;
        state.serialize_field("reason", &self.entry.reason)?;
        state.end()
    }
}

impl Serialize for ResultShapeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter().map(|entry| EntryView { map: self, entry }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::io::RdfFormat;

    fn prefixes() -> PrefixMap {
        let mut map = PrefixMap::new();
        map.insert("ex", "http://example.org/");
        map
    }

    fn data() -> RdfGraph {
        RdfGraph::parse(
            b"@prefix ex: <http://example.org/> .\nex:alice a ex:Person ; ex:knows ex:bob .\nex:bob a ex:Person .\nex:carol ex:knows ex:bob .",
            RdfFormat::Turtle,
            None,
        )
        .unwrap()
    }

    #[test]
    fn fixes_pattern_selectors_against_the_graph() {
        let map = QueryShapeMap::parse(
            "{FOCUS a ex:Person}@ex:PersonShape, {_ ex:knows FOCUS}@ex:Known",
            ShapeMapFormat::Compact,
            &prefixes(),
            &prefixes(),
            None,
        )
        .unwrap();
        let pairs = map.fix(&data());
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().any(|(node, shape)| node.to_string() == "<http://example.org/bob>"
            && shape.to_string() == "<http://example.org/Known>"));
    }

    #[test]
    fn compact_output_uses_prefixes() {
        let map = QueryShapeMap::parse(
            "<http://example.org/alice>@<http://example.org/S>",
            ShapeMapFormat::Compact,
            &prefixes(),
            &prefixes(),
            None,
        )
        .unwrap();
        assert_eq!(map.to_compact(), "ex:alice@ex:S");
    }

    #[test]
    fn result_maps_serialize_with_status() {
        let mut result = ResultShapeMap::new(prefixes(), prefixes());
        let alice = Term::NamedNode(NamedNode::new("http://example.org/alice").unwrap());
        let shape = ShapeLabel::Iri(NamedNode::new("http://example.org/S").unwrap());
        result.nonconformant(alice.clone(), shape.clone(), "missing ex:name");
        assert!(!result.conforms());
        assert_eq!(result.status(&alice, &shape), Some(Status::Nonconformant));
        assert_eq!(result.to_compact(), "ex:alice@!ex:S");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json[0]["status"], "nonconformant");
        assert_eq!(json[0]["shape"], "ex:S");
    }
}
