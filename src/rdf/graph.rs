use crate::error::{ResolutionError, SerializationError};
use crate::rdf::prefix::PrefixMap;
use indexmap::IndexSet;
use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::dataset::CanonicalizationAlgorithm;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{
    Graph, NamedNode, NamedNodeRef, NamedOrBlankNode,
    NamedOrBlankNodeRef, Term, TermRef, Triple, TripleRef,
};

/// An in-memory RDF graph together with the prefixes its source declared.
#[derive(Debug, Clone, Default)]
pub struct RdfGraph {
    graph: Graph,
    prefixes: PrefixMap,
}

impl RdfGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut graph = Self::new();
        for triple in triples {
            graph.insert(&triple);
        }
        graph
    }

    /// Parses `input` in `format`. Blank nodes are renamed so graphs parsed
    /// independently never share blank node identifiers.
    pub fn parse(input: &[u8], format: RdfFormat, base: Option<&str>) -> Result<Self, ResolutionError> {
        let mut parser = RdfParser::from_format(format).rename_blank_nodes();
        if let Some(base) = base {
            parser = parser
                .with_base_iri(base)
                .map_err(|error| ResolutionError::invalid_iri(base, error))?;
        }
        let mut graph = Graph::new();
        let mut prefixes = PrefixMap::new();
        let mut reader = parser.for_reader(input);
        while let Some(quad) = reader.next() {
            let quad = quad.map_err(|error| ResolutionError::parse(format.name(), error))?;
            graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
            // JSON-LD only exposes the context that is in scope for the current quad.
            collect_prefixes(&mut prefixes, reader.prefixes());
        }
        collect_prefixes(&mut prefixes, reader.prefixes());
        Ok(Self { graph, prefixes })
    }

    pub fn serialize(&self, format: RdfFormat) -> Result<String, SerializationError> {
        let mut serializer = RdfSerializer::from_format(format);
        for (prefix, namespace) in self.prefixes.iter() {
            serializer = serializer
                .with_prefix(prefix, namespace)
                .map_err(|error| SerializationError::new(format.name(), error))?;
        }
        let mut writer = serializer.for_writer(Vec::new());
        for triple in self.graph.iter() {
            writer
                .serialize_triple(triple)
                .map_err(|error| SerializationError::new(format.name(), error))?;
        }
        let bytes = writer
            .finish()
            .map_err(|error| SerializationError::new(format.name(), error))?;
        String::from_utf8(bytes).map_err(|error| SerializationError::new(format.name(), error))
    }

    pub fn prefix_map(&self) -> &PrefixMap {
        &self.prefixes
    }

    pub fn prefix_map_mut(&mut self) -> &mut PrefixMap {
        &mut self.prefixes
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TripleRef<'_>> {
        self.graph.iter()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.graph.contains(triple)
    }

    pub fn insert(&mut self, triple: &Triple) -> bool {
        self.graph.insert(triple)
    }

    /// Unions `other` into this graph, prefixes included.
    pub fn extend_from(&mut self, other: &RdfGraph) {
        for triple in other.graph.iter() {
            self.graph.insert(triple);
        }
        self.prefixes.merge(&other.prefixes);
    }

    /// Same triple set up to blank node renaming.
    pub fn is_isomorphic(&self, other: &RdfGraph) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut left = self.graph.clone();
        let mut right = other.graph.clone();
        left.canonicalize(CanonicalizationAlgorithm::Unstable);
        right.canonicalize(CanonicalizationAlgorithm::Unstable);
        left == right
    }

    /// Distinct subjects in iteration order.
    pub fn subjects(&self) -> IndexSet<Term> {
        self.graph
            .iter()
            .map(|triple| Term::from(triple.subject.into_owned()))
            .collect()
    }

    pub fn predicates(&self) -> IndexSet<NamedNode> {
        self.graph
            .iter()
            .map(|triple| triple.predicate.into_owned())
            .collect()
    }

    /// Every subject and object.
    pub fn nodes(&self) -> IndexSet<Term> {
        let mut nodes = IndexSet::new();
        for triple in self.graph.iter() {
            nodes.insert(Term::from(triple.subject.into_owned()));
            nodes.insert(triple.object.into_owned());
        }
        nodes
    }

    pub fn contains_node(&self, node: &Term) -> bool {
        let as_subject = subject_ref(node)
            .map(|subject| self.graph.triples_for_subject(subject).next().is_some())
            .unwrap_or(false);
        as_subject || self.graph.triples_for_object(node.as_ref()).next().is_some()
    }

    /// Outgoing arcs of `node` as `(predicate, object)` pairs.
    pub fn outgoing(&self, node: &Term) -> Vec<(NamedNode, Term)> {
        match subject_ref(node) {
            Some(subject) => self
                .graph
                .triples_for_subject(subject)
                .map(|triple| (triple.predicate.into_owned(), triple.object.into_owned()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Incoming arcs of `node` as `(predicate, subject)` pairs.
    pub fn incoming(&self, node: &Term) -> Vec<(NamedNode, Term)> {
        self.graph
            .triples_for_object(node.as_ref())
            .map(|triple| {
                (
                    triple.predicate.into_owned(),
                    Term::from(triple.subject.into_owned()),
                )
            })
            .collect()
    }

    pub fn objects(&self, node: &Term, predicate: NamedNodeRef<'_>) -> Vec<Term> {
        match subject_ref(node) {
            Some(subject) => self
                .graph
                .objects_for_subject_predicate(subject, predicate)
                .map(TermRef::into_owned)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn object(&self, node: &Term, predicate: NamedNodeRef<'_>) -> Option<Term> {
        self.objects(node, predicate).into_iter().next()
    }

    pub fn subjects_with(&self, predicate: NamedNodeRef<'_>, object: &Term) -> Vec<Term> {
        self.graph
            .subjects_for_predicate_object(predicate, object.as_ref())
            .map(|subject| Term::from(subject.into_owned()))
            .collect()
    }

    /// Subjects and objects of every triple using `predicate`.
    pub fn pairs(&self, predicate: NamedNodeRef<'_>) -> Vec<(Term, Term)> {
        self.graph
            .triples_for_predicate(predicate)
            .map(|triple| {
                (
                    Term::from(triple.subject.into_owned()),
                    triple.object.into_owned(),
                )
            })
            .collect()
    }

    pub fn types_of(&self, node: &Term) -> Vec<NamedNode> {
        self.objects(node, rdf::TYPE)
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(class) => Some(class),
                _ => None,
            })
            .collect()
    }

    /// Members of an RDF collection starting at `head`.
    pub fn list_items(&self, head: &Term) -> Vec<Term> {
        let mut items = Vec::new();
        let mut visited = IndexSet::new();
        let mut current = head.clone();
        while current.as_ref() != TermRef::from(rdf::NIL) && visited.insert(current.clone()) {
            if let Some(first) = self.object(&current, rdf::FIRST) {
                items.push(first);
            }
            match self.object(&current, rdf::REST) {
                Some(rest) => current = rest,
                None => break,
            }
        }
        items
    }
}

impl From<Graph> for RdfGraph {
    fn from(graph: Graph) -> Self {
        Self {
            graph,
            prefixes: PrefixMap::new(),
        }
    }
}

/// Views a term as a triple subject when it can be one.
pub fn subject_ref(term: &Term) -> Option<NamedOrBlankNodeRef<'_>> {
    match term {
        Term::NamedNode(node) => Some(node.as_ref().into()),
        Term::BlankNode(node) => Some(node.as_ref().into()),
        _ => None,
    }
}

pub fn as_subject(term: &Term) -> Option<NamedOrBlankNode> {
    subject_ref(term).map(NamedOrBlankNodeRef::into_owned)
}

/// Compact display of a term, using `prefixes` for IRIs.
pub fn display_term(term: &Term, prefixes: &PrefixMap) -> String {
    match term {
        Term::NamedNode(node) => prefixes.qualify(node.as_str()),
        other => other.to_string(),
    }
}


fn collect_prefixes<'a>(map: &mut PrefixMap, declared: impl Iterator<Item = (&'a str, &'a str)>) {
    for (prefix, namespace) in declared {
        if map.get(prefix) != Some(namespace) {
            map.insert(prefix, namespace);
        }
    }
}
