//! Forward-chaining entailment regimes applied to resolved data.

use crate::error::InferenceEngineError;
use crate::rdf::graph::{RdfGraph, as_subject};
use crate::rdf::vocab::owl;
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{NamedNode, NamedNodeRef, Term, Triple};
use serde::Serialize;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

const MAX_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum InferenceEngine {
    None,
    #[strum(to_string = "RDFS")]
    #[serde(rename = "RDFS")]
    Rdfs,
    #[strum(to_string = "OWL")]
    #[serde(rename = "OWL")]
    Owl,
}

impl InferenceEngine {
    /// An absent or blank name means no entailment.
    pub fn parse(name: Option<&str>) -> Result<Self, InferenceEngineError> {
        match name.map(str::trim).filter(|name| !name.is_empty()) {
            None => Ok(InferenceEngine::None),
            Some(name) => InferenceEngine::from_str(name).map_err(|_| InferenceEngineError {
                name: name.to_string(),
                supported: Self::supported(),
            }),
        }
    }

    pub fn supported() -> String {
        Self::iter()
            .map(|engine| engine.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Extends `graph` with the entailments of this regime until fixpoint.
    /// Returns the number of added triples.
    pub fn apply(&self, graph: &mut RdfGraph) -> usize {
        if *self == InferenceEngine::None {
            return 0;
        }
        let before = graph.len();
        for round in 0..MAX_ROUNDS {
            let mut derived = rdfs_round(graph);
            if *self == InferenceEngine::Owl {
                derived.extend(owl_round(graph));
            }
            let added = derived
                .iter()
                .filter(|triple| graph.insert(triple))
                .count();
            if added == 0 {
                break;
            }
            if round + 1 == MAX_ROUNDS {
                tracing::warn!(engine = %self, "entailment stopped before reaching a fixpoint");
            }
        }
        let added = graph.len() - before;
        tracing::debug!(engine = %self, added, "applied entailment");
        added
    }
}

fn triple(subject: &Term, predicate: NamedNodeRef<'_>, object: &Term) -> Option<Triple> {
    as_subject(subject).map(|subject| Triple::new(subject, predicate.into_owned(), object.clone()))
}

fn triple_with(subject: &Term, predicate: &NamedNode, object: &Term) -> Option<Triple> {
    triple(subject, predicate.as_ref(), object)
}

fn named(term: &Term) -> Option<&NamedNode> {
    match term {
        Term::NamedNode(node) => Some(node),
        _ => None,
    }
}

/// rdfs2, rdfs3, rdfs5, rdfs7, rdfs9 and rdfs11.
fn rdfs_round(graph: &RdfGraph) -> Vec<Triple> {
    let mut derived = Vec::new();

    for (property, class) in graph.pairs(rdfs::DOMAIN) {
        let Some(property) = named(&property) else { continue };
        for (subject, _) in graph.pairs(property.as_ref()) {
            derived.extend(triple(&subject, rdf::TYPE, &class));
        }
    }

    for (property, class) in graph.pairs(rdfs::RANGE) {
        let Some(property) = named(&property) else { continue };
        for (_, object) in graph.pairs(property.as_ref()) {
            derived.extend(triple(&object, rdf::TYPE, &class));
        }
    }

    let sub_properties = graph.pairs(rdfs::SUB_PROPERTY_OF);
    for (sub, sup) in &sub_properties {
        for (middle, top) in &sub_properties {
            if sup == middle {
                derived.extend(triple(sub, rdfs::SUB_PROPERTY_OF, top));
            }
        }
        let (Some(sub), Some(sup)) = (named(sub), named(sup)) else { continue };
        for (subject, object) in graph.pairs(sub.as_ref()) {
            derived.extend(triple_with(&subject, sup, &object));
        }
    }

    let sub_classes = graph.pairs(rdfs::SUB_CLASS_OF);
    for (sub, sup) in &sub_classes {
        for (middle, top) in &sub_classes {
            if sup == middle {
                derived.extend(triple(sub, rdfs::SUB_CLASS_OF, top));
            }
        }
        for instance in graph.subjects_with(rdf::TYPE, sub) {
            derived.extend(triple(&instance, rdf::TYPE, sup));
        }
    }

    derived
}

/// inverseOf, symmetric and transitive properties, equivalences and sameAs.
fn owl_round(graph: &RdfGraph) -> Vec<Triple> {
    let mut derived = Vec::new();

    for (left, right) in graph.pairs(owl::INVERSE_OF) {
        let (Some(left), Some(right)) = (named(&left), named(&right)) else { continue };
        for (subject, object) in graph.pairs(left.as_ref()) {
            derived.extend(triple_with(&object, right, &subject));
        }
        for (subject, object) in graph.pairs(right.as_ref()) {
            derived.extend(triple_with(&object, left, &subject));
        }
    }

    for property in graph.subjects_with(rdf::TYPE, &Term::from(owl::SYMMETRIC_PROPERTY.into_owned())) {
        let Some(property) = named(&property) else { continue };
        for (subject, object) in graph.pairs(property.as_ref()) {
            derived.extend(triple_with(&object, property, &subject));
        }
    }

    for property in graph.subjects_with(rdf::TYPE, &Term::from(owl::TRANSITIVE_PROPERTY.into_owned())) {
        let Some(property) = named(&property) else { continue };
        let pairs = graph.pairs(property.as_ref());
        for (subject, middle) in &pairs {
            for object in graph.objects(middle, property.as_ref()) {
                derived.extend(triple_with(subject, property, &object));
            }
        }
    }

    for (left, right) in graph.pairs(owl::EQUIVALENT_CLASS) {
        derived.extend(triple(&left, rdfs::SUB_CLASS_OF, &right));
        derived.extend(triple(&right, rdfs::SUB_CLASS_OF, &left));
    }

    for (left, right) in graph.pairs(owl::EQUIVALENT_PROPERTY) {
        derived.extend(triple(&left, rdfs::SUB_PROPERTY_OF, &right));
        derived.extend(triple(&right, rdfs::SUB_PROPERTY_OF, &left));
    }

    for (left, right) in graph.pairs(owl::SAME_AS) {
        derived.extend(triple(&right, owl::SAME_AS, &left));
        for (predicate, object) in graph.outgoing(&left) {
            derived.extend(triple_with(&right, &predicate, &object));
        }
        for (predicate, subject) in graph.incoming(&left) {
            derived.extend(triple_with(&subject, &predicate, &right));
        }
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::io::RdfFormat;

    fn graph(turtle: &str) -> RdfGraph {
        let text = format!(
            "@prefix : <http://example.org/> .\n@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n@prefix owl: <http://www.w3.org/2002/07/owl#> .\n{turtle}"
        );
        RdfGraph::parse(text.as_bytes(), RdfFormat::Turtle, None).unwrap()
    }

    fn ex(local: &str) -> Term {
        Term::NamedNode(NamedNode::new(format!("http://example.org/{local}")).unwrap())
    }

    #[test]
    fn unknown_engine_names_are_errors() {
        let error = InferenceEngine::parse(Some("bogus")).unwrap_err();
        assert_eq!(error.name, "bogus");
        assert!(error.supported.contains("RDFS"));
    }

    #[test]
    fn blank_names_mean_none() {
        assert_eq!(InferenceEngine::parse(None).unwrap(), InferenceEngine::None);
        assert_eq!(InferenceEngine::parse(Some(" ")).unwrap(), InferenceEngine::None);
        assert_eq!(InferenceEngine::parse(Some("rdfs")).unwrap(), InferenceEngine::Rdfs);
    }

    #[test]
    fn rdfs_follows_subclass_chains() {
        let mut data = graph(":A rdfs:subClassOf :B . :B rdfs:subClassOf :C . :x a :A .");
        let added = InferenceEngine::Rdfs.apply(&mut data);
        assert!(added >= 3);
        let types = data.types_of(&ex("x"));
        assert!(types.iter().any(|class| class.as_str() == "http://example.org/C"));
    }

    #[test]
    fn rdfs_applies_domain_and_range() {
        let mut data = graph(":knows rdfs:domain :Person ; rdfs:range :Agent . :a :knows :b .");
        InferenceEngine::Rdfs.apply(&mut data);
        assert_eq!(data.types_of(&ex("a"))[0].as_str(), "http://example.org/Person");
        assert_eq!(data.types_of(&ex("b"))[0].as_str(), "http://example.org/Agent");
    }

    #[test]
    fn owl_handles_inverse_and_transitive_properties() {
        let mut data = graph(
            ":parentOf owl:inverseOf :childOf . :ancestorOf a owl:TransitiveProperty .\n:a :parentOf :b . :a :ancestorOf :b . :b :ancestorOf :c .",
        );
        InferenceEngine::Owl.apply(&mut data);
        let child_of = NamedNodeRef::new("http://example.org/childOf").unwrap();
        let ancestor_of = NamedNodeRef::new("http://example.org/ancestorOf").unwrap();
        assert_eq!(data.objects(&ex("b"), child_of), vec![ex("a")]);
        assert!(data.objects(&ex("a"), ancestor_of).contains(&ex("c")));
    }

    #[test]
    fn none_leaves_the_graph_untouched() {
        let mut data = graph(":A rdfs:subClassOf :B . :x a :A .");
        assert_eq!(InferenceEngine::None.apply(&mut data), 0);
        assert_eq!(data.len(), 2);
    }
}
