//! SHACL Core validation over an in-memory data graph.

use super::{Constraint, NodeShape, PropertyShape, Severity, ShaclSchema, Target};
use crate::rdf::graph::{RdfGraph, display_term};
use crate::schema::shex::{compile_pattern, number, numeric_value};
use crate::shapemap::{ResultShapeMap, ShapeLabel};
use indexmap::IndexSet;
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{Literal, NamedNode, Term};
use regex::Regex;
use serde::Serialize;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Validation Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    /// The node that caused the violation
    focus_node: String,
    /// The property path (if applicable)
    result_path: Option<String>,
    /// The value that violated the constraint
    value: Option<String>,
    message: String,
    severity: Severity,
    /// The shape whose constraint was violated
    source_shape: String,
    /// The constraint component
    source_constraint: Option<String>,
}

impl ReportEntry {
    pub fn new(focus_node: String, message: String, severity: Severity, source_shape: String) -> Self {
        Self {
            focus_node,
            result_path: None,
            value: None,
            message,
            severity,
            source_shape,
            source_constraint: None,
        }
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.result_path = Some(path);
        self
    }

    pub fn with_value(mut self, value: String) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_constraint(mut self, constraint: String) -> Self {
        self.source_constraint = Some(constraint);
        self
    }

    pub fn focus_node(&self) -> &str {
        &self.focus_node
    }

    pub fn result_path(&self) -> Option<&str> {
        self.result_path.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn source_shape(&self) -> &str {
        &self.source_shape
    }

    pub fn source_constraint(&self) -> Option<&str> {
        self.source_constraint.as_deref()
    }
}

/// Results of one validation run. Any result, whatever its severity, makes
/// the report non-conforming.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    results: Vec<ReportEntry>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: ReportEntry) {
        self.results.push(result);
    }

    pub fn conforms(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[ReportEntry] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ReportEntry> {
        self.results
    }

    pub fn violations(&self) -> impl Iterator<Item = &ReportEntry> {
        self.by_severity(Severity::Violation)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportEntry> {
        self.by_severity(Severity::Warning)
    }

    fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &ReportEntry> {
        self.results
            .iter()
            .filter(move |result| result.severity == severity)
    }
}

// =============================================================================
// Validator
// =============================================================================

pub struct ShaclValidator<'a> {
    schema: &'a ShaclSchema,
    graph: &'a RdfGraph,
    /// `(focus, shape)` pairs being checked through `sh:node`.
    stack: RefCell<Vec<(Term, Term)>>,
    regexes: RefCell<HashMap<(String, String), Result<Regex, String>>>,
}

impl<'a> ShaclValidator<'a> {
    pub fn new(schema: &'a ShaclSchema, graph: &'a RdfGraph) -> Self {
        Self {
            schema,
            graph,
            stack: RefCell::new(Vec::new()),
            regexes: RefCell::new(HashMap::new()),
        }
    }

    /// Validates every focus node selected by the shapes' target declarations.
    pub fn validate_targets(&self) -> (ValidationReport, ResultShapeMap) {
        let mut report = ValidationReport::new();
        let mut shape_map = self.result_map();
        for shape in self.schema.shapes() {
            if shape.deactivated {
                continue;
            }
            for focus in self.focus_nodes(shape) {
                let results = self.validate_shape(&focus, shape);
                self.record(&mut shape_map, focus, shape, &results);
                results.into_iter().for_each(|result| report.add_result(result));
            }
        }
        (report, shape_map)
    }

    /// Validates the given `(node, shape)` pairs, ignoring targets.
    pub fn validate_pairs(&self, pairs: &[(Term, ShapeLabel)]) -> (ValidationReport, ResultShapeMap) {
        let mut report = ValidationReport::new();
        let mut shape_map = self.result_map();
        for (focus, label) in pairs {
            let Some(shape) = label.as_term().and_then(|id| self.schema.shape(&id)) else {
                let reason = match label {
                    ShapeLabel::Start => "SHACL shapes graphs have no start shape".to_string(),
                    other => format!(
                        "shape {} is not declared in the shapes graph",
                        other.display(self.schema.prefix_map())
                    ),
                };
                shape_map.nonconformant(focus.clone(), label.clone(), reason);
                continue;
            };
            let results = self.validate_shape(focus, shape);
            self.record(&mut shape_map, focus.clone(), shape, &results);
            results.into_iter().for_each(|result| report.add_result(result));
        }
        (report, shape_map)
    }

    fn result_map(&self) -> ResultShapeMap {
        ResultShapeMap::new(
            self.graph.prefix_map().clone(),
            self.schema.prefix_map().clone(),
        )
    }

    fn record(&self, map: &mut ResultShapeMap, focus: Term, shape: &NodeShape, results: &[ReportEntry]) {
        let label = match &shape.id {
            Term::BlankNode(node) => ShapeLabel::BNode(node.clone()),
            Term::NamedNode(iri) => ShapeLabel::Iri(iri.clone()),
            _ => return,
        };
        if results.is_empty() {
            map.conformant(focus, label);
        } else {
            let reason = results
                .iter()
                .map(ReportEntry::message)
                .collect::<Vec<_>>()
                .join("; ");
            map.nonconformant(focus, label, reason);
        }
    }

    pub fn focus_nodes(&self, shape: &NodeShape) -> IndexSet<Term> {
        let mut nodes = IndexSet::new();
        for target in &shape.targets {
            match target {
                Target::Node(node) => {
                    nodes.insert(node.clone());
                }
                Target::Class(class) => {
                    nodes.extend(self.instances_of(class));
                }
                Target::SubjectsOf(predicate) => {
                    nodes.extend(self.graph.pairs(predicate.as_ref()).into_iter().map(|(s, _)| s));
                }
                Target::ObjectsOf(predicate) => {
                    nodes.extend(self.graph.pairs(predicate.as_ref()).into_iter().map(|(_, o)| o));
                }
            }
        }
        nodes
    }

    /// Instances of `class` or of any of its `rdfs:subClassOf*` subclasses.
    fn instances_of(&self, class: &NamedNode) -> IndexSet<Term> {
        let mut classes = IndexSet::new();
        let mut pending = vec![Term::NamedNode(class.clone())];
        while let Some(current) = pending.pop() {
            if classes.insert(current.clone()) {
                pending.extend(self.graph.subjects_with(rdfs::SUB_CLASS_OF, &current));
            }
        }
        classes
            .iter()
            .flat_map(|class| self.graph.subjects_with(rdf::TYPE, class))
            .collect()
    }

    fn is_instance(&self, node: &Term, class: &NamedNode) -> bool {
        let mut seen = HashSet::new();
        let mut pending = self
            .graph
            .objects(node, rdf::TYPE)
            .into_iter()
            .collect::<Vec<_>>();
        while let Some(current) = pending.pop() {
            if current == Term::NamedNode(class.clone()) {
                return true;
            }
            if seen.insert(current.clone()) {
                pending.extend(self.graph.objects(&current, rdfs::SUB_CLASS_OF));
            }
        }
        false
    }

    fn validate_shape(&self, focus: &Term, shape: &NodeShape) -> Vec<ReportEntry> {
        if shape.deactivated {
            return Vec::new();
        }
        let key = (focus.clone(), shape.id.clone());
        if self.stack.borrow().contains(&key) {
            return Vec::new();
        }
        self.stack.borrow_mut().push(key);

        let source = self.schema.display(&shape.id);
        let values = [focus.clone()];
        let mut results = Vec::new();
        for constraint in &shape.constraints {
            for (value, message) in self.check(constraint, &values) {
                let mut result = ReportEntry::new(
                    self.show(focus),
                    shape.message.clone().unwrap_or(message),
                    shape.severity,
                    source.clone(),
                )
                .with_constraint(constraint.component().to_string());
                if let Some(value) = value {
                    result = result.with_value(self.show(&value));
                }
                results.push(result);
            }
        }
        for property in &shape.properties {
            results.extend(self.validate_property(focus, &source, property));
        }
        if shape.closed {
            let allowed = shape.allowed_predicates();
            for (predicate, object) in self.graph.outgoing(focus) {
                if allowed.contains(&predicate) {
                    continue;
                }
                let path = self.schema.prefix_map().qualify(predicate.as_str());
                results.push(
                    ReportEntry::new(
                        self.show(focus),
                        shape
                            .message
                            .clone()
                            .unwrap_or_else(|| format!("Predicate {path} is not allowed on closed shape")),
                        shape.severity,
                        source.clone(),
                    )
                    .with_path(path)
                    .with_value(self.show(&object))
                    .with_constraint("sh:ClosedConstraintComponent".to_string()),
                );
            }
        }

        self.stack.borrow_mut().pop();
        results
    }

    fn validate_property(&self, focus: &Term, source: &str, property: &PropertyShape) -> Vec<ReportEntry> {
        if property.deactivated {
            return Vec::new();
        }
        let values = property.path.values(self.graph, focus);
        let path = property.path.display(self.schema.prefix_map());
        let mut results = Vec::new();
        for constraint in &property.constraints {
            for (value, message) in self.check(constraint, &values) {
                let mut result = ReportEntry::new(
                    self.show(focus),
                    property.message.clone().unwrap_or(message),
                    property.severity,
                    source.to_string(),
                )
                .with_path(path.clone())
                .with_constraint(constraint.component().to_string());
                if let Some(value) = value {
                    result = result.with_value(self.show(&value));
                }
                results.push(result);
            }
        }
        results
    }

    /// Failures of `constraint` over the value nodes, each with the offending
    /// value when there is one.
    fn check(&self, constraint: &Constraint, values: &[Term]) -> Vec<(Option<Term>, String)> {
        match constraint {
            Constraint::MinCount(min) => {
                if values.len() < *min {
                    vec![(None, format!("Property must have at least {min} value(s), found {}", values.len()))]
                } else {
                    Vec::new()
                }
            }
            Constraint::MaxCount(max) => {
                if values.len() > *max {
                    vec![(None, format!("Property must have at most {max} value(s), found {}", values.len()))]
                } else {
                    Vec::new()
                }
            }
            Constraint::HasValue(expected) => {
                if values.contains(expected) {
                    Vec::new()
                } else {
                    vec![(None, format!("Missing expected value {}", self.show_schema(expected)))]
                }
            }
            Constraint::UniqueLang => {
                let mut seen = HashSet::new();
                let mut reported = HashSet::new();
                let mut failures = Vec::new();
                for value in values {
                    let Term::Literal(literal) = value else { continue };
                    let Some(language) = literal.language() else { continue };
                    let language = language.to_ascii_lowercase();
                    if !seen.insert(language.clone()) && reported.insert(language.clone()) {
                        failures.push((
                            Some(value.clone()),
                            format!("Language tag '{language}' is used more than once"),
                        ));
                    }
                }
                failures
            }
            other => values
                .iter()
                .filter_map(|value| {
                    self.check_value(other, value)
                        .err()
                        .map(|message| (Some(value.clone()), message))
                })
                .collect(),
        }
    }

    fn check_value(&self, constraint: &Constraint, value: &Term) -> Result<(), String> {
        match constraint {
            Constraint::Class(class) => {
                if self.is_instance(value, class) {
                    Ok(())
                } else {
                    Err(format!("Value must be an instance of {}", self.show_iri(class)))
                }
            }
            Constraint::Datatype(datatype) => match value {
                Term::Literal(literal) if literal.datatype() == datatype.as_ref() && well_formed(literal) => Ok(()),
                _ => Err(format!("Value must have datatype {}", self.show_iri(datatype))),
            },
            Constraint::NodeKind(kind) => {
                if kind.matches(value) {
                    Ok(())
                } else {
                    Err(format!("Value must be of node kind {}", self.show_iri(&kind.to_iri())))
                }
            }
            Constraint::MinLength(bound) | Constraint::MaxLength(bound) => {
                let Some(length) = lexical_form(value).map(|form| form.chars().count()) else {
                    return Err("Blank nodes have no length".to_string());
                };
                match constraint {
                    Constraint::MinLength(_) if length < *bound => {
                        Err(format!("Value must have at least {bound} characters"))
                    }
                    Constraint::MaxLength(_) if length > *bound => {
                        Err(format!("Value must have at most {bound} characters"))
                    }
                    _ => Ok(()),
                }
            }
            Constraint::Pattern { pattern, flags } => {
                let Some(form) = lexical_form(value) else {
                    return Err(format!("Value must match pattern: {pattern}"));
                };
                if self.regex(pattern, flags)?.is_match(form) {
                    Ok(())
                } else {
                    Err(format!("Value must match pattern: {pattern}"))
                }
            }
            Constraint::MinInclusive(bound)
            | Constraint::MinExclusive(bound)
            | Constraint::MaxInclusive(bound)
            | Constraint::MaxExclusive(bound) => {
                let (accepted, symbol) = match constraint {
                    Constraint::MinInclusive(_) => (&[Ordering::Greater, Ordering::Equal][..], ">="),
                    Constraint::MinExclusive(_) => (&[Ordering::Greater][..], ">"),
                    Constraint::MaxInclusive(_) => (&[Ordering::Less, Ordering::Equal][..], "<="),
                    _ => (&[Ordering::Less][..], "<"),
                };
                match compare(value, bound) {
                    Some(ordering) if accepted.contains(&ordering) => Ok(()),
                    _ => Err(format!("Value must be {symbol} {}", bound.value())),
                }
            }
            Constraint::In(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let allowed = allowed
                        .iter()
                        .map(|term| self.show_schema(term))
                        .collect::<Vec<_>>();
                    Err(format!("Value must be one of: {}", allowed.join(", ")))
                }
            }
            Constraint::Node(shape_id) => {
                let Some(shape) = self.schema.shape(shape_id) else {
                    return Err(format!(
                        "Shape {} referenced by sh:node is not declared",
                        self.show_schema(shape_id)
                    ));
                };
                if self.validate_shape(value, shape).is_empty() {
                    Ok(())
                } else {
                    Err(format!(
                        "Value does not conform to shape {}",
                        self.show_schema(shape_id)
                    ))
                }
            }
            Constraint::MinCount(_)
            | Constraint::MaxCount(_)
            | Constraint::HasValue(_)
            | Constraint::UniqueLang => Ok(()),
        }
    }

    fn regex(&self, pattern: &str, flags: &str) -> Result<Regex, String> {
        let key = (pattern.to_string(), flags.to_string());
        self.regexes
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| compile_pattern(pattern, flags))
            .clone()
    }

    fn show(&self, term: &Term) -> String {
        display_term(term, self.graph.prefix_map())
    }

    fn show_schema(&self, term: &Term) -> String {
        self.schema.display(term)
    }

    fn show_iri(&self, iri: &NamedNode) -> String {
        self.schema.prefix_map().qualify(iri.as_str())
    }
}

fn lexical_form(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(iri) => Some(iri.as_str()),
        Term::Literal(literal) => Some(literal.value()),
        _ => None,
    }
}

/// Numeric literals must parse; other datatypes are taken as written.
fn well_formed(literal: &Literal) -> bool {
    let term = Term::Literal(literal.clone());
    let numeric = literal
        .datatype()
        .as_str()
        .strip_prefix("http://www.w3.org/2001/XMLSchema#")
        .is_some_and(|local| {
            matches!(
                local,
                "integer" | "int" | "long" | "short" | "byte" | "decimal" | "double" | "float"
            )
        });
    !numeric || numeric_value(&term).is_some()
}

/// Numeric comparison when both sides are numbers, lexical comparison when
/// both literals share a datatype, incomparable otherwise.
fn compare(value: &Term, bound: &Literal) -> Option<Ordering> {
    let Term::Literal(literal) = value else {
        return None;
    };
    if let (Some(left), Some(right)) = (numeric_value(value), number(bound.value())) {
        if numeric_value(&Term::Literal(bound.clone())).is_some() {
            return left.partial_cmp(&right);
        }
    }
    if literal.datatype() == bound.datatype() {
        return Some(literal.value().cmp(bound.value()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::tests::SHAPES;
    use super::*;
    use crate::shapemap::Status;
    use oxigraph::io::RdfFormat;

    const EX: &str = "http://example.org/";

    fn graph(turtle: &str) -> RdfGraph {
        let source = format!(
            "@prefix ex: <{EX}> .\n@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n{turtle}"
        );
        RdfGraph::parse(source.as_bytes(), RdfFormat::Turtle, None).unwrap()
    }

    fn shapes(turtle: &str) -> ShaclSchema {
        let source = format!(
            "@prefix sh: <http://www.w3.org/ns/shacl#> .\n@prefix ex: <{EX}> .\n@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n{turtle}"
        );
        ShaclSchema::parse(&source, RdfFormat::Turtle, None).unwrap()
    }

    fn iri(local: &str) -> Term {
        Term::NamedNode(NamedNode::new(format!("{EX}{local}")).unwrap())
    }

    #[test]
    fn conforming_data_yields_an_empty_report() {
        let schema = ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap();
        let data = graph(
            r#"ex:alice a ex:Person ; ex:name "Alice" ; ex:knows ex:bob .
               ex:bob a ex:Person ; ex:name "Bob" ."#,
        );
        let (report, shape_map) = ShaclValidator::new(&schema, &data).validate_targets();
        assert!(report.conforms(), "{report:?}");
        assert_eq!(shape_map.len(), 2);
        assert!(shape_map.conforms());
    }

    #[test]
    fn counts_and_datatypes_are_reported() {
        let schema = ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap();
        let data = graph(r#"ex:alice a ex:Person ; ex:name "Alice", 42 ."#);
        let (report, shape_map) = ShaclValidator::new(&schema, &data).validate_targets();
        assert!(!report.conforms());
        let components = report
            .results()
            .iter()
            .filter_map(ReportEntry::source_constraint)
            .collect::<Vec<_>>();
        assert!(components.contains(&"sh:MaxCountConstraintComponent"));
        assert!(components.contains(&"sh:DatatypeConstraintComponent"));
        assert!(report.results().iter().all(|r| r.result_path() == Some("ex:name")));
        assert_eq!(
            shape_map.status(&iri("alice"), &ShapeLabel::Iri(NamedNode::new(format!("{EX}PersonShape")).unwrap())),
            Some(Status::Nonconformant)
        );
    }

    #[test]
    fn warnings_still_break_conformance() {
        let schema = ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap();
        let data = graph(r#"ex:alice a ex:Person ; ex:name "Alice" . _:b ex:knows ex:alice ."#);
        let (report, _) = ShaclValidator::new(&schema, &data).validate_targets();
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.violations().count(), 0);
        assert!(!report.conforms());
    }

    #[test]
    fn subclass_instances_are_targeted() {
        let schema = ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap();
        let data = graph("ex:Student rdfs:subClassOf ex:Person . ex:sam a ex:Student .");
        let validator = ShaclValidator::new(&schema, &data);
        let person = schema.shape(&iri("PersonShape")).unwrap();
        assert!(validator.focus_nodes(person).contains(&iri("sam")));
        let (report, _) = validator.validate_targets();
        assert_eq!(report.results()[0].focus_node(), "ex:sam");
    }

    #[test]
    fn closed_shapes_reject_unlisted_predicates() {
        let schema = ShaclSchema::parse(SHAPES, RdfFormat::Turtle, None).unwrap();
        let data = graph(
            r#"ex:acme a ex:Company ; ex:label "A" ; ex:note "fine" ; ex:extra 1 ."#,
        );
        let (report, _) = ShaclValidator::new(&schema, &data).validate_targets();
        let closed = report
            .results()
            .iter()
            .filter(|r| r.source_constraint() == Some("sh:ClosedConstraintComponent"))
            .collect::<Vec<_>>();
        assert_eq!(closed.len(), 2, "{report:?}");
        assert!(closed
            .iter()
            .any(|r| r.result_path() == Some("<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>")));
        assert!(closed.iter().any(|r| r.result_path() == Some("ex:extra")));
    }

    #[test]
    fn value_constraints() {
        let schema = shapes(
            r#"ex:S a sh:NodeShape ; sh:targetNode ex:n ;
                 sh:property [ sh:path ex:code ; sh:pattern "^ab" ; sh:flags "i" ; sh:maxLength 4 ] ;
                 sh:property [ sh:path ex:age ; sh:minInclusive 0 ; sh:maxExclusive 150 ] ;
                 sh:property [ sh:path ex:label ; sh:uniqueLang true ] ;
                 sh:property [ sh:path ex:kind ; sh:hasValue ex:Thing ] ."#,
        );
        let data = graph(
            r#"ex:n ex:code "ABc", "xyz", "abcdef" ;
                    ex:age 200 ;
                    ex:label "a"@en, "b"@EN, "c"@fr ;
                    ex:kind ex:Other ."#,
        );
        let (report, _) = ShaclValidator::new(&schema, &data).validate_pairs(&[(
            iri("n"),
            ShapeLabel::Iri(NamedNode::new(format!("{EX}S")).unwrap()),
        )]);
        let count = |component: &str| {
            report
                .results()
                .iter()
                .filter(|r| r.source_constraint() == Some(component))
                .count()
        };
        assert_eq!(count("sh:PatternConstraintComponent"), 1);
        assert_eq!(count("sh:MaxLengthConstraintComponent"), 1);
        assert_eq!(count("sh:MaxExclusiveConstraintComponent"), 1);
        assert_eq!(count("sh:MinInclusiveConstraintComponent"), 0);
        assert_eq!(count("sh:UniqueLangConstraintComponent"), 1);
        assert_eq!(count("sh:HasValueConstraintComponent"), 1);
    }

    #[test]
    fn node_references_recurse_and_terminate() {
        let schema = shapes(
            r#"ex:PersonShape a sh:NodeShape ;
                 sh:property [ sh:path ex:knows ; sh:node ex:PersonShape ] ;
                 sh:property [ sh:path ex:name ; sh:minCount 1 ] ."#,
        );
        let data = graph(
            r#"ex:a ex:name "A" ; ex:knows ex:b .
               ex:b ex:name "B" ; ex:knows ex:a .
               ex:c ex:name "C" ; ex:knows ex:d ."#,
        );
        let validator = ShaclValidator::new(&schema, &data);
        let label = ShapeLabel::Iri(NamedNode::new(format!("{EX}PersonShape")).unwrap());
        let (report, shape_map) = validator.validate_pairs(&[
            (iri("a"), label.clone()),
            (iri("c"), label.clone()),
        ]);
        assert_eq!(shape_map.status(&iri("a"), &label), Some(Status::Conformant));
        assert_eq!(shape_map.status(&iri("c"), &label), Some(Status::Nonconformant));
        assert_eq!(report.results().len(), 1);
        assert_eq!(report.results()[0].value(), Some("ex:d"));
    }

    #[test]
    fn unknown_shapes_in_pairs_are_nonconformant() {
        let schema = shapes("ex:S a sh:NodeShape .");
        let data = graph("ex:n ex:p 1 .");
        let (report, shape_map) = ShaclValidator::new(&schema, &data).validate_pairs(&[
            (iri("n"), ShapeLabel::Iri(NamedNode::new(format!("{EX}Missing")).unwrap())),
            (iri("n"), ShapeLabel::Start),
        ]);
        assert!(report.conforms());
        assert!(!shape_map.conforms());
        assert!(shape_map.entries()[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("not declared"));
    }
}
