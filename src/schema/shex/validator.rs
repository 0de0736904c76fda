//! ShEx validation over an in-memory graph.
//!
//! Triple expressions are matched with the interval algorithm for
//! single-occurrence bag expressions: every triple constraint is its own
//! symbol, so a neighbourhood matches when the assignment of triples to
//! constraints yields a bag whose interval contains 1. Shape references are
//! checked coinductively: a `(node, label)` pair already on the stack is
//! assumed to hold.

use super::{
    Cardinality, Facet, NodeConstraint, Shape, ShapeExpr, ShexSchema, TripleConstraint,
    TripleExpr, ValueSetValue,
};
use crate::rdf::graph::{RdfGraph, display_term};
use crate::shapemap::{ResultShapeMap, ShapeLabel};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, Term};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Assignments explored per shape before giving up on a neighbourhood.
const MAX_ASSIGNMENT_STATES: usize = 50_000;

type Check = Result<(), String>;

pub struct ShexValidator<'a> {
    schema: &'a ShexSchema,
    graph: &'a RdfGraph,
    stack: RefCell<Vec<(Term, ShapeLabel)>>,
    regexes: RefCell<HashMap<(String, String), Result<Regex, String>>>,
}

impl<'a> ShexValidator<'a> {
    pub fn new(schema: &'a ShexSchema, graph: &'a RdfGraph) -> Self {
        Self {
            schema,
            graph,
            stack: RefCell::new(Vec::new()),
            regexes: RefCell::new(HashMap::new()),
        }
    }

    /// Checks each pair and records the outcome, with a reason for failures.
    pub fn validate(&self, pairs: &[(Term, ShapeLabel)], result: &mut ResultShapeMap) {
        for (node, label) in pairs {
            match self.check(node, label) {
                Ok(()) => result.conformant(node.clone(), label.clone()),
                Err(reason) => result.nonconformant(node.clone(), label.clone(), reason),
            }
        }
    }

    pub fn check(&self, node: &Term, label: &ShapeLabel) -> Check {
        if self
            .stack
            .borrow()
            .iter()
            .any(|(seen, seen_label)| seen == node && seen_label == label)
        {
            return Ok(());
        }
        let expr = self.schema.get(label).ok_or_else(|| match label {
            ShapeLabel::Start => "the schema declares no start shape".to_string(),
            other => format!(
                "shape {} is not declared in the schema",
                other.display(&self.schema.prefixes)
            ),
        })?;
        self.stack.borrow_mut().push((node.clone(), label.clone()));
        let outcome = self.satisfies(node, expr);
        self.stack.borrow_mut().pop();
        outcome
    }

    fn show(&self, term: &Term) -> String {
        display_term(term, self.graph.prefix_map())
    }

    fn satisfies(&self, node: &Term, expr: &ShapeExpr) -> Check {
        match expr {
            ShapeExpr::And(parts) => parts.iter().try_for_each(|part| self.satisfies(node, part)),
            ShapeExpr::Or(parts) => {
                let mut reasons = Vec::new();
                for part in parts {
                    match self.satisfies(node, part) {
                        Ok(()) => return Ok(()),
                        Err(reason) => reasons.push(reason),
                    }
                }
                Err(format!("no alternative matches: {}", reasons.join("; ")))
            }
            ShapeExpr::Not(inner) => match self.satisfies(node, inner) {
                Ok(()) => Err(format!("{} matches a negated expression", self.show(node))),
                Err(_) => Ok(()),
            },
            ShapeExpr::NodeConstraint(constraint) => self.node_constraint(node, constraint),
            ShapeExpr::Shape(shape) => self.shape(node, shape),
            ShapeExpr::External => Err("external shapes cannot be resolved".to_string()),
            ShapeExpr::Ref(label) => self.check(node, label),
        }
    }

    fn node_constraint(&self, node: &Term, constraint: &NodeConstraint) -> Check {
        if let Some(kind) = constraint.node_kind {
            if !kind.matches(node) {
                return Err(format!("{} is not {}", self.show(node), kind.keyword()));
            }
        }
        if let Some(datatype) = &constraint.datatype {
            match node {
                Term::Literal(literal) if literal.datatype() == datatype.as_ref() => {
                    if !lexically_valid(literal) {
                        return Err(format!(
                            "{} is not a valid lexical form for {}",
                            self.show(node),
                            datatype
                        ));
                    }
                }
                _ => {
                    return Err(format!(
                        "{} does not have datatype {}",
                        self.show(node),
                        self.schema.prefixes.qualify(datatype.as_str())
                    ));
                }
            }
        }
        if let Some(values) = &constraint.values {
            if !values.iter().any(|value| value_matches(value, node)) {
                return Err(format!("{} is not in the value set", self.show(node)));
            }
        }
        constraint
            .facets
            .iter()
            .try_for_each(|facet| self.facet(node, facet))
    }

    fn facet(&self, node: &Term, facet: &Facet) -> Check {
        let lexical = match node {
            Term::NamedNode(iri) => Some(iri.as_str()),
            Term::Literal(literal) => Some(literal.value()),
            _ => None,
        };
        let fail = |what: String| Err(format!("{} {what}", self.show(node)));
        match facet {
            Facet::Length(n) | Facet::MinLength(n) | Facet::MaxLength(n) => {
                let Some(lexical) = lexical else {
                    return fail("has no lexical form".into());
                };
                let length = lexical.chars().count();
                let ok = match facet {
                    Facet::Length(_) => length == *n,
                    Facet::MinLength(_) => length >= *n,
                    _ => length <= *n,
                };
                if ok {
                    Ok(())
                } else {
                    fail(format!("has length {length}, violating {facet:?}"))
                }
            }
            Facet::Pattern { pattern, flags } => {
                let Some(lexical) = lexical else {
                    return fail("has no lexical form".into());
                };
                let matched = self.regex(pattern, flags)?.is_match(lexical);
                if matched {
                    Ok(())
                } else {
                    fail(format!("does not match /{pattern}/{flags}"))
                }
            }
            Facet::MinInclusive(bound)
            | Facet::MinExclusive(bound)
            | Facet::MaxInclusive(bound)
            | Facet::MaxExclusive(bound) => {
                let (Some(value), Some(limit)) = (numeric_value(node), number(bound.value())) else {
                    return fail("is not numeric".into());
                };
                let ok = match facet {
                    Facet::MinInclusive(_) => value >= limit,
                    Facet::MinExclusive(_) => value > limit,
                    Facet::MaxInclusive(_) => value <= limit,
                    _ => value < limit,
                };
                if ok {
                    Ok(())
                } else {
                    fail(format!("is out of range ({facet:?})"))
                }
            }
            Facet::TotalDigits(n) | Facet::FractionDigits(n) => {
                let Term::Literal(literal) = node else {
                    return fail("is not numeric".into());
                };
                if numeric_value(node).is_none() {
                    return fail("is not numeric".into());
                }
                let digits = literal.value().trim_start_matches(['+', '-']);
                let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
                let fraction = fraction.trim_end_matches('0');
                let integer = integer.trim_start_matches('0');
                let count = match facet {
                    Facet::TotalDigits(_) => integer.len() + fraction.len(),
                    _ => fraction.len(),
                };
                if count <= *n {
                    Ok(())
                } else {
                    fail(format!("has {count} digits, violating {facet:?}"))
                }
            }
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

    fn shape(&self, node: &Term, shape: &Shape) -> Check {
        let constraints = shape
            .expression
            .as_ref()
            .map(TripleExpr::constraints)
            .unwrap_or_default();
        let mentioned: HashSet<(&NamedNode, bool)> = constraints
            .iter()
            .map(|constraint| (&constraint.predicate, constraint.inverse))
            .collect();

        let mut arcs = Vec::new();
        for (predicate, object) in self.graph.outgoing(node) {
            arcs.push((predicate, object, false));
        }
        for (predicate, subject) in self.graph.incoming(node) {
            arcs.push((predicate, subject, true));
        }

        // For every arc touching a mentioned predicate: the constraints whose
        // value expression it satisfies, plus `None` when EXTRA allows leaving
        // it unmatched.
        let mut choices: Vec<Vec<Option<usize>>> = Vec::new();
        for (predicate, value, inverse) in &arcs {
            if !mentioned.contains(&(predicate, *inverse)) {
                if shape.closed && !inverse {
                    return Err(format!(
                        "closed shape does not allow {} on {}",
                        self.graph.prefix_map().qualify(predicate.as_str()),
                        self.show(node)
                    ));
                }
                continue;
            }
            let mut options = Vec::new();
            let mut failures = Vec::new();
            for (index, constraint) in constraints.iter().enumerate() {
                if constraint.predicate != *predicate || constraint.inverse != *inverse {
                    continue;
                }
                match self.value_conforms(value, constraint) {
                    Ok(()) => options.push(Some(index)),
                    Err(reason) => failures.push(reason),
                }
            }
            let extra = !inverse && shape.extra.contains(predicate);
            if extra {
                options.push(None);
            }
            if options.is_empty() {
                return Err(format!(
                    "{}{} {} of {} does not match: {}",
                    if *inverse { "^" } else { "" },
                    self.graph.prefix_map().qualify(predicate.as_str()),
                    self.show(value),
                    self.show(node),
                    failures.join("; ")
                ));
            }
            choices.push(options);
        }

        let Some(expression) = &shape.expression else {
            return Ok(());
        };
        let mut bag = vec![0u32; constraints.len()];
        let mut visited = HashSet::new();
        if search(expression, &choices, 0, &mut bag, &mut visited)? {
            Ok(())
        } else {
            Err(describe_mismatch(expression, &choices, constraints.len(), |constraint| {
                self.graph.prefix_map().qualify(constraint.predicate.as_str())
            }))
        }
    }

    fn value_conforms(&self, value: &Term, constraint: &TripleConstraint) -> Check {
        match &constraint.value {
            None => Ok(()),
            Some(expr) => self.satisfies(value, expr),
        }
    }
}

/// Depth-first search over arc assignments, memoised on `(arc, bag)`.
fn search(
    expression: &TripleExpr,
    choices: &[Vec<Option<usize>>],
    position: usize,
    bag: &mut Vec<u32>,
    visited: &mut HashSet<(usize, Vec<u32>)>,
) -> Result<bool, String> {
    if position == choices.len() {
        return Ok(matches_bag(expression, bag));
    }
    if !visited.insert((position, bag.clone())) {
        return Ok(false);
    }
    if visited.len() > MAX_ASSIGNMENT_STATES {
        return Err("too many ways to assign triples to constraints".to_string());
    }
    for choice in &choices[position] {
        if let Some(index) = choice {
            bag[*index] += 1;
        }
        let found = search(expression, choices, position + 1, bag, visited)?;
        if let Some(index) = choice {
            bag[*index] -= 1;
        }
        if found {
            return Ok(true);
        }
    }
    Ok(false)
}

fn describe_mismatch(
    expression: &TripleExpr,
    choices: &[Vec<Option<usize>>],
    constraint_count: usize,
    name: impl Fn(&TripleConstraint) -> String,
) -> String {
    let constraints = expression.constraints();
    let mut counts = vec![0u32; constraint_count];
    for options in choices {
        if let Some(Some(index)) = options.first() {
            counts[*index] += 1;
        }
    }
    let summary = constraints
        .iter()
        .zip(counts)
        .map(|(constraint, count)| {
            format!(
                "{}{} x{count}",
                if constraint.inverse { "^" } else { "" },
                name(constraint)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("neighbourhood does not satisfy the triple expression ({summary})")
}

/// Inclusive interval of repetition counts; `hi = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    lo: u64,
    hi: Option<u64>,
}

impl Interval {
    const EMPTY: Interval = Interval { lo: 1, hi: Some(0) };

    fn exact(n: u64) -> Self {
        Interval { lo: n, hi: Some(n) }
    }

    fn is_empty(&self) -> bool {
        self.hi.is_some_and(|hi| hi < self.lo)
    }

    fn contains(&self, n: u64) -> bool {
        n >= self.lo && self.hi.is_none_or(|hi| n <= hi)
    }

    fn intersect(self, other: Interval) -> Interval {
        Interval {
            lo: self.lo.max(other.lo),
            hi: match (self.hi, other.hi) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    fn add(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval {
            lo: self.lo + other.lo,
            hi: self.hi.zip(other.hi).map(|(a, b)| a + b),
        }
    }

    /// Repetitions of `E{min,max}` given the interval of `E`.
    fn repeat(self, cardinality: Cardinality, nonempty: bool) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let min = u64::from(cardinality.min);
        if cardinality.max == Some(0) {
            return if nonempty {
                Interval::EMPTY
            } else {
                Interval { lo: 0, hi: None }
            };
        }
        let lo = match cardinality.max {
            Some(max) => self.lo.div_ceil(u64::from(max)),
            None => 0,
        }
        .max(u64::from(nonempty));
        let hi = if min == 0 {
            None
        } else {
            self.hi.map(|hi| hi / min)
        };
        Interval { lo, hi }
    }
}

fn matches_bag(expression: &TripleExpr, bag: &[u32]) -> bool {
    let mut next = 0;
    interval(expression, bag, &mut next).contains(1)
}

fn interval(expression: &TripleExpr, bag: &[u32], next: &mut usize) -> Interval {
    let first = *next;
    let (inner, cardinality) = match expression {
        TripleExpr::Constraint(constraint) => {
            let count = bag[*next];
            *next += 1;
            (Interval::exact(u64::from(count)), constraint.cardinality)
        }
        TripleExpr::EachOf {
            expressions,
            cardinality,
        } => {
            let inner = expressions
                .iter()
                .map(|expr| interval(expr, bag, next))
                .fold(Interval { lo: 0, hi: None }, Interval::intersect);
            (inner, *cardinality)
        }
        TripleExpr::OneOf {
            expressions,
            cardinality,
        } => {
            let inner = expressions
                .iter()
                .map(|expr| interval(expr, bag, next))
                .fold(Interval::exact(0), Interval::add);
            (inner, *cardinality)
        }
    };
    let nonempty = bag[first..*next].iter().any(|count| *count > 0);
    inner.repeat(cardinality, nonempty)
}

fn value_matches(value: &ValueSetValue, node: &Term) -> bool {
    match (value, node) {
        (ValueSetValue::Iri(iri), Term::NamedNode(candidate)) => iri == candidate,
        (ValueSetValue::IriStem(stem), Term::NamedNode(candidate)) => {
            candidate.as_str().starts_with(stem.as_str())
        }
        (ValueSetValue::Literal(literal), Term::Literal(candidate)) => {
            literal == candidate
                || (number(literal.value()).is_some()
                    && literal.datatype() == candidate.datatype()
                    && number(literal.value()) == number(candidate.value()))
        }
        (ValueSetValue::Language(tag), Term::Literal(candidate)) => candidate
            .language()
            .is_some_and(|language| {
                language == tag || language.starts_with(&format!("{tag}-"))
            }),
        _ => false,
    }
}

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedInt",
    "unsignedLong",
    "unsignedShort",
    "unsignedByte",
];

fn xsd_local(literal: &Literal) -> Option<&str> {
    literal
        .datatype()
        .as_str()
        .strip_prefix("http://www.w3.org/2001/XMLSchema#")
}

pub(crate) fn numeric_value(node: &Term) -> Option<f64> {
    let Term::Literal(literal) = node else {
        return None;
    };
    let local = xsd_local(literal)?;
    if INTEGER_TYPES.contains(&local) || matches!(local, "decimal" | "double" | "float") {
        number(literal.value())
    } else {
        None
    }
}

pub(crate) fn number(lexical: &str) -> Option<f64> {
    match lexical.trim() {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Lexical validity for the XSD datatypes with a checkable syntax.
fn lexically_valid(literal: &Literal) -> bool {
    let value = literal.value();
    if literal.datatype() == xsd::BOOLEAN {
        return matches!(value, "true" | "false" | "1" | "0");
    }
    match xsd_local(literal) {
        Some(local) if INTEGER_TYPES.contains(&local) => value.parse::<i128>().is_ok(),
        Some("decimal") => {
            !value.contains(['e', 'E']) && value.parse::<f64>().is_ok()
        }
        Some("double" | "float") => number(value).is_some() || value == "NaN",
        _ => true,
    }
}

/// Translates XPath regex flags to the `regex` crate's inline syntax.
pub(crate) fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut inline = String::new();
    let mut body = pattern.to_string();
    for flag in flags.chars() {
        match flag {
            'i' | 's' | 'm' | 'x' => inline.push(flag),
            'q' => body = regex::escape(pattern),
            other => return Err(format!("unsupported regex flag '{other}'")),
        }
    }
    let source = if inline.is_empty() {
        body
    } else {
        format!("(?{inline}){body}")
    };
    Regex::new(&source).map_err(|error| format!("invalid pattern /{pattern}/: {error}"))
}

#[cfg(test)]
mod tests {
    use super::super::parse_shexc;
    use super::*;
    use crate::rdf::prefix::PrefixMap;
    use crate::shapemap::Status;
    use oxigraph::io::RdfFormat;

    const EX: &str = "http://example.org/";

    fn graph(turtle: &str) -> RdfGraph {
        let source = format!("@prefix ex: <{EX}> .\n@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n{turtle}");
        RdfGraph::parse(source.as_bytes(), RdfFormat::Turtle, None).unwrap()
    }

    fn schema(shexc: &str) -> ShexSchema {
        let source = format!("PREFIX ex: <{EX}>\nPREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n{shexc}");
        parse_shexc(&source, None).unwrap()
    }

    fn node(local: &str) -> Term {
        Term::NamedNode(NamedNode::new(format!("{EX}{local}")).unwrap())
    }

    fn label(local: &str) -> ShapeLabel {
        ShapeLabel::Iri(NamedNode::new(format!("{EX}{local}")).unwrap())
    }

    fn check(schema: &ShexSchema, graph: &RdfGraph, focus: &str, shape: &str) -> Check {
        ShexValidator::new(schema, graph).check(&node(focus), &label(shape))
    }

    #[test]
    fn minimal_shape_conforms() {
        let schema = parse_shexc("<S> { <b> . }", Some("internal://base/")).unwrap();
        let graph = RdfGraph::parse(b"<a> <b> <c> .", RdfFormat::Turtle, Some("internal://base/"))
            .unwrap();
        let focus = Term::NamedNode(NamedNode::new("internal://base/a").unwrap());
        let shape = ShapeLabel::Iri(NamedNode::new("internal://base/S").unwrap());
        let mut result = ResultShapeMap::new(PrefixMap::new(), PrefixMap::new());
        ShexValidator::new(&schema, &graph).validate(&[(focus.clone(), shape.clone())], &mut result);
        assert_eq!(result.status(&focus, &shape), Some(Status::Conformant));
    }

    #[test]
    fn cardinalities_are_enforced() {
        let schema = schema("ex:S { ex:p . {2,3} }");
        let data = graph("ex:one ex:p 1 . ex:two ex:p 1, 2 . ex:four ex:p 1, 2, 3, 4 .");
        assert!(check(&schema, &data, "one", "S").is_err());
        assert!(check(&schema, &data, "two", "S").is_ok());
        assert!(check(&schema, &data, "four", "S").is_err());
    }

    #[test]
    fn datatypes_and_facets() {
        let schema = schema("ex:S { ex:age xsd:integer MININCLUSIVE 0 ; ex:name LITERAL /^[A-Z]/ }");
        let data = graph(
            r#"ex:ok ex:age 30 ; ex:name "Alice" .
               ex:negative ex:age -1 ; ex:name "Bob" .
               ex:lower ex:age 5 ; ex:name "carol" .
               ex:text ex:age "thirty" ; ex:name "Dan" ."#,
        );
        assert!(check(&schema, &data, "ok", "S").is_ok());
        assert!(check(&schema, &data, "negative", "S").is_err());
        assert!(check(&schema, &data, "lower", "S").is_err());
        assert!(check(&schema, &data, "text", "S").is_err());
    }

    #[test]
    fn recursive_references_are_coinductive() {
        let schema = schema("ex:Person IRI AND { ex:knows @ex:Person * }");
        let data = graph("ex:a ex:knows ex:b . ex:b ex:knows ex:a . ex:c ex:knows 3 .");
        assert!(check(&schema, &data, "a", "Person").is_ok());
        assert!(check(&schema, &data, "c", "Person").is_err());
    }

    #[test]
    fn closed_and_extra() {
        let data = graph("ex:a ex:p 1 ; ex:q 2 . ex:b ex:p 1, 5 .");
        assert!(check(&schema("ex:S CLOSED { ex:p . }"), &data, "a", "S").is_err());
        assert!(check(&schema("ex:S { ex:p . }"), &data, "a", "S").is_ok());
        assert!(check(&schema("ex:S { ex:p [1] }"), &data, "b", "S").is_err());
        assert!(check(&schema("ex:S EXTRA ex:p { ex:p [1] }"), &data, "b", "S").is_ok());
    }

    #[test]
    fn one_of_and_repeated_groups() {
        let schema = schema("ex:S { ( ex:p . ; ex:q . )+ | ex:r . }");
        let data = graph("ex:pair ex:p 1 ; ex:q 2 . ex:twice ex:p 1, 2 ; ex:q 3, 4 . ex:mixed ex:p 1 ; ex:r 2 . ex:lone ex:r 1 .");
        assert!(check(&schema, &data, "pair", "S").is_ok());
        assert!(check(&schema, &data, "twice", "S").is_ok());
        assert!(check(&schema, &data, "mixed", "S").is_err());
        assert!(check(&schema, &data, "lone", "S").is_ok());
    }

    #[test]
    fn same_predicate_split_across_constraints() {
        let schema = schema("ex:S { ex:p xsd:integer ; ex:p xsd:string }");
        let data = graph(r#"ex:a ex:p 1, "x" . ex:b ex:p 1, 2 ."#);
        assert!(check(&schema, &data, "a", "S").is_ok());
        assert!(check(&schema, &data, "b", "S").is_err());
    }

    #[test]
    fn inverse_constraints_and_negation() {
        let schema = schema("ex:Child { ^ex:parentOf IRI + }\nex:NotChild NOT @ex:Child");
        let data = graph("ex:mum ex:parentOf ex:kid .");
        assert!(check(&schema, &data, "kid", "Child").is_ok());
        assert!(check(&schema, &data, "mum", "Child").is_err());
        assert!(check(&schema, &data, "mum", "NotChild").is_ok());
    }

    #[test]
    fn unknown_labels_and_missing_start_fail_with_reasons() {
        let schema = schema("ex:S { }");
        let data = graph("ex:a ex:p 1 .");
        let validator = ShexValidator::new(&schema, &data);
        assert!(validator.check(&node("a"), &label("Missing")).unwrap_err().contains("not declared"));
        assert!(validator.check(&node("a"), &ShapeLabel::Start).unwrap_err().contains("start"));
    }

    #[test]
    fn interval_repeat_rules() {
        let star = Cardinality::new(0, None);
        assert_eq!(Interval::exact(3).repeat(star, true), Interval { lo: 1, hi: None });
        assert_eq!(Interval::exact(0).repeat(Cardinality::ONE, false), Interval::exact(0));
        assert!(Interval::exact(4).repeat(Cardinality::new(2, Some(3)), true).contains(2));
        assert!(!Interval::exact(4).repeat(Cardinality::new(2, Some(3)), true).contains(1));
    }

    #[test]
    fn pattern_flags() {
        assert!(compile_pattern("abc", "i").unwrap().is_match("ABC"));
        assert!(compile_pattern("a.c", "q").unwrap().is_match("a.c"));
        assert!(!compile_pattern("a.c", "q").unwrap().is_match("abc"));
        assert!(compile_pattern("a", "z").is_err());
    }
}
