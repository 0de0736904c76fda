use super::{
    Annotation, Cardinality, Facet, NodeConstraint, Shape, ShapeExpr, ShexSchema, TripleConstraint,
    TripleExpr, ValueSetValue,
};
use crate::rdf::graph::display_term;
use crate::rdf::prefix::PrefixMap;
use crate::shapemap::ShapeLabel;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, Term};
use std::fmt::Write;

/// Renders a schema as ShExC with prefixed names where a prefix applies.
pub fn to_shexc(schema: &ShexSchema) -> String {
    let writer = ShexcWriter {
        prefixes: &schema.prefixes,
    };
    let mut out = String::new();
    for (prefix, namespace) in schema.prefixes.iter() {
        let _ = writeln!(out, "PREFIX {prefix}: <{namespace}>");
    }
    if let Some(base) = &schema.base {
        let _ = writeln!(out, "BASE <{base}>");
    }
    if !out.is_empty() {
        out.push('\n');
    }
    if let Some(start) = &schema.start {
        let _ = writeln!(out, "start = {}\n", writer.shape_expr(start, 0));
    }
    for (label, expr) in &schema.shapes {
        let body = match expr {
            ShapeExpr::External => "EXTERNAL".to_string(),
            other => writer.shape_expr(other, 0),
        };
        let _ = writeln!(out, "{} {body}\n", writer.label(label));
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

struct ShexcWriter<'a> {
    prefixes: &'a PrefixMap,
}

impl ShexcWriter<'_> {
    fn iri(&self, iri: &NamedNode) -> String {
        self.prefixes.qualify(iri.as_str())
    }

    fn label(&self, label: &ShapeLabel) -> String {
        label.display(self.prefixes)
    }

    fn shape_expr(&self, expr: &ShapeExpr, depth: usize) -> String {
        match expr {
            ShapeExpr::And(parts) => self.junction(parts, " AND ", depth),
            ShapeExpr::Or(parts) => self.junction(parts, " OR ", depth),
            ShapeExpr::Not(inner) => format!("NOT {}", self.operand(inner, depth)),
            ShapeExpr::NodeConstraint(constraint) => self.node_constraint(constraint),
            ShapeExpr::Shape(shape) => self.shape(shape, depth),
            ShapeExpr::External => "EXTERNAL".to_string(),
            ShapeExpr::Ref(label) => format!("@{}", self.label(label)),
        }
    }

    fn junction(&self, parts: &[ShapeExpr], separator: &str, depth: usize) -> String {
        parts
            .iter()
            .map(|part| self.operand(part, depth))
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn operand(&self, expr: &ShapeExpr, depth: usize) -> String {
        match expr {
            ShapeExpr::And(_) | ShapeExpr::Or(_) => format!("({})", self.shape_expr(expr, depth)),
            other => self.shape_expr(other, depth),
        }
    }

    fn node_constraint(&self, constraint: &NodeConstraint) -> String {
        if constraint.is_empty() {
            return ".".to_string();
        }
        let mut parts = Vec::new();
        if let Some(kind) = constraint.node_kind {
            parts.push(kind.keyword().to_string());
        }
        if let Some(datatype) = &constraint.datatype {
            parts.push(self.iri(datatype));
        }
        if let Some(values) = &constraint.values {
            let values = values
                .iter()
                .map(|value| self.value(value))
                .collect::<Vec<_>>()
                .join(" ");
            parts.push(format!("[{values}]"));
        }
        parts.extend(constraint.facets.iter().map(|facet| self.facet(facet)));
        parts.join(" ")
    }

    fn value(&self, value: &ValueSetValue) -> String {
        match value {
            ValueSetValue::Iri(iri) => self.iri(iri),
            ValueSetValue::IriStem(stem) => format!("{}~", self.prefixes.qualify(stem)),
            ValueSetValue::Literal(literal) => self.literal(literal),
            ValueSetValue::Language(language) => format!("@{language}"),
        }
    }

    fn literal(&self, literal: &Literal) -> String {
        display_term(&Term::Literal(literal.clone()), self.prefixes)
    }

    fn facet(&self, facet: &Facet) -> String {
        match facet {
            Facet::Length(n) => format!("LENGTH {n}"),
            Facet::MinLength(n) => format!("MINLENGTH {n}"),
            Facet::MaxLength(n) => format!("MAXLENGTH {n}"),
            Facet::TotalDigits(n) => format!("TOTALDIGITS {n}"),
            Facet::FractionDigits(n) => format!("FRACTIONDIGITS {n}"),
            Facet::Pattern { pattern, flags } => {
                format!("/{}/{flags}", pattern.replace('/', "\\/"))
            }
            Facet::MinInclusive(value) => format!("MININCLUSIVE {}", value.value()),
            Facet::MinExclusive(value) => format!("MINEXCLUSIVE {}", value.value()),
            Facet::MaxInclusive(value) => format!("MAXINCLUSIVE {}", value.value()),
            Facet::MaxExclusive(value) => format!("MAXEXCLUSIVE {}", value.value()),
        }
    }

    fn shape(&self, shape: &Shape, depth: usize) -> String {
        let mut head = Vec::new();
        if shape.closed {
            head.push("CLOSED".to_string());
        }
        if !shape.extra.is_empty() {
            let extra = shape
                .extra
                .iter()
                .map(|predicate| self.predicate(predicate))
                .collect::<Vec<_>>()
                .join(" ");
            head.push(format!("EXTRA {extra}"));
        }
        let body = match &shape.expression {
            None => "{ }".to_string(),
            Some(expression) => {
                let indent = "  ".repeat(depth + 1);
                let inner = self.triple_expr(expression, depth + 1, true);
                format!("{{\n{indent}{inner}\n{}}}", "  ".repeat(depth))
            }
        };
        head.push(body);
        head.push(self.annotations(&shape.annotations));
        head.retain(|part| !part.is_empty());
        head.join(" ")
    }

    fn triple_expr(&self, expr: &TripleExpr, depth: usize, top: bool) -> String {
        let indent = "  ".repeat(depth);
        match expr {
            TripleExpr::Constraint(constraint) => self.triple_constraint(constraint, depth),
            TripleExpr::EachOf {
                expressions,
                cardinality,
            } => {
                let separator = format!(" ;\n{indent}");
                self.group(expressions, &separator, *cardinality, depth, top)
            }
            TripleExpr::OneOf {
                expressions,
                cardinality,
            } => {
                let separator = format!(" |\n{indent}");
                self.group(expressions, &separator, *cardinality, depth, top)
            }
        }
    }

    fn group(
        &self,
        expressions: &[TripleExpr],
        separator: &str,
        cardinality: Cardinality,
        depth: usize,
        top: bool,
    ) -> String {
        let body = expressions
            .iter()
            .map(|expr| self.triple_expr(expr, depth, false))
            .collect::<Vec<_>>()
            .join(separator);
        if top && cardinality.is_one() {
            body
        } else {
            format!("({body}){}", cardinality_suffix(cardinality))
        }
    }

    fn triple_constraint(&self, constraint: &TripleConstraint, depth: usize) -> String {
        let mut out = String::new();
        if constraint.inverse {
            out.push('^');
        }
        out.push_str(&self.predicate(&constraint.predicate));
        out.push(' ');
        match &constraint.value {
            Some(value) => out.push_str(&self.shape_expr(value, depth)),
            None => out.push('.'),
        }
        out.push_str(&cardinality_suffix(constraint.cardinality));
        let annotations = self.annotations(&constraint.annotations);
        if !annotations.is_empty() {
            out.push(' ');
            out.push_str(&annotations);
        }
        out
    }

    fn predicate(&self, predicate: &NamedNode) -> String {
        if predicate.as_ref() == rdf::TYPE {
            "a".to_string()
        } else {
            self.iri(predicate)
        }
    }

    fn annotations(&self, annotations: &[Annotation]) -> String {
        annotations
            .iter()
            .map(|annotation| {
                format!(
                    "// {} {}",
                    self.predicate(&annotation.predicate),
                    display_term(&annotation.object, self.prefixes)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn cardinality_suffix(cardinality: Cardinality) -> String {
    match (cardinality.min, cardinality.max) {
        (1, Some(1)) => String::new(),
        (0, None) => " *".to_string(),
        (1, None) => " +".to_string(),
        (0, Some(1)) => " ?".to_string(),
        (min, None) => format!(" {{{min},*}}"),
        (min, Some(max)) if min == max => format!(" {{{min}}}"),
        (min, Some(max)) => format!(" {{{min},{max}}}"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_shexc;
    use super::*;

    #[test]
    fn writes_prefixed_names_and_cardinalities() {
        let schema = parse_shexc(
            r#"PREFIX ex: <http://example.org/>
            PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
            ex:S { a [ex:Person] ; ex:name xsd:string + ; ex:age xsd:integer {0,3} }"#,
            None,
        )
        .unwrap();
        let text = to_shexc(&schema);
        assert!(text.starts_with("PREFIX ex: <http://example.org/>"));
        assert!(text.contains("a [ex:Person]"), "{text}");
        assert!(text.contains("ex:name xsd:string +"), "{text}");
        assert!(text.contains("ex:age xsd:integer {0,3}"), "{text}");
    }

    #[test]
    fn written_schema_parses_back_to_the_same_model() {
        let source = r#"PREFIX ex: <http://example.org/>
            start = @ex:S
            ex:S CLOSED { ex:p @ex:T OR LITERAL ? | ( ex:q . ; ^ex:r IRI /^a\/b/i )* }
            ex:T NOT [ex:x~ "y"@en @fr 3]
            ex:U EXTERNAL"#;
        let schema = parse_shexc(source, None).unwrap();
        let reparsed = parse_shexc(&to_shexc(&schema), None).unwrap();
        assert_eq!(reparsed, schema);
    }
}
