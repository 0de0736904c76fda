//! Class-diagram projections of schemas: PlantUML source and a standalone
//! SVG drawing.

use crate::rdf::graph::display_term;
use crate::rdf::prefix::PrefixMap;
use crate::schema::Schema;
use crate::schema::shacl::{Constraint, ShaclSchema};
use crate::schema::shex::{NodeConstraint, Shape, ShapeExpr, ShexSchema, ValueSetValue};
use indexmap::IndexMap;
use oxigraph::model::Term;
use std::fmt::Write;
use thiserror::Error;

pub const MAX_RENDERED_SHAPES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("the schema declares no shapes")]
    Empty,
    #[error("the schema declares {shapes} shapes, more than the {limit} that can be drawn")]
    TooLarge { shapes: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub uml: String,
    pub svg: String,
}

pub trait SchemaRenderer: Send + Sync {
    fn render(&self, schema: &Schema) -> Result<Rendered, RenderError>;
}

/// One box of the diagram.
#[derive(Debug, Clone, Default)]
struct UmlClass {
    name: String,
    fields: Vec<UmlField>,
    links: Vec<UmlLink>,
}

#[derive(Debug, Clone)]
struct UmlField {
    name: String,
    value: String,
    cardinality: String,
}

#[derive(Debug, Clone)]
struct UmlLink {
    target: String,
    label: String,
    cardinality: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlantUmlRenderer;

impl SchemaRenderer for PlantUmlRenderer {
    fn render(&self, schema: &Schema) -> Result<Rendered, RenderError> {
        let classes = match schema {
            Schema::ShEx(shex) => shex_classes(shex),
            Schema::Shacl(shacl) => shacl_classes(shacl),
        };
        if classes.is_empty() {
            return Err(RenderError::Empty);
        }
        if classes.len() > MAX_RENDERED_SHAPES {
            return Err(RenderError::TooLarge {
                shapes: classes.len(),
                limit: MAX_RENDERED_SHAPES,
            });
        }
        Ok(Rendered {
            uml: plantuml(&classes),
            svg: svg(&classes),
        })
    }
}

fn shex_classes(schema: &ShexSchema) -> IndexMap<String, UmlClass> {
    let prefixes = &schema.prefixes;
    let mut classes = IndexMap::new();
    for (label, expr) in &schema.shapes {
        let name = label.display(prefixes);
        let mut class = UmlClass {
            name: name.clone(),
            ..Default::default()
        };
        let mut shapes = Vec::new();
        collect_shapes(expr, &mut shapes);
        for shape in shapes {
            let Some(expression) = &shape.expression else {
                continue;
            };
            for constraint in expression.constraints() {
                let mut predicate = prefixes.qualify(constraint.predicate.as_str());
                if constraint.inverse {
                    predicate.insert(0, '^');
                }
                let cardinality = cardinality(constraint.cardinality.min, constraint.cardinality.max);
                match constraint.value.as_deref() {
                    Some(ShapeExpr::Ref(target)) => class.links.push(UmlLink {
                        target: target.display(prefixes),
                        label: predicate,
                        cardinality,
                    }),
                    value => class.fields.push(UmlField {
                        name: predicate,
                        value: value.map(|v| shex_value(v, prefixes)).unwrap_or_else(|| ".".to_string()),
                        cardinality,
                    }),
                }
            }
        }
        classes.insert(name, class);
    }
    classes
}

fn collect_shapes<'a>(expr: &'a ShapeExpr, found: &mut Vec<&'a Shape>) {
    match expr {
        ShapeExpr::Shape(shape) => found.push(shape),
        ShapeExpr::And(parts) => parts.iter().for_each(|part| collect_shapes(part, found)),
        _ => {}
    }
}

fn shex_value(expr: &ShapeExpr, prefixes: &PrefixMap) -> String {
    match expr {
        ShapeExpr::NodeConstraint(constraint) => node_constraint(constraint, prefixes),
        ShapeExpr::Ref(label) => format!("@{}", label.display(prefixes)),
        ShapeExpr::Shape(_) => "{ ... }".to_string(),
        ShapeExpr::And(parts) => join(parts, " AND ", prefixes),
        ShapeExpr::Or(parts) => join(parts, " OR ", prefixes),
        ShapeExpr::Not(inner) => format!("NOT {}", shex_value(inner, prefixes)),
        ShapeExpr::External => "EXTERNAL".to_string(),
    }
}

fn join(parts: &[ShapeExpr], separator: &str, prefixes: &PrefixMap) -> String {
    parts
        .iter()
        .map(|part| shex_value(part, prefixes))
        .collect::<Vec<_>>()
        .join(separator)
}

fn node_constraint(constraint: &NodeConstraint, prefixes: &PrefixMap) -> String {
    if let Some(values) = &constraint.values {
        let values = values
            .iter()
            .map(|value| match value {
                ValueSetValue::Iri(iri) => prefixes.qualify(iri.as_str()),
                ValueSetValue::IriStem(stem) => format!("<{stem}>~"),
                ValueSetValue::Literal(literal) => literal.to_string(),
                ValueSetValue::Language(tag) => format!("@{tag}"),
            })
            .collect::<Vec<_>>();
        return format!("[{}]", values.join(" "));
    }
    match (&constraint.datatype, constraint.node_kind) {
        (Some(datatype), _) => prefixes.qualify(datatype.as_str()),
        (None, Some(kind)) => kind.keyword().to_string(),
        (None, None) => ".".to_string(),
    }
}

fn shacl_classes(schema: &ShaclSchema) -> IndexMap<String, UmlClass> {
    let prefixes = schema.prefix_map();
    let mut classes = IndexMap::new();
    for shape in schema.shapes() {
        let name = display_term(&shape.id, prefixes);
        let mut class = UmlClass {
            name: name.clone(),
            ..Default::default()
        };
        for property in &shape.properties {
            let mut min = 0;
            let mut max = None;
            let mut value = None;
            let mut target = None;
            for constraint in &property.constraints {
                match constraint {
                    Constraint::MinCount(count) => min = u32::try_from(*count).unwrap_or(u32::MAX),
                    Constraint::MaxCount(count) => max = Some(u32::try_from(*count).unwrap_or(u32::MAX)),
                    Constraint::Datatype(datatype) => value = Some(prefixes.qualify(datatype.as_str())),
                    Constraint::Class(rdf_class) => {
                        value = Some(format!("a {}", prefixes.qualify(rdf_class.as_str())))
                    }
                    Constraint::NodeKind(kind) => {
                        value.get_or_insert_with(|| prefixes.qualify(kind.to_iri().as_str()));
                    }
                    Constraint::In(values) => {
                        value = Some(format!("[{}]", terms(values, prefixes)));
                    }
                    Constraint::HasValue(fixed) => value = Some(format!("[{}]", display_term(fixed, prefixes))),
                    Constraint::Node(node) => target = Some(display_term(node, prefixes)),
                    _ => {}
                }
            }
            let name = property.path.display(prefixes);
            let cardinality = cardinality(min, max);
            match target {
                Some(target) => class.links.push(UmlLink {
                    target,
                    label: name,
                    cardinality,
                }),
                None => class.fields.push(UmlField {
                    name,
                    value: value.unwrap_or_else(|| ".".to_string()),
                    cardinality,
                }),
            }
        }
        classes.insert(name, class);
    }
    classes
}

fn terms(values: &[Term], prefixes: &PrefixMap) -> String {
    values
        .iter()
        .map(|value| display_term(value, prefixes))
        .collect::<Vec<_>>()
        .join(" ")
}

fn cardinality(min: u32, max: Option<u32>) -> String {
    match (min, max) {
        (1, Some(1)) => String::new(),
        (0, Some(1)) => "?".to_string(),
        (0, None) => "*".to_string(),
        (1, None) => "+".to_string(),
        (min, Some(max)) if min == max => format!("{{{min}}}"),
        (min, Some(max)) => format!("{{{min},{max}}}"),
        (min, None) => format!("{{{min},*}}"),
    }
}

fn plantuml(classes: &IndexMap<String, UmlClass>) -> String {
    let ids = classes
        .keys()
        .enumerate()
        .map(|(index, name)| (name.as_str(), format!("S{index}")))
        .collect::<IndexMap<_, _>>();
    let mut out = String::from("@startuml\n");
    for (name, class) in classes {
        let id = &ids[name.as_str()];
        let _ = writeln!(out, "class \"{}\" as {id} {{", class.name.replace('"', "'"));
        for field in &class.fields {
            let _ = writeln!(out, "  {} : {} {}", field.name, field.value, field.cardinality);
        }
        out.push_str("}\n");
    }
    for (name, class) in classes {
        let source = &ids[name.as_str()];
        for link in &class.links {
            let target = match ids.get(link.target.as_str()) {
                Some(target) => target.clone(),
                None => format!("\"{}\"", link.target.replace('"', "'")),
            };
            let _ = writeln!(
                out,
                "{source} --> \"{}\" {target} : {}",
                link.cardinality, link.label
            );
        }
    }
    out.push_str("@enduml\n");
    out
}

const LINE_HEIGHT: usize = 18;
const BOX_WIDTH: usize = 360;
const MARGIN: usize = 20;

fn svg(classes: &IndexMap<String, UmlClass>) -> String {
    let mut body = String::new();
    let mut y = MARGIN;
    for class in classes.values() {
        let lines = class
            .fields
            .iter()
            .map(|field| format!("{} : {} {}", field.name, field.value, field.cardinality))
            .chain(
                class
                    .links
                    .iter()
                    .map(|link| format!("{} → {} {}", link.label, link.target, link.cardinality)),
            )
            .collect::<Vec<_>>();
        let height = LINE_HEIGHT * (lines.len() + 1) + 8;
        let _ = writeln!(
            body,
            "  <rect x=\"{MARGIN}\" y=\"{y}\" width=\"{BOX_WIDTH}\" height=\"{height}\" fill=\"#fefece\" stroke=\"#a80036\"/>"
        );
        let _ = writeln!(
            body,
            "  <text x=\"{}\" y=\"{}\" font-weight=\"bold\">{}</text>",
            MARGIN + 8,
            y + LINE_HEIGHT,
            xml_escape(&class.name)
        );
        for (index, line) in lines.iter().enumerate() {
            let _ = writeln!(
                body,
                "  <text x=\"{}\" y=\"{}\">{}</text>",
                MARGIN + 8,
                y + LINE_HEIGHT * (index + 2),
                xml_escape(line.trim_end())
            );
        }
        y += height + MARGIN;
    }
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{y}\" font-family=\"monospace\" font-size=\"12\">\n{body}</svg>\n",
        BOX_WIDTH + 2 * MARGIN
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{SchemaEngine, SchemaFormat};

    const SHEX: &str = r#"
PREFIX ex: <http://example.org/>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
ex:Person { ex:name xsd:string ; ex:knows @ex:Person * ; ex:age xsd:integer ? }
"#;

    fn shex() -> Schema {
        Schema::parse(SHEX, &SchemaFormat::ShExC, SchemaEngine::ShEx, None).unwrap()
    }

    #[test]
    fn plantuml_lists_fields_and_links() {
        let rendered = PlantUmlRenderer.render(&shex()).unwrap();
        assert!(rendered.uml.starts_with("@startuml\n"));
        assert!(rendered.uml.contains("class \"ex:Person\" as S0 {"));
        assert!(rendered.uml.contains("  ex:name : xsd:string \n"));
        assert!(rendered.uml.contains("  ex:age : xsd:integer ?\n"));
        assert!(rendered.uml.contains("S0 --> \"*\" S0 : ex:knows"));
        assert!(rendered.uml.ends_with("@enduml\n"));
    }

    #[test]
    fn svg_is_escaped() {
        let rendered = PlantUmlRenderer.render(&shex()).unwrap();
        assert!(rendered.svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(rendered.svg.contains(">ex:Person</text>"));
        assert!(!rendered.svg.contains("<ex:"));
    }

    #[test]
    fn empty_schemas_cannot_be_drawn() {
        let empty = Schema::parse("PREFIX ex: <http://example.org/>", &SchemaFormat::ShExC, SchemaEngine::ShEx, None)
            .unwrap();
        assert_eq!(PlantUmlRenderer.render(&empty), Err(RenderError::Empty));
    }
}
