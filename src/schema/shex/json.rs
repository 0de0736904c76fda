//! ShExJ, the JSON-LD serialization of ShEx. Both the 2.0 layout (shape
//! expressions carrying an `id`) and the 2.1 `ShapeDecl` wrapper are read;
//! `ShapeDecl` is written.

use super::{
    Annotation, Cardinality, Facet, NodeConstraint, NodeKind, Shape, ShapeExpr, ShexSchema,
    TripleConstraint, TripleExpr, ValueSetValue,
};
use crate::shapemap::ShapeLabel;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};
use serde_json::{Map, Value, json};

const CONTEXT: &str = "http://www.w3.org/ns/shex.jsonld";

pub fn to_shexj(schema: &ShexSchema) -> Value {
    let mut root = Map::new();
    root.insert("@context".into(), json!(CONTEXT));
    root.insert("type".into(), json!("Schema"));
    if let Some(start) = &schema.start {
        root.insert("start".into(), shape_expr_json(start));
    }
    if !schema.shapes.is_empty() {
        let shapes = schema
            .shapes
            .iter()
            .map(|(label, expr)| {
                json!({
                    "type": "ShapeDecl",
                    "id": label_json(label),
                    "shapeExpr": shape_expr_json(expr),
                })
            })
            .collect();
        root.insert("shapes".into(), Value::Array(shapes));
    }
    Value::Object(root)
}

fn label_json(label: &ShapeLabel) -> String {
    match label {
        ShapeLabel::Iri(iri) => iri.as_str().to_string(),
        ShapeLabel::BNode(node) => format!("_:{}", node.as_str()),
        ShapeLabel::Start => "START".to_string(),
    }
}

fn shape_expr_json(expr: &ShapeExpr) -> Value {
    match expr {
        ShapeExpr::And(parts) => json!({
            "type": "ShapeAnd",
            "shapeExprs": parts.iter().map(shape_expr_json).collect::<Vec<_>>(),
        }),
        ShapeExpr::Or(parts) => json!({
            "type": "ShapeOr",
            "shapeExprs": parts.iter().map(shape_expr_json).collect::<Vec<_>>(),
        }),
        ShapeExpr::Not(inner) => json!({ "type": "ShapeNot", "shapeExpr": shape_expr_json(inner) }),
        ShapeExpr::NodeConstraint(constraint) => node_constraint_json(constraint),
        ShapeExpr::Shape(shape) => shape_json(shape),
        ShapeExpr::External => json!({ "type": "ShapeExternal" }),
        ShapeExpr::Ref(label) => json!(label_json(label)),
    }
}

fn node_constraint_json(constraint: &NodeConstraint) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), json!("NodeConstraint"));
    if let Some(kind) = constraint.node_kind {
        object.insert("nodeKind".into(), json!(kind.keyword().to_ascii_lowercase()));
    }
    if let Some(datatype) = &constraint.datatype {
        object.insert("datatype".into(), json!(datatype.as_str()));
    }
    if let Some(values) = &constraint.values {
        let values = values
            .iter()
            .map(|value| match value {
                ValueSetValue::Iri(iri) => json!(iri.as_str()),
                ValueSetValue::IriStem(stem) => json!({ "type": "IriStem", "stem": stem }),
                ValueSetValue::Literal(literal) => literal_json(literal),
                ValueSetValue::Language(tag) => json!({ "type": "Language", "languageTag": tag }),
            })
            .collect();
        object.insert("values".into(), Value::Array(values));
    }
    for facet in &constraint.facets {
        let (key, value) = match facet {
            Facet::Length(n) => ("length", json!(n)),
            Facet::MinLength(n) => ("minlength", json!(n)),
            Facet::MaxLength(n) => ("maxlength", json!(n)),
            Facet::TotalDigits(n) => ("totaldigits", json!(n)),
            Facet::FractionDigits(n) => ("fractiondigits", json!(n)),
            Facet::Pattern { pattern, flags } => {
                if !flags.is_empty() {
                    object.insert("flags".into(), json!(flags));
                }
                ("pattern", json!(pattern))
            }
            Facet::MinInclusive(literal) => ("mininclusive", numeric_json(literal)),
            Facet::MinExclusive(literal) => ("minexclusive", numeric_json(literal)),
            Facet::MaxInclusive(literal) => ("maxinclusive", numeric_json(literal)),
            Facet::MaxExclusive(literal) => ("maxexclusive", numeric_json(literal)),
        };
        object.insert(key.into(), value);
    }
    Value::Object(object)
}

fn numeric_json(literal: &Literal) -> Value {
    let lexical = literal.value();
    lexical
        .parse::<i64>()
        .map(Value::from)
        .or_else(|_| lexical.parse::<f64>().map(Value::from))
        .unwrap_or_else(|_| json!(lexical))
}

fn literal_json(literal: &Literal) -> Value {
    if let Some(language) = literal.language() {
        json!({ "value": literal.value(), "language": language })
    } else if literal.datatype() == xsd::STRING {
        json!({ "value": literal.value() })
    } else {
        json!({ "value": literal.value(), "type": literal.datatype().as_str() })
    }
}

fn term_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(node) => json!(node.as_str()),
        Term::Literal(literal) => literal_json(literal),
        other => json!(other.to_string()),
    }
}

fn shape_json(shape: &Shape) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), json!("Shape"));
    if shape.closed {
        object.insert("closed".into(), json!(true));
    }
    if !shape.extra.is_empty() {
        let extra = shape.extra.iter().map(|iri| json!(iri.as_str())).collect();
        object.insert("extra".into(), Value::Array(extra));
    }
    if let Some(expression) = &shape.expression {
        object.insert("expression".into(), triple_expr_json(expression));
    }
    if !shape.annotations.is_empty() {
        object.insert("annotations".into(), annotations_json(&shape.annotations));
    }
    Value::Object(object)
}

fn triple_expr_json(expr: &TripleExpr) -> Value {
    let mut object = Map::new();
    let cardinality = match expr {
        TripleExpr::EachOf {
            expressions,
            cardinality,
        }
        | TripleExpr::OneOf {
            expressions,
            cardinality,
        } => {
            let kind = if matches!(expr, TripleExpr::EachOf { .. }) {
                "EachOf"
            } else {
                "OneOf"
            };
            object.insert("type".into(), json!(kind));
            let members = expressions.iter().map(triple_expr_json).collect();
            object.insert("expressions".into(), Value::Array(members));
            *cardinality
        }
        TripleExpr::Constraint(constraint) => {
            object.insert("type".into(), json!("TripleConstraint"));
            if constraint.inverse {
                object.insert("inverse".into(), json!(true));
            }
            object.insert("predicate".into(), json!(constraint.predicate.as_str()));
            if let Some(value) = &constraint.value {
                object.insert("valueExpr".into(), shape_expr_json(value));
            }
            if !constraint.annotations.is_empty() {
                object.insert("annotations".into(), annotations_json(&constraint.annotations));
            }
            constraint.cardinality
        }
    };
    if !cardinality.is_one() {
        object.insert("min".into(), json!(cardinality.min));
        object.insert(
            "max".into(),
            json!(cardinality.max.map(i64::from).unwrap_or(-1)),
        );
    }
    Value::Object(object)
}

fn annotations_json(annotations: &[Annotation]) -> Value {
    annotations
        .iter()
        .map(|annotation| {
            json!({
                "type": "Annotation",
                "predicate": annotation.predicate.as_str(),
                "object": term_json(&annotation.object),
            })
        })
        .collect()
}

type JsonResult<T> = Result<T, String>;

/// Reads a ShExJ document.
pub fn from_shexj(text: &str) -> JsonResult<ShexSchema> {
    let root: Value = serde_json::from_str(text).map_err(|error| error.to_string())?;
    let object = root.as_object().ok_or("a ShExJ schema must be a JSON object")?;
    if object.get("type").and_then(Value::as_str) != Some("Schema") {
        return Err("a ShExJ schema must have \"type\": \"Schema\"".into());
    }
    if object.contains_key("imports") {
        return Err("imports are not supported".into());
    }
    let mut schema = ShexSchema::default();
    if let Some(start) = object.get("start") {
        schema.start = Some(shape_expr(start)?);
    }
    for declaration in object
        .get("shapes")
        .map(|shapes| shapes.as_array().ok_or("\"shapes\" must be an array"))
        .transpose()?
        .into_iter()
        .flatten()
    {
        let id = declaration
            .get("id")
            .and_then(Value::as_str)
            .ok_or("every shape declaration needs an \"id\"")?;
        let label = label(id)?;
        let expr = if declaration.get("type").and_then(Value::as_str) == Some("ShapeDecl") {
            shape_expr(
                declaration
                    .get("shapeExpr")
                    .ok_or_else(|| format!("ShapeDecl {id} has no \"shapeExpr\""))?,
            )?
        } else {
            shape_expr(declaration)?
        };
        if schema.shapes.insert(label, expr).is_some() {
            return Err(format!("shape {id} is declared twice"));
        }
    }
    Ok(schema)
}

fn label(id: &str) -> JsonResult<ShapeLabel> {
    match id.strip_prefix("_:") {
        Some(local) => BlankNode::new(local)
            .map(ShapeLabel::BNode)
            .map_err(|error| format!("invalid blank node {id}: {error}")),
        None => iri(id).map(ShapeLabel::Iri),
    }
}

fn iri(value: &str) -> JsonResult<NamedNode> {
    NamedNode::new(value).map_err(|error| format!("invalid IRI <{value}>: {error}"))
}

fn str_field<'a>(object: &'a Value, key: &str) -> JsonResult<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing string field \"{key}\""))
}

fn array_field<'a>(object: &'a Value, key: &str) -> JsonResult<&'a Vec<Value>> {
    object
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("missing array field \"{key}\""))
}

fn shape_expr(value: &Value) -> JsonResult<ShapeExpr> {
    if let Some(reference) = value.as_str() {
        return label(reference).map(ShapeExpr::Ref);
    }
    match str_field(value, "type")? {
        "ShapeAnd" => array_field(value, "shapeExprs")?
            .iter()
            .map(shape_expr)
            .collect::<JsonResult<_>>()
            .map(ShapeExpr::And),
        "ShapeOr" => array_field(value, "shapeExprs")?
            .iter()
            .map(shape_expr)
            .collect::<JsonResult<_>>()
            .map(ShapeExpr::Or),
        "ShapeNot" => {
            let inner = value.get("shapeExpr").ok_or("ShapeNot needs \"shapeExpr\"")?;
            Ok(ShapeExpr::Not(Box::new(shape_expr(inner)?)))
        }
        "NodeConstraint" => node_constraint(value).map(ShapeExpr::NodeConstraint),
        "Shape" => shape(value).map(ShapeExpr::shape),
        "ShapeExternal" => Ok(ShapeExpr::External),
        other => Err(format!("unknown shape expression type {other}")),
    }
}

fn node_constraint(value: &Value) -> JsonResult<NodeConstraint> {
    let mut constraint = NodeConstraint::default();
    if let Some(kind) = value.get("nodeKind").and_then(Value::as_str) {
        constraint.node_kind = Some(match kind {
            "iri" => NodeKind::Iri,
            "bnode" => NodeKind::BNode,
            "nonliteral" => NodeKind::NonLiteral,
            "literal" => NodeKind::Literal,
            other => return Err(format!("unknown nodeKind {other}")),
        });
    }
    if let Some(datatype) = value.get("datatype").and_then(Value::as_str) {
        constraint.datatype = Some(iri(datatype)?);
    }
    if let Some(values) = value.get("values") {
        let values = values.as_array().ok_or("\"values\" must be an array")?;
        constraint.values = Some(values.iter().map(value_set_value).collect::<JsonResult<_>>()?);
    }
    let count = |key: &str| -> JsonResult<Option<usize>> {
        value
            .get(key)
            .map(|n| {
                n.as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| format!("\"{key}\" must be a non-negative integer"))
            })
            .transpose()
    };
    let counts: [(&str, fn(usize) -> Facet); 5] = [
        ("length", Facet::Length),
        ("minlength", Facet::MinLength),
        ("maxlength", Facet::MaxLength),
        ("totaldigits", Facet::TotalDigits),
        ("fractiondigits", Facet::FractionDigits),
    ];
    for (key, facet) in counts {
        if let Some(n) = count(key)? {
            constraint.facets.push(facet(n));
        }
    }
    if let Some(pattern) = value.get("pattern").and_then(Value::as_str) {
        let flags = value.get("flags").and_then(Value::as_str).unwrap_or_default();
        constraint.facets.push(Facet::Pattern {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
        });
    }
    let numerics: [(&str, fn(Literal) -> Facet); 4] = [
        ("mininclusive", Facet::MinInclusive),
        ("minexclusive", Facet::MinExclusive),
        ("maxinclusive", Facet::MaxInclusive),
        ("maxexclusive", Facet::MaxExclusive),
    ];
    for (key, facet) in numerics {
        if let Some(number) = value.get(key) {
            constraint.facets.push(facet(numeric_literal(key, number)?));
        }
    }
    Ok(constraint)
}

fn numeric_literal(key: &str, number: &Value) -> JsonResult<Literal> {
    match number {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            Ok(Literal::new_typed_literal(n.to_string(), xsd::INTEGER))
        }
        Value::Number(n) => Ok(Literal::new_typed_literal(n.to_string(), xsd::DECIMAL)),
        _ => Err(format!("\"{key}\" must be a number")),
    }
}

fn value_set_value(value: &Value) -> JsonResult<ValueSetValue> {
    if let Some(iri_value) = value.as_str() {
        return iri(iri_value).map(ValueSetValue::Iri);
    }
    match value.get("type").and_then(Value::as_str) {
        Some("IriStem") => Ok(ValueSetValue::IriStem(str_field(value, "stem")?.to_string())),
        Some("Language") => Ok(ValueSetValue::Language(
            str_field(value, "languageTag")?.to_ascii_lowercase(),
        )),
        Some(kind) if kind.ends_with("Stem") || kind.ends_with("StemRange") => {
            Err(format!("{kind} values are not supported"))
        }
        _ => literal(value).map(ValueSetValue::Literal),
    }
}

fn literal(value: &Value) -> JsonResult<Literal> {
    let lexical = str_field(value, "value")?;
    if let Some(language) = value.get("language").and_then(Value::as_str) {
        return Literal::new_language_tagged_literal(lexical, language.to_ascii_lowercase())
            .map_err(|error| error.to_string());
    }
    match value.get("type").and_then(Value::as_str) {
        Some(datatype) => Ok(Literal::new_typed_literal(lexical, iri(datatype)?)),
        None => Ok(Literal::new_simple_literal(lexical)),
    }
}

fn shape(value: &Value) -> JsonResult<Shape> {
    let mut shape = Shape {
        closed: value.get("closed").and_then(Value::as_bool).unwrap_or(false),
        ..Shape::default()
    };
    if let Some(extra) = value.get("extra") {
        let extra = extra.as_array().ok_or("\"extra\" must be an array")?;
        for predicate in extra {
            let predicate = predicate.as_str().ok_or("\"extra\" entries must be IRIs")?;
            shape.extra.push(iri(predicate)?);
        }
    }
    if let Some(expression) = value.get("expression") {
        shape.expression = Some(triple_expr(expression)?);
    }
    shape.annotations = annotations(value)?;
    Ok(shape)
}

fn cardinality(value: &Value) -> JsonResult<Cardinality> {
    let min = match value.get("min") {
        None => 1,
        Some(min) => min
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or("\"min\" must be a non-negative integer")?,
    };
    let max = match value.get("max").map(|max| max.as_i64()) {
        None => Some(1),
        Some(Some(-1)) => None,
        Some(Some(n)) => Some(u32::try_from(n).map_err(|_| "\"max\" is out of range")?),
        Some(None) => return Err("\"max\" must be an integer".into()),
    };
    Ok(Cardinality::new(min, max))
}

fn triple_expr(value: &Value) -> JsonResult<TripleExpr> {
    if value.is_string() {
        return Err("triple expression references are not supported".into());
    }
    match str_field(value, "type")? {
        kind @ ("EachOf" | "OneOf") => {
            let expressions = array_field(value, "expressions")?
                .iter()
                .map(triple_expr)
                .collect::<JsonResult<Vec<_>>>()?;
            let cardinality = cardinality(value)?;
            Ok(if kind == "EachOf" {
                TripleExpr::EachOf {
                    expressions,
                    cardinality,
                }
            } else {
                TripleExpr::OneOf {
                    expressions,
                    cardinality,
                }
            })
        }
        "TripleConstraint" => Ok(TripleExpr::Constraint(TripleConstraint {
            inverse: value.get("inverse").and_then(Value::as_bool).unwrap_or(false),
            predicate: iri(str_field(value, "predicate")?)?,
            value: value
                .get("valueExpr")
                .map(shape_expr)
                .transpose()?
                .map(Box::new),
            cardinality: cardinality(value)?,
            annotations: annotations(value)?,
        })),
        other => Err(format!("unknown triple expression type {other}")),
    }
}

fn annotations(value: &Value) -> JsonResult<Vec<Annotation>> {
    let Some(list) = value.get("annotations") else {
        return Ok(Vec::new());
    };
    list.as_array()
        .ok_or("\"annotations\" must be an array")?
        .iter()
        .map(|annotation| {
            let predicate = iri(str_field(annotation, "predicate")?)?;
            let object = match annotation.get("object") {
                Some(Value::String(object)) => Term::NamedNode(iri(object)?),
                Some(object) => Term::Literal(literal(object)?),
                None => return Err("annotations need an \"object\"".to_string()),
            };
            Ok(Annotation { predicate, object })
        })
        .collect()
}
