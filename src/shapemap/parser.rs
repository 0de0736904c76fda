use super::{Association, NodeSelector, ShapeLabel};
use crate::rdf::prefix::PrefixMap;
use crate::syntax::{Cursor, Lexer, ParseResult, SyntaxError, Token};
use oxigraph::model::{BlankNode, Term};
use serde::Deserialize;

pub(super) fn parse_compact(
    text: &str,
    node_prefixes: &PrefixMap,
    shape_prefixes: &PrefixMap,
    base: Option<&str>,
) -> ParseResult<Vec<Association>> {
    let mut cursor = Cursor::new(Lexer::new(text).tokenize()?, base);
    let mut associations = Vec::new();
    while !cursor.at_end() {
        let node = node_selector(&mut cursor, node_prefixes)?;
        cursor.expect_punct("@")?;
        let shape = shape_label(&mut cursor, shape_prefixes)?;
        associations.push(Association { node, shape });
        if !cursor.eat_punct(",") && !cursor.at_end() {
            return Err(cursor.unexpected("',' or end of shape map"));
        }
    }
    Ok(associations)
}

#[derive(Deserialize)]
struct JsonAssociation {
    node: String,
    shape: String,
}

pub(super) fn parse_json(
    text: &str,
    node_prefixes: &PrefixMap,
    shape_prefixes: &PrefixMap,
    base: Option<&str>,
) -> ParseResult<Vec<Association>> {
    let entries: Vec<JsonAssociation> = serde_json::from_str(text)
        .map_err(|error| SyntaxError::new(error.line(), error.column(), error.to_string()))?;
    entries
        .into_iter()
        .map(|entry| {
            Ok(Association {
                node: parse_node_selector(&entry.node, node_prefixes, base)?,
                shape: parse_shape_label(&entry.shape, shape_prefixes, base)?,
            })
        })
        .collect()
}

/// Parses a single node selector such as `ex:alice` or `{FOCUS a ex:Person}`.
pub fn parse_node_selector(
    text: &str,
    prefixes: &PrefixMap,
    base: Option<&str>,
) -> ParseResult<NodeSelector> {
    let mut cursor = Cursor::new(Lexer::new(text).tokenize()?, base);
    let selector = node_selector(&mut cursor, prefixes)?;
    if !cursor.at_end() {
        return Err(cursor.unexpected("end of node selector"));
    }
    Ok(selector)
}

/// Parses a single shape label such as `<S>`, `ex:S` or `START`.
pub fn parse_shape_label(
    text: &str,
    prefixes: &PrefixMap,
    base: Option<&str>,
) -> ParseResult<ShapeLabel> {
    let mut cursor = Cursor::new(Lexer::new(text).tokenize()?, base);
    cursor.eat_punct("@");
    let label = shape_label(&mut cursor, prefixes)?;
    if !cursor.at_end() {
        return Err(cursor.unexpected("end of shape label"));
    }
    Ok(label)
}

fn node_selector(cursor: &mut Cursor, prefixes: &PrefixMap) -> ParseResult<NodeSelector> {
    if cursor.is_keyword("SPARQL") {
        return Err(cursor.error("SPARQL node selectors are not supported"));
    }
    if !cursor.eat_punct("{") {
        return cursor.term(prefixes).map(NodeSelector::Node);
    }
    let selector = if cursor.eat_keyword("FOCUS") {
        let predicate = predicate(cursor, prefixes)?;
        let object = pattern_term(cursor, prefixes)?;
        NodeSelector::SubjectsOf { predicate, object }
    } else {
        let subject = pattern_term(cursor, prefixes)?;
        let predicate = predicate(cursor, prefixes)?;
        if !cursor.eat_keyword("FOCUS") {
            return Err(cursor.unexpected("FOCUS"));
        }
        NodeSelector::ObjectsOf { subject, predicate }
    };
    cursor.expect_punct("}")?;
    Ok(selector)
}

fn predicate(cursor: &mut Cursor, prefixes: &PrefixMap) -> ParseResult<oxigraph::model::NamedNode> {
    match cursor.term(prefixes)? {
        Term::NamedNode(predicate) => Ok(predicate),
        other => Err(cursor.error(format!("predicate must be an IRI, found {other}"))),
    }
}

fn pattern_term(cursor: &mut Cursor, prefixes: &PrefixMap) -> ParseResult<Option<Term>> {
    if cursor.eat_punct("_") {
        Ok(None)
    } else {
        cursor.term(prefixes).map(Some)
    }
}

fn shape_label(cursor: &mut Cursor, prefixes: &PrefixMap) -> ParseResult<ShapeLabel> {
    if cursor.is_punct("!") {
        return Err(cursor.error("negated shape labels are only allowed in result shape maps"));
    }
    if cursor.eat_keyword("START") {
        return Ok(ShapeLabel::Start);
    }
    match cursor.peek() {
        Some(Token::BlankNode(_)) => match cursor.next()? {
            Token::BlankNode(label) => BlankNode::new(label.clone())
                .map(ShapeLabel::BNode)
                .map_err(|error| cursor.error(format!("invalid blank node _:{label}: {error}"))),
            _ => Err(cursor.unexpected("a shape label")),
        },
        Some(Token::IriRef(_) | Token::PrefixedName(_, _)) => {
            cursor.iri(prefixes).map(ShapeLabel::Iri)
        }
        _ => Err(cursor.unexpected("a shape label")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ShapeMapFormat;
    use crate::shapemap::QueryShapeMap;

    const BASE: Option<&str> = Some("internal://base/");

    #[test]
    fn parses_the_minimal_shape_map() {
        let map = QueryShapeMap::parse(
            "<a>@<S>",
            ShapeMapFormat::Compact,
            &PrefixMap::new(),
            &PrefixMap::new(),
            BASE,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.associations[0].shape.to_string(), "<internal://base/S>");
        assert_eq!(
            map.associations[0].node,
            NodeSelector::Node(Term::NamedNode(
                oxigraph::model::NamedNode::new("internal://base/a").unwrap()
            ))
        );
    }

    #[test]
    fn empty_text_is_an_empty_map() {
        let map = QueryShapeMap::parse(
            "  ",
            ShapeMapFormat::Compact,
            &PrefixMap::new(),
            &PrefixMap::new(),
            BASE,
        )
        .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn parses_literals_start_and_patterns() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("ex", "http://example.org/");
        let map = QueryShapeMap::parse(
            "\"hello\"@en@ex:S, ex:a@START, {FOCUS ex:p _}@ex:T",
            ShapeMapFormat::Compact,
            &prefixes,
            &prefixes,
            BASE,
        )
        .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.associations[1].shape, ShapeLabel::Start);
        assert!(matches!(
            map.associations[2].node,
            NodeSelector::SubjectsOf { object: None, .. }
        ));
    }

    #[test]
    fn parses_json_shape_maps() {
        let map = QueryShapeMap::parse(
            r#"[{"node": "<http://example.org/a>", "shape": "<http://example.org/S>"}]"#,
            ShapeMapFormat::Json,
            &PrefixMap::new(),
            &PrefixMap::new(),
            BASE,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn rejects_malformed_maps() {
        for text in ["<a>", "<a>@", "<a>@<S> <b>@<T>", "{FOCUS <p>}@<S>", "x:a@<S>"] {
            assert!(
                QueryShapeMap::parse(
                    text,
                    ShapeMapFormat::Compact,
                    &PrefixMap::new(),
                    &PrefixMap::new(),
                    BASE
                )
                .is_err(),
                "{text} should not parse"
            );
        }
    }
}
