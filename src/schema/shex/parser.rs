use super::{
    Annotation, Cardinality, Facet, NodeConstraint, NodeKind, Shape, ShapeExpr, ShexSchema,
    TripleConstraint, TripleExpr, ValueSetValue,
};
use crate::rdf::prefix::{PrefixMap, resolve_iri};
use crate::shapemap::ShapeLabel;
use crate::syntax::{Cursor, Lexer, ParseResult, Token};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};

const FACET_KEYWORDS: &[&str] = &[
    "LENGTH",
    "MINLENGTH",
    "MAXLENGTH",
    "PATTERN",
    "MININCLUSIVE",
    "MINEXCLUSIVE",
    "MAXINCLUSIVE",
    "MAXEXCLUSIVE",
    "TOTALDIGITS",
    "FRACTIONDIGITS",
];

/// Parses ShExC text. `base` resolves relative IRIs until a `BASE`
/// directive replaces it.
pub fn parse_shexc(text: &str, base: Option<&str>) -> ParseResult<ShexSchema> {
    let tokens = Lexer::new(text).with_regex().tokenize()?;
    let mut parser = ShexcParser {
        cursor: Cursor::new(tokens, base),
        schema: ShexSchema {
            base: base.map(str::to_string),
            ..ShexSchema::default()
        },
    };
    parser.statements()?;
    Ok(parser.schema)
}

struct ShexcParser {
    cursor: Cursor,
    schema: ShexSchema,
}

impl ShexcParser {
    fn prefixes(&self) -> &PrefixMap {
        &self.schema.prefixes
    }

    fn iri(&mut self) -> ParseResult<NamedNode> {
        let token = self.cursor.next()?;
        self.cursor.resolve_token(&token, &self.schema.prefixes)
    }

    fn statements(&mut self) -> ParseResult<()> {
        while !self.cursor.at_end() {
            if self.cursor.eat_keyword("PREFIX") {
                self.prefix_decl()?;
            } else if self.cursor.eat_keyword("BASE") {
                self.base_decl()?;
            } else if self.cursor.is_keyword("IMPORT") {
                return Err(self.cursor.error("IMPORT is not supported"));
            } else if self.cursor.eat_keyword("START") {
                self.cursor.expect_punct("=")?;
                let start = self.shape_expr()?;
                self.schema.start = Some(start);
            } else if self.cursor.is_punct("%") {
                return Err(self.cursor.error("semantic actions are not supported"));
            } else {
                self.shape_decl()?;
            }
        }
        Ok(())
    }

    fn prefix_decl(&mut self) -> ParseResult<()> {
        let Token::PrefixedName(prefix, local) = self.cursor.next()? else {
            return Err(self.cursor.error("expected a prefix name such as 'ex:'"));
        };
        if !local.is_empty() {
            return Err(self.cursor.error(format!("malformed prefix '{prefix}:{local}'")));
        }
        let Token::IriRef(reference) = self.cursor.next()? else {
            return Err(self.cursor.error("expected a namespace IRI"));
        };
        let namespace = resolve_iri(self.cursor.base.as_deref(), &reference)
            .map_err(|message| self.cursor.error(message))?;
        self.schema.prefixes.insert(prefix, namespace);
        Ok(())
    }

    fn base_decl(&mut self) -> ParseResult<()> {
        let Token::IriRef(reference) = self.cursor.next()? else {
            return Err(self.cursor.error("expected a base IRI"));
        };
        let base = resolve_iri(self.cursor.base.as_deref(), &reference)
            .map_err(|message| self.cursor.error(message))?;
        self.cursor.base = Some(base.clone());
        self.schema.base = Some(base);
        Ok(())
    }

    fn shape_decl(&mut self) -> ParseResult<()> {
        let label = self.shape_label()?;
        let expr = if self.cursor.eat_keyword("EXTERNAL") {
            ShapeExpr::External
        } else {
            self.shape_expr()?
        };
        if self.schema.shapes.contains_key(&label) {
            return Err(self.cursor.error(format!(
                "shape {} is declared twice",
                label.display(self.prefixes())
            )));
        }
        self.schema.shapes.insert(label, expr);
        Ok(())
    }

    fn shape_label(&mut self) -> ParseResult<ShapeLabel> {
        match self.cursor.next()? {
            Token::BlankNode(label) => BlankNode::new(label.clone())
                .map(ShapeLabel::BNode)
                .map_err(|error| self.cursor.error(format!("invalid blank node _:{label}: {error}"))),
            token @ (Token::IriRef(_) | Token::PrefixedName(_, _)) => self
                .cursor
                .resolve_token(&token, &self.schema.prefixes)
                .map(ShapeLabel::Iri),
            other => Err(self.cursor.error(format!("expected a shape label, found '{other}'"))),
        }
    }

    fn shape_expr(&mut self) -> ParseResult<ShapeExpr> {
        let mut parts = vec![self.shape_and()?];
        while self.cursor.eat_keyword("OR") {
            parts.push(self.shape_and()?);
        }
        Ok(flatten(parts, ShapeExpr::Or))
    }

    fn shape_and(&mut self) -> ParseResult<ShapeExpr> {
        let mut parts = vec![self.shape_not()?];
        while self.cursor.eat_keyword("AND") {
            parts.push(self.shape_not()?);
        }
        Ok(flatten(parts, ShapeExpr::And))
    }

    fn shape_not(&mut self) -> ParseResult<ShapeExpr> {
        if self.cursor.eat_keyword("NOT") {
            Ok(ShapeExpr::Not(Box::new(self.shape_atom()?)))
        } else {
            self.shape_atom()
        }
    }

    fn shape_atom(&mut self) -> ParseResult<ShapeExpr> {
        if self.cursor.eat_punct("(") {
            let inner = self.shape_expr()?;
            self.cursor.expect_punct(")")?;
            return Ok(inner);
        }
        if self.cursor.eat_punct(".") {
            return Ok(ShapeExpr::NodeConstraint(NodeConstraint::default()));
        }
        if self.at_shape_or_ref() {
            return self.shape_or_ref();
        }
        let constraint = self.node_constraint()?;
        if self.at_shape_or_ref() {
            let shape = self.shape_or_ref()?;
            return Ok(ShapeExpr::And(vec![
                ShapeExpr::NodeConstraint(constraint),
                shape,
            ]));
        }
        Ok(ShapeExpr::NodeConstraint(constraint))
    }

    fn at_shape_or_ref(&self) -> bool {
        self.cursor.is_punct("@")
            || (self.cursor.is_punct("{") && !self.at_repeat())
            || self.cursor.is_keyword("CLOSED")
            || self.cursor.is_keyword("EXTRA")
    }

    /// `{` followed by an integer opens a `{m,n}` cardinality, not a shape.
    fn at_repeat(&self) -> bool {
        self.cursor.is_punct("{") && matches!(self.cursor.peek_at(1), Some(Token::Integer(_)))
    }

    fn shape_or_ref(&mut self) -> ParseResult<ShapeExpr> {
        if self.cursor.eat_punct("@") {
            return self.shape_label().map(ShapeExpr::Ref);
        }
        let mut shape = Shape::default();
        loop {
            if self.cursor.eat_keyword("CLOSED") {
                shape.closed = true;
            } else if self.cursor.eat_keyword("EXTRA") {
                while self.cursor.is_iri_start() || self.cursor.is_keyword("a") {
                    let predicate = self.predicate()?;
                    shape.extra.push(predicate);
                }
            } else {
                break;
            }
        }
        self.cursor.expect_punct("{")?;
        if !self.cursor.is_punct("}") {
            shape.expression = Some(self.triple_expr()?);
        }
        self.cursor.expect_punct("}")?;
        shape.annotations = self.annotations()?;
        self.reject_semantic_actions()?;
        Ok(ShapeExpr::shape(shape))
    }

    fn node_constraint(&mut self) -> ParseResult<NodeConstraint> {
        let mut constraint = NodeConstraint::default();
        if self.cursor.eat_keyword("LITERAL") {
            constraint.node_kind = Some(NodeKind::Literal);
        } else if self.cursor.eat_keyword("IRI") {
            constraint.node_kind = Some(NodeKind::Iri);
        } else if self.cursor.eat_keyword("BNODE") {
            constraint.node_kind = Some(NodeKind::BNode);
        } else if self.cursor.eat_keyword("NONLITERAL") {
            constraint.node_kind = Some(NodeKind::NonLiteral);
        } else if self.cursor.is_iri_start() {
            constraint.datatype = Some(self.iri()?);
        } else if self.cursor.eat_punct("[") {
            constraint.values = Some(self.value_set()?);
        } else if !self.at_facet() {
            return Err(self.cursor.unexpected("a shape expression"));
        }
        while self.at_facet() {
            let facet = self.facet()?;
            constraint.facets.push(facet);
        }
        Ok(constraint)
    }

    fn at_facet(&self) -> bool {
        matches!(self.cursor.peek(), Some(Token::Regex(_, _)))
            || FACET_KEYWORDS
                .iter()
                .any(|keyword| self.cursor.is_keyword(keyword))
    }

    fn facet(&mut self) -> ParseResult<Facet> {
        let keyword = match self.cursor.next()? {
            Token::Regex(pattern, flags) => return Ok(Facet::Pattern { pattern, flags }),
            Token::Ident(word) => word.to_ascii_uppercase(),
            other => return Err(self.cursor.error(format!("expected a facet, found '{other}'"))),
        };
        match keyword.as_str() {
            "LENGTH" => self.count().map(Facet::Length),
            "MINLENGTH" => self.count().map(Facet::MinLength),
            "MAXLENGTH" => self.count().map(Facet::MaxLength),
            "TOTALDIGITS" => self.count().map(Facet::TotalDigits),
            "FRACTIONDIGITS" => self.count().map(Facet::FractionDigits),
            "PATTERN" => match self.cursor.next()? {
                Token::Str(pattern) => Ok(Facet::Pattern {
                    pattern,
                    flags: String::new(),
                }),
                Token::Regex(pattern, flags) => Ok(Facet::Pattern { pattern, flags }),
                other => Err(self.cursor.error(format!("expected a pattern, found '{other}'"))),
            },
            "MININCLUSIVE" => self.numeric().map(Facet::MinInclusive),
            "MINEXCLUSIVE" => self.numeric().map(Facet::MinExclusive),
            "MAXINCLUSIVE" => self.numeric().map(Facet::MaxInclusive),
            "MAXEXCLUSIVE" => self.numeric().map(Facet::MaxExclusive),
            other => Err(self.cursor.error(format!("unknown facet {other}"))),
        }
    }

    fn count(&mut self) -> ParseResult<usize> {
        match self.cursor.next()? {
            Token::Integer(digits) => digits
                .parse()
                .map_err(|_| self.cursor.error(format!("'{digits}' is not a valid count"))),
            other => Err(self.cursor.error(format!("expected an integer, found '{other}'"))),
        }
    }

    fn numeric(&mut self) -> ParseResult<Literal> {
        let prefixes = self.schema.prefixes.clone();
        self.cursor.literal(&prefixes)
    }

    fn value_set(&mut self) -> ParseResult<Vec<ValueSetValue>> {
        let mut values = Vec::new();
        while !self.cursor.eat_punct("]") {
            if self.cursor.is_punct("-") {
                return Err(self.cursor.error("value set exclusions are not supported"));
            }
            if self.cursor.eat_punct("@") {
                let Token::Ident(language) = self.cursor.next()? else {
                    return Err(self.cursor.error("expected a language tag"));
                };
                values.push(ValueSetValue::Language(language.to_ascii_lowercase()));
            } else if self.cursor.is_iri_start() {
                let iri = self.iri()?;
                if self.cursor.eat_punct("~") {
                    values.push(ValueSetValue::IriStem(iri.into_string()));
                } else {
                    values.push(ValueSetValue::Iri(iri));
                }
            } else if self.cursor.is_literal_start() {
                let prefixes = self.schema.prefixes.clone();
                let literal = self.cursor.literal(&prefixes)?;
                if self.cursor.is_punct("~") {
                    return Err(self.cursor.error("literal stems are not supported"));
                }
                values.push(ValueSetValue::Literal(literal));
            } else {
                return Err(self.cursor.unexpected("a value set value or ']'"));
            }
        }
        Ok(values)
    }

    fn triple_expr(&mut self) -> ParseResult<TripleExpr> {
        let mut alternatives = vec![self.each_of()?];
        while self.cursor.eat_punct("|") {
            alternatives.push(self.each_of()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            TripleExpr::OneOf {
                expressions: alternatives,
                cardinality: Cardinality::ONE,
            }
        })
    }

    fn each_of(&mut self) -> ParseResult<TripleExpr> {
        let mut members = vec![self.unary_triple_expr()?];
        while self.cursor.eat_punct(";") {
            if self.cursor.is_punct("}") || self.cursor.is_punct(")") || self.cursor.is_punct("|") {
                break;
            }
            members.push(self.unary_triple_expr()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TripleExpr::EachOf {
                expressions: members,
                cardinality: Cardinality::ONE,
            }
        })
    }

    fn unary_triple_expr(&mut self) -> ParseResult<TripleExpr> {
        if self.cursor.is_punct("$") || self.cursor.is_punct("&") {
            return Err(self
                .cursor
                .error("triple expression labels and inclusions are not supported"));
        }
        if self.cursor.eat_punct("(") {
            let mut group = self.triple_expr()?;
            self.cursor.expect_punct(")")?;
            let cardinality = self.cardinality()?;
            self.annotations()?;
            self.reject_semantic_actions()?;
            match &mut group {
                TripleExpr::EachOf { cardinality: c, .. } | TripleExpr::OneOf { cardinality: c, .. } => {
                    *c = cardinality;
                    Ok(group)
                }
                TripleExpr::Constraint(_) if cardinality.is_one() => Ok(group),
                TripleExpr::Constraint(_) => Ok(TripleExpr::EachOf {
                    expressions: vec![group],
                    cardinality,
                }),
            }
        } else {
            self.triple_constraint().map(TripleExpr::Constraint)
        }
    }

    fn triple_constraint(&mut self) -> ParseResult<TripleConstraint> {
        let inverse = self.cursor.eat_punct("^");
        let predicate = self.predicate()?;
        let value = if self.at_repeat() {
            None
        } else {
            match self.shape_expr()? {
                ShapeExpr::NodeConstraint(constraint) if constraint.is_empty() => None,
                other => Some(Box::new(other)),
            }
        };
        let cardinality = self.cardinality()?;
        let annotations = self.annotations()?;
        self.reject_semantic_actions()?;
        Ok(TripleConstraint {
            inverse,
            predicate,
            value,
            cardinality,
            annotations,
        })
    }

    fn predicate(&mut self) -> ParseResult<NamedNode> {
        if self.cursor.eat_keyword("a") {
            Ok(rdf::TYPE.into_owned())
        } else {
            self.iri()
        }
    }

    fn cardinality(&mut self) -> ParseResult<Cardinality> {
        if self.cursor.eat_punct("*") {
            return Ok(Cardinality::new(0, None));
        }
        if self.cursor.eat_punct("+") {
            return Ok(Cardinality::new(1, None));
        }
        if self.cursor.eat_punct("?") {
            return Ok(Cardinality::new(0, Some(1)));
        }
        if !self.at_repeat() {
            return Ok(Cardinality::ONE);
        }
        self.cursor.expect_punct("{")?;
        let min = self.bound()?;
        let max = if self.cursor.eat_punct(",") {
            if self.cursor.eat_punct("*") || self.cursor.is_punct("}") {
                None
            } else {
                Some(self.bound()?)
            }
        } else {
            Some(min)
        };
        self.cursor.expect_punct("}")?;
        if max.is_some_and(|max| max < min) {
            return Err(self.cursor.error(format!(
                "cardinality maximum is below minimum {min}"
            )));
        }
        Ok(Cardinality::new(min, max))
    }

    fn bound(&mut self) -> ParseResult<u32> {
        match self.cursor.next()? {
            Token::Integer(digits) => digits
                .parse()
                .map_err(|_| self.cursor.error(format!("'{digits}' is not a valid bound"))),
            other => Err(self.cursor.error(format!("expected an integer, found '{other}'"))),
        }
    }

    fn annotations(&mut self) -> ParseResult<Vec<Annotation>> {
        let mut annotations = Vec::new();
        while self.cursor.eat_punct("//") {
            let predicate = self.predicate()?;
            let prefixes = self.schema.prefixes.clone();
            let object = if self.cursor.is_literal_start() {
                Term::Literal(self.cursor.literal(&prefixes)?)
            } else {
                Term::NamedNode(self.iri()?)
            };
            annotations.push(Annotation { predicate, object });
        }
        Ok(annotations)
    }

    fn reject_semantic_actions(&self) -> ParseResult<()> {
        if self.cursor.is_punct("%") {
            Err(self.cursor.error("semantic actions are not supported"))
        } else {
            Ok(())
        }
    }
}

fn flatten(mut parts: Vec<ShapeExpr>, combine: fn(Vec<ShapeExpr>) -> ShapeExpr) -> ShapeExpr {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        combine(parts)
    }
}
