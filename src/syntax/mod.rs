//! Tokenizer and token cursor shared by the ShExC and shape map parsers.

mod lexer;

pub use lexer::{Lexer, Spanned, Token};

use crate::rdf::prefix::{PrefixMap, resolve_iri};
use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, SyntaxError>;

/// Position-tracking view over a token stream.
pub struct Cursor {
    tokens: Vec<Spanned>,
    pos: usize,
    pub base: Option<String>,
}

impl Cursor {
    pub fn new(tokens: Vec<Spanned>, base: Option<&str>) -> Self {
        Self {
            tokens,
            pos: 0,
            base: base.map(str::to_string),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens
            .get(self.pos + offset)
            .map(|spanned| &spanned.token)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn next(&mut self) -> ParseResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|spanned| spanned.token.clone())
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    pub fn error(&self, message: impl Into<String>) -> SyntaxError {
        let (line, column) = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|spanned| (spanned.line, spanned.column))
            .unwrap_or((1, 1));
        SyntaxError::new(line, column, message)
    }

    pub fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => self.error(format!("expected {expected}, found '{token}'")),
            None => self.error(format!("expected {expected}, found end of input")),
        }
    }

    pub fn is_punct(&self, symbol: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(found)) if *found == symbol)
    }

    pub fn eat_punct(&mut self, symbol: &str) -> bool {
        if self.is_punct(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, symbol: &str) -> ParseResult<()> {
        if self.eat_punct(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{symbol}'")))
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn is_iri_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::IriRef(_) | Token::PrefixedName(_, _))
        )
    }

    /// Resolves an `IriRef` or `PrefixedName` token.
    pub fn iri(&mut self, prefixes: &PrefixMap) -> ParseResult<NamedNode> {
        let token = self.next()?;
        self.resolve_token(&token, prefixes)
    }

    pub fn resolve_token(&self, token: &Token, prefixes: &PrefixMap) -> ParseResult<NamedNode> {
        let iri = match token {
            Token::IriRef(reference) => resolve_iri(self.base.as_deref(), reference)
                .map_err(|message| self.error(message))?,
            Token::PrefixedName(prefix, local) => prefixes
                .expand(prefix, local)
                .ok_or_else(|| self.error(format!("unknown prefix '{prefix}:'")))?,
            other => return Err(self.error(format!("expected an IRI, found '{other}'"))),
        };
        NamedNode::new(iri.clone()).map_err(|error| self.error(format!("invalid IRI <{iri}>: {error}")))
    }

    /// Parses an RDF literal: string with optional language or datatype,
    /// number or boolean.
    pub fn literal(&mut self, prefixes: &PrefixMap) -> ParseResult<Literal> {
        match self.next()? {
            Token::Str(value) => {
                if self.is_punct("@")
                    && matches!(self.peek_at(1), Some(Token::Ident(_)))
                {
                    self.pos += 1;
                    let Token::Ident(language) = self.next()? else {
                        return Err(self.error("expected a language tag"));
                    };
                    Literal::new_language_tagged_literal(value, language.to_ascii_lowercase())
                        .map_err(|error| self.error(error.to_string()))
                } else if self.eat_punct("^^") {
                    let datatype = self.iri(prefixes)?;
                    Ok(Literal::new_typed_literal(value, datatype))
                } else {
                    Ok(Literal::new_simple_literal(value))
                }
            }
            Token::Integer(value) => Ok(Literal::new_typed_literal(value, xsd::INTEGER)),
            Token::Decimal(value) => Ok(Literal::new_typed_literal(value, xsd::DECIMAL)),
            Token::Double(value) => Ok(Literal::new_typed_literal(value, xsd::DOUBLE)),
            Token::Ident(word) if word == "true" || word == "false" => {
                Ok(Literal::new_typed_literal(word, xsd::BOOLEAN))
            }
            other => Err(self.error(format!("expected a literal, found '{other}'"))),
        }
    }

    pub fn is_literal_start(&self) -> bool {
        match self.peek() {
            Some(Token::Str(_) | Token::Integer(_) | Token::Decimal(_) | Token::Double(_)) => true,
            Some(Token::Ident(word)) => word == "true" || word == "false",
            _ => false,
        }
    }

    /// IRI, blank node or literal, with `a` read as `rdf:type`.
    pub fn term(&mut self, prefixes: &PrefixMap) -> ParseResult<Term> {
        match self.peek() {
            Some(Token::BlankNode(_)) => {
                let Token::BlankNode(label) = self.next()? else {
                    return Err(self.error("expected a blank node"));
                };
                BlankNode::new(label.clone())
                    .map(Term::BlankNode)
                    .map_err(|error| self.error(format!("invalid blank node _:{label}: {error}")))
            }
            Some(Token::Ident(word)) if word == "a" => {
                self.pos += 1;
                Ok(Term::NamedNode(rdf::TYPE.into_owned()))
            }
            _ if self.is_literal_start() => self.literal(prefixes).map(Term::Literal),
            _ => self.iri(prefixes).map(Term::NamedNode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(source: &str) -> Cursor {
        Cursor::new(Lexer::new(source).tokenize().unwrap(), Some("http://base/"))
    }

    #[test]
    fn resolves_prefixed_and_relative_iris() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("ex", "http://example.org/");
        let mut cursor = cursor("ex:a <b>");
        assert_eq!(cursor.iri(&prefixes).unwrap().as_str(), "http://example.org/a");
        assert_eq!(cursor.iri(&prefixes).unwrap().as_str(), "http://base/b");
    }

    #[test]
    fn unknown_prefixes_are_errors() {
        let error = cursor("nope:a").iri(&PrefixMap::new()).unwrap_err();
        assert!(error.message.contains("nope"));
    }

    #[test]
    fn parses_literals() {
        let prefixes = PrefixMap::new();
        let mut cursor = cursor(r#""chat"@FR 42 true "1"^^<http://www.w3.org/2001/XMLSchema#int>"#);
        assert_eq!(cursor.literal(&prefixes).unwrap().language(), Some("fr"));
        assert_eq!(cursor.literal(&prefixes).unwrap().datatype(), xsd::INTEGER);
        assert_eq!(cursor.literal(&prefixes).unwrap().datatype(), xsd::BOOLEAN);
        assert_eq!(
            cursor.literal(&prefixes).unwrap().datatype().as_str(),
            "http://www.w3.org/2001/XMLSchema#int"
        );
    }
}
