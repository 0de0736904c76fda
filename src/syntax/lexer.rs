use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `<...>` with escapes removed.
    IriRef(String),
    /// `prefix:local`, either part may be empty.
    PrefixedName(String, String),
    /// `_:label`
    BlankNode(String),
    /// Quoted string with escapes removed.
    Str(String),
    Integer(String),
    Decimal(String),
    Double(String),
    /// Bare word such as a keyword or a language tag.
    Ident(String),
    /// `/pattern/flags`
    Regex(String, String),
    Punct(&'static str),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::IriRef(iri) => write!(f, "<{iri}>"),
            Token::PrefixedName(prefix, local) => write!(f, "{prefix}:{local}"),
            Token::BlankNode(label) => write!(f, "_:{label}"),
            Token::Str(value) => write!(f, "\"{value}\""),
            Token::Integer(n) | Token::Decimal(n) | Token::Double(n) => f.write_str(n),
            Token::Ident(word) => f.write_str(word),
            Token::Regex(pattern, flags) => write!(f, "/{pattern}/{flags}"),
            Token::Punct(symbol) => f.write_str(symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

const PUNCTUATION: &[&str] = &[
    "^^", "//", "{", "}", "(", ")", "[", "]", "@", ",", ";", "|", ".", "^", "*", "+", "?", "=",
    "~", "-", "!", "$", "&", "%", "_",
];

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Regular expressions are only recognised where a `/` cannot start an
    /// annotation, so the caller opts in.
    regex_enabled: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            regex_enabled: false,
        }
    }

    pub fn with_regex(mut self) -> Self {
        self.regex_enabled = true;
        self
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.chars.len() {
                return Ok(tokens);
            }
            let (line, column) = (self.line, self.column);
            let token = self.next_token()?;
            tokens.push(Spanned {
                token,
                line,
                column,
            });
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line, self.column, message)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };
        match c {
            '<' => self.iri_ref(),
            '"' | '\'' => self.string(c),
            '_' if self.peek_at(1) == Some(':') => {
                self.bump();
                self.bump();
                Ok(Token::BlankNode(self.name_chars()))
            }
            '/' if self.regex_enabled && self.peek_at(1) != Some('/') => self.regex(),
            c if c.is_ascii_digit() => Ok(self.number()),
            '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => Ok(self.number()),
            '+' | '-' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit() || d == '.') => {
                Ok(self.number())
            }
            ':' => {
                self.bump();
                Ok(Token::PrefixedName(String::new(), self.local_name()))
            }
            c if c.is_alphabetic() => {
                let word = self.name_chars();
                if self.peek() == Some(':') {
                    self.bump();
                    Ok(Token::PrefixedName(word, self.local_name()))
                } else {
                    Ok(Token::Ident(word))
                }
            }
            _ => {
                for symbol in PUNCTUATION {
                    let matches = symbol
                        .chars()
                        .enumerate()
                        .all(|(offset, expected)| self.peek_at(offset) == Some(expected));
                    if matches {
                        for _ in 0..symbol.chars().count() {
                            self.bump();
                        }
                        return Ok(Token::Punct(symbol));
                    }
                }
                Err(self.error(format!("unexpected character '{c}'")))
            }
        }
    }

    fn iri_ref(&mut self) -> Result<Token, SyntaxError> {
        self.bump();
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(Token::IriRef(iri)),
                Some('\\') => iri.push(self.escape()?),
                Some(c) if c.is_whitespace() => {
                    return Err(self.error("whitespace inside IRI reference"));
                }
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI reference")),
            }
        }
    }

    fn escape(&mut self) -> Result<char, SyntaxError> {
        let c = self.bump().ok_or_else(|| self.error("dangling escape"))?;
        let hex = |lexer: &mut Self, len: usize| -> Result<char, SyntaxError> {
            let digits = (0..len).filter_map(|_| lexer.bump()).collect::<String>();
            u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| lexer.error(format!("invalid unicode escape '{digits}'")))
        };
        match c {
            'n' => Ok('\n'),
            't' => Ok('\t'),
            'r' => Ok('\r'),
            'b' => Ok('\u{8}'),
            'f' => Ok('\u{c}'),
            'u' => hex(self, 4),
            'U' => hex(self, 8),
            other => Ok(other),
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, SyntaxError> {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter_len = if long { 3 } else { 1 };
        for _ in 0..delimiter_len {
            self.bump();
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    if !long {
                        self.bump();
                        return Ok(Token::Str(value));
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        for _ in 0..3 {
                            self.bump();
                        }
                        return Ok(Token::Str(value));
                    }
                    self.bump();
                    value.push(c);
                }
                Some('\\') => {
                    self.bump();
                    value.push(self.escape()?);
                }
                Some('\n') if !long => return Err(self.error("newline inside string")),
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
    }

    fn regex(&mut self) -> Result<Token, SyntaxError> {
        self.bump();
        let mut pattern = String::new();
        loop {
            match self.bump() {
                Some('/') => break,
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("dangling escape"))?;
                    if escaped != '/' {
                        pattern.push('\\');
                    }
                    pattern.push(escaped);
                }
                Some('\n') | None => return Err(self.error("unterminated regular expression")),
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek().filter(|c| matches!(c, 's' | 'm' | 'i' | 'x' | 'q')) {
            self.bump();
            flags.push(c);
        }
        Ok(Token::Regex(pattern, flags))
    }

    fn number(&mut self) -> Token {
        let mut text = String::new();
        if let Some(sign) = self.peek().filter(|c| matches!(c, '+' | '-')) {
            self.bump();
            text.push(sign);
        }
        let mut decimal = false;
        let mut double = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !decimal && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                decimal = true;
                text.push(c);
                self.bump();
            } else if matches!(c, 'e' | 'E') && !double {
                double = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek().filter(|c| matches!(c, '+' | '-')) {
                    text.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }
        if double {
            Token::Double(text)
        } else if decimal {
            Token::Decimal(text)
        } else {
            Token::Integer(text)
        }
    }

    fn name_chars(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self
            .peek()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
        {
            self.bump();
            name.push(c);
        }
        name
    }

    /// Local part of a prefixed name. A trailing `.` ends the statement.
    fn local_name(&mut self) -> String {
        let mut local = String::new();
        while let Some(c) = self.peek() {
            let continues = c.is_alphanumeric()
                || matches!(c, '_' | '-' | ':' | '%')
                || (c == '.'
                    && self
                        .peek_at(1)
                        .is_some_and(|next| next.is_alphanumeric() || matches!(next, '_' | '-')));
            if !continues {
                break;
            }
            self.bump();
            local.push(c);
        }
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn lexes_shape_declarations() {
        assert_eq!(
            tokens("<S> { ex:p . ; }"),
            vec![
                Token::IriRef("S".into()),
                Token::Punct("{"),
                Token::PrefixedName("ex".into(), "p".into()),
                Token::Punct("."),
                Token::Punct(";"),
                Token::Punct("}"),
            ]
        );
    }

    #[test]
    fn trailing_dot_is_not_part_of_a_local_name() {
        assert_eq!(
            tokens("ex:a.b ex:c."),
            vec![
                Token::PrefixedName("ex".into(), "a.b".into()),
                Token::PrefixedName("ex".into(), "c".into()),
                Token::Punct("."),
            ]
        );
    }

    #[test]
    fn lexes_literals_and_numbers() {
        assert_eq!(
            tokens(r#""a\"b"@en 12 -3.5 1e3 '''long'''"#),
            vec![
                Token::Str("a\"b".into()),
                Token::Punct("@"),
                Token::Ident("en".into()),
                Token::Integer("12".into()),
                Token::Decimal("-3.5".into()),
                Token::Double("1e3".into()),
                Token::Str("long".into()),
            ]
        );
    }

    #[test]
    fn comments_and_cardinalities() {
        assert_eq!(
            tokens("# comment\n:p xsd:int {1,3} // :q \"x\""),
            vec![
                Token::PrefixedName("".into(), "p".into()),
                Token::PrefixedName("xsd".into(), "int".into()),
                Token::Punct("{"),
                Token::Integer("1".into()),
                Token::Punct(","),
                Token::Integer("3".into()),
                Token::Punct("}"),
                Token::Punct("//"),
                Token::PrefixedName("".into(), "q".into()),
                Token::Str("x".into()),
            ]
        );
    }

    #[test]
    fn regex_only_when_enabled() {
        let lexed = Lexer::new("/^a+$/i").with_regex().tokenize().unwrap();
        assert_eq!(lexed[0].token, Token::Regex("^a+$".into(), "i".into()));
    }

    #[test]
    fn reports_positions() {
        let error = Lexer::new("<a>\n  <b c>").tokenize().unwrap_err();
        assert_eq!(error.line, 2);
    }
}
