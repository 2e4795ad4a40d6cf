//! Shared lexer for Turtle-star documents and SPARQL-star queries.
//!
//! Produces a flat token stream with one-based line/column positions so the
//! recursive-descent parsers can report exact error locations.

use crate::{StarError, StarResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `<http://...>`
    IriRef(String),
    /// `ex:name`, `:name`, with the prefix part before the first colon
    PrefixedName { prefix: String, local: String },
    /// `_:label`
    BlankNodeLabel(String),
    /// `"..."` with escapes already resolved
    StringLiteral(String),
    /// `?name` or `$name`
    Variable(String),
    /// `@en`, `@en-US`
    LangTag(String),
    /// `@prefix` directive
    AtPrefix,
    /// `@base` directive
    AtBase,
    /// Bare word: `a`, `true`, keywords such as `SELECT` or `PREFIX`
    Ident(String),
    Integer(String),
    Decimal(String),
    Double(String),
    Dot,
    Semicolon,
    Comma,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    /// `<<`
    QuoteOpen,
    /// `>>`
    QuoteClose,
    /// `^^`
    CaretCaret,
    Star,
    Equals,
    NotEquals,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

impl Token {
    /// Case-insensitive keyword test for bare words.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Tokenizes a full input. Fails on the first lexical error.
pub fn tokenize(input: &str) -> StarResult<Vec<SpannedToken>> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> StarResult<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let line = self.line;
            let column = self.column;
            let Some(&c) = self.chars.peek() else {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };
            let token = self.next_token(c, line, column)?;
            tokens.push(SpannedToken {
                token,
                line,
                column,
            });
        }
    }

    fn next_token(&mut self, c: char, line: usize, column: usize) -> StarResult<Token> {
        match c {
            '<' => {
                self.bump();
                match self.chars.peek() {
                    Some('<') => {
                        self.bump();
                        Ok(Token::QuoteOpen)
                    }
                    Some('=') => {
                        self.bump();
                        Ok(Token::LessEq)
                    }
                    // A digit or sign after '<' reads as a comparison with a
                    // numeric literal, so an IRI ref cannot start with one.
                    Some(&next)
                        if !next.is_whitespace()
                            && !next.is_ascii_digit()
                            && !matches!(next, '?' | '$' | '+' | '-') =>
                    {
                        self.lex_iri_ref(line, column)
                    }
                    _ => Ok(Token::Less),
                }
            }
            '>' => {
                self.bump();
                match self.chars.peek() {
                    Some('>') => {
                        self.bump();
                        Ok(Token::QuoteClose)
                    }
                    Some('=') => {
                        self.bump();
                        Ok(Token::GreaterEq)
                    }
                    _ => Ok(Token::Greater),
                }
            }
            '"' => {
                self.bump();
                self.lex_string(line, column)
            }
            '@' => {
                self.bump();
                let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-');
                if word.is_empty() {
                    return Err(StarError::parse_error(
                        line,
                        column,
                        "expected language tag or directive after '@'",
                    ));
                }
                match word.as_str() {
                    "prefix" => Ok(Token::AtPrefix),
                    "base" => Ok(Token::AtBase),
                    _ => Ok(Token::LangTag(word)),
                }
            }
            '_' => {
                self.bump();
                if self.chars.peek() != Some(&':') {
                    return Err(StarError::parse_error(
                        line,
                        column,
                        "expected ':' after '_' in blank node label",
                    ));
                }
                self.bump();
                let label = self.take_name();
                if label.is_empty() {
                    return Err(StarError::parse_error(line, column, "empty blank node label"));
                }
                Ok(Token::BlankNodeLabel(label))
            }
            '?' | '$' => {
                self.bump();
                let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                if name.is_empty() {
                    return Err(StarError::parse_error(line, column, "empty variable name"));
                }
                Ok(Token::Variable(name))
            }
            '^' => {
                self.bump();
                if self.chars.peek() == Some(&'^') {
                    self.bump();
                    Ok(Token::CaretCaret)
                } else {
                    Err(StarError::parse_error(line, column, "expected '^^'"))
                }
            }
            '*' => {
                self.bump();
                Ok(Token::Star)
            }
            '=' => {
                self.bump();
                Ok(Token::Equals)
            }
            '!' => {
                self.bump();
                if self.chars.peek() == Some(&'=') {
                    self.bump();
                    Ok(Token::NotEquals)
                } else {
                    Ok(Token::Bang)
                }
            }
            '&' => {
                self.bump();
                if self.chars.peek() == Some(&'&') {
                    self.bump();
                    Ok(Token::AndAnd)
                } else {
                    Err(StarError::parse_error(line, column, "expected '&&'"))
                }
            }
            '|' => {
                self.bump();
                if self.chars.peek() == Some(&'|') {
                    self.bump();
                    Ok(Token::OrOr)
                } else {
                    Err(StarError::parse_error(line, column, "expected '||'"))
                }
            }
            ';' => {
                self.bump();
                Ok(Token::Semicolon)
            }
            ',' => {
                self.bump();
                Ok(Token::Comma)
            }
            '(' => {
                self.bump();
                Ok(Token::OpenParen)
            }
            ')' => {
                self.bump();
                Ok(Token::CloseParen)
            }
            '[' => {
                self.bump();
                Ok(Token::OpenBracket)
            }
            ']' => {
                self.bump();
                Ok(Token::CloseBracket)
            }
            '{' => {
                self.bump();
                Ok(Token::OpenBrace)
            }
            '}' => {
                self.bump();
                Ok(Token::CloseBrace)
            }
            '.' => {
                // A dot starts a number only when a digit follows.
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.lex_number(line, column)
                } else {
                    self.bump();
                    Ok(Token::Dot)
                }
            }
            '+' | '-' => {
                let mut ahead = self.chars.clone();
                ahead.next();
                match ahead.peek() {
                    Some(c) if c.is_ascii_digit() || *c == '.' => self.lex_number(line, column),
                    _ => Err(StarError::parse_error(
                        line,
                        column,
                        format!("unexpected character '{c}'"),
                    )),
                }
            }
            c if c.is_ascii_digit() => self.lex_number(line, column),
            c if c.is_alphanumeric() || c == ':' => self.lex_word(line, column),
            other => Err(StarError::parse_error(
                line,
                column,
                format!("unexpected character '{other}'"),
            )),
        }
    }

    fn lex_iri_ref(&mut self, line: usize, column: usize) -> StarResult<Token> {
        let mut iri = String::new();
        loop {
            match self.chars.peek() {
                Some('>') => {
                    self.bump();
                    return Ok(Token::IriRef(iri));
                }
                Some('\n') | None => {
                    return Err(StarError::parse_error(line, column, "unterminated IRI"));
                }
                Some(&c) => {
                    self.bump();
                    iri.push(c);
                }
            }
        }
    }

    fn lex_string(&mut self, line: usize, column: usize) -> StarResult<Token> {
        let mut value = String::new();
        loop {
            match self.chars.peek().copied() {
                None | Some('\n') => {
                    return Err(StarError::parse_error(line, column, "unterminated string literal"));
                }
                Some('"') => {
                    self.bump();
                    return Ok(Token::StringLiteral(value));
                }
                Some('\\') => {
                    self.bump();
                    let escaped = self.chars.peek().copied().ok_or_else(|| {
                        StarError::parse_error(line, column, "unterminated string escape")
                    })?;
                    self.bump();
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => value.push(self.lex_unicode_escape(4, line, column)?),
                        'U' => value.push(self.lex_unicode_escape(8, line, column)?),
                        other => {
                            return Err(StarError::parse_error(
                                line,
                                column,
                                format!("unknown string escape '\\{other}'"),
                            ));
                        }
                    }
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
    }

    fn lex_unicode_escape(&mut self, digits: usize, line: usize, column: usize) -> StarResult<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let c = self.chars.peek().copied().ok_or_else(|| {
                StarError::parse_error(line, column, "unterminated unicode escape")
            })?;
            let digit = c.to_digit(16).ok_or_else(|| {
                StarError::parse_error(line, column, format!("invalid hex digit '{c}' in escape"))
            })?;
            self.bump();
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| {
            StarError::parse_error(line, column, format!("invalid unicode code point U+{code:X}"))
        })
    }

    fn lex_number(&mut self, line: usize, column: usize) -> StarResult<Token> {
        let mut text = String::new();
        if matches!(self.chars.peek(), Some('+') | Some('-')) {
            text.push(self.bump().unwrap());
        }
        let mut has_dot = false;
        let mut has_exponent = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !has_dot && !has_exponent {
                // Only part of the number if a digit follows, otherwise it
                // is the statement terminator.
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                    has_dot = true;
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            } else if (c == 'e' || c == 'E') && !has_exponent {
                has_exponent = true;
                text.push(c);
                self.bump();
                if matches!(self.chars.peek(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
            } else {
                break;
            }
        }
        if !text.chars().any(|c| c.is_ascii_digit()) {
            return Err(StarError::parse_error(line, column, "malformed numeric literal"));
        }
        if has_exponent {
            Ok(Token::Double(text))
        } else if has_dot {
            Ok(Token::Decimal(text))
        } else {
            Ok(Token::Integer(text))
        }
    }

    fn lex_word(&mut self, _line: usize, _column: usize) -> StarResult<Token> {
        let word = self.take_name();
        match word.split_once(':') {
            Some((prefix, local)) => Ok(Token::PrefixedName {
                prefix: prefix.to_string(),
                local: local.to_string(),
            }),
            None => Ok(Token::Ident(word)),
        }
    }

    /// Consumes a prefixed-name or bare-word body. A dot is part of the name
    /// only when followed by another name character, so `ex:a.` lexes as the
    /// name `ex:a` and a statement terminator.
    fn take_name(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '%') {
                word.push(c);
                self.bump();
            } else if c == '.' {
                let mut ahead = self.chars.clone();
                ahead.next();
                match ahead.peek() {
                    Some(&n) if n.is_alphanumeric() || n == '_' => {
                        word.push(c);
                        self.bump();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        word
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if pred(c) {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }
}
