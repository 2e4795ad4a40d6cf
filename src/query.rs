//! SPARQL-star SELECT queries: parsing and evaluation.
//!
//! The parser builds a small algebra ([`GraphPattern`]) from the shared
//! token stream; the executor evaluates it against a [`StarStore`] with
//! multiset semantics. Quoted-triple patterns destructure recursively, so
//! `<< ?s ?p ?o >> ?p2 ?o2` binds the components of a quoted subject.

pub mod expression;

use std::collections::HashMap;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, span, Level};

use crate::model::{BlankNode, Literal, NamedNode, StarTerm, StarTriple};
use crate::parser::tokenizer::{tokenize, SpannedToken, Token};
use crate::results::SolutionSequence;
use crate::store::StarStore;
use crate::vocab;
use crate::{StarError, StarResult};

use expression::{CompareOp, Expression, Function};

/// A single solution: a partial mapping from variable names to terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    bindings: FxHashMap<String, StarTerm>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, variable: impl Into<String>, term: StarTerm) {
        self.bindings.insert(variable.into(), term);
    }

    pub fn get(&self, variable: &str) -> Option<&StarTerm> {
        self.bindings.get(variable)
    }

    pub fn is_bound(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One position of a triple pattern
#[derive(Debug, Clone, PartialEq)]
pub enum TermPattern {
    /// A concrete term that must match exactly
    Term(StarTerm),
    /// A variable to bind
    Variable(String),
    /// A quoted-triple pattern that destructures a quoted term
    QuotedTriplePattern(Box<TriplePattern>),
}

impl TermPattern {
    /// Attempts to match this pattern against a term, extending `binding`
    /// with any new variable bindings. On failure the binding may be
    /// partially extended, so callers match against a scratch clone.
    pub fn try_bind(&self, term: &StarTerm, binding: &mut Binding) -> bool {
        match self {
            TermPattern::Term(expected) => expected == term,
            TermPattern::Variable(name) => match binding.get(name) {
                Some(bound) => bound == term,
                None => {
                    binding.bind(name.clone(), term.clone());
                    true
                }
            },
            TermPattern::QuotedTriplePattern(pattern) => match term.as_quoted_triple() {
                Some(quoted) => {
                    pattern.subject.try_bind(&quoted.subject, binding)
                        && pattern.predicate.try_bind(&quoted.predicate, binding)
                        && pattern.object.try_bind(&quoted.object, binding)
                }
                None => false,
            },
        }
    }

    /// Substitutes variables already bound in `binding`. A quoted pattern
    /// whose components all become concrete collapses to a concrete term,
    /// which makes it eligible for an index probe.
    pub fn resolve(&self, binding: &Binding) -> TermPattern {
        match self {
            TermPattern::Term(term) => TermPattern::Term(term.clone()),
            TermPattern::Variable(name) => match binding.get(name) {
                Some(term) => TermPattern::Term(term.clone()),
                None => TermPattern::Variable(name.clone()),
            },
            TermPattern::QuotedTriplePattern(pattern) => {
                let resolved = TriplePattern {
                    subject: pattern.subject.resolve(binding),
                    predicate: pattern.predicate.resolve(binding),
                    object: pattern.object.resolve(binding),
                };
                match resolved.to_concrete_triple() {
                    Some(triple) => TermPattern::Term(StarTerm::quoted_triple(triple)),
                    None => TermPattern::QuotedTriplePattern(Box::new(resolved)),
                }
            }
        }
    }

    /// The concrete term this pattern requires, if it requires one.
    pub fn as_concrete(&self) -> Option<&StarTerm> {
        match self {
            TermPattern::Term(term) => Some(term),
            _ => None,
        }
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            TermPattern::Term(_) => {}
            TermPattern::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            TermPattern::QuotedTriplePattern(pattern) => pattern.collect_variables(out),
        }
    }
}

/// A triple pattern in a basic graph pattern
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(subject: TermPattern, predicate: TermPattern, object: TermPattern) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    fn to_concrete_triple(&self) -> Option<StarTriple> {
        Some(StarTriple::new(
            self.subject.as_concrete()?.clone(),
            self.predicate.as_concrete()?.clone(),
            self.object.as_concrete()?.clone(),
        ))
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        self.subject.collect_variables(out);
        self.predicate.collect_variables(out);
        self.object.collect_variables(out);
    }
}

/// Algebra of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    /// Conjunction of triple patterns, joined left to right
    Bgp(Vec<TriplePattern>),
    /// A group: elements joined in order, then filters applied
    Group {
        elements: Vec<GraphPattern>,
        filters: Vec<Expression>,
    },
    Union(Box<GraphPattern>, Box<GraphPattern>),
    /// Left join against the solutions accumulated so far in the group
    Optional(Box<GraphPattern>),
    Bind {
        expression: Expression,
        variable: String,
    },
    /// Inline data, joined with the solutions accumulated so far
    Values {
        variables: Vec<String>,
        rows: Vec<Vec<StarTerm>>,
    },
}

impl GraphPattern {
    fn collect_visible_variables(&self, out: &mut Vec<String>) {
        match self {
            GraphPattern::Bgp(patterns) => {
                for pattern in patterns {
                    pattern.collect_variables(out);
                }
            }
            GraphPattern::Group { elements, .. } => {
                for element in elements {
                    element.collect_visible_variables(out);
                }
            }
            GraphPattern::Union(left, right) => {
                left.collect_visible_variables(out);
                right.collect_visible_variables(out);
            }
            GraphPattern::Optional(inner) => inner.collect_visible_variables(out),
            GraphPattern::Bind { variable, .. } => {
                if !out.contains(variable) {
                    out.push(variable.clone());
                }
            }
            GraphPattern::Values { variables, .. } => {
                for variable in variables {
                    if !out.contains(variable) {
                        out.push(variable.clone());
                    }
                }
            }
        }
    }
}

/// Projection of a SELECT query
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`: all visible variables, in first-mention order
    All,
    Variables(Vec<String>),
}

/// A parsed SPARQL-star SELECT query
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub projection: Projection,
    pub distinct: bool,
    pub pattern: GraphPattern,
}

impl SelectQuery {
    /// The variables the result sequence will expose, in order.
    pub fn projected_variables(&self) -> Vec<String> {
        match &self.projection {
            Projection::Variables(vars) => vars.clone(),
            Projection::All => {
                let mut out = Vec::new();
                self.pattern.collect_visible_variables(&mut out);
                out
            }
        }
    }
}

/// Parser for SPARQL-star SELECT queries
#[derive(Debug, Default)]
pub struct QueryParser {
    _private: (),
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, input: &str) -> StarResult<SelectQuery> {
        let tokens = tokenize(input)?;
        let mut state = QueryParserState {
            tokens,
            pos: 0,
            prefixes: HashMap::new(),
            base_iri: None,
        };
        state.parse_query()
    }
}

struct QueryParserState {
    tokens: Vec<SpannedToken>,
    pos: usize,
    prefixes: HashMap<String, String>,
    base_iri: Option<String>,
}

impl QueryParserState {
    fn parse_query(&mut self) -> StarResult<SelectQuery> {
        loop {
            let tok = self.peek().clone();
            match &tok.token {
                Token::Ident(word) if word.eq_ignore_ascii_case("prefix") => {
                    self.advance();
                    self.parse_prefix_declaration()?;
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("base") => {
                    self.advance();
                    let tok = self.advance();
                    match &tok.token {
                        Token::IriRef(iri) => self.base_iri = Some(iri.clone()),
                        other => {
                            return Err(self.err_at(&tok, format!("expected IRI, found {other:?}")))
                        }
                    }
                }
                _ => break,
            }
        }

        let tok = self.advance();
        if !tok.token.is_keyword("select") {
            return Err(self.err_at(&tok, "only SELECT queries are supported"));
        }

        let distinct = if self.peek().token.is_keyword("distinct") {
            self.advance();
            true
        } else {
            false
        };

        let projection = self.parse_projection()?;

        if self.peek().token.is_keyword("where") {
            self.advance();
        }
        self.expect(Token::OpenBrace, "'{' starting the WHERE clause")?;
        let pattern = self.parse_group()?;

        let tok = self.peek().clone();
        if tok.token != Token::Eof {
            return Err(self.err_at(&tok, format!("unexpected trailing {:?}", tok.token)));
        }
        Ok(SelectQuery {
            projection,
            distinct,
            pattern,
        })
    }

    fn parse_projection(&mut self) -> StarResult<Projection> {
        if self.peek().token == Token::Star {
            self.advance();
            return Ok(Projection::All);
        }
        let mut variables = Vec::new();
        while let Token::Variable(name) = &self.peek().token {
            variables.push(name.clone());
            self.advance();
        }
        if variables.is_empty() {
            let tok = self.peek().clone();
            return Err(self.err_at(&tok, "expected '*' or at least one variable after SELECT"));
        }
        Ok(Projection::Variables(variables))
    }

    fn parse_prefix_declaration(&mut self) -> StarResult<()> {
        let tok = self.advance();
        let prefix = match &tok.token {
            Token::PrefixedName { prefix, local } if local.is_empty() => prefix.clone(),
            other => {
                return Err(self.err_at(&tok, format!("expected prefix declaration, found {other:?}")))
            }
        };
        let tok = self.advance();
        match &tok.token {
            Token::IriRef(iri) => {
                self.prefixes.insert(prefix, iri.clone());
                Ok(())
            }
            other => Err(self.err_at(&tok, format!("expected IRI, found {other:?}"))),
        }
    }

    /// Parses a group pattern; the opening brace is already consumed.
    fn parse_group(&mut self) -> StarResult<GraphPattern> {
        let mut elements = Vec::new();
        let mut filters = Vec::new();
        loop {
            let tok = self.peek().clone();
            match &tok.token {
                Token::CloseBrace => {
                    self.advance();
                    return Ok(GraphPattern::Group { elements, filters });
                }
                Token::Eof => {
                    return Err(self.err_at(&tok, "unterminated group pattern"));
                }
                Token::Dot => {
                    self.advance();
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("filter") => {
                    self.advance();
                    filters.push(self.parse_expression()?);
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("bind") => {
                    self.advance();
                    elements.push(self.parse_bind()?);
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("values") => {
                    self.advance();
                    elements.push(self.parse_values()?);
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("optional") => {
                    self.advance();
                    self.expect(Token::OpenBrace, "'{' after OPTIONAL")?;
                    let inner = self.parse_group()?;
                    elements.push(GraphPattern::Optional(Box::new(inner)));
                }
                Token::OpenBrace => {
                    self.advance();
                    let mut pattern = self.parse_group()?;
                    while self.peek().token.is_keyword("union") {
                        self.advance();
                        self.expect(Token::OpenBrace, "'{' after UNION")?;
                        let right = self.parse_group()?;
                        pattern = GraphPattern::Union(Box::new(pattern), Box::new(right));
                    }
                    elements.push(pattern);
                }
                _ => {
                    elements.push(GraphPattern::Bgp(self.parse_triples_block()?));
                }
            }
        }
    }

    fn parse_bind(&mut self) -> StarResult<GraphPattern> {
        self.expect(Token::OpenParen, "'(' after BIND")?;
        let expression = self.parse_expression()?;
        let tok = self.advance();
        if !tok.token.is_keyword("as") {
            return Err(self.err_at(&tok, "expected AS in BIND"));
        }
        let tok = self.advance();
        let variable = match &tok.token {
            Token::Variable(name) => name.clone(),
            other => return Err(self.err_at(&tok, format!("expected variable, found {other:?}"))),
        };
        self.expect(Token::CloseParen, "')' closing BIND")?;
        Ok(GraphPattern::Bind {
            expression,
            variable,
        })
    }

    /// `VALUES ?v { ... }` or `VALUES (?a ?b) { (..) (..) }`. Every cell
    /// must be a concrete term; a variable anywhere in the data block, even
    /// nested inside a quoted triple, is a semantic error.
    fn parse_values(&mut self) -> StarResult<GraphPattern> {
        let mut variables = Vec::new();
        let single = match &self.peek().token {
            Token::Variable(name) => {
                variables.push(name.clone());
                self.advance();
                true
            }
            Token::OpenParen => {
                self.advance();
                while let Token::Variable(name) = &self.peek().token {
                    variables.push(name.clone());
                    self.advance();
                }
                self.expect(Token::CloseParen, "')' closing VALUES variables")?;
                false
            }
            other => {
                let tok = self.peek().clone();
                return Err(self.err_at(&tok, format!("expected VALUES variables, found {other:?}")));
            }
        };
        if variables.is_empty() {
            let tok = self.peek().clone();
            return Err(self.err_at(&tok, "VALUES requires at least one variable"));
        }

        self.expect(Token::OpenBrace, "'{' starting VALUES data")?;
        let mut rows = Vec::new();
        loop {
            match &self.peek().token {
                Token::CloseBrace => {
                    self.advance();
                    break;
                }
                Token::Eof => {
                    let tok = self.peek().clone();
                    return Err(self.err_at(&tok, "unterminated VALUES data"));
                }
                _ if single => {
                    rows.push(vec![self.parse_data_term()?]);
                }
                _ => {
                    self.expect(Token::OpenParen, "'(' starting VALUES row")?;
                    let mut row = Vec::new();
                    while self.peek().token != Token::CloseParen {
                        if self.peek().token == Token::Eof {
                            let tok = self.peek().clone();
                            return Err(self.err_at(&tok, "unterminated VALUES row"));
                        }
                        row.push(self.parse_data_term()?);
                    }
                    self.advance();
                    if row.len() != variables.len() {
                        return Err(StarError::semantic_error(format!(
                            "VALUES row has {} terms but {} variables were declared",
                            row.len(),
                            variables.len()
                        )));
                    }
                    rows.push(row);
                }
            }
        }
        Ok(GraphPattern::Values { variables, rows })
    }

    /// A concrete term inside a VALUES data block.
    fn parse_data_term(&mut self) -> StarResult<StarTerm> {
        let tok = self.advance();
        match &tok.token {
            Token::Variable(name) => Err(StarError::semantic_error(format!(
                "variable ?{name} is not allowed in VALUES data"
            ))),
            Token::IriRef(iri) => Ok(StarTerm::NamedNode(self.named_node(iri)?)),
            Token::PrefixedName { prefix, local } => {
                Ok(StarTerm::NamedNode(self.expand_prefixed(prefix, local, &tok)?))
            }
            Token::BlankNodeLabel(label) => Ok(StarTerm::BlankNode(BlankNode::new(label.clone())?)),
            Token::QuoteOpen => {
                let subject = self.parse_data_term()?;
                let predicate = self.parse_data_term()?;
                let object = self.parse_data_term()?;
                self.expect(Token::QuoteClose, "'>>' closing quoted triple")?;
                let triple = StarTriple::new(subject, predicate, object);
                triple.validate()?;
                Ok(StarTerm::quoted_triple(triple))
            }
            Token::StringLiteral(_)
            | Token::Integer(_)
            | Token::Decimal(_)
            | Token::Double(_) => {
                self.pos -= 1;
                self.parse_literal_pattern()
            }
            Token::Ident(word) if word == "true" || word == "false" => {
                Ok(StarTerm::Literal(Literal::boolean(word == "true")))
            }
            other => Err(self.err_at(&tok, format!("expected term in VALUES data, found {other:?}"))),
        }
    }

    /// One triples statement including `;` and `,` continuations.
    fn parse_triples_block(&mut self) -> StarResult<Vec<TriplePattern>> {
        let mut patterns = Vec::new();
        let subject = self.parse_term_pattern(true)?;
        loop {
            let predicate = self.parse_verb_pattern()?;
            loop {
                let object = self.parse_term_pattern(false)?;
                patterns.push(TriplePattern::new(
                    subject.clone(),
                    predicate.clone(),
                    object,
                ));
                if self.peek().token == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.peek().token == Token::Semicolon {
                self.advance();
                if matches!(self.peek().token, Token::Dot | Token::CloseBrace) {
                    return Ok(patterns);
                }
            } else {
                return Ok(patterns);
            }
        }
    }

    fn parse_verb_pattern(&mut self) -> StarResult<TermPattern> {
        let tok = self.advance();
        match &tok.token {
            Token::Variable(name) => Ok(TermPattern::Variable(name.clone())),
            Token::Ident(word) if word == "a" => Ok(TermPattern::Term(StarTerm::NamedNode(
                vocab::rdf::TYPE.clone(),
            ))),
            Token::IriRef(iri) => Ok(TermPattern::Term(StarTerm::NamedNode(self.named_node(iri)?))),
            Token::PrefixedName { prefix, local } => Ok(TermPattern::Term(StarTerm::NamedNode(
                self.expand_prefixed(prefix, local, &tok)?,
            ))),
            other => Err(self.err_at(&tok, format!("expected predicate, found {other:?}"))),
        }
    }

    fn parse_term_pattern(&mut self, subject_position: bool) -> StarResult<TermPattern> {
        let tok = self.peek().clone();
        match &tok.token {
            Token::Variable(name) => {
                let name = name.clone();
                self.advance();
                Ok(TermPattern::Variable(name))
            }
            Token::QuoteOpen => {
                self.advance();
                let subject = self.parse_term_pattern(true)?;
                let predicate = self.parse_verb_pattern()?;
                let object = self.parse_term_pattern(false)?;
                self.expect(Token::QuoteClose, "'>>' closing quoted triple pattern")?;
                Ok(TermPattern::QuotedTriplePattern(Box::new(
                    TriplePattern::new(subject, predicate, object),
                )))
            }
            Token::IriRef(iri) => {
                let node = self.named_node(iri)?;
                self.advance();
                Ok(TermPattern::Term(StarTerm::NamedNode(node)))
            }
            Token::PrefixedName { prefix, local } => {
                let node = self.expand_prefixed(prefix, local, &tok)?;
                self.advance();
                Ok(TermPattern::Term(StarTerm::NamedNode(node)))
            }
            Token::BlankNodeLabel(label) => {
                let node = BlankNode::new(label.clone())?;
                self.advance();
                Ok(TermPattern::Term(StarTerm::BlankNode(node)))
            }
            Token::StringLiteral(_)
            | Token::Integer(_)
            | Token::Decimal(_)
            | Token::Double(_)
                if !subject_position =>
            {
                Ok(TermPattern::Term(self.parse_literal_pattern()?))
            }
            Token::Ident(word) if !subject_position && (word == "true" || word == "false") => {
                let value = word == "true";
                self.advance();
                Ok(TermPattern::Term(StarTerm::Literal(Literal::boolean(value))))
            }
            other => Err(self.err_at(
                &tok,
                format!("expected triple pattern term, found {other:?}"),
            )),
        }
    }

    fn parse_literal_pattern(&mut self) -> StarResult<StarTerm> {
        let tok = self.advance();
        match &tok.token {
            Token::StringLiteral(value) => {
                let value = value.clone();
                match &self.peek().token {
                    Token::LangTag(lang) => {
                        let lang = lang.clone();
                        self.advance();
                        Ok(StarTerm::Literal(Literal::new_lang(value, lang)?))
                    }
                    Token::CaretCaret => {
                        self.advance();
                        let dt_tok = self.advance();
                        let datatype = match &dt_tok.token {
                            Token::IriRef(iri) => self.named_node(iri)?,
                            Token::PrefixedName { prefix, local } => {
                                self.expand_prefixed(prefix, local, &dt_tok)?
                            }
                            other => {
                                return Err(self.err_at(
                                    &dt_tok,
                                    format!("expected datatype IRI, found {other:?}"),
                                ))
                            }
                        };
                        Ok(StarTerm::Literal(Literal::new_typed(value, datatype)))
                    }
                    _ => Ok(StarTerm::Literal(Literal::new(value))),
                }
            }
            Token::Integer(text) => Ok(StarTerm::Literal(Literal::new_typed(
                text.clone(),
                vocab::xsd::INTEGER.clone(),
            ))),
            Token::Decimal(text) => Ok(StarTerm::Literal(Literal::new_typed(
                text.clone(),
                vocab::xsd::DECIMAL.clone(),
            ))),
            Token::Double(text) => Ok(StarTerm::Literal(Literal::new_typed(
                text.clone(),
                vocab::xsd::DOUBLE.clone(),
            ))),
            other => Err(self.err_at(&tok, format!("expected literal, found {other:?}"))),
        }
    }

    // Expression grammar: || over && over comparison over unary.

    fn parse_expression(&mut self) -> StarResult<Expression> {
        let mut left = self.parse_and_expression()?;
        while self.peek().token == Token::OrOr {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> StarResult<Expression> {
        let mut left = self.parse_relational_expression()?;
        while self.peek().token == Token::AndAnd {
            self.advance();
            let right = self.parse_relational_expression()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> StarResult<Expression> {
        let left = self.parse_unary_expression()?;
        let op = match self.peek().token {
            Token::Equals => CompareOp::Equal,
            Token::NotEquals => CompareOp::NotEqual,
            Token::Less => CompareOp::Less,
            Token::LessEq => CompareOp::LessOrEqual,
            Token::Greater => CompareOp::Greater,
            Token::GreaterEq => CompareOp::GreaterOrEqual,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_unary_expression()?;
        Ok(Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_unary_expression(&mut self) -> StarResult<Expression> {
        if self.peek().token == Token::Bang {
            self.advance();
            let inner = self.parse_unary_expression()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> StarResult<Expression> {
        let tok = self.peek().clone();
        match &tok.token {
            Token::OpenParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::CloseParen, "')' closing expression")?;
                Ok(inner)
            }
            Token::Variable(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expression::Variable(name))
            }
            Token::QuoteOpen => {
                // << s p o >> in expression position builds a quoted triple.
                self.advance();
                let subject = self.parse_primary_expression()?;
                let predicate = self.parse_primary_expression()?;
                let object = self.parse_primary_expression()?;
                self.expect(Token::QuoteClose, "'>>' closing quoted triple expression")?;
                Ok(Expression::FunctionCall {
                    function: Function::Triple,
                    args: vec![subject, predicate, object],
                })
            }
            Token::Ident(word) if word == "true" || word == "false" => {
                let value = word == "true";
                self.advance();
                Ok(Expression::Term(StarTerm::Literal(Literal::boolean(value))))
            }
            Token::Ident(word) => {
                let Some(function) = Function::from_name(word) else {
                    return Err(self.err_at(&tok, format!("unknown function '{word}'")));
                };
                self.advance();
                self.expect(Token::OpenParen, "'(' after function name")?;
                let mut args = Vec::new();
                if self.peek().token != Token::CloseParen {
                    loop {
                        args.push(self.parse_expression()?);
                        if self.peek().token == Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::CloseParen, "')' closing function call")?;
                if args.len() != function.arity() {
                    return Err(self.err_at(
                        &tok,
                        format!(
                            "{word} expects {} argument(s), found {}",
                            function.arity(),
                            args.len()
                        ),
                    ));
                }
                Ok(Expression::FunctionCall { function, args })
            }
            Token::IriRef(iri) => {
                let node = self.named_node(iri)?;
                self.advance();
                Ok(Expression::Term(StarTerm::NamedNode(node)))
            }
            Token::PrefixedName { prefix, local } => {
                let node = self.expand_prefixed(prefix, local, &tok)?;
                self.advance();
                Ok(Expression::Term(StarTerm::NamedNode(node)))
            }
            Token::StringLiteral(_)
            | Token::Integer(_)
            | Token::Decimal(_)
            | Token::Double(_) => Ok(Expression::Term(self.parse_literal_pattern()?)),
            other => Err(self.err_at(&tok, format!("expected expression, found {other:?}"))),
        }
    }

    fn expand_prefixed(
        &self,
        prefix: &str,
        local: &str,
        tok: &SpannedToken,
    ) -> StarResult<NamedNode> {
        let namespace = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| self.err_at(tok, format!("undefined prefix '{prefix}:'")))?;
        NamedNode::new(format!("{namespace}{local}"))
    }

    fn named_node(&self, iri: &str) -> StarResult<NamedNode> {
        let resolved = match (&self.base_iri, iri.contains(':')) {
            (Some(base), false) => format!("{base}{iri}"),
            _ => iri.to_string(),
        };
        NamedNode::new(resolved)
    }

    fn peek(&self) -> &SpannedToken {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token, description: &str) -> StarResult<()> {
        let tok = self.advance();
        if tok.token == expected {
            Ok(())
        } else {
            Err(self.err_at(&tok, format!("expected {description}, found {:?}", tok.token)))
        }
    }

    fn err_at(&self, tok: &SpannedToken, message: impl Into<String>) -> StarError {
        StarError::parse_error(tok.line, tok.column, message)
    }
}

/// Evaluates parsed queries against a store.
pub struct QueryExecutor<'a> {
    store: &'a StarStore,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a StarStore) -> Self {
        Self { store }
    }

    /// Runs a SELECT query to completion and materializes the solutions, so
    /// the returned sequence can be iterated any number of times.
    pub fn execute(&self, query: &SelectQuery) -> StarResult<SolutionSequence> {
        let query_span = span!(Level::DEBUG, "execute_query");
        let _enter = query_span.enter();

        let rows = self.eval(&query.pattern, vec![Binding::new()])?;
        debug!(solutions = rows.len(), "pattern evaluation complete");

        let variables = query.projected_variables();
        let mut projected: Vec<Binding> = rows
            .into_iter()
            .map(|row| {
                let mut out = Binding::new();
                for variable in &variables {
                    if let Some(term) = row.get(variable) {
                        out.bind(variable.clone(), term.clone());
                    }
                }
                out
            })
            .collect();

        if query.distinct {
            let mut seen: FxHashSet<Vec<Option<StarTerm>>> = FxHashSet::default();
            projected.retain(|row| {
                let key: Vec<Option<StarTerm>> = variables
                    .iter()
                    .map(|v| row.get(v).cloned())
                    .collect();
                seen.insert(key)
            });
        }

        Ok(SolutionSequence::new(variables, projected))
    }

    fn eval(&self, pattern: &GraphPattern, input: Vec<Binding>) -> StarResult<Vec<Binding>> {
        match pattern {
            GraphPattern::Bgp(patterns) => {
                let mut rows = input;
                for pattern in patterns {
                    let mut next = Vec::new();
                    for row in &rows {
                        self.match_triple_pattern(pattern, row, &mut next);
                    }
                    rows = next;
                    if rows.is_empty() {
                        break;
                    }
                }
                Ok(rows)
            }
            GraphPattern::Group { elements, filters } => {
                let mut rows = input;
                for element in elements {
                    rows = self.eval(element, rows)?;
                }
                for filter in filters {
                    rows.retain(|row| filter.evaluate_boolean(row));
                }
                Ok(rows)
            }
            GraphPattern::Union(left, right) => {
                let mut rows = self.eval(left, input.clone())?;
                rows.extend(self.eval(right, input)?);
                Ok(rows)
            }
            GraphPattern::Optional(inner) => {
                let mut out = Vec::new();
                for row in input {
                    let extended = self.eval(inner, vec![row.clone()])?;
                    if extended.is_empty() {
                        out.push(row);
                    } else {
                        out.extend(extended);
                    }
                }
                Ok(out)
            }
            GraphPattern::Bind {
                expression,
                variable,
            } => {
                let mut out = Vec::new();
                for mut row in input {
                    // An evaluation error leaves the variable unbound but
                    // keeps the solution.
                    match expression.evaluate(&row) {
                        Ok(term) => match row.get(variable) {
                            Some(existing) if existing != &term => continue,
                            _ => {
                                row.bind(variable.clone(), term);
                                out.push(row);
                            }
                        },
                        Err(_) => out.push(row),
                    }
                }
                Ok(out)
            }
            GraphPattern::Values { variables, rows } => {
                let mut out = Vec::new();
                for input_row in &input {
                    for data_row in rows {
                        let mut candidate = input_row.clone();
                        let mut compatible = true;
                        for (variable, term) in variables.iter().zip(data_row) {
                            match candidate.get(variable) {
                                Some(existing) if existing != term => {
                                    compatible = false;
                                    break;
                                }
                                Some(_) => {}
                                None => candidate.bind(variable.clone(), term.clone()),
                            }
                        }
                        if compatible {
                            out.push(candidate);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// Joins one solution with one triple pattern, appending every extension
    /// to `out`. Bound variables are substituted first so the store can pick
    /// a selective index.
    fn match_triple_pattern(&self, pattern: &TriplePattern, row: &Binding, out: &mut Vec<Binding>) {
        let resolved = TriplePattern {
            subject: pattern.subject.resolve(row),
            predicate: pattern.predicate.resolve(row),
            object: pattern.object.resolve(row),
        };
        let subject = resolved.subject.as_concrete();
        let predicate = resolved.predicate.as_concrete();
        let object = resolved.object.as_concrete();
        for triple in self.store.match_pattern(subject, predicate, object) {
            let mut candidate = row.clone();
            if resolved.subject.try_bind(&triple.subject, &mut candidate)
                && resolved.predicate.try_bind(&triple.predicate, &mut candidate)
                && resolved.object.try_bind(&triple.object, &mut candidate)
            {
                out.push(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_document;

    fn store() -> StarStore {
        load_document(
            r#"
            @prefix ex: <http://example.org/> .
            ex:alice ex:knows ex:bob .
            ex:alice ex:age 30 .
            ex:bob ex:age 25 .
            << ex:alice ex:age 30 >> ex:certainty 0.9 .
            "#,
        )
        .unwrap()
    }

    fn run(store: &StarStore, query: &str) -> SolutionSequence {
        let parsed = QueryParser::new().parse(query).unwrap();
        QueryExecutor::new(store).execute(&parsed).unwrap()
    }

    #[test]
    fn test_single_pattern() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?who WHERE { ex:alice ex:knows ?who }",
        );
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.iter().next().unwrap().get("who").unwrap().to_string(),
            "<http://example.org/bob>"
        );
    }

    #[test]
    fn test_join_shares_bindings() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?a ?n WHERE { ex:alice ex:knows ?a . ?a ex:age ?n }",
        );
        assert_eq!(results.len(), 1);
        let row = results.iter().next().unwrap();
        assert_eq!(row.get("n").unwrap().to_string().contains("25"), true);
    }

    #[test]
    fn test_quoted_pattern_destructures() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?s ?a ?c WHERE { << ?s ex:age ?a >> ex:certainty ?c }",
        );
        assert_eq!(results.len(), 1);
        let row = results.iter().next().unwrap();
        assert_eq!(row.get("s").unwrap().to_string(), "<http://example.org/alice>");
        assert!(row.get("a").unwrap().to_string().contains("30"));
    }

    #[test]
    fn test_concrete_quoted_subject_probe() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?c WHERE { << ex:alice ex:age 30 >> ex:certainty ?c }",
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_filter_numeric() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?p WHERE { ?p ex:age ?n . FILTER(?n > 27) }",
        );
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.iter().next().unwrap().get("p").unwrap().to_string(),
            "<http://example.org/alice>"
        );
    }

    #[test]
    fn test_filter_comparison_without_space() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?p WHERE { ?p ex:age ?n . FILTER(?n <27) }",
        );
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.iter().next().unwrap().get("p").unwrap().to_string(),
            "<http://example.org/bob>"
        );
    }

    #[test]
    fn test_union_is_multiset() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?x WHERE { { ?x ex:age 30 } UNION { ?x ex:age ?y } }",
        );
        // One row from the left branch, two from the right.
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_optional_keeps_unmatched_rows() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?p ?f WHERE { ?p ex:age ?n . OPTIONAL { ?p ex:knows ?f } }",
        );
        assert_eq!(results.len(), 2);
        let bound: Vec<bool> = results.iter().map(|r| r.get("f").is_some()).collect();
        assert!(bound.contains(&true));
        assert!(bound.contains(&false));
    }

    #[test]
    fn test_bind_constructs_quoted_triple() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?t WHERE { ?s ex:knows ?o . BIND(<< ?s ex:knows ?o >> AS ?t) }",
        );
        assert_eq!(results.len(), 1);
        assert!(results.iter().next().unwrap().get("t").unwrap().is_quoted_triple());
    }

    #[test]
    fn test_bind_error_keeps_row_unbound() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?t WHERE { BIND(<< ?s ex:p ?o >> AS ?t) }",
        );
        assert_eq!(results.len(), 1);
        assert!(results.iter().next().unwrap().get("t").is_none());
    }

    #[test]
    fn test_values_joins_inline_data() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?p ?n WHERE { VALUES ?p { ex:alice } ?p ex:age ?n }",
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_values_with_variable_is_semantic_error() {
        let err = QueryParser::new()
            .parse("PREFIX ex: <http://example.org/> SELECT ?x WHERE { VALUES ?x { ?y } }")
            .unwrap_err();
        assert!(matches!(err, StarError::Semantic { .. }));
    }

    #[test]
    fn test_values_with_nested_variable_is_semantic_error() {
        let err = QueryParser::new()
            .parse(
                "PREFIX ex: <http://example.org/> SELECT ?x WHERE { VALUES ?x { << ex:s ex:p ?o >> } }",
            )
            .unwrap_err();
        assert!(matches!(err, StarError::Semantic { .. }));
    }

    #[test]
    fn test_select_star_order() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT * WHERE { ?s ex:knows ?o }",
        );
        assert_eq!(results.variables(), &["s".to_string(), "o".to_string()]);
    }

    #[test]
    fn test_distinct_collapses_duplicates() {
        let store = store();
        let results = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT DISTINCT ?p WHERE { ?s ?p ?o }",
        );
        let without = run(
            &store,
            "PREFIX ex: <http://example.org/> SELECT ?p WHERE { ?s ?p ?o }",
        );
        assert!(results.len() < without.len());
        // knows, age, certainty
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_non_select_is_rejected() {
        let err = QueryParser::new()
            .parse("ASK { ?s ?p ?o }")
            .unwrap_err();
        assert!(err.to_string().contains("SELECT"));
    }
}
