//! Turtle-star document parser.
//!
//! A recursive-descent parser over the shared token stream. Supports
//! `@prefix`/`PREFIX` and `@base`/`BASE` directives, the `a` shorthand,
//! predicate-object lists (`;`), object lists (`,`), literal shorthand for
//! numbers and booleans, blank node property lists, RDF collections, and
//! quoted triples `<< s p o >>` in subject or object position.
//!
//! Parsing is all-or-nothing: the first syntax error aborts the parse and no
//! triples are returned.

pub mod tokenizer;

use std::collections::HashMap;

use tracing::debug;

use crate::model::{Literal, NamedNode, StarTerm, StarTriple};
use crate::vocab;
use crate::{StarConfig, StarError, StarResult};

use tokenizer::{tokenize, SpannedToken, Token};

/// Parser for Turtle-star documents
#[derive(Debug, Default, Clone)]
pub struct StarParser {
    config: StarConfig,
}

impl StarParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StarConfig) -> Self {
        Self { config }
    }

    /// Parses a complete document into its triples, in document order.
    pub fn parse_str(&self, input: &str) -> StarResult<Vec<StarTriple>> {
        let tokens = tokenize(input)?;
        let mut state = DocumentParser {
            tokens,
            pos: 0,
            prefixes: HashMap::new(),
            base_iri: self.config.base_iri.clone(),
            blank_counter: 0,
            max_nesting_depth: self.config.max_nesting_depth,
            triples: Vec::new(),
        };
        state.parse_document()?;
        debug!(count = state.triples.len(), "parsed document");
        Ok(state.triples)
    }
}

struct DocumentParser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    prefixes: HashMap<String, String>,
    base_iri: Option<String>,
    blank_counter: usize,
    max_nesting_depth: usize,
    triples: Vec<StarTriple>,
}

impl DocumentParser {
    fn parse_document(&mut self) -> StarResult<()> {
        loop {
            match &self.peek().token {
                Token::Eof => return Ok(()),
                Token::AtPrefix => self.parse_at_prefix()?,
                Token::AtBase => self.parse_at_base()?,
                Token::Ident(word) if word.eq_ignore_ascii_case("prefix") => {
                    self.parse_sparql_prefix()?
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("base") => {
                    self.parse_sparql_base()?
                }
                _ => self.parse_triples_statement()?,
            }
        }
    }

    fn parse_at_prefix(&mut self) -> StarResult<()> {
        self.advance();
        let (prefix, iri) = self.parse_prefix_binding()?;
        self.expect(Token::Dot, "'.' after @prefix directive")?;
        self.prefixes.insert(prefix, iri);
        Ok(())
    }

    /// SPARQL-style `PREFIX` directive, no trailing dot.
    fn parse_sparql_prefix(&mut self) -> StarResult<()> {
        self.advance();
        let (prefix, iri) = self.parse_prefix_binding()?;
        self.prefixes.insert(prefix, iri);
        Ok(())
    }

    fn parse_prefix_binding(&mut self) -> StarResult<(String, String)> {
        let tok = self.advance();
        let prefix = match &tok.token {
            Token::PrefixedName { prefix, local } if local.is_empty() => prefix.clone(),
            other => {
                return Err(self.err_at(&tok, format!("expected prefix declaration, found {other:?}")))
            }
        };
        let tok = self.advance();
        let iri = match &tok.token {
            Token::IriRef(iri) => self.resolve_iri(iri),
            other => return Err(self.err_at(&tok, format!("expected IRI, found {other:?}"))),
        };
        Ok((prefix, iri))
    }

    fn parse_at_base(&mut self) -> StarResult<()> {
        self.advance();
        self.parse_base_binding()?;
        self.expect(Token::Dot, "'.' after @base directive")?;
        Ok(())
    }

    fn parse_sparql_base(&mut self) -> StarResult<()> {
        self.advance();
        self.parse_base_binding()
    }

    fn parse_base_binding(&mut self) -> StarResult<()> {
        let tok = self.advance();
        match &tok.token {
            Token::IriRef(iri) => {
                self.base_iri = Some(self.resolve_iri(iri));
                Ok(())
            }
            other => Err(self.err_at(&tok, format!("expected IRI, found {other:?}"))),
        }
    }

    fn parse_triples_statement(&mut self) -> StarResult<()> {
        let subject = self.parse_subject()?;
        self.parse_predicate_object_list(&subject)?;
        self.expect(Token::Dot, "'.' at end of statement")?;
        Ok(())
    }

    fn parse_predicate_object_list(&mut self, subject: &StarTerm) -> StarResult<()> {
        loop {
            let predicate = self.parse_verb()?;
            loop {
                let object = self.parse_object()?;
                self.emit(subject.clone(), predicate.clone(), object)?;
                if self.peek().token == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.peek().token == Token::Semicolon {
                self.advance();
                // A semicolon may immediately precede the closing dot.
                if matches!(self.peek().token, Token::Dot | Token::CloseBracket) {
                    return Ok(());
                }
            } else {
                return Ok(());
            }
        }
    }

    fn parse_verb(&mut self) -> StarResult<StarTerm> {
        let tok = self.advance();
        match &tok.token {
            Token::Ident(word) if word == "a" => {
                Ok(StarTerm::NamedNode(vocab::rdf::TYPE.clone()))
            }
            Token::IriRef(iri) => Ok(StarTerm::NamedNode(self.named_node(iri)?)),
            Token::PrefixedName { prefix, local } => {
                Ok(StarTerm::NamedNode(self.expand_prefixed(prefix, local, &tok)?))
            }
            other => Err(self.err_at(&tok, format!("expected predicate, found {other:?}"))),
        }
    }

    fn parse_subject(&mut self) -> StarResult<StarTerm> {
        let tok = self.peek().clone();
        match &tok.token {
            Token::IriRef(_) | Token::PrefixedName { .. } | Token::BlankNodeLabel(_) => {
                self.parse_simple_term()
            }
            Token::OpenBracket => self.parse_blank_node_property_list(),
            Token::OpenParen => self.parse_collection(),
            Token::QuoteOpen => self.parse_quoted_triple(0),
            Token::Variable(_) => Err(self.err_at(&tok, "variables are not allowed in data")),
            other => Err(self.err_at(&tok, format!("expected subject, found {other:?}"))),
        }
    }

    fn parse_object(&mut self) -> StarResult<StarTerm> {
        let tok = self.peek().clone();
        match &tok.token {
            Token::IriRef(_) | Token::PrefixedName { .. } | Token::BlankNodeLabel(_) => {
                self.parse_simple_term()
            }
            Token::OpenBracket => self.parse_blank_node_property_list(),
            Token::OpenParen => self.parse_collection(),
            Token::QuoteOpen => self.parse_quoted_triple(0),
            Token::StringLiteral(_)
            | Token::Integer(_)
            | Token::Decimal(_)
            | Token::Double(_) => self.parse_literal(),
            Token::Ident(word) if word == "true" || word == "false" => self.parse_literal(),
            Token::Variable(_) => Err(self.err_at(&tok, "variables are not allowed in data")),
            other => Err(self.err_at(&tok, format!("expected object, found {other:?}"))),
        }
    }

    /// IRI, prefixed name, or labelled blank node.
    fn parse_simple_term(&mut self) -> StarResult<StarTerm> {
        let tok = self.advance();
        match &tok.token {
            Token::IriRef(iri) => Ok(StarTerm::NamedNode(self.named_node(iri)?)),
            Token::PrefixedName { prefix, local } => {
                Ok(StarTerm::NamedNode(self.expand_prefixed(prefix, local, &tok)?))
            }
            Token::BlankNodeLabel(label) => Ok(StarTerm::BlankNode(
                crate::model::BlankNode::new(label.clone())?,
            )),
            other => Err(self.err_at(&tok, format!("expected term, found {other:?}"))),
        }
    }

    fn parse_literal(&mut self) -> StarResult<StarTerm> {
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
            Token::Ident(word) if word == "true" || word == "false" => {
                Ok(StarTerm::Literal(Literal::boolean(word == "true")))
            }
            other => Err(self.err_at(&tok, format!("expected literal, found {other:?}"))),
        }
    }

    /// `<< subject predicate object >>`. Components must be concrete; nested
    /// quoted triples are allowed up to the configured depth.
    fn parse_quoted_triple(&mut self, depth: usize) -> StarResult<StarTerm> {
        let open = self.advance();
        debug_assert_eq!(open.token, Token::QuoteOpen);
        if depth >= self.max_nesting_depth {
            return Err(StarError::NestingDepthExceeded {
                max_depth: self.max_nesting_depth,
            });
        }
        let subject = self.parse_quoted_component(depth, true)?;
        let predicate = self.parse_verb()?;
        let object = self.parse_quoted_component(depth, false)?;
        self.expect(Token::QuoteClose, "'>>' closing quoted triple")?;
        let triple = StarTriple::new(subject, predicate, object);
        triple.validate()?;
        Ok(StarTerm::quoted_triple(triple))
    }

    fn parse_quoted_component(&mut self, depth: usize, subject_position: bool) -> StarResult<StarTerm> {
        let tok = self.peek().clone();
        match &tok.token {
            Token::QuoteOpen => self.parse_quoted_triple(depth + 1),
            Token::IriRef(_) | Token::PrefixedName { .. } | Token::BlankNodeLabel(_) => {
                self.parse_simple_term()
            }
            Token::StringLiteral(_)
            | Token::Integer(_)
            | Token::Decimal(_)
            | Token::Double(_)
                if !subject_position =>
            {
                self.parse_literal()
            }
            Token::Ident(word) if !subject_position && (word == "true" || word == "false") => {
                self.parse_literal()
            }
            Token::Variable(_) => Err(self.err_at(&tok, "variables are not allowed in data")),
            other => Err(self.err_at(
                &tok,
                format!("expected quoted triple component, found {other:?}"),
            )),
        }
    }

    /// `[ p1 o1 ; p2 o2 ]` introduces a fresh blank node and emits its
    /// property triples immediately.
    fn parse_blank_node_property_list(&mut self) -> StarResult<StarTerm> {
        self.expect(Token::OpenBracket, "'['")?;
        let node = self.fresh_blank_node()?;
        if self.peek().token != Token::CloseBracket {
            self.parse_predicate_object_list(&node)?;
        }
        self.expect(Token::CloseBracket, "']' closing blank node property list")?;
        Ok(node)
    }

    /// `( e1 e2 ... )` desugars to an rdf:first/rdf:rest chain ending in
    /// rdf:nil. The empty collection is rdf:nil itself.
    fn parse_collection(&mut self) -> StarResult<StarTerm> {
        self.expect(Token::OpenParen, "'('")?;
        let mut items = Vec::new();
        while self.peek().token != Token::CloseParen {
            if self.peek().token == Token::Eof {
                let tok = self.peek().clone();
                return Err(self.err_at(&tok, "unterminated collection"));
            }
            items.push(self.parse_object()?);
        }
        self.advance();

        if items.is_empty() {
            return Ok(StarTerm::NamedNode(vocab::rdf::NIL.clone()));
        }
        let head = self.fresh_blank_node()?;
        let mut current = head.clone();
        let last = items.len() - 1;
        for (i, item) in items.into_iter().enumerate() {
            self.emit(
                current.clone(),
                StarTerm::NamedNode(vocab::rdf::FIRST.clone()),
                item,
            )?;
            let rest = if i == last {
                StarTerm::NamedNode(vocab::rdf::NIL.clone())
            } else {
                self.fresh_blank_node()?
            };
            self.emit(
                current,
                StarTerm::NamedNode(vocab::rdf::REST.clone()),
                rest.clone(),
            )?;
            current = rest;
        }
        Ok(head)
    }

    fn emit(&mut self, subject: StarTerm, predicate: StarTerm, object: StarTerm) -> StarResult<()> {
        let triple = StarTriple::new(subject, predicate, object);
        triple.validate()?;
        self.triples.push(triple);
        Ok(())
    }

    /// Fresh blank nodes use a `#` in the label, which no document label can
    /// contain, so generated and explicit labels never collide.
    fn fresh_blank_node(&mut self) -> StarResult<StarTerm> {
        let id = format!("gen#{}", self.blank_counter);
        self.blank_counter += 1;
        StarTerm::blank_node(&id)
    }

    fn expand_prefixed(
        &self,
        prefix: &str,
        local: &str,
        tok: &SpannedToken,
    ) -> StarResult<NamedNode> {
        let namespace = self.prefixes.get(prefix).ok_or_else(|| {
            self.err_at(tok, format!("undefined prefix '{prefix}:'"))
        })?;
        NamedNode::new(format!("{namespace}{local}"))
    }

    fn named_node(&self, iri: &str) -> StarResult<NamedNode> {
        NamedNode::new(self.resolve_iri(iri))
    }

    /// Resolves an IRI reference against the base IRI when it is relative.
    fn resolve_iri(&self, iri: &str) -> String {
        let is_absolute = iri
            .split_once(':')
            .map_or(false, |(scheme, _)| {
                !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
            });
        match (&self.base_iri, is_absolute) {
            (Some(base), false) => format!("{base}{iri}"),
            _ => iri.to_string(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<StarTriple> {
        StarParser::new().parse_str(input).unwrap()
    }

    #[test]
    fn test_simple_triple() {
        let triples = parse("<http://example.org/s> <http://example.org/p> <http://example.org/o> .");
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].subject.to_string(), "<http://example.org/s>");
    }

    #[test]
    fn test_prefix_expansion() {
        let triples = parse("@prefix ex: <http://example.org/> . ex:s ex:p ex:o .");
        assert_eq!(triples[0].predicate.to_string(), "<http://example.org/p>");
    }

    #[test]
    fn test_sparql_style_prefix_without_dot() {
        let triples = parse("PREFIX ex: <http://example.org/>\nex:s ex:p ex:o .");
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_undefined_prefix_is_error() {
        let err = StarParser::new().parse_str("ex:s ex:p ex:o .").unwrap_err();
        assert!(err.to_string().contains("undefined prefix"));
    }

    #[test]
    fn test_a_shorthand() {
        let triples = parse("@prefix ex: <http://example.org/> . ex:s a ex:Thing .");
        assert_eq!(
            triples[0].predicate.to_string(),
            "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>"
        );
    }

    #[test]
    fn test_predicate_and_object_lists() {
        let triples = parse(
            "@prefix ex: <http://example.org/> . ex:s ex:p ex:a , ex:b ; ex:q ex:c .",
        );
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].subject, triples[2].subject);
    }

    #[test]
    fn test_literal_shorthand() {
        let triples = parse(
            "@prefix ex: <http://example.org/> . ex:s ex:i 23 ; ex:d 0.9 ; ex:e 1.0e3 ; ex:b true .",
        );
        let datatypes: Vec<&str> = triples
            .iter()
            .map(|t| t.object.as_literal().unwrap().datatype_iri())
            .collect();
        assert_eq!(
            datatypes,
            vec![
                "http://www.w3.org/2001/XMLSchema#integer",
                "http://www.w3.org/2001/XMLSchema#decimal",
                "http://www.w3.org/2001/XMLSchema#double",
                "http://www.w3.org/2001/XMLSchema#boolean",
            ]
        );
    }

    #[test]
    fn test_language_and_datatype_literals() {
        let triples = parse(
            r#"@prefix ex: <http://example.org/> .
               @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
               ex:s ex:name "chat"@fr ; ex:age "23"^^xsd:integer ."#,
        );
        assert_eq!(triples[0].object.to_string(), "\"chat\"@fr");
        assert!(triples[1].object.as_literal().unwrap().is_numeric());
    }

    #[test]
    fn test_quoted_triple_subject_and_object() {
        let triples = parse(
            r#"@prefix ex: <http://example.org/> .
               << ex:s ex:p ex:o >> ex:certainty 0.9 .
               ex:doc ex:states << ex:s ex:p ex:o >> ."#,
        );
        assert_eq!(triples.len(), 2);
        assert!(triples[0].subject.is_quoted_triple());
        assert!(triples[1].object.is_quoted_triple());
        // Structurally equal quoted terms from separate occurrences.
        assert_eq!(triples[0].subject, triples[1].object);
    }

    #[test]
    fn test_nested_quoted_triple() {
        let triples = parse(
            r#"@prefix ex: <http://example.org/> .
               << << ex:s ex:p ex:o >> ex:certainty 0.9 >> ex:source ex:doc ."#,
        );
        assert_eq!(triples[0].component_depth(), 2);
    }

    #[test]
    fn test_blank_node_property_list() {
        let triples = parse(
            r#"@prefix ex: <http://example.org/> .
               ex:s ex:knows [ ex:name "Bob" ; ex:age 42 ] ."#,
        );
        assert_eq!(triples.len(), 3);
        // The bracketed node's property triples share its generated label.
        assert_eq!(triples[0].subject, triples[1].subject);
        assert_eq!(triples[2].object, triples[0].subject);
    }

    #[test]
    fn test_collection_desugars_to_list() {
        let triples = parse(
            r#"@prefix ex: <http://example.org/> .
               ex:s ex:items ( ex:a ex:b ) ."#,
        );
        // first/rest pairs for two items plus the statement itself.
        assert_eq!(triples.len(), 5);
        let nil = triples
            .iter()
            .filter(|t| t.object.to_string().ends_with("nil>"))
            .count();
        assert_eq!(nil, 1);
    }

    #[test]
    fn test_empty_collection_is_nil() {
        let triples = parse(
            "@prefix ex: <http://example.org/> . ex:s ex:items ( ) .",
        );
        assert_eq!(triples.len(), 1);
        assert_eq!(
            triples[0].object.to_string(),
            "<http://www.w3.org/1999/02/22-rdf-syntax-ns#nil>"
        );
    }

    #[test]
    fn test_base_resolution() {
        let triples = parse("@base <http://example.org/> . <s> <p> <o> .");
        assert_eq!(triples[0].subject.to_string(), "<http://example.org/s>");
    }

    #[test]
    fn test_missing_dot_is_positional_error() {
        let err = StarParser::new()
            .parse_str("@prefix ex: <http://example.org/> .\nex:s ex:p ex:o\nex:s2 ex:p ex:o .")
            .unwrap_err();
        match err {
            StarError::Parse(details) => assert_eq!(details.line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_variable_in_document_is_error() {
        let err = StarParser::new()
            .parse_str("@prefix ex: <http://example.org/> . ?s ex:p ex:o .")
            .unwrap_err();
        assert!(err.to_string().contains("variables are not allowed"));
    }

    #[test]
    fn test_all_or_nothing() {
        let result = StarParser::new().parse_str(
            "@prefix ex: <http://example.org/> . ex:a ex:b ex:c . ex:d ex:e",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_nesting_depth_enforced() {
        let config = StarConfig {
            max_nesting_depth: 1,
            base_iri: None,
        };
        let input = r#"@prefix ex: <http://example.org/> .
            << << ex:s ex:p ex:o >> ex:c 1 >> ex:d 2 ."#;
        assert!(matches!(
            StarParser::with_config(config).parse_str(input),
            Err(StarError::NestingDepthExceeded { .. })
        ));
    }
}
