//! RDF-star data model: terms, triples, and quoted triples.
//!
//! A [`StarTerm`] is an IRI, blank node, literal, or quoted triple. Quoted
//! triples contain a full [`StarTriple`] and may nest, so a term is a tree.
//! Equality, hashing, and ordering are structural throughout, which makes
//! quoted triples usable as keys in hash-based indexes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab;
use crate::{StarError, StarResult};

/// An IRI reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamedNode {
    iri: String,
}

impl NamedNode {
    /// Creates a named node, rejecting obviously malformed IRIs.
    pub fn new(iri: impl Into<String>) -> StarResult<Self> {
        let iri = iri.into();
        if iri.is_empty() {
            return Err(StarError::invalid_term("IRI must not be empty"));
        }
        if iri
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`'))
        {
            return Err(StarError::invalid_term(format!(
                "IRI contains forbidden character: {iri}"
            )));
        }
        Ok(Self { iri })
    }

    /// Creates a named node without validation. Reserved for IRIs that are
    /// known-good at compile time, such as vocabulary constants.
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        Self { iri: iri.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.iri
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

/// A blank node with a store-local identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlankNode {
    id: String,
}

impl BlankNode {
    pub fn new(id: impl Into<String>) -> StarResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(StarError::invalid_term("blank node id must not be empty"));
        }
        Ok(Self { id })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

/// An RDF literal: a lexical value with an optional datatype or language tag.
///
/// A literal carries at most one of `language` and `datatype`. A
/// language-tagged literal implicitly has datatype `rdf:langString`; a plain
/// literal implicitly has `xsd:string`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub datatype: Option<NamedNode>,
    pub language: Option<String>,
}

impl Literal {
    /// Creates a plain string literal.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Creates a literal with an explicit datatype IRI.
    pub fn new_typed(value: impl Into<String>, datatype: NamedNode) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype),
            language: None,
        }
    }

    /// Creates a language-tagged literal.
    pub fn new_lang(value: impl Into<String>, language: impl Into<String>) -> StarResult<Self> {
        let language = language.into();
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(StarError::invalid_term(format!(
                "invalid language tag: {language}"
            )));
        }
        Ok(Self {
            value: value.into(),
            datatype: None,
            language: Some(language),
        })
    }

    /// Creates an `xsd:boolean` literal.
    pub fn boolean(value: bool) -> Self {
        Self::new_typed(if value { "true" } else { "false" }, vocab::xsd::BOOLEAN.clone())
    }

    /// The effective datatype IRI, accounting for implicit datatypes.
    pub fn datatype_iri(&self) -> &str {
        if self.language.is_some() {
            vocab::rdf::LANG_STRING.as_str()
        } else {
            self.datatype
                .as_ref()
                .map(|d| d.as_str())
                .unwrap_or_else(|| vocab::xsd::STRING.as_str())
        }
    }

    /// Whether the datatype is one of the XSD numeric types this crate
    /// produces when parsing numeric shorthand.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.datatype_iri(),
            "http://www.w3.org/2001/XMLSchema#integer"
                | "http://www.w3.org/2001/XMLSchema#decimal"
                | "http://www.w3.org/2001/XMLSchema#double"
                | "http://www.w3.org/2001/XMLSchema#float"
        )
    }

    /// The numeric value, if this is a numeric literal with a parseable
    /// lexical form.
    pub fn as_f64(&self) -> Option<f64> {
        if self.is_numeric() {
            self.value.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape_literal(&self.value))?;
        if let Some(lang) = &self.language {
            write!(f, "@{lang}")
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^{datatype}")
        } else {
            Ok(())
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// An RDF-star term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StarTerm {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
    QuotedTriple(Box<StarTriple>),
}

impl StarTerm {
    /// Creates an IRI term.
    pub fn iri(iri: &str) -> StarResult<Self> {
        Ok(StarTerm::NamedNode(NamedNode::new(iri)?))
    }

    /// Creates a blank node term.
    pub fn blank_node(id: &str) -> StarResult<Self> {
        Ok(StarTerm::BlankNode(BlankNode::new(id)?))
    }

    /// Creates a plain string literal term.
    pub fn literal(value: &str) -> Self {
        StarTerm::Literal(Literal::new(value))
    }

    /// Creates a typed literal term.
    pub fn typed_literal(value: &str, datatype: &str) -> StarResult<Self> {
        Ok(StarTerm::Literal(Literal::new_typed(
            value,
            NamedNode::new(datatype)?,
        )))
    }

    /// Creates a language-tagged literal term.
    pub fn lang_literal(value: &str, language: &str) -> StarResult<Self> {
        Ok(StarTerm::Literal(Literal::new_lang(value, language)?))
    }

    /// Wraps a triple as a quoted-triple term.
    pub fn quoted_triple(triple: StarTriple) -> Self {
        StarTerm::QuotedTriple(Box::new(triple))
    }

    pub fn is_named_node(&self) -> bool {
        matches!(self, StarTerm::NamedNode(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, StarTerm::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, StarTerm::Literal(_))
    }

    pub fn is_quoted_triple(&self) -> bool {
        matches!(self, StarTerm::QuotedTriple(_))
    }

    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            StarTerm::NamedNode(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            StarTerm::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_quoted_triple(&self) -> Option<&StarTriple> {
        match self {
            StarTerm::QuotedTriple(t) => Some(t),
            _ => None,
        }
    }

    /// Quoted-triple nesting depth of this term. Zero for atomic terms; a
    /// quoted triple is one deeper than its deepest component.
    pub fn nesting_depth(&self) -> usize {
        match self {
            StarTerm::QuotedTriple(t) => 1 + t.component_depth(),
            _ => 0,
        }
    }

    /// Whether the term may appear in subject position.
    pub fn is_valid_subject(&self) -> bool {
        !self.is_literal()
    }

    /// Whether the term may appear in predicate position.
    pub fn is_valid_predicate(&self) -> bool {
        self.is_named_node()
    }
}

impl fmt::Display for StarTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StarTerm::NamedNode(n) => n.fmt(f),
            StarTerm::BlankNode(b) => b.fmt(f),
            StarTerm::Literal(l) => l.fmt(f),
            StarTerm::QuotedTriple(t) => write!(f, "<< {} {} {} >>", t.subject, t.predicate, t.object),
        }
    }
}

/// An RDF-star triple. Any component may itself contain quoted triples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StarTriple {
    pub subject: StarTerm,
    pub predicate: StarTerm,
    pub object: StarTerm,
}

impl StarTriple {
    pub fn new(subject: StarTerm, predicate: StarTerm, object: StarTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Checks positional constraints: literals cannot be subjects and only
    /// IRIs can be predicates. Applies recursively to quoted components.
    pub fn validate(&self) -> StarResult<()> {
        if !self.subject.is_valid_subject() {
            return Err(StarError::invalid_term(format!(
                "literal cannot be used as subject: {}",
                self.subject
            )));
        }
        if !self.predicate.is_valid_predicate() {
            return Err(StarError::invalid_term(format!(
                "predicate must be an IRI: {}",
                self.predicate
            )));
        }
        for term in [&self.subject, &self.object] {
            if let StarTerm::QuotedTriple(inner) = term {
                inner.validate()?;
            }
        }
        Ok(())
    }

    /// Deepest quoted-triple nesting among the three components.
    pub fn component_depth(&self) -> usize {
        self.subject
            .nesting_depth()
            .max(self.predicate.nesting_depth())
            .max(self.object.nesting_depth())
    }

    /// Whether any component is a quoted triple.
    pub fn contains_quoted_triple(&self) -> bool {
        self.subject.is_quoted_triple() || self.object.is_quoted_triple()
    }
}

impl fmt::Display for StarTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_triple() -> StarTriple {
        StarTriple::new(
            StarTerm::iri("http://example.org/s").unwrap(),
            StarTerm::iri("http://example.org/p").unwrap(),
            StarTerm::literal("o"),
        )
    }

    #[test]
    fn test_named_node_validation() {
        assert!(NamedNode::new("http://example.org/a").is_ok());
        assert!(NamedNode::new("").is_err());
        assert!(NamedNode::new("http://example.org/a space").is_err());
        assert!(NamedNode::new("bad<iri>").is_err());
    }

    #[test]
    fn test_quoted_triple_structural_equality() {
        let a = StarTerm::quoted_triple(sample_triple());
        let b = StarTerm::quoted_triple(sample_triple());
        assert_eq!(a, b);

        let c = StarTerm::quoted_triple(StarTriple::new(
            StarTerm::iri("http://example.org/s").unwrap(),
            StarTerm::iri("http://example.org/p").unwrap(),
            StarTerm::literal("different"),
        ));
        assert_ne!(a, c);
    }

    #[test]
    fn test_nesting_depth() {
        let flat = sample_triple();
        assert_eq!(flat.component_depth(), 0);

        let quoted = StarTriple::new(
            StarTerm::quoted_triple(flat.clone()),
            StarTerm::iri("http://example.org/certainty").unwrap(),
            StarTerm::literal("0.9"),
        );
        assert_eq!(quoted.component_depth(), 1);

        let doubly = StarTriple::new(
            StarTerm::quoted_triple(quoted),
            StarTerm::iri("http://example.org/source").unwrap(),
            StarTerm::iri("http://example.org/doc").unwrap(),
        );
        assert_eq!(doubly.component_depth(), 2);
        assert_eq!(StarTerm::quoted_triple(doubly).nesting_depth(), 3);
    }

    #[test]
    fn test_validate_rejects_literal_subject() {
        let bad = StarTriple::new(
            StarTerm::literal("nope"),
            StarTerm::iri("http://example.org/p").unwrap(),
            StarTerm::literal("o"),
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_iri_predicate() {
        let bad = StarTriple::new(
            StarTerm::iri("http://example.org/s").unwrap(),
            StarTerm::blank_node("b0").unwrap(),
            StarTerm::literal("o"),
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_display_ntriples_forms() {
        assert_eq!(
            StarTerm::iri("http://example.org/s").unwrap().to_string(),
            "<http://example.org/s>"
        );
        assert_eq!(StarTerm::blank_node("b1").unwrap().to_string(), "_:b1");
        assert_eq!(
            StarTerm::lang_literal("chat", "fr").unwrap().to_string(),
            "\"chat\"@fr"
        );
        assert_eq!(
            StarTerm::typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer")
                .unwrap()
                .to_string(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(
            StarTerm::quoted_triple(sample_triple()).to_string(),
            "<< <http://example.org/s> <http://example.org/p> \"o\" >>"
        );
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(
            StarTerm::literal("line\n\"quote\"").to_string(),
            "\"line\\n\\\"quote\\\"\""
        );
    }

    #[test]
    fn test_numeric_literals() {
        let n = Literal::new_typed("23", vocab::xsd::INTEGER.clone());
        assert!(n.is_numeric());
        assert_eq!(n.as_f64(), Some(23.0));
        assert!(!Literal::new("23").is_numeric());
    }
}
