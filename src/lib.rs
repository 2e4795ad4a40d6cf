//! # StarStore - RDF-star triple store
//!
//! An in-memory triple store for RDF-star graphs, covering:
//! - Quoted triples (`<< s p o >>`) as first-class terms in subject and
//!   object position, nested to arbitrary depth
//! - A Turtle-star parser (prefixes, literals, blank node property lists,
//!   collections, quoted triples)
//! - A SPARQL-star SELECT engine (basic graph patterns, UNION, OPTIONAL,
//!   FILTER, BIND, VALUES, quoted-triple patterns with variables)
//! - Conversion between quoted triples and legacy `rdf:Statement`
//!   reification
//!
//! ## Quick start
//!
//! ```rust
//! use starstore::{load_document, query};
//!
//! let store = load_document(r#"
//!     @prefix ex: <http://example.org/> .
//!     << ex:alice ex:age 23 >> ex:certainty 0.9 .
//! "#)?;
//!
//! let results = query(&store, r#"
//!     PREFIX ex: <http://example.org/>
//!     SELECT ?s ?c WHERE { << ?s ex:age ?a >> ex:certainty ?c }
//! "#)?;
//! assert_eq!(results.len(), 1);
//! # Ok::<(), starstore::StarError>(())
//! ```

use serde::{Deserialize, Serialize};

pub mod model;
pub mod parser;
pub mod query;
pub mod reification;
pub mod results;
pub mod store;
pub mod vocab;

pub use model::{BlankNode, Literal, NamedNode, StarTerm, StarTriple};
pub use parser::StarParser;
pub use query::{Binding, QueryExecutor, QueryParser, SelectQuery};
pub use reification::{ReificationStrategy, Reificator};
pub use results::SolutionSequence;
pub use store::StarStore;

/// Errors that can occur in RDF-star operations
#[derive(Debug, thiserror::Error)]
pub enum StarError {
    /// Syntax error while parsing a document or query
    #[error("parse error at line {}, column {}: {}", .0.line, .0.column, .0.message)]
    Parse(Box<ParseErrorDetails>),

    /// The input is syntactically valid but violates a language constraint
    #[error("semantic error: {message}")]
    Semantic { message: String },

    /// A term constructor was given invalid content
    #[error("invalid term: {message}")]
    InvalidTerm { message: String },

    /// Quoted-triple nesting exceeded the configured maximum
    #[error("nesting depth exceeded: maximum depth {max_depth} reached")]
    NestingDepthExceeded { max_depth: usize },
}

/// Detailed parse error information with source position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseErrorDetails {
    /// One-based line where the error was detected
    pub line: usize,
    /// One-based column where the error was detected
    pub column: usize,
    pub message: String,
}

impl StarError {
    pub fn parse_error(line: usize, column: usize, message: impl Into<String>) -> Self {
        StarError::Parse(Box::new(ParseErrorDetails {
            line,
            column,
            message: message.into(),
        }))
    }

    pub fn semantic_error(message: impl Into<String>) -> Self {
        StarError::Semantic {
            message: message.into(),
        }
    }

    pub fn invalid_term(message: impl Into<String>) -> Self {
        StarError::InvalidTerm {
            message: message.into(),
        }
    }
}

/// Result type for RDF-star operations
pub type StarResult<T> = Result<T, StarError>;

/// Configuration for RDF-star processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarConfig {
    /// Maximum nesting depth for quoted triples
    pub max_nesting_depth: usize,
    /// Base IRI used to resolve relative IRIs in documents
    pub base_iri: Option<String>,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            base_iri: None,
        }
    }
}

/// Parses a Turtle-star document into a fresh store.
///
/// Parsing is all-or-nothing: any syntax error aborts the load and the
/// returned error carries the line and column of the first failure.
pub fn load_document(text: &str) -> StarResult<StarStore> {
    load_document_with_config(text, StarConfig::default())
}

/// Parses a Turtle-star document with explicit configuration.
pub fn load_document_with_config(text: &str, config: StarConfig) -> StarResult<StarStore> {
    let parser = StarParser::with_config(config.clone());
    let triples = parser.parse_str(text)?;
    let mut store = StarStore::with_config(config);
    for triple in triples {
        store.insert(triple)?;
    }
    Ok(store)
}

/// Parses and executes a SPARQL-star SELECT query against a store.
///
/// An empty solution sequence is a valid outcome, not an error.
pub fn query(store: &StarStore, query_text: &str) -> StarResult<SolutionSequence> {
    let parsed = QueryParser::new().parse(query_text)?;
    QueryExecutor::new(store).execute(&parsed)
}
