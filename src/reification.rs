//! Conversion between quoted triples and legacy `rdf:Statement` reification.
//!
//! Reifying rewrites every quoted triple into a statement node carrying
//! `rdf:type rdf:Statement`, `rdf:subject`, `rdf:predicate`, and
//! `rdf:object` triples; dereifying reverses the mapping. Both directions
//! handle nesting: a reified statement may describe another statement node.

use std::collections::HashMap;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::model::{BlankNode, NamedNode, StarTerm, StarTriple};
use crate::store::StarStore;
use crate::vocab;
use crate::{StarError, StarResult};

/// How statement nodes are minted during reification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReificationStrategy {
    /// Fresh IRIs under a base namespace
    #[default]
    UniqueIris,
    /// Fresh blank nodes
    BlankNodes,
}

/// Rewrites stores between quoted-triple and reified form.
#[derive(Debug)]
pub struct Reificator {
    strategy: ReificationStrategy,
    base_iri: String,
    counter: usize,
    assigned: HashMap<StarTriple, StarTerm>,
}

impl Default for Reificator {
    fn default() -> Self {
        Self::new(ReificationStrategy::default())
    }
}

impl Reificator {
    pub fn new(strategy: ReificationStrategy) -> Self {
        Self {
            strategy,
            base_iri: "http://example.org/statement/".to_string(),
            counter: 0,
            assigned: HashMap::new(),
        }
    }

    pub fn with_base_iri(strategy: ReificationStrategy, base_iri: impl Into<String>) -> Self {
        Self {
            base_iri: base_iri.into(),
            ..Self::new(strategy)
        }
    }

    /// Produces a store without quoted triples: every quoted term is
    /// replaced by a statement node and described by four reification
    /// triples. Structurally equal quoted triples share one node.
    pub fn reify_store(&mut self, store: &StarStore) -> StarResult<StarStore> {
        let mut out = StarStore::new();
        for triple in store.iter() {
            let subject = self.replace_quoted(&triple.subject, &mut out)?;
            let object = self.replace_quoted(&triple.object, &mut out)?;
            out.insert(StarTriple::new(subject, triple.predicate.clone(), object))?;
        }
        debug!(input = store.len(), output = out.len(), "reified store");
        Ok(out)
    }

    fn replace_quoted(&mut self, term: &StarTerm, out: &mut StarStore) -> StarResult<StarTerm> {
        let StarTerm::QuotedTriple(quoted) = term else {
            return Ok(term.clone());
        };
        if let Some(node) = self.assigned.get(quoted.as_ref()) {
            return Ok(node.clone());
        }
        // Components may themselves be quoted, so rewrite depth-first.
        let subject = self.replace_quoted(&quoted.subject, out)?;
        let object = self.replace_quoted(&quoted.object, out)?;

        let node = self.mint_node()?;
        self.assigned.insert(quoted.as_ref().clone(), node.clone());
        out.insert(StarTriple::new(
            node.clone(),
            StarTerm::NamedNode(vocab::rdf::TYPE.clone()),
            StarTerm::NamedNode(vocab::rdf::STATEMENT.clone()),
        ))?;
        out.insert(StarTriple::new(
            node.clone(),
            StarTerm::NamedNode(vocab::rdf::SUBJECT.clone()),
            subject,
        ))?;
        out.insert(StarTriple::new(
            node.clone(),
            StarTerm::NamedNode(vocab::rdf::PREDICATE.clone()),
            quoted.predicate.clone(),
        ))?;
        out.insert(StarTriple::new(
            node.clone(),
            StarTerm::NamedNode(vocab::rdf::OBJECT.clone()),
            object,
        ))?;
        Ok(node)
    }

    fn mint_node(&mut self) -> StarResult<StarTerm> {
        let id = self.counter;
        self.counter += 1;
        match self.strategy {
            ReificationStrategy::UniqueIris => Ok(StarTerm::NamedNode(NamedNode::new(format!(
                "{}{id}",
                self.base_iri
            ))?)),
            ReificationStrategy::BlankNodes => Ok(StarTerm::BlankNode(BlankNode::new(format!(
                "reif{id}"
            ))?)),
        }
    }
}

/// Produces a store where complete reifications are collapsed back into
/// quoted triples. A statement node qualifies when it has `rdf:type
/// rdf:Statement` and exactly determinable `rdf:subject`, `rdf:predicate`,
/// and `rdf:object` values; its four description triples are dropped and
/// every other occurrence of the node is replaced by the quoted triple.
pub fn dereify_store(store: &StarStore) -> StarResult<StarStore> {
    let rdf_type = StarTerm::NamedNode(vocab::rdf::TYPE.clone());
    let rdf_statement = StarTerm::NamedNode(vocab::rdf::STATEMENT.clone());
    let rdf_subject = StarTerm::NamedNode(vocab::rdf::SUBJECT.clone());
    let rdf_predicate = StarTerm::NamedNode(vocab::rdf::PREDICATE.clone());
    let rdf_object = StarTerm::NamedNode(vocab::rdf::OBJECT.clone());

    // Statement nodes with their raw component terms.
    let mut components: HashMap<StarTerm, (StarTerm, StarTerm, StarTerm)> = HashMap::new();
    for triple in store.match_pattern(None, Some(&rdf_type), Some(&rdf_statement)) {
        let node = triple.subject.clone();
        let subject = single_object(store, &node, &rdf_subject);
        let predicate = single_object(store, &node, &rdf_predicate);
        let object = single_object(store, &node, &rdf_object);
        if let (Some(s), Some(p), Some(o)) = (subject, predicate, object) {
            components.insert(node, (s, p, o));
        }
    }

    // Resolve nodes to quoted triples, following references between
    // statement nodes. A cyclic reification cannot be represented as a
    // finite quoted triple.
    let mut resolved: HashMap<StarTerm, StarTerm> = HashMap::new();
    for node in components.keys() {
        let mut in_progress = FxHashSet::default();
        resolve_node(node, &components, &mut resolved, &mut in_progress)?;
    }

    let mut out = StarStore::new();
    for triple in store.iter() {
        if is_reification_triple(triple, &components, &rdf_type, &rdf_statement) {
            continue;
        }
        let subject = resolved.get(&triple.subject).cloned().unwrap_or_else(|| triple.subject.clone());
        let object = resolved.get(&triple.object).cloned().unwrap_or_else(|| triple.object.clone());
        out.insert(StarTriple::new(subject, triple.predicate.clone(), object))?;
    }
    debug!(
        statements = components.len(),
        output = out.len(),
        "dereified store"
    );
    Ok(out)
}

fn single_object(store: &StarStore, node: &StarTerm, predicate: &StarTerm) -> Option<StarTerm> {
    let mut matches = store.match_pattern(Some(node), Some(predicate), None);
    let first = matches.next()?.object.clone();
    // Ambiguous reifications are left untouched.
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

fn resolve_node(
    node: &StarTerm,
    components: &HashMap<StarTerm, (StarTerm, StarTerm, StarTerm)>,
    resolved: &mut HashMap<StarTerm, StarTerm>,
    in_progress: &mut FxHashSet<StarTerm>,
) -> StarResult<StarTerm> {
    if let Some(term) = resolved.get(node) {
        return Ok(term.clone());
    }
    let Some((subject, predicate, object)) = components.get(node) else {
        return Ok(node.clone());
    };
    if !in_progress.insert(node.clone()) {
        return Err(StarError::semantic_error(format!(
            "cyclic reification involving {node}"
        )));
    }
    let subject = resolve_node(subject, components, resolved, in_progress)?;
    let object = resolve_node(object, components, resolved, in_progress)?;
    in_progress.remove(node);

    let triple = StarTriple::new(subject, predicate.clone(), object);
    triple.validate()?;
    let quoted = StarTerm::quoted_triple(triple);
    resolved.insert(node.clone(), quoted.clone());
    Ok(quoted)
}

fn is_reification_triple(
    triple: &StarTriple,
    components: &HashMap<StarTerm, (StarTerm, StarTerm, StarTerm)>,
    rdf_type: &StarTerm,
    rdf_statement: &StarTerm,
) -> bool {
    if !components.contains_key(&triple.subject) {
        return false;
    }
    let p = &triple.predicate;
    (p == rdf_type && &triple.object == rdf_statement)
        || p == &StarTerm::NamedNode(vocab::rdf::SUBJECT.clone())
        || p == &StarTerm::NamedNode(vocab::rdf::PREDICATE.clone())
        || p == &StarTerm::NamedNode(vocab::rdf::OBJECT.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_document;

    fn quoted_doc() -> StarStore {
        load_document(
            r#"
            @prefix ex: <http://example.org/> .
            ex:subject ex:predicate ex:object .
            << ex:subject ex:predicate ex:object >> ex:certainty 0.9 .
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_reify_removes_quoted_triples() {
        let mut reificator = Reificator::default();
        let reified = reificator.reify_store(&quoted_doc()).unwrap();
        assert_eq!(reified.quoted_triple_count(), 0);
        // original assertion + outer triple + 4 reification triples
        assert_eq!(reified.len(), 6);
    }

    #[test]
    fn test_reify_shares_nodes_for_equal_quoted_triples() {
        let store = load_document(
            r#"
            @prefix ex: <http://example.org/> .
            << ex:s ex:p ex:o >> ex:a ex:b .
            << ex:s ex:p ex:o >> ex:c ex:d .
            "#,
        )
        .unwrap();
        let mut reificator = Reificator::default();
        let reified = reificator.reify_store(&store).unwrap();
        // one shared statement node: 4 description triples + 2 assertions
        assert_eq!(reified.len(), 6);
    }

    #[test]
    fn test_roundtrip_restores_quoted_form() {
        let original = quoted_doc();
        let mut reificator = Reificator::default();
        let reified = reificator.reify_store(&original).unwrap();
        let restored = dereify_store(&reified).unwrap();

        assert_eq!(restored.len(), original.len());
        for triple in original.iter() {
            assert!(restored.contains(triple), "missing {triple}");
        }
    }

    #[test]
    fn test_blank_node_strategy() {
        let mut reificator = Reificator::new(ReificationStrategy::BlankNodes);
        let reified = reificator.reify_store(&quoted_doc()).unwrap();
        let has_blank_statement = reified
            .iter()
            .any(|t| t.subject.is_blank_node() && t.object.to_string().ends_with("Statement>"));
        assert!(has_blank_statement);
    }

    #[test]
    fn test_dereify_nested_reification() {
        // A reified statement about another reified statement.
        let store = load_document(
            r#"
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix ex: <http://example.org/> .
            ex:inner a rdf:Statement ;
                rdf:subject ex:s ; rdf:predicate ex:p ; rdf:object ex:o .
            ex:outer a rdf:Statement ;
                rdf:subject ex:inner ; rdf:predicate ex:certainty ; rdf:object ex:high .
            ex:outer ex:source ex:doc .
            "#,
        )
        .unwrap();
        let restored = dereify_store(&store).unwrap();
        assert_eq!(restored.len(), 1);
        let triple = restored.iter().next().unwrap();
        let quoted = triple.subject.as_quoted_triple().unwrap();
        assert!(quoted.subject.is_quoted_triple());
    }

    #[test]
    fn test_incomplete_reification_left_untouched() {
        let store = load_document(
            r#"
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix ex: <http://example.org/> .
            ex:partial a rdf:Statement ;
                rdf:subject ex:s .
            "#,
        )
        .unwrap();
        let restored = dereify_store(&store).unwrap();
        assert_eq!(restored.len(), store.len());
    }
}
