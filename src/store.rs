//! In-memory RDF-star triple store with permutation indexes.
//!
//! Triples are held in insertion order in an arena; six secondary indexes
//! map bound term combinations to arena positions so pattern matching can
//! probe the most selective index instead of scanning the whole store.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::model::{StarTerm, StarTriple};
use crate::{StarConfig, StarError, StarResult};

/// An RDF-star graph with set semantics.
///
/// Duplicate inserts collapse; quoted triples participate in indexing like
/// any other term, so a fully concrete quoted-triple lookup is a hash probe.
#[derive(Debug, Default)]
pub struct StarStore {
    config: StarConfig,
    triples: Vec<StarTriple>,
    seen: FxHashSet<StarTriple>,
    by_subject: FxHashMap<StarTerm, Vec<usize>>,
    by_predicate: FxHashMap<StarTerm, Vec<usize>>,
    by_object: FxHashMap<StarTerm, Vec<usize>>,
    by_subject_predicate: FxHashMap<(StarTerm, StarTerm), Vec<usize>>,
    by_predicate_object: FxHashMap<(StarTerm, StarTerm), Vec<usize>>,
    by_subject_object: FxHashMap<(StarTerm, StarTerm), Vec<usize>>,
}

impl StarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StarConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Inserts a triple. Returns `true` if the triple was not already
    /// present. Invalid triples and triples nested beyond the configured
    /// maximum are rejected.
    pub fn insert(&mut self, triple: StarTriple) -> StarResult<bool> {
        triple.validate()?;
        if triple.component_depth() > self.config.max_nesting_depth {
            return Err(StarError::NestingDepthExceeded {
                max_depth: self.config.max_nesting_depth,
            });
        }
        if self.seen.contains(&triple) {
            return Ok(false);
        }

        let idx = self.triples.len();
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .push(idx);
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .push(idx);
        self.by_object
            .entry(triple.object.clone())
            .or_default()
            .push(idx);
        self.by_subject_predicate
            .entry((triple.subject.clone(), triple.predicate.clone()))
            .or_default()
            .push(idx);
        self.by_predicate_object
            .entry((triple.predicate.clone(), triple.object.clone()))
            .or_default()
            .push(idx);
        self.by_subject_object
            .entry((triple.subject.clone(), triple.object.clone()))
            .or_default()
            .push(idx);
        self.seen.insert(triple.clone());
        self.triples.push(triple);
        debug!(total = self.triples.len(), "inserted triple");
        Ok(true)
    }

    /// Membership test, O(1) expected.
    pub fn contains(&self, triple: &StarTriple) -> bool {
        self.seen.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// All triples in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, StarTriple> {
        self.triples.iter()
    }

    /// Lazily yields triples matching the given pattern, `None` acting as a
    /// wildcard. The most selective available index is probed first; any
    /// remaining constraints are checked while iterating. Matches are
    /// produced in insertion order.
    pub fn match_pattern<'a>(
        &'a self,
        subject: Option<&'a StarTerm>,
        predicate: Option<&'a StarTerm>,
        object: Option<&'a StarTerm>,
    ) -> impl Iterator<Item = &'a StarTriple> + 'a {
        let candidates = self.candidates(subject, predicate, object);
        candidates.filter_map(move |idx| {
            let triple = &self.triples[idx];
            let matches = subject.map_or(true, |s| &triple.subject == s)
                && predicate.map_or(true, |p| &triple.predicate == p)
                && object.map_or(true, |o| &triple.object == o);
            matches.then_some(triple)
        })
    }

    /// Triples whose subject or object is exactly the given quoted triple.
    pub fn triples_quoting(&self, quoted: &StarTriple) -> Vec<&StarTriple> {
        let term = StarTerm::quoted_triple(quoted.clone());
        let mut out: Vec<&StarTriple> = Vec::new();
        if let Some(postings) = self.by_subject.get(&term) {
            out.extend(postings.iter().map(|&idx| &self.triples[idx]));
        }
        if let Some(postings) = self.by_object.get(&term) {
            out.extend(
                postings
                    .iter()
                    .map(|&idx| &self.triples[idx])
                    .filter(|t| t.subject != term),
            );
        }
        out
    }

    /// Number of asserted triples containing at least one quoted triple.
    pub fn quoted_triple_count(&self) -> usize {
        self.triples
            .iter()
            .filter(|t| t.contains_quoted_triple())
            .count()
    }

    fn candidates(
        &self,
        subject: Option<&StarTerm>,
        predicate: Option<&StarTerm>,
        object: Option<&StarTerm>,
    ) -> Candidates<'_> {
        let postings = match (subject, predicate, object) {
            (Some(s), Some(p), _) => self
                .by_subject_predicate
                .get(&(s.clone(), p.clone())),
            (_, Some(p), Some(o)) => self
                .by_predicate_object
                .get(&(p.clone(), o.clone())),
            (Some(s), None, Some(o)) => self
                .by_subject_object
                .get(&(s.clone(), o.clone())),
            (Some(s), None, None) => self.by_subject.get(s),
            (None, Some(p), None) => self.by_predicate.get(p),
            (None, None, Some(o)) => self.by_object.get(o),
            (None, None, None) => return Candidates::Scan(0..self.triples.len()),
        };
        match postings {
            Some(list) => Candidates::Indexed(list.iter()),
            None => Candidates::Empty,
        }
    }
}

enum Candidates<'a> {
    Indexed(std::slice::Iter<'a, usize>),
    Scan(std::ops::Range<usize>),
    Empty,
}

impl Iterator for Candidates<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Candidates::Indexed(iter) => iter.next().copied(),
            Candidates::Scan(range) => range.next(),
            Candidates::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StarTerm;

    fn iri(suffix: &str) -> StarTerm {
        StarTerm::iri(&format!("http://example.org/{suffix}")).unwrap()
    }

    fn triple(s: &str, p: &str, o: &str) -> StarTriple {
        StarTriple::new(iri(s), iri(p), iri(o))
    }

    #[test]
    fn test_insert_and_contains() {
        let mut store = StarStore::new();
        assert!(store.insert(triple("a", "p", "b")).unwrap());
        assert!(store.contains(&triple("a", "p", "b")));
        assert!(!store.contains(&triple("a", "p", "c")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_collapses() {
        let mut store = StarStore::new();
        assert!(store.insert(triple("a", "p", "b")).unwrap());
        assert!(!store.insert(triple("a", "p", "b")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_match_pattern_wildcards() {
        let mut store = StarStore::new();
        store.insert(triple("a", "p", "b")).unwrap();
        store.insert(triple("a", "q", "c")).unwrap();
        store.insert(triple("d", "p", "b")).unwrap();

        let s = iri("a");
        assert_eq!(store.match_pattern(Some(&s), None, None).count(), 2);

        let p = iri("p");
        assert_eq!(store.match_pattern(None, Some(&p), None).count(), 2);

        let o = iri("b");
        assert_eq!(store.match_pattern(Some(&s), Some(&p), Some(&o)).count(), 1);
        assert_eq!(store.match_pattern(None, None, None).count(), 3);
    }

    #[test]
    fn test_match_pattern_no_match_is_empty() {
        let mut store = StarStore::new();
        store.insert(triple("a", "p", "b")).unwrap();
        let missing = iri("zzz");
        assert_eq!(store.match_pattern(Some(&missing), None, None).count(), 0);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut store = StarStore::new();
        store.insert(triple("a", "p", "b")).unwrap();
        store.insert(triple("c", "p", "d")).unwrap();
        let subjects: Vec<String> = store.iter().map(|t| t.subject.to_string()).collect();
        assert_eq!(
            subjects,
            vec!["<http://example.org/a>", "<http://example.org/c>"]
        );
    }

    #[test]
    fn test_quoted_triple_lookup() {
        let mut store = StarStore::new();
        let inner = triple("s", "p", "o");
        let outer = StarTriple::new(
            StarTerm::quoted_triple(inner.clone()),
            iri("certainty"),
            StarTerm::literal("0.9"),
        );
        let citing = StarTriple::new(
            iri("doc"),
            iri("states"),
            StarTerm::quoted_triple(inner.clone()),
        );
        store.insert(inner.clone()).unwrap();
        store.insert(outer.clone()).unwrap();
        store.insert(citing.clone()).unwrap();

        // Both subject-position and object-position occurrences, each once.
        let quoting = store.triples_quoting(&inner);
        assert_eq!(quoting.len(), 2);
        assert!(quoting.contains(&&outer));
        assert!(quoting.contains(&&citing));
        assert_eq!(store.quoted_triple_count(), 2);

        let quoted = StarTerm::quoted_triple(inner);
        assert_eq!(store.match_pattern(Some(&quoted), None, None).count(), 1);
    }

    #[test]
    fn test_quoting_in_both_positions_counted_once() {
        let mut store = StarStore::new();
        let inner = triple("s", "p", "o");
        let quoted = StarTerm::quoted_triple(inner.clone());
        let reflexive = StarTriple::new(quoted.clone(), iri("sameAs"), quoted);
        store.insert(reflexive.clone()).unwrap();

        let quoting = store.triples_quoting(&inner);
        assert_eq!(quoting.len(), 1);
        assert_eq!(quoting[0], &reflexive);
    }

    #[test]
    fn test_match_pattern_subject_object_bound() {
        let mut store = StarStore::new();
        store.insert(triple("a", "p", "b")).unwrap();
        store.insert(triple("a", "q", "b")).unwrap();
        store.insert(triple("a", "p", "c")).unwrap();

        let s = iri("a");
        let o = iri("b");
        let matched: Vec<_> = store.match_pattern(Some(&s), None, Some(&o)).collect();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|t| t.subject == s && t.object == o));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut store = StarStore::with_config(StarConfig {
            max_nesting_depth: 1,
            base_iri: None,
        });
        let level1 = StarTriple::new(
            StarTerm::quoted_triple(triple("s", "p", "o")),
            iri("a"),
            iri("b"),
        );
        assert!(store.insert(level1.clone()).is_ok());

        let level2 = StarTriple::new(StarTerm::quoted_triple(level1), iri("c"), iri("d"));
        assert!(matches!(
            store.insert(level2),
            Err(StarError::NestingDepthExceeded { .. })
        ));
    }
}
