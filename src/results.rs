//! Materialized query results.

use serde_json::{json, Value};

use crate::model::StarTerm;
use crate::query::Binding;

/// An ordered, materialized sequence of query solutions.
///
/// The sequence owns its rows, so it can be iterated any number of times;
/// each call to [`SolutionSequence::iter`] restarts from the first solution.
#[derive(Debug, Clone, Default)]
pub struct SolutionSequence {
    variables: Vec<String>,
    rows: Vec<Binding>,
}

impl SolutionSequence {
    pub fn new(variables: Vec<String>, rows: Vec<Binding>) -> Self {
        Self { variables, rows }
    }

    /// The projected variable names, in projection order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.rows.iter()
    }

    /// All bindings of one variable across the sequence, skipping rows where
    /// it is unbound.
    pub fn column(&self, variable: &str) -> Vec<&StarTerm> {
        self.rows
            .iter()
            .filter_map(|row| row.get(variable))
            .collect()
    }

    /// Serializes in the SPARQL 1.1 Query Results JSON Format, with the
    /// RDF-star extension encoding quoted triples as `"type": "triple"`.
    pub fn to_json(&self) -> Value {
        let bindings: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for variable in &self.variables {
                    if let Some(term) = row.get(variable) {
                        obj.insert(variable.clone(), encode_term(term));
                    }
                }
                Value::Object(obj)
            })
            .collect();
        json!({
            "head": { "vars": self.variables },
            "results": { "bindings": bindings }
        })
    }
}

impl<'a> IntoIterator for &'a SolutionSequence {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn encode_term(term: &StarTerm) -> Value {
    match term {
        StarTerm::NamedNode(n) => json!({ "type": "uri", "value": n.as_str() }),
        StarTerm::BlankNode(b) => json!({ "type": "bnode", "value": b.as_str() }),
        StarTerm::Literal(l) => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), json!("literal"));
            obj.insert("value".into(), json!(l.value));
            if let Some(lang) = &l.language {
                obj.insert("xml:lang".into(), json!(lang));
            } else if let Some(datatype) = &l.datatype {
                obj.insert("datatype".into(), json!(datatype.as_str()));
            }
            Value::Object(obj)
        }
        StarTerm::QuotedTriple(t) => json!({
            "type": "triple",
            "value": {
                "subject": encode_term(&t.subject),
                "predicate": encode_term(&t.predicate),
                "object": encode_term(&t.object),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StarTerm, StarTriple};

    fn sample() -> SolutionSequence {
        let mut row = Binding::new();
        row.bind("s", StarTerm::iri("http://example.org/s").unwrap());
        row.bind(
            "t",
            StarTerm::quoted_triple(StarTriple::new(
                StarTerm::iri("http://example.org/a").unwrap(),
                StarTerm::iri("http://example.org/p").unwrap(),
                StarTerm::literal("v"),
            )),
        );
        SolutionSequence::new(vec!["s".into(), "t".into()], vec![row])
    }

    #[test]
    fn test_restartable_iteration() {
        let results = sample();
        let first: Vec<_> = results.iter().collect();
        let second: Vec<_> = results.iter().collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_column_extraction() {
        let results = sample();
        assert_eq!(results.column("s").len(), 1);
        assert_eq!(results.column("missing").len(), 0);
    }

    #[test]
    fn test_json_serialization() {
        let json = sample().to_json();
        assert_eq!(json["head"]["vars"][0], "s");
        let binding = &json["results"]["bindings"][0];
        assert_eq!(binding["s"]["type"], "uri");
        assert_eq!(binding["t"]["type"], "triple");
        assert_eq!(binding["t"]["value"]["object"]["value"], "v");
    }
}
