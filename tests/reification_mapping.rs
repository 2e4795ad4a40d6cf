//! Tests for the mapping between quoted triples and legacy reification,
//! including querying across the two representations.

use starstore::reification::dereify_store;
use starstore::{load_document, query, ReificationStrategy, Reificator};

const QUOTED_DOC: &str = r#"
    PREFIX ex: <http://example.org/>
    ex:subject ex:predicate ex:object .
    << ex:subject ex:predicate ex:object >> ex:certainty 0.9 .
"#;

const REIFIED_DOC: &str = r#"
    PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
    PREFIX ex: <http://example.org/>
    ex:subject ex:predicate ex:object .
    ex:reif a rdf:Statement ;
        rdf:subject ex:subject ;
        rdf:predicate ex:predicate ;
        rdf:object ex:object .
    ex:reif ex:certainty 0.9 .
"#;

#[test]
fn dereified_store_answers_star_queries() {
    let store = load_document(REIFIED_DOC).unwrap();
    let dereified = dereify_store(&store).unwrap();

    let results = query(
        &dereified,
        "PREFIX ex: <http://example.org/> \
         SELECT ?s ?p ?o ?c WHERE { << ?s ?p ?o >> ex:certainty ?c }",
    )
    .unwrap();
    assert_eq!(results.len(), 1);
    let row = results.iter().next().unwrap();
    assert_eq!(row.get("s").unwrap().to_string(), "<http://example.org/subject>");
}

#[test]
fn reified_store_answers_plain_queries() {
    let store = load_document(QUOTED_DOC).unwrap();
    let mut reificator = Reificator::default();
    let reified = reificator.reify_store(&store).unwrap();

    let results = query(
        &reified,
        "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> \
         PREFIX ex: <http://example.org/> \
         SELECT ?r ?c WHERE { \
            ?r a rdf:Statement ; rdf:subject ex:subject . \
            ?r ex:certainty ?c . }",
    )
    .unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn quoted_and_reified_roundtrip_agree() {
    let quoted = load_document(QUOTED_DOC).unwrap();
    let mut reificator = Reificator::new(ReificationStrategy::BlankNodes);
    let reified = reificator.reify_store(&quoted).unwrap();
    assert_eq!(reified.quoted_triple_count(), 0);

    let back = dereify_store(&reified).unwrap();
    assert_eq!(back.len(), quoted.len());
    for triple in quoted.iter() {
        assert!(back.contains(triple));
    }
}

#[test]
fn results_serialize_quoted_triples_as_json() {
    let store = load_document(QUOTED_DOC).unwrap();
    let results = query(
        &store,
        "PREFIX ex: <http://example.org/> SELECT ?t ?c WHERE { ?t ex:certainty ?c }",
    )
    .unwrap();
    let json = results.to_json();
    assert_eq!(json["head"]["vars"][0], "t");
    let binding = &json["results"]["bindings"][0];
    assert_eq!(binding["t"]["type"], "triple");
    assert_eq!(
        binding["t"]["value"]["subject"]["value"],
        "http://example.org/subject"
    );
    assert_eq!(binding["c"]["datatype"], "http://www.w3.org/2001/XMLSchema#decimal");
}
