//! End-to-end coverage of the write -> commit -> search path and the
//! clear-context -> rebuild path, against a `FakeTripleStore` double
//! implementing the §6.1 contract (spec.md §8 concrete scenarios).

use textual_index_sail::buffer::TransactionBuffer;
use textual_index_sail::core::config::{Config, Directory};
use textual_index_sail::core::error::Error;
use textual_index_sail::document;
use textual_index_sail::fact::{Fact, Value};
use textual_index_sail::query::ast::Query;
use textual_index_sail::query_spec::{self, ns};
use textual_index_sail::resource::{Context, Resource};
use textual_index_sail::store::IndexStore;
use textual_index_sail::sync::Synchroniser;
use textual_index_sail::triplestore::fake::FakeTripleStore;
use textual_index_sail::triplestore::{StatementPattern, Term};

fn open_store() -> IndexStore {
    IndexStore::open(Config { directory: Directory::InMemory, ..Config::default() }).unwrap()
}

fn literal(subject: &str, predicate: &str, value: &str) -> Fact {
    Fact::new(Resource::uri(subject), predicate, Value::Literal(value.to_string()), Context::Null)
}

#[test]
fn add_update_remove_literal_lifecycle() {
    let store = open_store();
    let triples = FakeTripleStore::new();
    let sync = Synchroniser::new(&store, &triples);

    let f1 = literal("urn:s", "urn:p1", "object1");
    triples.insert(f1.clone());
    let mut buffer = TransactionBuffer::new();
    buffer.add(f1.clone());
    sync.apply(&mut buffer).unwrap();

    let doc = store.search_within("urn:s", &Query::MatchAll).unwrap().unwrap();
    assert!(document::has(&doc, "urn:p1", "object1"));

    let f2 = literal("urn:s", "urn:p2", "object2");
    triples.insert(f2.clone());
    let mut buffer = TransactionBuffer::new();
    buffer.add(f2.clone());
    sync.apply(&mut buffer).unwrap();

    let doc = store.search_within("urn:s", &Query::MatchAll).unwrap().unwrap();
    assert!(document::has(&doc, "urn:p1", "object1"));
    assert!(document::has(&doc, "urn:p2", "object2"));

    let query = store.parse_query("object1", None).unwrap();
    let results = store.search(&query).unwrap();
    assert_eq!(results.hits.len(), 1);

    triples.remove(&f1);
    let mut buffer = TransactionBuffer::new();
    buffer.remove(f1);
    sync.apply(&mut buffer).unwrap();

    let doc = store.search_within("urn:s", &Query::MatchAll).unwrap().unwrap();
    assert!(!document::has(&doc, "urn:p1", "object1"));
    assert!(document::has(&doc, "urn:p2", "object2"));

    triples.remove(&f2);
    let mut buffer = TransactionBuffer::new();
    buffer.remove(f2);
    sync.apply(&mut buffer).unwrap();

    assert!(store.search_within("urn:s", &Query::MatchAll).unwrap().is_none());
}

#[test]
fn multi_subject_batch_builds_one_document_each() {
    let store = open_store();
    let triples = FakeTripleStore::new();
    let sync = Synchroniser::new(&store, &triples);

    let facts = vec![
        literal("urn:s1", "urn:p1", "cats"),
        literal("urn:s1", "urn:p2", "dogs"),
        literal("urn:s2", "urn:p1", "fish"),
    ];
    for fact in &facts {
        triples.insert(fact.clone());
    }
    let mut buffer = TransactionBuffer::new();
    for fact in facts {
        buffer.add(fact);
    }
    sync.apply(&mut buffer).unwrap();

    let s1 = store.search_within("urn:s1", &Query::MatchAll).unwrap().unwrap();
    assert!(document::has(&s1, "urn:p1", "cats"));
    assert!(document::has(&s1, "urn:p2", "dogs"));
    assert_eq!(s1.get_field("text").unwrap().len(), 2);

    let s2 = store.search_within("urn:s2", &Query::MatchAll).unwrap().unwrap();
    assert!(document::has(&s2, "urn:p1", "fish"));
}

#[test]
fn context_clear_rebuilds_the_survivor_without_the_cleared_fields() {
    let store = open_store();
    let triples = FakeTripleStore::new();
    let sync = Synchroniser::new(&store, &triples);

    let c1 = Context::Named(Resource::uri("urn:c1"));
    let c2 = Context::Named(Resource::uri("urn:c2"));
    let f1 = Fact::new(Resource::uri("urn:s"), "urn:p1", Value::Literal("a".to_string()), c1.clone());
    let f2 = Fact::new(Resource::uri("urn:s"), "urn:p2", Value::Literal("b".to_string()), c1.clone());
    let f3 = Fact::new(Resource::uri("urn:s"), "urn:p3", Value::Literal("d".to_string()), c2.clone());
    for fact in [&f1, &f2, &f3] {
        triples.insert(fact.clone());
    }
    let mut buffer = TransactionBuffer::new();
    buffer.add(f1);
    buffer.add(f2);
    buffer.add(f3);
    sync.apply(&mut buffer).unwrap();

    triples.remove_context(&c1);
    let mut clear_buffer = TransactionBuffer::new();
    clear_buffer.clear_context(c1);
    sync.apply(&mut clear_buffer).unwrap();

    let doc = store.search_within("urn:s", &Query::MatchAll).unwrap().unwrap();
    assert!(document::has(&doc, "urn:p3", "d"));
    assert!(!document::has(&doc, "urn:p1", "a"));
    assert!(!document::has(&doc, "urn:p2", "b"));
}

#[test]
fn clear_all_empties_the_index() {
    let store = open_store();
    let triples = FakeTripleStore::new();
    let sync = Synchroniser::new(&store, &triples);

    let fact = literal("urn:s1", "urn:p1", "object1");
    triples.insert(fact.clone());
    let mut buffer = TransactionBuffer::new();
    buffer.add(fact);
    sync.apply(&mut buffer).unwrap();

    triples.clear();
    let mut clear_buffer = TransactionBuffer::new();
    clear_buffer.clear_all();
    sync.apply(&mut clear_buffer).unwrap();

    assert!(store.search_within("urn:s1", &Query::MatchAll).unwrap().is_none());
}

#[test]
fn incomplete_query_without_matches_fails_fast_when_configured() {
    let patterns = vec![StatementPattern {
        subject: None,
        predicate: Some(ns::QUERY.to_string()),
        object: Some(Term::Literal("rust".to_string())),
        context: None,
    }];
    let config = Config { incomplete_query_fails: true, ..Config::default() };
    let result = query_spec::extract_specs(&patterns, &config);
    assert!(matches!(result, Err(Error::InvalidQueryError(_))));
}
