use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use textual_index_sail::buffer::TransactionBuffer;
use textual_index_sail::core::config::{Config, Directory};
use textual_index_sail::fact::{Fact, Value};
use textual_index_sail::query_spec::ns;
use textual_index_sail::resource::{Context, Resource};
use textual_index_sail::store::IndexStore;
use textual_index_sail::sync::Synchroniser;
use textual_index_sail::triplestore::fake::FakeTripleStore;
use textual_index_sail::triplestore::{StatementPattern, Term};
use textual_index_sail::algebra::TupleExpr;
use textual_index_sail::iterator::RowIterator;
use textual_index_sail::triplestore::BindingSet;

fn seeded_store(subjects: usize) -> (IndexStore, FakeTripleStore) {
    let store = IndexStore::open(Config { directory: Directory::InMemory, ..Config::default() }).unwrap();
    let triples = FakeTripleStore::new();
    let sync = Synchroniser::new(&store, &triples);

    for i in 0..subjects {
        let fact = Fact::new(
            Resource::uri(format!("urn:subject{i}")),
            "urn:body",
            Value::Literal("the quick brown fox jumps over the lazy dog".to_string()),
            Context::Null,
        );
        triples.insert(fact.clone());
        let mut buffer = TransactionBuffer::new();
        buffer.add(fact);
        sync.apply(&mut buffer).unwrap();
    }

    (store, triples)
}

fn textual_query_tree(match_var: &str) -> TupleExpr {
    let patterns = vec![
        StatementPattern {
            subject: None,
            predicate: Some(ns::MATCHES.to_string()),
            object: Some(Term::Variable(match_var.to_string())),
            context: None,
        },
        StatementPattern {
            subject: None,
            predicate: Some(ns::QUERY.to_string()),
            object: Some(Term::Literal("fox".to_string())),
            context: None,
        },
        StatementPattern {
            subject: None,
            predicate: Some(ns::SCORE.to_string()),
            object: Some(Term::Variable("sc".to_string())),
            context: None,
        },
    ];
    patterns
        .into_iter()
        .map(TupleExpr::StatementPattern)
        .reduce(|acc, next| TupleExpr::Join(Box::new(acc), Box::new(next)))
        .unwrap()
}

/// Measures the cost of the cross-product odometer walk (spec §4.E.2) as the
/// number of matching subjects — and so the hit-list length each permutation
/// digit ranges over — grows.
fn bench_odometer_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("odometer_drain");

    for subjects in [10, 100, 1000].iter() {
        let (store, triples) = seeded_store(*subjects);
        let tree = textual_query_tree("m");
        let config = Config::default();

        group.bench_with_input(BenchmarkId::from_parameter(subjects), subjects, |b, _| {
            b.iter(|| {
                let mut iter = textual_index_sail::iterator::evaluate(
                    &tree,
                    &store,
                    &triples,
                    BindingSet::new(),
                    false,
                    &config,
                )
                .unwrap();
                let mut count = 0;
                while iter.next_row().is_some() {
                    count += 1;
                }
                count
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_odometer_drain);
criterion_main!(benches);
