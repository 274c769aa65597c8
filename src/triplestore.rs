//! The §6.1 contract this crate consumes from the surrounding triple store.
//! Neither the store's storage engine nor its query-algebra parser is this
//! crate's concern — only these three operations are.

use std::collections::HashMap;
use crate::algebra::TupleExpr;
use crate::core::error::Result;
use crate::fact::Fact;
use crate::resource::{Context, Resource};

/// One row of variable -> term bindings produced by evaluating a query, or
/// supplied as the initial bindings for one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSet {
    pub values: HashMap<String, Term>,
}

/// An RDF term: bindings can hold resources or literals; an unbound pattern
/// position holds a variable name instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Resource(Resource),
    Literal(String),
    Variable(String),
}

impl BindingSet {
    pub fn new() -> Self {
        BindingSet::default()
    }

    pub fn bind(&mut self, var: impl Into<String>, term: Term) {
        self.values.insert(var.into(), term);
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.values.get(var)
    }

    pub fn merged_with(&self, other: &BindingSet) -> BindingSet {
        let mut merged = self.clone();
        for (k, v) in &other.values {
            merged.values.insert(k.clone(), v.clone());
        }
        merged
    }
}

/// A pattern over `statements()`: `None` means wildcard on that position.
/// `object` additionally distinguishes a free variable from a bound term so
/// the query interpreter can recognise `NS.matches`/`NS.query`/etc. patterns
/// and read their variable names or literal values.
#[derive(Debug, Clone, Default)]
pub struct StatementPattern {
    pub subject: Option<Resource>,
    pub predicate: Option<String>,
    pub object: Option<Term>,
    pub context: Option<Context>,
}

/// The interface the Synchroniser and the query iterator consume from the
/// host's triple store. A cursor is modelled as a plain `Vec` — this crate
/// never needs true streaming from the boundary, only a snapshot of the
/// matching facts/bindings at call time.
pub trait TripleStore {
    /// Streams facts matching the pattern. Must be usable during the
    /// Synchroniser's apply — i.e. after the transaction's own writes have
    /// already landed in the store.
    fn statements(&self, pattern: &StatementPattern, include_inferred: bool) -> Result<Vec<Fact>>;

    /// Evaluates a residual structured query with initial bindings.
    fn evaluate(
        &self,
        query: &TupleExpr,
        bindings: &BindingSet,
        include_inferred: bool,
    ) -> Result<Vec<BindingSet>>;
}

/// Not `cfg(test)`-gated: integration tests under `tests/` compile this
/// crate as an ordinary dependency, so a test double that only exists
/// under `cfg(test)` would be invisible to them.
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// An in-memory triple store double implementing the §6.1 contract,
    /// used by this crate's own unit and integration tests.
    #[derive(Default)]
    pub struct FakeTripleStore {
        facts: Mutex<Vec<Fact>>,
    }

    impl FakeTripleStore {
        pub fn new() -> Self {
            FakeTripleStore::default()
        }

        pub fn insert(&self, fact: Fact) {
            self.facts.lock().unwrap().push(fact);
        }

        pub fn remove(&self, fact: &Fact) {
            self.facts.lock().unwrap().retain(|f| f != fact);
        }

        pub fn remove_context(&self, context: &Context) {
            self.facts.lock().unwrap().retain(|f| &f.context != context);
        }

        pub fn clear(&self) {
            self.facts.lock().unwrap().clear();
        }

        pub fn all(&self) -> Vec<Fact> {
            self.facts.lock().unwrap().clone()
        }
    }

    impl TripleStore for FakeTripleStore {
        fn statements(&self, pattern: &StatementPattern, _include_inferred: bool) -> Result<Vec<Fact>> {
            let facts = self.facts.lock().unwrap();
            Ok(facts
                .iter()
                .filter(|f| {
                    pattern.subject.as_ref().map(|s| s == &f.subject).unwrap_or(true)
                        && pattern.predicate.as_ref().map(|p| p == &f.predicate).unwrap_or(true)
                        && pattern.context.as_ref().map(|c| c == &f.context).unwrap_or(true)
                })
                .cloned()
                .collect())
        }

        fn evaluate(
            &self,
            _query: &TupleExpr,
            bindings: &BindingSet,
            _include_inferred: bool,
        ) -> Result<Vec<BindingSet>> {
            // The fake store has no algebra evaluator of its own: the
            // residual query in this crate's tests is always empty (the
            // whole pattern is textual), so evaluating it just means
            // passing the incoming bindings through as the one result row.
            Ok(vec![bindings.clone()])
        }
    }
}
