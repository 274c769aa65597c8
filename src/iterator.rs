//! The Query Interpreter & Iterator (spec §4.E): recognises textual
//! sub-patterns in a structured query, evaluates each against the Index
//! Store, walks the cross-product of their hits in odometer order, and
//! re-joins the remainder of the pattern against the host triple store for
//! every permutation. Outer algebra (projection, ordering, slicing,
//! distinctness) is preserved by wrapping this crate's own textual stream,
//! since the host never sees the cross-product it has no way to wrap on its
//! own (SPEC_FULL §9, §4.E.3).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::algebra::{OrderElem, TupleExpr};
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::TEXT_FIELD;
use crate::document;
use crate::query::ast::Query;
use crate::query_spec::{self, QuerySpec};
use crate::resource::Resource;
use crate::store::IndexStore;
use crate::triplestore::{BindingSet, StatementPattern, Term, TripleStore};

/// One lazily-pulled row of bindings. Implementors hold at most one open
/// underlying-store cursor at a time (spec §4.E.2 cooperative-pull model).
pub trait RowIterator {
    fn next_row(&mut self) -> Option<Result<BindingSet>>;
}

/// Entry point: plans and evaluates `expr` against `triples`, producing a
/// lazy row stream. If `expr` contains no reserved-namespace textual
/// sub-pattern this is a pure pass-through to the host's own evaluator.
pub fn evaluate<'a, T: TripleStore>(
    expr: &TupleExpr,
    store: &'a IndexStore,
    triples: &'a T,
    bindings: BindingSet,
    include_inferred: bool,
    config: &Config,
) -> Result<Box<dyn RowIterator + 'a>> {
    let patterns = leaf_patterns(expr);
    let specs = query_spec::extract_specs(&patterns, config)?;

    if specs.is_empty() {
        let rows = triples.evaluate(expr, &bindings, include_inferred)?;
        return Ok(Box::new(VecIter::new(rows)));
    }

    let mut substituted = expr.clone();
    for spec in &specs {
        substituted = substituted.substitute_text_pattern(&spec.match_var);
    }

    build_stream(&substituted, specs, store, triples, bindings, include_inferred)
}

/// Collects every `StatementPattern` leaf reachable from `expr`, in
/// left-to-right tree order, so `query_spec::extract_specs` can recognise
/// reserved-namespace groups regardless of how deeply the outer algebra
/// wraps them.
fn leaf_patterns(expr: &TupleExpr) -> Vec<StatementPattern> {
    match expr {
        TupleExpr::StatementPattern(pattern) => vec![pattern.clone()],
        TupleExpr::TextPattern { .. } => vec![],
        TupleExpr::Join(lhs, rhs) => {
            let mut patterns = leaf_patterns(lhs);
            patterns.extend(leaf_patterns(rhs));
            patterns
        }
        TupleExpr::Filter { child, .. }
        | TupleExpr::Projection { child, .. }
        | TupleExpr::MultiProjection { child, .. }
        | TupleExpr::Distinct(child)
        | TupleExpr::Reduced(child)
        | TupleExpr::Order { child, .. }
        | TupleExpr::Slice { child, .. } => leaf_patterns(child),
    }
}

fn contains_text_pattern(expr: &TupleExpr) -> bool {
    match expr {
        TupleExpr::TextPattern { .. } => true,
        TupleExpr::StatementPattern(_) => false,
        TupleExpr::Join(lhs, rhs) => contains_text_pattern(lhs) || contains_text_pattern(rhs),
        TupleExpr::Filter { child, .. }
        | TupleExpr::Projection { child, .. }
        | TupleExpr::MultiProjection { child, .. }
        | TupleExpr::Distinct(child)
        | TupleExpr::Reduced(child)
        | TupleExpr::Order { child, .. }
        | TupleExpr::Slice { child, .. } => contains_text_pattern(child),
    }
}

/// Recursively builds the stream for `expr`: wrapper nodes become stream
/// transformers over their child's stream, and the innermost subtree that
/// still contains a `TextPattern` becomes the core textual iterator — the
/// "inner argument" both kinds of node produce tuples for (§4.E.3).
fn build_stream<'a, T: TripleStore>(
    expr: &TupleExpr,
    specs: Vec<QuerySpec>,
    store: &'a IndexStore,
    triples: &'a T,
    bindings: BindingSet,
    include_inferred: bool,
) -> Result<Box<dyn RowIterator + 'a>> {
    match expr {
        TupleExpr::Projection { variables, child } if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(ProjectionIter { inner, variables: variables.clone() }))
        }
        TupleExpr::MultiProjection { variables, child } if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(MultiProjectionIter { inner, variable_sets: variables.clone(), pending: VecDeque::new() }))
        }
        TupleExpr::Distinct(child) if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(DistinctIter { inner, seen: HashSet::new() }))
        }
        TupleExpr::Reduced(child) if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(ReducedIter { inner, last: None }))
        }
        TupleExpr::Order { elems, child } if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(OrderIter { inner, elems: elems.clone(), materialised: None, position: 0 }))
        }
        TupleExpr::Slice { offset, limit, child } if contains_text_pattern(child) => {
            let inner = build_stream(child, specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(SliceIter { inner, offset: offset.unwrap_or(0), limit: *limit, skipped: 0, emitted: 0 }))
        }
        other => {
            let iter = TextualIterator::new(other.clone(), specs, store, triples, bindings, include_inferred)?;
            Ok(Box::new(iter))
        }
    }
}

/// A single hit from one `QuerySpec`'s evaluation against the Index Store.
struct Hit {
    subject: Resource,
    score: f32,
    document: crate::core::types::Document,
}

/// The core textual cross-product iterator (spec §4.E.2). Holds every
/// spec's hit list (already evaluated, ordered by descending score) and
/// walks the digit-odometer over them, re-evaluating the residual query
/// against the host triple store once per non-conflicting permutation.
pub struct TextualIterator<'a, T: TripleStore> {
    triples: &'a T,
    include_inferred: bool,
    residual: TupleExpr,
    specs: Vec<QuerySpec>,
    hits: Vec<Vec<Hit>>,
    highlighters: Vec<Option<Highlighter>>,
    base_bindings: BindingSet,
    digits: Vec<usize>,
    exhausted: bool,
    current_derived: Option<BindingSet>,
    current_residual: Option<std::vec::IntoIter<BindingSet>>,
}

impl<'a, T: TripleStore> TextualIterator<'a, T> {
    fn new(
        residual: TupleExpr,
        specs: Vec<QuerySpec>,
        store: &'a IndexStore,
        triples: &'a T,
        base_bindings: BindingSet,
        include_inferred: bool,
    ) -> Result<Self> {
        let mut hits = Vec::with_capacity(specs.len());
        let mut highlighters = Vec::with_capacity(specs.len());

        for spec in &specs {
            let default_field = spec.property_uri.as_deref();
            let query = store.parse_query(&spec.query_string, default_field)?;
            let mut results = store.search(&query)?;
            // Descending score order (spec §4.E.2 step 1); stable so equal
            // scores (the common case here, since scoring is a non-goal)
            // keep collection order.
            results.hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

            let spec_hits: Vec<Hit> = results
                .hits
                .into_iter()
                .filter_map(|scored| {
                    let doc = scored.document?;
                    let subject = document::resource_of(&doc);
                    Some(Hit { subject, score: scored.score, document: doc })
                })
                .collect();

            highlighters.push(if spec.snippet_var.is_some() {
                Some(Highlighter::new(store.analyzer.clone(), &query))
            } else {
                None
            });
            hits.push(spec_hits);
        }

        // A spec with zero hits makes the whole cross-product empty: no
        // tuple of indices can be formed, so the iterator starts exhausted
        // (SPEC_FULL §9 open-question decision — see DESIGN.md).
        let exhausted = hits.iter().any(|h| h.is_empty());
        let digits = vec![0; specs.len()];

        Ok(TextualIterator {
            triples,
            include_inferred,
            residual,
            specs,
            hits,
            highlighters,
            base_bindings,
            digits,
            exhausted,
            current_derived: None,
            current_residual: None,
        })
    }

    /// Builds the derived bindings for the current permutation, or `None`
    /// if the same match variable would be bound to two different
    /// resources by two specs in this permutation (the permutation is then
    /// discarded entirely, per §4.E.2 step 4).
    fn derive_bindings(&self) -> Option<BindingSet> {
        let mut derived = self.base_bindings.clone();

        for (i, spec) in self.specs.iter().enumerate() {
            let hit = &self.hits[i][self.digits[i]];

            let resource_term = Term::Resource(hit.subject.clone());
            if let Some(existing) = derived.get(&spec.match_var) {
                if existing != &resource_term {
                    return None;
                }
            }
            derived.bind(spec.match_var.clone(), resource_term);

            if let Some(score_var) = &spec.score_var {
                if hit.score > 0.0 {
                    derived.bind(score_var.clone(), Term::Literal(hit.score.to_string()));
                }
            }

            if let Some(snippet_var) = &spec.snippet_var {
                if let Some(highlighter) = &self.highlighters[i] {
                    if let Some(snippet) = highlighter.highlight_document(&hit.document, spec.property_uri.as_deref())
                    {
                        derived.bind(snippet_var.clone(), Term::Literal(snippet));
                    }
                }
            }
        }

        Some(derived)
    }

    /// Advances the odometer by one step, in fixed digit order: the last
    /// spec's hit list is the least-significant digit and increments
    /// fastest, carrying into earlier digits as it wraps (spec §4.E.2
    /// step 3, "Hit odometer" glossary entry).
    fn advance(&mut self) {
        if self.digits.is_empty() {
            self.exhausted = true;
            return;
        }
        for i in (0..self.digits.len()).rev() {
            self.digits[i] += 1;
            if self.digits[i] < self.hits[i].len() {
                return;
            }
            self.digits[i] = 0;
        }
        self.exhausted = true;
    }
}

impl<'a, T: TripleStore> RowIterator for TextualIterator<'a, T> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        loop {
            if let Some(residual_iter) = &mut self.current_residual {
                match residual_iter.next() {
                    Some(row) => {
                        let derived = self.current_derived.as_ref().expect("residual iter implies derived bindings");
                        return Some(Ok(row.merged_with(derived)));
                    }
                    None => {
                        self.current_residual = None;
                        self.advance();
                    }
                }
            }

            if self.exhausted {
                return None;
            }

            let Some(derived) = self.derive_bindings() else {
                self.advance();
                continue;
            };

            match self.triples.evaluate(&self.residual, &derived, self.include_inferred) {
                Ok(rows) => {
                    self.current_derived = Some(derived);
                    self.current_residual = Some(rows.into_iter());
                }
                Err(err) => {
                    // Per-hit retrieval errors are logged and the iterator
                    // advances rather than failing the whole query (spec §7).
                    log::warn!("residual evaluation failed for one permutation, skipping: {err}");
                    self.advance();
                }
            }
        }
    }
}

/// Builds HTML-highlighted fragments of a document's text for the `snippet`
/// binding: every surface word in the relevant field that tokenises (via
/// the same analyzer the index used) to one of the query's own terms is
/// wrapped in `<b>...</b>`; multiple field values are joined with `"..."`.
struct Highlighter {
    analyzer: Arc<Analyzer>,
    terms: HashSet<String>,
}

impl Highlighter {
    fn new(analyzer: Arc<Analyzer>, query: &Query) -> Self {
        let mut raw_terms = Vec::new();
        collect_query_terms(query, &mut raw_terms);

        let mut terms = HashSet::new();
        for raw in raw_terms {
            for token in analyzer.analyze(&raw) {
                terms.insert(token.text);
            }
        }

        Highlighter { analyzer, terms }
    }

    fn highlight_document(&self, doc: &crate::core::types::Document, property_uri: Option<&str>) -> Option<String> {
        let field = property_uri.unwrap_or(TEXT_FIELD);
        let values = doc.get_field(field)?;

        let fragments: Vec<String> = values.iter().filter_map(|value| self.highlight_value(value)).collect();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join("..."))
        }
    }

    fn highlight_value(&self, text: &str) -> Option<String> {
        let mut matched_any = false;
        let mut out = Vec::new();

        for word in text.split_whitespace() {
            let tokens = self.analyzer.analyze(word);
            let matches = tokens.iter().any(|token| self.terms.contains(&token.text));
            if matches {
                matched_any = true;
                out.push(format!("<b>{word}</b>"));
            } else {
                out.push(word.to_string());
            }
        }

        matched_any.then(|| out.join(" "))
    }
}

fn collect_query_terms(query: &Query, out: &mut Vec<String>) {
    match query {
        Query::Term(term) => out.push(term.value.clone()),
        Query::Phrase(phrase) => out.extend(phrase.phrase.iter().cloned()),
        Query::Range(_) | Query::MatchAll => {}
        Query::Bool(bool_query) => {
            for clause in bool_query.must.iter().chain(&bool_query.should).chain(&bool_query.filter) {
                collect_query_terms(clause, out);
            }
            for clause in &bool_query.must_not {
                collect_query_terms(clause, out);
            }
        }
    }
}

/// Wraps a plain `Vec<BindingSet>` (the host's own evaluation of a
/// non-textual tree) behind the lazy-pull interface.
struct VecIter {
    rows: std::vec::IntoIter<BindingSet>,
}

impl VecIter {
    fn new(rows: Vec<BindingSet>) -> Self {
        VecIter { rows: rows.into_iter() }
    }
}

impl RowIterator for VecIter {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        self.rows.next().map(Ok)
    }
}

struct ProjectionIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    variables: Vec<String>,
}

impl<'a> RowIterator for ProjectionIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        match self.inner.next_row()? {
            Ok(row) => Some(Ok(project(&row, &self.variables))),
            Err(err) => Some(Err(err)),
        }
    }
}

struct MultiProjectionIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    variable_sets: Vec<Vec<String>>,
    pending: VecDeque<BindingSet>,
}

impl<'a> RowIterator for MultiProjectionIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.inner.next_row()? {
                Ok(row) => {
                    for variables in &self.variable_sets {
                        self.pending.push_back(project(&row, variables));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn project(row: &BindingSet, variables: &[String]) -> BindingSet {
    let mut projected = BindingSet::new();
    for var in variables {
        if let Some(term) = row.get(var) {
            projected.bind(var.clone(), term.clone());
        }
    }
    projected
}

fn canonical_key(row: &BindingSet) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> =
        row.values.iter().map(|(k, v)| (k.clone(), format!("{v:?}"))).collect();
    key.sort();
    key
}

struct DistinctIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    seen: HashSet<Vec<(String, String)>>,
}

impl<'a> RowIterator for DistinctIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        loop {
            match self.inner.next_row()? {
                Ok(row) => {
                    let key = canonical_key(&row);
                    if self.seen.insert(key) {
                        return Some(Ok(row));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// `REDUCED` only guarantees *consecutive* duplicates may be collapsed, so
/// unlike `Distinct` this only ever remembers the previous row.
struct ReducedIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    last: Option<Vec<(String, String)>>,
}

impl<'a> RowIterator for ReducedIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        loop {
            match self.inner.next_row()? {
                Ok(row) => {
                    let key = canonical_key(&row);
                    if self.last.as_ref() == Some(&key) {
                        continue;
                    }
                    self.last = Some(key);
                    return Some(Ok(row));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Ordering requires seeing every row, so this materialises the child
/// stream in full on the first pull — the only wrapper that cannot stay
/// fully lazy.
struct OrderIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    elems: Vec<OrderElem>,
    materialised: Option<Vec<BindingSet>>,
    position: usize,
}

impl<'a> RowIterator for OrderIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        if self.materialised.is_none() {
            let mut rows = Vec::new();
            loop {
                match self.inner.next_row() {
                    Some(Ok(row)) => rows.push(row),
                    Some(Err(err)) => return Some(Err(err)),
                    None => break,
                }
            }
            let elems = self.elems.clone();
            rows.sort_by(|a, b| compare_rows(a, b, &elems));
            self.materialised = Some(rows);
        }

        let rows = self.materialised.as_ref().unwrap();
        if self.position >= rows.len() {
            return None;
        }
        let row = rows[self.position].clone();
        self.position += 1;
        Some(Ok(row))
    }
}

fn compare_rows(a: &BindingSet, b: &BindingSet, elems: &[OrderElem]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for elem in elems {
        let av = a.get(&elem.variable).map(term_sort_key);
        let bv = b.get(&elem.variable).map(term_sort_key);
        let ordering = av.cmp(&bv);
        let ordering = if elem.ascending { ordering } else { ordering.reverse() };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn term_sort_key(term: &Term) -> String {
    match term {
        Term::Resource(r) => r.encode(),
        Term::Literal(s) => s.clone(),
        Term::Variable(v) => v.clone(),
    }
}

struct SliceIter<'a> {
    inner: Box<dyn RowIterator + 'a>,
    offset: usize,
    limit: Option<usize>,
    skipped: usize,
    emitted: usize,
}

impl<'a> RowIterator for SliceIter<'a> {
    fn next_row(&mut self) -> Option<Result<BindingSet>> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return None;
            }
        }
        loop {
            match self.inner.next_row()? {
                Ok(row) => {
                    if self.skipped < self.offset {
                        self.skipped += 1;
                        continue;
                    }
                    self.emitted += 1;
                    return Some(Ok(row));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, Directory};
    use crate::fact::{Fact, Value};
    use crate::query_spec::ns;
    use crate::resource::Context;
    use crate::store::IndexStore;
    use crate::sync::Synchroniser;
    use crate::triplestore::fake::FakeTripleStore;

    fn open_store() -> IndexStore {
        IndexStore::open(Config { directory: Directory::InMemory, ..Config::default() }).unwrap()
    }

    fn index_one_literal(store: &IndexStore, triples: &FakeTripleStore, subject: &str, text: &str) {
        let fact = Fact::new(Resource::uri(subject), "urn:body", Value::Literal(text.to_string()), Context::Null);
        triples.insert(fact.clone());
        let mut buffer = crate::buffer::TransactionBuffer::new();
        buffer.add(fact);
        let sync = Synchroniser::new(store, triples);
        sync.apply(&mut buffer).unwrap();
    }

    fn matches_query_pattern(match_var: &str) -> Vec<StatementPattern> {
        vec![
            StatementPattern {
                subject: None,
                predicate: Some(ns::MATCHES.to_string()),
                object: Some(Term::Variable(match_var.to_string())),
                context: None,
            },
            StatementPattern {
                subject: None,
                predicate: Some(ns::QUERY.to_string()),
                object: Some(Term::Literal("cats".to_string())),
                context: None,
            },
            StatementPattern {
                subject: None,
                predicate: Some(ns::SCORE.to_string()),
                object: Some(Term::Variable("sc".to_string())),
                context: None,
            },
        ]
    }

    fn join_patterns(patterns: Vec<StatementPattern>) -> TupleExpr {
        patterns
            .into_iter()
            .map(TupleExpr::StatementPattern)
            .reduce(|acc, next| TupleExpr::Join(Box::new(acc), Box::new(next)))
            .unwrap()
    }

    #[test]
    fn emits_one_row_per_matching_subject() {
        let store = open_store();
        let triples = FakeTripleStore::new();
        index_one_literal(&store, &triples, "urn:s1", "cats are great");
        index_one_literal(&store, &triples, "urn:s2", "dogs are great");

        let tree = join_patterns(matches_query_pattern("m"));
        let config = Config::default();
        let mut iter = evaluate(&tree, &store, &triples, BindingSet::new(), false, &config).unwrap();

        let mut rows = Vec::new();
        while let Some(row) = iter.next_row() {
            rows.push(row.unwrap());
        }

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("m"), Some(&Term::Resource(Resource::uri("urn:s1"))));
        assert!(matches!(rows[0].get("sc"), Some(Term::Literal(_))));
    }

    #[test]
    fn slice_limits_the_number_of_emitted_rows() {
        let store = open_store();
        let triples = FakeTripleStore::new();
        index_one_literal(&store, &triples, "urn:s1", "cats one");
        index_one_literal(&store, &triples, "urn:s2", "cats two");
        index_one_literal(&store, &triples, "urn:s3", "cats three");

        let inner = join_patterns(matches_query_pattern("m"));
        let tree = TupleExpr::Slice { offset: None, limit: Some(2), child: Box::new(inner) };
        let config = Config::default();
        let mut iter = evaluate(&tree, &store, &triples, BindingSet::new(), false, &config).unwrap();

        let mut rows = Vec::new();
        while let Some(row) = iter.next_row() {
            rows.push(row.unwrap());
        }
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn zero_hit_spec_produces_zero_rows() {
        let store = open_store();
        let triples = FakeTripleStore::new();
        index_one_literal(&store, &triples, "urn:s1", "unrelated content");

        let tree = join_patterns(matches_query_pattern("m"));
        let config = Config::default();
        let mut iter = evaluate(&tree, &store, &triples, BindingSet::new(), false, &config).unwrap();
        assert!(iter.next_row().is_none());
    }
}
