//! The Synchroniser (spec §4.D): applies an optimised `TransactionBuffer` to
//! the `IndexStore`, holding the store's writer mutex for the whole apply.
//! Rebuilds use the triple store as authoritative state rather than trying
//! to strip indexed tokens incrementally (SPEC_FULL §9 design note).

use std::collections::{HashMap, HashSet};

use crate::buffer::{BufferedOp, TransactionBuffer};
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::document;
use crate::fact::Fact;
use crate::resource::{Context, Resource};
use crate::store::IndexStore;
use crate::triplestore::{StatementPattern, TripleStore};

pub struct Synchroniser<'a, T: TripleStore> {
    pub store: &'a IndexStore,
    pub triples: &'a T,
}

impl<'a, T: TripleStore> Synchroniser<'a, T> {
    pub fn new(store: &'a IndexStore, triples: &'a T) -> Self {
        Synchroniser { store, triples }
    }

    /// Applies `buffer` in order. On any I/O failure the apply is aborted,
    /// the partial state is logged as corrupt, the buffer is reset
    /// regardless of outcome, and the error is surfaced to the caller.
    pub fn apply(&self, buffer: &mut TransactionBuffer) -> Result<()> {
        buffer.optimize();
        let result = self.apply_ops(buffer.ops());
        buffer.reset();
        result
    }

    /// Walks ops in buffer order, batching consecutive Add/Remove entries so
    /// they apply together, but flushing that batch before any intervening
    /// Clear op so the final state matches strict buffer order — an add
    /// preceding a `ClearContext` of its own context must not survive it,
    /// while one following it must.
    fn apply_ops(&self, ops: &[BufferedOp]) -> Result<()> {
        let mut pending_adds = Vec::new();
        let mut pending_removes = Vec::new();

        for op in ops {
            match op {
                BufferedOp::Add(fact) => pending_adds.push(fact.clone()),
                BufferedOp::Remove(fact) => pending_removes.push(fact.clone()),
                BufferedOp::ClearContext(context) => {
                    self.flush_add_remove(&mut pending_adds, &mut pending_removes)?;
                    self.run_or_abort(|| self.apply_clear_context(&[context.clone()]))?;
                }
                BufferedOp::ClearAll => {
                    self.flush_add_remove(&mut pending_adds, &mut pending_removes)?;
                    self.run_or_abort(|| self.apply_clear_all())?;
                }
            }
        }
        self.flush_add_remove(&mut pending_adds, &mut pending_removes)
    }

    fn flush_add_remove(&self, adds: &mut Vec<Fact>, removes: &mut Vec<Fact>) -> Result<()> {
        if adds.is_empty() && removes.is_empty() {
            return Ok(());
        }
        let adds_slice = std::mem::take(adds);
        let removes_slice = std::mem::take(removes);
        self.run_or_abort(|| self.apply_add_remove(&adds_slice, &removes_slice))
    }

    fn run_or_abort(&self, f: impl FnOnce() -> Result<()>) -> Result<()> {
        f().map_err(|err| {
            log::error!("synchroniser apply aborted, remaining buffered operations lost: {err}");
            err
        })
    }

    /// Undoes a failed apply without replaying every prior write: resets
    /// the buffer and discards the writer's unflushed segment (SPEC_FULL
    /// §9 open-question decision — see DESIGN.md).
    pub fn rollback(&self, buffer: &mut TransactionBuffer) -> Result<()> {
        buffer.reset();
        self.store.with_writer(|w| w.discard_buffer())
    }

    fn apply_add_remove(&self, adds: &[Fact], removes: &[Fact]) -> Result<()> {
        let mut subjects: HashSet<Resource> = HashSet::new();
        let mut adds_by_subject: HashMap<Resource, Vec<Fact>> = HashMap::new();
        let mut removes_by_subject: HashMap<Resource, Vec<Fact>> = HashMap::new();

        for fact in adds {
            subjects.insert(fact.subject.clone());
            adds_by_subject.entry(fact.subject.clone()).or_default().push(fact.clone());
        }
        for fact in removes {
            subjects.insert(fact.subject.clone());
            removes_by_subject.entry(fact.subject.clone()).or_default().push(fact.clone());
        }

        for subject in subjects {
            let subject_adds = adds_by_subject.get(&subject).cloned().unwrap_or_default();
            let subject_removes = removes_by_subject.get(&subject).cloned().unwrap_or_default();
            let existing = self.store.search_within(&subject.encode(), &crate::query::ast::Query::MatchAll)?;

            match (existing, subject_removes.is_empty()) {
                (None, true) => {
                    let doc = document::make_document(self.store.allocate_doc_id(), &subject, &subject_adds);
                    self.store.add_document(doc)?;
                }
                (None, false) => {
                    log::warn!("no document exists for subject {:?}, skipping its removes", subject);
                }
                (Some(existing), _) => {
                    self.store.delete_document(existing.id)?;
                    self.rebuild_subject(&subject, &subject_adds)?;
                }
            }
        }

        self.store.commit()?;
        self.store.invalidate_readers();
        Ok(())
    }

    /// Re-reads every current statement of the subject from the triple store
    /// (already reflecting this transaction), folds in this transaction's
    /// adds, and inserts a fresh document. This is the only way to guarantee
    /// invariant 2 without the index understanding its own tokenisation. The
    /// caller is responsible for deleting the prior document first.
    fn rebuild_subject(&self, subject: &Resource, adds: &[Fact]) -> Result<()> {
        let pattern = StatementPattern { subject: Some(subject.clone()), predicate: None, context: None };
        let mut facts = self.triples.statements(&pattern, false)?;
        facts.extend(adds.iter().cloned());

        if facts.iter().any(|f| f.is_indexable()) {
            let doc = document::make_document(self.store.allocate_doc_id(), subject, &facts);
            self.store.add_document(doc)?;
        }
        Ok(())
    }

    /// Clears a set of contexts: deletes every document touching any of
    /// them, then rebuilds the survivors (documents with a remaining
    /// non-cleared, non-null context) from the triple store.
    ///
    /// Discovery of which documents are touched must go through the index
    /// itself (spec §4.D step 1: "find every document having a context field
    /// equal to c"), not the triple store: by the time the Synchroniser
    /// applies, the triple store has already received the transaction's own
    /// updates (§6.1), so `statements()` for a cleared context returns
    /// nothing — the index is the only remaining record of which documents
    /// it touched.
    fn apply_clear_context(&self, contexts: &[Context]) -> Result<()> {
        let cleared_tags: HashSet<String> = contexts.iter().map(|c| c.encode()).collect();

        let mut survivors: Vec<Resource> = Vec::new();
        let mut to_delete: Vec<DocId> = Vec::new();
        let mut seen: HashSet<Resource> = HashSet::new();

        for context in contexts {
            let query = crate::query::ast::Query::Term(crate::query::ast::TermQuery {
                field: crate::core::types::CONTEXT_FIELD.to_string(),
                value: context.encode(),
            });
            let results = self.store.search(&query)?;

            for hit in results.hits {
                let Some(existing) = hit.document else { continue };
                let subject = document::resource_of(&existing);
                if !seen.insert(subject.clone()) {
                    continue;
                }
                to_delete.push(existing.id);

                let other_contexts = crate::resource::document_contexts(&existing);
                let is_survivor = other_contexts.iter().any(|c| {
                    !c.is_null() && !cleared_tags.contains(&c.encode())
                });
                if is_survivor {
                    survivors.push(subject);
                }
            }
        }

        for doc_id in to_delete {
            self.store.delete_document(doc_id)?;
        }

        for subject in survivors {
            let pattern = StatementPattern { subject: Some(subject.clone()), predicate: None, context: None };
            let facts = self.triples.statements(&pattern, false)?;
            if facts.iter().any(|f| f.is_indexable()) {
                let doc = document::make_document(self.store.allocate_doc_id(), &subject, &facts);
                self.store.add_document(doc)?;
            }
        }

        self.store.commit()?;
        self.store.invalidate_readers();
        Ok(())
    }

    fn apply_clear_all(&self) -> Result<()> {
        self.store.clear()
    }
}
