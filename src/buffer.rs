//! The Transaction Buffer (spec §4.C): accumulates the net effect of one
//! transaction's add/remove/clear calls before the Synchroniser applies it.
//! Coalescing happens here so the Synchroniser never sees a fact both added
//! and removed, or any operation preceding a `ClearAll` in the same buffer.

use crate::fact::Fact;
use crate::resource::Context;

#[derive(Debug, Clone, PartialEq)]
pub enum BufferedOp {
    Add(Fact),
    Remove(Fact),
    ClearContext(Context),
    ClearAll,
}

/// An ordered, coalescing log of pending operations for one transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuffer {
    ops: Vec<BufferedOp>,
}

impl TransactionBuffer {
    pub fn new() -> Self {
        TransactionBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BufferedOp] {
        &self.ops
    }

    /// Index of the first op belonging to the trailing AddRemove entry: the
    /// position right after the last `ClearContext`/`ClearAll`, or 0 if
    /// there is none. `add`/`remove` only cancel against ops at or after
    /// this index — §4.C scopes coalescing to "the trailing AddRemove
    /// entry", so an add/remove must never cancel across an intervening
    /// clear.
    fn trailing_entry_start(&self) -> usize {
        self.ops
            .iter()
            .rposition(|op| matches!(op, BufferedOp::ClearContext(_) | BufferedOp::ClearAll))
            .map(|pos| pos + 1)
            .unwrap_or(0)
    }

    /// Records an add. If the same fact has a pending `Remove` in the
    /// trailing AddRemove entry, the two cancel out rather than both being
    /// kept.
    pub fn add(&mut self, fact: Fact) {
        let start = self.trailing_entry_start();
        if let Some(pos) = self.ops[start..].iter().position(|op| matches!(op, BufferedOp::Remove(f) if f == &fact)) {
            self.ops.remove(start + pos);
            return;
        }
        self.ops.push(BufferedOp::Add(fact));
    }

    /// Records a removal. If the same fact has a pending `Add` in the
    /// trailing AddRemove entry, the two cancel out rather than both being
    /// kept.
    pub fn remove(&mut self, fact: Fact) {
        let start = self.trailing_entry_start();
        if let Some(pos) = self.ops[start..].iter().position(|op| matches!(op, BufferedOp::Add(f) if f == &fact)) {
            self.ops.remove(start + pos);
            return;
        }
        self.ops.push(BufferedOp::Remove(fact));
    }

    pub fn clear_context(&mut self, context: Context) {
        self.ops.push(BufferedOp::ClearContext(context));
    }

    pub fn clear_all(&mut self) {
        self.ops.push(BufferedOp::ClearAll);
    }

    /// Collapses everything preceding the last `ClearAll` — it subsumes any
    /// earlier op, so there is no point replaying them.
    pub fn optimize(&mut self) {
        if let Some(last_clear_all) = self.ops.iter().rposition(|op| matches!(op, BufferedOp::ClearAll)) {
            self.ops.drain(..last_clear_all);
        }
    }

    pub fn reset(&mut self) {
        self.ops.clear();
    }
}
