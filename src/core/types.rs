use serde::{Serialize, Deserialize};
use std::collections::HashMap;

/// Identifies a document within a single segment's on-disk document store.
/// Assigned by the writer when a document is first appended; stable for the
/// lifetime of the segment that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

pub const ID_FIELD: &str = "id";
pub const CONTEXT_FIELD: &str = "context";
pub const TEXT_FIELD: &str = "text";

/// A document in the full-text index. Every datatype is indexed as text
/// (Non-goal: datatype-aware indexing), so a field is simply a list of
/// string values rather than a typed union. `context` and the per-predicate
/// fields are multi-valued — a subject can carry the same predicate under
/// several contexts, or the same literal under several predicates — and
/// `text` aggregates every indexed literal of the document regardless of
/// which predicate it came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub resource: String,
    pub fields: HashMap<String, Vec<String>>,
}

impl Document {
    pub fn new(id: DocId, resource: impl Into<String>) -> Self {
        Document {
            id,
            resource: resource.into(),
            fields: HashMap::new(),
        }
    }

    /// Appends `value` to `field`, skipping it if already present — fields
    /// are sets, not multisets (duplicate `(predicate, label)` pairs and
    /// duplicate contexts are never stored twice).
    pub fn add_value(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        let entry = self.fields.entry(field.to_string()).or_default();
        if !entry.iter().any(|existing| existing == &value) {
            entry.push(value);
        }
    }

    /// Appends `value` to `field` unconditionally, even if already present.
    /// Used for the `text` field, which aggregates one occurrence per
    /// indexed literal fact regardless of predicate (§3) — unlike the
    /// per-predicate and `context` fields, it is a multiset, not a set.
    pub fn push_value(&mut self, field: &str, value: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(value.into());
    }

    pub fn get_field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(|v| v.as_slice())
    }

    pub fn has_value(&self, field: &str, value: &str) -> bool {
        self.fields
            .get(field)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    /// Number of fields that are neither `id` nor `context` nor `text` — the
    /// predicate fields contributed by indexed literal facts.
    pub fn property_field_count(&self) -> usize {
        self.fields
            .keys()
            .filter(|name| {
                name.as_str() != ID_FIELD && name.as_str() != CONTEXT_FIELD && name.as_str() != TEXT_FIELD
            })
            .count()
    }
}

impl Default for DocId {
    fn default() -> Self {
        DocId(0)
    }
}
