use crate::core::types::{DocId, Document};

/// Search results container
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<ScoredDocument>,
    pub total_hits: usize,
    pub max_score: f32,
    pub took_ms: u64,
}

/// A matching document. Scoring is constant (Non-goal: ranking/relevance
/// tuning) — every hit scores 1.0; callers that need a particular hit order
/// (e.g. the query iterator's descending-score requirement) sort explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f32,
    pub document: Option<Document>,
}
