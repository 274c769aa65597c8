use std::sync::Arc;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::Analyzer;
use crate::mvcc::controller::{MVCCController, Snapshot};
use crate::storage::segment_reader::SegmentReader;
use crate::core::error::Result;
use crate::query::ast::Query;
use crate::query::matcher::{DocumentMatcher, SegmentSearch};
use crate::search::results::SearchResults;
use crate::storage::layout::StorageLayout;

/// Pool of index readers, each bound to one MVCC snapshot so a long-running
/// search never observes a write that committed after the search started.
pub struct ReaderPool {
    pub readers: Arc<RwLock<Vec<Arc<IndexReader>>>>,
    pub mvcc: Arc<MVCCController>,
    pub max_readers: usize,
    pub storage: Arc<StorageLayout>,
    pub analyzer: Arc<Analyzer>,
}

/// A reader bound to a fixed snapshot of the segment list and delete set.
pub struct IndexReader {
    pub snapshot: Arc<Snapshot>,
    pub segments: Vec<Arc<RwLock<SegmentReader>>>,
    pub deleted_docs: Arc<RoaringBitmap>,
    pub analyzer: Arc<Analyzer>,
}

impl ReaderPool {
    pub fn new(
        mvcc: Arc<MVCCController>,
        storage: Arc<StorageLayout>,
        analyzer: Arc<Analyzer>,
        max_readers: usize,
    ) -> Self {
        ReaderPool {
            readers: Arc::new(RwLock::new(Vec::new())),
            mvcc,
            max_readers,
            storage,
            analyzer,
        }
    }

    /// Builds a fresh `IndexReader` over the current snapshot. Callers that
    /// need a long-lived reader should hold onto the returned `Arc` rather
    /// than calling this again — a later call may observe a newer snapshot.
    pub fn get_reader(&self) -> Result<Arc<IndexReader>> {
        let snapshot = self.mvcc.current_snapshot();
        let deleted_docs = snapshot.deleted_docs.clone();

        let mut segment_readers = Vec::new();
        for segment in &snapshot.segments {
            let reader = SegmentReader::open(&self.storage, segment.id)?;
            segment_readers.push(Arc::new(RwLock::new(reader)));
        }

        let reader = Arc::new(IndexReader {
            snapshot,
            segments: segment_readers,
            deleted_docs,
            analyzer: self.analyzer.clone(),
        });

        let mut readers = self.readers.write();
        readers.push(reader.clone());
        if readers.len() > self.max_readers {
            readers.remove(0);
        }

        Ok(reader)
    }
}

impl IndexReader {
    pub fn search(&self, query: &Query) -> Result<SearchResults> {
        let matcher = DocumentMatcher::new(self.analyzer.clone());
        let mut all_results = Vec::new();

        for segment_reader in &self.segments {
            let mut reader = segment_reader.write();
            let results = reader.search(query, &matcher)?;
            all_results.extend(results);
        }

        all_results.retain(|doc| !self.deleted_docs.contains(doc.doc_id.0 as u32));

        let total_hits = all_results.len();
        let max_score = all_results
            .iter()
            .map(|h| h.score)
            .max_by(|a, b| a.partial_cmp(b).unwrap())
            .unwrap_or(0.0);

        Ok(SearchResults {
            hits: all_results,
            total_hits,
            max_score,
            took_ms: 0,
        })
    }
}
