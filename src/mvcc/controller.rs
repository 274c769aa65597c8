use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use roaring::RoaringBitmap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::storage::segment::Segment;

/// Multi-version concurrency control over the segment list. Every commit
/// publishes a new [`Snapshot`]; readers that already grabbed an older one
/// keep seeing it until they ask for a fresh reader, so a search never
/// observes a partially-applied write.
pub struct MVCCController {
    pub versions: Arc<RwLock<BTreeMap<u64, Snapshot>>>,
    pub current_version: Arc<AtomicU64>,
    pub max_versions: usize,
}

/// An immutable view of the index at one point in its write history.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub segments: Vec<Arc<Segment>>,
    pub timestamp: DateTime<Utc>,
    pub doc_count: usize,
    pub deleted_docs: Arc<RoaringBitmap>,
}

impl MVCCController {
    pub fn new() -> Self {
        MVCCController {
            versions: Arc::new(RwLock::new(BTreeMap::new())),
            current_version: Arc::new(AtomicU64::new(0)),
            max_versions: 100,
        }
    }

    pub fn create_snapshot(&self, segments: Vec<Arc<Segment>>) -> Arc<Snapshot> {
        self.create_snapshot_with_deletes(segments, Arc::new(RoaringBitmap::new()))
    }

    pub fn create_snapshot_with_deletes(
        &self,
        segments: Vec<Arc<Segment>>,
        deleted_docs: Arc<RoaringBitmap>,
    ) -> Arc<Snapshot> {
        let version = self.current_version.fetch_add(1, Ordering::SeqCst);

        let doc_count = segments.iter().map(|s| s.doc_count as usize).sum();

        let snapshot = Arc::new(Snapshot {
            version,
            segments,
            timestamp: Utc::now(),
            doc_count,
            deleted_docs,
        });

        let mut versions = self.versions.write();
        versions.insert(version, (*snapshot).clone());
        self.gc_old_versions(&mut versions);

        snapshot
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let versions = self.versions.read();
        let current = self.current_version.load(Ordering::Acquire);

        // fetch_add returns the pre-increment value, so the live snapshot sits at current - 1.
        let snapshot_version = if current > 0 { current - 1 } else { 0 };

        versions
            .get(&snapshot_version)
            .map(|s| Arc::new(s.clone()))
            .unwrap_or_else(|| Arc::new(Snapshot::default()))
    }

    /// Drops all but the newest `max_versions / 2` snapshots. There is no
    /// multi-writer concurrency in this crate (Non-goal), so the only
    /// in-flight reader of an older snapshot is whoever is mid-search; GC
    /// does not need to track active transactions, just keep a safety
    /// margin of recent versions.
    fn gc_old_versions(&self, versions: &mut BTreeMap<u64, Snapshot>) {
        if versions.len() > self.max_versions {
            let min_keep = self.max_versions / 2;
            let cutoff = versions
                .keys()
                .rev()
                .nth(min_keep.saturating_sub(1))
                .copied()
                .unwrap_or(0);
            versions.retain(|&v, _| v >= cutoff);
        }
    }
}

impl Default for MVCCController {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: 0,
            segments: Vec::new(),
            timestamp: Utc::now(),
            doc_count: 0,
            deleted_docs: Arc::new(RoaringBitmap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_snapshot_before_any_commit_is_empty() {
        let mvcc = MVCCController::new();
        let snap = mvcc.current_snapshot();
        assert_eq!(snap.doc_count, 0);
        assert!(snap.segments.is_empty());
    }

    #[test]
    fn snapshots_accumulate_versions() {
        let mvcc = MVCCController::new();
        mvcc.create_snapshot(Vec::new());
        mvcc.create_snapshot(Vec::new());
        let snap = mvcc.current_snapshot();
        assert_eq!(snap.version, 1);
    }
}
