use std::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use roaring::RoaringBitmap;
use crate::core::types::{DocId, Document};
use crate::storage::file_lock::FileLock;
use crate::storage::segment::SegmentId;
use crate::storage::segment_writer::SegmentWriter;
use crate::storage::wal::{Operation, WAL};
use crate::core::error::Result;
use crate::mvcc::controller::MVCCController;
use crate::storage::layout::StorageLayout;

/// The single writer for an index directory. Holds an exclusive [`FileLock`]
/// for its lifetime — the Non-goal "multi-writer concurrency on the same
/// index" means this crate never needs to coordinate with a second writer,
/// only to detect and break a stale lock left by one that crashed.
pub struct IndexWriter {
    pub segment_writer: SegmentWriter,
    pub wal: WAL,
    pub config: WriterConfig,
    pub mvcc: Arc<MVCCController>,
    pub lock: Arc<Mutex<()>>,
    pub storage: Arc<StorageLayout>,
    next_doc_id: AtomicU64,
    _file_lock: FileLock,
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub batch_size: usize,
    pub commit_interval: Duration,
    pub max_segment_size: usize,
}

impl IndexWriter {
    pub fn new(storage: Arc<StorageLayout>, mvcc: Arc<MVCCController>, config: WriterConfig) -> Result<Self> {
        let file_lock = FileLock::acquire(&storage, true)?;
        let segment_writer = SegmentWriter::new(&storage, SegmentId::new())?;
        let wal = WAL::open(&storage, 0)?;

        Ok(IndexWriter {
            segment_writer,
            wal,
            config,
            mvcc,
            lock: Arc::new(Mutex::new(())),
            storage,
            next_doc_id: AtomicU64::new(1),
            _file_lock: file_lock,
        })
    }

    /// Allocates a fresh, monotonically-increasing document id, unique for
    /// the lifetime of this writer. Callers must never supply their own
    /// placeholder id: every document, old and new, shares the one
    /// crate-wide tombstone bitmap (`mvcc::controller::Snapshot::deleted_docs`),
    /// so a reused id would tombstone every document that ever shared it the
    /// moment any one of them was deleted.
    pub fn allocate_doc_id(&self) -> DocId {
        DocId::new(self.next_doc_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        let _lock = self.lock.lock().unwrap();

        self.wal.append(Operation::AddDocument(doc.clone()))?;
        self.segment_writer.write_document(&doc)?;

        let should_flush = self.segment_writer.segment.doc_count >= self.config.batch_size as u32;
        drop(_lock);

        if should_flush {
            self.flush()?;
        }

        Ok(())
    }

    /// Soft-deletes a document: the record stays in its segment, but its
    /// `doc_id` is added to the current snapshot's tombstone bitmap so
    /// readers filter it out. Compaction would reclaim the space; this crate
    /// does not compact (no merge policy — see DESIGN.md).
    pub fn delete_document(&mut self, doc_id: DocId) -> Result<()> {
        let _lock = self.lock.lock().unwrap();

        self.wal.append(Operation::DeleteDocument(doc_id))?;

        let current = self.mvcc.current_snapshot();
        let mut deleted: RoaringBitmap = (*current.deleted_docs).clone();
        deleted.insert(doc_id.value() as u32);
        self.mvcc
            .create_snapshot_with_deletes(current.segments.clone(), Arc::new(deleted));

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let new_writer = SegmentWriter::new(&self.storage, SegmentId::new())?;
        let old_writer = std::mem::replace(&mut self.segment_writer, new_writer);
        let segment = old_writer.finish()?;

        let current = self.mvcc.current_snapshot();
        let mut segments = current.segments.clone();
        segments.push(Arc::new(segment));
        self.mvcc
            .create_snapshot_with_deletes(segments, current.deleted_docs.clone());

        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        self.wal.append(Operation::Commit)?;
        self.wal.sync()?;
        Ok(())
    }

    /// Discards the unflushed segment buffer without committing it, used by
    /// the Synchroniser's `rollback()` to undo a failed apply without
    /// replaying every prior write.
    pub fn discard_buffer(&mut self) -> Result<()> {
        self.segment_writer = SegmentWriter::new(&self.storage, SegmentId::new())?;
        Ok(())
    }

    /// Clears every document: fresh empty segment, empty snapshot, rotated
    /// WAL. Used by the Synchroniser's ClearAll apply path.
    pub fn clear(&mut self) -> Result<()> {
        let _lock = self.lock.lock().unwrap();

        self.segment_writer = SegmentWriter::new(&self.storage, SegmentId::new())?;
        self.wal.rotate(&self.storage)?;
        self.mvcc.create_snapshot(Vec::new());

        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            batch_size: 1000,
            commit_interval: Duration::from_secs(5),
            max_segment_size: 100_000,
        }
    }
}
