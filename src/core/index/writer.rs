//! `IndexWriter`: the top-level mutation surface tying together the
//! thread-state pool, flush, merge, deletes, and commit, per spec.md §6
//! ("Writer: addDocument, updateDocument, deleteDocuments, commit,
//! forceMerge, close") and §4.7 (flush/merge/commit semantics).
//! Grounded on the teacher's `thread_doc_writer.rs` coordinator role
//! (the per-thread pool itself was rebuilt against this crate's own
//! `SegmentWriter` in `thread_pool.rs`, not copied verbatim) and on the
//! teacher's `core::index::index_writer_config` builder-struct convention
//! for `IndexWriterConfig`.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::core::doc::Document;
use crate::core::index::live_docs::{live_docs_file_name, read_live_docs, write_live_docs};
use crate::core::index::merge::merge_segments;
use crate::core::index::reader::SegmentReader;
use crate::core::index::segment::{SegmentCommitInfo, SegmentInfos};
use crate::core::index::thread_pool::ThreadStatePool;
use crate::core::search::query::{Query, DEFAULT_MAX_CLAUSE_COUNT};
use crate::core::search::similarity::Bm25Similarity;
use crate::core::store::{Directory, DirectoryRc, Lock};
use crate::core::util::bit_set::FixedBitSet;
use crate::core::util::NO_MORE_DOCS;
use crate::error::{Error, Result};

const WRITE_LOCK_NAME: &str = "write.lock";

/// Recognized writer options, per spec.md §6's configuration surface.
/// This crate implements one merge trigger (explicit `force_merge`, no
/// background scheduler), one commit retention policy (older `segments_N`
/// files are left on disk for an external deletion policy to reap rather
/// than tracked by refcount), and one codec (`Codec::Ferro1`) — so
/// `merge_scheduler`, `merge_policy`, `commit_policy`, and `codec` from
/// spec.md's surface aren't fields here; `ram_buffer_mb`,
/// `max_buffered_docs`, `use_compound_file`, and `similarity` are.
#[derive(Debug, Clone, Copy)]
pub struct IndexWriterConfig {
    pub ram_buffer_mb: f64,
    pub max_buffered_docs: Option<usize>,
    /// Accepted for interface compatibility. `core::codec::compound`
    /// implements the `.cfs`/`.cfe` pack/unpack format itself and is
    /// tested in isolation, but isn't wired into `flush`/`reader::open`
    /// here: this crate's readers locate optional per-segment files (has
    /// postings? has points for field N?) by scanning `SegmentInfo::files()`
    /// for extensions, which assumes those names exist as real directory
    /// entries. Supporting compound files would need that probing split
    /// into a logical manifest (what the segment logically contains) versus
    /// physical storage (one file per codec, or one `.cfs` blob) — see
    /// DESIGN.md.
    pub num_thread_slots: usize,
    pub similarity: Bm25Similarity,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        IndexWriterConfig {
            ram_buffer_mb: 16.0,
            max_buffered_docs: None,
            use_compound_file: true,
            num_thread_slots: 8,
            similarity: Bm25Similarity::default(),
        }
    }
}

pub struct IndexWriter {
    dir: DirectoryRc,
    config: IndexWriterConfig,
    _lock: Box<dyn Lock>,
    pool: ThreadStatePool,
    generation: AtomicI64,
    next_segment_num: AtomicI64,
    segments: Mutex<Vec<SegmentCommitInfo>>,
    pending_deletes: Mutex<Vec<Query>>,
    closed: AtomicBool,
}

impl IndexWriter {
    /// Opens (or creates) an index in `dir`, per spec.md §6's
    /// `LockObtainFailed` ("when a second writer tries to open the same
    /// directory").
    pub fn open(dir: DirectoryRc, config: IndexWriterConfig) -> Result<Self> {
        let lock = dir.obtain_lock(WRITE_LOCK_NAME)?;

        let (generation, segments) = match SegmentInfos::find_latest_generation(dir.as_ref())? {
            Some(gen) => {
                let infos = SegmentInfos::read(&dir, gen)?;
                (gen, infos.segments)
            }
            None => (0, Vec::new()),
        };

        let next_segment_num = segments
            .iter()
            .filter_map(|s| s.info.name.trim_start_matches('_').parse::<i64>().ok())
            .max()
            .map_or(0, |n| n + 1);

        info!("opened writer at generation {generation} with {} segments", segments.len());

        Ok(IndexWriter {
            dir,
            pool: ThreadStatePool::new(config.num_thread_slots),
            config,
            _lock: lock,
            generation: AtomicI64::new(generation),
            next_segment_num: AtomicI64::new(next_segment_num),
            segments: Mutex::new(segments),
            pending_deletes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }

    /// Buffers `doc` in a per-thread slot, per spec.md §4.7's
    /// "per-thread state pool" paragraph, then flushes if the configured
    /// RAM or doc-count threshold is crossed.
    pub fn add_document(&self, doc: Document) -> Result<()> {
        self.check_open()?;
        {
            let slot = self.pool.acquire();
            slot.with_writer(|w| w.add_document(doc))?;
        }
        self.maybe_flush()
    }

    /// Per spec.md §6: `updateDocument(termKey, fields)`, realized as a
    /// queued delete-by-term plus an add. Both become visible together at
    /// the next `commit`: a term-key delete only removes documents
    /// already flushed to a segment, which by the time `commit` applies
    /// queued deletes (after flushing pending buffers) includes every
    /// document added earlier in the same writer session.
    pub fn update_document(&self, field: &str, term: impl Into<Vec<u8>>, doc: Document) -> Result<()> {
        self.check_open()?;
        self.delete_documents(Query::term(field, term))?;
        self.add_document(doc)
    }

    /// Per spec.md §6: `deleteDocuments(query|termKey)` — a term key is
    /// just `Query::term(field, term)`. Deletes are staged and applied
    /// against current segments at the next `commit`.
    pub fn delete_documents(&self, query: Query) -> Result<()> {
        self.check_open()?;
        self.pending_deletes.lock().unwrap().push(query);
        Ok(())
    }

    fn maybe_flush(&self) -> Result<()> {
        let over_ram = self.pool.total_ram_bytes_used() as f64 / (1024.0 * 1024.0) >= self.config.ram_buffer_mb;
        let over_docs = self
            .config
            .max_buffered_docs
            .is_some_and(|limit| self.pool.total_buffered_docs() >= limit);
        if over_ram || over_docs {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn next_segment_name(&self) -> String {
        format!("_{}", self.next_segment_num.fetch_add(1, Ordering::SeqCst))
    }

    /// Drains every thread-pool slot's buffered documents into new
    /// on-disk segments, per spec.md §4.7's "Flush" paragraph. Segments
    /// are appended to the in-memory manifest but aren't durable until
    /// `commit` writes a new `segments_G`.
    fn flush_pending(&self) -> Result<()> {
        for writer in self.pool.drain_for_flush() {
            let num_docs = writer.num_docs();
            let name = self.next_segment_name();
            let info = writer.flush(self.dir.clone(), &name)?;
            debug!("flushed segment {name} with {num_docs} docs");
            self.segments.lock().unwrap().push(SegmentCommitInfo::new(info, 0, 0));
        }
        Ok(())
    }

    /// Applies every queued delete query against `commit`'s current
    /// live-docs state, persisting a new live-docs generation if any
    /// document was newly removed.
    fn apply_deletes_to_segment(&self, queries: &[Query], commit: &mut SegmentCommitInfo) -> Result<()> {
        if queries.is_empty() || commit.info.max_doc == 0 {
            return Ok(());
        }

        let mut live = if commit.has_deletions() {
            let file_name = live_docs_file_name(&commit.info.name, commit.del_gen());
            read_live_docs(self.dir.as_ref(), &file_name, &commit.info.id)?
        } else {
            FixedBitSet::all_set(commit.info.max_doc as usize)
        };
        let before = live.cardinality();

        let reader: Arc<SegmentReader> = Arc::new(SegmentReader::open(&self.dir, commit)?);
        for query in queries {
            let rewritten = query.clone().rewrite(DEFAULT_MAX_CLAUSE_COUNT)?;
            let weight = rewritten.create_weight(self.config.similarity);
            if let Some(mut scorer) = weight.scorer(&reader)? {
                let mut doc = scorer.next_doc();
                while doc != NO_MORE_DOCS {
                    live.clear(doc as usize);
                    doc = scorer.next_doc();
                }
            }
        }

        let removed = before - live.cardinality();
        if removed > 0 {
            let new_gen = commit.del_gen() + 1;
            write_live_docs(self.dir.as_ref(), &commit.info.name, &commit.info.id, new_gen, &live)?;
            commit.advance_del_gen();
            commit.set_del_count(commit.del_count() + removed as i32);
            debug!("deleted {removed} docs from segment {}", commit.info.name);
        }
        Ok(())
    }

    fn write_segments_file(&self) -> Result<()> {
        let next_gen = self.generation.load(Ordering::Acquire) + 1;
        let infos = SegmentInfos {
            generation: next_gen,
            segments: self.segments.lock().unwrap().iter().map(SegmentCommitInfo::clone).collect(),
            user_data: Vec::new(),
        };
        infos.commit(&self.dir)?;
        self.generation.store(next_gen, Ordering::Release);
        info!("committed generation {next_gen} with {} segments", infos.segments.len());
        Ok(())
    }

    /// Per spec.md §4.7's "Commit" paragraph: flush pending buffers,
    /// apply queued deletes, allocate the next generation, write
    /// `segments_G`, fsync. Only after this returns does a reader
    /// reopening the directory observe the new state.
    pub fn commit(&self) -> Result<()> {
        self.check_open()?;
        self.flush_pending()?;

        let queries = std::mem::take(&mut *self.pending_deletes.lock().unwrap());
        if !queries.is_empty() {
            let mut segments = self.segments.lock().unwrap();
            for commit in segments.iter_mut() {
                self.apply_deletes_to_segment(&queries, commit)?;
            }
        }

        self.write_segments_file()
    }

    /// Per spec.md §4.7's "Merge" paragraph, simplified to a single
    /// scheduling policy: repeatedly merge the two smallest-by-live-doc
    /// segments until at most `max_segments` remain, committing after
    /// each merge. `max_segments == 0` is treated as 1 ("full merge").
    ///
    /// Lifecycle calls (`commit`, `force_merge`) are expected to be
    /// driven by one coordinator at a time, matching spec.md §4.7's
    /// "Flush... a single coordinator thread (or a thread-pool) drains
    /// pending slots" framing generalized to the writer's other
    /// lifecycle operations; `add_document` remains safe to call
    /// concurrently from many threads via the per-thread slot pool.
    pub fn force_merge(&self, max_segments: usize) -> Result<()> {
        self.check_open()?;
        self.commit()?;

        let max_segments = max_segments.max(1);
        loop {
            let (first, second) = {
                let segments = self.segments.lock().unwrap();
                if segments.len() <= max_segments {
                    break;
                }
                let mut indices: Vec<usize> = (0..segments.len()).collect();
                indices.sort_by_key(|&i| segments[i].info.max_doc - segments[i].del_count());
                (indices[0], indices[1])
            };

            let (commit_a, commit_b, name_a, name_b) = {
                let segments = self.segments.lock().unwrap();
                (
                    segments[first].clone(),
                    segments[second].clone(),
                    segments[first].info.name.clone(),
                    segments[second].info.name.clone(),
                )
            };

            let reader_a = SegmentReader::open(&self.dir, &commit_a)?;
            let reader_b = SegmentReader::open(&self.dir, &commit_b)?;
            let merged_name = self.next_segment_name();
            let merged_info = merge_segments(self.dir.clone(), &merged_name, &[reader_a, reader_b])?;
            info!("merged segments {name_a}, {name_b} into {merged_name}");

            let old_files: Vec<String> = commit_a
                .info
                .files()
                .iter()
                .chain(commit_b.info.files().iter())
                .cloned()
                .collect();

            {
                let mut segments = self.segments.lock().unwrap();
                let drained = std::mem::take(&mut *segments);
                let mut kept: Vec<SegmentCommitInfo> = drained
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i != first && *i != second)
                    .map(|(_, s)| s)
                    .collect();
                kept.push(SegmentCommitInfo::new(merged_info, 0, 0));
                *segments = kept;
            }

            self.write_segments_file()?;

            for f in old_files {
                let _ = self.dir.delete_file(&f);
            }
        }
        Ok(())
    }

    /// Per spec.md §5's cancellation paragraph ("the whole writer can be
    /// aborted, which discards all in-memory state and leaves the last
    /// commit intact"): buffered uncommitted documents and queued deletes
    /// are simply dropped.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::reader::IndexReader;
    use crate::core::search::searcher::IndexSearcher;
    use crate::core::store::RamDirectory;

    fn writer(dir: DirectoryRc) -> IndexWriter {
        IndexWriter::open(dir, IndexWriterConfig::default()).unwrap()
    }

    fn doc(body: &str) -> Document {
        let mut d = Document::new();
        d.add_text("body", body, true);
        d
    }

    #[test]
    fn commit_makes_documents_searchable() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let w = writer(dir.clone());
        w.add_document(doc("the quick brown fox")).unwrap();
        w.add_document(doc("the lazy dog")).unwrap();
        w.commit().unwrap();

        let reader = IndexReader::open(dir).unwrap();
        assert_eq!(reader.num_docs(), 2);
    }

    #[test]
    fn delete_documents_removes_matching_docs_after_commit() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let w = writer(dir.clone());
        w.add_document(doc("alpha")).unwrap();
        w.add_document(doc("beta")).unwrap();
        w.commit().unwrap();

        w.delete_documents(Query::term("body", b"alpha".to_vec())).unwrap();
        w.commit().unwrap();

        let reader = IndexReader::open(dir).unwrap();
        assert_eq!(reader.num_docs(), 1);
    }

    #[test]
    fn delete_queued_before_commit_applies_to_every_matching_doc_flushed_that_commit() {
        // A delete queued mid-session applies at commit time, after all
        // pending buffers (including documents added after the delete
        // call but before commit) have been flushed to segments — so it
        // catches every matching document from the whole session, not
        // just the ones that existed when `delete_documents` was called.
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let w = writer(dir.clone());
        w.add_document(doc("alpha one")).unwrap();
        w.delete_documents(Query::term("body", b"alpha".to_vec())).unwrap();
        w.add_document(doc("alpha two")).unwrap();
        w.commit().unwrap();

        let reader = IndexReader::open(dir).unwrap();
        let searcher = IndexSearcher::new(reader);
        let (_, total) = searcher.search(&Query::term("body", b"alpha".to_vec()), 10).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn force_merge_reduces_segment_count() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let w = writer(dir.clone());
        w.add_document(doc("one")).unwrap();
        w.commit().unwrap();
        w.add_document(doc("two")).unwrap();
        w.commit().unwrap();
        w.add_document(doc("three")).unwrap();
        w.commit().unwrap();

        w.force_merge(1).unwrap();

        let reader = IndexReader::open(dir).unwrap();
        assert_eq!(reader.segments().len(), 1);
        assert_eq!(reader.num_docs(), 3);
    }

    #[test]
    fn closed_writer_rejects_further_writes() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let w = writer(dir);
        w.close().unwrap();
        assert!(matches!(w.add_document(doc("x")), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn second_writer_on_same_directory_fails_to_obtain_lock() {
        use crate::core::store::MmapDirectory;
        let tmp = tempfile::tempdir().unwrap();
        let dir: DirectoryRc = Arc::new(MmapDirectory::open(tmp.path()).unwrap());
        let _first = writer(dir.clone());
        let second = IndexWriter::open(dir, IndexWriterConfig::default());
        assert!(matches!(second, Err(Error::LockObtainFailed(_))));
    }
}
