//! Per-thread state pool, per spec.md §4.7 ("N slots each owning a
//! private segment-builder. A writing thread acquires a free slot (LIFO...)
//! and holds it exclusively while processing one document."). Grounded on
//! the role `thread_doc_writer.rs`'s `DocumentsWriterPerThreadPool`
//! referenced from `core/index/mod.rs`, rebuilt against the new
//! `SegmentWriter` rather than the teacher's `DocumentsWriterPerThread`.

use std::sync::{Condvar, Mutex};

use crate::core::index::segment_writer::SegmentWriter;

/// One per-thread builder slot plus its own running RAM estimate, so the
/// writer can decide "should this slot flush" without re-walking the
/// buffered documents.
struct Slot {
    writer: SegmentWriter,
}

pub struct ThreadStatePool {
    slots: Vec<Mutex<Slot>>,
    /// LIFO free list: releasing a slot pushes its index back on top, so
    /// the next `acquire` prefers the most recently used slot (spec.md
    /// §4.7: "prefer it to concentrate writes and promote earlier flush").
    free: Mutex<Vec<usize>>,
    available: Condvar,
}

impl ThreadStatePool {
    pub fn new(num_slots: usize) -> Self {
        let num_slots = num_slots.max(1);
        ThreadStatePool {
            slots: (0..num_slots).map(|_| Mutex::new(Slot { writer: SegmentWriter::new() })).collect(),
            free: Mutex::new((0..num_slots).collect()),
            available: Condvar::new(),
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until a slot is free, then returns an exclusive handle to
    /// it. The slot is released back to the pool when the handle drops.
    pub fn acquire(&self) -> PooledSlot<'_> {
        let mut free = self.free.lock().unwrap();
        loop {
            if let Some(idx) = free.pop() {
                return PooledSlot { pool: self, idx };
            }
            free = self.available.wait(free).unwrap();
        }
    }

    /// Drains every slot's accumulated documents into one combined count,
    /// used by `IndexWriter::commit` to flush all pending state. Each
    /// non-empty slot is replaced with a fresh, empty builder; the
    /// previous builder is handed to `flush_one`.
    pub fn drain_for_flush(&self) -> Vec<SegmentWriter> {
        let mut out = Vec::new();
        for slot in &self.slots {
            let mut guard = slot.lock().unwrap();
            if !guard.writer.is_empty() {
                let drained = std::mem::replace(&mut guard.writer, SegmentWriter::new());
                out.push(drained);
            }
        }
        out
    }

    pub fn total_ram_bytes_used(&self) -> usize {
        self.slots.iter().map(|s| s.lock().unwrap().writer.ram_bytes_used()).sum()
    }

    pub fn total_buffered_docs(&self) -> usize {
        self.slots.iter().map(|s| s.lock().unwrap().writer.num_docs()).sum()
    }
}

/// RAII handle returned by `ThreadStatePool::acquire`. Derefs to the
/// slot's `SegmentWriter` for the duration of one `add_document` call.
pub struct PooledSlot<'a> {
    pool: &'a ThreadStatePool,
    idx: usize,
}

impl<'a> PooledSlot<'a> {
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut SegmentWriter) -> R) -> R {
        let mut guard = self.pool.slots[self.idx].lock().unwrap();
        f(&mut guard.writer)
    }
}

impl<'a> Drop for PooledSlot<'a> {
    fn drop(&mut self) {
        self.pool.free.lock().unwrap().push(self.idx);
        self.pool.available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trips() {
        let pool = ThreadStatePool::new(2);
        {
            let slot = pool.acquire();
            slot.with_writer(|w| {
                let mut doc = crate::core::doc::Document::new();
                doc.add_text("body", "hello world", true);
                w.add_document(doc).unwrap();
            });
        }
        assert_eq!(pool.total_buffered_docs(), 1);
    }

    #[test]
    fn lifo_prefers_most_recently_released_slot() {
        let pool = ThreadStatePool::new(2);
        let first = pool.acquire();
        let second = pool.acquire();
        let first_idx = first.idx;
        let second_idx = second.idx;
        assert_ne!(first_idx, second_idx);
        drop(first);
        drop(second);
        // second was released last, so the next acquire should get it back.
        let reacquired = pool.acquire();
        assert_eq!(reacquired.idx, second_idx);
    }
}
