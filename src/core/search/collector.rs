//! Top-k collection, per spec.md §4.8: a bounded min-heap over
//! `(score, docId)`, higher score wins, ties broken by ascending docId.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::util::DocId;

/// A single hit: a global document id (segment-base offset already
/// folded in by the searcher) and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc: DocId,
    pub score: f32,
}

/// Heap entries order so the *worst* hit currently kept is the heap's
/// root: lowest score first, and among equal scores the *highest*
/// docId first (so it's evicted before a lower docId with the same
/// score, matching the "ascending docId" tie-break on output).
struct HeapEntry(ScoreDoc);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.score == other.0.score && self.0.doc == other.0.doc
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.score.partial_cmp(&other.0.score).unwrap_or(Ordering::Equal) {
            Ordering::Equal => self.0.doc.cmp(&other.0.doc),
            ord => ord,
        }
    }
}

/// Collects the top `k` scored hits without buffering the full result
/// set, per spec.md §4.8's "Top-k collection".
pub struct TopDocsCollector {
    k: usize,
    heap: BinaryHeap<std::cmp::Reverse<HeapEntry>>,
    total_hits: usize,
}

impl TopDocsCollector {
    pub fn new(k: usize) -> Self {
        TopDocsCollector {
            k,
            heap: BinaryHeap::with_capacity(k),
            total_hits: 0,
        }
    }

    pub fn collect(&mut self, doc: DocId, score: f32) {
        self.total_hits += 1;
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(std::cmp::Reverse(HeapEntry(ScoreDoc { doc, score })));
            return;
        }
        let worst = &self.heap.peek().unwrap().0;
        if HeapEntry(ScoreDoc { doc, score }) > *worst {
            self.heap.pop();
            self.heap.push(std::cmp::Reverse(HeapEntry(ScoreDoc { doc, score })));
        }
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    /// Drains the heap into a score-descending, docId-ascending list.
    pub fn into_top_docs(self) -> Vec<ScoreDoc> {
        let mut docs: Vec<ScoreDoc> = self.heap.into_iter().map(|e| e.0.0).collect();
        docs.sort_by(|a, b| match b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal) {
            Ordering::Equal => a.doc.cmp(&b.doc),
            ord => ord,
        });
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_top_k_by_score() {
        let mut collector = TopDocsCollector::new(2);
        collector.collect(0, 1.0);
        collector.collect(1, 3.0);
        collector.collect(2, 2.0);
        assert_eq!(collector.total_hits(), 3);
        let docs = collector.into_top_docs();
        assert_eq!(docs, vec![ScoreDoc { doc: 1, score: 3.0 }, ScoreDoc { doc: 2, score: 2.0 }]);
    }

    #[test]
    fn ties_break_by_ascending_doc_id() {
        let mut collector = TopDocsCollector::new(3);
        collector.collect(5, 1.0);
        collector.collect(1, 1.0);
        collector.collect(3, 1.0);
        let docs = collector.into_top_docs();
        assert_eq!(docs.iter().map(|d| d.doc).collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn zero_k_still_counts_total_hits() {
        let mut collector = TopDocsCollector::new(0);
        collector.collect(0, 5.0);
        collector.collect(1, 1.0);
        assert_eq!(collector.total_hits(), 2);
        assert!(collector.into_top_docs().is_empty());
    }
}
