//! `DocIdSetIterator` and its compositions: conjunction, disjunction,
//! minimum-should-match, and two-phase iteration, per spec.md §4.8.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::util::{DocId, NO_MORE_DOCS};

/// The base posting/filter iterator contract every scorer is built on.
/// `doc_id()` before the first `next_doc()`/`advance()` call is
/// unspecified; callers always prime the iterator first.
pub trait DocIdSetIterator: Send {
    fn doc_id(&self) -> DocId;
    fn next_doc(&mut self) -> DocId;

    /// Advances to the first doc id >= `target`. `target` must be >
    /// the current doc id.
    fn advance(&mut self, target: DocId) -> DocId {
        let mut doc = self.doc_id();
        while doc < target {
            doc = self.next_doc();
        }
        doc
    }

    /// An estimate of the number of remaining matches, used to order
    /// conjunction leaders by ascending cost (spec.md §4.8).
    fn cost(&self) -> usize;
}

/// Cheap approximate iteration plus an expensive exact check, per
/// spec.md §4.8 ("Two-phase"): the approximation drives `advance`, and
/// `matches()` is only invoked on approximate hits.
pub trait TwoPhaseIterator: Send {
    fn approximation(&mut self) -> &mut dyn DocIdSetIterator;
    fn matches(&mut self) -> bool;
    fn match_cost(&self) -> f32;
}

/// An iterator over a fixed ascending slice of doc ids — the base case
/// used directly by single-term postings and by tests.
pub struct SimpleDocIdSetIterator {
    docs: Vec<DocId>,
    pos: isize,
}

impl SimpleDocIdSetIterator {
    pub fn new(mut docs: Vec<DocId>) -> Self {
        docs.sort_unstable();
        SimpleDocIdSetIterator { docs, pos: -1 }
    }
}

impl DocIdSetIterator for SimpleDocIdSetIterator {
    fn doc_id(&self) -> DocId {
        if self.pos < 0 {
            -1
        } else if (self.pos as usize) < self.docs.len() {
            self.docs[self.pos as usize]
        } else {
            NO_MORE_DOCS
        }
    }

    fn next_doc(&mut self) -> DocId {
        self.pos += 1;
        self.doc_id()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        while self.pos < 0 || (self.pos as usize) < self.docs.len() && self.docs[self.pos as usize] < target {
            self.pos += 1;
        }
        self.doc_id()
    }

    fn cost(&self) -> usize {
        self.docs.len()
    }
}

struct HeapEntry {
    doc: DocId,
    idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
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
        // BinaryHeap is a max-heap; reverse so the lowest doc id is on top.
        other.doc.cmp(&self.doc)
    }
}

/// A min-heap disjunction over sub-iterators: `next_doc` pops the lowest
/// doc id, advances it, and re-pushes (spec.md §4.8).
pub struct DisjunctionIterator {
    subs: Vec<Box<dyn DocIdSetIterator>>,
    heap: BinaryHeap<HeapEntry>,
    current: DocId,
    started: bool,
}

impl DisjunctionIterator {
    pub fn new(subs: Vec<Box<dyn DocIdSetIterator>>) -> Self {
        DisjunctionIterator {
            subs,
            heap: BinaryHeap::new(),
            current: -1,
            started: false,
        }
    }

    fn prime(&mut self) {
        for (idx, sub) in self.subs.iter_mut().enumerate() {
            let doc = sub.next_doc();
            if doc != NO_MORE_DOCS {
                self.heap.push(HeapEntry { doc, idx });
            }
        }
        self.started = true;
    }

    /// Returns the sub-iterator indices that currently sit at `doc_id()`
    /// — used by minimum-should-match and disjunction scoring to know
    /// which clauses actually matched.
    pub fn matching_subs(&mut self, doc: DocId) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.doc != doc {
                break;
            }
            out.push(self.heap.pop().unwrap().idx);
        }
        // re-advance the ones we popped so the heap stays consistent for
        // the next next_doc() call.
        for &idx in &out {
            let next = self.subs[idx].next_doc();
            if next != NO_MORE_DOCS {
                self.heap.push(HeapEntry { doc: next, idx });
            }
        }
        out
    }
}

impl DocIdSetIterator for DisjunctionIterator {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next_doc(&mut self) -> DocId {
        if !self.started {
            self.prime();
        } else {
            // advance every sub-iterator sitting at `current`.
            while let Some(top) = self.heap.peek() {
                if top.doc != self.current {
                    break;
                }
                let HeapEntry { idx, .. } = self.heap.pop().unwrap();
                let next = self.subs[idx].next_doc();
                if next != NO_MORE_DOCS {
                    self.heap.push(HeapEntry { doc: next, idx });
                }
            }
        }
        self.current = self.heap.peek().map(|e| e.doc).unwrap_or(NO_MORE_DOCS);
        self.current
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if !self.started {
            self.prime();
        }
        while let Some(top) = self.heap.peek() {
            if top.doc >= target {
                break;
            }
            let HeapEntry { idx, .. } = self.heap.pop().unwrap();
            let next = self.subs[idx].advance(target);
            if next != NO_MORE_DOCS {
                self.heap.push(HeapEntry { doc: next, idx });
            }
        }
        self.current = self.heap.peek().map(|e| e.doc).unwrap_or(NO_MORE_DOCS);
        self.current
    }

    fn cost(&self) -> usize {
        self.subs.iter().map(|s| s.cost()).sum()
    }
}

/// Conjunction (AND): sub-iterators are sorted by ascending cost; the
/// leader drives `next_doc`/`advance`, the rest `advance` to catch up; on
/// mismatch the largest id seen becomes the new target (spec.md §4.8).
pub struct ConjunctionIterator {
    subs: Vec<Box<dyn DocIdSetIterator>>,
    current: DocId,
}

impl ConjunctionIterator {
    pub fn new(mut subs: Vec<Box<dyn DocIdSetIterator>>) -> Self {
        subs.sort_by_key(|s| s.cost());
        ConjunctionIterator { subs, current: -1 }
    }

    fn do_next(&mut self, mut target: DocId) -> DocId {
        if self.subs.is_empty() {
            return NO_MORE_DOCS;
        }
        'outer: loop {
            for sub in self.subs.iter_mut() {
                let doc = sub.advance(target);
                if doc == NO_MORE_DOCS {
                    self.current = NO_MORE_DOCS;
                    return NO_MORE_DOCS;
                }
                if doc > target {
                    target = doc;
                    continue 'outer;
                }
            }
            self.current = target;
            return target;
        }
    }
}

impl DocIdSetIterator for ConjunctionIterator {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next_doc(&mut self) -> DocId {
        if self.subs.is_empty() {
            return NO_MORE_DOCS;
        }
        let target = self.subs[0].next_doc();
        if target == NO_MORE_DOCS {
            self.current = NO_MORE_DOCS;
            return NO_MORE_DOCS;
        }
        self.do_next(target)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.do_next(target)
    }

    fn cost(&self) -> usize {
        self.subs.iter().map(|s| s.cost()).min().unwrap_or(0)
    }
}

/// Disjunction variant requiring at least `minimum_should_match` of the
/// sub-iterators to agree on a doc id (spec.md §4.8).
pub struct MinShouldMatchIterator {
    inner: DisjunctionIterator,
    minimum_should_match: usize,
}

impl MinShouldMatchIterator {
    pub fn new(subs: Vec<Box<dyn DocIdSetIterator>>, minimum_should_match: usize) -> Self {
        MinShouldMatchIterator {
            inner: DisjunctionIterator::new(subs),
            minimum_should_match: minimum_should_match.max(1),
        }
    }

    fn seek_satisfying(&mut self, mut doc: DocId) -> DocId {
        loop {
            if doc == NO_MORE_DOCS {
                return NO_MORE_DOCS;
            }
            let matches = self.inner.matching_subs(doc).len();
            if matches >= self.minimum_should_match {
                return doc;
            }
            doc = self.inner.doc_id();
            if doc == NO_MORE_DOCS {
                return NO_MORE_DOCS;
            }
        }
    }
}

impl DocIdSetIterator for MinShouldMatchIterator {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        let doc = self.inner.next_doc();
        self.seek_satisfying(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let doc = self.inner.advance(target);
        self.seek_satisfying(doc)
    }

    fn cost(&self) -> usize {
        self.inner.cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(docs: &[DocId]) -> Box<dyn DocIdSetIterator> {
        Box::new(SimpleDocIdSetIterator::new(docs.to_vec()))
    }

    #[test]
    fn conjunction_intersects() {
        let mut it = ConjunctionIterator::new(vec![
            simple(&[1, 2, 3, 10, 11]),
            simple(&[2, 3, 4, 11]),
            simple(&[2, 3, 11, 20]),
        ]);
        let mut got = Vec::new();
        let mut d = it.next_doc();
        while d != NO_MORE_DOCS {
            got.push(d);
            d = it.next_doc();
        }
        assert_eq!(got, vec![2, 3, 11]);
    }

    #[test]
    fn disjunction_unions() {
        let mut it = DisjunctionIterator::new(vec![simple(&[1, 5]), simple(&[2, 5, 9])]);
        let mut got = Vec::new();
        let mut d = it.next_doc();
        while d != NO_MORE_DOCS {
            got.push(d);
            d = it.next_doc();
        }
        assert_eq!(got, vec![1, 2, 5, 9]);
    }

    #[test]
    fn min_should_match_requires_threshold() {
        // doc 0: a,e,c -> a,c match 'should' {a,b,d}? none of b,d -> 0 should hits
        // mirrors S2 in spec.md §8, simplified to raw doc-id sets.
        let should = vec![simple(&[8]), simple(&[]), simple(&[8])]; // a, b, d hits on doc 8 (a,d)
        let mut it = MinShouldMatchIterator::new(should, 2);
        assert_eq!(it.next_doc(), 8);
        assert_eq!(it.next_doc(), NO_MORE_DOCS);
    }
}
