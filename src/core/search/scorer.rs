//! Per-segment scorers: the `DocIdSetIterator` plus a `score()` contract
//! from spec.md §4.8 ("a `Weight` yields a per-segment `Scorer`... plus
//! `score()`"). Composition mirrors `search::iterator`'s conjunction/
//! disjunction/minimum-should-match but additionally aggregates scores.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::core::codec::postings::PostingsIterator;
use crate::core::index::reader::SegmentReader;
use crate::core::search::iterator::DocIdSetIterator;
use crate::core::search::similarity::Bm25Similarity;
use crate::core::util::{DocId, NO_MORE_DOCS};

pub trait Scorer: DocIdSetIterator {
    fn score(&mut self) -> f32;
}

/// Scores one term's postings against a segment's BM25 statistics.
pub struct TermScorer {
    iter: PostingsIterator,
    term_weight: f32,
    boost: f32,
    similarity: Bm25Similarity,
    segment: Arc<SegmentReader>,
    field: String,
}

impl TermScorer {
    pub fn new(
        iter: PostingsIterator,
        term_weight: f32,
        boost: f32,
        similarity: Bm25Similarity,
        segment: Arc<SegmentReader>,
        field: String,
    ) -> Self {
        TermScorer {
            iter,
            term_weight,
            boost,
            similarity,
            segment,
            field,
        }
    }
}

impl DocIdSetIterator for TermScorer {
    fn doc_id(&self) -> DocId {
        self.iter.doc_id()
    }
    fn next_doc(&mut self) -> DocId {
        self.iter.next_doc()
    }
    fn advance(&mut self, target: DocId) -> DocId {
        self.iter.advance(target)
    }
    fn cost(&self) -> usize {
        self.iter.cost()
    }
}

impl Scorer for TermScorer {
    fn score(&mut self) -> f32 {
        let doc = self.iter.doc_id();
        let dl = self.segment.norm(&self.field, doc);
        let avgdl = self.segment.avg_field_length(&self.field);
        self.boost * self.similarity.score(self.term_weight, self.iter.freq(), dl, avgdl)
    }
}

/// A constant-score wrapper over any doc-id set: used for prefix/range
/// expansions and for `ConstantScore` queries, per spec.md §4.8's
/// "constant-score multi-term rewrite".
pub struct ConstantScoreScorer {
    inner: Box<dyn DocIdSetIterator>,
    boost: f32,
}

impl ConstantScoreScorer {
    pub fn new(inner: Box<dyn DocIdSetIterator>, boost: f32) -> Self {
        ConstantScoreScorer { inner, boost }
    }
}

impl DocIdSetIterator for ConstantScoreScorer {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }
    fn next_doc(&mut self) -> DocId {
        self.inner.next_doc()
    }
    fn advance(&mut self, target: DocId) -> DocId {
        self.inner.advance(target)
    }
    fn cost(&self) -> usize {
        self.inner.cost()
    }
}

impl Scorer for ConstantScoreScorer {
    fn score(&mut self) -> f32 {
        self.boost
    }
}

/// Every doc in `[0, max_doc)`, constant-scored; backs `Query::MatchAll`.
pub struct MatchAllScorer {
    current: DocId,
    max_doc: DocId,
    boost: f32,
}

impl MatchAllScorer {
    pub fn new(max_doc: DocId, boost: f32) -> Self {
        MatchAllScorer { current: -1, max_doc, boost }
    }
}

impl DocIdSetIterator for MatchAllScorer {
    fn doc_id(&self) -> DocId {
        self.current
    }
    fn next_doc(&mut self) -> DocId {
        self.current = if self.current + 1 < self.max_doc { self.current + 1 } else { NO_MORE_DOCS };
        self.current
    }
    fn advance(&mut self, target: DocId) -> DocId {
        self.current = if target < self.max_doc { target } else { NO_MORE_DOCS };
        self.current
    }
    fn cost(&self) -> usize {
        self.max_doc.max(0) as usize
    }
}

impl Scorer for MatchAllScorer {
    fn score(&mut self) -> f32 {
        self.boost
    }
}

/// AND of sub-scorers (MUST/FILTER clauses): leader-driven like
/// `ConjunctionIterator`, score is the sum of every sub's score at the
/// current doc (spec.md §4.8's "Conjunction").
pub struct ConjunctionScorer {
    subs: Vec<Box<dyn Scorer>>,
    current: DocId,
}

impl ConjunctionScorer {
    pub fn new(mut subs: Vec<Box<dyn Scorer>>) -> Self {
        subs.sort_by_key(|s| s.cost());
        ConjunctionScorer { subs, current: -1 }
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

impl DocIdSetIterator for ConjunctionScorer {
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

impl Scorer for ConjunctionScorer {
    fn score(&mut self) -> f32 {
        self.subs.iter_mut().map(|s| s.score()).sum()
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
        other.doc.cmp(&self.doc)
    }
}

/// OR of sub-scorers (SHOULD clauses): score is the sum of every
/// currently-matching sub's score, with an optional minimum-should-match
/// threshold (spec.md §4.8's "Disjunction"/"Minimum-should-match").
pub struct DisjunctionSumScorer {
    subs: Vec<Box<dyn Scorer>>,
    heap: BinaryHeap<HeapEntry>,
    current: DocId,
    started: bool,
    minimum_should_match: usize,
    matched: Vec<usize>,
}

impl DisjunctionSumScorer {
    pub fn new(subs: Vec<Box<dyn Scorer>>, minimum_should_match: usize) -> Self {
        DisjunctionSumScorer {
            subs,
            heap: BinaryHeap::new(),
            current: -1,
            started: false,
            minimum_should_match: minimum_should_match.max(1),
            matched: Vec::new(),
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

    fn drain_matches_at(&mut self, doc: DocId) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.doc != doc {
                break;
            }
            out.push(self.heap.pop().unwrap().idx);
        }
        for &idx in &out {
            let next = self.subs[idx].next_doc();
            if next != NO_MORE_DOCS {
                self.heap.push(HeapEntry { doc: next, idx });
            }
        }
        out
    }

    fn seek_satisfying(&mut self, mut doc: DocId) -> DocId {
        loop {
            if doc == NO_MORE_DOCS {
                self.matched.clear();
                return NO_MORE_DOCS;
            }
            let matches = self.drain_matches_at(doc);
            if matches.len() >= self.minimum_should_match {
                self.matched = matches;
                return doc;
            }
            doc = self.heap.peek().map(|e| e.doc).unwrap_or(NO_MORE_DOCS);
        }
    }
}

impl DocIdSetIterator for DisjunctionSumScorer {
    fn doc_id(&self) -> DocId {
        self.current
    }
    fn next_doc(&mut self) -> DocId {
        if !self.started {
            self.prime();
        } else {
            let _ = self.drain_matches_at(self.current);
        }
        let doc = self.heap.peek().map(|e| e.doc).unwrap_or(NO_MORE_DOCS);
        self.current = self.seek_satisfying(doc);
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
        let doc = self.heap.peek().map(|e| e.doc).unwrap_or(NO_MORE_DOCS);
        self.current = self.seek_satisfying(doc);
        self.current
    }
    fn cost(&self) -> usize {
        self.subs.iter().map(|s| s.cost()).sum()
    }
}

impl Scorer for DisjunctionSumScorer {
    fn score(&mut self) -> f32 {
        self.matched.iter().map(|&idx| self.subs[idx].score()).sum()
    }
}

/// Drives off a required inner scorer; if an optional scorer also matches
/// the current doc, its score is added. Backs SHOULD clauses that sit
/// alongside at least one MUST/FILTER clause with `minimum_should_match
/// == 0` — they boost score without gating matches.
pub struct OptionalScoreScorer {
    required: Box<dyn Scorer>,
    optional: Box<dyn Scorer>,
}

impl OptionalScoreScorer {
    pub fn new(required: Box<dyn Scorer>, optional: Box<dyn Scorer>) -> Self {
        OptionalScoreScorer { required, optional }
    }
}

impl DocIdSetIterator for OptionalScoreScorer {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }
    fn next_doc(&mut self) -> DocId {
        let doc = self.required.next_doc();
        if doc != NO_MORE_DOCS {
            self.optional.advance(doc);
        }
        doc
    }
    fn advance(&mut self, target: DocId) -> DocId {
        let doc = self.required.advance(target);
        if doc != NO_MORE_DOCS {
            self.optional.advance(doc);
        }
        doc
    }
    fn cost(&self) -> usize {
        self.required.cost()
    }
}

impl Scorer for OptionalScoreScorer {
    fn score(&mut self) -> f32 {
        let base = self.required.score();
        let doc = self.required.doc_id();
        let bonus = if self.optional.doc_id() == doc { self.optional.score() } else { 0.0 };
        base + bonus
    }
}

/// Skips any doc id the prohibited iterator also matches; backs
/// MUST_NOT clauses.
pub struct ExclusionScorer {
    inner: Box<dyn Scorer>,
    prohibited: Box<dyn DocIdSetIterator>,
}

impl ExclusionScorer {
    pub fn new(inner: Box<dyn Scorer>, prohibited: Box<dyn DocIdSetIterator>) -> Self {
        ExclusionScorer { inner, prohibited }
    }

    fn skip_prohibited(&mut self, mut doc: DocId) -> DocId {
        while doc != NO_MORE_DOCS {
            let p = self.prohibited.advance(doc);
            if p == doc {
                doc = self.inner.next_doc();
            } else {
                break;
            }
        }
        doc
    }
}

impl DocIdSetIterator for ExclusionScorer {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }
    fn next_doc(&mut self) -> DocId {
        let doc = self.inner.next_doc();
        self.skip_prohibited(doc)
    }
    fn advance(&mut self, target: DocId) -> DocId {
        let doc = self.inner.advance(target);
        self.skip_prohibited(doc)
    }
    fn cost(&self) -> usize {
        self.inner.cost()
    }
}

impl Scorer for ExclusionScorer {
    fn score(&mut self) -> f32 {
        self.inner.score()
    }
}
