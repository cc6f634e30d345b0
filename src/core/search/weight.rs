//! `Weight`: a `Query` bound to a searcher's similarity, producing a
//! per-segment `Scorer` on demand, per spec.md §4.8 ("A `Query` produces
//! a `Weight` bound to an `IndexSearcher`; a `Weight` yields a
//! per-segment `Scorer`").

use std::sync::Arc;

use crate::core::codec::points::{IntersectVisitor, Relation};
use crate::core::index::reader::SegmentReader;
use crate::core::search::iterator::{DocIdSetIterator, SimpleDocIdSetIterator};
use crate::core::search::query::{Occur, Query};
use crate::core::search::scorer::{
    ConjunctionScorer, ConstantScoreScorer, DisjunctionSumScorer, ExclusionScorer, MatchAllScorer,
    OptionalScoreScorer, Scorer, TermScorer,
};
use crate::core::search::similarity::Bm25Similarity;
use crate::core::util::bit_set::FixedBitSet;
use crate::core::util::{DocId, NO_MORE_DOCS};
use crate::error::Result;

/// `Box<dyn Scorer>` doesn't implicitly coerce to `Box<dyn
/// DocIdSetIterator>`; this adapter forwards iteration for scorers used
/// only as a prohibited-set, never scored.
struct ScorerIter(Box<dyn Scorer>);

impl DocIdSetIterator for ScorerIter {
    fn doc_id(&self) -> DocId {
        self.0.doc_id()
    }
    fn next_doc(&mut self) -> DocId {
        self.0.next_doc()
    }
    fn advance(&mut self, target: DocId) -> DocId {
        self.0.advance(target)
    }
    fn cost(&self) -> usize {
        self.0.cost()
    }
}

/// A multi-term query whose expansion is small enough to score term-by-
/// term stays a disjunction; larger expansions fall back to an unscored
/// bitset, per spec.md §4.8's "constant-score multi-term rewrite".
const CONSTANT_SCORE_TERM_LIMIT: usize = 16;

pub trait Weight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>>;
}

impl Query {
    /// Binds this query to `similarity`, producing the `Weight` that
    /// creates per-segment scorers.
    pub fn create_weight(&self, similarity: Bm25Similarity) -> Box<dyn Weight> {
        match self {
            Query::Term { field, term, boost } => Box::new(TermWeight {
                field: field.clone(),
                term: term.clone(),
                boost: *boost,
                similarity,
            }),
            Query::Prefix { field, prefix, boost } => Box::new(PrefixWeight {
                field: field.clone(),
                prefix: prefix.clone(),
                boost: *boost,
            }),
            Query::Boolean(bq) => {
                let must: Vec<Box<dyn Weight>> = bq
                    .clauses
                    .iter()
                    .filter(|c| c.occur == Occur::Must)
                    .map(|c| c.query.create_weight(similarity))
                    .collect();
                let filter: Vec<Box<dyn Weight>> = bq
                    .clauses
                    .iter()
                    .filter(|c| c.occur == Occur::Filter)
                    .map(|c| c.query.create_weight(similarity))
                    .collect();
                let should: Vec<Box<dyn Weight>> = bq
                    .clauses
                    .iter()
                    .filter(|c| c.occur == Occur::Should)
                    .map(|c| c.query.create_weight(similarity))
                    .collect();
                let must_not: Vec<Box<dyn Weight>> = bq
                    .clauses
                    .iter()
                    .filter(|c| c.occur == Occur::MustNot)
                    .map(|c| c.query.create_weight(similarity))
                    .collect();
                Box::new(BooleanWeight {
                    must,
                    filter,
                    should,
                    must_not,
                    minimum_should_match: bq.minimum_should_match,
                })
            }
            Query::PointRange {
                field,
                num_dims,
                bytes_per_dim,
                lower,
                upper,
            } => Box::new(PointRangeWeight {
                field: field.clone(),
                num_dims: *num_dims,
                bytes_per_dim: *bytes_per_dim,
                lower: lower.clone(),
                upper: upper.clone(),
            }),
            Query::ConstantScore(inner, boost) => Box::new(ConstantScoreWeight {
                inner: inner.create_weight(similarity),
                boost: *boost,
            }),
            Query::MatchAll => Box::new(MatchAllWeight),
            Query::MatchNone => Box::new(MatchNoneWeight),
        }
    }
}

struct TermWeight {
    field: String,
    term: Vec<u8>,
    boost: f32,
    similarity: Bm25Similarity,
}

impl Weight for TermWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        let Some(meta) = segment.term_metadata(&self.field, &self.term)? else {
            return Ok(None);
        };
        let term_weight = self.similarity.term_weight(segment.num_docs(), meta.doc_freq);
        let iter = segment.postings(&self.field, &self.term, false)?.expect("term dictionary and postings must agree");
        Ok(Some(Box::new(TermScorer::new(
            iter,
            term_weight,
            self.boost,
            self.similarity,
            segment.clone(),
            self.field.clone(),
        ))))
    }
}

struct PrefixWeight {
    field: String,
    prefix: Vec<u8>,
    boost: f32,
}

impl Weight for PrefixWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        let matches = segment.terms_with_prefix(&self.field, &self.prefix)?;
        if matches.is_empty() {
            return Ok(None);
        }

        let inner: Box<dyn DocIdSetIterator> = if matches.len() <= CONSTANT_SCORE_TERM_LIMIT {
            let mut subs: Vec<Box<dyn DocIdSetIterator>> = Vec::with_capacity(matches.len());
            for (term, _) in &matches {
                if let Some(iter) = segment.postings(&self.field, term, false)? {
                    subs.push(Box::new(iter));
                }
            }
            Box::new(crate::core::search::iterator::DisjunctionIterator::new(subs))
        } else {
            let mut bits = FixedBitSet::new(segment.max_doc() as usize);
            for (term, _) in &matches {
                if let Some(mut iter) = segment.postings(&self.field, term, false)? {
                    let mut doc = iter.next_doc();
                    while doc != NO_MORE_DOCS {
                        bits.set(doc as usize);
                        doc = iter.next_doc();
                    }
                }
            }
            Box::new(SimpleDocIdSetIterator::new(bits.iter().map(|d| d as i32).collect()))
        };

        Ok(Some(Box::new(ConstantScoreScorer::new(inner, self.boost))))
    }
}

struct PointRangeWeight {
    field: String,
    num_dims: usize,
    bytes_per_dim: usize,
    lower: Vec<u8>,
    upper: Vec<u8>,
}

struct RangeVisitor {
    num_dims: usize,
    bytes_per_dim: usize,
    lower: Vec<u8>,
    upper: Vec<u8>,
    hits: Vec<i32>,
}

impl RangeVisitor {
    fn dim(&self, packed: &[u8], d: usize) -> &[u8] {
        &packed[d * self.bytes_per_dim..(d + 1) * self.bytes_per_dim]
    }

    fn lower_dim(&self, d: usize) -> &[u8] {
        &self.lower[d * self.bytes_per_dim..(d + 1) * self.bytes_per_dim]
    }

    fn upper_dim(&self, d: usize) -> &[u8] {
        &self.upper[d * self.bytes_per_dim..(d + 1) * self.bytes_per_dim]
    }
}

impl IntersectVisitor for RangeVisitor {
    fn visit(&mut self, doc_id: i32) {
        self.hits.push(doc_id);
    }

    fn visit_with_value(&mut self, doc_id: i32, packed_value: &[u8]) {
        for d in 0..self.num_dims {
            let v = self.dim(packed_value, d);
            if v < self.lower_dim(d) || v > self.upper_dim(d) {
                return;
            }
        }
        self.hits.push(doc_id);
    }

    fn compare(&self, min_packed_value: &[u8], max_packed_value: &[u8]) -> Relation {
        let mut all_inside = true;
        for d in 0..self.num_dims {
            let cell_min = self.dim(min_packed_value, d);
            let cell_max = self.dim(max_packed_value, d);
            if cell_max < self.lower_dim(d) || cell_min > self.upper_dim(d) {
                return Relation::Outside;
            }
            if cell_min < self.lower_dim(d) || cell_max > self.upper_dim(d) {
                all_inside = false;
            }
        }
        if all_inside {
            Relation::Inside
        } else {
            Relation::Crosses
        }
    }
}

impl Weight for PointRangeWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        let Some(reader) = segment.points(&self.field) else {
            return Ok(None);
        };
        let mut visitor = RangeVisitor {
            num_dims: self.num_dims,
            bytes_per_dim: self.bytes_per_dim,
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            hits: Vec::new(),
        };
        reader.intersect(&mut visitor)?;
        if visitor.hits.is_empty() {
            return Ok(None);
        }
        visitor.hits.sort_unstable();
        visitor.hits.dedup();
        Ok(Some(Box::new(ConstantScoreScorer::new(
            Box::new(SimpleDocIdSetIterator::new(visitor.hits)),
            1.0,
        ))))
    }
}

struct ConstantScoreWeight {
    inner: Box<dyn Weight>,
    boost: f32,
}

impl Weight for ConstantScoreWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        let Some(mut inner) = self.inner.scorer(segment)? else {
            return Ok(None);
        };
        // Re-wrap so the constant boost replaces whatever the inner
        // scorer would have computed; drive iteration off it directly.
        let mut docs = Vec::new();
        let mut doc = inner.doc_id();
        if doc == -1 {
            doc = inner.next_doc();
        }
        while doc != NO_MORE_DOCS {
            docs.push(doc);
            doc = inner.next_doc();
        }
        Ok(Some(Box::new(ConstantScoreScorer::new(
            Box::new(SimpleDocIdSetIterator::new(docs)),
            self.boost,
        ))))
    }
}

struct MatchAllWeight;

impl Weight for MatchAllWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        if segment.max_doc() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(MatchAllScorer::new(segment.max_doc(), 1.0))))
    }
}

struct MatchNoneWeight;

impl Weight for MatchNoneWeight {
    fn scorer(&self, _segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        Ok(None)
    }
}

struct BooleanWeight {
    must: Vec<Box<dyn Weight>>,
    filter: Vec<Box<dyn Weight>>,
    should: Vec<Box<dyn Weight>>,
    must_not: Vec<Box<dyn Weight>>,
    minimum_should_match: usize,
}

impl Weight for BooleanWeight {
    fn scorer(&self, segment: &Arc<SegmentReader>) -> Result<Option<Box<dyn Scorer>>> {
        let mut required: Vec<Box<dyn Scorer>> = Vec::new();
        for w in self.must.iter().chain(self.filter.iter()) {
            match w.scorer(segment)? {
                Some(s) => required.push(s),
                None => return Ok(None), // AND against an empty clause matches nothing.
            }
        }

        let mut should_scorers: Vec<Box<dyn Scorer>> = Vec::new();
        for w in &self.should {
            if let Some(s) = w.scorer(segment)? {
                should_scorers.push(s);
            }
        }

        let should_required = self.minimum_should_match > 0 || (required.is_empty() && !should_scorers.is_empty());
        let effective_mmsm = if should_required { self.minimum_should_match.max(1) } else { 0 };

        let mut core: Option<Box<dyn Scorer>> = if required.is_empty() {
            None
        } else if required.len() == 1 {
            Some(required.into_iter().next().unwrap())
        } else {
            Some(Box::new(ConjunctionScorer::new(required)))
        };

        if !should_scorers.is_empty() {
            if should_required {
                if should_scorers.len() < effective_mmsm {
                    return Ok(None);
                }
                let disjunction: Box<dyn Scorer> = if should_scorers.len() == 1 && effective_mmsm <= 1 {
                    should_scorers.into_iter().next().unwrap()
                } else {
                    Box::new(DisjunctionSumScorer::new(should_scorers, effective_mmsm))
                };
                core = Some(match core {
                    Some(c) => Box::new(ConjunctionScorer::new(vec![c, disjunction])),
                    None => disjunction,
                });
            } else if let Some(c) = core {
                let disjunction: Box<dyn Scorer> = if should_scorers.len() == 1 {
                    should_scorers.into_iter().next().unwrap()
                } else {
                    Box::new(DisjunctionSumScorer::new(should_scorers, 1))
                };
                core = Some(Box::new(OptionalScoreScorer::new(c, disjunction)));
            }
        }

        let Some(mut core) = core else { return Ok(None) };

        if !self.must_not.is_empty() {
            let mut prohibited: Vec<Box<dyn DocIdSetIterator>> = Vec::new();
            for w in &self.must_not {
                if let Some(s) = w.scorer(segment)? {
                    prohibited.push(Box::new(ScorerIter(s)));
                }
            }
            if !prohibited.is_empty() {
                let union: Box<dyn DocIdSetIterator> = if prohibited.len() == 1 {
                    prohibited.into_iter().next().unwrap()
                } else {
                    Box::new(crate::core::search::iterator::DisjunctionIterator::new(prohibited))
                };
                core = Box::new(ExclusionScorer::new(core, union));
            }
        }

        Ok(Some(core))
    }
}
