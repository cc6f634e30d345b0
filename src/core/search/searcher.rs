//! `IndexSearcher`: binds a `Query` to an `IndexReader`'s segments,
//! folding per-segment doc ids into the reader-wide ids spec.md §6
//! exposes to callers, and driving the per-segment `Scorer` into a
//! `TopDocsCollector`.

use crate::core::index::reader::IndexReader;
use crate::core::search::collector::{ScoreDoc, TopDocsCollector};
use crate::core::search::iterator::DocIdSetIterator;
use crate::core::search::query::{Query, DEFAULT_MAX_CLAUSE_COUNT};
use crate::core::search::similarity::Bm25Similarity;
use crate::core::util::NO_MORE_DOCS;
use crate::error::Result;

pub struct IndexSearcher {
    reader: IndexReader,
    similarity: Bm25Similarity,
}

/// A per-term score contribution, returned by `explain` per spec.md §6's
/// "the engine must be able to justify its rankings for testing."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explanation {
    pub matched: bool,
    pub value: f32,
}

impl IndexSearcher {
    pub fn new(reader: IndexReader) -> Self {
        IndexSearcher {
            reader,
            similarity: Bm25Similarity::default(),
        }
    }

    pub fn with_similarity(reader: IndexReader, similarity: Bm25Similarity) -> Self {
        IndexSearcher { reader, similarity }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// Runs `query` and returns the `top_k` highest scoring hits in
    /// score-descending, docId-ascending order, plus the total number of
    /// matching documents across all segments.
    pub fn search(&self, query: &Query, top_k: usize) -> Result<(Vec<ScoreDoc>, usize)> {
        let rewritten = query.clone().rewrite(DEFAULT_MAX_CLAUSE_COUNT)?;
        let weight = rewritten.create_weight(self.similarity);
        let mut collector = TopDocsCollector::new(top_k);

        let mut base: i32 = 0;
        for segment in self.reader.segments() {
            if let Some(mut scorer) = weight.scorer(segment)? {
                let mut doc = scorer.next_doc();
                while doc != NO_MORE_DOCS {
                    if segment.is_live(doc) {
                        collector.collect(base + doc, scorer.score());
                    }
                    doc = scorer.next_doc();
                }
            }
            base += segment.max_doc();
        }

        let total = collector.total_hits();
        Ok((collector.into_top_docs(), total))
    }

    /// Counts matching documents without materializing scores or a
    /// bounded top-k heap.
    pub fn count(&self, query: &Query) -> Result<usize> {
        let rewritten = query.clone().rewrite(DEFAULT_MAX_CLAUSE_COUNT)?;
        let weight = rewritten.create_weight(self.similarity);
        let mut total = 0usize;
        for segment in self.reader.segments() {
            if let Some(mut scorer) = weight.scorer(segment)? {
                let mut doc = scorer.next_doc();
                while doc != NO_MORE_DOCS {
                    if segment.is_live(doc) {
                        total += 1;
                    }
                    doc = scorer.next_doc();
                }
            }
        }
        Ok(total)
    }

    /// Explains whether and how `query` matched the global document id
    /// `target_doc`, per spec.md §6.
    pub fn explain(&self, query: &Query, target_doc: i32) -> Result<Explanation> {
        let rewritten = query.clone().rewrite(DEFAULT_MAX_CLAUSE_COUNT)?;
        let weight = rewritten.create_weight(self.similarity);

        let mut base: i32 = 0;
        for segment in self.reader.segments() {
            let max_doc = segment.max_doc();
            if target_doc >= base && target_doc < base + max_doc {
                let local = target_doc - base;
                if let Some(mut scorer) = weight.scorer(segment)? {
                    let found = scorer.advance(local);
                    if found == local {
                        return Ok(Explanation {
                            matched: true,
                            value: scorer.score(),
                        });
                    }
                }
                return Ok(Explanation { matched: false, value: 0.0 });
            }
            base += max_doc;
        }
        Ok(Explanation { matched: false, value: 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::doc::Document;
    use crate::core::index::segment::{SegmentCommitInfo, SegmentInfos};
    use crate::core::index::segment_writer::SegmentWriter;
    use crate::core::search::query::Query;
    use crate::core::store::directory::DirectoryRc;
    use crate::core::store::RamDirectory;
    use std::sync::Arc;

    fn build_index() -> DirectoryRc {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let mut writer = SegmentWriter::new();

        let mut doc1 = Document::new();
        doc1.add_text("body", "the quick brown fox", true);
        writer.add_document(doc1).unwrap();

        let mut doc2 = Document::new();
        doc2.add_text("body", "the lazy dog sleeps all day", true);
        writer.add_document(doc2).unwrap();

        let mut doc3 = Document::new();
        doc3.add_text("body", "quick quick quick fox", true);
        writer.add_document(doc3).unwrap();

        let info = writer.flush(dir.clone(), "_0").unwrap();
        let mut infos = SegmentInfos::new();
        infos.generation = 1;
        infos.segments.push(SegmentCommitInfo::new(info, 0, 0));
        infos.commit(&dir).unwrap();
        dir
    }

    #[test]
    fn term_query_ranks_higher_term_frequency_first() {
        let dir = build_index();
        let reader = IndexReader::open(dir).unwrap();
        let searcher = IndexSearcher::new(reader);

        let (hits, total) = searcher.search(&Query::term("body", b"quick".to_vec()), 10).unwrap();
        assert_eq!(total, 2);
        assert_eq!(hits[0].doc, 2, "doc 2 repeats \"quick\" three times");
    }

    #[test]
    fn count_matches_search_total() {
        let dir = build_index();
        let reader = IndexReader::open(dir).unwrap();
        let searcher = IndexSearcher::new(reader);

        let count = searcher.count(&Query::term("body", b"the".to_vec())).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn explain_reports_unmatched_document() {
        let dir = build_index();
        let reader = IndexReader::open(dir).unwrap();
        let searcher = IndexSearcher::new(reader);

        let explanation = searcher.explain(&Query::term("body", b"lazy".to_vec()), 0).unwrap();
        assert!(!explanation.matched);
    }
}
