//! Reads `(docDelta, freq)` / position blocks back into a
//! `DocIdSetIterator`-shaped cursor, using the skip list to jump close to
//! `advance(target)` before falling back to block-by-block scanning
//! (spec.md §4.3).

use super::skip::SkipReader;
use super::TermMetadata;
use crate::core::search::iterator::DocIdSetIterator;
use crate::core::store::{Directory, IOContext, IndexInput};
use crate::core::util::for_util::{ForUtil, BLOCK_SIZE};
use crate::core::util::{DocId, NO_MORE_DOCS};
use crate::error::Result;

/// Opens `.doc`/`.pos`/`.pay` once per segment reader; `postings_for`
/// creates one `PostingsIterator` per term, sharing these file handles by
/// cloning cheap slice-style inputs.
pub struct PostingsReader {
    doc_input: Box<dyn IndexInput>,
    pos_input: Box<dyn IndexInput>,
    #[allow(dead_code)]
    pay_input: Box<dyn IndexInput>,
}

impl PostingsReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<Self> {
        use crate::core::store::codec_util;

        let doc_file = format!("{segment_name}.{}", super::DOC_EXTENSION);
        let pos_file = format!("{segment_name}.{}", super::POS_EXTENSION);
        let pay_file = format!("{segment_name}.{}", super::PAY_EXTENSION);

        let mut doc_input = dir.open_input(&doc_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            doc_input.as_mut(),
            super::DOC_CODEC,
            super::POSTINGS_VERSION,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;
        let mut pos_input = dir.open_input(&pos_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            pos_input.as_mut(),
            super::POS_CODEC,
            super::POSTINGS_VERSION,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;
        let mut pay_input = dir.open_input(&pay_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            pay_input.as_mut(),
            super::PAY_CODEC,
            super::POSTINGS_VERSION,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;

        Ok(PostingsReader {
            doc_input,
            pos_input,
            pay_input,
        })
    }

    pub fn postings(&self, meta: &TermMetadata, needs_positions: bool) -> Result<PostingsIterator> {
        let pos_slice = if needs_positions {
            Some(self.pos_input.slice(
                "pos",
                meta.pos_start_fp,
                self.pos_input.len() as i64 - meta.pos_start_fp,
            )?)
        } else {
            None
        };

        if let Some(doc_id) = meta.singleton_doc_id {
            return Ok(PostingsIterator::singleton(
                doc_id,
                meta.total_term_freq as i32,
                pos_slice,
            ));
        }

        let mut doc_slice = self
            .doc_input
            .slice("doc", meta.doc_start_fp, self.doc_input.len() as i64 - meta.doc_start_fp)?;

        let skip = if let Some(skip_offset) = meta.skip_offset {
            doc_slice.seek(skip_offset)?;
            Some(SkipReader::read(doc_slice.as_mut())?)
        } else {
            None
        };
        doc_slice.seek(0)?;

        Ok(PostingsIterator {
            doc_freq: meta.doc_freq,
            docs_read: 0,
            block: [0i64; BLOCK_SIZE],
            freqs: [0i64; BLOCK_SIZE],
            block_pos: 0,
            block_len: 0,
            doc_input: Some(doc_slice),
            pos_input: pos_slice,
            total_term_freq: meta.total_term_freq,
            pos_deltas_read: 0,
            pos_block: [0i64; BLOCK_SIZE],
            pos_block_pos: 0,
            pos_block_len: 0,
            current_doc: -1,
            current_freq: 0,
            accum_doc: 0,
            skip,
            doc_start_fp: meta.doc_start_fp,
            singleton: None,
        })
    }
}

/// The per-term posting iterator. Also implements `DocIdSetIterator` so
/// it can be used directly by the query-evaluation layer.
pub struct PostingsIterator {
    doc_freq: i32,
    docs_read: i32,
    block: [i64; BLOCK_SIZE],
    freqs: [i64; BLOCK_SIZE],
    block_pos: usize,
    block_len: usize,
    doc_input: Option<Box<dyn IndexInput>>,
    pos_input: Option<Box<dyn IndexInput>>,
    total_term_freq: i64,
    pos_deltas_read: i64,
    pos_block: [i64; BLOCK_SIZE],
    pos_block_pos: usize,
    pos_block_len: usize,
    current_doc: DocId,
    current_freq: i32,
    accum_doc: i32,
    skip: Option<SkipReader>,
    doc_start_fp: i64,
    singleton: Option<(DocId, i32)>,
}

impl PostingsIterator {
    fn singleton(doc_id: DocId, freq: i32, pos_input: Option<Box<dyn IndexInput>>) -> Self {
        PostingsIterator {
            doc_freq: 1,
            docs_read: 0,
            block: [0; BLOCK_SIZE],
            freqs: [0; BLOCK_SIZE],
            block_pos: 0,
            block_len: 0,
            doc_input: None,
            pos_input,
            total_term_freq: freq as i64,
            pos_deltas_read: 0,
            pos_block: [0; BLOCK_SIZE],
            pos_block_pos: 0,
            pos_block_len: 0,
            current_doc: -1,
            current_freq: 0,
            accum_doc: 0,
            skip: None,
            doc_start_fp: 0,
            singleton: Some((doc_id, freq)),
        }
    }

    pub fn freq(&self) -> i32 {
        self.current_freq
    }

    fn refill_pos_block(&mut self) -> Result<()> {
        let remaining = (self.total_term_freq - self.pos_deltas_read) as usize;
        let input = self.pos_input.as_mut().unwrap();
        if remaining >= BLOCK_SIZE {
            ForUtil::decode_block(input.as_mut(), &mut self.pos_block)?;
            self.pos_block_len = BLOCK_SIZE;
        } else {
            let mut deltas = Vec::new();
            ForUtil::decode_tail(input.as_mut(), remaining, &mut deltas)?;
            self.pos_block[..remaining].copy_from_slice(&deltas);
            self.pos_block_len = remaining;
        }
        self.pos_block_pos = 0;
        Ok(())
    }

    /// Decodes the position list for the document `next_doc`/`advance`
    /// last landed on. Positions reset to an absolute value starting from
    /// 0 at each document boundary (see `PostingsWriter::start_doc`), so
    /// callers must read exactly `freq()` positions per document and in
    /// document order; skipping a document's positions without reading
    /// them desyncs the shared block cursor.
    pub fn positions(&mut self) -> Result<Vec<i32>> {
        let freq = self.current_freq.max(0) as usize;
        let mut out = Vec::with_capacity(freq);
        if self.pos_input.is_none() {
            return Ok(out);
        }
        let mut pos = 0i32;
        for _ in 0..freq {
            if self.pos_block_pos >= self.pos_block_len {
                self.refill_pos_block()?;
            }
            pos += self.pos_block[self.pos_block_pos] as i32;
            self.pos_block_pos += 1;
            self.pos_deltas_read += 1;
            out.push(pos);
        }
        Ok(out)
    }

    fn refill_block(&mut self) -> Result<()> {
        let remaining = (self.doc_freq - self.docs_read) as usize;
        let input = self.doc_input.as_mut().unwrap();
        if remaining >= BLOCK_SIZE {
            ForUtil::decode_block(input.as_mut(), &mut self.block)?;
            ForUtil::decode_block(input.as_mut(), &mut self.freqs)?;
            self.block_len = BLOCK_SIZE;
        } else {
            let mut docs = Vec::new();
            let mut freqs = Vec::new();
            ForUtil::decode_tail(input.as_mut(), remaining, &mut docs)?;
            ForUtil::decode_tail(input.as_mut(), remaining, &mut freqs)?;
            self.block[..remaining].copy_from_slice(&docs);
            self.freqs[..remaining].copy_from_slice(&freqs);
            self.block_len = remaining;
        }
        self.block_pos = 0;
        Ok(())
    }
}

impl DocIdSetIterator for PostingsIterator {
    fn doc_id(&self) -> DocId {
        self.current_doc
    }

    fn next_doc(&mut self) -> DocId {
        if let Some((doc, freq)) = self.singleton {
            if self.current_doc < 0 {
                self.current_doc = doc;
                self.current_freq = freq;
            } else {
                self.current_doc = NO_MORE_DOCS;
            }
            return self.current_doc;
        }

        if self.docs_read >= self.doc_freq {
            self.current_doc = NO_MORE_DOCS;
            return NO_MORE_DOCS;
        }
        if self.block_pos >= self.block_len {
            if self.refill_block().is_err() {
                self.current_doc = NO_MORE_DOCS;
                return NO_MORE_DOCS;
            }
        }
        self.accum_doc += self.block[self.block_pos] as i32;
        self.current_freq = self.freqs[self.block_pos] as i32;
        self.block_pos += 1;
        self.docs_read += 1;
        self.current_doc = self.accum_doc;
        self.current_doc
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.singleton.is_some() {
            return if self.next_doc() >= target {
                self.current_doc
            } else {
                self.current_doc
            };
        }

        if let Some(skip) = &self.skip {
            if let Some((entry, level0_index)) = skip.skip_to(target) {
                if (level0_index as i32) * (BLOCK_SIZE as i32) > self.docs_read {
                    if let Some(input) = self.doc_input.as_mut() {
                        let _ = input.seek(entry.doc_fp - self.doc_start_fp);
                    }
                    self.accum_doc = entry.last_doc;
                    self.docs_read = (level0_index as i32) * (BLOCK_SIZE as i32);
                    self.block_pos = 0;
                    self.block_len = 0;
                }
            }
        }

        let mut doc = self.doc_id();
        while doc < target && doc != NO_MORE_DOCS {
            doc = self.next_doc();
        }
        doc
    }

    fn cost(&self) -> usize {
        self.doc_freq as usize
    }
}
