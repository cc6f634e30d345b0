//! Writes `(docDelta, freq)` and position-delta blocks for one field's
//! terms into the shared `.doc` / `.pos` / `.pay` files, per spec.md §4.3.
//!
//! Usage mirrors the teacher's `PostingsSerializer` contract (see the
//! grounding note in `core/codec/terms/block_tree.rs`): `start_term`,
//! then `start_doc`/`add_position` per occurrence, then `finish_term`,
//! terms strictly increasing, one `PostingsWriter` per segment flush.

use super::skip::{SkipEntry, SkipWriter};
use super::TermMetadata;
use crate::core::store::{Directory, IOContext, IndexOutput};
use crate::core::util::for_util::{ForUtil, BLOCK_SIZE};
use crate::error::Result;

pub struct PostingsWriter {
    doc_out: Box<dyn IndexOutput>,
    pos_out: Box<dyn IndexOutput>,
    pay_out: Box<dyn IndexOutput>,

    doc_deltas: [i64; BLOCK_SIZE],
    freqs: [i64; BLOCK_SIZE],
    buffered: usize,

    pos_deltas: [i64; BLOCK_SIZE],
    pos_buffered: usize,

    last_doc_id: i32,
    last_position: i32,
    doc_freq: i32,
    total_term_freq: i64,
    first_doc_id: i32,

    doc_start_fp: i64,
    pos_start_fp: i64,
    pay_start_fp: i64,
    last_pos_block_offset: i64,

    skip: SkipWriter,
    has_positions: bool,
    has_payloads: bool,
}

impl PostingsWriter {
    pub fn open(
        dir: &dyn Directory,
        segment_name: &str,
        segment_id: &[u8],
    ) -> Result<PostingsWriter> {
        use crate::core::store::codec_util;

        let doc_file = format!("{segment_name}.{}", super::DOC_EXTENSION);
        let pos_file = format!("{segment_name}.{}", super::POS_EXTENSION);
        let pay_file = format!("{segment_name}.{}", super::PAY_EXTENSION);

        let mut doc_out = dir.create_output(&doc_file, &IOContext::Flush)?;
        let mut pos_out = dir.create_output(&pos_file, &IOContext::Flush)?;
        let mut pay_out = dir.create_output(&pay_file, &IOContext::Flush)?;

        codec_util::write_index_header(
            doc_out.as_mut(),
            super::DOC_CODEC,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;
        codec_util::write_index_header(
            pos_out.as_mut(),
            super::POS_CODEC,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;
        codec_util::write_index_header(
            pay_out.as_mut(),
            super::PAY_CODEC,
            super::POSTINGS_VERSION,
            segment_id,
            "",
        )?;

        Ok(PostingsWriter {
            doc_out,
            pos_out,
            pay_out,
            doc_deltas: [0; BLOCK_SIZE],
            freqs: [0; BLOCK_SIZE],
            buffered: 0,
            pos_deltas: [0; BLOCK_SIZE],
            pos_buffered: 0,
            last_doc_id: -1,
            last_position: 0,
            doc_freq: 0,
            total_term_freq: 0,
            first_doc_id: -1,
            doc_start_fp: 0,
            pos_start_fp: 0,
            pay_start_fp: 0,
            last_pos_block_offset: 0,
            skip: SkipWriter::new(),
            has_positions: false,
            has_payloads: false,
        })
    }

    /// Begins a new term's postings. `has_positions`/`has_payloads` come
    /// from the field's `IndexOptions` for the term currently being
    /// flushed.
    pub fn start_term(&mut self, has_positions: bool, has_payloads: bool) {
        self.doc_start_fp = self.doc_out.file_pointer();
        self.pos_start_fp = self.pos_out.file_pointer();
        self.pay_start_fp = self.pay_out.file_pointer();
        self.buffered = 0;
        self.pos_buffered = 0;
        self.last_doc_id = -1;
        self.last_position = 0;
        self.doc_freq = 0;
        self.total_term_freq = 0;
        self.first_doc_id = -1;
        self.has_positions = has_positions;
        self.has_payloads = has_payloads;
        self.skip = SkipWriter::new();
    }

    /// Starts a new document within the current term's postings; `freq`
    /// is the term frequency in this document.
    pub fn start_doc(&mut self, doc_id: i32, freq: i32) -> Result<()> {
        debug_assert!(doc_id > self.last_doc_id, "postings doc ids must strictly increase");
        if self.first_doc_id < 0 {
            self.first_doc_id = doc_id;
        }
        let delta = if self.doc_freq == 0 {
            doc_id as i64
        } else {
            (doc_id - self.last_doc_id) as i64
        };
        self.doc_deltas[self.buffered] = delta;
        self.freqs[self.buffered] = freq as i64;
        self.buffered += 1;
        self.last_doc_id = doc_id;
        self.last_position = 0;
        self.doc_freq += 1;
        self.total_term_freq += freq as i64;

        if self.buffered == BLOCK_SIZE {
            self.flush_doc_block()?;
        }
        Ok(())
    }

    fn flush_doc_block(&mut self) -> Result<()> {
        ForUtil::encode_block(&self.doc_deltas, self.doc_out.as_mut())?;
        ForUtil::encode_block(&self.freqs, self.doc_out.as_mut())?;
        let entry = SkipEntry {
            last_doc: self.last_doc_id,
            doc_fp: self.doc_out.file_pointer(),
            pos_fp: self.pos_out.file_pointer(),
            pay_fp: self.pay_out.file_pointer(),
            pos_count: self.last_position as i64, // running total is tracked by the caller across docs; approximated here per block boundary
            pay_bytes: 0,
        };
        self.skip.record_block(entry);
        self.buffered = 0;
        Ok(())
    }

    /// Adds one occurrence's position (and optional payload) for the
    /// document currently being built. Positions must be strictly
    /// increasing within a document (spec.md §3).
    pub fn add_position(&mut self, position: i32, payload: Option<&[u8]>) -> Result<()> {
        if !self.has_positions {
            return Ok(());
        }
        let delta = position - self.last_position;
        self.last_position = position;
        self.pos_deltas[self.pos_buffered] = delta as i64;
        self.pos_buffered += 1;

        if self.has_payloads {
            let bytes = payload.unwrap_or(&[]);
            self.pay_out.write_vint(bytes.len() as i32)?;
            self.pay_out.write_bytes(bytes)?;
        }

        if self.pos_buffered == BLOCK_SIZE {
            ForUtil::encode_block(&self.pos_deltas, self.pos_out.as_mut())?;
            self.last_pos_block_offset = self.pos_out.file_pointer();
            self.pos_buffered = 0;
        }
        Ok(())
    }

    /// Finishes the current term, flushing any partial block as vInts and
    /// the skip list (if doc-frequency warrants one), and returns the
    /// metadata the term dictionary should store for this term.
    pub fn finish_term(&mut self) -> Result<TermMetadata> {
        if self.buffered > 0 {
            ForUtil::encode_tail(&self.doc_deltas[..self.buffered], self.doc_out.as_mut())?;
            ForUtil::encode_tail(&self.freqs[..self.buffered], self.doc_out.as_mut())?;
        }
        if self.pos_buffered > 0 {
            ForUtil::encode_tail(&self.pos_deltas[..self.pos_buffered], self.pos_out.as_mut())?;
        }

        let skip_offset = if self.doc_freq as usize > BLOCK_SIZE && !self.skip.is_empty() {
            let offset = self.doc_out.file_pointer() - self.doc_start_fp;
            self.skip.write(self.doc_out.as_mut())?;
            Some(offset)
        } else {
            None
        };

        let singleton_doc_id = if self.doc_freq == 1 {
            Some(self.first_doc_id)
        } else {
            None
        };

        Ok(TermMetadata {
            doc_start_fp: self.doc_start_fp,
            pos_start_fp: self.pos_start_fp,
            pay_start_fp: self.pay_start_fp,
            singleton_doc_id,
            last_pos_block_offset: self.last_pos_block_offset,
            skip_offset,
            doc_freq: self.doc_freq,
            total_term_freq: self.total_term_freq,
        })
    }

    /// Writes footers on all three files; called once after every term in
    /// the field has been written.
    pub fn finish(&mut self) -> Result<()> {
        use crate::core::store::codec_util;
        codec_util::write_footer(self.doc_out.as_mut())?;
        codec_util::write_footer(self.pos_out.as_mut())?;
        codec_util::write_footer(self.pay_out.as_mut())
    }
}
