//! Builds the term-data blocks and the FST term index, per spec.md §4.4.
//! Terms must be pushed in strictly ascending unsigned-lexicographic
//! order (spec.md §3 invariant).

use fst::MapBuilder;

use super::{MAX_ITEMS_IN_BLOCK, TERM_DATA_CODEC, TERM_DATA_VERSION};
use crate::core::codec::postings::TermMetadata;
use crate::core::store::{codec_util, Directory, IOContext, IndexOutput};
use crate::error::{Error, Result};

struct PendingTerm {
    bytes: Vec<u8>,
    meta: TermMetadata,
}

pub struct TermDictWriter {
    pending: Vec<PendingTerm>,
    last_term: Vec<u8>,
    fst_builder: MapBuilder<Vec<u8>>,
    data_out: Box<dyn IndexOutput>,
    num_terms: u64,
}

impl TermDictWriter {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<Self> {
        let data_file = format!("{segment_name}.{}", super::TERM_DATA_EXTENSION);
        let mut data_out = dir.create_output(&data_file, &IOContext::Flush)?;
        codec_util::write_index_header(
            data_out.as_mut(),
            TERM_DATA_CODEC,
            TERM_DATA_VERSION,
            segment_id,
            "",
        )?;
        Ok(TermDictWriter {
            pending: Vec::new(),
            last_term: Vec::new(),
            fst_builder: MapBuilder::memory(),
            data_out,
            num_terms: 0,
        })
    }

    /// Pushes one term's postings metadata. `term` must sort strictly
    /// after the previous call's term.
    pub fn push(&mut self, term: &[u8], meta: TermMetadata) -> Result<()> {
        if !self.last_term.is_empty() && term <= self.last_term.as_slice() {
            return Err(Error::IllegalArgument(
                "terms must be pushed in strictly ascending order".into(),
            ));
        }
        self.last_term = term.to_vec();
        self.pending.push(PendingTerm {
            bytes: term.to_vec(),
            meta,
        });
        if self.pending.len() >= MAX_ITEMS_IN_BLOCK {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let block_offset = self.data_out.file_pointer() as u64;
        self.data_out.write_vint(self.pending.len() as i32)?;

        let mut prev_bytes: Vec<u8> = Vec::new();
        let mut prev_meta = TermMetadata::default();
        for (i, pt) in self.pending.iter().enumerate() {
            let shared = common_prefix_len(&prev_bytes, &pt.bytes);
            let suffix = &pt.bytes[shared..];
            self.data_out.write_vint(shared as i32)?;
            self.data_out.write_vint(suffix.len() as i32)?;
            self.data_out.write_bytes(suffix)?;

            let base = if i == 0 { TermMetadata::default() } else { prev_meta };
            self.data_out.write_vlong(pt.meta.doc_start_fp - base.doc_start_fp)?;
            self.data_out.write_vlong(pt.meta.pos_start_fp - base.pos_start_fp)?;
            self.data_out.write_vlong(pt.meta.pay_start_fp - base.pay_start_fp)?;
            self.data_out.write_vint(pt.meta.doc_freq)?;
            self.data_out.write_vlong(pt.meta.total_term_freq)?;
            match pt.meta.singleton_doc_id {
                Some(id) => {
                    self.data_out.write_byte(1)?;
                    self.data_out.write_vint(id)?;
                }
                None => {
                    self.data_out.write_byte(0)?;
                }
            }
            match pt.meta.skip_offset {
                Some(off) => {
                    self.data_out.write_byte(1)?;
                    self.data_out.write_vlong(off)?;
                }
                None => {
                    self.data_out.write_byte(0)?;
                }
            }
            self.data_out.write_vlong(pt.meta.last_pos_block_offset)?;

            prev_bytes = pt.bytes.clone();
            prev_meta = pt.meta;
        }

        for pt in &self.pending {
            self.fst_builder
                .insert(&pt.bytes, block_offset)
                .map_err(|e| Error::corrupt("<tip>", e.to_string()))?;
        }
        self.num_terms += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    /// Flushes the final (possibly under-sized, per spec.md's
    /// `minItemsInBlock` target) block, writes footers, and persists the
    /// FST into `<segment>.tip`.
    pub fn finish(mut self, dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<u64> {
        if !self.pending.is_empty() {
            self.flush_block()?;
        }
        codec_util::write_footer(self.data_out.as_mut())?;

        let index_file = format!("{segment_name}.{}", super::TERM_INDEX_EXTENSION);
        let mut index_out = dir.create_output(&index_file, &IOContext::Flush)?;
        codec_util::write_index_header(
            index_out.as_mut(),
            "FerroTermIndex",
            TERM_DATA_VERSION,
            segment_id,
            "",
        )?;
        let fst_bytes = self
            .fst_builder
            .into_inner()
            .map_err(|e| Error::corrupt("<tip>", e.to_string()))?;
        index_out.write_vlong(fst_bytes.len() as i64)?;
        index_out.write_bytes(&fst_bytes)?;
        codec_util::write_footer(index_out.as_mut())?;
        Ok(self.num_terms)
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
