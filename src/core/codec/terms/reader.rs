//! Looks terms up via the FST term index, then scans a single term-data
//! block to recover postings metadata, per spec.md §4.4.

use fst::Map;

use super::{TERM_DATA_CODEC, TERM_DATA_VERSION};
use crate::core::codec::postings::TermMetadata;
use crate::core::store::{codec_util, Directory, IOContext, IndexInput};
use crate::error::{Error, Result};

pub struct TermDictReader {
    fst: Map<Vec<u8>>,
    data_input: Box<dyn IndexInput>,
    num_terms: u64,
}

impl TermDictReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8], num_terms: u64) -> Result<Self> {
        let index_file = format!("{segment_name}.{}", super::TERM_INDEX_EXTENSION);
        let mut index_input = dir.open_input(&index_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            index_input.as_mut(),
            "FerroTermIndex",
            TERM_DATA_VERSION,
            TERM_DATA_VERSION,
            segment_id,
            "",
        )?;
        let fst_len = index_input.read_vlong()? as usize;
        let mut fst_bytes = vec![0u8; fst_len];
        index_input.read_bytes(&mut fst_bytes)?;
        let fst = Map::new(fst_bytes).map_err(|e| Error::corrupt(&index_file, e.to_string()))?;

        let data_file = format!("{segment_name}.{}", super::TERM_DATA_EXTENSION);
        let mut data_input = dir.open_input(&data_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            data_input.as_mut(),
            TERM_DATA_CODEC,
            TERM_DATA_VERSION,
            TERM_DATA_VERSION,
            segment_id,
            "",
        )?;

        Ok(TermDictReader {
            fst,
            data_input,
            num_terms,
        })
    }

    pub fn num_terms(&self) -> u64 {
        self.num_terms
    }

    /// Looks up one term's exact postings metadata, or `None` if absent.
    pub fn get(&self, term: &[u8]) -> Result<Option<TermMetadata>> {
        let block_offset = match self.fst.get(term) {
            Some(v) => v,
            None => return Ok(None),
        };
        let mut found = None;
        self.scan_block(block_offset, |t, meta| {
            if t == term {
                found = Some(meta);
                false
            } else {
                true
            }
        })?;
        Ok(found)
    }

    /// Enumerates every term whose bytes start with `prefix`, in
    /// ascending order, for prefix-style queries (spec.md §4.4's S1
    /// scenario). Walks every block sequentially from the start of the
    /// term-data file rather than through the FST's own automaton arcs —
    /// correct because blocks are always written in ascending sorted
    /// order, if less efficient than a true FST-output walk.
    pub fn terms_with_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, TermMetadata)>> {
        let mut out = Vec::new();
        let mut input = self.data_input.clone_input();
        input.seek(codec_util::index_header_length(TERM_DATA_CODEC, "") as i64)?;
        let body_end = input.len() as i64 - codec_util::footer_length() as i64;
        let mut done = false;

        while input.file_pointer() < body_end && !done {
            self.scan_block_at(input.as_mut(), |t, meta| {
                if t.starts_with(prefix) {
                    out.push((t.to_vec(), meta));
                } else if t > prefix && !out.is_empty() {
                    done = true;
                    return false;
                }
                true
            })?;
        }
        Ok(out)
    }

    fn scan_block(&self, offset: u64, mut visit: impl FnMut(&[u8], TermMetadata) -> bool) -> Result<()> {
        let mut input = self.data_input.clone_input();
        input.seek(offset as i64)?;
        self.scan_block_at(input.as_mut(), |t, m| visit(t, m))
    }

    /// Scans one block starting at `input`'s current position, invoking
    /// `visit(term_bytes, meta)` for each entry until it returns `false`
    /// or the block is exhausted.
    fn scan_block_at(
        &self,
        input: &mut dyn IndexInput,
        mut visit: impl FnMut(&[u8], TermMetadata) -> bool,
    ) -> Result<()> {
        let count = input.read_vint()?;
        let mut prev_bytes: Vec<u8> = Vec::new();
        let mut prev_meta = TermMetadata::default();
        for i in 0..count {
            let shared = input.read_vint()? as usize;
            let suffix_len = input.read_vint()? as usize;
            let mut suffix = vec![0u8; suffix_len];
            input.read_bytes(&mut suffix)?;
            let mut term = prev_bytes[..shared.min(prev_bytes.len())].to_vec();
            term.extend_from_slice(&suffix);

            let base = if i == 0 { TermMetadata::default() } else { prev_meta };
            let mut meta = TermMetadata {
                doc_start_fp: base.doc_start_fp + input.read_vlong()?,
                pos_start_fp: base.pos_start_fp + input.read_vlong()?,
                pay_start_fp: base.pay_start_fp + input.read_vlong()?,
                doc_freq: input.read_vint()?,
                total_term_freq: input.read_vlong()?,
                singleton_doc_id: None,
                skip_offset: None,
                last_pos_block_offset: 0,
            };
            if input.read_byte()? == 1 {
                meta.singleton_doc_id = Some(input.read_vint()?);
            }
            if input.read_byte()? == 1 {
                meta.skip_offset = Some(input.read_vlong()?);
            }
            meta.last_pos_block_offset = input.read_vlong()?;

            prev_bytes = term.clone();
            prev_meta = meta;

            if !visit(&term, meta) {
                return Ok(());
            }
        }
        Ok(())
    }
}
