use lz4_flex::block::compress_prepend_size;

use super::{DATA_CODEC, DATA_EXTENSION, INDEX_CODEC, INDEX_EXTENSION, TYPE_BYTES, TYPE_F64, TYPE_I64, TYPE_STRING, VERSION};
use crate::core::doc::FieldValue;
use crate::core::store::{codec_util, ByteArrayOutput, Directory, IOContext, IndexOutput};
use crate::error::Result;

struct PendingDoc {
    raw_length: u32,
}

/// Buffers serialized documents and flushes them as LZ4-compressed
/// chunks once either threshold in spec.md §4.6 is crossed.
pub struct StoredFieldsWriter {
    chunk_size: usize,
    max_docs_per_chunk: usize,

    chunk_doc_base: i32,
    pending_docs: Vec<PendingDoc>,
    pending_bytes: Vec<u8>,

    data_out: Box<dyn IndexOutput>,
    chunk_index: Vec<(u64, i32)>,
    next_doc_id: i32,
}

impl StoredFieldsWriter {
    pub fn open(
        dir: &dyn Directory,
        segment_name: &str,
        segment_id: &[u8],
        chunk_size: usize,
        max_docs_per_chunk: usize,
    ) -> Result<Self> {
        let data_file = format!("{segment_name}.{DATA_EXTENSION}");
        let mut data_out = dir.create_output(&data_file, &IOContext::Flush)?;
        codec_util::write_index_header(data_out.as_mut(), DATA_CODEC, VERSION, segment_id, "")?;

        Ok(StoredFieldsWriter {
            chunk_size,
            max_docs_per_chunk,
            chunk_doc_base: 0,
            pending_docs: Vec::new(),
            pending_bytes: Vec::new(),
            data_out,
            chunk_index: Vec::new(),
            next_doc_id: 0,
        })
    }

    /// Serializes and buffers one document's stored fields, keyed by
    /// `(field_number, value)` pairs. `doc_id` must be the next
    /// sequentially assigned id.
    pub fn add_document(&mut self, doc_id: i32, fields: &[(i32, &FieldValue)]) -> Result<()> {
        if self.pending_docs.is_empty() {
            self.chunk_doc_base = doc_id;
        }
        self.next_doc_id = doc_id + 1;

        let mut scratch = ByteArrayOutput::new();
        write_doc_body(&mut scratch, fields)?;
        let body = scratch.into_bytes();
        let raw_length = body.len() as u32;
        self.pending_bytes.extend_from_slice(&body);
        self.pending_docs.push(PendingDoc { raw_length });

        if self.pending_bytes.len() >= self.chunk_size || self.pending_docs.len() >= self.max_docs_per_chunk {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        if self.pending_docs.is_empty() {
            return Ok(());
        }
        let chunk_fp = self.data_out.file_pointer() as u64;
        self.chunk_index.push((chunk_fp, self.chunk_doc_base));

        self.data_out.write_vint(self.chunk_doc_base)?;
        self.data_out.write_vint(self.pending_docs.len() as i32)?;
        for d in &self.pending_docs {
            self.data_out.write_vint(d.raw_length as i32)?;
        }

        let compressed = compress_prepend_size(&self.pending_bytes);
        self.data_out.write_vint(compressed.len() as i32)?;
        self.data_out.write_bytes(&compressed)?;

        self.pending_docs.clear();
        self.pending_bytes.clear();
        Ok(())
    }

    /// Flushes any partial chunk, writes footers, and persists the
    /// chunk index (`<segment>.fdx`).
    pub fn finish(mut self, dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<()> {
        self.flush_chunk()?;
        codec_util::write_footer(self.data_out.as_mut())?;

        let index_file = format!("{segment_name}.{INDEX_EXTENSION}");
        let mut index_out = dir.create_output(&index_file, &IOContext::Flush)?;
        codec_util::write_index_header(index_out.as_mut(), INDEX_CODEC, VERSION, segment_id, "")?;
        index_out.write_vint(self.chunk_index.len() as i32)?;
        for (fp, doc_base) in &self.chunk_index {
            index_out.write_vlong(*fp as i64)?;
            index_out.write_vint(*doc_base)?;
        }
        index_out.write_vint(self.next_doc_id)?;
        codec_util::write_footer(index_out.as_mut())
    }
}

fn write_doc_body(out: &mut ByteArrayOutput, fields: &[(i32, &FieldValue)]) -> Result<()> {
    out.write_vint(fields.len() as i32)?;
    for (number, value) in fields {
        let type_code = match value {
            FieldValue::Str(_) => TYPE_STRING,
            FieldValue::Bytes(_) => TYPE_BYTES,
            FieldValue::I64(_) => TYPE_I64,
            FieldValue::F64(_) => TYPE_F64,
            // points are never stored, only indexed into the BKD tree.
            FieldValue::Point(_) => TYPE_BYTES,
        };
        let tag = (*number << 2) | type_code as i32;
        out.write_vint(tag)?;
        match value {
            FieldValue::Str(s) => out.write_string(s)?,
            FieldValue::Bytes(b) | FieldValue::Point(b) => {
                out.write_vint(b.len() as i32)?;
                out.write_bytes(b)?;
            }
            FieldValue::I64(v) => out.write_zigzag_vlong(*v)?,
            FieldValue::F64(v) => out.write_long(v.to_bits() as i64)?,
        }
    }
    Ok(())
}
