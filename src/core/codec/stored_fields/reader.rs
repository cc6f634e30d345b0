use lz4_flex::block::decompress_size_prepended;

use super::{DATA_CODEC, DATA_EXTENSION, INDEX_CODEC, INDEX_EXTENSION, TYPE_BYTES, TYPE_F64, TYPE_I64, TYPE_STRING, VERSION};
use crate::core::doc::FieldValue;
use crate::core::store::{codec_util, Directory, IOContext, IndexInput};
use crate::error::{Error, Result};

struct ChunkEntry {
    file_pointer: u64,
    doc_base: i32,
}

/// Random-access reader over the chunked stored-fields store: one binary
/// search over the chunk index, then one decompress, per spec.md §4.6.
pub struct StoredFieldsReader {
    data_input: Box<dyn IndexInput>,
    chunks: Vec<ChunkEntry>,
    num_docs: i32,
}

impl StoredFieldsReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<Self> {
        let index_file = format!("{segment_name}.{INDEX_EXTENSION}");
        let mut index_input = dir.open_checksum_input(&index_file, &IOContext::Read(true))?;
        codec_util::check_index_header(
            index_input.as_mut(),
            INDEX_CODEC,
            VERSION,
            VERSION,
            segment_id,
            "",
        )?;
        let count = index_input.as_mut().read_vint()?;
        let mut chunks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let file_pointer = index_input.as_mut().read_vlong()? as u64;
            let doc_base = index_input.as_mut().read_vint()?;
            chunks.push(ChunkEntry { file_pointer, doc_base });
        }
        let num_docs = index_input.as_mut().read_vint()?;
        codec_util::retrieve_checksum(index_input.as_mut())?;

        let data_file = format!("{segment_name}.{DATA_EXTENSION}");
        let mut data_input = dir.open_input(&data_file, &IOContext::Read(false))?;
        codec_util::check_index_header(data_input.as_mut(), DATA_CODEC, VERSION, VERSION, segment_id, "")?;

        Ok(StoredFieldsReader {
            data_input,
            chunks,
            num_docs,
        })
    }

    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    /// Returns `(field_number, value)` pairs for `doc_id`, in the order
    /// they were stored.
    pub fn document(&self, doc_id: i32) -> Result<Vec<(i32, FieldValue)>> {
        let chunk_idx = self.find_chunk(doc_id)?;
        let entry = &self.chunks[chunk_idx];

        let mut input = self.data_input.clone_input();
        input.seek(entry.file_pointer as i64)?;
        let doc_base = input.read_vint()?;
        let doc_count = input.read_vint()?;
        let mut raw_lengths = Vec::with_capacity(doc_count as usize);
        for _ in 0..doc_count {
            raw_lengths.push(input.read_vint()? as usize);
        }
        let compressed_len = input.read_vint()? as usize;
        let mut compressed = vec![0u8; compressed_len];
        input.read_bytes(&mut compressed)?;
        let decompressed = decompress_size_prepended(&compressed)
            .map_err(|e| Error::corrupt("<fdt>", e.to_string()))?;

        let target_idx = (doc_id - doc_base) as usize;
        if target_idx >= raw_lengths.len() {
            return Err(Error::corrupt("<fdt>", "docId outside chunk bounds"));
        }
        let start: usize = raw_lengths[..target_idx].iter().sum();
        let end = start + raw_lengths[target_idx];
        parse_doc_body(&decompressed[start..end])
    }

    fn find_chunk(&self, doc_id: i32) -> Result<usize> {
        if self.chunks.is_empty() {
            return Err(Error::corrupt("<fdx>", "no chunks for docId lookup"));
        }
        match self.chunks.binary_search_by_key(&doc_id, |c| c.doc_base) {
            Ok(idx) => Ok(idx),
            Err(0) => Err(Error::corrupt("<fdx>", "docId before first chunk")),
            Err(idx) => Ok(idx - 1),
        }
    }
}

fn parse_doc_body(body: &[u8]) -> Result<Vec<(i32, FieldValue)>> {
    use crate::core::store::ByteArrayInput;
    use std::sync::Arc;

    let mut input = ByteArrayInput::new(Arc::from(body.to_vec().into_boxed_slice()));
    let field_count = input.read_vint()?;
    let mut out = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let tag = input.read_vint()?;
        let type_code = (tag & 0x3) as u8;
        let number = tag >> 2;
        let value = match type_code {
            TYPE_STRING => FieldValue::Str(input.read_string()?),
            TYPE_BYTES => {
                let len = input.read_vint()? as usize;
                let mut b = vec![0u8; len];
                input.read_bytes(&mut b)?;
                FieldValue::Bytes(b)
            }
            TYPE_I64 => FieldValue::I64(input.read_zigzag_vlong()?),
            TYPE_F64 => FieldValue::F64(f64::from_bits(input.read_long()? as u64)),
            _ => return Err(Error::corrupt("<fdt>", "bad stored field type code")),
        };
        out.push((number, value));
    }
    Ok(out)
}
