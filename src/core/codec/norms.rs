//! Per-field, per-doc length norms, used by BM25's `dl`/`avgdl` terms
//! (spec.md §4.8: "dl the encoded field length (quantized into one byte
//! at index time)"). One `.nrm` file per segment, a dense byte array per
//! indexed field sized `maxDoc` (docs missing the field get 0), mirroring
//! the teacher's normalized-length-byte approach to `Similarity` but
//! without its `SmallFloat` 3-bit-mantissa packing — plain linear
//! quantization, which answers the same BM25 formula correctly at the
//! cost of a little extra precision loss for very long fields.

use std::collections::HashMap;

use crate::core::store::{codec_util, Directory, IOContext, IndexOutput};
use crate::error::Result;

pub const NORMS_EXTENSION: &str = "nrm";
const NORMS_CODEC: &str = "FerroNorms";
const NORMS_VERSION: i32 = 1;

/// Maps a raw token count to one byte. Linear with a cap, not log-scaled:
/// good enough since the BM25 formula only needs monotonicity, and this
/// keeps decoding branch-free.
pub fn quantize_length(token_count: i32) -> u8 {
    token_count.clamp(0, 255) as u8
}

#[derive(Default)]
pub struct NormsWriter {
    counts: HashMap<i32, HashMap<i32, i32>>,
}

impl NormsWriter {
    pub fn new() -> Self {
        NormsWriter::default()
    }

    pub fn add(&mut self, field_number: i32, doc_id: i32, token_count: i32) {
        *self.counts.entry(field_number).or_default().entry(doc_id).or_insert(0) += token_count;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Writes `maxDoc` once, then one `(fieldNumber, maxDoc bytes)` entry
    /// per indexed field.
    pub fn finish(self, dir: &dyn Directory, segment_name: &str, segment_id: &[u8], max_doc: i32) -> Result<()> {
        let file_name = format!("{segment_name}.{NORMS_EXTENSION}");
        let mut out = dir.create_output(&file_name, &IOContext::Flush)?;
        codec_util::write_index_header(out.as_mut(), NORMS_CODEC, NORMS_VERSION, segment_id, "")?;

        let mut fields: Vec<i32> = self.counts.keys().copied().collect();
        fields.sort_unstable();
        out.write_vint(max_doc)?;
        out.write_vint(fields.len() as i32)?;
        for field in fields {
            let per_doc = &self.counts[&field];
            out.write_vint(field)?;
            let bytes: Vec<u8> = (0..max_doc)
                .map(|d| quantize_length(*per_doc.get(&d).unwrap_or(&0)))
                .collect();
            out.write_bytes(&bytes)?;
        }
        codec_util::write_footer(out.as_mut())
    }
}

pub struct NormsReader {
    fields: HashMap<i32, Vec<u8>>,
}

impl NormsReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<Self> {
        let file_name = format!("{segment_name}.{NORMS_EXTENSION}");
        let mut input = dir.open_checksum_input(&file_name, &IOContext::Read(true))?;
        codec_util::check_index_header(
            input.as_mut(),
            NORMS_CODEC,
            NORMS_VERSION,
            NORMS_VERSION,
            segment_id,
            "",
        )?;
        let max_doc = input.as_mut().read_vint()?;
        let num_fields = input.as_mut().read_vint()?;
        let mut fields = HashMap::with_capacity(num_fields as usize);
        for _ in 0..num_fields {
            let field = input.as_mut().read_vint()?;
            let mut bytes = vec![0u8; max_doc as usize];
            input.as_mut().read_bytes(&mut bytes)?;
            fields.insert(field, bytes);
        }
        codec_util::retrieve_checksum(input.as_mut())?;
        Ok(NormsReader { fields })
    }

    /// Quantized length for `field_number`/`doc_id`, or 0 if the field
    /// has no norms (wasn't indexed, or not present on this doc).
    pub fn get(&self, field_number: i32, doc_id: i32) -> u8 {
        self.fields.get(&field_number).and_then(|b| b.get(doc_id as usize)).copied().unwrap_or(0)
    }

    /// Average quantized length across all docs carrying this field,
    /// used as BM25's `avgdl`. Docs with a 0 byte (field absent) are
    /// excluded from the average, matching Lucene's "avgdl over docs
    /// that have the field" convention.
    pub fn average(&self, field_number: i32) -> f32 {
        let Some(bytes) = self.fields.get(&field_number) else {
            return 1.0;
        };
        let mut sum = 0u64;
        let mut n = 0u64;
        for &b in bytes {
            if b > 0 {
                sum += b as u64;
                n += 1;
            }
        }
        if n == 0 {
            1.0
        } else {
            sum as f32 / n as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn write_read_round_trips() {
        let dir = RamDirectory::new();
        let id = [3u8; 16];
        let mut w = NormsWriter::new();
        w.add(0, 0, 4);
        w.add(0, 1, 10);
        w.finish(&dir, "_0", &id, 2).unwrap();

        let r = NormsReader::open(&dir, "_0", &id).unwrap();
        assert_eq!(r.get(0, 0), 4);
        assert_eq!(r.get(0, 1), 10);
        assert_eq!(r.average(0), 7.0);
    }
}
