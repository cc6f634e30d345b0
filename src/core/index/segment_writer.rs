//! The in-memory per-segment builder, per spec.md §2/§4.7 ("a per-segment
//! indexer accumulates docs in RAM... flush writes a new segment").
//! Grounded on the teacher's per-thread DWPT (`DocumentsWriterPerThread`,
//! referenced from `thread_doc_writer.rs`) simplified to a single
//! in-process buffer: documents accumulate here until `flush` is called,
//! at which point every codec writer built so far (postings, term
//! dictionary, stored fields, doc-values, BKD points) is driven once.
//!
//! **Grounding note on one cross-field simplification:** the term
//! dictionary and the points codec each persist one file pair per
//! *segment*, not per field (matching their writer/reader signatures).
//! To keep one global term ordering across all indexed fields, term keys
//! are prefixed with a fixed 4-byte big-endian field number before being
//! handed to `TermDictWriter` — field number sorts first, so per-field
//! term order is preserved inside the single dictionary. Point fields are
//! disambiguated instead by giving `BkdWriter::finish` a per-field file
//! suffix, since unlike terms, a segment's point fields don't need to
//! share one globally sorted structure.

use std::collections::{BTreeMap, HashMap};

use crate::core::codec::doc_values::DocValuesWriter;
use crate::core::codec::field_infos::{DocValuesType, FieldInfo, FieldInfos, IndexOptions};
use crate::core::codec::norms::NormsWriter;
use crate::core::codec::points::BkdWriter;
use crate::core::codec::postings::PostingsWriter;
use crate::core::codec::stored_fields::{StoredFieldsWriter, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_DOCS_PER_CHUNK};
use crate::core::codec::terms::TermDictWriter;
use crate::core::codec::Codec;
use crate::core::doc::{Document, FieldValue};
use crate::core::index::segment::{SegmentId, SegmentInfo};
use crate::core::store::{Directory, DirectoryRc};
use crate::core::util::string_util;
use crate::error::{Error, Result};

#[derive(Default)]
struct PostingAccum {
    /// `(docId, freq, positions)` in ascending docId order (documents are
    /// appended to the buffer in arrival order, i.e. ascending doc id).
    /// `freq` is tracked independently of `positions` so fields indexed
    /// with `DocsFreqs` (no positions) still get a correct term frequency.
    docs: Vec<(i32, i32, Vec<i32>)>,
}

/// Buffers documents for one segment generation. Not thread-safe itself;
/// the per-thread state pool described in spec.md §4.7 is expected to
/// hand each writing thread its own `SegmentWriter` instance.
pub struct SegmentWriter {
    field_infos: FieldInfos,
    docs: Vec<Document>,
}

impl SegmentWriter {
    pub fn new() -> Self {
        SegmentWriter {
            field_infos: FieldInfos::new(),
            docs: Vec::new(),
        }
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Rough RAM estimate driving `IndexWriterConfig::ram_buffer_mb`
    /// (spec.md §4.7's "per-thread buffer accumulates until RAM
    /// threshold"): sums each stored/indexed value's byte length.
    pub fn ram_bytes_used(&self) -> usize {
        self.docs
            .iter()
            .map(|d| {
                d.fields
                    .iter()
                    .map(|f| f.name.len() + f.value.as_bytes_for_stored().len() + 32)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Assigns the next dense docId to `doc` and buffers it, interning
    /// any new field names into `field_infos` as they're first seen.
    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        for f in &doc.fields {
            if self.field_infos.by_name(&f.name).is_none() {
                let index_options = if f.indexed { f.index_options } else { IndexOptions::None };
                self.field_infos.add(FieldInfo {
                    name: f.name.clone(),
                    number: 0, // assigned by FieldInfos::add
                    index_options,
                    has_vectors: false,
                    doc_values_type: f.doc_values_type,
                    point_dimension_count: f.point_dimension_count,
                    point_num_bytes: f.point_num_bytes,
                });
            }
        }
        self.docs.push(doc);
        Ok(())
    }

    /// Writes every codec file for this segment, the field-infos
    /// manifest, and the `.si` segment-info, per spec.md §4.7's "Flush"
    /// paragraph ("write all codec files, then a segment-info manifest
    /// naming them, then ensure all files are fsynced").
    pub fn flush(self, dir: DirectoryRc, segment_name: &str) -> Result<SegmentInfo> {
        let segment_id: SegmentId = string_util::random_id();
        let max_doc = self.docs.len() as i32;

        let mut inverted: HashMap<i32, BTreeMap<Vec<u8>, PostingAccum>> = HashMap::new();
        let mut stored = StoredFieldsWriter::open(
            dir.as_ref(),
            segment_name,
            &segment_id,
            DEFAULT_CHUNK_SIZE,
            DEFAULT_MAX_DOCS_PER_CHUNK,
        )?;
        let mut doc_values = DocValuesWriter::new();
        let mut norms = NormsWriter::new();
        let mut points: HashMap<i32, BkdWriter> = HashMap::new();

        for (doc_id, doc) in self.docs.iter().enumerate() {
            let doc_id = doc_id as i32;
            let mut stored_fields: Vec<(i32, &FieldValue)> = Vec::new();

            for f in &doc.fields {
                let info = self
                    .field_infos
                    .by_name(&f.name)
                    .ok_or_else(|| Error::IllegalArgument(format!("unknown field {}", f.name)))?;
                let field_number = info.number;

                if f.stored {
                    stored_fields.push((field_number, &f.value));
                }

                if f.indexed {
                    let has_positions = f.index_options.has_positions();
                    let tokens = f.value.tokenize();
                    norms.add(field_number, doc_id, tokens.len() as i32);
                    for (pos, token) in tokens.into_iter().enumerate() {
                        let term = prefixed_term(field_number, token.as_bytes());
                        let accum = inverted.entry(field_number).or_default().entry(term).or_default();
                        match accum.docs.last_mut() {
                            Some((last_doc, freq, positions)) if *last_doc == doc_id => {
                                *freq += 1;
                                if has_positions {
                                    positions.push(pos as i32);
                                }
                            }
                            _ => {
                                let positions = if has_positions { vec![pos as i32] } else { Vec::new() };
                                accum.docs.push((doc_id, 1, positions));
                            }
                        }
                    }
                }

                match f.doc_values_type {
                    DocValuesType::None => {}
                    DocValuesType::Numeric => {
                        if let FieldValue::I64(v) = &f.value {
                            doc_values.add_numeric(field_number, doc_id, *v);
                        }
                    }
                    DocValuesType::Binary => {
                        doc_values.add_binary(field_number, doc_id, f.value.as_bytes_for_stored());
                    }
                    DocValuesType::Sorted => {
                        doc_values.add_sorted(field_number, doc_id, f.value.as_bytes_for_stored());
                    }
                    DocValuesType::SortedNumeric => {
                        if let FieldValue::I64(v) = &f.value {
                            doc_values.add_sorted_numeric(field_number, doc_id, vec![*v]);
                        }
                    }
                    DocValuesType::SortedSet => {
                        doc_values.add_sorted_set(field_number, doc_id, vec![f.value.as_bytes_for_stored()]);
                    }
                }

                if f.point_dimension_count > 0 {
                    if let FieldValue::Point(packed) = &f.value {
                        let writer = points.entry(field_number).or_insert_with(|| {
                            BkdWriter::new(
                                f.point_dimension_count as usize,
                                f.point_num_bytes as usize,
                                crate::core::codec::points::DEFAULT_MAX_POINTS_IN_LEAF_NODE,
                            )
                            .expect("validated dims/bytes at Document::add_point")
                        });
                        writer.add(packed, doc_id)?;
                    }
                }
            }

            stored.add_document(doc_id, &stored_fields)?;
        }

        let mut info = SegmentInfo::new(segment_name.to_string(), max_doc, dir.clone(), segment_id, Codec::Ferro1);

        if !inverted.is_empty() {
            let mut postings = PostingsWriter::open(dir.as_ref(), segment_name, &segment_id)?;
            let mut terms = TermDictWriter::open(dir.as_ref(), segment_name, &segment_id)?;
            let mut field_numbers: Vec<i32> = inverted.keys().copied().collect();
            field_numbers.sort_unstable();
            for field_number in field_numbers {
                let info_for_field = self.field_infos.by_number(field_number).unwrap();
                let has_positions = info_for_field.index_options.has_positions();
                let by_term = inverted.remove(&field_number).unwrap();
                for (term, accum) in by_term {
                    postings.start_term(has_positions, false);
                    for (doc_id, freq, positions) in &accum.docs {
                        postings.start_doc(*doc_id, *freq)?;
                        for &p in positions {
                            postings.add_position(p, None)?;
                        }
                    }
                    let meta = postings.finish_term()?;
                    terms.push(&term, meta)?;
                }
            }
            postings.finish()?;
            let num_terms = terms.finish(dir.as_ref(), segment_name, &segment_id)?;
            info.set_num_terms(num_terms);
            info.add_file(format!("{segment_name}.{}", crate::core::codec::postings::DOC_EXTENSION));
            info.add_file(format!("{segment_name}.{}", crate::core::codec::postings::POS_EXTENSION));
            info.add_file(format!("{segment_name}.{}", crate::core::codec::postings::PAY_EXTENSION));
            info.add_file(format!("{segment_name}.{}", crate::core::codec::terms::TERM_DATA_EXTENSION));
            info.add_file(format!("{segment_name}.{}", crate::core::codec::terms::TERM_INDEX_EXTENSION));
            debug_assert!(num_terms > 0 || max_doc == 0);
        }

        stored.finish(dir.as_ref(), segment_name, &segment_id)?;
        info.add_file(format!("{segment_name}.{}", crate::core::codec::stored_fields::DATA_EXTENSION));
        info.add_file(format!("{segment_name}.{}", crate::core::codec::stored_fields::INDEX_EXTENSION));

        if !doc_values.is_empty() {
            doc_values.finish(dir.as_ref(), segment_name, &segment_id)?;
            info.add_file(format!("{segment_name}.{}", crate::core::codec::doc_values::DATA_EXTENSION));
            info.add_file(format!("{segment_name}.{}", crate::core::codec::doc_values::META_EXTENSION));
        }

        if !norms.is_empty() {
            norms.finish(dir.as_ref(), segment_name, &segment_id, max_doc)?;
            info.add_file(format!("{segment_name}.{}", crate::core::codec::norms::NORMS_EXTENSION));
        }

        for (field_number, writer) in points {
            let suffix = field_number.to_string();
            writer.finish(dir.as_ref(), segment_name, &suffix, &segment_id)?;
            info.add_file(format!(
                "{segment_name}_{suffix}.{}",
                crate::core::codec::points::POINTS_DATA_EXTENSION
            ));
            info.add_file(format!(
                "{segment_name}_{suffix}.{}",
                crate::core::codec::points::POINTS_INDEX_EXTENSION
            ));
        }

        self.field_infos.write(dir.as_ref(), segment_name, &segment_id)?;
        info.add_file(format!(
            "{segment_name}.{}",
            crate::core::codec::field_infos::FIELD_INFOS_EXTENSION
        ));

        info.write()?;
        info.add_file(format!("{segment_name}.si"));

        let mut file_set = info.files().clone();
        file_set.insert(format!("{segment_name}.si"));
        dir.sync(&file_set)?;

        Ok(info)
    }
}

impl Default for SegmentWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn prefixed_term(field_number: i32, term: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + term.len());
    out.extend_from_slice(&field_number.to_be_bytes());
    out.extend_from_slice(term);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;
    use std::sync::Arc;

    #[test]
    fn flush_writes_retrievable_stored_fields() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let mut writer = SegmentWriter::new();
        let mut doc = Document::new();
        doc.add_text("body", "the quick brown fox", true);
        writer.add_document(doc).unwrap();
        let mut doc2 = Document::new();
        doc2.add_text("body", "the lazy dog", true);
        writer.add_document(doc2).unwrap();

        let info = writer.flush(dir.clone(), "_0").unwrap();
        assert_eq!(info.max_doc, 2);
        assert!(info.files().contains("_0.fdt"));
        assert!(info.files().contains("_0.tim"));

        let reader = crate::core::codec::stored_fields::StoredFieldsReader::open(dir.as_ref(), "_0", &info.id).unwrap();
        let fields = reader.document(0).unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn flush_empty_segment_skips_postings_files() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let mut writer = SegmentWriter::new();
        writer
            .add_document({
                let mut d = Document::new();
                d.add_stored_only("id", FieldValue::I64(1));
                d
            })
            .unwrap();
        let info = writer.flush(dir, "_0").unwrap();
        assert!(!info.files().iter().any(|f| f.ends_with(".tim")));
    }
}
