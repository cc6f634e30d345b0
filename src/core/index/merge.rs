//! Segment merging, per spec.md §4.7 ("Merge... picks segments, merges
//! their postings/stored fields/doc-values/points into one new segment,
//! drops docs the live-docs bitset marks dead"). Grounded on the same
//! codec writer/reader contracts `segment_writer.rs`/`reader.rs` already
//! use: `merge_segments` re-drives every writer exactly the way a flush
//! does, except documents come from already-open `SegmentReader`s instead
//! of an in-memory buffer, and dead docs (per each source's live-docs
//! bitset) are dropped rather than copied forward.
//!
//! Field numbering is local to each segment (`FieldInfos::add` assigns
//! numbers in first-seen order), so merging N segments whose `FieldInfos`
//! each start from 0 requires a merged numbering. This is resolved by
//! rebuilding `FieldInfos` fresh from the union of field names (first
//! occurrence wins for the options), and looking every per-source field
//! number up again by name — the same name-keyed accessors
//! `SegmentReader` already exposes for querying, so no separate remap
//! table is needed anywhere outside this file. Fields are assumed to
//! carry the same `IndexOptions`/`DocValuesType`/point shape across every
//! segment that defines them, since a single `IndexWriter`'s schema does
//! not change between flushes.

use std::collections::BTreeMap;

use crate::core::codec::doc_values::DocValuesWriter;
use crate::core::codec::field_infos::{DocValuesType, FieldInfo, FieldInfos};
use crate::core::codec::norms::NormsWriter;
use crate::core::codec::points::{BkdWriter, IntersectVisitor, Relation, DEFAULT_MAX_POINTS_IN_LEAF_NODE};
use crate::core::codec::postings::PostingsWriter;
use crate::core::codec::stored_fields::{StoredFieldsWriter, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_DOCS_PER_CHUNK};
use crate::core::codec::terms::TermDictWriter;
use crate::core::codec::Codec;
use crate::core::doc::FieldValue;
use crate::core::index::reader::SegmentReader;
use crate::core::index::segment::{SegmentId, SegmentInfo};
use crate::core::search::iterator::DocIdSetIterator;
use crate::core::store::{Directory, DirectoryRc};
use crate::core::util::{string_util, NO_MORE_DOCS};
use crate::error::Result;

/// Old docId -> new docId within the merged segment, `-1` for a dropped
/// (deleted) doc. One per source segment, built before anything else is
/// copied so every subsequent pass can remap as it goes.
struct DocMap {
    old_to_new: Vec<i32>,
}

fn build_doc_maps(sources: &[SegmentReader]) -> (Vec<DocMap>, i32) {
    let mut maps = Vec::with_capacity(sources.len());
    let mut next = 0i32;
    for src in sources {
        let mut old_to_new = vec![-1i32; src.max_doc() as usize];
        for old in 0..src.max_doc() {
            if src.is_live(old) {
                old_to_new[old as usize] = next;
                next += 1;
            }
        }
        maps.push(DocMap { old_to_new });
    }
    (maps, next)
}

/// Unions field names across every source, in source/field order, so the
/// merged segment gets one consistent number per name. The first segment
/// to define a name decides its `IndexOptions`/doc-values type/point
/// shape for the merged segment.
fn build_merged_field_infos(sources: &[SegmentReader]) -> FieldInfos {
    let mut merged = FieldInfos::new();
    for src in sources {
        for info in src.field_infos().iter() {
            if merged.by_name(&info.name).is_none() {
                merged.add(FieldInfo {
                    name: info.name.clone(),
                    number: 0,
                    index_options: info.index_options,
                    has_vectors: info.has_vectors,
                    doc_values_type: info.doc_values_type,
                    point_dimension_count: info.point_dimension_count,
                    point_num_bytes: info.point_num_bytes,
                });
            }
        }
    }
    merged
}

struct PointCollector<'a> {
    writer: &'a mut BkdWriter,
    map: &'a DocMap,
    error: Option<crate::error::Error>,
}

impl IntersectVisitor for PointCollector<'_> {
    fn visit(&mut self, _doc_id: i32) {}

    fn visit_with_value(&mut self, doc_id: i32, packed_value: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let new_doc = self.map.old_to_new[doc_id as usize];
        if new_doc < 0 {
            return;
        }
        if let Err(e) = self.writer.add(packed_value, new_doc) {
            self.error = Some(e);
        }
    }

    fn compare(&self, _min_packed_value: &[u8], _max_packed_value: &[u8]) -> Relation {
        // Forces a full leaf-by-leaf traversal: a merge has to visit every
        // point regardless of where it falls, unlike a range query.
        Relation::Crosses
    }
}

/// Merges `sources` into one new segment named `segment_name`, writing it
/// with `dir`. Deleted docs (per each source's live-docs bitset) are
/// dropped; everything else is copied field-by-field through the same
/// writer APIs `SegmentWriter::flush` uses.
pub fn merge_segments(dir: DirectoryRc, segment_name: &str, sources: &[SegmentReader]) -> Result<SegmentInfo> {
    let segment_id: SegmentId = string_util::random_id();
    let (doc_maps, max_doc) = build_doc_maps(sources);
    let field_infos = build_merged_field_infos(sources);

    let mut info = SegmentInfo::new(segment_name.to_string(), max_doc, dir.clone(), segment_id, Codec::Ferro1);

    let mut stored = StoredFieldsWriter::open(
        dir.as_ref(),
        segment_name,
        &segment_id,
        DEFAULT_CHUNK_SIZE,
        DEFAULT_MAX_DOCS_PER_CHUNK,
    )?;
    let mut doc_values = DocValuesWriter::new();
    let mut norms = NormsWriter::new();

    for (src_idx, src) in sources.iter().enumerate() {
        let map = &doc_maps[src_idx];
        for old_doc in 0..src.max_doc() {
            let new_doc = map.old_to_new[old_doc as usize];
            if new_doc < 0 {
                continue;
            }

            let fields = src.document(old_doc)?;
            let mut stored_fields: Vec<(i32, FieldValue)> = Vec::with_capacity(fields.len());
            for (old_number, value) in fields {
                let Some(src_info) = src.field_infos().by_number(old_number) else { continue };
                let Some(merged_info) = field_infos.by_name(&src_info.name) else { continue };
                stored_fields.push((merged_info.number, value));
            }
            let refs: Vec<(i32, &FieldValue)> = stored_fields.iter().map(|(n, v)| (*n, v)).collect();
            stored.add_document(new_doc, &refs)?;

            for merged_info in field_infos.iter() {
                if src.field_infos().by_name(&merged_info.name).is_none() {
                    continue;
                }
                let length = src.norm(&merged_info.name, old_doc);
                if length > 0 {
                    norms.add(merged_info.number, new_doc, length as i32);
                }

                match merged_info.doc_values_type {
                    DocValuesType::None => {}
                    DocValuesType::Numeric => {
                        if let Some(v) = src.numeric_doc_value(&merged_info.name, old_doc)? {
                            doc_values.add_numeric(merged_info.number, new_doc, v);
                        }
                    }
                    DocValuesType::Binary => {
                        if let Some(v) = src.binary_doc_value(&merged_info.name, old_doc)? {
                            doc_values.add_binary(merged_info.number, new_doc, v);
                        }
                    }
                    DocValuesType::Sorted => {
                        if let Some(v) = src.sorted_doc_value(&merged_info.name, old_doc)? {
                            doc_values.add_sorted(merged_info.number, new_doc, v);
                        }
                    }
                    DocValuesType::SortedNumeric => {
                        let v = src.sorted_numeric_doc_value(&merged_info.name, old_doc)?;
                        if !v.is_empty() {
                            doc_values.add_sorted_numeric(merged_info.number, new_doc, v);
                        }
                    }
                    DocValuesType::SortedSet => {
                        let v = src.sorted_set_doc_value(&merged_info.name, old_doc)?;
                        if !v.is_empty() {
                            doc_values.add_sorted_set(merged_info.number, new_doc, v);
                        }
                    }
                }
            }
        }
    }

    let has_any_terms = field_infos
        .iter()
        .any(|f| f.index_options != crate::core::codec::field_infos::IndexOptions::None);

    if has_any_terms {
        let mut postings = PostingsWriter::open(dir.as_ref(), segment_name, &segment_id)?;
        let mut terms = TermDictWriter::open(dir.as_ref(), segment_name, &segment_id)?;

        for merged_info in field_infos.iter() {
            if merged_info.index_options == crate::core::codec::field_infos::IndexOptions::None {
                continue;
            }
            let has_positions = merged_info.index_options.has_positions();

            let mut term_sources: BTreeMap<Vec<u8>, Vec<usize>> = BTreeMap::new();
            for (src_idx, src) in sources.iter().enumerate() {
                if src.field(&merged_info.name).is_none() {
                    continue;
                }
                for (term, _meta) in src.terms_with_prefix(&merged_info.name, &[])? {
                    term_sources.entry(term).or_default().push(src_idx);
                }
            }

            for (term, src_idxs) in term_sources {
                postings.start_term(has_positions, false);
                for src_idx in src_idxs {
                    let src = &sources[src_idx];
                    let map = &doc_maps[src_idx];
                    let Some(mut iter) = src.postings(&merged_info.name, &term, has_positions)? else {
                        continue;
                    };
                    let mut doc = iter.next_doc();
                    while doc != NO_MORE_DOCS {
                        let new_doc = map.old_to_new[doc as usize];
                        if new_doc >= 0 {
                            let freq = iter.freq();
                            postings.start_doc(new_doc, freq)?;
                            if has_positions {
                                for p in iter.positions()? {
                                    postings.add_position(p, None)?;
                                }
                            }
                        } else if has_positions {
                            // Still consume this doc's positions so the
                            // shared block cursor stays in sync for the
                            // next live document.
                            let _ = iter.positions()?;
                        }
                        doc = iter.next_doc();
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

    for merged_info in field_infos.iter() {
        if merged_info.point_dimension_count == 0 {
            continue;
        }
        let mut writer = BkdWriter::new(
            merged_info.point_dimension_count as usize,
            merged_info.point_num_bytes as usize,
            DEFAULT_MAX_POINTS_IN_LEAF_NODE,
        )?;
        for (src_idx, src) in sources.iter().enumerate() {
            let Some(reader) = src.points(&merged_info.name) else { continue };
            let map = &doc_maps[src_idx];
            let mut collector = PointCollector { writer: &mut writer, map, error: None };
            reader.intersect(&mut collector)?;
            if let Some(e) = collector.error {
                return Err(e);
            }
        }
        if !writer.is_empty() {
            let suffix = merged_info.number.to_string();
            writer.finish(dir.as_ref(), segment_name, &suffix, &segment_id)?;
            info.add_file(format!("{segment_name}_{suffix}.{}", crate::core::codec::points::POINTS_DATA_EXTENSION));
            info.add_file(format!("{segment_name}_{suffix}.{}", crate::core::codec::points::POINTS_INDEX_EXTENSION));
        }
    }

    field_infos.write(dir.as_ref(), segment_name, &segment_id)?;
    info.add_file(format!("{segment_name}.{}", crate::core::codec::field_infos::FIELD_INFOS_EXTENSION));

    info.write()?;
    info.add_file(format!("{segment_name}.si"));

    let mut file_set = info.files().clone();
    file_set.insert(format!("{segment_name}.si"));
    dir.sync(&file_set)?;

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::doc::Document;
    use crate::core::index::segment::SegmentCommitInfo;
    use crate::core::index::segment_writer::SegmentWriter;
    use crate::core::store::RamDirectory;
    use std::sync::Arc;

    fn flush_one(dir: &DirectoryRc, name: &str, texts: &[&str]) -> SegmentInfo {
        let mut writer = SegmentWriter::new();
        for t in texts {
            let mut doc = Document::new();
            doc.add_text("body", t, true);
            writer.add_document(doc).unwrap();
        }
        writer.flush(dir.clone(), name).unwrap()
    }

    #[test]
    fn merge_combines_postings_and_stored_fields_across_segments() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let info0 = flush_one(&dir, "_0", &["the quick fox", "the lazy dog"]);
        let info1 = flush_one(&dir, "_1", &["the brown cat"]);

        let commit0 = SegmentCommitInfo::new(info0, 0, 0);
        let commit1 = SegmentCommitInfo::new(info1, 0, 0);
        let reader0 = SegmentReader::open(&dir, &commit0).unwrap();
        let reader1 = SegmentReader::open(&dir, &commit1).unwrap();

        let merged = merge_segments(dir.clone(), "_2", &[reader0, reader1]).unwrap();
        assert_eq!(merged.max_doc, 3);

        let commit2 = SegmentCommitInfo::new(merged, 0, 0);
        let reader2 = SegmentReader::open(&dir, &commit2).unwrap();
        assert_eq!(reader2.num_docs(), 3);

        let mut iter = reader2.postings("body", b"the", false).unwrap().unwrap();
        let mut hits = 0;
        while iter.next_doc() != NO_MORE_DOCS {
            hits += 1;
        }
        assert_eq!(hits, 3);

        assert_eq!(reader2.document(0).unwrap().len(), 1);
        assert_eq!(reader2.document(2).unwrap().len(), 1);
    }

    #[test]
    fn merge_drops_deleted_docs_and_remaps_ids() {
        use crate::core::index::live_docs::write_live_docs;
        use crate::core::util::bit_set::FixedBitSet;

        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let info0 = flush_one(&dir, "_0", &["alpha", "beta", "gamma"]);
        let mut live = FixedBitSet::new(3);
        live.set(0);
        live.set(2);
        write_live_docs(dir.as_ref(), "_0", &info0.id, 1, &live).unwrap();

        let commit0 = SegmentCommitInfo::new(info0, 1, 1);
        let reader0 = SegmentReader::open(&dir, &commit0).unwrap();
        assert_eq!(reader0.num_docs(), 2);

        let merged = merge_segments(dir.clone(), "_1", &[reader0]).unwrap();
        assert_eq!(merged.max_doc, 2);

        let commit1 = SegmentCommitInfo::new(merged, 0, 0);
        let reader1 = SegmentReader::open(&dir, &commit1).unwrap();
        let doc0 = reader1.document(0).unwrap();
        let doc1 = reader1.document(1).unwrap();
        assert_eq!(doc0.len(), 1);
        assert_eq!(doc1.len(), 1);
    }
}
