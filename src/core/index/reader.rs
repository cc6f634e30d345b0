//! `SegmentReader`: the read-only view over one flushed segment's codec
//! files, per spec.md §4.7 ("Reopen... O(number of changed segments)").
//! Opens every codec reader for a segment once and hands out cheap
//! lookups; `IndexReader` (below) composes many of these plus the
//! live-docs mask into the top-level searchable view of an index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::codec::doc_values::DocValuesReader;
use crate::core::codec::field_infos::{DocValuesType, FieldInfo, FieldInfos};
use crate::core::codec::norms::NormsReader;
use crate::core::codec::points::BkdReader;
use crate::core::codec::postings::{PostingsIterator, PostingsReader, TermMetadata};
use crate::core::codec::stored_fields::StoredFieldsReader;
use crate::core::codec::terms::TermDictReader;
use crate::core::doc::FieldValue;
use crate::core::index::live_docs::{live_docs_file_name, read_live_docs};
use crate::core::index::segment::{SegmentCommitInfo, SegmentInfos};
use crate::core::store::DirectoryRc;
use crate::core::util::bit_set::FixedBitSet;
use crate::error::{Error, Result};

/// Read-only view over one segment: field schema, stored fields,
/// postings/terms (if any field is indexed), doc-values, norms, point
/// fields, and the live-docs mask (if any doc has been deleted).
pub struct SegmentReader {
    name: String,
    max_doc: i32,
    field_infos: FieldInfos,
    stored: StoredFieldsReader,
    terms: Option<TermDictReader>,
    postings: Option<PostingsReader>,
    doc_values: Option<DocValuesReader>,
    norms: Option<NormsReader>,
    points: HashMap<i32, BkdReader>,
    live_docs: Option<FixedBitSet>,
    del_count: i32,
}

impl SegmentReader {
    /// Opens every codec file named in `commit.info.files()`, skipping
    /// any optional file (postings/terms, doc-values, norms, per-field
    /// points) whose extension doesn't appear in the file set — segments
    /// with no indexed/doc-valued/point fields never wrote those files.
    pub fn open(dir: &DirectoryRc, commit: &SegmentCommitInfo) -> Result<Self> {
        let info = &commit.info;
        let name = info.name.clone();
        let id = info.id;

        let field_infos = FieldInfos::read(dir.as_ref(), &name, &id)?;
        let stored = StoredFieldsReader::open(dir.as_ref(), &name, &id)?;

        let has_postings = info.files().iter().any(|f| f.ends_with(".tim"));
        let (terms, postings) = if has_postings {
            let terms = TermDictReader::open(dir.as_ref(), &name, &id, info.num_terms())?;
            let postings = PostingsReader::open(dir.as_ref(), &name, &id)?;
            (Some(terms), Some(postings))
        } else {
            (None, None)
        };

        let has_doc_values = info.files().iter().any(|f| f.ends_with(".dvm"));
        let doc_values = if has_doc_values {
            Some(DocValuesReader::open(dir.as_ref(), &name, &id)?)
        } else {
            None
        };

        let has_norms = info.files().iter().any(|f| f.ends_with(".nrm"));
        let norms = if has_norms {
            Some(NormsReader::open(dir.as_ref(), &name, &id)?)
        } else {
            None
        };

        let mut points = HashMap::new();
        for fi in field_infos.iter() {
            if fi.point_dimension_count == 0 {
                continue;
            }
            let suffix = fi.number.to_string();
            let has_points = info.files().iter().any(|f| f.ends_with(".kdi") && f.starts_with(&format!("{name}_{suffix}.")));
            if has_points {
                let reader = BkdReader::open(dir.as_ref(), &name, &suffix, &id)?;
                points.insert(fi.number, reader);
            }
        }

        let del_count = commit.del_count();
        let live_docs = if del_count > 0 {
            let file_name = live_docs_file_name(&name, commit.del_gen());
            Some(read_live_docs(dir.as_ref(), &file_name, &id)?)
        } else {
            None
        };

        Ok(SegmentReader {
            name,
            max_doc: info.max_doc,
            field_infos,
            stored,
            terms,
            postings,
            doc_values,
            norms,
            points,
            live_docs,
            del_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_doc(&self) -> i32 {
        self.max_doc
    }

    pub fn num_docs(&self) -> i32 {
        self.max_doc - self.del_count
    }

    pub fn has_deletions(&self) -> bool {
        self.del_count > 0
    }

    pub fn is_live(&self, doc_id: i32) -> bool {
        match &self.live_docs {
            Some(bits) => bits.get(doc_id as usize),
            None => doc_id < self.max_doc,
        }
    }

    pub fn field_infos(&self) -> &FieldInfos {
        &self.field_infos
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.field_infos.by_name(name)
    }

    pub fn document(&self, doc_id: i32) -> Result<Vec<(i32, FieldValue)>> {
        self.stored.document(doc_id)
    }

    /// Looks up `term` in `field_name`'s slice of the segment's shared
    /// term dictionary, prefixing it with the field number the same way
    /// `SegmentWriter` did at flush time.
    pub fn term_metadata(&self, field_name: &str, term: &[u8]) -> Result<Option<TermMetadata>> {
        let Some(terms) = &self.terms else { return Ok(None) };
        let Some(info) = self.field_infos.by_name(field_name) else {
            return Ok(None);
        };
        let prefixed = prefixed_term(info.number, term);
        terms.get(&prefixed)
    }

    /// A postings iterator for `term` in `field_name`, or `None` if the
    /// term is absent or the segment has no postings at all.
    pub fn postings(&self, field_name: &str, term: &[u8], needs_positions: bool) -> Result<Option<PostingsIterator>> {
        let Some(meta) = self.term_metadata(field_name, term)? else {
            return Ok(None);
        };
        let postings = self.postings.as_ref().ok_or_else(|| {
            Error::CorruptIndex {
                file: self.name.clone(),
                detail: "term dictionary present but postings file missing".to_string(),
            }
        })?;
        Ok(Some(postings.postings(&meta, needs_positions)?))
    }

    /// Every term under `field_name` whose bytes start with `prefix`, in
    /// ascending order.
    pub fn terms_with_prefix(&self, field_name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, TermMetadata)>> {
        let Some(terms) = &self.terms else { return Ok(Vec::new()) };
        let Some(info) = self.field_infos.by_name(field_name) else {
            return Ok(Vec::new());
        };
        let prefixed_prefix = prefixed_term(info.number, prefix);
        let matches = terms.terms_with_prefix(&prefixed_prefix)?;
        Ok(matches
            .into_iter()
            .map(|(k, m)| (k[4..].to_vec(), m))
            .collect())
    }

    pub fn numeric_doc_value(&self, field_name: &str, doc_id: i32) -> Result<Option<i64>> {
        let Some(dv) = &self.doc_values else { return Ok(None) };
        let Some(info) = self.field_infos.by_name(field_name) else { return Ok(None) };
        if info.doc_values_type != DocValuesType::Numeric {
            return Ok(None);
        }
        dv.numeric(info.number, doc_id)
    }

    pub fn sorted_doc_value(&self, field_name: &str, doc_id: i32) -> Result<Option<Vec<u8>>> {
        let Some(dv) = &self.doc_values else { return Ok(None) };
        let Some(info) = self.field_infos.by_name(field_name) else { return Ok(None) };
        if info.doc_values_type != DocValuesType::Sorted {
            return Ok(None);
        }
        dv.sorted(info.number, doc_id)
    }

    pub fn binary_doc_value(&self, field_name: &str, doc_id: i32) -> Result<Option<Vec<u8>>> {
        let Some(dv) = &self.doc_values else { return Ok(None) };
        let Some(info) = self.field_infos.by_name(field_name) else { return Ok(None) };
        if info.doc_values_type != DocValuesType::Binary {
            return Ok(None);
        }
        dv.binary(info.number, doc_id)
    }

    pub fn sorted_numeric_doc_value(&self, field_name: &str, doc_id: i32) -> Result<Vec<i64>> {
        let Some(dv) = &self.doc_values else { return Ok(Vec::new()) };
        let Some(info) = self.field_infos.by_name(field_name) else { return Ok(Vec::new()) };
        if info.doc_values_type != DocValuesType::SortedNumeric {
            return Ok(Vec::new());
        }
        dv.sorted_numeric(info.number, doc_id)
    }

    pub fn sorted_set_doc_value(&self, field_name: &str, doc_id: i32) -> Result<Vec<Vec<u8>>> {
        let Some(dv) = &self.doc_values else { return Ok(Vec::new()) };
        let Some(info) = self.field_infos.by_name(field_name) else { return Ok(Vec::new()) };
        if info.doc_values_type != DocValuesType::SortedSet {
            return Ok(Vec::new());
        }
        dv.sorted_set(info.number, doc_id)
    }

    /// Quantized field length for `field_name`/`doc_id`, used by BM25's
    /// `dl` term (spec.md §4.8). 0 if the segment carries no norms for
    /// this field (not indexed, or the segment predates the field).
    pub fn norm(&self, field_name: &str, doc_id: i32) -> u8 {
        let Some(norms) = &self.norms else { return 0 };
        let Some(info) = self.field_infos.by_name(field_name) else { return 0 };
        norms.get(info.number, doc_id)
    }

    /// Average quantized field length across this segment, BM25's
    /// `avgdl` term. `1.0` if the field carries no norms.
    pub fn avg_field_length(&self, field_name: &str) -> f32 {
        let Some(norms) = &self.norms else { return 1.0 };
        let Some(info) = self.field_infos.by_name(field_name) else { return 1.0 };
        norms.average(info.number)
    }

    pub fn points(&self, field_name: &str) -> Option<&BkdReader> {
        let info = self.field_infos.by_name(field_name)?;
        self.points.get(&info.number)
    }
}

fn prefixed_term(field_number: i32, term: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + term.len());
    out.extend_from_slice(&field_number.to_be_bytes());
    out.extend_from_slice(term);
    out
}

/// The top-level searchable view of an index: one `SegmentReader` per
/// live segment as of the commit generation it was opened from, per
/// spec.md §4.7/§6 ("IndexReader.open(dir)... reader.reopen()").
pub struct IndexReader {
    dir: DirectoryRc,
    generation: i64,
    segments: Vec<Arc<SegmentReader>>,
}

impl IndexReader {
    pub fn open(dir: DirectoryRc) -> Result<Self> {
        let generation = SegmentInfos::find_latest_generation(dir.as_ref())?.ok_or(Error::IndexNotFound)?;
        Self::open_generation(dir, generation)
    }

    fn open_generation(dir: DirectoryRc, generation: i64) -> Result<Self> {
        let infos = SegmentInfos::read(&dir, generation)?;
        let segments = infos
            .segments
            .iter()
            .map(|sci| SegmentReader::open(&dir, sci).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(IndexReader { dir, generation, segments })
    }

    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    pub fn num_docs(&self) -> i32 {
        self.segments.iter().map(|s| s.num_docs()).sum()
    }

    pub fn max_doc(&self) -> i32 {
        self.segments.iter().map(|s| s.max_doc()).sum()
    }

    /// Reopens against the directory's current latest generation. Per
    /// spec.md §4.7, this is O(changed segments) in spirit: segments
    /// whose name already appears with an unchanged deletion generation
    /// in both the old and new manifest are carried over instead of
    /// re-opened from disk.
    pub fn reopen(&self) -> Result<IndexReader> {
        let latest = SegmentInfos::find_latest_generation(self.dir.as_ref())?.ok_or(Error::IndexNotFound)?;
        if latest == self.generation {
            return Ok(IndexReader {
                dir: self.dir.clone(),
                generation: self.generation,
                segments: self.segments.clone(),
            });
        }

        let infos = SegmentInfos::read(&self.dir, latest)?;
        let mut by_name: HashMap<&str, &Arc<SegmentReader>> = HashMap::new();
        for sr in &self.segments {
            by_name.insert(sr.name(), sr);
        }

        let mut segments = Vec::with_capacity(infos.segments.len());
        for sci in &infos.segments {
            let reused = by_name
                .get(sci.info.name.as_str())
                .filter(|sr| !sr.has_deletions() == (sci.del_count() == 0) && sr.max_doc() == sci.info.max_doc);
            match reused {
                Some(sr) if sci.del_count() == 0 => segments.push((*sr).clone()),
                _ => segments.push(Arc::new(SegmentReader::open(&self.dir, sci)?)),
            }
        }

        Ok(IndexReader {
            dir: self.dir.clone(),
            generation: latest,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::doc::Document;
    use crate::core::index::segment::{SegmentCommitInfo, SegmentInfos};
    use crate::core::index::segment_writer::SegmentWriter;
    use crate::core::search::iterator::DocIdSetIterator;
    use crate::core::store::RamDirectory;

    fn build_one_segment_index(dir: DirectoryRc) {
        let mut writer = SegmentWriter::new();
        let mut doc = Document::new();
        doc.add_text("body", "the quick brown fox jumps", true);
        doc.add_numeric_doc_value("year", 2024);
        writer.add_document(doc).unwrap();

        let mut doc2 = Document::new();
        doc2.add_text("body", "the lazy dog sleeps", true);
        doc2.add_numeric_doc_value("year", 2023);
        writer.add_document(doc2).unwrap();

        let info = writer.flush(dir.clone(), "_0").unwrap();
        let mut infos = SegmentInfos::new();
        infos.generation = 1;
        infos.segments.push(SegmentCommitInfo::new(info, 0, 0));
        infos.commit(&dir).unwrap();
    }

    #[test]
    fn open_reads_back_postings_and_doc_values() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        build_one_segment_index(dir.clone());

        let reader = IndexReader::open(dir).unwrap();
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(reader.segments().len(), 1);

        let seg = &reader.segments()[0];
        let postings = seg.postings("body", b"the", false).unwrap().unwrap();
        assert_eq!(
            postings.cost(),
            2,
            "\"the\" appears in both documents"
        );

        assert_eq!(seg.numeric_doc_value("year", 0).unwrap(), Some(2024));
        assert_eq!(seg.numeric_doc_value("year", 1).unwrap(), Some(2023));

        let fields = seg.document(0).unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn reopen_without_new_commit_returns_same_generation() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        build_one_segment_index(dir.clone());

        let reader = IndexReader::open(dir).unwrap();
        let reopened = reader.reopen().unwrap();
        assert_eq!(reopened.num_docs(), reader.num_docs());
    }
}
