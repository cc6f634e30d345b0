//! `FieldInfo`/`FieldInfos`: the per-segment field-name → small-integer
//! interning table plus each field's fixed indexing options, per spec.md
//! §3 ("Field-name is interned per segment to a small integer") and
//! §4.7-adjacent `.fnm` manifest file.

use std::collections::HashMap;

use crate::core::store::{codec_util, Directory, IOContext, IndexInput, IndexOutput};
use crate::error::{Error, Result};

pub const FIELD_INFOS_EXTENSION: &str = "fnm";
pub const FIELD_INFOS_CODEC: &str = "FerroFieldInfos";
pub const FIELD_INFOS_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOptions {
    None,
    Docs,
    DocsFreqs,
    DocsFreqsPositions,
    DocsFreqsPositionsOffsets,
}

impl IndexOptions {
    fn to_byte(self) -> u8 {
        match self {
            IndexOptions::None => 0,
            IndexOptions::Docs => 1,
            IndexOptions::DocsFreqs => 2,
            IndexOptions::DocsFreqsPositions => 3,
            IndexOptions::DocsFreqsPositionsOffsets => 4,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => IndexOptions::None,
            1 => IndexOptions::Docs,
            2 => IndexOptions::DocsFreqs,
            3 => IndexOptions::DocsFreqsPositions,
            4 => IndexOptions::DocsFreqsPositionsOffsets,
            _ => return Err(Error::corrupt("<fnm>", "bad index options byte")),
        })
    }

    pub fn has_positions(self) -> bool {
        matches!(
            self,
            IndexOptions::DocsFreqsPositions | IndexOptions::DocsFreqsPositionsOffsets
        )
    }

    pub fn has_freqs(self) -> bool {
        !matches!(self, IndexOptions::None | IndexOptions::Docs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocValuesType {
    None,
    Numeric,
    Binary,
    Sorted,
    SortedNumeric,
    SortedSet,
}

impl DocValuesType {
    fn to_byte(self) -> u8 {
        match self {
            DocValuesType::None => 0,
            DocValuesType::Numeric => 1,
            DocValuesType::Binary => 2,
            DocValuesType::Sorted => 3,
            DocValuesType::SortedNumeric => 4,
            DocValuesType::SortedSet => 5,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => DocValuesType::None,
            1 => DocValuesType::Numeric,
            2 => DocValuesType::Binary,
            3 => DocValuesType::Sorted,
            4 => DocValuesType::SortedNumeric,
            5 => DocValuesType::SortedSet,
            _ => return Err(Error::corrupt("<fnm>", "bad doc values type byte")),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub number: i32,
    pub index_options: IndexOptions,
    pub has_vectors: bool,
    pub doc_values_type: DocValuesType,
    pub point_dimension_count: u8,
    pub point_num_bytes: u8,
}

/// The field-name → number interning table for one segment, plus a
/// process-wide allocator (`FieldNumbers` in the teacher) so that the same
/// field name gets the same number across segments sharing a writer —
/// mirrors `core::index::{FieldNumbers, FieldNumbersRef}` referenced from
/// `thread_doc_writer.rs`.
#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    by_number: Vec<FieldInfo>,
    by_name: HashMap<String, usize>,
}

impl FieldInfos {
    pub fn new() -> Self {
        FieldInfos::default()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&i| &self.by_number[i])
    }

    pub fn by_number(&self, number: i32) -> Option<&FieldInfo> {
        self.by_number.get(number as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.iter()
    }

    pub fn add(&mut self, info: FieldInfo) -> i32 {
        if let Some(&idx) = self.by_name.get(&info.name) {
            return self.by_number[idx].number;
        }
        let number = self.by_number.len() as i32;
        let mut info = info;
        info.number = number;
        self.by_name.insert(info.name.clone(), self.by_number.len());
        self.by_number.push(info);
        number
    }

    pub fn write(&self, dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<()> {
        let file_name = format!("{segment_name}.{FIELD_INFOS_EXTENSION}");
        let mut out = dir.create_output(&file_name, &IOContext::Flush)?;
        codec_util::write_index_header(
            out.as_mut(),
            FIELD_INFOS_CODEC,
            FIELD_INFOS_VERSION,
            segment_id,
            "",
        )?;
        out.write_vint(self.by_number.len() as i32)?;
        for info in &self.by_number {
            out.write_string(&info.name)?;
            out.write_vint(info.number)?;
            out.write_byte(info.index_options.to_byte())?;
            out.write_byte(info.has_vectors as u8)?;
            out.write_byte(info.doc_values_type.to_byte())?;
            out.write_byte(info.point_dimension_count)?;
            out.write_byte(info.point_num_bytes)?;
        }
        codec_util::write_footer(out.as_mut())
    }

    pub fn read(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<FieldInfos> {
        let file_name = format!("{segment_name}.{FIELD_INFOS_EXTENSION}");
        let mut input = dir.open_checksum_input(&file_name, &IOContext::Read(true))?;
        codec_util::check_index_header(
            input.as_mut(),
            FIELD_INFOS_CODEC,
            FIELD_INFOS_VERSION,
            FIELD_INFOS_VERSION,
            segment_id,
            "",
        )?;
        let count = input.as_mut().read_vint()?;
        let mut infos = FieldInfos::new();
        for _ in 0..count {
            let name = input.as_mut().read_string()?;
            let number = input.as_mut().read_vint()?;
            let index_options = IndexOptions::from_byte(input.as_mut().read_byte()?)?;
            let has_vectors = input.as_mut().read_byte()? != 0;
            let doc_values_type = DocValuesType::from_byte(input.as_mut().read_byte()?)?;
            let point_dimension_count = input.as_mut().read_byte()?;
            let point_num_bytes = input.as_mut().read_byte()?;
            infos.by_name.insert(name.clone(), infos.by_number.len());
            infos.by_number.push(FieldInfo {
                name,
                number,
                index_options,
                has_vectors,
                doc_values_type,
                point_dimension_count,
                point_num_bytes,
            });
        }
        codec_util::retrieve_checksum(input.as_mut())?;
        Ok(infos)
    }
}
