//! Compound file format: packs a segment's small auxiliary files into one
//! `.cfs` data blob plus a `.cfe` entries table, per spec.md §6's mention
//! of `use_compound_file` in the configuration surface. Grounded on the
//! teacher's `core::codec::lucene50::compound::{Lucene50CompoundFormat,
//! Lucene50CompoundReader}`, modernized from `error_chain` to
//! `thiserror`-backed errors and from `Box<Trait>` to `Box<dyn Trait>`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::core::index::segment::{segment_file_name, strip_segment_name, SegmentInfo};
use crate::core::store::{
    codec_util, Directory, DirectoryRc, IOContext, IndexInput, IndexOutput, Lock, IO_CONTEXT_READONCE,
};
use crate::error::{Error, Result};

pub const DATA_EXTENSION: &str = "cfs";
pub const ENTRIES_EXTENSION: &str = "cfe";
pub const DATA_CODEC: &str = "FerroCompoundData";
pub const ENTRY_CODEC: &str = "FerroCompoundEntries";
pub const VERSION_CURRENT: i32 = 1;

/// Packs every file named in `si.files()` into `<name>.cfs`/`<name>.cfe`,
/// after the per-file codec footers already exist. Not currently invoked
/// by `IndexWriter::flush_pending` — see `IndexWriterConfig::use_compound_file`'s
/// doc comment and DESIGN.md for why.
pub fn write_compound_file(dir: &dyn Directory, si: &SegmentInfo, ctx: &IOContext) -> Result<()> {
    let data_file = segment_file_name(&si.name, "", DATA_EXTENSION);
    let entries_file = segment_file_name(&si.name, "", ENTRIES_EXTENSION);

    let mut data = dir.create_output(&data_file, ctx)?;
    let mut entries = dir.create_output(&entries_file, ctx)?;

    codec_util::write_index_header(data.as_mut(), DATA_CODEC, VERSION_CURRENT, &si.id, "")?;
    codec_util::write_index_header(entries.as_mut(), ENTRY_CODEC, VERSION_CURRENT, &si.id, "")?;

    let mut names: Vec<&String> = si.files().iter().collect();
    names.sort();

    entries.write_vint(names.len() as i32)?;
    for file in names {
        let start_offset = data.file_pointer();

        let mut input = dir.open_checksum_input(file, &IOContext::Read(true))?;

        codec_util::verify_and_copy_index_header(input.as_data_input(), data.as_mut(), &si.id)?;

        let num_bytes_to_copy =
            input.len() as i64 - codec_util::footer_length() as i64 - input.file_pointer();
        data.copy_bytes(input.as_data_input(), num_bytes_to_copy as usize)?;

        let checksum = codec_util::check_footer(input.as_mut())?;
        data.write_int(codec_util::FOOTER_MAGIC)?;
        data.write_int(0)?;
        data.write_long(checksum)?;

        let end_offset = data.file_pointer();

        entries.write_string(strip_segment_name(file))?;
        entries.write_long(start_offset)?;
        entries.write_long(end_offset - start_offset)?;
    }

    codec_util::write_footer(data.as_mut())?;
    codec_util::write_footer(entries.as_mut())
}

/// Opens a `.cfs`/`.cfe` pair as a read-only `Directory`, so the rest of
/// the codec layer can keep opening files by name without knowing they
/// live inside one compound blob.
pub fn open_compound_reader(dir: DirectoryRc, si: &SegmentInfo, ctx: &IOContext) -> Result<DirectoryRc> {
    Ok(Arc::new(CompoundReader::new(dir, si, ctx)?))
}

#[derive(Debug, Clone, Copy)]
struct FileEntry {
    offset: i64,
    length: i64,
}

pub struct CompoundReader {
    directory: DirectoryRc,
    name: String,
    entries: HashMap<String, FileEntry>,
    input: Box<dyn IndexInput>,
}

impl CompoundReader {
    pub fn new(directory: DirectoryRc, si: &SegmentInfo, context: &IOContext) -> Result<Self> {
        let data_file_name = segment_file_name(&si.name, "", DATA_EXTENSION);
        let entries_file_name = segment_file_name(&si.name, "", ENTRIES_EXTENSION);
        let entries = Self::read_entries(&si.id, &directory, &entries_file_name)?;

        let mut expected_length = codec_util::index_header_length(DATA_CODEC, "") as i64;
        for e in entries.values() {
            expected_length += e.length;
        }
        expected_length += codec_util::footer_length() as i64;

        let mut input = directory.open_input(&data_file_name, context)?;
        codec_util::check_index_header(
            input.as_mut(),
            DATA_CODEC,
            VERSION_CURRENT,
            VERSION_CURRENT,
            &si.id,
            "",
        )?;
        if input.len() as i64 != expected_length {
            return Err(Error::corrupt(
                &data_file_name,
                format!("length should be {expected_length} bytes, but is {} instead", input.len()),
            ));
        }

        Ok(CompoundReader {
            directory,
            name: si.name.clone(),
            entries,
            input,
        })
    }

    fn read_entries(
        segment_id: &[u8],
        directory: &DirectoryRc,
        entries_file_name: &str,
    ) -> Result<HashMap<String, FileEntry>> {
        let mut entries_stream = directory.open_checksum_input(entries_file_name, &IO_CONTEXT_READONCE)?;
        codec_util::check_index_header(
            entries_stream.as_mut(),
            ENTRY_CODEC,
            VERSION_CURRENT,
            VERSION_CURRENT,
            segment_id,
            "",
        )?;
        let num_entries = entries_stream.as_mut().read_vint()?;
        let mut mappings = HashMap::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let id = entries_stream.as_mut().read_string()?;
            let offset = entries_stream.as_mut().read_long()?;
            let length = entries_stream.as_mut().read_long()?;
            if mappings.insert(id.clone(), FileEntry { offset, length }).is_some() {
                return Err(Error::corrupt(entries_file_name, format!("duplicate cfs entry id={id}")));
            }
        }
        codec_util::retrieve_checksum(entries_stream.as_mut())?;
        Ok(mappings)
    }
}

impl Directory for CompoundReader {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.entries.keys().map(|n| format!("{}{n}", self.name)).collect();
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        self.entries
            .get(strip_segment_name(name))
            .map(|e| e.length)
            .ok_or_else(|| Error::corrupt(name, "file not found in compound file"))
    }

    fn create_output(&self, _name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }

    fn create_temp_output(&self, _prefix: &str, _suffix: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let id = strip_segment_name(name);
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::corrupt(name, format!("no sub-file with id {id} found in compound file")))?;
        self.input.slice(name, entry.offset, entry.length)
    }

    fn open_checksum_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn crate::core::store::ChecksumIndexInput>> {
        // compound members were already checksum-verified when packed; callers
        // that need a checksum wrapper here are re-verifying a sub-slice, which
        // this reader does not support. None of this codec's own readers call
        // open_checksum_input through a compound reader.
        let _ = (name, ctx);
        Err(Error::UnsupportedOperation(
            "CompoundReader does not support re-verified checksum reads".into(),
        ))
    }

    fn delete_file(&self, _name: &str) -> Result<()> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }

    fn rename(&self, _source: &str, _dest: &str) -> Result<()> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }

    fn sync(&self, _names: &HashSet<String>) -> Result<()> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, _name: &str) -> Result<Box<dyn Lock>> {
        Err(Error::UnsupportedOperation("CompoundReader is read-only".into()))
    }
}

impl fmt::Display for CompoundReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CompoundReader({})", self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::Codec;
    use crate::core::store::{IOContext, RamDirectory};

    fn write_plain_file(dir: &dyn Directory, name: &str, id: &[u8; 16], body: &[u8]) {
        let mut out = dir.create_output(name, &IOContext::Flush).unwrap();
        codec_util::write_index_header(out.as_mut(), "Plain", 1, id, "").unwrap();
        out.write_bytes(body).unwrap();
        codec_util::write_footer(out.as_mut()).unwrap();
    }

    #[test]
    fn pack_and_read_back_round_trips() {
        let dir: DirectoryRc = Arc::new(RamDirectory::new());
        let id = [7u8; 16];
        write_plain_file(dir.as_ref(), "_0.abc", &id, b"hello");
        write_plain_file(dir.as_ref(), "_0.xyz", &id, b"world!!");

        let mut si = SegmentInfo::new("_0".to_string(), 1, dir.clone(), id, Codec::Ferro1);
        si.add_file("_0.abc".to_string());
        si.add_file("_0.xyz".to_string());

        write_compound_file(dir.as_ref(), &si, &IOContext::Flush).unwrap();

        let reader = open_compound_reader(dir.clone(), &si, &IOContext::Read(false)).unwrap();
        let mut input = reader.open_input("_0.abc", &IOContext::Read(false)).unwrap();
        let mut buf = [0u8; 5];
        codec_util::check_index_header(input.as_mut(), "Plain", 1, 1, &id, "").unwrap();
        input.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
