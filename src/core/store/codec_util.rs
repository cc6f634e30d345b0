//! Codec-level file framing: header (magic, codec name, version, segment
//! id, suffix) and footer (magic, padding, checksum), per spec.md §6.
//!
//! Function names and call shape (`write_index_header`,
//! `verify_and_copy_index_header`, `footer_length`, `check_footer`,
//! `write_footer`, `index_header_length`, `check_index_header`,
//! `retrieve_checksum`, `FOOTER_MAGIC`) are copied from their use sites in
//! the teacher's `core/codec/lucene50/compound.rs`.

use super::{ChecksumIndexInput, IndexInput, IndexOutput};
use crate::error::{Error, Result};

pub const CODEC_MAGIC: i32 = 0x3fd7_6c17_u32 as i32;
pub const FOOTER_MAGIC: i32 = 0xc028_93e8_u32 as i32;

pub fn write_index_header(
    out: &mut dyn IndexOutput,
    codec: &str,
    version: i32,
    segment_id: &[u8],
    suffix: &str,
) -> Result<()> {
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)?;
    if segment_id.len() != 16 {
        return Err(Error::IllegalArgument(format!(
            "segment id must be 16 bytes, got {}",
            segment_id.len()
        )));
    }
    out.write_bytes(segment_id)?;
    out.write_string(suffix)
}

/// Length in bytes of a header written with the given codec name/suffix —
/// used to sanity-check expected compound-file length in the teacher's
/// `Lucene50CompoundReader::new`.
pub fn index_header_length(codec: &str, suffix: &str) -> usize {
    4 + (4 + codec.len()) + 4 + 16 + (4 + suffix.len())
}

pub fn check_index_header(
    input: &mut dyn IndexInput,
    codec: &str,
    min_version: i32,
    max_version: i32,
    expected_id: &[u8],
    expected_suffix: &str,
) -> Result<i32> {
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        return Err(Error::corrupt(
            "<input>",
            format!("codec header mismatch: magic={magic:#x}"),
        ));
    }
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        return Err(Error::corrupt(
            "<input>",
            format!("codec mismatch: expected {codec}, got {actual_codec}"),
        ));
    }
    let version = input.read_int()?;
    if version < min_version || version > max_version {
        return Err(Error::corrupt(
            "<input>",
            format!("version out of range: {version} not in [{min_version},{max_version}]"),
        ));
    }
    let mut id = [0u8; 16];
    input.read_bytes(&mut id)?;
    if !expected_id.is_empty() && id != expected_id[..16.min(expected_id.len())] {
        return Err(Error::corrupt("<input>", "segment id mismatch"));
    }
    let suffix = input.read_string()?;
    if suffix != expected_suffix {
        return Err(Error::corrupt(
            "<input>",
            format!("suffix mismatch: expected {expected_suffix}, got {suffix}"),
        ));
    }
    Ok(version)
}

/// Copies an input's header onto an output, verifying the header's
/// segment-id matches `expected_id`, without deserializing codec/version
/// (used when concatenating whole files into a compound file).
pub fn verify_and_copy_index_header(
    input: &mut dyn IndexInput,
    out: &mut dyn IndexOutput,
    expected_id: &[u8],
) -> Result<()> {
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        return Err(Error::corrupt("<input>", "bad codec magic"));
    }
    let codec = input.read_string()?;
    let version = input.read_int()?;
    let mut id = [0u8; 16];
    input.read_bytes(&mut id)?;
    if id != expected_id[..16.min(expected_id.len())] {
        return Err(Error::corrupt("<input>", "segment id mismatch while copying header"));
    }
    let suffix = input.read_string()?;
    write_index_header(out, &codec, version, &id, &suffix)
}

pub fn footer_length() -> usize {
    4 + 4 + 8
}

pub fn write_footer(out: &mut dyn IndexOutput) -> Result<()> {
    let checksum = out.checksum() as i64;
    out.write_int(FOOTER_MAGIC)?;
    out.write_int(0)?; // reserved padding
    out.write_long(checksum)
}

/// Reads and validates the footer, returning the stored checksum.
pub fn check_footer(input: &mut dyn IndexInput) -> Result<i64> {
    let remaining = input.len() as i64 - input.file_pointer();
    if remaining != footer_length() as i64 {
        return Err(Error::corrupt(
            "<input>",
            format!("did not read all bytes before footer, {remaining} remain"),
        ));
    }
    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        return Err(Error::corrupt("<input>", "bad footer magic"));
    }
    let padding = input.read_int()?;
    if padding != 0 {
        return Err(Error::corrupt("<input>", "bad footer padding"));
    }
    input.read_long()
}

/// Reads the footer checksum from a `ChecksumIndexInput` and compares it
/// against the checksum accumulated while reading — used right after
/// `open_checksum_input` on small, fully-verified files.
pub fn retrieve_checksum(input: &mut dyn ChecksumIndexInput) -> Result<i64> {
    let expected_position = input.len() as i64 - footer_length() as i64;
    if input.file_pointer() > expected_position {
        return Err(Error::corrupt("<input>", "footer overrun"));
    }
    while input.file_pointer() < expected_position {
        input.read_byte()?;
    }
    let computed = input.checksum() as i64;
    let stored = check_footer(input.as_mut())?;
    if stored != computed {
        return Err(Error::corrupt(
            "<input>",
            format!("checksum mismatch: stored={stored}, computed={computed}"),
        ));
    }
    Ok(stored)
}
