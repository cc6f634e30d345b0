//! Persists the per-segment live-docs bitmap (spec.md §3: "After deletes,
//! a live-docs bitmap masks removed ids"), one `.liv` file per deletion
//! generation so an older reader can keep using a prior generation's
//! view while a newer one is written (spec.md §4.7 Reopen).

use crate::core::store::{codec_util, Directory, IOContext};
use crate::core::util::bit_set::FixedBitSet;
use crate::error::Result;

pub const LIVE_DOCS_EXTENSION: &str = "liv";
const LIVE_DOCS_CODEC: &str = "FerroLiveDocs";
const LIVE_DOCS_VERSION: i32 = 1;

pub fn live_docs_file_name(segment_name: &str, del_gen: i64) -> String {
    format!("{segment_name}_{del_gen}.{LIVE_DOCS_EXTENSION}")
}

pub fn write_live_docs(
    dir: &dyn Directory,
    segment_name: &str,
    segment_id: &[u8],
    del_gen: i64,
    live: &FixedBitSet,
) -> Result<String> {
    let file_name = live_docs_file_name(segment_name, del_gen);
    let mut out = dir.create_output(&file_name, &IOContext::Flush)?;
    codec_util::write_index_header(out.as_mut(), LIVE_DOCS_CODEC, LIVE_DOCS_VERSION, segment_id, "")?;
    out.write_vint(live.len() as i32)?;
    out.write_vint(live.words().len() as i32)?;
    for w in live.words() {
        out.write_long(*w as i64)?;
    }
    codec_util::write_footer(out.as_mut())?;
    Ok(file_name)
}

pub fn read_live_docs(dir: &dyn Directory, file_name: &str, segment_id: &[u8]) -> Result<FixedBitSet> {
    let mut input = dir.open_checksum_input(file_name, &IOContext::Read(true))?;
    codec_util::check_index_header(
        input.as_mut(),
        LIVE_DOCS_CODEC,
        LIVE_DOCS_VERSION,
        LIVE_DOCS_VERSION,
        segment_id,
        "",
    )?;
    let num_bits = input.as_mut().read_vint()? as usize;
    let num_words = input.as_mut().read_vint()? as usize;
    let mut words = Vec::with_capacity(num_words);
    for _ in 0..num_words {
        words.push(input.as_mut().read_long()? as u64);
    }
    codec_util::retrieve_checksum(input.as_mut())?;
    Ok(FixedBitSet::from_words(words, num_bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn write_read_round_trips() {
        let dir = RamDirectory::new();
        let id = [1u8; 16];
        let mut live = FixedBitSet::all_set(10);
        live.clear(3);
        live.clear(7);
        let name = write_live_docs(&dir, "_0", &id, 1, &live).unwrap();
        let back = read_live_docs(&dir, &name, &id).unwrap();
        assert_eq!(back.cardinality(), 8);
        assert!(!back.get(3));
        assert!(!back.get(7));
        assert!(back.get(0));
    }
}
