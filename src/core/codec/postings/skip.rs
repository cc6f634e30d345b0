//! Multi-level skip list over a term's doc blocks, per spec.md §4.3: level
//! 0 has one entry per 128-doc block; each higher level covers
//! `SKIP_MULTIPLIER` times as many blocks as the one below. A skip entry
//! records the cumulative file pointers needed to resume block decoding
//! without replaying everything before it.

use super::SKIP_MULTIPLIER;
use crate::core::store::{IndexInput, IndexOutput};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipEntry {
    pub last_doc: i32,
    pub doc_fp: i64,
    pub pos_fp: i64,
    pub pay_fp: i64,
    pub pos_count: i64,
    pub pay_bytes: i64,
}

/// Accumulates skip entries for one term while its doc blocks are being
/// written, and serializes them once the term is finished.
#[derive(Default)]
pub struct SkipWriter {
    levels: Vec<Vec<SkipEntry>>,
}

impl SkipWriter {
    pub fn new() -> Self {
        SkipWriter { levels: Vec::new() }
    }

    /// Called once per completed 128-doc block.
    pub fn record_block(&mut self, entry: SkipEntry) {
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(entry);
        let mut level = 0;
        loop {
            if self.levels[level].len() % SKIP_MULTIPLIER != 0 {
                break;
            }
            if self.levels.len() == level + 1 {
                self.levels.push(Vec::new());
            }
            self.levels[level + 1].push(entry);
            level += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() || self.levels[0].is_empty()
    }

    /// Writes `[numLevels][for each level, highest first: count, entries]`.
    /// Entries within a level are deltas against the previous entry on
    /// that level, consistent with the block-codec's general preference
    /// for delta + vlong coding.
    pub fn write(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_vint(self.levels.len() as i32)?;
        for level in self.levels.iter().rev() {
            out.write_vint(level.len() as i32)?;
            let mut prev = SkipEntry::default();
            for entry in level {
                out.write_vint(entry.last_doc - prev.last_doc)?;
                out.write_vlong(entry.doc_fp - prev.doc_fp)?;
                out.write_vlong(entry.pos_fp - prev.pos_fp)?;
                out.write_vlong(entry.pay_fp - prev.pay_fp)?;
                out.write_vlong(entry.pos_count - prev.pos_count)?;
                out.write_vlong(entry.pay_bytes - prev.pay_bytes)?;
                prev = *entry;
            }
        }
        Ok(())
    }
}

/// The read-side, deserialized eagerly into memory: skip lists are small
/// relative to the postings they index, so there is no benefit to lazy
/// per-level disk reads here (unlike Lucene, which streams levels lazily
/// to bound memory for pathologically high-df terms).
#[derive(Debug, Clone, Default)]
pub struct SkipReader {
    levels: Vec<Vec<SkipEntry>>,
}

impl SkipReader {
    pub fn read(input: &mut dyn IndexInput) -> Result<Self> {
        let num_levels = input.read_vint()? as usize;
        let mut levels = Vec::with_capacity(num_levels);
        for _ in 0..num_levels {
            let count = input.read_vint()? as usize;
            let mut level = Vec::with_capacity(count);
            let mut prev = SkipEntry::default();
            for _ in 0..count {
                let entry = SkipEntry {
                    last_doc: prev.last_doc + input.read_vint()?,
                    doc_fp: prev.doc_fp + input.read_vlong()?,
                    pos_fp: prev.pos_fp + input.read_vlong()?,
                    pay_fp: prev.pay_fp + input.read_vlong()?,
                    pos_count: prev.pos_count + input.read_vlong()?,
                    pay_bytes: prev.pay_bytes + input.read_vlong()?,
                };
                level.push(entry);
                prev = entry;
            }
            levels.push(level);
        }
        levels.reverse(); // stored highest-first, keep level 0 at index 0
        Ok(SkipReader { levels })
    }

    /// Finds the furthest skip entry whose `last_doc < target`, returning
    /// the resume point and the 0-based index of the level-0 block that
    /// should be decoded next. Traverses the highest level first,
    /// descending whenever it stops advancing (spec.md §4.3: "traverses
    /// the highest level that still advances, then descends").
    pub fn skip_to(&self, target: i32) -> Option<(SkipEntry, usize)> {
        if self.levels.is_empty() {
            return None;
        }
        let mut best: Option<SkipEntry> = None;
        // index into level 0 implied by how many level-0 blocks the best
        // entry accounts for.
        let mut level0_index = 0usize;
        for level in (0..self.levels.len()).rev() {
            let entries = &self.levels[level];
            let stride = SKIP_MULTIPLIER.pow(level as u32);
            let mut i = level0_index / stride;
            while i < entries.len() && entries[i].last_doc < target {
                best = Some(entries[i]);
                level0_index = (i + 1) * stride;
                i += 1;
            }
        }
        best.map(|e| (e, level0_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{ByteArrayInput, ByteArrayOutput};

    fn mk(last_doc: i32, fp: i64) -> SkipEntry {
        SkipEntry {
            last_doc,
            doc_fp: fp,
            pos_fp: fp * 2,
            pay_fp: fp * 3,
            pos_count: fp * 4,
            pay_bytes: fp * 5,
        }
    }

    #[test]
    fn roundtrip_and_skip_to() {
        let mut w = SkipWriter::new();
        for i in 0..40 {
            w.record_block(mk((i + 1) * 128 - 1, (i + 1) as i64 * 100));
        }
        let mut out = ByteArrayOutput::new();
        w.write(&mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = ByteArrayInput::new(bytes.into());
        let reader = SkipReader::read(&mut input).unwrap();

        let (entry, idx) = reader.skip_to(128 * 10 + 5).unwrap();
        assert!(entry.last_doc < 128 * 10 + 5);
        assert!(idx >= 10);
    }

    #[test]
    fn empty_skip_list_returns_none() {
        let reader = SkipReader::default();
        assert!(reader.skip_to(5).is_none());
    }
}
