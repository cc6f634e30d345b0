//! The codec layer: postings (with skip-list), FST term dictionary, BKD
//! points, stored fields, doc-values, and the compound-file wrapper.
//! Dependency order follows spec.md §2: integer block codec underlies
//! postings/points/doc-values; those feed the term dictionary; segment
//! info sits above all of them.

pub mod compound;
pub mod doc_values;
pub mod field_infos;
pub mod norms;
pub mod points;
pub mod postings;
pub mod stored_fields;
pub mod terms;

/// A selector for which concrete codec variant a segment was written
/// with, matching spec.md §6's `codec` configuration knob ("selector for
/// the postings/docValues/points/storedFields variants"). Only one
/// variant is implemented; the enum exists so the on-disk format can grow
/// new variants without an API break (spec.md §9, "single canonical
/// version").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Ferro1,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Ferro1 => "Ferro1",
        }
    }
}
