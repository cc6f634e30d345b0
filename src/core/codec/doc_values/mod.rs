//! DocValues: per-document columnar values for sort/facet/filter, per
//! spec.md §4.6. Five logical shapes share one `.dvd`/`.dvm` file pair per
//! segment, matching the Lucene-style "one codec file, many fields"
//! layout the teacher's compound-file format assumes for auxiliary data.

mod reader;
mod writer;

pub use reader::DocValuesReader;
pub use writer::DocValuesWriter;

pub const DATA_EXTENSION: &str = "dvd";
pub const META_EXTENSION: &str = "dvm";
pub const DATA_CODEC: &str = "FerroDocValuesData";
pub const META_CODEC: &str = "FerroDocValuesMeta";
pub const VERSION: i32 = 1;
