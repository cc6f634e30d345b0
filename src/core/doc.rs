//! The document/field value model consumed by the indexer. Not retrieved
//! from the teacher (its `core::doc::Fieldable`/`Document` module was
//! outside the sampled files), rebuilt in the same shape implied by
//! `thread_doc_writer.rs`'s `core::index::Fieldable` import and spec.md §3
//! ("Field kinds").

use crate::core::codec::field_infos::{DocValuesType, IndexOptions};
use crate::error::{Error, Result};

/// One field's value plus the indexing behavior requested for it.
/// spec.md §3: "a field's indexing options are fixed at first use within
/// a segment".
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub indexed: bool,
    pub stored: bool,
    pub index_options: IndexOptions,
    pub doc_values_type: DocValuesType,
    /// Dimensionality for `Point` values; 0 for non-point fields.
    pub point_dimension_count: u8,
    pub point_num_bytes: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bytes(Vec<u8>),
    I64(i64),
    F64(f64),
    /// A fixed-width packed N-dim byte vector, N in [1,8] (spec.md §4.5).
    Point(Vec<u8>),
}

impl FieldValue {
    /// The analyzer boundary: the core does not tokenize, but needs a
    /// token stream to index. For `Str` this is whitespace-splitting,
    /// standing in for "whatever the analyzer produced" (spec.md §1: "the
    /// core consumes a token stream abstraction; it does not dictate how
    /// tokens are produced").
    pub fn tokenize(&self) -> Vec<String> {
        match self {
            FieldValue::Str(s) => s.split_whitespace().map(|t| t.to_lowercase()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_bytes_for_stored(&self) -> Vec<u8> {
        match self {
            FieldValue::Str(s) => s.as_bytes().to_vec(),
            FieldValue::Bytes(b) => b.clone(),
            FieldValue::I64(v) => v.to_be_bytes().to_vec(),
            FieldValue::F64(v) => v.to_be_bytes().to_vec(),
            FieldValue::Point(b) => b.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn add_text(&mut self, name: &str, text: &str, stored: bool) -> &mut Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: FieldValue::Str(text.to_string()),
            indexed: true,
            stored,
            index_options: IndexOptions::DocsFreqsPositions,
            doc_values_type: DocValuesType::None,
            point_dimension_count: 0,
            point_num_bytes: 0,
        });
        self
    }

    pub fn add_stored_only(&mut self, name: &str, value: FieldValue) -> &mut Self {
        self.fields.push(Field {
            name: name.to_string(),
            value,
            indexed: false,
            stored: true,
            index_options: IndexOptions::None,
            doc_values_type: DocValuesType::None,
            point_dimension_count: 0,
            point_num_bytes: 0,
        });
        self
    }

    pub fn add_numeric_doc_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: FieldValue::I64(value),
            indexed: false,
            stored: false,
            index_options: IndexOptions::None,
            doc_values_type: DocValuesType::Numeric,
            point_dimension_count: 0,
            point_num_bytes: 0,
        });
        self
    }

    pub fn add_binary_doc_value(&mut self, name: &str, value: Vec<u8>) -> &mut Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: FieldValue::Bytes(value),
            indexed: false,
            stored: false,
            index_options: IndexOptions::None,
            doc_values_type: DocValuesType::Binary,
            point_dimension_count: 0,
            point_num_bytes: 0,
        });
        self
    }

    pub fn add_sorted_doc_value(&mut self, name: &str, value: Vec<u8>) -> &mut Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: FieldValue::Bytes(value),
            indexed: false,
            stored: false,
            index_options: IndexOptions::None,
            doc_values_type: DocValuesType::Sorted,
            point_dimension_count: 0,
            point_num_bytes: 0,
        });
        self
    }

    pub fn add_point(&mut self, name: &str, dims: u8, bytes_per_dim: u8, packed: Vec<u8>) -> Result<&mut Self> {
        let expected = dims as usize * bytes_per_dim as usize;
        if packed.len() != expected {
            return Err(Error::IllegalArgument(format!(
                "point field {name}: packed value length {} != dims*bytesPerDim {expected}",
                packed.len()
            )));
        }
        self.fields.push(Field {
            name: name.to_string(),
            value: FieldValue::Point(packed),
            indexed: false,
            stored: false,
            index_options: IndexOptions::None,
            doc_values_type: DocValuesType::None,
            point_dimension_count: dims,
            point_num_bytes: bytes_per_dim,
        });
        Ok(self)
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
