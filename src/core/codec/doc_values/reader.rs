use std::collections::HashMap;

use super::writer::type_from_byte;
use super::{DATA_CODEC, DATA_EXTENSION, META_CODEC, META_EXTENSION, VERSION};
use crate::core::codec::field_infos::DocValuesType;
use crate::core::store::{codec_util, Directory, IOContext, IndexInput};
use crate::error::{Error, Result};

struct FieldEntry {
    ty: DocValuesType,
    offset: i64,
    length: i64,
}

pub struct DocValuesReader {
    fields: HashMap<i32, FieldEntry>,
    data_input: Box<dyn IndexInput>,
}

impl DocValuesReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, segment_id: &[u8]) -> Result<Self> {
        let meta_file = format!("{segment_name}.{META_EXTENSION}");
        let mut meta_input = dir.open_checksum_input(&meta_file, &IOContext::Read(true))?;
        codec_util::check_index_header(meta_input.as_mut(), META_CODEC, VERSION, VERSION, segment_id, "")?;
        let count = meta_input.as_mut().read_vint()?;
        let mut fields = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let field = meta_input.as_mut().read_vint()?;
            let ty_byte = meta_input.as_mut().read_byte()?;
            let ty = type_from_byte(ty_byte).ok_or_else(|| Error::corrupt(&meta_file, "bad doc values type byte"))?;
            let offset = meta_input.as_mut().read_vlong()?;
            let length = meta_input.as_mut().read_vlong()?;
            fields.insert(field, FieldEntry { ty, offset, length });
        }
        codec_util::retrieve_checksum(meta_input.as_mut())?;

        let data_file = format!("{segment_name}.{DATA_EXTENSION}");
        let mut data_input = dir.open_input(&data_file, &IOContext::Read(false))?;
        codec_util::check_index_header(data_input.as_mut(), DATA_CODEC, VERSION, VERSION, segment_id, "")?;

        Ok(DocValuesReader { fields, data_input })
    }

    pub fn has_field(&self, field_number: i32) -> bool {
        self.fields.contains_key(&field_number)
    }

    fn field_input(&self, field_number: i32, expected: DocValuesType) -> Result<Option<Box<dyn IndexInput>>> {
        let Some(entry) = self.fields.get(&field_number) else {
            return Ok(None);
        };
        if entry.ty != expected {
            return Err(Error::IllegalArgument(format!(
                "field {field_number} is not a {expected:?} doc-values field"
            )));
        }
        let mut input = self.data_input.clone_input();
        input.seek(entry.offset)?;
        Ok(Some(input))
    }

    pub fn numeric(&self, field_number: i32, doc_id: i32) -> Result<Option<i64>> {
        let Some(mut input) = self.field_input(field_number, DocValuesType::Numeric)? else {
            return Ok(None);
        };
        let count = input.read_vint()?;
        for _ in 0..count {
            let doc = input.read_vint()?;
            let value = input.read_zigzag_vlong()?;
            if doc == doc_id {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn binary(&self, field_number: i32, doc_id: i32) -> Result<Option<Vec<u8>>> {
        let Some(mut input) = self.field_input(field_number, DocValuesType::Binary)? else {
            return Ok(None);
        };
        let count = input.read_vint()?;
        for _ in 0..count {
            let doc = input.read_vint()?;
            let len = input.read_vint()? as usize;
            if doc == doc_id {
                let mut buf = vec![0u8; len];
                input.read_bytes(&mut buf)?;
                return Ok(Some(buf));
            }
            input.seek(input.file_pointer() + len as i64)?;
        }
        Ok(None)
    }

    fn read_dict(input: &mut dyn IndexInput) -> Result<Vec<Vec<u8>>> {
        let n = input.read_vint()? as usize;
        let mut dict = Vec::with_capacity(n);
        for _ in 0..n {
            let len = input.read_vint()? as usize;
            let mut v = vec![0u8; len];
            input.read_bytes(&mut v)?;
            dict.push(v);
        }
        Ok(dict)
    }

    pub fn sorted(&self, field_number: i32, doc_id: i32) -> Result<Option<Vec<u8>>> {
        let Some(mut input) = self.field_input(field_number, DocValuesType::Sorted)? else {
            return Ok(None);
        };
        let dict = Self::read_dict(input.as_mut())?;
        let count = input.read_vint()?;
        for _ in 0..count {
            let doc = input.read_vint()?;
            let ord = input.read_vint()? as usize;
            if doc == doc_id {
                return Ok(dict.get(ord).cloned());
            }
        }
        Ok(None)
    }

    pub fn sorted_numeric(&self, field_number: i32, doc_id: i32) -> Result<Vec<i64>> {
        let Some(mut input) = self.field_input(field_number, DocValuesType::SortedNumeric)? else {
            return Ok(Vec::new());
        };
        let count = input.read_vint()?;
        for _ in 0..count {
            let doc = input.read_vint()?;
            let n = input.read_vint()? as usize;
            if doc == doc_id {
                let mut out = Vec::with_capacity(n);
                for _ in 0..n {
                    out.push(input.read_zigzag_vlong()?);
                }
                return Ok(out);
            }
            for _ in 0..n {
                input.read_zigzag_vlong()?;
            }
        }
        Ok(Vec::new())
    }

    pub fn sorted_set(&self, field_number: i32, doc_id: i32) -> Result<Vec<Vec<u8>>> {
        let Some(mut input) = self.field_input(field_number, DocValuesType::SortedSet)? else {
            return Ok(Vec::new());
        };
        let dict = Self::read_dict(input.as_mut())?;
        let count = input.read_vint()?;
        for _ in 0..count {
            let doc = input.read_vint()?;
            let n = input.read_vint()? as usize;
            if doc == doc_id {
                let mut out = Vec::with_capacity(n);
                for _ in 0..n {
                    let ord = input.read_vint()? as usize;
                    if let Some(v) = dict.get(ord) {
                        out.push(v.clone());
                    }
                }
                return Ok(out);
            }
            for _ in 0..n {
                input.read_vint()?;
            }
        }
        Ok(Vec::new())
    }
}
