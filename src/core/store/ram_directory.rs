//! An in-memory `Directory`, used by unit tests that don't want to touch
//! the filesystem. Same trait surface as `MmapDirectory`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use super::{
    ByteArrayInput, ByteArrayOutput, ChecksumByteArrayInput, ChecksumIndexInput, Directory,
    IOContext, IndexInput, IndexOutput, Lock,
};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct RamDirectory {
    files: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
}

impl RamDirectory {
    pub fn new() -> Self {
        RamDirectory::default()
    }
}

impl fmt::Display for RamDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RamDirectory")
    }
}

struct RamOutput {
    name: String,
    dir: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
    buf: ByteArrayOutput,
}

impl std::io::Write for RamOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.buf.flush()
    }
}

impl IndexOutput for RamOutput {
    fn file_pointer(&self) -> i64 {
        self.buf.file_pointer()
    }
    fn checksum(&self) -> u32 {
        self.buf.checksum()
    }
}

impl Drop for RamOutput {
    fn drop(&mut self) {
        let bytes: Arc<[u8]> = self.buf.bytes().to_vec().into();
        self.dir.lock().unwrap().insert(std::mem::take(&mut self.name), bytes);
    }
}

struct NoopLock;
impl Lock for NoopLock {
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Directory for RamDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .map(|b| b.len() as i64)
            .ok_or_else(|| Error::corrupt(name, "file not found"))
    }

    fn create_output(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        Ok(Box::new(RamOutput {
            name: name.to_string(),
            dir: self.shared_map(),
            buf: ByteArrayOutput::new(),
        }))
    }

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn IndexOutput>> {
        let name = format!("{prefix}_tmp{suffix}");
        self.create_output(&name, ctx)
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::corrupt(name, "file not found"))?;
        Ok(Box::new(ByteArrayInput::new(data)))
    }

    fn open_checksum_input(
        &self,
        name: &str,
        _ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::corrupt(name, "file not found"))?;
        Ok(Box::new(ChecksumByteArrayInput::new(data)))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let data = files
            .remove(source)
            .ok_or_else(|| Error::corrupt(source, "file not found"))?;
        files.insert(dest.to_string(), data);
        Ok(())
    }

    fn sync(&self, _names: &HashSet<String>) -> Result<()> {
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, _name: &str) -> Result<Box<dyn Lock>> {
        Ok(Box::new(NoopLock))
    }
}

impl RamDirectory {
    fn shared_map(&self) -> Arc<Mutex<HashMap<String, Arc<[u8]>>>> {
        self.files.clone()
    }
}
