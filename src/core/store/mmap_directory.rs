//! A filesystem-backed `Directory` using memory-mapped reads, per
//! spec.md §4.1 ("open-input (random-access, ideally memory-mapped)").
//! Commit/rename uses `std::fs::rename`, which is atomic on POSIX and NTFS
//! for same-volume renames — the mechanism spec.md §4.7 relies on for
//! `segments_<gen>` publication.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use super::{
    ByteArrayInput, ChecksumByteArrayInput, ChecksumIndexInput, Directory, IOContext, IndexInput,
    IndexOutput, Lock,
};
use crate::error::{Error, Result};

pub struct MmapDirectory {
    path: PathBuf,
}

impl MmapDirectory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(MmapDirectory { path })
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn read_whole_file(&self, name: &str) -> Result<Arc<[u8]>> {
        let path = self.resolve(name);
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Arc::from(Vec::new().into_boxed_slice()));
        }
        // SAFETY: the file is treated as immutable for the lifetime of the
        // mapping, matching spec.md §3 ("a segment is written exactly once
        // and never modified except by superseding commits").
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Arc::from(mmap.to_vec().into_boxed_slice()))
    }
}

impl fmt::Display for MmapDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MmapDirectory({})", self.path.display())
    }
}

struct FsOutput {
    file: File,
    written: i64,
    hasher: crc32fast::Hasher,
}

impl Write for FsOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write_all(buf)?;
        self.hasher.update(buf);
        self.written += buf.len() as i64;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl IndexOutput for FsOutput {
    fn file_pointer(&self) -> i64 {
        self.written
    }
    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

struct FsLock {
    path: PathBuf,
}

impl Lock for FsLock {
    fn release(&mut self) -> Result<()> {
        let _ = fs::remove_file(&self.path);
        Ok(())
    }
}

impl Drop for FsLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl Directory for MmapDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        Ok(fs::metadata(self.resolve(name))?.len() as i64)
    }

    fn create_output(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.resolve(name))?;
        Ok(Box::new(FsOutput {
            file,
            written: 0,
            hasher: crc32fast::Hasher::new(),
        }))
    }

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn IndexOutput>> {
        let name = format!("{prefix}_{}{suffix}.tmp", rand_suffix());
        self.create_output(&name, ctx)
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let data = self.read_whole_file(name)?;
        Ok(Box::new(ByteArrayInput::new(data)))
    }

    fn open_checksum_input(
        &self,
        name: &str,
        _ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>> {
        let data = self.read_whole_file(name)?;
        Ok(Box::new(ChecksumByteArrayInput::new(data)))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        fs::rename(self.resolve(source), self.resolve(dest))?;
        Ok(())
    }

    fn sync(&self, names: &HashSet<String>) -> Result<()> {
        for name in names {
            let file = File::open(self.resolve(name))?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        let dir = File::open(&self.path)?;
        // directory fsync is a no-op on platforms without directory handles
        // (e.g. Windows); best-effort elsewhere.
        let _ = dir.sync_all();
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn Lock>> {
        let path = self.resolve(name);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|_| Error::LockObtainFailed(path.clone()))?;
        drop(file);
        Ok(Box::new(FsLock { path }))
    }
}

fn rand_suffix() -> u64 {
    use rand::RngCore;
    rand::thread_rng().next_u64()
}

pub fn segment_exists(dir: &Path) -> bool {
    dir.exists()
}
