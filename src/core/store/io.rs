//! `IndexInput` / `IndexOutput`: the byte-stream traits every codec writer
//! and reader is built on. vInt/vLong framing matches spec.md §6 (codec
//! header/footer) and §4.2 (block-codec tail encoding).

use byteorder::{BigEndian, ByteOrder};
use std::io::{self, Write};

use crate::error::{Error, Result};

/// A write-only, append-only output stream (one physical file while it is
/// open). Mirrors the call surface used by the teacher's
/// `Lucene50CompoundFormat::write` (`write_vint`, `write_int`, `write_long`,
/// `write_string`, `copy_bytes`, `file_pointer`).
pub trait IndexOutput: Write + Send {
    fn file_pointer(&self) -> i64;

    /// Running CRC32 over every byte written so far, consumed by
    /// `codec_util::write_footer` per spec.md §6 ("8-byte CRC32 of all
    /// preceding bytes").
    fn checksum(&self) -> u32;

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_all(&[b])?;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, v);
        self.write_bytes(&buf)
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_i64(&mut buf, v);
        self.write_bytes(&buf)
    }

    fn write_vint(&mut self, v: i32) -> Result<()> {
        write_vu64(self, v as u32 as u64)
    }

    fn write_vlong(&mut self, v: i64) -> Result<()> {
        write_vu64(self, v as u64)
    }

    fn write_zigzag_vlong(&mut self, v: i64) -> Result<()> {
        let zz = ((v << 1) ^ (v >> 63)) as u64;
        write_vu64(self, zz)
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_vint(s.len() as i32)?;
        self.write_bytes(s.as_bytes())
    }

    fn copy_bytes(&mut self, input: &mut dyn IndexInput, num_bytes: usize) -> Result<()> {
        let mut remaining = num_bytes;
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let chunk = remaining.min(buf.len());
            input.read_bytes(&mut buf[..chunk])?;
            self.write_bytes(&buf[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }
}

fn write_vu64(out: &mut (impl IndexOutput + ?Sized), mut v: u64) -> Result<()> {
    loop {
        if v < 0x80 {
            out.write_byte(v as u8)?;
            return Ok(());
        }
        out.write_byte(((v & 0x7f) | 0x80) as u8)?;
        v >>= 7;
    }
}

/// A random-access, clonable input. `slice` and `clone` are O(1) over a
/// shared backing buffer, matching spec.md §4.1 ("Sliced inputs share the
/// parent's mapping; cloning is O(1)").
pub trait IndexInput: Send {
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn file_pointer(&self) -> i64;
    fn seek(&mut self, pos: i64) -> Result<()>;
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Returns an independently-positioned view over `[offset, offset+length)`
    /// of this input's backing storage, without copying.
    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>>;

    fn clone_input(&self) -> Box<dyn IndexInput>;

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_bytes(&mut b)?;
        Ok(b[0])
    }

    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(BigEndian::read_i32(&buf))
    }

    fn read_long(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(BigEndian::read_i64(&buf))
    }

    fn read_vint(&mut self) -> Result<i32> {
        Ok(self.read_vu64()? as u32 as i32)
    }

    fn read_vlong(&mut self) -> Result<i64> {
        Ok(self.read_vu64()? as i64)
    }

    fn read_zigzag_vlong(&mut self) -> Result<i64> {
        let zz = self.read_vu64()?;
        Ok(((zz >> 1) as i64) ^ -((zz & 1) as i64))
    }

    fn read_vu64(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            result |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(Error::corrupt("<input>", "vint too long"));
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::corrupt("<input>", e.to_string()))
    }
}

/// A checksumming wrapper used while reading a file whose trailing footer
/// must be verified (`dir.open_checksum_input` in the teacher's
/// `compound.rs`).
pub trait ChecksumIndexInput: IndexInput {
    fn checksum(&self) -> u64;
    fn as_mut(&mut self) -> &mut dyn IndexInput;
    fn as_data_input(&mut self) -> &mut dyn IndexInput;
}

/// An in-memory `IndexOutput` used both for tests and as the building block
/// for `RamDirectory`.
pub struct ByteArrayOutput {
    buf: Vec<u8>,
    hasher: crc32fast::Hasher,
}

impl ByteArrayOutput {
    pub fn new() -> Self {
        ByteArrayOutput {
            buf: Vec::new(),
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for ByteArrayOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for ByteArrayOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        self.hasher.update(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IndexOutput for ByteArrayOutput {
    fn file_pointer(&self) -> i64 {
        self.buf.len() as i64
    }

    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

/// A random-access reader over a shared, ref-counted byte buffer — the
/// common backing for both `RamDirectory` and `MmapDirectory` slices.
#[derive(Clone)]
pub struct ByteArrayInput {
    data: std::sync::Arc<[u8]>,
    base: u64,
    len: u64,
    pos: u64,
}

impl ByteArrayInput {
    pub fn new(data: std::sync::Arc<[u8]>) -> Self {
        let len = data.len() as u64;
        ByteArrayInput {
            data,
            base: 0,
            len,
            pos: 0,
        }
    }

    fn sub(&self, offset: i64, length: i64) -> Self {
        ByteArrayInput {
            data: self.data.clone(),
            base: self.base + offset as u64,
            len: length as u64,
            pos: 0,
        }
    }
}

impl IndexInput for ByteArrayInput {
    fn len(&self) -> u64 {
        self.len
    }

    fn file_pointer(&self) -> i64 {
        self.pos as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos as u64 > self.len {
            return Err(Error::corrupt("<mem>", "seek out of bounds"));
        }
        self.pos = pos as u64;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = (self.base + self.pos) as usize;
        let end = start + buf.len();
        if self.pos + buf.len() as u64 > self.len {
            return Err(Error::corrupt("<mem>", "read past end of input"));
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn slice(&self, _description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.sub(offset, length)))
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(self.clone())
    }
}

/// Wraps a whole-file `ByteArrayInput` and accumulates a running CRC32 as
/// bytes are consumed sequentially from position 0 — the backing for
/// `Directory::open_checksum_input` (spec.md §4.1: "checksum verification
/// is explicit").
pub struct ChecksumByteArrayInput {
    inner: ByteArrayInput,
    hasher: crc32fast::Hasher,
    hashed_up_to: u64,
}

impl ChecksumByteArrayInput {
    pub fn new(data: std::sync::Arc<[u8]>) -> Self {
        ChecksumByteArrayInput {
            inner: ByteArrayInput::new(data),
            hasher: crc32fast::Hasher::new(),
            hashed_up_to: 0,
        }
    }
}

impl super::ChecksumIndexInput for ChecksumByteArrayInput {
    fn checksum(&self) -> u64 {
        self.hasher.clone().finalize() as u64
    }

    fn as_mut(&mut self) -> &mut dyn IndexInput {
        self
    }

    fn as_data_input(&mut self) -> &mut dyn IndexInput {
        self
    }
}

impl IndexInput for ChecksumByteArrayInput {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn file_pointer(&self) -> i64 {
        self.inner.file_pointer()
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        // checksum input only supports forward sequential reads.
        if (pos as u64) < self.hashed_up_to {
            return Err(Error::corrupt("<mem>", "checksum input cannot seek backward"));
        }
        self.inner.seek(pos)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.inner.pos;
        self.inner.read_bytes(buf)?;
        if start >= self.hashed_up_to {
            self.hasher.update(buf);
            self.hashed_up_to = start + buf.len() as u64;
        }
        Ok(())
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        self.inner.slice(description, offset, length)
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(self.inner.clone())
    }
}
