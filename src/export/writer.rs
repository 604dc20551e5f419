//! In-memory chunk writer.
//!
//! Values are big-endian except chunk sizes, which are little-endian. Fields
//! whose value is not known yet are reserved and patched later; chunk sizes
//! are always patched when the chunk is closed. Every pointer written through
//! [`GnoWriter::put_pointer`] or [`GnoWriter::reserve_pointer`] is recorded
//! for the relocation table.

use crate::data::parser_utils::align_up;
use crate::export::encoder::{EncodeError, fit};
use crate::models::gno::DATA_BASE;

/// Chunks are padded to this boundary.
pub const CHUNK_ALIGN: usize = 32;

/// A reserved big-endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Placeholder(usize);

/// An open chunk. Close it with [`GnoWriter::end_chunk`].
#[derive(Debug)]
#[must_use]
pub struct ChunkMark {
    start: usize,
}

#[derive(Debug, Default)]
pub struct GnoWriter {
    buf: Vec<u8>,
    relocations: Vec<u32>,
}

impl GnoWriter {
    pub fn new() -> GnoWriter {
        GnoWriter::default()
    }

    /// Absolute file position.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Position relative to the end of the info chunk, as stored in pointers.
    pub fn data_offset(&self) -> Result<u32, EncodeError> {
        let offset = self.position().saturating_sub(DATA_BASE);
        fit("data offset", offset as i64)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f32s(&mut self, values: &[f32]) {
        for &v in values {
            self.put_f32(v);
        }
    }

    /// Write a pointer to `target` and record it for relocation.
    pub fn put_pointer(&mut self, target: u32) -> Result<(), EncodeError> {
        self.relocations.push(self.data_offset()?);
        self.put_u32(target);
        Ok(())
    }

    pub fn reserve_u32(&mut self) -> Placeholder {
        let at = self.position();
        self.put_u32(0);
        Placeholder(at)
    }

    /// Reserve a pointer whose target is written later.
    pub fn reserve_pointer(&mut self) -> Result<Placeholder, EncodeError> {
        self.relocations.push(self.data_offset()?);
        Ok(self.reserve_u32())
    }

    pub fn patch_u32(&mut self, placeholder: Placeholder, value: u32) {
        let Placeholder(at) = placeholder;
        self.buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Zero-pad up to a multiple of `align` (a power of two).
    pub fn align(&mut self, align: usize) {
        let target = align_up(self.position(), align);
        self.buf.resize(target, 0);
    }

    /// Write a chunk header with a size to be filled in by [`Self::end_chunk`].
    pub fn begin_chunk(&mut self, magic: [u8; 4]) -> ChunkMark {
        let start = self.position();
        self.put_bytes(&magic);
        self.put_bytes(&[0; 4]);
        ChunkMark { start }
    }

    /// Pad the chunk and patch its size. The size covers the padding.
    pub fn end_chunk(&mut self, mark: ChunkMark) -> Result<(), EncodeError> {
        self.align(CHUNK_ALIGN);
        let size: u32 = fit("chunk size", (self.position() - mark.start - 8) as i64)?;
        let at = mark.start + 4;
        self.buf[at..at + 4].copy_from_slice(&size.to_le_bytes());
        Ok(())
    }

    /// Pad like [`Self::end_chunk`] but declare `size` bytes. Used for the
    /// end chunk, whose padding is not counted.
    pub fn end_chunk_declaring(&mut self, mark: ChunkMark, size: u32) {
        self.align(CHUNK_ALIGN);
        let at = mark.start + 4;
        self.buf[at..at + 4].copy_from_slice(&size.to_le_bytes());
    }

    /// Pointer locations recorded so far, ascending.
    pub fn relocations(&self) -> Vec<u32> {
        let mut out = self.relocations.clone();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
