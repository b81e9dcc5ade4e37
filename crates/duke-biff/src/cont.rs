//! Continuation-aware chunk writer.
//!
//! The encode-side dual of [`ChunkReader`](crate::chunk::ChunkReader):
//! serializes one logical record into physical chunks, closing the current
//! chunk (backpatching its length field) and opening a CONTINUE chunk
//! whenever the [`MAX_CHUNK_DATA`] body limit is reached.
//!
//! Fixed-width fields never split across a boundary — a field that does not
//! fit moves to the continuation whole. While a string character region is
//! open, each break re-emits the 1-byte encoding-width flag at the start of
//! the continuation, matching what the reader expects mid-string.

use crate::chunk::MAX_CHUNK_DATA;
use crate::sids;

/// Serializes one logical record, splitting into CONTINUE chunks on demand.
pub struct ChunkWriter {
    out: Vec<u8>,
    /// Offset of the current chunk's length field, backpatched on close.
    len_at: usize,
    /// Body bytes written to the current chunk.
    chunk_len: usize,
    /// Total body bytes across all chunks, excluding re-asserted flag bytes.
    logical_len: usize,
    /// Width flag of the string region in progress, re-emitted after a break.
    string_flags: Option<u8>,
}

impl ChunkWriter {
    /// Open a logical record with the given type tag.
    pub fn new(sid: u16) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(&sid.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        ChunkWriter {
            out,
            len_at: 2,
            chunk_len: 0,
            logical_len: 0,
            string_flags: None,
        }
    }

    fn close_chunk(&mut self) {
        let len = (self.chunk_len as u16).to_le_bytes();
        self.out[self.len_at] = len[0];
        self.out[self.len_at + 1] = len[1];
    }

    fn begin_continue(&mut self) {
        self.close_chunk();
        self.out.extend_from_slice(&sids::CONTINUE.to_le_bytes());
        self.len_at = self.out.len();
        self.out.extend_from_slice(&0u16.to_le_bytes());
        self.chunk_len = 0;
        if let Some(flags) = self.string_flags {
            // Re-assert the encoding width for the in-progress string
            self.out.push(flags & 0x01);
            self.chunk_len = 1;
        }
    }

    fn ensure_room(&mut self, size: usize) {
        debug_assert!(size <= MAX_CHUNK_DATA);
        if self.chunk_len + size > MAX_CHUNK_DATA {
            self.begin_continue();
        }
    }

    /// Bytes left in the current chunk body.
    pub fn remaining_in_chunk(&self) -> usize {
        MAX_CHUNK_DATA - self.chunk_len
    }

    /// Total body bytes written so far, across chunks, excluding the flag
    /// bytes continuations re-assert.
    pub fn logical_len(&self) -> usize {
        self.logical_len
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_atomic(&[v]);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_atomic(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_atomic(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_atomic(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_atomic(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_atomic(&v.to_le_bytes());
    }

    /// Write bytes that must stay on one side of a chunk boundary
    /// (fixed-width fields, string headers, format runs).
    pub fn write_atomic(&mut self, bytes: &[u8]) {
        self.ensure_room(bytes.len());
        self.out.extend_from_slice(bytes);
        self.chunk_len += bytes.len();
        self.logical_len += bytes.len();
    }

    /// Write a raw byte run that may split anywhere.
    pub fn write_bytes(&mut self, data: &[u8]) {
        let mut rest = data;
        while !rest.is_empty() {
            if self.chunk_len == MAX_CHUNK_DATA {
                self.begin_continue();
            }
            let take = rest.len().min(MAX_CHUNK_DATA - self.chunk_len);
            self.out.extend_from_slice(&rest[..take]);
            self.chunk_len += take;
            self.logical_len += take;
            rest = &rest[take..];
        }
    }

    /// Open a string character region. Until [`end_string_region`]
    /// (ChunkWriter::end_string_region) is called, chunk breaks re-assert
    /// the low bit of `flags` as the continuation's leading width flag.
    pub fn begin_string_region(&mut self, flags: u8) {
        self.string_flags = Some(flags);
    }

    pub fn end_string_region(&mut self) {
        self.string_flags = None;
    }

    /// Write string character data in the given width. Characters never
    /// split mid-character; a break between characters re-asserts the
    /// region's width flag.
    pub fn write_unicode_chars(&mut self, text: &str, wide: bool) {
        for unit in text.encode_utf16() {
            if wide {
                self.write_atomic(&unit.to_le_bytes());
            } else {
                self.write_atomic(&[unit as u8]);
            }
        }
    }

    /// Close the final chunk and return the framed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.close_chunk();
        self.out
    }
}
