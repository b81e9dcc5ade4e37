//! Physical chunk cursor for BIFF8 streams.
//!
//! A BIFF8 stream is a flat concatenation of chunks, each with a 4-byte
//! header (2 bytes record type + 2 bytes body length, little-endian)
//! followed by the body. A logical record longer than [`MAX_CHUNK_DATA`]
//! is carried in its leading chunk plus one or more CONTINUE (0x003C)
//! chunks.
//!
//! [`ChunkReader`] reads one chunk at a time into a reused internal buffer
//! and exposes typed primitive reads scoped to the current chunk. When the
//! current chunk is exhausted mid-record and the next chunk is a CONTINUE,
//! reads cross the boundary transparently (unless disabled). String reads
//! additionally consume the 1-byte encoding-width flag that a continuation
//! re-asserts at its start — a mismatch with the expected width is a
//! format error.
//!
//! Everything handed out is an owned copy; no value borrows chunk memory
//! across an [`advance`](ChunkReader::advance).

use std::io::Read;

use crate::error::{BiffError, BiffResult};
use crate::sids;

/// Maximum body length of one physical chunk.
pub const MAX_CHUNK_DATA: usize = 8224;

/// Size of the chunk header (type + length).
pub const CHUNK_HEADER_SIZE: usize = 4;

/// An IEEE 754 double that survives NaN-payload round-trips.
///
/// BIFF8 overloads NaN bit patterns for error-code cells, so a reader must
/// keep the original 8 bytes verbatim rather than the normalized NaN a
/// float round-trip could produce. Equality is bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDouble {
    bytes: [u8; 8],
}

impl RawDouble {
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        RawDouble { bytes }
    }

    /// The parsed floating-point value.
    pub fn value(&self) -> f64 {
        f64::from_le_bytes(self.bytes)
    }

    /// The wire representation, bit-for-bit as read.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.bytes
    }

    pub fn is_nan(&self) -> bool {
        self.value().is_nan()
    }

    /// The raw bytes, exposed when the bit pattern is one of the overloaded
    /// NaN encodings.
    pub fn raw_nan_bytes(&self) -> Option<[u8; 8]> {
        if self.is_nan() {
            Some(self.bytes)
        } else {
            None
        }
    }
}

impl From<f64> for RawDouble {
    fn from(value: f64) -> Self {
        RawDouble {
            bytes: value.to_le_bytes(),
        }
    }
}

/// Cursor over the physical chunks of a BIFF8 stream.
///
/// The reader keeps a 2-byte lookahead of the next chunk's type, so callers
/// can decide how to treat the upcoming chunk (continuation merging,
/// end-of-stream inference) before consuming it.
pub struct ChunkReader<R> {
    source: R,
    /// Body of the current chunk. Reused across `advance()` calls.
    buf: Box<[u8]>,
    /// Record type of the current chunk.
    sid: u16,
    /// Body length of the current chunk.
    len: usize,
    /// Read cursor within the current chunk body.
    pos: usize,
    /// Type of the next chunk, if the source has one.
    next_sid: Option<u16>,
    /// Byte offset of the current chunk's header in the stream (diagnostics).
    chunk_start: u64,
    /// Total bytes consumed from the source.
    stream_pos: u64,
    /// Whether typed reads may cross into a following CONTINUE chunk.
    auto_continue: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Wrap a byte source positioned at the first chunk header.
    pub fn new(source: R) -> BiffResult<Self> {
        let mut reader = ChunkReader {
            source,
            buf: vec![0u8; MAX_CHUNK_DATA].into_boxed_slice(),
            sid: 0,
            len: 0,
            pos: 0,
            next_sid: None,
            chunk_start: 0,
            stream_pos: 0,
            auto_continue: true,
        };
        reader.next_sid = reader.read_lookahead()?;
        Ok(reader)
    }

    /// Read the next chunk's 2-byte type tag, or `None` at end of source.
    /// A single trailing byte is treated as padding and ignored.
    fn read_lookahead(&mut self) -> BiffResult<Option<u16>> {
        let mut header = [0u8; 2];
        let mut got = 0;
        while got < 2 {
            match self.source.read(&mut header[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BiffError::Io(e)),
            }
        }
        if got < 2 {
            if got == 1 {
                log::debug!(
                    "ignoring 1 trailing byte at stream offset {}",
                    self.stream_pos
                );
            }
            return Ok(None);
        }
        self.stream_pos += 2;
        Ok(Some(u16::from_le_bytes(header)))
    }

    /// Whether another physical chunk is available.
    pub fn has_next_chunk(&self) -> bool {
        self.next_sid.is_some()
    }

    /// Type tag of the next chunk, if any, without consuming it.
    pub fn next_sid(&self) -> Option<u16> {
        self.next_sid
    }

    /// Type tag of the current chunk.
    pub fn sid(&self) -> u16 {
        self.sid
    }

    /// Bytes left in the current chunk body only (not the logical record).
    pub fn remaining_in_chunk(&self) -> usize {
        self.len - self.pos
    }

    /// Stream offset of the current chunk's header, for diagnostics.
    pub fn chunk_start(&self) -> u64 {
        self.chunk_start
    }

    /// Enable or disable transparent crossing into CONTINUE chunks.
    pub fn set_auto_continue(&mut self, on: bool) {
        self.auto_continue = on;
    }

    fn is_continue_next(&self) -> bool {
        self.next_sid == Some(sids::CONTINUE)
    }

    /// Load the next chunk's header and body into the internal buffer.
    ///
    /// Any slice or string previously derived from the buffer must already
    /// have been materialized as an owned value.
    pub fn advance(&mut self) -> BiffResult<()> {
        let sid = self
            .next_sid
            .take()
            .ok_or_else(|| BiffError::format("advance past end of stream"))?;
        self.chunk_start = self.stream_pos - 2;

        let mut len_bytes = [0u8; 2];
        self.source.read_exact(&mut len_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                BiffError::Format(format!(
                    "truncated chunk header at offset {}",
                    self.chunk_start
                ))
            } else {
                BiffError::Io(e)
            }
        })?;
        self.stream_pos += 2;
        let len = u16::from_le_bytes(len_bytes) as usize;
        if len > MAX_CHUNK_DATA {
            return Err(BiffError::Format(format!(
                "chunk length {} exceeds maximum {} (sid 0x{:04X} at offset {})",
                len, MAX_CHUNK_DATA, sid, self.chunk_start
            )));
        }

        self.source.read_exact(&mut self.buf[..len]).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                BiffError::Format(format!(
                    "truncated chunk body: sid 0x{:04X} declares {} bytes at offset {}",
                    sid, len, self.chunk_start
                ))
            } else {
                BiffError::Io(e)
            }
        })?;
        self.stream_pos += len as u64;

        self.sid = sid;
        self.len = len;
        self.pos = 0;
        self.next_sid = self.read_lookahead()?;
        Ok(())
    }

    /// Ensure `size` contiguous bytes are readable. Fixed-width fields may
    /// cross into a continuation only at an exact chunk boundary.
    fn ensure(&mut self, size: usize) -> BiffResult<()> {
        loop {
            if self.remaining_in_chunk() >= size {
                return Ok(());
            }
            if self.remaining_in_chunk() == 0 && self.auto_continue && self.is_continue_next() {
                self.advance()?;
                continue;
            }
            return Err(BiffError::Format(format!(
                "not enough data in chunk: need {} bytes, {} left (sid 0x{:04X} at offset {})",
                size,
                self.remaining_in_chunk(),
                self.sid,
                self.chunk_start
            )));
        }
    }

    /// At a chunk boundary inside string character data, cross into the
    /// CONTINUE chunk and consume the re-asserted encoding-width flag.
    fn ensure_string_byte(&mut self, wide: bool) -> BiffResult<()> {
        while self.remaining_in_chunk() == 0 {
            if !(self.auto_continue && self.is_continue_next()) {
                return Err(BiffError::Format(format!(
                    "string data ends prematurely (sid 0x{:04X} at offset {})",
                    self.sid, self.chunk_start
                )));
            }
            self.advance()?;
            if self.remaining_in_chunk() == 0 {
                // Zero-length continuation carries no flag byte
                continue;
            }
            let flags = self.buf[self.pos];
            self.pos += 1;
            let flag_wide = flags & 0x01 != 0;
            if flag_wide != wide {
                return Err(BiffError::Format(format!(
                    "continuation re-asserts {} string data but {} was expected (offset {})",
                    if flag_wide { "16-bit" } else { "8-bit" },
                    if wide { "16-bit" } else { "8-bit" },
                    self.chunk_start
                )));
            }
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> BiffResult<u8> {
        self.ensure(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> BiffResult<u16> {
        self.ensure(2)?;
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> BiffResult<i16> {
        self.read_u16().map(|v| v as i16)
    }

    pub fn read_u32(&mut self) -> BiffResult<u32> {
        self.ensure(4)?;
        let v = u32::from_le_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> BiffResult<i32> {
        self.read_u32().map(|v| v as i32)
    }

    pub fn read_i64(&mut self) -> BiffResult<i64> {
        self.ensure(8)?;
        let bytes: [u8; 8] = self.buf[self.pos..self.pos + 8].try_into().unwrap();
        self.pos += 8;
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn read_f64(&mut self) -> BiffResult<f64> {
        self.read_raw_double().map(|d| d.value())
    }

    /// Read a double, keeping the wire bytes for NaN-payload round-trips.
    pub fn read_raw_double(&mut self) -> BiffResult<RawDouble> {
        self.ensure(8)?;
        let bytes: [u8; 8] = self.buf[self.pos..self.pos + 8].try_into().unwrap();
        self.pos += 8;
        Ok(RawDouble::from_le_bytes(bytes))
    }

    /// Read `count` raw bytes, crossing chunk boundaries where they fall.
    pub fn read_bytes(&mut self, count: usize) -> BiffResult<Vec<u8>> {
        let mut out = Vec::with_capacity(count);
        let mut need = count;
        while need > 0 {
            if self.remaining_in_chunk() == 0 {
                self.ensure(1)?;
            }
            let take = need.min(self.remaining_in_chunk());
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            need -= take;
        }
        Ok(out)
    }

    /// Take the rest of the *current* chunk body. Never crosses into a
    /// continuation.
    pub fn read_remainder(&mut self) -> Vec<u8> {
        let out = self.buf[self.pos..self.len].to_vec();
        self.pos = self.len;
        out
    }

    /// Read `char_count` characters of compressed (8-bit) string data.
    pub fn read_compressed_string(&mut self, char_count: usize) -> BiffResult<String> {
        let mut out = String::with_capacity(char_count);
        for _ in 0..char_count {
            self.ensure_string_byte(false)?;
            out.push(self.buf[self.pos] as char);
            self.pos += 1;
        }
        Ok(out)
    }

    /// Read `char_count` characters of UTF-16LE string data. A chunk
    /// boundary may fall anywhere, including between the two bytes of one
    /// character.
    pub fn read_unicode_le_string(&mut self, char_count: usize) -> BiffResult<String> {
        let mut units = Vec::with_capacity(char_count);
        for _ in 0..char_count {
            self.ensure_string_byte(true)?;
            let lo = self.buf[self.pos];
            self.pos += 1;
            self.ensure_string_byte(true)?;
            let hi = self.buf[self.pos];
            self.pos += 1;
            units.push(u16::from_le_bytes([lo, hi]));
        }
        String::from_utf16(&units).map_err(|e| {
            BiffError::Format(format!(
                "invalid UTF-16 string in sid 0x{:04X}: {e}",
                self.sid
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// One framed chunk: sid + length + body.
    fn chunk(sid: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + body.len());
        out.extend_from_slice(&sid.to_le_bytes());
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn reader(stream: Vec<u8>) -> ChunkReader<Cursor<Vec<u8>>> {
        ChunkReader::new(Cursor::new(stream)).unwrap()
    }

    #[test]
    fn test_lookahead_and_advance() {
        let mut stream = chunk(0x0203, &[1, 2, 3, 4]);
        stream.extend_from_slice(&chunk(0x000A, &[]));
        let mut r = reader(stream);

        assert_eq!(r.next_sid(), Some(0x0203));
        r.advance().unwrap();
        assert_eq!(r.sid(), 0x0203);
        assert_eq!(r.remaining_in_chunk(), 4);
        assert_eq!(r.next_sid(), Some(0x000A));

        r.advance().unwrap();
        assert_eq!(r.sid(), 0x000A);
        assert_eq!(r.remaining_in_chunk(), 0);
        assert!(!r.has_next_chunk());
    }

    #[test]
    fn test_typed_reads() {
        let body = {
            let mut b = Vec::new();
            b.push(0x7Fu8);
            b.extend_from_slice(&0x1234u16.to_le_bytes());
            b.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
            b.extend_from_slice(&(-42i64).to_le_bytes());
            b.extend_from_slice(&3.25f64.to_le_bytes());
            b
        };
        let mut r = reader(chunk(0x0001, &body));
        r.advance().unwrap();

        assert_eq!(r.read_u8().unwrap(), 0x7F);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_i64().unwrap(), -42);
        assert_eq!(r.read_f64().unwrap(), 3.25);
        assert_eq!(r.remaining_in_chunk(), 0);
    }

    #[test]
    fn test_scalar_crosses_at_chunk_boundary() {
        // u32 split exactly at a chunk boundary: 0 bytes left, then CONTINUE
        let mut stream = chunk(0x00FC, &[0xAA]);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &0x0102_0304u32.to_le_bytes()));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert_eq!(r.read_u8().unwrap(), 0xAA);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_scalar_split_mid_value_is_error() {
        // 2 bytes left but a u32 requested: fields must not split mid-value
        let mut stream = chunk(0x00FC, &[1, 2]);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[3, 4]));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert!(matches!(r.read_u32(), Err(BiffError::Format(_))));
    }

    #[test]
    fn test_no_crossing_when_disabled() {
        let mut stream = chunk(0x00FC, &[]);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[1, 2]));
        let mut r = reader(stream);
        r.advance().unwrap();
        r.set_auto_continue(false);

        assert!(matches!(r.read_u16(), Err(BiffError::Format(_))));
    }

    #[test]
    fn test_string_crossing_consumes_flag() {
        // "ABCD" compressed, split after "AB"; continuation re-asserts 8-bit
        let mut stream = chunk(0x00FC, b"AB");
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[0x00, b'C', b'D']));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert_eq!(r.read_compressed_string(4).unwrap(), "ABCD");
        assert_eq!(r.remaining_in_chunk(), 0);
    }

    #[test]
    fn test_string_flag_mismatch_is_error() {
        let mut stream = chunk(0x00FC, b"AB");
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[0x01, b'C', 0x00, b'D', 0x00]));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert!(matches!(
            r.read_compressed_string(4),
            Err(BiffError::Format(_))
        ));
    }

    #[test]
    fn test_wide_char_split_mid_character() {
        // "Hi" as UTF-16LE with the boundary between the two bytes of 'H'
        let mut stream = chunk(0x00FC, &[b'H']);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[0x01, 0x00, b'i', 0x00]));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert_eq!(r.read_unicode_le_string(2).unwrap(), "Hi");
    }

    #[test]
    fn test_oversize_chunk_length_is_error() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&0x0203u16.to_le_bytes());
        stream.extend_from_slice(&8225u16.to_le_bytes());
        stream.extend_from_slice(&[0u8; 8225]);
        let mut r = reader(stream);

        assert!(matches!(r.advance(), Err(BiffError::Format(_))));
    }

    #[test]
    fn test_truncated_body_is_error() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&0x0203u16.to_le_bytes());
        stream.extend_from_slice(&10u16.to_le_bytes());
        stream.extend_from_slice(&[0u8; 3]);
        let mut r = reader(stream);

        assert!(matches!(r.advance(), Err(BiffError::Format(_))));
    }

    #[test]
    fn test_raw_double_preserves_nan_payload() {
        // A NaN with a payload no normalized NaN would carry
        let odd_nan: [u8; 8] = [0x25, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF];
        let mut r = reader(chunk(0x0203, &odd_nan));
        r.advance().unwrap();

        let d = r.read_raw_double().unwrap();
        assert!(d.is_nan());
        assert_eq!(d.raw_nan_bytes(), Some(odd_nan));
        assert_eq!(d.to_le_bytes(), odd_nan);
    }

    #[test]
    fn test_raw_double_plain_value() {
        let d = RawDouble::from(1.5);
        assert_eq!(d.value(), 1.5);
        assert_eq!(d.raw_nan_bytes(), None);
    }

    #[test]
    fn test_empty_stream() {
        let r = reader(Vec::new());
        assert!(!r.has_next_chunk());
    }

    #[test]
    fn test_single_trailing_byte_ignored() {
        let mut stream = chunk(0x000A, &[]);
        stream.push(0x00);
        let mut r = reader(stream);
        r.advance().unwrap();
        assert!(!r.has_next_chunk());
    }

    #[test]
    fn test_read_bytes_across_boundary() {
        let mut stream = chunk(0x00EC, &[1, 2, 3]);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[4, 5]));
        let mut r = reader(stream);
        r.advance().unwrap();

        assert_eq!(r.read_bytes(5).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_read_remainder_stays_in_chunk() {
        let mut stream = chunk(0x00EC, &[1, 2, 3]);
        stream.extend_from_slice(&chunk(sids::CONTINUE, &[4, 5]));
        let mut r = reader(stream);
        r.advance().unwrap();
        let _ = r.read_u8().unwrap();

        assert_eq!(r.read_remainder(), vec![2, 3]);
        assert_eq!(r.remaining_in_chunk(), 0);
        assert_eq!(r.next_sid(), Some(sids::CONTINUE));
    }
}
