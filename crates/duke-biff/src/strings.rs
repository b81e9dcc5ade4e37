//! BIFF8 Unicode string decoding and encoding.
//!
//! BIFF8 strings have a layered encoding:
//! - Header: char_count (2 bytes) + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed 8-bit, 1 = UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended (Asian phonetic) block follows
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended block size follows
//! - Then the character data
//! - Then the rich text runs (4 bytes each) if fRichSt
//! - Then the extended block if fExtSt
//!
//! Inside a string table the character data may span CONTINUE chunks,
//! splitting at any byte — the continuation re-asserts the width flag. The
//! header, the run-count/ext-size fields, and each 4-byte run are atomic:
//! they sit wholly on one side of a boundary.

use std::io::Read;

use crate::chunk::ChunkReader;
use crate::cont::ChunkWriter;
use crate::error::BiffResult;

const FLAG_WIDE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

/// One rich-text formatting run: a font applied from a character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRun {
    pub char_pos: u16,
    pub font_index: u16,
}

/// A BIFF8 Unicode string, with rich-text runs and the extended block
/// retained for lossless round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnicodeString {
    pub text: String,
    pub rich_runs: Vec<FormatRun>,
    pub ext_data: Vec<u8>,
}

impl UnicodeString {
    pub fn new<S: Into<String>>(text: S) -> Self {
        UnicodeString {
            text: text.into(),
            rich_runs: Vec::new(),
            ext_data: Vec::new(),
        }
    }

    /// Number of UTF-16 code units, the wire char count.
    pub fn char_count(&self) -> usize {
        self.text.encode_utf16().count()
    }

    /// Whether the character data needs the 16-bit encoding.
    fn needs_wide(&self) -> bool {
        self.text.encode_utf16().any(|u| u > 0xFF)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.needs_wide() {
            flags |= FLAG_WIDE;
        }
        if !self.ext_data.is_empty() {
            flags |= FLAG_EXT;
        }
        if !self.rich_runs.is_empty() {
            flags |= FLAG_RICH;
        }
        flags
    }

    /// Read a string from the cursor, crossing continuations as needed.
    pub fn read<R: Read>(reader: &mut ChunkReader<R>) -> BiffResult<Self> {
        let char_count = reader.read_u16()? as usize;
        let flags = reader.read_u8()?;
        let wide = flags & FLAG_WIDE != 0;
        let has_ext = flags & FLAG_EXT != 0;
        let is_rich = flags & FLAG_RICH != 0;

        let run_count = if is_rich { reader.read_u16()? as usize } else { 0 };
        let ext_size = if has_ext { reader.read_u32()? as usize } else { 0 };

        let text = if wide {
            reader.read_unicode_le_string(char_count)?
        } else {
            reader.read_compressed_string(char_count)?
        };

        let mut rich_runs = Vec::with_capacity(run_count);
        for _ in 0..run_count {
            rich_runs.push(FormatRun {
                char_pos: reader.read_u16()?,
                font_index: reader.read_u16()?,
            });
        }
        let ext_data = reader.read_bytes(ext_size)?;

        Ok(UnicodeString {
            text,
            rich_runs,
            ext_data,
        })
    }

    /// Write the string through a continuation-aware writer.
    pub fn write(&self, out: &mut ChunkWriter) {
        let flags = self.flags();
        let wide = flags & FLAG_WIDE != 0;

        // Header and optional counts travel as one atomic unit
        let mut header = Vec::with_capacity(9);
        header.extend_from_slice(&(self.char_count() as u16).to_le_bytes());
        header.push(flags);
        if !self.rich_runs.is_empty() {
            header.extend_from_slice(&(self.rich_runs.len() as u16).to_le_bytes());
        }
        if !self.ext_data.is_empty() {
            header.extend_from_slice(&(self.ext_data.len() as u32).to_le_bytes());
        }
        out.write_atomic(&header);

        out.begin_string_region(flags);
        out.write_unicode_chars(&self.text, wide);
        out.end_string_region();

        for run in &self.rich_runs {
            let mut bytes = [0u8; 4];
            bytes[0..2].copy_from_slice(&run.char_pos.to_le_bytes());
            bytes[2..4].copy_from_slice(&run.font_index.to_le_bytes());
            out.write_atomic(&bytes);
        }
        out.write_bytes(&self.ext_data);
    }

    /// Unsplit encoded size: header, counts, characters, runs, extension.
    /// Flag bytes re-asserted at chunk breaks are framing, not content, and
    /// are excluded.
    pub fn encoded_size(&self) -> usize {
        let mut size = 3;
        if !self.rich_runs.is_empty() {
            size += 2 + 4 * self.rich_runs.len();
        }
        if !self.ext_data.is_empty() {
            size += 4 + self.ext_data.len();
        }
        let width = if self.needs_wide() { 2 } else { 1 };
        size + self.char_count() * width
    }
}
