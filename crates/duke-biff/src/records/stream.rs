//! Stream-structure records: substream markers, continuations, and the
//! opaque passthrough for unrecognized types.

use std::io::Read;

use crate::chunk::ChunkReader;
use crate::error::BiffResult;
use crate::records::frame;
use crate::sids;

/// Begin-of-substream marker. Every substream (workbook globals, sheet,
/// chart) opens with one; nesting is tracked to infer end of stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BofRecord {
    pub version: u16,
    /// Substream type: workbook globals, worksheet, chart, macro.
    pub doc_type: u16,
    pub build: u16,
    pub build_year: u16,
    pub history: u32,
    pub required_version: u32,
}

impl BofRecord {
    pub fn new(doc_type: u16) -> Self {
        BofRecord {
            version: sids::BIFF8_VERSION,
            doc_type,
            build: 0x0DBB,
            build_year: 1996,
            history: 0x41,
            required_version: 0x0006,
        }
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(BofRecord {
            version: r.read_u16()?,
            doc_type: r.read_u16()?,
            build: r.read_u16()?,
            build_year: r.read_u16()?,
            history: r.read_u32()?,
            required_version: r.read_u32()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(16);
        body.extend_from_slice(&self.version.to_le_bytes());
        body.extend_from_slice(&self.doc_type.to_le_bytes());
        body.extend_from_slice(&self.build.to_le_bytes());
        body.extend_from_slice(&self.build_year.to_le_bytes());
        body.extend_from_slice(&self.history.to_le_bytes());
        body.extend_from_slice(&self.required_version.to_le_bytes());
        frame(sids::BOF, &body)
    }
}

/// End-of-substream marker. Empty body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EofRecord;

impl EofRecord {
    pub fn read<R: Read>(_r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(EofRecord)
    }

    pub fn serialize(&self) -> Vec<u8> {
        frame(sids::EOF, &[])
    }
}

/// A continuation chunk surfaced as its own record. Only produced when the
/// assembler is configured to expose the original chunk boundaries after
/// OBJ and TXO records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueRecord {
    pub data: Vec<u8>,
}

impl ContinueRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(ContinueRecord {
            data: r.read_remainder(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        frame(sids::CONTINUE, &self.data)
    }
}

/// Passthrough for record types the registry does not interpret. Raw bytes
/// are preserved so the record re-serializes losslessly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecord {
    pub sid: u16,
    pub data: Vec<u8>,
}

impl UnknownRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(UnknownRecord {
            sid: r.sid(),
            data: r.read_remainder(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        frame(self.sid, &self.data)
    }
}
