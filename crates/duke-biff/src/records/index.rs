//! Row-block position index records.
//!
//! INDEX locates the row blocks of a sheet; DBCELL locates the cells of one
//! row block. Both are lookup-acceleration caches a writer regenerates from
//! scratch, which is why the assembler drops DBCELL instead of propagating
//! a possibly-stale copy.

use std::io::Read;

use crate::chunk::ChunkReader;
use crate::error::{BiffError, BiffResult};
use crate::records::frame;
use crate::sids;

/// Sheet-level row block index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub reserved: u32,
    pub first_row: u32,
    /// One past the last row.
    pub last_row_add1: u32,
    pub reserved2: u32,
    /// Absolute stream offsets of the sheet's DBCELL records.
    pub dbcell_offsets: Vec<u32>,
}

impl IndexRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let reserved = r.read_u32()?;
        let first_row = r.read_u32()?;
        let last_row_add1 = r.read_u32()?;
        let reserved2 = r.read_u32()?;
        let rest = r.remaining_in_chunk();
        if rest % 4 != 0 {
            return Err(BiffError::Format(format!(
                "INDEX offset array has invalid size {rest}"
            )));
        }
        let mut dbcell_offsets = Vec::with_capacity(rest / 4);
        for _ in 0..rest / 4 {
            dbcell_offsets.push(r.read_u32()?);
        }
        Ok(IndexRecord {
            reserved,
            first_row,
            last_row_add1,
            reserved2,
            dbcell_offsets,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(16 + 4 * self.dbcell_offsets.len());
        body.extend_from_slice(&self.reserved.to_le_bytes());
        body.extend_from_slice(&self.first_row.to_le_bytes());
        body.extend_from_slice(&self.last_row_add1.to_le_bytes());
        body.extend_from_slice(&self.reserved2.to_le_bytes());
        for offset in &self.dbcell_offsets {
            body.extend_from_slice(&offset.to_le_bytes());
        }
        frame(sids::INDEX, &body)
    }
}

/// Per-row-block cell offset cache. Decoded for completeness but never
/// yielded by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCellRecord {
    /// Distance back from this record to the block's first ROW record.
    pub row_offset: u32,
    /// Per-row offsets to the first cell record.
    pub cell_offsets: Vec<u16>,
}

impl DbCellRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let row_offset = r.read_u32()?;
        let rest = r.remaining_in_chunk();
        if rest % 2 != 0 {
            return Err(BiffError::Format(format!(
                "DBCELL offset array has invalid size {rest}"
            )));
        }
        let mut cell_offsets = Vec::with_capacity(rest / 2);
        for _ in 0..rest / 2 {
            cell_offsets.push(r.read_u16()?);
        }
        Ok(DbCellRecord {
            row_offset,
            cell_offsets,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(4 + 2 * self.cell_offsets.len());
        body.extend_from_slice(&self.row_offset.to_le_bytes());
        for offset in &self.cell_offsets {
            body.extend_from_slice(&offset.to_le_bytes());
        }
        frame(sids::DBCELL, &body)
    }
}
