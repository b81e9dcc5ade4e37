//! Cell value records.
//!
//! The packed forms (RK, MULRK, MULBLANK) exist to keep files small; the
//! assembler can rewrite them into their canonical single-cell equivalents
//! so downstream consumers only ever see NUMBER and BLANK.

use std::io::Read;

use crate::chunk::{ChunkReader, RawDouble};
use crate::error::{BiffError, BiffResult};
use crate::records::frame;
use crate::sids;

/// Decode an RK-encoded number.
///
/// RK encoding (4 bytes):
/// - Bit 0: if 1, the decoded number should be divided by 100
/// - Bit 1: if 1, value is an integer (bits 2..31 as signed 30-bit int)
///           if 0, value is an IEEE 754 double (bits 2..31 are the upper 30
///           bits, lower 34 bits of the double are zero)
#[inline]
pub fn decode_rk(rk: u32) -> f64 {
    let div100 = (rk & 0x01) != 0;
    let is_integer = (rk & 0x02) != 0;

    let value = if is_integer {
        // Signed 30-bit integer in bits 2..31
        ((rk as i32) >> 2) as f64
    } else {
        // IEEE 754 double with upper 30 bits from rk (bits 2..31)
        // and lower 34 bits set to zero.
        let upper = (rk & 0xFFFF_FFFC) as u64;
        f64::from_bits(upper << 32)
    };

    if div100 {
        value / 100.0
    } else {
        value
    }
}

/// Row properties: height, outline, default format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub row: u16,
    pub first_col: u16,
    /// One past the last defined column.
    pub last_col: u16,
    pub height: u16,
    pub optimize: u16,
    pub reserved: u16,
    pub option_flags: u16,
    pub xf_index: u16,
}

impl RowRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(RowRecord {
            row: r.read_u16()?,
            first_col: r.read_u16()?,
            last_col: r.read_u16()?,
            height: r.read_u16()?,
            optimize: r.read_u16()?,
            reserved: r.read_u16()?,
            option_flags: r.read_u16()?,
            xf_index: r.read_u16()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(16);
        for v in [
            self.row,
            self.first_col,
            self.last_col,
            self.height,
            self.optimize,
            self.reserved,
            self.option_flags,
            self.xf_index,
        ] {
            body.extend_from_slice(&v.to_le_bytes());
        }
        frame(sids::ROW, &body)
    }
}

/// Empty cell carrying only formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankRecord {
    pub row: u16,
    pub col: u16,
    pub xf_index: u16,
}

impl BlankRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(BlankRecord {
            row: r.read_u16()?,
            col: r.read_u16()?,
            xf_index: r.read_u16()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(6);
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.col.to_le_bytes());
        body.extend_from_slice(&self.xf_index.to_le_bytes());
        frame(sids::BLANK, &body)
    }
}

/// Run of blank cells in one row: first column, one XF index per cell,
/// last column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulBlankRecord {
    pub row: u16,
    pub first_col: u16,
    pub xf_indexes: Vec<u16>,
}

impl MulBlankRecord {
    pub fn last_col(&self) -> u16 {
        self.first_col + self.xf_indexes.len().saturating_sub(1) as u16
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let row = r.read_u16()?;
        let first_col = r.read_u16()?;
        let rest = r.remaining_in_chunk();
        if rest < 4 || rest % 2 != 0 {
            return Err(BiffError::Format(format!(
                "MULBLANK body has invalid trailing size {rest}"
            )));
        }
        let count = (rest - 2) / 2;
        let mut xf_indexes = Vec::with_capacity(count);
        for _ in 0..count {
            xf_indexes.push(r.read_u16()?);
        }
        let last_col = r.read_u16()?;
        let expected = first_col + count.saturating_sub(1) as u16;
        if last_col != expected {
            return Err(BiffError::Format(format!(
                "MULBLANK last column {last_col} does not match {count} cells from column {first_col}"
            )));
        }
        Ok(MulBlankRecord {
            row,
            first_col,
            xf_indexes,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(6 + 2 * self.xf_indexes.len());
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.first_col.to_le_bytes());
        for xf in &self.xf_indexes {
            body.extend_from_slice(&xf.to_le_bytes());
        }
        body.extend_from_slice(&self.last_col().to_le_bytes());
        frame(sids::MULBLANK, &body)
    }

    /// Expand into per-cell BLANK records, column ascending.
    pub fn expand(&self) -> Vec<BlankRecord> {
        self.xf_indexes
            .iter()
            .enumerate()
            .map(|(i, &xf_index)| BlankRecord {
                row: self.row,
                col: self.first_col + i as u16,
                xf_index,
            })
            .collect()
    }
}

/// Cell holding a full IEEE 754 double. The wire bytes are kept so NaN
/// payloads (error-code cells) round-trip verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberRecord {
    pub row: u16,
    pub col: u16,
    pub xf_index: u16,
    pub value: RawDouble,
}

impl NumberRecord {
    pub fn value(&self) -> f64 {
        self.value.value()
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(NumberRecord {
            row: r.read_u16()?,
            col: r.read_u16()?,
            xf_index: r.read_u16()?,
            value: r.read_raw_double()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(14);
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.col.to_le_bytes());
        body.extend_from_slice(&self.xf_index.to_le_bytes());
        body.extend_from_slice(&self.value.to_le_bytes());
        frame(sids::NUMBER, &body)
    }
}

/// Cell holding an RK-packed number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RkRecord {
    pub row: u16,
    pub col: u16,
    pub xf_index: u16,
    pub rk: u32,
}

impl RkRecord {
    pub fn value(&self) -> f64 {
        decode_rk(self.rk)
    }

    /// The canonical full-precision equivalent.
    pub fn to_number(&self) -> NumberRecord {
        NumberRecord {
            row: self.row,
            col: self.col,
            xf_index: self.xf_index,
            value: RawDouble::from(self.value()),
        }
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(RkRecord {
            row: r.read_u16()?,
            col: r.read_u16()?,
            xf_index: r.read_u16()?,
            rk: r.read_u32()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(10);
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.col.to_le_bytes());
        body.extend_from_slice(&self.xf_index.to_le_bytes());
        body.extend_from_slice(&self.rk.to_le_bytes());
        frame(sids::RK, &body)
    }
}

/// Run of RK numbers in one row: first column, (XF, RK) per cell, last
/// column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulRkRecord {
    pub row: u16,
    pub first_col: u16,
    /// Per-cell (XF index, RK value) pairs, column ascending.
    pub cells: Vec<(u16, u32)>,
}

impl MulRkRecord {
    pub fn last_col(&self) -> u16 {
        self.first_col + self.cells.len().saturating_sub(1) as u16
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let row = r.read_u16()?;
        let first_col = r.read_u16()?;
        let rest = r.remaining_in_chunk();
        if rest < 8 || (rest - 2) % 6 != 0 {
            return Err(BiffError::Format(format!(
                "MULRK body has invalid trailing size {rest}"
            )));
        }
        let count = (rest - 2) / 6;
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let xf = r.read_u16()?;
            let rk = r.read_u32()?;
            cells.push((xf, rk));
        }
        let last_col = r.read_u16()?;
        let expected = first_col + count.saturating_sub(1) as u16;
        if last_col != expected {
            return Err(BiffError::Format(format!(
                "MULRK last column {last_col} does not match {count} cells from column {first_col}"
            )));
        }
        Ok(MulRkRecord {
            row,
            first_col,
            cells,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(6 + 6 * self.cells.len());
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.first_col.to_le_bytes());
        for (xf, rk) in &self.cells {
            body.extend_from_slice(&xf.to_le_bytes());
            body.extend_from_slice(&rk.to_le_bytes());
        }
        body.extend_from_slice(&self.last_col().to_le_bytes());
        frame(sids::MULRK, &body)
    }

    /// Expand into per-cell NUMBER records, column ascending.
    pub fn expand(&self) -> Vec<NumberRecord> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &(xf_index, rk))| NumberRecord {
                row: self.row,
                col: self.first_col + i as u16,
                xf_index,
                value: RawDouble::from(decode_rk(rk)),
            })
            .collect()
    }
}

/// Boolean or error-code cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolErrRecord {
    pub row: u16,
    pub col: u16,
    pub xf_index: u16,
    /// Boolean 0/1, or an error code when `is_error` is set.
    pub value: u8,
    pub is_error: bool,
}

impl BoolErrRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(BoolErrRecord {
            row: r.read_u16()?,
            col: r.read_u16()?,
            xf_index: r.read_u16()?,
            value: r.read_u8()?,
            is_error: r.read_u8()? != 0,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(8);
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.col.to_le_bytes());
        body.extend_from_slice(&self.xf_index.to_le_bytes());
        body.push(self.value);
        body.push(u8::from(self.is_error));
        frame(sids::BOOLERR, &body)
    }
}

/// Cell referencing a shared string table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSstRecord {
    pub row: u16,
    pub col: u16,
    pub xf_index: u16,
    pub sst_index: u32,
}

impl LabelSstRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        Ok(LabelSstRecord {
            row: r.read_u16()?,
            col: r.read_u16()?,
            xf_index: r.read_u16()?,
            sst_index: r.read_u32()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(10);
        body.extend_from_slice(&self.row.to_le_bytes());
        body.extend_from_slice(&self.col.to_le_bytes());
        body.extend_from_slice(&self.xf_index.to_le_bytes());
        body.extend_from_slice(&self.sst_index.to_le_bytes());
        frame(sids::LABELSST, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode_body<T>(
        framed: Vec<u8>,
        read: impl FnOnce(&mut ChunkReader<Cursor<Vec<u8>>>) -> BiffResult<T>,
    ) -> T {
        let mut r = ChunkReader::new(Cursor::new(framed)).unwrap();
        r.advance().unwrap();
        let v = read(&mut r).unwrap();
        assert_eq!(r.remaining_in_chunk(), 0, "decoder left bytes unread");
        v
    }

    #[test]
    fn test_decode_rk_integer() {
        // Integer 42: bits 2..31 = 42, bit 1 = 1 (integer), bit 0 = 0
        let rk = (42u32 << 2) | 0x02;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_integer_negative() {
        let rk = ((-5i32 << 2) as u32) | 0x02;
        assert_eq!(decode_rk(rk), -5.0);
    }

    #[test]
    fn test_decode_rk_integer_div100() {
        // Integer 4200 / 100 = 42.0
        let rk = (4200u32 << 2) | 0x03;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_float() {
        // Upper 30 bits of the double go into bits 2..31, bits 0-1 = 0
        let bits = 42.0_f64.to_bits();
        let rk = ((bits >> 32) as u32) & 0xFFFF_FFFC;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_known_values() {
        assert_eq!(decode_rk(0x0000_00AA), 42.0);
        assert!((decode_rk(0x0000_04EB) - 3.14).abs() < f64::EPSILON);
        assert_eq!(decode_rk(0xFFFF_FE72), -100.0);
        assert_eq!(decode_rk(0x0000_0002), 0.0);
    }

    #[test]
    fn test_number_round_trip() {
        let rec = NumberRecord {
            row: 3,
            col: 7,
            xf_index: 15,
            value: RawDouble::from(2.5),
        };
        let back = decode_body(rec.serialize(), NumberRecord::read);
        assert_eq!(back, rec);
    }

    #[test]
    fn test_mulrk_round_trip_and_expand() {
        let rec = MulRkRecord {
            row: 2,
            first_col: 5,
            cells: vec![(10, 0x0000_00AA), (11, 0x0000_04EB), (12, 0x0000_0002)],
        };
        let back = decode_body(rec.serialize(), MulRkRecord::read);
        assert_eq!(back, rec);
        assert_eq!(back.last_col(), 7);

        let expanded = rec.expand();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].col, 5);
        assert_eq!(expanded[0].value(), 42.0);
        assert_eq!(expanded[1].col, 6);
        assert_eq!(expanded[2].col, 7);
        assert_eq!(expanded[2].xf_index, 12);
    }

    #[test]
    fn test_mulblank_round_trip_and_expand() {
        let rec = MulBlankRecord {
            row: 9,
            first_col: 1,
            xf_indexes: vec![20, 21, 22, 23],
        };
        let back = decode_body(rec.serialize(), MulBlankRecord::read);
        assert_eq!(back, rec);

        let expanded = rec.expand();
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[3].col, 4);
        assert_eq!(expanded[3].xf_index, 23);
    }

    #[test]
    fn test_mulrk_bad_last_col_is_error() {
        let mut framed = MulRkRecord {
            row: 0,
            first_col: 0,
            cells: vec![(0, 2)],
        }
        .serialize();
        // Corrupt the trailing last-column field
        let at = framed.len() - 2;
        framed[at] = 0xFF;

        let mut r = ChunkReader::new(Cursor::new(framed)).unwrap();
        r.advance().unwrap();
        assert!(matches!(MulRkRecord::read(&mut r), Err(BiffError::Format(_))));
    }

    #[test]
    fn test_boolerr_round_trip() {
        let rec = BoolErrRecord {
            row: 1,
            col: 2,
            xf_index: 3,
            value: 0x2A, // #N/A error code
            is_error: true,
        };
        let back = decode_body(rec.serialize(), BoolErrRecord::read);
        assert_eq!(back, rec);
    }

    #[test]
    fn test_row_round_trip() {
        let rec = RowRecord {
            row: 40,
            first_col: 0,
            last_col: 12,
            height: 255,
            optimize: 0,
            reserved: 0,
            option_flags: 0x0100,
            xf_index: 15,
        };
        let back = decode_body(rec.serialize(), RowRecord::read);
        assert_eq!(back, rec);
    }
}
