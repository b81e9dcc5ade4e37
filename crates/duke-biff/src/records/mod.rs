//! Typed record catalogue and the sid → decoder registry.
//!
//! Every record decodes from a [`ChunkReader`] positioned just past the
//! chunk header and serializes back to framed bytes losslessly. Types the
//! registry does not interpret fall through to [`UnknownRecord`], which
//! preserves the raw body — real-world producers emit many vendor- and
//! version-specific records the core never needs to understand.

mod cells;
mod drawing;
mod index;
mod sst;
mod stream;

pub use cells::{
    decode_rk, BlankRecord, BoolErrRecord, LabelSstRecord, MulBlankRecord, MulRkRecord,
    NumberRecord, RkRecord, RowRecord,
};
pub use drawing::{DrawingGroupRecord, DrawingRecord, ObjRecord, TextObjectRecord};
pub use index::{DbCellRecord, IndexRecord};
pub use sst::{ExtSstRecord, SstRecord};
pub use stream::{BofRecord, ContinueRecord, EofRecord, UnknownRecord};

use std::io::Read;

use crate::chunk::{ChunkReader, MAX_CHUNK_DATA};
use crate::error::BiffResult;
use crate::sids;

/// Frame a body that fits a single physical chunk.
pub(crate) fn frame(sid: u16, body: &[u8]) -> Vec<u8> {
    debug_assert!(body.len() <= MAX_CHUNK_DATA);
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&sid.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// One fully-assembled logical record.
///
/// Owned and detached: safe to keep arbitrarily long after the stream that
/// produced it has moved on.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Bof(BofRecord),
    Eof(EofRecord),
    Row(RowRecord),
    Index(IndexRecord),
    DbCell(DbCellRecord),
    Blank(BlankRecord),
    MulBlank(MulBlankRecord),
    Number(NumberRecord),
    Rk(RkRecord),
    MulRk(MulRkRecord),
    BoolErr(BoolErrRecord),
    LabelSst(LabelSstRecord),
    Sst(SstRecord),
    ExtSst(ExtSstRecord),
    Continue(ContinueRecord),
    Obj(ObjRecord),
    TextObject(TextObjectRecord),
    Drawing(DrawingRecord),
    DrawingGroup(DrawingGroupRecord),
    Unknown(UnknownRecord),
}

impl Record {
    /// The record's type tag.
    pub fn sid(&self) -> u16 {
        match self {
            Record::Bof(_) => sids::BOF,
            Record::Eof(_) => sids::EOF,
            Record::Row(_) => sids::ROW,
            Record::Index(_) => sids::INDEX,
            Record::DbCell(_) => sids::DBCELL,
            Record::Blank(_) => sids::BLANK,
            Record::MulBlank(_) => sids::MULBLANK,
            Record::Number(_) => sids::NUMBER,
            Record::Rk(_) => sids::RK,
            Record::MulRk(_) => sids::MULRK,
            Record::BoolErr(_) => sids::BOOLERR,
            Record::LabelSst(_) => sids::LABELSST,
            Record::Sst(_) => sids::SST,
            Record::ExtSst(_) => sids::EXTSST,
            Record::Continue(_) => sids::CONTINUE,
            Record::Obj(_) => sids::OBJ,
            Record::TextObject(_) => sids::TXO,
            Record::Drawing(_) => sids::MSODRAWING,
            Record::DrawingGroup(_) => sids::MSODRAWINGGROUP,
            Record::Unknown(rec) => rec.sid,
        }
    }

    /// Serialize to framed bytes, CONTINUE splits included where a payload
    /// demands them.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Record::Bof(rec) => rec.serialize(),
            Record::Eof(rec) => rec.serialize(),
            Record::Row(rec) => rec.serialize(),
            Record::Index(rec) => rec.serialize(),
            Record::DbCell(rec) => rec.serialize(),
            Record::Blank(rec) => rec.serialize(),
            Record::MulBlank(rec) => rec.serialize(),
            Record::Number(rec) => rec.serialize(),
            Record::Rk(rec) => rec.serialize(),
            Record::MulRk(rec) => rec.serialize(),
            Record::BoolErr(rec) => rec.serialize(),
            Record::LabelSst(rec) => rec.serialize(),
            Record::Sst(rec) => rec.serialize(),
            Record::ExtSst(rec) => rec.serialize(),
            Record::Continue(rec) => rec.serialize(),
            Record::Obj(rec) => rec.serialize(),
            Record::TextObject(rec) => rec.serialize(),
            Record::Drawing(rec) => rec.serialize(),
            Record::DrawingGroup(rec) => rec.serialize(),
            Record::Unknown(rec) => rec.serialize(),
        }
    }
}

/// Decode the current chunk into a typed record.
///
/// The reader must be positioned at the start of a freshly-advanced chunk.
/// Decoders for continuation-spanning types (SST) consume their CONTINUE
/// chunks through the reader as they go.
pub fn decode_record<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Record> {
    match r.sid() {
        sids::BOF => BofRecord::read(r).map(Record::Bof),
        sids::EOF => EofRecord::read(r).map(Record::Eof),
        sids::ROW => RowRecord::read(r).map(Record::Row),
        sids::INDEX => IndexRecord::read(r).map(Record::Index),
        sids::DBCELL => DbCellRecord::read(r).map(Record::DbCell),
        sids::BLANK => BlankRecord::read(r).map(Record::Blank),
        sids::MULBLANK => MulBlankRecord::read(r).map(Record::MulBlank),
        sids::NUMBER => NumberRecord::read(r).map(Record::Number),
        sids::RK => RkRecord::read(r).map(Record::Rk),
        sids::MULRK => MulRkRecord::read(r).map(Record::MulRk),
        sids::BOOLERR => BoolErrRecord::read(r).map(Record::BoolErr),
        sids::LABELSST => LabelSstRecord::read(r).map(Record::LabelSst),
        sids::SST => SstRecord::read(r).map(Record::Sst),
        sids::EXTSST => ExtSstRecord::read(r).map(Record::ExtSst),
        sids::OBJ => ObjRecord::read(r).map(Record::Obj),
        sids::TXO => TextObjectRecord::read(r).map(Record::TextObject),
        sids::MSODRAWING => DrawingRecord::read(r).map(Record::Drawing),
        sids::MSODRAWINGGROUP => DrawingGroupRecord::read(r).map(Record::DrawingGroup),
        _ => UnknownRecord::read(r).map(Record::Unknown),
    }
}
