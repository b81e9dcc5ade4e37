//! Holder records whose payload is raw drawing/object data.
//!
//! These are the record types declared mergeable-with-predecessor: the
//! assembler concatenates following CONTINUE chunk bodies onto the holder's
//! buffer instead of surfacing them. The two Escher holders additionally
//! decode their reassembled buffer into a nested record tree on demand —
//! never before reassembly is complete.

use std::io::Read;

use crate::chunk::ChunkReader;
use crate::cont::ChunkWriter;
use crate::error::BiffResult;
use crate::escher::{self, EscherRecord};
use crate::sids;

macro_rules! raw_holder_common {
    ($name:ident, $sid:expr) => {
        impl $name {
            pub fn new(data: Vec<u8>) -> Self {
                Self {
                    data,
                    ..Self::default()
                }
            }

            pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
                Ok(Self::new(r.read_remainder()))
            }

            /// The reassembled payload.
            pub fn raw_bytes(&self) -> &[u8] {
                &self.data
            }

            /// Serialize, re-splitting payloads past the chunk limit into
            /// CONTINUE chunks.
            pub fn serialize(&self) -> Vec<u8> {
                let mut w = ChunkWriter::new($sid);
                w.write_bytes(&self.data);
                w.finish()
            }
        }
    };
}

/// Sheet-level Escher drawing data (MSODRAWING).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawingRecord {
    data: Vec<u8>,
    /// Tree decoded eagerly at assembly time, when so configured.
    nested: Option<Vec<EscherRecord>>,
}

/// Workbook-level Escher drawing group data (MSODRAWINGGROUP).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawingGroupRecord {
    data: Vec<u8>,
    nested: Option<Vec<EscherRecord>>,
}

raw_holder_common!(DrawingRecord, sids::MSODRAWING);
raw_holder_common!(DrawingGroupRecord, sids::MSODRAWINGGROUP);

macro_rules! escher_holder_impl {
    ($name:ident) => {
        impl $name {
            /// Replace the payload. Any cached tree is invalidated.
            pub fn set_raw_bytes(&mut self, data: Vec<u8>) {
                self.data = data;
                self.nested = None;
            }

            /// Extend the payload with a continuation chunk's bytes.
            pub fn append_continuation(&mut self, extra: &[u8]) {
                self.data.extend_from_slice(extra);
                self.nested = None;
            }

            /// Decode the payload into a nested record tree.
            pub fn decode_nested(&self) -> BiffResult<Vec<EscherRecord>> {
                escher::decode_tree(&self.data)
            }

            /// The tree decoded at assembly time, if eager decode was on.
            pub fn nested(&self) -> Option<&[EscherRecord]> {
                self.nested.as_deref()
            }

            pub(crate) fn cache_nested(&mut self) -> BiffResult<()> {
                self.nested = Some(escher::decode_tree(&self.data)?);
                Ok(())
            }
        }
    };
}

escher_holder_impl!(DrawingRecord);
escher_holder_impl!(DrawingGroupRecord);

impl DrawingGroupRecord {
    /// Join a back-to-back record of the same kind: the second's entire
    /// buffer is appended and only this record is ultimately yielded.
    pub fn join(&mut self, other: DrawingGroupRecord) {
        self.data.extend_from_slice(&other.data);
        self.nested = None;
    }
}

/// Object descriptor (OBJ). The payload is a blob of ftCmo-style
/// sub-records, kept opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjRecord {
    data: Vec<u8>,
}

/// Text object (TXO). Text and formatting runs follow in continuations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextObjectRecord {
    data: Vec<u8>,
}

raw_holder_common!(ObjRecord, sids::OBJ);
raw_holder_common!(TextObjectRecord, sids::TXO);

macro_rules! opaque_holder_impl {
    ($name:ident) => {
        impl $name {
            /// Replace the payload.
            pub fn set_raw_bytes(&mut self, data: Vec<u8>) {
                self.data = data;
            }

            /// Extend the payload with a continuation chunk's bytes.
            pub fn append_continuation(&mut self, extra: &[u8]) {
                self.data.extend_from_slice(extra);
            }
        }
    };
}

opaque_holder_impl!(ObjRecord);
opaque_holder_impl!(TextObjectRecord);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::MAX_CHUNK_DATA;
    use crate::escher::EscherPayload;
    use std::io::Cursor;

    fn escher_leaf(record_id: u16, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&record_id.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_holder_round_trip() {
        let rec = DrawingRecord::new(vec![1, 2, 3, 4]);
        let framed = rec.serialize();
        let mut r = ChunkReader::new(Cursor::new(framed)).unwrap();
        r.advance().unwrap();
        assert_eq!(DrawingRecord::read(&mut r).unwrap(), rec);
    }

    #[test]
    fn test_large_holder_serializes_with_continue() {
        let rec = DrawingGroupRecord::new(vec![7u8; MAX_CHUNK_DATA + 10]);
        let framed = rec.serialize();

        assert_eq!(&framed[0..2], &sids::MSODRAWINGGROUP.to_le_bytes());
        let cont_at = 4 + MAX_CHUNK_DATA;
        assert_eq!(&framed[cont_at..cont_at + 2], &sids::CONTINUE.to_le_bytes());
    }

    #[test]
    fn test_append_continuation_then_decode() {
        let body = escher_leaf(0xF00B, &[0xAA; 16]);
        let (head, tail) = body.split_at(10);

        let mut rec = DrawingRecord::new(head.to_vec());
        rec.append_continuation(tail);
        let tree = rec.decode_nested().unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].record_id, 0xF00B);
        assert_eq!(tree[0].payload, EscherPayload::Leaf(vec![0xAA; 16]));
    }

    #[test]
    fn test_join_concatenates_buffers() {
        let mut first = DrawingGroupRecord::new(vec![1, 2]);
        let second = DrawingGroupRecord::new(vec![3, 4]);
        first.join(second);
        assert_eq!(first.raw_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_set_raw_bytes_invalidates_cache() {
        let mut rec = DrawingRecord::new(escher_leaf(0xF00B, &[1, 2]));
        rec.cache_nested().unwrap();
        assert!(rec.nested().is_some());

        rec.set_raw_bytes(vec![9, 9]);
        assert!(rec.nested().is_none());
    }
}
