//! Shared string table and its bucket offset index record.

use std::io::Read;

use crate::chunk::ChunkReader;
use crate::cont::ChunkWriter;
use crate::error::{BiffError, BiffResult};
use crate::extsst::{BucketIndexBuilder, BucketIndexEntry, DEFAULT_BUCKET_SIZE};
use crate::records::frame;
use crate::sids;
use crate::strings::UnicodeString;

/// The shared string table. On the wire this is the record that most often
/// spans CONTINUE chunks; decoding leans entirely on the cursor's
/// transparent continuation crossing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SstRecord {
    /// Total string references in the workbook (cells may share entries).
    pub total_refs: u32,
    pub strings: Vec<UnicodeString>,
}

impl SstRecord {
    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let total_refs = r.read_u32()?;
        let unique = r.read_u32()? as usize;
        let mut strings = Vec::with_capacity(unique.min(100_000));
        for _ in 0..unique {
            strings.push(UnicodeString::read(r)?);
        }
        Ok(SstRecord {
            total_refs,
            strings,
        })
    }

    /// Serialize, splitting into CONTINUE chunks as the strings demand.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = ChunkWriter::new(sids::SST);
        w.write_u32(self.total_refs);
        w.write_u32(self.strings.len() as u32);
        for s in &self.strings {
            s.write(&mut w);
        }
        w.finish()
    }

    /// Build the bucket offset index for this table.
    pub fn create_ext_sst(&self) -> ExtSstRecord {
        let sizes: Vec<usize> = self.strings.iter().map(UnicodeString::encoded_size).collect();
        let eff = BucketIndexBuilder::effective_bucket_size(sizes.len(), DEFAULT_BUCKET_SIZE);
        ExtSstRecord {
            strings_per_bucket: eff as u16,
            entries: BucketIndexBuilder::build(&sizes, DEFAULT_BUCKET_SIZE),
        }
    }
}

/// Bucket offset index into the shared string table. Advisory: readers use
/// it to jump near a string index, never for correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtSstRecord {
    pub strings_per_bucket: u16,
    pub entries: Vec<BucketIndexEntry>,
}

impl ExtSstRecord {
    pub fn read<R: Read>(r: &mut ChunkReader<R>) -> BiffResult<Self> {
        let strings_per_bucket = r.read_u16()?;
        let rest = r.remaining_in_chunk();
        if rest % 8 != 0 {
            return Err(BiffError::Format(format!(
                "EXTSST entry array has invalid size {rest}"
            )));
        }
        let mut entries = Vec::with_capacity(rest / 8);
        for _ in 0..rest / 8 {
            let stream_position = r.read_u32()?;
            let chunk_offset = r.read_u16()?;
            let _reserved = r.read_u16()?;
            entries.push(BucketIndexEntry {
                stream_position,
                chunk_offset,
            });
        }
        Ok(ExtSstRecord {
            strings_per_bucket,
            entries,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(2 + 8 * self.entries.len());
        body.extend_from_slice(&self.strings_per_bucket.to_le_bytes());
        for entry in &self.entries {
            body.extend_from_slice(&entry.stream_position.to_le_bytes());
            body.extend_from_slice(&entry.chunk_offset.to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
        }
        frame(sids::EXTSST, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extsst::BucketIndexBuilder;
    use std::io::Cursor;

    fn read_sst(framed: Vec<u8>) -> SstRecord {
        let mut r = ChunkReader::new(Cursor::new(framed)).unwrap();
        r.advance().unwrap();
        SstRecord::read(&mut r).unwrap()
    }

    #[test]
    fn test_small_sst_round_trip() {
        let sst = SstRecord {
            total_refs: 5,
            strings: vec![
                UnicodeString::new("alpha"),
                UnicodeString::new("β"),
                UnicodeString::new("gamma"),
            ],
        };
        let back = read_sst(sst.serialize());
        assert_eq!(back, sst);
    }

    #[test]
    fn test_sst_spanning_continuations_round_trip() {
        // ~40 KB of string data forces several CONTINUE chunks
        let strings: Vec<UnicodeString> = (0..200)
            .map(|i| UnicodeString::new(format!("string-{i}-{}", "x".repeat(190))))
            .collect();
        let sst = SstRecord {
            total_refs: 200,
            strings,
        };
        let back = read_sst(sst.serialize());
        assert_eq!(back, sst);
    }

    #[test]
    fn test_ext_sst_round_trip() {
        let rec = ExtSstRecord {
            strings_per_bucket: 8,
            entries: vec![
                BucketIndexEntry {
                    stream_position: 8,
                    chunk_offset: 12,
                },
                BucketIndexEntry {
                    stream_position: 900,
                    chunk_offset: 904,
                },
            ],
        };
        let mut r = ChunkReader::new(Cursor::new(rec.serialize())).unwrap();
        r.advance().unwrap();
        assert_eq!(ExtSstRecord::read(&mut r).unwrap(), rec);
    }

    #[test]
    fn test_ext_sst_size_matches_builder_estimate() {
        for n in [0usize, 1, 8, 9, 100, 1024, 1025] {
            let sst = SstRecord {
                total_refs: n as u32,
                strings: (0..n).map(|i| UnicodeString::new(format!("s{i}"))).collect(),
            };
            let ext = sst.create_ext_sst();
            assert_eq!(
                ext.serialize().len(),
                BucketIndexBuilder::encoded_size(n),
                "n = {n}"
            );
        }
    }
}
