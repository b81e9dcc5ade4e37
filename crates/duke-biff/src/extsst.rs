//! Bucket offset index computation for large string tables.
//!
//! The index lets a reader jump near a given string without scanning the
//! table from the start: one entry per fixed-size bucket of strings, giving
//! the absolute position of the bucket's first string within the logical
//! (continuation-spanning) table record, plus the offset relative to the
//! physical chunk that position falls in. The index is advisory — dropping
//! it never changes decoded content.
//!
//! The computation is a pure function of the per-string encoded sizes and
//! the bucket size. The position model assumes the writer packs chunks to
//! capacity: logical offsets cross a chunk boundary every
//! [`MAX_CHUNK_DATA`](crate::chunk::MAX_CHUNK_DATA) bytes.

use crate::chunk::{CHUNK_HEADER_SIZE, MAX_CHUNK_DATA};

/// Strings per bucket unless the cap forces a larger bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 8;

/// Hard cap on the number of index entries.
pub const MAX_BUCKETS: usize = 128;

/// Bytes of table header (total-refs + unique-count) before the strings.
const TABLE_HEADER_SIZE: usize = 8;

/// Serialized size of one index entry: position, chunk offset, reserved.
const ENTRY_SIZE: usize = 8;

/// One index entry: where a bucket's first string starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketIndexEntry {
    /// Absolute byte offset within the logical table record.
    pub stream_position: u32,
    /// Offset relative to the containing physical chunk, counted from the
    /// chunk's 4-byte header.
    pub chunk_offset: u16,
}

/// Computes bucket offset indexes and their serialized sizes.
pub struct BucketIndexBuilder;

impl BucketIndexBuilder {
    /// Bucket size actually used: grows past `bucket_size` when the entry
    /// cap would otherwise be exceeded.
    pub fn effective_bucket_size(string_count: usize, bucket_size: usize) -> usize {
        let bucket_size = bucket_size.max(1);
        let buckets = string_count.div_euclid(bucket_size)
            + usize::from(string_count % bucket_size != 0);
        if buckets > MAX_BUCKETS {
            string_count.div_euclid(MAX_BUCKETS) + usize::from(string_count % MAX_BUCKETS != 0)
        } else {
            bucket_size
        }
    }

    /// Number of index entries for `string_count` strings.
    pub fn bucket_count(string_count: usize, bucket_size: usize) -> usize {
        if string_count == 0 {
            return 0;
        }
        let eff = Self::effective_bucket_size(string_count, bucket_size);
        string_count.div_euclid(eff) + usize::from(string_count % eff != 0)
    }

    /// Compute one entry per bucket from the ordered per-string encoded
    /// sizes.
    pub fn build(string_sizes: &[usize], bucket_size: usize) -> Vec<BucketIndexEntry> {
        let eff = Self::effective_bucket_size(string_sizes.len(), bucket_size);
        let mut entries = Vec::with_capacity(Self::bucket_count(string_sizes.len(), bucket_size));
        let mut pos = TABLE_HEADER_SIZE;
        for (i, size) in string_sizes.iter().enumerate() {
            if i % eff == 0 {
                let within_chunk = pos % MAX_CHUNK_DATA;
                entries.push(BucketIndexEntry {
                    stream_position: pos as u32,
                    chunk_offset: (within_chunk + CHUNK_HEADER_SIZE) as u16,
                });
            }
            pos += size;
        }
        entries
    }

    /// Exact serialized size of the index record for `string_count`
    /// strings at the default bucket size: record header, bucket-size
    /// field, and one 8-byte entry per bucket. Lets writers pre-size
    /// output buffers before the index content is known.
    pub fn encoded_size(string_count: usize) -> usize {
        Self::encoded_size_with(string_count, DEFAULT_BUCKET_SIZE)
    }

    /// As [`encoded_size`](Self::encoded_size), for an explicit bucket size.
    pub fn encoded_size_with(string_count: usize, bucket_size: usize) -> usize {
        CHUNK_HEADER_SIZE + 2 + ENTRY_SIZE * Self::bucket_count(string_count, bucket_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_count_small() {
        assert_eq!(BucketIndexBuilder::bucket_count(0, 8), 0);
        assert_eq!(BucketIndexBuilder::bucket_count(1, 8), 1);
        assert_eq!(BucketIndexBuilder::bucket_count(8, 8), 1);
        assert_eq!(BucketIndexBuilder::bucket_count(9, 8), 2);
        assert_eq!(BucketIndexBuilder::bucket_count(1024, 8), 128);
    }

    #[test]
    fn test_bucket_count_never_exceeds_cap() {
        for n in [1025, 2000, 10_000, 1_000_000] {
            assert!(BucketIndexBuilder::bucket_count(n, 8) <= MAX_BUCKETS, "n = {n}");
        }
        // 1025 strings: bucket size grows to 9, yielding 114 buckets
        assert_eq!(BucketIndexBuilder::effective_bucket_size(1025, 8), 9);
        assert_eq!(BucketIndexBuilder::bucket_count(1025, 8), 114);
    }

    #[test]
    fn test_positions_start_after_table_header() {
        let sizes = vec![10; 20];
        let entries = BucketIndexBuilder::build(&sizes, 8);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].stream_position, 8);
        assert_eq!(entries[0].chunk_offset, 8 + 4);
        assert_eq!(entries[1].stream_position, 8 + 80);
        assert_eq!(entries[2].stream_position, 8 + 160);
    }

    #[test]
    fn test_chunk_offset_resets_past_boundary() {
        // 100 strings of 100 bytes: position 8 + 8300 for bucket index 10
        // falls in the second physical chunk
        let sizes = vec![100; 100];
        let entries = BucketIndexBuilder::build(&sizes, 8);

        let in_second_chunk = entries
            .iter()
            .find(|e| e.stream_position as usize >= MAX_CHUNK_DATA)
            .unwrap();
        let expected =
            (in_second_chunk.stream_position as usize % MAX_CHUNK_DATA) + CHUNK_HEADER_SIZE;
        assert_eq!(in_second_chunk.chunk_offset as usize, expected);
        assert!((in_second_chunk.chunk_offset as usize) < MAX_CHUNK_DATA + CHUNK_HEADER_SIZE);
    }

    #[test]
    fn test_encoded_size_formula() {
        assert_eq!(BucketIndexBuilder::encoded_size(0), 6);
        assert_eq!(BucketIndexBuilder::encoded_size(1), 6 + 8);
        assert_eq!(BucketIndexBuilder::encoded_size(16), 6 + 16);
        assert_eq!(BucketIndexBuilder::encoded_size(1_000_000), 6 + 8 * 128);
    }

    #[test]
    fn test_build_and_sizing_agree() {
        for n in [0usize, 1, 7, 8, 9, 64, 1023, 1024, 1025, 5000] {
            let sizes = vec![13; n];
            let entries = BucketIndexBuilder::build(&sizes, DEFAULT_BUCKET_SIZE);
            assert_eq!(
                BucketIndexBuilder::encoded_size(n),
                CHUNK_HEADER_SIZE + 2 + 8 * entries.len(),
                "n = {n}"
            );
        }
    }
}
