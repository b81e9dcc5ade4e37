//! Low-level record stream layer for the legacy BIFF8 spreadsheet binary
//! format.
//!
//! A BIFF8 stream is a flat run of physical chunks — `type (2 bytes) |
//! length (2 bytes) | body` — with no outer framing. One logical record may
//! span several chunks: bodies longer than 8224 bytes continue into
//! CONTINUE (0x003C) chunks, with type-specific rules about what may split
//! where. This crate reassembles that stream into typed, self-contained
//! records, and serializes them back.
//!
//! # Architecture
//!
//! The layer is built bottom-up:
//! - **Chunk cursor** (`chunk`): one physical chunk at a time in a reused
//!   buffer, typed little-endian reads, transparent continuation crossing.
//! - **Chunk writer** (`cont`): the encode-side dual, splitting logical
//!   payloads into CONTINUE chunks on demand.
//! - **Records** (`records`): the typed catalogue and the sid → decoder
//!   registry; unrecognized types pass through opaquely.
//! - **Assembler** (`assembler`): the pull-style state machine applying
//!   merge/drop/convert rules and inferring end of stream from BOF/EOF
//!   nesting.
//! - **Nested decode** (`escher`): the recursive drawing sub-format held
//!   inside drawing records, decoded lazily.
//! - **Bucket index** (`extsst`): offset index computation for large
//!   string tables.
//!
//! # Example
//!
//! ```rust,no_run
//! use duke_biff::{RecordStream, Record};
//!
//! # fn example() -> duke_biff::BiffResult<()> {
//! let bytes: Vec<u8> = std::fs::read("workbook.stream")?;
//! let mut stream = RecordStream::new(std::io::Cursor::new(bytes))?;
//! while let Some(record) = stream.next_record()? {
//!     if let Record::Sst(sst) = &record {
//!         println!("{} shared strings", sst.unique_count());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod chunk;
pub mod cont;
pub mod error;
pub mod escher;
pub mod extsst;
pub mod records;
pub mod sids;
pub mod strings;

// Re-export key types
pub use assembler::{AssemblerConfig, RecordStream};
pub use chunk::{ChunkReader, RawDouble, CHUNK_HEADER_SIZE, MAX_CHUNK_DATA};
pub use cont::ChunkWriter;
pub use error::{BiffError, BiffResult};
pub use escher::{EscherPayload, EscherRecord};
pub use extsst::{BucketIndexBuilder, BucketIndexEntry};
pub use records::Record;
pub use strings::UnicodeString;
