//! The record stream assembler: continuation merging, type dispatch, and
//! end-of-stream inference.
//!
//! A BIFF8 stream has no outer framing or record count. The only robust end
//! signal is structural: substreams open with BOF and close with EOF, so
//! the assembler tracks the nesting depth, and once the depth returns to
//! zero, anything that is not another BOF is trailing container padding.
//! Most producers zero-pad, some pad with garbage; neither is decoded.
//!
//! Between the chunk cursor and the caller sit the per-type merge rules:
//! packed cell forms rewritten to their canonical equivalents, the stale
//! DBCELL cache dropped, and the four holder kinds absorbing their
//! continuation chunks.

use std::collections::VecDeque;
use std::io::Read;

use crate::chunk::ChunkReader;
use crate::error::{BiffError, BiffResult};
use crate::records::{self, ContinueRecord, Record};
use crate::sids;

/// Assembly-time behavior, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    /// Surface CONTINUE chunks after OBJ and TXO records as pass-through
    /// records instead of absorbing them. Needed by callers that must
    /// reproduce the original chunk boundary layout byte for byte.
    /// Continuations after the two drawing holders are absorbed regardless.
    pub include_continue_records: bool,
    /// Rewrite RK into NUMBER and expand MULRK/MULBLANK into per-cell
    /// records, so callers only see the canonical forms.
    pub convert_packed_cells: bool,
    /// Decode drawing holder payloads into nested record trees at assembly
    /// time rather than on demand.
    pub eager_nested_decode: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            include_continue_records: false,
            convert_packed_cells: true,
            eager_nested_decode: false,
        }
    }
}

/// The four record kinds that absorb following CONTINUE chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HolderKind {
    Drawing,
    DrawingGroup,
    Obj,
    TextObject,
}

/// What to do with a CONTINUE chunk following each holder kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContinuePolicy {
    /// Absorb into the holder's buffer unconditionally.
    AlwaysSwallow,
    /// Absorb by default; surface as a pass-through record when the
    /// assembler is configured to expose chunk boundaries.
    SurfaceWhenRequested,
}

fn holder_kind(record: &Record) -> Option<HolderKind> {
    match record {
        Record::Drawing(_) => Some(HolderKind::Drawing),
        Record::DrawingGroup(_) => Some(HolderKind::DrawingGroup),
        Record::Obj(_) => Some(HolderKind::Obj),
        Record::TextObject(_) => Some(HolderKind::TextObject),
        _ => None,
    }
}

fn continue_policy(kind: HolderKind) -> ContinuePolicy {
    match kind {
        HolderKind::Drawing | HolderKind::DrawingGroup => ContinuePolicy::AlwaysSwallow,
        // Observed behavior of the source format's tooling; kept as an
        // independent branch rather than unified with the holder rule
        HolderKind::Obj | HolderKind::TextObject => ContinuePolicy::SurfaceWhenRequested,
    }
}

/// Pull-style iterator yielding fully-assembled logical records.
pub struct RecordStream<R> {
    reader: ChunkReader<R>,
    config: AssemblerConfig,
    /// BOF/EOF nesting depth; zero outside any substream.
    bof_depth: i32,
    /// Set after an EOF closes the outermost substream. The next chunk
    /// decides: another BOF continues the file, anything else is padding.
    pending_sentinel: bool,
    done: bool,
    /// Records decoded but not yet yielded (expansions, flushed holders).
    queue: VecDeque<Record>,
    /// Holder held back while continuations may still extend it.
    pending: Option<(HolderKind, Record)>,
    /// Merge context for incoming CONTINUE chunks. Outlives `pending` so
    /// surfaced continuations keep their predecessor association.
    context: Option<HolderKind>,
}

impl<R: Read> RecordStream<R> {
    pub fn new(source: R) -> BiffResult<Self> {
        Self::with_config(source, AssemblerConfig::default())
    }

    pub fn with_config(source: R, config: AssemblerConfig) -> BiffResult<Self> {
        Ok(RecordStream {
            reader: ChunkReader::new(source)?,
            config,
            bof_depth: 0,
            pending_sentinel: false,
            done: false,
            queue: VecDeque::new(),
            pending: None,
            context: None,
        })
    }

    /// Toggle pass-through surfacing of OBJ/TXO continuations.
    pub fn set_include_continue_records(&mut self, on: bool) {
        self.config.include_continue_records = on;
    }

    /// Pull the next logical record, or `None` at end of stream.
    pub fn next_record(&mut self) -> BiffResult<Option<Record>> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Ok(Some(record));
            }
            if self.done {
                return Ok(None);
            }

            let sid = match self.reader.next_sid() {
                Some(sid) => sid,
                None => {
                    self.finish()?;
                    continue;
                }
            };

            if self.pending_sentinel && sid != sids::BOF {
                log::debug!(
                    "sid 0x{sid:04X} after outermost EOF; treating remaining bytes as padding"
                );
                self.finish()?;
                continue;
            }

            if sid == sids::CONTINUE {
                self.absorb_or_surface_continue()?;
                continue;
            }

            // Back-to-back drawing groups join into one record
            if sid == sids::MSODRAWINGGROUP
                && matches!(self.pending, Some((HolderKind::DrawingGroup, _)))
            {
                self.reader.advance()?;
                let second = records::DrawingGroupRecord::new(self.reader.read_remainder());
                if let Some((_, Record::DrawingGroup(first))) = self.pending.as_mut() {
                    first.join(second);
                }
                continue;
            }

            // Anything else ends the held holder's reach
            self.flush_pending()?;

            self.reader.advance()?;
            match sid {
                sids::BOF => {
                    self.bof_depth += 1;
                    self.pending_sentinel = false;
                }
                sids::EOF => {
                    self.bof_depth -= 1;
                    if self.bof_depth <= 0 {
                        self.pending_sentinel = true;
                    }
                }
                _ => {}
            }

            let record = records::decode_record(&mut self.reader)?;
            if self.reader.remaining_in_chunk() != 0 {
                return Err(BiffError::Format(format!(
                    "decoder for sid 0x{sid:04X} left {} bytes unread at offset {}",
                    self.reader.remaining_in_chunk(),
                    self.reader.chunk_start()
                )));
            }
            self.dispatch(record)?;
        }
    }

    /// Route a freshly-decoded record: drop, convert, expand, hold, or
    /// queue for yield.
    fn dispatch(&mut self, record: Record) -> BiffResult<()> {
        match record {
            // Stale lookup cache, regenerated from scratch on write
            Record::DbCell(_) => {
                self.context = None;
            }
            Record::Rk(rk) if self.config.convert_packed_cells => {
                self.context = None;
                self.queue.push_back(Record::Number(rk.to_number()));
            }
            Record::MulRk(mulrk) if self.config.convert_packed_cells => {
                self.context = None;
                self.queue
                    .extend(mulrk.expand().into_iter().map(Record::Number));
            }
            Record::MulBlank(mulblank) if self.config.convert_packed_cells => {
                self.context = None;
                self.queue
                    .extend(mulblank.expand().into_iter().map(Record::Blank));
            }
            record => {
                if let Some(kind) = holder_kind(&record) {
                    self.pending = Some((kind, record));
                    self.context = Some(kind);
                } else {
                    self.context = None;
                    self.queue.push_back(record);
                }
            }
        }
        Ok(())
    }

    /// Handle a CONTINUE chunk arriving at the record level.
    fn absorb_or_surface_continue(&mut self) -> BiffResult<()> {
        let Some(kind) = self.context else {
            return Err(BiffError::Format(format!(
                "continuation chunk at offset {} has no continuable predecessor",
                self.reader.chunk_start()
            )));
        };
        self.reader.advance()?;
        let data = self.reader.read_remainder();

        match continue_policy(kind) {
            ContinuePolicy::AlwaysSwallow => self.append_to_pending(&data),
            ContinuePolicy::SurfaceWhenRequested => {
                if self.config.include_continue_records {
                    self.flush_pending()?;
                    self.queue.push_back(Record::Continue(ContinueRecord { data }));
                    Ok(())
                } else {
                    self.append_to_pending(&data)
                }
            }
        }
    }

    fn append_to_pending(&mut self, data: &[u8]) -> BiffResult<()> {
        let Some((_, record)) = self.pending.as_mut() else {
            return Err(BiffError::format(
                "continuation chunk after its holder was already surfaced",
            ));
        };
        match record {
            Record::Drawing(rec) => rec.append_continuation(data),
            Record::DrawingGroup(rec) => rec.append_continuation(data),
            Record::Obj(rec) => rec.append_continuation(data),
            Record::TextObject(rec) => rec.append_continuation(data),
            _ => unreachable!("only holder records are held pending"),
        }
        Ok(())
    }

    /// Emit the held holder. Reassembly is complete at this point, so the
    /// eager nested decode happens here and nowhere earlier.
    fn flush_pending(&mut self) -> BiffResult<()> {
        if let Some((_, mut record)) = self.pending.take() {
            if self.config.eager_nested_decode {
                match &mut record {
                    Record::Drawing(rec) => rec.cache_nested()?,
                    Record::DrawingGroup(rec) => rec.cache_nested()?,
                    _ => {}
                }
            }
            self.queue.push_back(record);
        }
        Ok(())
    }

    fn finish(&mut self) -> BiffResult<()> {
        self.flush_pending()?;
        self.done = true;
        Ok(())
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = BiffResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
