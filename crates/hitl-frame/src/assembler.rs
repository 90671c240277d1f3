use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{CommandFrame, WireFrame};

/// Accumulation buffer cap. Past this, the oldest half is discarded.
pub const DEFAULT_BUFFER_CAP: usize = 1024;

/// Counters describing what the assembler has seen on the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Valid frames extracted.
    pub frames: u64,
    /// Marker hits whose window failed validation.
    pub rejected_candidates: u64,
    /// Bytes dropped without being part of a valid frame.
    pub bytes_discarded: u64,
    /// Times the buffer exceeded its cap and was pruned.
    pub overflows: u64,
}

/// Turns an arbitrary, possibly fragmented byte stream into validated frames.
///
/// Bytes are appended with [`ingest`](Self::ingest); [`try_extract`](Self::try_extract)
/// searches for the frame marker and validates the window behind it. A window
/// that fails validation only advances the search past its marker, so a
/// corrupted frame or a false marker in line noise never costs the frames
/// around it.
///
/// The search resumes where the previous call stopped: bytes already confirmed
/// not to start a frame are not scanned again.
pub struct ReceiveAssembler<F: WireFrame = CommandFrame> {
    buf: BytesMut,
    search_pos: usize,
    cap: usize,
    stats: AssemblerStats,
    _frame: PhantomData<fn() -> F>,
}

impl<F: WireFrame> ReceiveAssembler<F> {
    /// Create an assembler with the default buffer cap.
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_BUFFER_CAP)
    }

    /// Create an assembler with an explicit buffer cap.
    ///
    /// The cap is raised to two frames if smaller, so pruning can never cut
    /// every candidate out of the buffer.
    pub fn with_cap(cap: usize) -> Self {
        let cap = cap.max(2 * F::SIZE);
        Self {
            buf: BytesMut::with_capacity(cap + F::SIZE),
            search_pos: 0,
            cap,
            stats: AssemblerStats::default(),
            _frame: PhantomData,
        }
    }

    /// Append bytes read from the link.
    pub fn ingest(&mut self, bytes: &[u8]) {
        trace!(len = bytes.len(), "ingest");
        self.buf.extend_from_slice(bytes);

        while self.buf.len() > self.cap {
            let drop = self.buf.len() / 2;
            warn!(
                buffered = self.buf.len(),
                dropped = drop,
                "receive buffer over cap, discarding oldest half"
            );
            self.buf.advance(drop);
            self.search_pos = 0;
            self.stats.overflows += 1;
            self.stats.bytes_discarded += drop as u64;
        }
    }

    /// Extract the next valid frame, if one is fully buffered.
    ///
    /// On success every byte up to and including the frame is consumed. On
    /// `None` nothing is consumed; the search cursor just moves past bytes
    /// that cannot start a frame.
    pub fn try_extract(&mut self) -> Option<F> {
        let mut pos = self.search_pos;

        while let Some(offset) = find_marker(&self.buf[pos..], F::MARKER) {
            let start = pos + offset;

            let Some(window) = self.buf.get(start..start + F::SIZE) else {
                // Candidate is incomplete; rescan it once more bytes arrive.
                self.search_pos = start;
                return None;
            };

            match F::decode(window) {
                Ok(frame) => {
                    if start > 0 {
                        debug!(skipped = start, "resynchronized on frame marker");
                    }
                    self.stats.bytes_discarded += start as u64;
                    self.stats.frames += 1;
                    self.buf.advance(start + F::SIZE);
                    self.search_pos = 0;
                    return Some(frame);
                }
                Err(err) => {
                    debug!(offset = start, %err, "rejected frame candidate");
                    self.stats.rejected_candidates += 1;
                    pos = start + 1;
                }
            }
        }

        // The last byte may be the first half of a marker.
        self.search_pos = self.buf.len().saturating_sub(F::MARKER.len() - 1).max(pos);
        None
    }

    /// Drop all buffered bytes and restart the search.
    pub fn reset(&mut self) {
        self.stats.bytes_discarded += self.buf.len() as u64;
        self.buf.clear();
        self.search_pos = 0;
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Index the next marker search starts from.
    pub fn search_position(&self) -> usize {
        self.search_pos
    }

    /// The buffer cap in effect.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Counters since creation.
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Take the buffered bytes, leaving the assembler empty.
    pub fn take_pending(&mut self) -> BytesMut {
        self.search_pos = 0;
        self.buf.split()
    }
}

impl<F: WireFrame> Default for ReceiveAssembler<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: WireFrame> std::fmt::Debug for ReceiveAssembler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveAssembler")
            .field("buffered", &self.buf.len())
            .field("search_pos", &self.search_pos)
            .field("cap", &self.cap)
            .field("stats", &self.stats)
            .finish()
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|pair| pair == marker)
}
