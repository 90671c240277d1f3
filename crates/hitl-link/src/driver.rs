use std::io::{self, ErrorKind, Write};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use hitl_frame::{
    encode_telemetry_into, AssemblerStats, CommandFrame, ReceiveAssembler, TelemetryFrame,
    MAX_FRAME_SIZE,
};
use hitl_transport::{ByteStream, SerialLink};
use tracing::{debug, trace};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

/// Simulator side of the HITL link.
///
/// Owns the stream, a reusable outbound scratch buffer and the receive
/// assembler. One caller drives `send`/`receive`/`reset` in sequence.
pub struct LinkDriver<S = SerialLink> {
    pub(crate) stream: S,
    pub(crate) scratch: BytesMut,
    pub(crate) assembler: ReceiveAssembler<CommandFrame>,
    pub(crate) config: LinkConfig,
    chunk: Vec<u8>,
}

impl<S: ByteStream> LinkDriver<S> {
    /// Wrap an already-open stream with default configuration.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, LinkConfig::default())
    }

    /// Wrap an already-open stream with explicit configuration.
    pub fn with_config(stream: S, config: LinkConfig) -> Self {
        Self {
            stream,
            scratch: BytesMut::with_capacity(MAX_FRAME_SIZE),
            assembler: ReceiveAssembler::with_cap(config.buffer_cap),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Encode and write one telemetry frame. Does not wait for a reply.
    pub fn send(&mut self, frame: &TelemetryFrame) -> Result<()> {
        self.scratch.clear();
        encode_telemetry_into(frame, &mut self.scratch);
        trace!(sim_time = frame.sim_time, "sending telemetry frame");
        write_frame(&mut self.stream, &self.scratch, self.config.poll_interval)
    }

    /// Block until the next valid command frame arrives.
    ///
    /// Corrupt candidates are skipped. Only stream I/O failures return early.
    /// Sleeps between polls only while the stream has nothing waiting.
    pub fn receive(&mut self) -> Result<CommandFrame> {
        loop {
            if let Some(frame) = self.poll()? {
                return Ok(frame);
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Like [`receive`](Self::receive), but gives up at `deadline`.
    pub fn receive_until(&mut self, deadline: Instant) -> Result<Option<CommandFrame>> {
        loop {
            if let Some(frame) = self.poll()? {
                return Ok(Some(frame));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }

    /// Like [`receive`](Self::receive), but gives up after `timeout`.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<CommandFrame>> {
        self.receive_until(Instant::now() + timeout)
    }

    /// One non-blocking receive step.
    ///
    /// Returns a frame already buffered, otherwise reads bounded chunks while
    /// bytes are waiting until one completes. `None` means the stream ran dry.
    pub fn poll(&mut self) -> Result<Option<CommandFrame>> {
        Ok(poll_stream(
            &mut self.stream,
            &mut self.assembler,
            &mut self.chunk,
        )?)
    }

    /// Flush and release the stream.
    pub fn close(mut self) -> Result<()> {
        flush_stream(&mut self.stream, self.config.poll_interval)?;
        debug!(stats = ?self.assembler.stats(), "link closed");
        Ok(())
    }

    /// Receive-side counters.
    pub fn stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    /// Bytes buffered but not yet part of an extracted frame.
    pub fn pending_bytes(&self) -> usize {
        self.assembler.len()
    }

    /// Current configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the driver and return the inner stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> std::fmt::Debug for LinkDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkDriver")
            .field("assembler", &self.assembler)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub(crate) fn poll_stream<S: ByteStream>(
    stream: &mut S,
    assembler: &mut ReceiveAssembler<CommandFrame>,
    chunk: &mut [u8],
) -> io::Result<Option<CommandFrame>> {
    loop {
        if let Some(frame) = assembler.try_extract() {
            return Ok(Some(frame));
        }

        let available = stream.bytes_available()?;
        if available == 0 {
            return Ok(None);
        }

        let want = available.min(chunk.len());
        let read = match stream.read(&mut chunk[..want]) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(err) if is_transient(&err) => return Ok(None),
            Err(err) => return Err(err),
        };

        trace!(read, "read link chunk");
        assembler.ingest(&chunk[..read]);
    }
}

/// Write all of `bytes` and flush. `WouldBlock` waits `backoff` before retrying.
pub(crate) fn write_frame<W: Write>(
    stream: &mut W,
    bytes: &[u8],
    backoff: Duration,
) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => return Err(LinkError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(backoff),
            Err(err) => return Err(LinkError::Io(err)),
        }
    }

    flush_stream(stream, backoff)
}

fn flush_stream<W: Write>(stream: &mut W, backoff: Duration) -> Result<()> {
    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(backoff),
            Err(err) => return Err(LinkError::Io(err)),
        }
    }
}

/// Read errors that mean "nothing right now" rather than a dead link.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}
