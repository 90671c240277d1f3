//! Split a driver into a write half and a background read half.
//!
//! The simulation loop keeps the [`TelemetrySender`]; a dedicated thread owns
//! a cloned read handle plus the receive assembler and pushes every decoded
//! command frame into a bounded channel drained by [`CommandReceiver`]. When
//! the channel is full the newest frame is dropped, so a stalled consumer
//! never blocks the serial reader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use hitl_frame::{
    encode_telemetry_into, AssemblerStats, CommandFrame, ReceiveAssembler, TelemetryFrame,
    MAX_FRAME_SIZE,
};
use hitl_transport::ByteStream;
use tracing::{debug, warn};

use crate::driver::{poll_stream, write_frame, LinkDriver};
use crate::error::{LinkError, Result};

const READER_THREAD_NAME: &str = "hitl-link-reader";

/// Write half produced by [`LinkDriver::into_split`].
pub struct TelemetrySender<S> {
    stream: S,
    scratch: BytesMut,
    backoff: Duration,
}

impl<S: ByteStream> TelemetrySender<S> {
    /// Encode and write one telemetry frame.
    pub fn send(&mut self, frame: &TelemetryFrame) -> Result<()> {
        self.scratch.clear();
        encode_telemetry_into(frame, &mut self.scratch);
        write_frame(&mut self.stream, &self.scratch, self.backoff)
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> std::fmt::Debug for TelemetrySender<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySender").finish_non_exhaustive()
    }
}

struct WorkerExit {
    stats: AssemblerStats,
    error: Option<std::io::Error>,
}

/// Read half produced by [`LinkDriver::into_split`].
pub struct CommandReceiver {
    frames: Receiver<CommandFrame>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<WorkerExit>>,
}

impl CommandReceiver {
    /// Block until the next command frame.
    pub fn recv(&self) -> Result<CommandFrame> {
        self.frames
            .recv()
            .map_err(|_| LinkError::ReaderStopped("channel closed".to_string()))
    }

    /// Wait up to `timeout` for the next command frame.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<CommandFrame>> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(LinkError::ReaderStopped("channel closed".to_string()))
            }
        }
    }

    /// Take a frame if one is already queued.
    pub fn try_recv(&self) -> Result<Option<CommandFrame>> {
        match self.frames.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(LinkError::ReaderStopped("channel closed".to_string()))
            }
        }
    }

    /// Stop the reader thread and return its receive counters.
    ///
    /// Reports the I/O error that ended the thread, if any.
    pub fn stop(mut self) -> Result<AssemblerStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<AssemblerStats> {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return Ok(AssemblerStats::default());
        };

        let exit = worker
            .join()
            .map_err(|_| LinkError::ReaderStopped("reader thread panicked".to_string()))?;
        match exit.error {
            Some(err) => Err(LinkError::Io(err)),
            None => Ok(exit.stats),
        }
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.shutdown();
        }
    }
}

impl std::fmt::Debug for CommandReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandReceiver")
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<S> LinkDriver<S>
where
    S: ByteStream + Send + 'static,
{
    /// Split into a write half and a background-reader half.
    ///
    /// `depth` bounds the queue of decoded command frames. Requires a stream
    /// that supports [`ByteStream::try_clone_stream`].
    pub fn into_split(self, depth: usize) -> Result<(TelemetrySender<S>, CommandReceiver)> {
        let read_stream = self.stream.try_clone_stream()?;
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        let running = Arc::new(AtomicBool::new(true));

        let worker_running = Arc::clone(&running);
        let assembler = self.assembler;
        let chunk = vec![0u8; self.config.read_chunk_size.max(1)];
        let poll_interval = self.config.poll_interval;
        let worker = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || {
                read_loop(
                    read_stream,
                    assembler,
                    chunk,
                    poll_interval,
                    tx,
                    worker_running,
                )
            })?;

        let sender = TelemetrySender {
            stream: self.stream,
            scratch: BytesMut::with_capacity(MAX_FRAME_SIZE),
            backoff: poll_interval,
        };
        let receiver = CommandReceiver {
            frames: rx,
            running,
            worker: Some(worker),
        };
        Ok((sender, receiver))
    }
}

fn read_loop<S: ByteStream>(
    mut stream: S,
    mut assembler: ReceiveAssembler<CommandFrame>,
    mut chunk: Vec<u8>,
    poll_interval: Duration,
    frames: SyncSender<CommandFrame>,
    running: Arc<AtomicBool>,
) -> WorkerExit {
    let mut dropped = 0u64;
    let mut error = None;

    while running.load(Ordering::SeqCst) {
        match poll_stream(&mut stream, &mut assembler, &mut chunk) {
            Ok(Some(frame)) => match frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    warn!(dropped, "command queue full, dropping frame");
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
            Ok(None) => thread::sleep(poll_interval),
            Err(err) => {
                warn!(error = %err, "reader stopped on I/O error");
                error = Some(err);
                break;
            }
        }
    }

    debug!(stats = ?assembler.stats(), dropped, "reader thread exiting");
    WorkerExit {
        stats: assembler.stats(),
        error,
    }
}
