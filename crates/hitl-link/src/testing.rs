use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

use hitl_transport::ByteStream;

/// In-memory stream: reads drain `incoming`, writes land in `written`.
#[derive(Debug, Default)]
pub(crate) struct MockStream {
    pub incoming: VecDeque<u8>,
    pub written: Vec<u8>,
    pub largest_read: usize,
    pub flushes: usize,
    pub read_error: Option<ErrorKind>,
    pub write_accepts_nothing: bool,
    /// Writes that fail with `WouldBlock` before any are accepted.
    pub write_would_block: usize,
}

impl MockStream {
    pub fn with_incoming(bytes: &[u8]) -> Self {
        Self {
            incoming: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(io::Error::from(kind));
        }
        self.largest_read = self.largest_read.max(buf.len());
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.write_accepts_nothing {
            return Ok(0);
        }
        if self.write_would_block > 0 {
            self.write_would_block -= 1;
            return Err(io::Error::from(ErrorKind::WouldBlock));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl ByteStream for MockStream {
    fn bytes_available(&self) -> io::Result<usize> {
        if self.read_error.is_some() {
            return Ok(1);
        }
        Ok(self.incoming.len())
    }
}
