use std::borrow::Cow;
use std::thread;
use std::time::{Duration, Instant};

use hitl_frame::RESET_SENTINEL;
use hitl_transport::ByteStream;
use tracing::{debug, info, warn};

use crate::driver::{is_transient, write_frame, LinkDriver};
use crate::error::Result;

/// ASCII line the flight computer prints once it has reinitialized.
pub const READY_MARKER: &str = "ADCS_READY";

const DEFAULT_TEXT_BUFFER_LIMIT: usize = 200;
const DEFAULT_TEXT_BUFFER_KEEP: usize = 100;

/// Configuration for the reset/ready handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long to wait for the ready marker after a reset.
    pub timeout: Duration,
    /// Marker the device prints when ready.
    pub ready_marker: String,
    /// Rolling text buffer length that triggers trimming.
    pub text_buffer_limit: usize,
    /// Bytes kept after trimming (most recent).
    pub text_buffer_keep: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            ready_marker: READY_MARKER.to_string(),
            text_buffer_limit: DEFAULT_TEXT_BUFFER_LIMIT,
            text_buffer_keep: DEFAULT_TEXT_BUFFER_KEEP,
        }
    }
}

/// Rolling scan of the device's ASCII output for the ready marker.
///
/// Only printable ASCII and `\n` are kept; anything else (boot noise, stray
/// binary) is skipped without breaking a marker in progress.
#[derive(Debug, Clone)]
pub struct ReadyScanner {
    text: Vec<u8>,
    marker: Vec<u8>,
    limit: usize,
    keep: usize,
}

impl ReadyScanner {
    /// Create a scanner for the configured marker.
    pub fn new(config: &HandshakeConfig) -> Self {
        let marker = config.ready_marker.as_bytes().to_vec();
        let keep = config.text_buffer_keep.max(marker.len());
        let limit = config.text_buffer_limit.max(keep);
        Self {
            text: Vec::with_capacity(limit + 1),
            marker,
            limit,
            keep,
        }
    }

    /// Feed one byte. Returns true once the marker has been seen.
    pub fn push(&mut self, byte: u8) -> bool {
        if !is_text(byte) {
            return false;
        }

        self.text.push(byte);
        if self.text.len() > self.limit {
            let excess = self.text.len() - self.keep;
            self.text.drain(..excess);
        }

        !self.marker.is_empty() && self.text.ends_with(&self.marker)
    }

    /// Recent text, for diagnostics.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True if no text has been kept yet.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn is_text(byte: u8) -> bool {
    byte == b'\n' || (0x20..=0x7e).contains(&byte)
}

impl<S: ByteStream> LinkDriver<S> {
    /// Reset the flight computer and wait for it to report ready.
    ///
    /// Clears the receive buffer, writes the all-zero reset frame, then scans
    /// the device output for the ready marker. Returns `Ok(false)` on timeout.
    pub fn reset(&mut self, timeout: Duration) -> Result<bool> {
        info!(?timeout, "resetting flight computer");
        self.assembler.reset();
        write_frame(&mut self.stream, &RESET_SENTINEL, self.config.poll_interval)?;
        self.wait_for_ready(timeout)
    }

    /// [`reset`](Self::reset) with the configured handshake timeout.
    pub fn handshake(&mut self) -> Result<bool> {
        let timeout = self.config.handshake.timeout;
        self.reset(timeout)
    }

    /// Read the stream a byte at a time until the ready marker appears.
    ///
    /// Returns `Ok(false)` if `timeout` elapses first.
    pub fn wait_for_ready(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut scanner = ReadyScanner::new(&self.config.handshake);
        let mut byte = [0u8; 1];

        loop {
            let mut progressed = false;

            if self.stream.bytes_available()? > 0 {
                match self.stream.read(&mut byte) {
                    Ok(1) => {
                        progressed = true;
                        if scanner.push(byte[0]) {
                            info!("flight computer ready");
                            return Ok(true);
                        }
                    }
                    Ok(_) => {}
                    Err(err) if is_transient(&err) => {}
                    Err(err) => return Err(err.into()),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(?timeout, recent = %scanner.text(), "flight computer did not report ready");
                return Ok(false);
            }
            if !progressed {
                thread::sleep(self.config.poll_interval.min(deadline - now));
            } else if byte[0] == b'\n' {
                debug!(recent = %scanner.text(), "device output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hitl_frame::{encode_command, CommandFrame, TELEMETRY_FRAME_SIZE};

    use super::*;
    use crate::testing::MockStream;

    fn scanner() -> ReadyScanner {
        ReadyScanner::new(&HandshakeConfig::default())
    }

    fn feed(scanner: &mut ReadyScanner, bytes: &[u8]) -> bool {
        bytes.iter().any(|&b| scanner.push(b))
    }

    #[test]
    fn scanner_finds_marker_in_boot_log() {
        let mut s = scanner();
        assert!(feed(&mut s, b"boot v1.2\nimu ok\nADCS_READY\n"));
    }

    #[test]
    fn scanner_ignores_non_printable_bytes() {
        let mut s = scanner();
        assert!(!feed(&mut s, b"\x00\xffADCS\x01\x02_RE\r"));
        assert!(feed(&mut s, b"\x80ADY"));
        assert!(!s.text().contains('\r'));
    }

    #[test]
    fn scanner_rejects_near_miss() {
        let mut s = scanner();
        assert!(!feed(&mut s, b"ADCS_REAdy ADCS-READY ADCS_\nREADY"));
    }

    #[test]
    fn scanner_trims_to_recent_bytes() {
        let mut s = scanner();
        for _ in 0..500 {
            s.push(b'x');
        }
        assert!(s.len() <= DEFAULT_TEXT_BUFFER_LIMIT);
        assert!(s.len() >= DEFAULT_TEXT_BUFFER_KEEP);
        assert!(feed(&mut s, READY_MARKER.as_bytes()));
    }

    #[test]
    fn scanner_keep_never_smaller_than_marker() {
        let config = HandshakeConfig {
            text_buffer_limit: 2,
            text_buffer_keep: 1,
            ..HandshakeConfig::default()
        };
        let mut s = ReadyScanner::new(&config);
        assert!(feed(&mut s, b"....ADCS_READY"));
    }

    #[test]
    fn wait_for_ready_consumes_up_to_marker() {
        let mut stream = MockStream::with_incoming(b"\x00\x00reboot\r\nADCS_READY\r\n");
        stream.push_incoming(&encode_command(&CommandFrame::default()));
        let mut driver = LinkDriver::new(stream);

        assert!(driver.wait_for_ready(Duration::from_millis(200)).unwrap());
        assert_eq!(driver.get_ref().incoming.len(), 2 + 76);
        assert_eq!(driver.receive().unwrap(), CommandFrame::default());
    }

    #[test]
    fn wait_for_ready_times_out() {
        let mut driver = LinkDriver::new(MockStream::with_incoming(b"still booting\n"));
        let started = Instant::now();

        assert!(!driver.wait_for_ready(Duration::from_millis(30)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_for_ready_zero_timeout_checks_once() {
        let mut driver = LinkDriver::new(MockStream::default());
        assert!(!driver.wait_for_ready(Duration::ZERO).unwrap());
    }

    #[test]
    fn wait_for_ready_propagates_hard_errors() {
        let mut stream = MockStream::default();
        stream.read_error = Some(std::io::ErrorKind::ConnectionReset);
        let mut driver = LinkDriver::new(stream);

        assert!(driver.wait_for_ready(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn reset_sends_zero_frame_and_clears_buffer() {
        let partial = encode_command(&CommandFrame::default());
        let mut driver = LinkDriver::new(MockStream::with_incoming(&partial[..40]));
        assert_eq!(driver.poll().unwrap(), None);
        assert_eq!(driver.pending_bytes(), 40);

        driver.get_mut().push_incoming(b"ADCS_READY\n");
        assert!(driver.reset(Duration::from_millis(100)).unwrap());

        assert_eq!(driver.pending_bytes(), 0);
        let written = &driver.get_ref().written;
        assert_eq!(written.len(), TELEMETRY_FRAME_SIZE);
        assert!(written.iter().all(|&b| b == 0));
    }

    #[test]
    fn handshake_uses_configured_marker() {
        let mut config = crate::LinkConfig::default();
        config.handshake.ready_marker = "FC_UP".to_string();
        config.handshake.timeout = Duration::from_millis(100);

        let mut driver =
            LinkDriver::with_config(MockStream::with_incoming(b"ADCS_READY\nFC_UP\n"), config);
        assert!(driver.handshake().unwrap());
        assert_eq!(driver.get_ref().incoming, b"\n".to_vec());
    }
}
