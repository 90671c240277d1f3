use std::time::Duration;

use hitl_frame::DEFAULT_BUFFER_CAP;
use hitl_transport::serial::{DEFAULT_BAUD_RATE, DEFAULT_IO_TIMEOUT};

use crate::handshake::HandshakeConfig;

/// Largest read issued per poll.
pub const DEFAULT_READ_CHUNK: usize = 64;

/// Sleep between unsuccessful polls of the stream.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Open-then-close attempts made while waiting for the port to appear.
pub const DEFAULT_PROBE_ATTEMPTS: usize = 60;

/// Delay between port probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Wait after the port appears before opening it for real.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Configuration for a link session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Probe the port until it opens before connecting.
    pub wait_for_port: bool,
    /// Probe budget when `wait_for_port` is set.
    pub probe_attempts: usize,
    /// Delay between probes.
    pub probe_interval: Duration,
    /// Delay between a successful probe and the real open.
    pub settle_delay: Duration,
    /// Per-call timeout on the OS handle.
    pub io_timeout: Duration,
    /// Sleep between unsuccessful polls in `receive` and `wait_for_ready`.
    pub poll_interval: Duration,
    /// Largest single read from the stream.
    pub read_chunk_size: usize,
    /// Receive buffer cap before the oldest half is dropped.
    pub buffer_cap: usize,
    /// Reset/ready handshake settings.
    pub handshake: HandshakeConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            wait_for_port: false,
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            io_timeout: DEFAULT_IO_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_chunk_size: DEFAULT_READ_CHUNK,
            buffer_cap: DEFAULT_BUFFER_CAP,
            handshake: HandshakeConfig::default(),
        }
    }
}
