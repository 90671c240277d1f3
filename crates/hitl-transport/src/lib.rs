//! Byte-stream transport abstraction for the ADCS HITL link.
//!
//! The link protocol only needs three things from the wire: read, write, and
//! "how many bytes are waiting". [`ByteStream`] captures that, and this crate
//! provides it for:
//! - Serial ports (via the `serialport` crate) (the production transport)
//! - Unix stream sockets (Linux/macOS) for local pairs in tests and emulation
//!
//! This is the lowest layer of the workspace. Everything else builds on top of
//! the [`ByteStream`] trait provided here.

pub mod error;
pub mod serial;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use error::{Result, TransportError};
pub use serial::{available_ports, probe_port, PortInfo, SerialLink, DEFAULT_BAUD_RATE};
pub use traits::ByteStream;

pub use serialport;
