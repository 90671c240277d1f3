//! Serial hardware-in-the-loop link between an ADCS simulator and a flight computer.
//!
//! Each simulation tick the simulator sends a 108-byte telemetry frame and the
//! flight computer answers with a 76-byte command frame. Corrupt or misaligned
//! bytes are skipped by resynchronizing on the frame marker.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream abstraction over serial ports and Unix sockets
//! - [`frame`]: wire codec and the resynchronizing receive assembler
//! - [`link`]: simulator-side driver, reset handshake, and device emulator
//!
//! ```no_run
//! use std::time::Duration;
//! use hitl::frame::TelemetryFrame;
//!
//! # fn main() -> hitl::link::Result<()> {
//! let mut link = hitl::link::open("/dev/ttyACM0", 115_200, true)?;
//! if link.reset(Duration::from_secs(10))? {
//!     link.send(&TelemetryFrame::default())?;
//!     let command = link.receive()?;
//!     println!("{:?}", command.attitude);
//! }
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use hitl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hitl_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use hitl_link::*;
}
