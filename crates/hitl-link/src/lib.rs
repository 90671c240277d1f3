//! Simulator-side link driver for the ADCS hardware-in-the-loop rig.
//!
//! This is the layer the simulation loop talks to. Open the link, reset the
//! flight computer, then each tick `send` a telemetry frame and `receive` the
//! next valid command frame. Corrupt or misaligned input is skipped silently.

pub mod config;
pub mod connector;
pub mod driver;
pub mod emulator;
pub mod error;
pub mod handshake;
pub mod reader;

#[cfg(test)]
pub(crate) mod testing;

pub use config::LinkConfig;
pub use connector::{open, open_with_config, wait_for_port};
pub use driver::LinkDriver;
pub use emulator::{mirror_command, DeviceEmulator, DeviceEvent, READY_BANNER};
pub use error::{LinkError, Result};
pub use handshake::{HandshakeConfig, ReadyScanner, READY_MARKER};
pub use reader::{CommandReceiver, TelemetrySender};
