//! Fixed-layout, checksummed frames for the ADCS HITL link.
//!
//! Two frame kinds cross the wire, both laid out as:
//! - A 2-byte ASCII marker (`"SS"` telemetry, `"AA"` command) plus 2 pad bytes
//! - The payload fields, little-endian, in fixed order
//! - A 2-byte little-endian checksum (mod-65536 byte sum) plus 2 pad bytes
//!
//! [`codec`] is pure encode/decode. [`assembler`] turns a noisy byte stream
//! into validated frames, resynchronizing past corruption on its own.

pub mod assembler;
pub mod codec;
pub mod error;

pub use assembler::{AssemblerStats, ReceiveAssembler, DEFAULT_BUFFER_CAP};
pub use codec::{
    checksum, decode_command, decode_telemetry, encode_command, encode_command_into,
    encode_telemetry, encode_telemetry_into, BusPower, CommandFrame, GpsFix, TelemetryFrame,
    UtcDate, WireFrame, COMMAND_FRAME_SIZE, COMMAND_MARKER, MAX_FRAME_SIZE, RESET_SENTINEL,
    SUN_SENSOR_COUNT, TELEMETRY_FRAME_SIZE, TELEMETRY_MARKER,
};
pub use error::{DecodeError, Result};
