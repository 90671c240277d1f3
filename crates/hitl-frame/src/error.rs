/// Reasons a candidate frame is rejected.
///
/// The assembler treats every variant as "not a frame here" and keeps
/// scanning; none of these reach the link caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The first two bytes are not the expected frame marker.
    #[error("bad frame marker {found:02x?} (expected {expected:02x?})")]
    BadMarker { expected: [u8; 2], found: [u8; 2] },

    /// The trailing checksum does not match the byte sum of the frame.
    #[error("bad frame checksum (wire 0x{wire:04x}, computed 0x{computed:04x})")]
    BadChecksum { wire: u16, computed: u16 },

    /// The buffer is not exactly one frame long.
    #[error("frame length {actual} bytes (expected {expected})")]
    Length { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
