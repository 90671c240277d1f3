use std::io::{self, Read, Write};

/// A connected byte stream to the flight computer (`Read` + `Write` plus a
/// non-blocking "bytes waiting" query).
///
/// The link layer polls [`bytes_available`](ByteStream::bytes_available)
/// before every read so that a quiet line never parks the caller inside the
/// OS read call.
pub trait ByteStream: Read + Write {
    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&self) -> io::Result<usize>;

    /// Create an independently owned handle to the same underlying stream.
    ///
    /// Used to hand the read side to a background thread. Streams that cannot
    /// be duplicated keep the default, which reports `Unsupported`.
    fn try_clone_stream(&self) -> io::Result<Self>
    where
        Self: Sized,
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream cannot be cloned",
        ))
    }
}
