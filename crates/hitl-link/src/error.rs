/// Errors that can occur in link operations.
///
/// Frame-level corruption never shows up here; the receive path recovers
/// from it on its own. Handshake timeouts are reported as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] hitl_transport::TransportError),

    /// I/O error on the open stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port never became openable within the retry budget.
    #[error("link unavailable: {port} did not open after {attempts} attempts ({reason})")]
    LinkUnavailable {
        port: String,
        attempts: usize,
        reason: String,
    },

    /// The stream accepted no bytes on write.
    #[error("link closed (write accepted no bytes)")]
    Closed,

    /// The background reader thread is gone.
    #[error("background reader stopped: {0}")]
    ReaderStopped(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
