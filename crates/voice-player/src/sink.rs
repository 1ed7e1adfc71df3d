//! Output seam for encoded frames.

use async_trait::async_trait;

/// Errors reported by frame sinks.
#[derive(Debug)]
pub enum SinkError {
    /// No connection to deliver frames to.
    NotConnected,
    /// Underlying transport failed.
    Io(std::io::Error),
    Other(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::NotConnected => write!(f, "sink not connected"),
            SinkError::Io(e) => write!(f, "sink io error: {e}"),
            SinkError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Real-time consumer of compressed frames (a voice connection, a file, ...).
///
/// `send_frame` is expected to take roughly one frame duration; that is what paces
/// playback.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Toggle the speaking indicator around a decode session.
    async fn set_speaking(&self, speaking: bool) -> Result<(), SinkError>;

    async fn send_frame(&self, frame: Vec<u8>) -> Result<(), SinkError>;

    /// Leave the output. A later `set_speaking(true)` may reconnect.
    async fn disconnect(&self) -> Result<(), SinkError>;
}

impl From<SinkError> for crate::error::PlayerError {
    fn from(e: SinkError) -> Self {
        crate::error::PlayerError::SinkUnavailable(e.to_string())
    }
}
