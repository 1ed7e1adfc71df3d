//! Error taxonomy for the playback engine.

use thiserror::Error;

/// Failures surfaced by lookup, decode, encode and delivery stages.
///
/// Propagation differs by variant: `LookupFailed` and `SpawnFailed` drop only the
/// affected track, `StreamReadFailed` and `EncodeFailed` end the current decode session
/// as if it reached end of stream, and `SinkUnavailable` ends the whole playback loop.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("metadata lookup failed: {0}")]
    LookupFailed(String),

    #[error("failed to start decoder: {0}")]
    SpawnFailed(String),

    #[error("decoder stream read failed: {0}")]
    StreamReadFailed(String),

    #[error("frame encode failed: {0}")]
    EncodeFailed(String),

    #[error("output sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("nothing is playing")]
    NothingPlaying,
}

pub type Result<T> = std::result::Result<T, PlayerError>;

impl PlayerError {
    /// Whether this error ends the playback loop instead of just the current track.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlayerError::SinkUnavailable(_))
    }
}
