use serde::{Deserialize, Serialize};

/// Why playback of a single track ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackEndReason {
    /// The decoder reached end of stream.
    Eof,
    /// A read, encode or watchdog fault aborted the decode session.
    Error,
    /// The track was skipped.
    Skipped,
    /// Playback was stopped and the queue cleared.
    Stopped,
    /// The track was torn down to be restarted from the beginning.
    Restarted,
}

/// Coarse state of the playback controller.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// No decode session and nothing waiting to resume.
    #[default]
    Idle,
    /// Frames are flowing to the sink.
    Playing,
    /// A track is current but frame delivery is suspended.
    Paused,
    /// A session is being torn down (natural end, skip or stop).
    Draining,
    /// The current track is being re-resolved and restarted from zero.
    Restarting,
}

/// Periodic "now playing" payload handed to the presentation layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NowPlayingStatus {
    /// Track title.
    pub title: String,
    /// Elapsed playback time in seconds.
    pub elapsed_secs: f64,
    /// Total track duration in seconds (0 when unknown).
    pub total_secs: u64,
    /// `true` while frame delivery is paused.
    pub paused: bool,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Controller phase when the sample was taken.
    pub phase: PlaybackPhase,
}

/// One queue row for listings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    pub title: String,
    /// Display duration (`MM:SS` or `HH:MM:SS`).
    pub duration: String,
    /// Request reference the track was resolved from.
    pub request: String,
}

/// Ordered view of the queue: the current slot plus pending tracks.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<QueueItem>,
    pub pending: Vec<QueueItem>,
}

impl QueueSnapshot {
    /// `true` when nothing is playing and nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}
