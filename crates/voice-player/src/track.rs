//! Track descriptors and duration helpers.

use voice_types::QueueItem;

/// Immutable metadata plus the playable stream reference for one queued item.
///
/// A restart never reuses a descriptor; it re-resolves `request` into a fresh one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub title: String,
    /// Direct media URL handed to the decoder.
    pub stream_url: String,
    /// Total duration in seconds (0 when unknown).
    pub duration_secs: u64,
    /// Display form of `duration_secs`.
    pub duration_text: String,
    pub thumbnail: String,
    /// The reference the user asked for (page URL), used for re-resolution.
    pub request: String,
}

impl TrackDescriptor {
    pub fn new(
        title: impl Into<String>,
        stream_url: impl Into<String>,
        duration_secs: u64,
        thumbnail: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            stream_url: stream_url.into(),
            duration_secs,
            duration_text: format_duration(duration_secs),
            thumbnail: thumbnail.into(),
            request: request.into(),
        }
    }

    /// Listing row for this track.
    pub fn to_item(&self) -> QueueItem {
        QueueItem {
            title: self.title.clone(),
            duration: self.duration_text.clone(),
            request: self.request.clone(),
        }
    }
}

/// Format seconds as `MM:SS`, or `HH:MM:SS` once the value reaches an hour.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Parse `S`, `M:SS` or `H:MM:SS` into seconds.
///
/// Returns `None` for anything else, including empty input and negative parts.
pub fn parse_duration_text(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parts = text
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [s] => Some(*s),
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}
